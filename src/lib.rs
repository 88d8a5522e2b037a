// Library root
// -----------
// This crate exposes the library surface behind the `filebrowser-cli`
// binary. `main.rs` only parses arguments, sets up logging and maps the
// final error to an exit code.
//
// Module responsibilities:
// - `api`: the `Transport` contract and the blocking HTTP client for the
//   File Browser endpoints, including login.
// - `upload`: the chunked upload engine (one file, one tus session).
// - `tree`: walks a local folder and drives the engine per file.
// - `download`: streams raw file content to disk.
// - `entry`: remote file/folder metadata.
// - `cli`, `commands`, `ui`: argument parsing, dispatch and terminal output.
// - `config`, `error`, `logging`: ambient plumbing.
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod download;
pub mod entry;
pub mod error;
pub mod logging;
pub mod tree;
pub mod ui;
pub mod upload;

pub use api::{ApiClient, Transport};
pub use config::Config;
pub use entry::{Listing, RemoteEntry};
pub use error::{Error, Result};
pub use tree::{FailurePolicy, TreeReport, TreeUploader};
pub use upload::{upload_file, CancelFlag, UploadOptions, UploadReport};
