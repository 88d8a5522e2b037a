// Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogLevel;
use crate::tree::FailurePolicy;
use crate::upload::{UploadOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS};

/// File Browser API client: upload, download and inspect files on a
/// File Browser server.
#[derive(Debug, Parser)]
#[command(name = "filebrowser-cli", version)]
pub struct Cli {
    /// Print one JSON report on stdout; logs go to the log file only
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long = "loglevel", value_enum, ignore_case = true, default_value = "info", global = true)]
    pub loglevel: LogLevel,

    /// Log file used with --json-output
    #[arg(long = "logfile", default_value = "app.log", global = true)]
    pub logfile: PathBuf,

    /// Prompt for the password instead of reading FILEBROWSER_PASSWORD
    #[arg(long = "ask-password", global = true)]
    pub ask_password: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file or a folder
    Upload(UploadArgs),

    /// Download a file
    Download {
        /// Target path on the server
        target_path: String,
        /// Local path to save the downloaded file
        local_download_path: PathBuf,
        /// Read size in bytes
        #[arg(long = "chunk_size", visible_alias = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Get download link for a file
    #[command(name = "getdownloadlink")]
    GetDownloadLink {
        /// Target path on the server
        target_path: String,
    },

    /// Get file information
    #[command(name = "getfileinfo")]
    GetFileInfo {
        /// Target path on the server
        target_path: String,
    },
}

#[derive(Debug, clap::Args)]
pub struct UploadArgs {
    /// Path to the file or folder to upload
    pub file_path: PathBuf,

    /// Target path on the server
    pub target_path: String,

    /// Ask the server to override an existing file
    #[arg(long = "override")]
    pub override_existing: bool,

    /// Maximum attempts per chunk
    #[arg(long = "max_attempts", visible_alias = "max-attempts", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Chunk size in bytes
    #[arg(long = "chunk_size", visible_alias = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Keep uploading the rest of a folder after a failed entry
    #[arg(long = "keep-going")]
    pub keep_going: bool,
}

impl UploadArgs {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            override_existing: self.override_existing,
            max_attempts: self.max_attempts,
            chunk_size: self.chunk_size,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        if self.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Halt
        }
    }
}
