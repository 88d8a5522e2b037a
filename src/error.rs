// Error types: one enum for the whole library. Each variant belongs to a
// failure category and `exit_code` maps categories to process exit codes,
// which only `main.rs` ever acts on.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code constants, one per failure category.
pub mod exit_code {
    pub const REMOTE_EXISTS: i32 = 11;
    pub const LOCAL_MISSING: i32 = 12;
    pub const TOKEN: i32 = 13;
    pub const CREATE_FOLDER: i32 = 15;
    pub const UPLOAD: i32 = 16;
    pub const INVALID_COMMAND: i32 = 17;
    pub const FILE_INFO: i32 = 18;
    pub const DOWNLOAD: i32 = 19;
    pub const EMPTY_TOKEN: i32 = 20;
    pub const CONFIG: i32 = 21;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-success HTTP status with the response body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no session token, login first")]
    NotAuthenticated,

    #[error("error while requesting access token: {0}")]
    Login(#[source] Box<Error>),

    #[error("no access token received")]
    EmptyToken,

    #[error("local path '{}' does not exist", .0.display())]
    LocalMissing(PathBuf),

    #[error("remote path already exists at {0}")]
    RemoteExists(String),

    #[error("error while creating folder at {path}: {source}")]
    CreateFolder {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("error while creating upload session at {path}: {source}")]
    CreateSession {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("max attempts ({attempts}) reached while uploading {path} chunk at offset {offset}: {source}")]
    ChunkExhausted {
        path: String,
        offset: u64,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("error while reading '{}': {source}", .path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of {0} cancelled by user")]
    Cancelled(String),

    #[error("error while getting file info for {path}: {source}")]
    FileInfo {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("error while downloading {path}: {source}")]
    Download {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Process exit code for this error's failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::RemoteExists(_) => exit_code::REMOTE_EXISTS,
            Error::LocalMissing(_) => exit_code::LOCAL_MISSING,
            Error::Login(_) | Error::NotAuthenticated => exit_code::TOKEN,
            Error::EmptyToken => exit_code::EMPTY_TOKEN,
            Error::CreateFolder { .. } => exit_code::CREATE_FOLDER,
            Error::CreateSession { .. }
            | Error::ChunkExhausted { .. }
            | Error::LocalRead { .. }
            | Error::Cancelled(_) => exit_code::UPLOAD,
            Error::InvalidArgument(_) => exit_code::INVALID_COMMAND,
            Error::FileInfo { .. } => exit_code::FILE_INFO,
            Error::Download { .. } => exit_code::DOWNLOAD,
            Error::Config(_) => exit_code::CONFIG,
            // Bare transport/local errors only surface outside a categorised
            // operation; treat them as the upload category they mostly come from.
            Error::Status { .. } | Error::Request(_) | Error::Json(_) | Error::Io(_) => {
                exit_code::UPLOAD
            }
        }
    }

    /// True for an HTTP 404 answer.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Status { status, .. } => *status == 404,
            Error::Request(e) => e.status().map(|s| s.as_u16()) == Some(404),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
