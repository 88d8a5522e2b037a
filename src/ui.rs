// UI layer: everything the user sees on the terminal. Progress bars use
// `indicatif`, the password prompt uses `dialoguer`, and command results
// are printed either as plain lines or as one JSON report.

use std::time::Duration;

use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::download::DownloadReport;
use crate::entry::Listing;
use crate::error::{exit_code, Error, Result};
use crate::tree::{EntryKind, TreeReport};

const BAR_TEMPLATE: &str =
    "{spinner} {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Result of one command, printable in both output modes.
#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum Output {
    #[serde(rename = "upload")]
    Upload(UploadSummary),
    #[serde(rename = "download")]
    Download(DownloadReport),
    #[serde(rename = "getdownloadlink")]
    DownloadLink { target: String, link: String },
    #[serde(rename = "getfileinfo")]
    FileInfo(Listing),
}

impl Output {
    /// Exit code for the process: non-zero when an upload entry failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Output::Upload(summary) => summary.exit_code,
            _ => 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntrySummary {
    pub kind: EntryKind,
    pub remote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub source: String,
    pub target: String,
    pub bytes: u64,
    pub cancelled: bool,
    pub entries: Vec<EntrySummary>,
    pub exit_code: i32,
}

impl UploadSummary {
    pub fn from_report(source: String, target: String, report: &TreeReport) -> Self {
        let entries = report
            .outcomes
            .iter()
            .map(|o| EntrySummary {
                kind: o.kind,
                remote: o.remote.clone(),
                bytes: o.result.as_ref().ok().and_then(|r| r.as_ref()).map(|r| r.bytes),
                error: o.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        UploadSummary {
            source,
            target,
            bytes: report.uploaded_bytes(),
            cancelled: report.cancelled,
            entries,
            exit_code: summary_exit_code(report),
        }
    }

    fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.error.is_some()).count()
    }
}

/// First failure's code; a walk stopped by cancellation without a recorded
/// failure still counts as a failed upload.
fn summary_exit_code(report: &TreeReport) -> i32 {
    match report.first_error() {
        Some(e) => e.exit_code(),
        None if report.cancelled => exit_code::UPLOAD,
        None => 0,
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    exit_code: i32,
}

/// Terminal front end for one invocation.
#[derive(Clone, Copy, Debug)]
pub struct Ui {
    json: bool,
}

impl Ui {
    pub fn new(json: bool) -> Self {
        Ui { json }
    }

    /// Byte progress bar for a transfer; hidden in JSON mode.
    pub fn transfer_bar(&self, message: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    /// Ask for the password without echoing it.
    pub fn prompt_password(&self, username: &str) -> Result<String> {
        let password = Password::new()
            .with_prompt(format!("Password for {username}"))
            .interact()?;
        Ok(password)
    }

    pub fn print_output(&self, output: &Output) {
        if self.json {
            print_json(&Envelope {
                ok: output.exit_code() == 0,
                body: output,
            });
            return;
        }
        match output {
            Output::Upload(summary) => {
                let files = summary
                    .entries
                    .iter()
                    .filter(|e| e.kind == EntryKind::File && e.error.is_none())
                    .count();
                let folders = summary
                    .entries
                    .iter()
                    .filter(|e| e.kind == EntryKind::Folder && e.error.is_none())
                    .count();
                println!(
                    "Uploaded {files} file(s), {} bytes, created {folders} folder(s) under {}",
                    summary.bytes, summary.target
                );
                for entry in summary.entries.iter().filter(|e| e.error.is_some()) {
                    println!("Failed {}: {}", entry.remote, entry.error.as_deref().unwrap_or(""));
                }
                if summary.cancelled {
                    println!("Upload cancelled by user.");
                } else if summary.failures() > 0 {
                    println!("{} entr(ies) failed.", summary.failures());
                }
            }
            Output::Download(report) => {
                println!(
                    "Downloaded {} ({} bytes) to {}",
                    report.source, report.bytes, report.destination
                );
            }
            Output::DownloadLink { link, .. } => println!("{link}"),
            Output::FileInfo(listing) => {
                println!("{}", listing.entry.to_json());
                for child in &listing.items {
                    println!("{}", child.to_json());
                }
            }
        }
    }

    /// Report a fatal error on stdout in JSON mode. Human mode relies on
    /// the error already logged to stderr.
    pub fn print_error(&self, error: &Error) {
        if self.json {
            print_json(&Envelope {
                ok: false,
                body: &ErrorBody {
                    error: error.to_string(),
                    exit_code: error.exit_code(),
                },
            });
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to render JSON output: {e}"),
    }
}
