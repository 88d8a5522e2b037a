// Command dispatch: runs one parsed subcommand against an authenticated
// transport and turns the result into an `Output`.

use tracing::{error, info};

use crate::api::{ApiClient, Transport};
use crate::cli::{Command, UploadArgs};
use crate::download::download_file;
use crate::entry::{normalize_remote_path, Listing};
use crate::error::{Error, Result};
use crate::tree::TreeUploader;
use crate::ui::{Output, Ui, UploadSummary};
use crate::upload::CancelFlag;

/// Fail fast, before any network call, when the upload source is missing
/// or the arguments are unusable.
pub fn preflight(command: &Command) -> Result<()> {
    match command {
        Command::Upload(args) => {
            args.options().validate()?;
            if !args.file_path.exists() {
                error!(local = %args.file_path.display(), "local file does not exist, aborting");
                return Err(Error::LocalMissing(args.file_path.clone()));
            }
            Ok(())
        }
        Command::Download { chunk_size: 0, .. } => Err(Error::InvalidArgument(
            "chunk size must be greater than zero".into(),
        )),
        _ => Ok(()),
    }
}

pub fn execute(
    command: &Command,
    client: &ApiClient,
    cancel: &CancelFlag,
    ui: &Ui,
) -> Result<Output> {
    match command {
        Command::Upload(args) => upload(client, args, cancel, ui),
        Command::Download {
            target_path,
            local_download_path,
            chunk_size,
        } => {
            let bar = ui.transfer_bar(normalize_remote_path(target_path));
            let report = download_file(client, target_path, local_download_path, *chunk_size, &bar);
            bar.finish_and_clear();
            Ok(Output::Download(report?))
        }
        Command::GetDownloadLink { target_path } => {
            let link = client.download_link(target_path)?;
            info!(%link, "download link");
            Ok(Output::DownloadLink {
                target: normalize_remote_path(target_path).to_string(),
                link,
            })
        }
        Command::GetFileInfo { target_path } => file_info(client, target_path).map(Output::FileInfo),
    }
}

/// Upload a file or a folder tree and summarise every entry.
pub fn upload<T: Transport + ?Sized>(
    transport: &T,
    args: &UploadArgs,
    cancel: &CancelFlag,
    ui: &Ui,
) -> Result<Output> {
    let bar = ui.transfer_bar(&args.target_path);
    let uploader = TreeUploader::new(transport, args.options(), cancel.clone())
        .with_policy(args.policy())
        .with_progress(bar.clone());
    let report = uploader.upload(&args.file_path, &args.target_path);
    bar.finish_and_clear();
    let report = report?;

    if let Some(e) = report.first_error() {
        error!(error = %e, "upload failed");
    }
    Ok(Output::Upload(UploadSummary::from_report(
        args.file_path.display().to_string(),
        normalize_remote_path(&args.target_path).to_string(),
        &report,
    )))
}

/// Metadata of a remote path; a missing path is a file-info failure.
pub fn file_info<T: Transport + ?Sized>(transport: &T, target_path: &str) -> Result<Listing> {
    let target = normalize_remote_path(target_path);
    let wrap = |e: Error| Error::FileInfo {
        path: target.to_string(),
        source: Box::new(e),
    };
    match transport.stat(target).map_err(wrap)? {
        Some(listing) => Ok(listing),
        None => Err(wrap(Error::Status {
            status: 404,
            body: "404 Not Found".into(),
        })),
    }
}
