// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging and the interrupt
//   handler, authenticate, and hand the command to `commands::execute`.
// - This is the only place that exits the process; every failure travels
//   up as an `Error` and is mapped to its category's exit code here.

use anyhow::Context;
use clap::Parser;
use tracing::error;

use filebrowser_cli::cli::{Cli, Command};
use filebrowser_cli::commands;
use filebrowser_cli::error::exit_code;
use filebrowser_cli::logging::{init_logging, LogTarget};
use filebrowser_cli::ui::{Output, Ui};
use filebrowser_cli::{ApiClient, CancelFlag, Config, Result};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too and are not failures.
            let code = if e.use_stderr() {
                exit_code::INVALID_COMMAND
            } else {
                0
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let cancel = match setup(&cli) {
        Ok(cancel) => cancel,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code::CONFIG);
        }
    };

    let ui = Ui::new(cli.json_output);
    let code = match run(&cli, &cancel, &ui) {
        Ok(output) => {
            ui.print_output(&output);
            output.exit_code()
        }
        Err(e) => {
            error!(error = %e, "aborting");
            ui.print_error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

/// Logging and Ctrl-C handling. A second Ctrl-C exits without cleanup.
fn setup(cli: &Cli) -> anyhow::Result<CancelFlag> {
    let target = if cli.json_output {
        LogTarget::File(&cli.logfile)
    } else {
        LogTarget::Stderr
    };
    init_logging(cli.loglevel, target).context("initializing logging")?;

    // Only uploads have cleanup to run; other commands keep the default
    // interrupt behaviour.
    let cancel = CancelFlag::new();
    if matches!(cli.command, Command::Upload(_)) {
        let flag = cancel.clone();
        ctrlc::set_handler(move || {
            if flag.is_cancelled() {
                std::process::exit(exit_code::UPLOAD);
            }
            eprintln!("Signal received, cancelling upload...");
            flag.cancel();
        })
        .context("installing interrupt handler")?;
    }
    Ok(cancel)
}

fn run(cli: &Cli, cancel: &CancelFlag, ui: &Ui) -> Result<Output> {
    commands::preflight(&cli.command)?;

    let mut config = Config::from_env()?;
    if cli.ask_password {
        let password = ui.prompt_password(&config.username)?;
        config = config.with_password(password);
    }

    let mut client = ApiClient::new(&config)?;
    client.login(&config.username, &config.password)?;

    commands::execute(&cli.command, &client, cancel, ui)
}
