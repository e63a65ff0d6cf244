//! devenv - command-line client for remote development environments.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devenv::api::DEFAULT_USER;
use devenv::commands::{self, CommandError, LoginOptions, RebuildOptions, StdinConfirm};
use devenv::config::{FileConfigStore, Settings};
use devenv::display;
use devenv::render::{Console, StageRenderer};

#[derive(Parser)]
#[command(
    name = "devenv",
    about = "Command-line client for remote development environments",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate this client for future operations.
    Login {
        /// Remote URL, e.g. https://dev.example.com.
        url: String,
        /// Seconds to wait for the browser login (0 waits forever).
        #[arg(long)]
        timeout: Option<u64>,
        /// Print the login URL instead of opening a browser.
        #[arg(long)]
        no_browser: bool,
    },
    /// Interact with development environments.
    Envs {
        #[command(subcommand)]
        command: EnvsCommand,
    },
}

#[derive(Subcommand)]
enum EnvsCommand {
    /// Rebuild an environment.
    #[command(after_help = "Examples:\n  devenv envs rebuild front-end-env --follow\n  devenv envs rebuild backend-env --force")]
    Rebuild {
        /// Environment name.
        name: String,
        /// Follow the build log after starting the rebuild.
        #[arg(long)]
        follow: bool,
        /// Rebuild without a confirmation prompt.
        #[arg(long)]
        force: bool,
        /// User whose environment to target.
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
        /// Print flat lines instead of spinners.
        #[arg(long)]
        plain: bool,
    },
    /// Trail the build log of an environment.
    WatchBuild {
        /// Environment name.
        name: String,
        /// User whose environment to target.
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
        /// Print flat lines instead of spinners.
        #[arg(long)]
        plain: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn renderer(plain: bool, settings: &Settings) -> StageRenderer<Console> {
    if plain || settings.render.plain {
        StageRenderer::stdout_plain()
    } else {
        StageRenderer::stdout()
    }
}

fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted");
            on_interrupt.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let settings = Settings::load()?;
    let store = Arc::new(FileConfigStore::new()?);

    match cli.command {
        Commands::Login {
            url,
            timeout,
            no_browser,
        } => {
            let options = LoginOptions {
                url,
                timeout: match timeout {
                    Some(0) => None,
                    Some(secs) => Some(Duration::from_secs(secs)),
                    None => settings.login.timeout(),
                },
                open_browser: !no_browser && settings.login.open_browser,
            };
            commands::login(store, &options, interrupt_token()).await
        }
        Commands::Envs { command } => {
            let api = commands::require_auth(store.as_ref())?;
            match command {
                EnvsCommand::Rebuild {
                    name,
                    follow,
                    force,
                    user,
                    plain,
                } => {
                    let options = RebuildOptions {
                        name,
                        user,
                        follow,
                        force,
                    };
                    let mut renderer = renderer(plain, &settings);
                    commands::rebuild(&api, &options, &StdinConfirm, &mut renderer).await?;
                    Ok(())
                }
                EnvsCommand::WatchBuild { name, user, plain } => {
                    let mut renderer = renderer(plain, &settings);
                    commands::watch_build(&api, &user, &name, &mut renderer).await?;
                    Ok(())
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            display::print_error(&e.to_string());
            if let Some(hint) = e.hint() {
                display::print_tip(hint);
            }
            ExitCode::FAILURE
        }
    }
}
