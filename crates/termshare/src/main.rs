//! Termshare
//!
//! Share a shell session with guests over a pinned TLS channel.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use termshare::config::Config;
use termshare::host::{self, HostOptions};
use termshare::session::ExitOutcome;
use termshare::{guest, protocol};

/// Share a shell session with guests over a pinned TLS channel.
#[derive(Parser, Debug)]
#[command(name = "termshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Share your shell and print an invite for guests
    Host {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Shell command to share (defaults to $SHELL, then /bin/sh)
        #[arg(long)]
        shell: Option<String>,

        /// Address printed in the invite, the one guests connect to
        #[arg(long, value_name = "ADDR")]
        advertise_host: Option<String>,
    },

    /// Join a shared shell using the fields from an invite line
    Guest {
        /// Host address from the invite
        host: String,

        /// Port from the invite
        port: String,

        /// Certificate payload from the invite
        certificate: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    config.apply_env_overrides();
    config.validate()?;

    // Logs go to a file because the terminal is in raw mode while a
    // session runs. The guard must outlive the session so buffered
    // lines get flushed.
    let log_guard = init_logging(&config, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "termshare starting");

    match cli.command {
        Commands::Host {
            port,
            shell,
            advertise_host,
        } => {
            let opts = HostOptions {
                port: port.unwrap_or(config.network.port),
                advertise_host: advertise_host.unwrap_or(config.network.advertise_host),
                shell: shell.or_else(|| {
                    (!config.session.shell.is_empty()).then(|| config.session.shell.clone())
                }),
            };

            let outcome = host::run(opts).await?;

            if let ExitOutcome::Signaled(sig) = outcome {
                eprintln!("termshare: shell terminated by signal {sig}");
            }

            // process::exit skips destructors, so flush the log worker
            // before taking the shell's exit code.
            drop(log_guard);
            std::process::exit(outcome.exit_code())
        }
        Commands::Guest {
            host,
            port,
            certificate,
        } => {
            let invite = protocol::invite::decode(&[host, port, certificate])?;
            guest::run(invite).await?;
            Ok(())
        }
    }
}

/// Initializes tracing with a non-blocking file writer.
///
/// Returns the appender guard; dropping it stops the background writer.
fn init_logging(
    config: &Config,
    verbose: bool,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.logging.log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&config.logging.log_dir, "termshare.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if verbose {
        "debug".to_string()
    } else {
        config.logging.log_level.clone()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&filter))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
