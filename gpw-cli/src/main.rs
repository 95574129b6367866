// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geo PWA worker CLI
//!
//! Drives the offline worker against a live origin and inspects its buckets.

mod commands;

use clap::{Parser, Subcommand};
use gpw_core::{Destination, Method};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gpw")]
#[command(author, version, about = "Geo PWA offline worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./gpw.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bucket database directory
    #[arg(long, global = true, conflicts_with = "ephemeral")]
    store: Option<PathBuf>,

    /// Keep buckets in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the worker against the origin and activate it
    Install,

    /// Send requests through the active worker
    Fetch {
        /// URLs to request
        #[arg(required = true)]
        urls: Vec<String>,

        /// Treat each request as a page navigation
        #[arg(short, long)]
        navigate: bool,

        /// Request destination (style, script, image, font, document, ...)
        #[arg(short, long)]
        destination: Option<Destination>,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: Method,

        /// Pretend the network is down
        #[arg(long)]
        offline: bool,

        /// Print response bodies
        #[arg(short, long)]
        body: bool,
    },

    /// List cache buckets
    Buckets,

    /// List entries of a bucket (defaults to the current one)
    Entries {
        bucket: Option<String>,
    },

    /// Delete every bucket except the current one
    Purge,

    /// Handle a push message and show the resulting notification
    Push {
        /// JSON payload, e.g. '{"title":"Trail closed","url":"/routes/7"}'
        payload: Option<String>,

        /// Also click the notification
        #[arg(long)]
        click: bool,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GPW_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = match commands::Context::load(cli.config, cli.store, cli.ephemeral, cli.verbose) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Install => commands::install(&ctx).await,
        Commands::Fetch {
            urls,
            navigate,
            destination,
            method,
            offline,
            body,
        } => {
            let options = commands::FetchOptions {
                navigate,
                destination,
                method,
                offline,
                body,
            };
            match commands::fetch(&ctx, &urls, &options).await {
                Ok(summary) if !summary.all_served() => {
                    eprintln!("{} of {} requests failed", summary.failed, summary.total);
                    return ExitCode::from(2);
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Commands::Buckets => commands::buckets(&ctx).await,
        Commands::Entries { bucket } => commands::entries(&ctx, bucket.as_deref()).await,
        Commands::Purge => commands::purge(&ctx).await,
        Commands::Push { payload, click } => commands::push(&ctx, payload.as_deref(), click).await,
        Commands::Config => commands::config(&ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
