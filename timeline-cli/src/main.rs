//! # timeline-cli
//!
//! CLI tool for replaying a scripted server through the timeline-sync
//! controller.
//!
//! ## Commands
//!
//! - `load`: Select a feed and show the first load
//! - `refresh`: Load, let incoming posts arrive, then catch up
//! - `older`: Scroll back through older pages
//! - `resume`: Continue the live feed from the stored read marker
//! - `stream`: Replay live events against the live feed
//! - `config`: Show the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # First load of the local timeline
//! timeline-cli --fixture server.json load local
//!
//! # Catch up with the fixture's incoming posts, as JSON
//! timeline-cli --fixture server.json --json refresh local
//!
//! # Resume from post 1042 with a custom config
//! timeline-cli --fixture server.json --config timeline.toml resume --marker 1042
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use timeline_types::FeedKind;
use tracing_subscriber::EnvFilter;

mod commands;
mod fixture;

use commands::{load, older, refresh, resume, show_config, stream, Session};

/// CLI tool for replaying a scripted server through the timeline-sync controller.
#[derive(Parser, Debug)]
#[command(name = "timeline-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON fixture describing the server timelines, markers and events
    #[arg(long, short, global = true)]
    fixture: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Print the snapshot as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Select a feed and show the first load
    Load {
        /// Feed kind (following, local, trending, federated, latest, resume)
        kind: FeedKind,
    },

    /// Load a feed, publish the incoming posts, then catch up
    Refresh {
        /// Feed kind
        kind: FeedKind,

        /// Catch up with a background poll instead of pull-to-refresh
        #[arg(long)]
        poll: bool,
    },

    /// Scroll back through older pages
    Older {
        /// Feed kind
        kind: FeedKind,

        /// Maximum number of older pages to load
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Continue the live feed from the stored read marker
    Resume {
        /// Last read post id, overriding the fixture's marker
        #[arg(long)]
        marker: Option<String>,
    },

    /// Replay the fixture's live events against the live feed
    Stream,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Load { kind } => {
            load::run(&open_session(&cli).await?, *kind, cli.json).await?;
        }
        Commands::Refresh { kind, poll } => {
            refresh::run(&open_session(&cli).await?, *kind, *poll, cli.json).await?;
        }
        Commands::Older { kind, pages } => {
            older::run(&open_session(&cli).await?, *kind, *pages, cli.json).await?;
        }
        Commands::Resume { marker } => {
            resume::run(&open_session(&cli).await?, marker.as_deref(), cli.json).await?;
        }
        Commands::Stream => {
            stream::run(&open_session(&cli).await?, cli.json).await?;
        }
        Commands::Config => {
            show_config::run(cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Build a session from the `--fixture` and `--config` flags.
async fn open_session(cli: &Cli) -> Result<Session> {
    let fixture_path = cli
        .fixture
        .as_deref()
        .context("Must specify --fixture for this command")?;
    Session::open(fixture_path, cli.config.as_deref()).await
}
