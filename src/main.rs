//! # whereisit CLI
//!
//! The `whereisit` binary initializes the database, runs the HTTP server,
//! and offers a few read-only views for the terminal.
//!
//! ## Usage
//!
//! ```bash
//! whereisit --config ./config/whereisit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `whereisit init` | Create the SQLite database and run schema migrations |
//! | `whereisit serve` | Start the HTTP server |
//! | `whereisit search "<query>"` | Search boxes and items |
//! | `whereisit box <slug>` | Show a box and its items |
//! | `whereisit units` | List units with their boxes |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use whereisit::{config, get, migrate, search, server};

/// whereisit: track what is stored in which box, on which shelf.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "whereisit",
    about = "whereisit: a self-hosted inventory of storage units, boxes and items",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/whereisit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the units, boxes and items
    /// tables. Running it again is safe and upgrades older item tables.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the REST API, stored photos,
    /// and the frontend build if one is configured.
    Serve,

    /// Search box names and item names/categories.
    Search {
        /// Text to look for (case-insensitive substring).
        query: String,
    },

    /// Show a box and its items.
    Box {
        /// The box slug (as encoded in its QR code).
        slug: String,
    },

    /// List units with their boxes.
    Units {
        /// Number of units to skip.
        #[arg(long, default_value_t = 0)]
        skip: i64,

        /// Maximum number of units to list.
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whereisit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Box { slug } => {
            get::run_get_box(&cfg, &slug).await?;
        }
        Commands::Units { skip, limit } => {
            get::run_list_units(&cfg, skip, limit).await?;
        }
    }

    Ok(())
}
