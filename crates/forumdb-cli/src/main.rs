//! forumdb CLI (forumctl)
//!
//! Operator tool for a forumdb store. It opens the store directly (applying
//! the embedded schema on first use) and prints results as JSON.
//!
//! ## Quick Start
//!
//! ```bash
//! # Point at a database (or put it in ~/.forumdb/config.toml)
//! export FORUMDB_DATABASE_URL=sqlite://forum.db
//!
//! forumctl status
//! forumctl forum rust
//! forumctl thread 42
//! forumctl posts welcome --sort parent_tree --limit 5 --desc
//! forumctl users rust --since alice
//! forumctl clear --yes
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `--config` (default `~/.forumdb/config.toml` when it
//! exists). `--database-url` / `FORUMDB_DATABASE_URL` override the file.
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forumdb_store::connect;
use std::path::PathBuf;
use tracing::{debug, info};

mod commands;
mod config;
mod format;

use commands::{inspect, service, PostsArgs, UsersArgs};
use config::Config;
use format::print_json;

#[derive(Parser)]
#[command(name = "forumctl")]
#[command(about = "forumdb command-line tool", long_about = None)]
struct Cli {
    /// Config file (default: ~/.forumdb/config.toml)
    #[arg(short, long, env = "FORUMDB_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overrides the config file
    #[arg(long, env = "FORUMDB_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show user, forum, thread and post counts
    Status,
    /// Delete all data and restart ids
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show a forum with its thread and post counters
    Forum {
        /// Forum slug
        slug: String,
    },
    /// Show a thread
    Thread {
        /// Thread slug or numeric id
        slug_or_id: String,
    },
    /// Show a post
    Post {
        /// Post id
        id: i64,
        /// Related entities to include, e.g. "user,forum,thread"
        #[arg(short, long, default_value = "")]
        related: String,
    },
    /// List the posts of a thread
    Posts(PostsArgs),
    /// List the users who took part in a forum
    Users(UsersArgs),
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?.with_database_url(cli.database_url);
    debug!(url = %config.store.database_url, "Configuration loaded");

    if let Commands::Config { command } = &cli.command {
        match command {
            ConfigCommands::Show => print!("{}", config.to_toml()?),
        }
        return Ok(());
    }

    let store = connect(&config.store)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.database_url))?;
    info!("Store ready");

    let store = store.as_ref();
    let page_size = config.store.default_page_size;

    match cli.command {
        Commands::Status => print_json(&service::status(store).await?)?,
        Commands::Clear { yes } => print_json(&service::clear(store, yes).await?)?,
        Commands::Forum { slug } => print_json(&inspect::forum(store, &slug).await?)?,
        Commands::Thread { slug_or_id } => {
            print_json(&inspect::thread(store, &slug_or_id).await?)?
        }
        Commands::Post { id, related } => print_json(&inspect::post(store, id, &related).await?)?,
        Commands::Posts(args) => print_json(&inspect::posts(store, &args, page_size).await?)?,
        Commands::Users(args) => print_json(&inspect::users(store, &args, page_size).await?)?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
