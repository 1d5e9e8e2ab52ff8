//! # glyph-server binary
//!
//! Wires the store, the provider, and the HTTP server together.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use glyph_server::provider::OfflineProvider;
use glyph_server::{GlyphServer, ServerConfig};
use glyph_store::TurnStore;

/// Glyph diagram-chat server.
#[derive(Parser, Debug)]
#[command(name = "glyph-server", about = "Glyph diagram-chat server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "4810")]
    port: u16,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Use an in-memory database (nothing survives a restart).
    #[arg(long)]
    ephemeral: bool,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".glyph").join("glyph.db")
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    glyph_core::logging::init_subscriber(&cli.log_level);

    let store = if cli.ephemeral {
        TurnStore::open_in_memory().context("Failed to open in-memory store")?
    } else {
        let db_path = cli.db_path.clone().unwrap_or_else(Cli::default_db_path);
        ensure_parent_dir(&db_path)?;
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        tracing::info!(db_path, "opening turn store");
        TurnStore::open_file(db_path).context("Failed to open turn store")?
    };

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };
    let server = GlyphServer::new(config, Arc::new(store), Arc::new(OfflineProvider));
    server.serve().await
}
