//! Agora Server
//!
//! Run with: cargo run -- --config ./config.toml
//!
//! # Configuration
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! config file (`--config`, else the default locations), `AGORA_*`
//! environment variables, and command-line flags. `RUST_LOG` overrides the
//! configured log level.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agora::api::{serve, AppState};
use agora::config::{generate_default_config, Config, LoggingConfig};
use agora::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "agora")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time community board server")]
struct Cli {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = &self.database {
            config.store.database_path = database.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging);

    tracing::info!("Starting Agora v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {:?}", config.store.database_path);
    tracing::info!("Static directory: {:?}", config.server.static_dir);

    let store = SqliteStore::open(&config.store.database_path).with_context(|| {
        format!(
            "opening database at {}",
            config.store.database_path.display()
        )
    })?;
    let store: Arc<dyn Store> = Arc::new(store);

    store
        .ensure_categories(&config.store.categories)
        .await
        .context("seeding categories")?;
    tracing::info!("Categories ready: {}", config.store.categories.join(", "));

    let api_config = config.api_config();
    let state = AppState::new(store, api_config.clone());
    serve(state, &api_config).await?;

    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("agora={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
