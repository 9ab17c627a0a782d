//! Recipe Book
//!
//! Command-line front end for the recipe catalog:
//! - Loads configuration and picks a persistence backend
//! - Loads (or subscribes to) the recipe collection
//! - Runs one command and prints the result

use std::sync::Arc;

use anyhow::Context;
use catalog::{JpegPhotoEncoder, RecipeCollectionStore};
use clap::Parser;
use recipe_store::{
    Delivery, DocumentGateway, LocalGateway, RecipeGateway, SqliteStorage,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::Cli;
use commands::App;
use config::{AppConfig, Backend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.backend,
        "Starting Recipe Book"
    );

    // Create the collection store
    let gateway = create_gateway(&config).await?;
    let store = Arc::new(RecipeCollectionStore::new(gateway));
    if let Some(author) = config.author() {
        store.sign_in(author);
    }

    match store.delivery() {
        Delivery::Immediate => {
            store.load_all().await?;
        }
        Delivery::Subscription => {
            store.start_sync().await?;
            store.wait_for_revision(1).await;
        }
    }

    let encoder = Arc::new(JpegPhotoEncoder::new(config.encoder_settings()));
    let mut app = App::new(Arc::clone(&store), encoder, config.default_sort, cli.json);

    let mut stdout = std::io::stdout().lock();
    let result = app.run(cli.command, &mut stdout).await;

    store.sign_out();
    result
}

/// Initializes tracing. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        format!("recipe_book={level},catalog={level},recipe_store={level}").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn create_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn RecipeGateway>> {
    match config.backend {
        Backend::Local => {
            let storage = SqliteStorage::open(&config.database_path)
                .await
                .with_context(|| {
                    format!("failed to open {}", config.database_path.display())
                })?;
            tracing::debug!(path = %config.database_path.display(), "Opened local storage");
            Ok(Arc::new(LocalGateway::with_key(storage, config.storage_key.clone())))
        }
        Backend::Sync => {
            tracing::warn!("Sync backend keeps recipes in memory for this run only");
            Ok(Arc::new(DocumentGateway::new()))
        }
    }
}
