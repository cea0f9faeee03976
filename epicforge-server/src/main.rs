use std::sync::Arc;

use clap::Parser;
use epicforge_core::config::API_KEY_ENV;
use epicforge_core::{EpicforgeConfig, FeatureStore, GeminiGenerationClient, GenerationBackend};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use epicforge_server::http::{self, HttpState};
use epicforge_server::pages::StaticSite;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "epicforge.toml")]
    config: String,

    /// Check the database and exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match EpicforgeConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let store = match FeatureStore::open(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.url, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match epicforge_core::db::health_check(store.pool()).await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite check failed: {}", e);
                std::process::exit(1);
            }
        }
        match store.count().await {
            Ok(n) => println!("✅ feature_requests rows: {}", n),
            Err(e) => {
                println!("❌ feature_requests unreadable: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Epicforge health check passed");
        return Ok(());
    }

    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(k) if !k.trim().is_empty() => k,
        _ => {
            eprintln!("{} is not set; refusing to start", API_KEY_ENV);
            std::process::exit(1);
        }
    };

    let settings = &config.generation;
    let feature_generator: Arc<dyn GenerationBackend> = Arc::new(
        GeminiGenerationClient::from_preset(api_key.clone(), settings, &settings.feature)?,
    );
    let ideas_generator: Arc<dyn GenerationBackend> = Arc::new(
        GeminiGenerationClient::from_preset(api_key, settings, &settings.ideas)?,
    );
    tracing::info!(model = %settings.model, "Generation adapters ready");

    let site = StaticSite::new(&config.http.static_dir);
    site.ensure_exists()?;

    let state = Arc::new(HttpState {
        store,
        feature_generator,
        ideas_generator,
        site,
    });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
