use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whisperbot::{
    bot,
    config::{AppConfig, StorageBackend, StorageConfig},
    whisper::{JsonFileBackend, SnapshotBackend, SqliteBackend, UserId, WhisperService, WhisperStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whisperbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WhisperBot v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    if config.discord.token.is_empty() {
        error!("Discord token not configured!");
        error!("Set discord.token in config/local.toml or the WHISPERBOT_DISCORD__TOKEN env var");
        return Err(anyhow::anyhow!("Discord token not configured"));
    }

    let backend = open_backend(&config.storage).await?;
    let store = Arc::new(WhisperStore::new(backend));
    let service = Arc::new(WhisperService::new(store.clone(), config.whispers.clone()));

    // A snapshot we cannot read is fatal: starting empty would overwrite it at the next checkpoint.
    service
        .restore()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load whisper snapshot: {}", e))?;

    let autosave = config.storage.autosave_interval().map(|period| {
        info!("Checkpointing every {}s", period.as_secs());
        let store = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failures are logged by the store and retried on the next tick.
                let _ = store.save_snapshot().await;
            }
        })
    });

    let operators: Vec<UserId> = config.discord.operators.iter().copied().map(UserId).collect();
    info!("{} maintenance operator(s) configured", operators.len());

    tokio::select! {
        result = bot::start_bot_with_token(service.clone(), operators, &config.discord.token) => {
            match result {
                Ok(()) => info!("Discord bot shut down gracefully"),
                Err(e) => error!("Discord bot error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    if let Some(handle) = autosave {
        handle.abort();
    }

    // Final checkpoint; anything created since the last one would be lost otherwise.
    match store.save_snapshot().await {
        Ok(count) => info!("Saved {} whispers before exit", count),
        Err(e) => error!("Final checkpoint failed, recent whispers are lost: {}", e),
    }

    Ok(())
}

async fn open_backend(storage: &StorageConfig) -> anyhow::Result<Arc<dyn SnapshotBackend>> {
    let backend: Arc<dyn SnapshotBackend> = match storage.backend {
        StorageBackend::File => Arc::new(JsonFileBackend::new(storage.path.clone())),
        StorageBackend::Sqlite => Arc::new(SqliteBackend::connect(&storage.database_url).await?),
    };
    info!("Snapshot backend: {}", backend.describe());
    Ok(backend)
}
