use std::{sync::Arc, time::Duration};

use clap::Parser;
use migration::{Migrator, MigratorTrait};
use server::{RateLimiter, ServerConfig, TokenBucketLimiter};

mod settings;

#[derive(Debug, Parser)]
#[command(name = "dompet", version)]
struct Args {
    /// Settings file (TOML). Defaults to `settings.toml` when present.
    #[arg(long, env = "DOMPET_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let settings = settings::Settings::new(args.config.as_deref())?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "dompet={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect(&settings.server.database).await?;
    let engine = engine::Engine::builder().database(db).build().await?;

    let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucketLimiter::new(
        settings.rate_limit.max_requests,
        settings.rate_limit.interval(),
    ));

    tasks.spawn(sweep_idle_buckets(
        Arc::clone(&limiter),
        settings.rate_limit.sweep_every(),
        settings.rate_limit.idle(),
    ));

    let config = ServerConfig {
        bind: settings.server.bind,
        port: settings.server.port,
        identity_header: settings.identity.header,
        templates: settings.templates,
    };
    tasks.spawn(server::run(engine, limiter, config));

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn connect(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(config.url()).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}

/// Periodically forgets clients that stopped sending requests.
async fn sweep_idle_buckets(limiter: Arc<dyn RateLimiter>, every: Duration, idle: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let removed = limiter.sweep(idle);
        if removed > 0 {
            tracing::debug!(removed, "dropped idle rate limit buckets");
        }
    }
}
