use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bacula_reporter::db::ReportStorage;
use bacula_reporter::router::{ReporterState, reporter_router};
use bacula_reporter::service::{runner::ReportRunner, schedule_actor};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &bacula_reporter::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        proxy_url = %cfg.bacula.proxy_url,
        send_url = %cfg.whatsapp.send_url,
        loglevel = %cfg.basic.loglevel,
        auth = cfg.basic.api_key.is_some(),
        schedule = cfg.schedule.enabled,
    );

    let storage = ReportStorage::connect(&cfg.basic.database_url).await?;
    let runner = ReportRunner::from_config(storage, cfg)?;

    let schedule = if cfg.schedule.enabled {
        let handle = schedule_actor::spawn(runner.clone(), &cfg.schedule).await?;
        info!(daily_at = %cfg.schedule.daily_at, "daily report schedule enabled");
        Some(handle)
    } else {
        None
    };

    let api_key = cfg.basic.api_key.as_deref().map(Arc::<str>::from);
    if api_key.is_none() {
        warn!("no api_key configured; report routes are open");
    }
    let app = reporter_router(ReporterState::new(runner, api_key));

    let listener = TcpListener::bind(cfg.basic.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = schedule {
        handle.shutdown().await;
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
