use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;

use stockflow_api::app::{self, services::AppServices};
use stockflow_core::{SharedClock, SystemClock};
use stockflow_infra::{DailyStockCheck, Settings, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }
    stockflow_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let clock: SharedClock = Arc::new(SystemClock);

    let store = app::services::connect_store(&settings)
        .await
        .context("failed to open store")?;
    let mailer = Arc::new(SmtpMailer::new(&settings.mail).context("invalid mail settings")?);
    tokio::fs::create_dir_all(&settings.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", settings.upload_dir.display()))?;

    let services = Arc::new(AppServices::new(store, mailer, clock.clone(), &settings));

    let daily = DailyStockCheck::new(
        services.notifier.clone(),
        clock,
        settings.notify_at,
        settings.notify_timezone,
    );
    let stop_daily = daily.shutdown_handle();
    let daily = daily.start();

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app::build_app(services))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    stop_daily.notify_one();
    daily.await.context("daily stock check task failed")?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
