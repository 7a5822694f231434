use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tidings_client::build_pipeline;
use tidings_core::config::TidingsConfig;
use tidings_core::scheduler::{Scheduler, TracingSchedulerReporter};
use tidings_server::routes;
use tidings_server::state::{AppState, SharedPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tidings=info".parse()?))
        .with_target(false)
        .init();

    let config = TidingsConfig::from_env()?;
    let addr = format!("0.0.0.0:{}", config.server_port);
    let cancel = CancellationToken::new();

    // Health checks stay up even when publishing is misconfigured.
    let (state, scheduler) = match build_pipeline(&config) {
        Ok(pipeline) => {
            let pipeline = Arc::new(Mutex::new(pipeline));
            let scheduler = config.server_schedule.then(|| {
                let pipeline = pipeline.clone();
                let cancel = cancel.clone();
                let tick = config.tick;
                tokio::spawn(async move {
                    Scheduler::new(tick)
                        .run(pipeline, cancel, &TracingSchedulerReporter)
                        .await
                })
            });
            let trigger = Arc::new(SharedPipeline::new(pipeline));
            (AppState::new(trigger), scheduler)
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline unavailable; /run will report errors");
            (AppState::unavailable(e.to_string()), None)
        }
    };

    let app = routes::router(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    if let Some(handle) = scheduler {
        let cycles = handle.await?;
        tracing::info!(cycles, "Scheduler joined");
    }

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
