//! Care Timer - reminder countdown service
//!
//! This is the main entry point for the care-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use care_timer::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    countdown::TimerController,
    services::{InMemoryTimerHistoryRepository, RestTimerHistoryRepository, TimerHistoryRepository},
    state::{AppState, TimerStateStore},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("care_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting care-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, uid={}, state_file={}",
          config.host, config.port, config.uid, config.state_file.display());

    let store = Arc::new(TimerStateStore::open(&config.state_file));

    let repository: Arc<dyn TimerHistoryRepository> = match &config.backend_url {
        Some(url) => {
            info!("Syncing timer history to {}", url);
            Arc::new(RestTimerHistoryRepository::new(
                url,
                config.api_key.clone(),
                config.backend_timeout(),
            )?)
        }
        None => {
            warn!("No backend configured, timer history is kept in memory only");
            Arc::new(InMemoryTimerHistoryRepository::new())
        }
    };

    let controller = Arc::new(TimerController::new(
        store,
        repository,
        Arc::new(SystemClock),
        config.uid.clone(),
        config.tick_interval(),
    ));

    // Pick up a countdown that was running when the process last exited
    if controller.resume().await {
        info!("Resumed countdown, {}s remaining", controller.remaining_time().as_secs());
    }

    let state = Arc::new(AppState::new(Arc::clone(&controller), config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /timer/start  - Start a six hour countdown");
    info!("  POST /timer/stop   - Stop the countdown and record it");
    info!("  POST /timer/reset  - Discard the countdown");
    info!("  GET  /timer/status - Countdown state and remaining time");
    info!("  GET  /history/:uid - Timer history of a user");
    info!("  GET  /health       - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // The persisted countdown is left untouched and resumes on next start
    controller.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
