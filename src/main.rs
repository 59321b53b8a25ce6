use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zk_attendance_sync::logging::init_logging;
use zk_attendance_sync::{AppConfig, SyncOrchestrator, SyncScheduler};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level.as_deref());
    log::info!(
        "[main] Starting attendance sync: device {}, server {}",
        config.device.address(),
        config.server.url
    );

    let orchestrator = match SyncOrchestrator::from_config(&config) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(e) => {
            log::error!("[main] {}", e);
            std::process::exit(1);
        }
    };
    let scheduler = match SyncScheduler::new(orchestrator, &config.sync) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("[main] {}", e);
            std::process::exit(1);
        }
    };

    let ctx = CancellationToken::new();
    let worker = tokio::spawn({
        let ctx = ctx.clone();
        async move { scheduler.run(ctx).await }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[main] Failed to listen for shutdown signal: {}", e);
    }
    log::info!("[main] Shutting down");
    ctx.cancel();

    if let Err(e) = worker.await {
        log::error!("[main] Scheduler task ended abnormally: {}", e);
    }
}
