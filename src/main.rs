//! Service entry point: configuration, logging, store bootstrap, the
//! internal evaluation scheduler, and the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use floodwatch_service::api;
use floodwatch_service::config::Config;
use floodwatch_service::db::PgStore;
use floodwatch_service::logging::{self, LogLevel, Source};
use floodwatch_service::notify::Notifier;
use floodwatch_service::service::FloodService;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("floodwatch_service failed to start: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default()?;

    logging::init_logger(
        LogLevel::from_config(&config.logging.level),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    // A misconfigured database fails the process here, not the first cycle.
    let store = PgStore::connect_and_verify(&config.database.url)?;
    logging::info(Source::System, "database connected and verified");

    let notifier = match (config.notify.enabled, &config.notify.push_url) {
        (true, Some(url)) => Some(Notifier::new(
            url.clone(),
            Duration::from_secs(config.notify.timeout_secs),
        )?),
        (true, None) => {
            logging::warn(
                Source::Notify,
                "notifications enabled but no push_url configured; fan-out disabled",
            );
            None
        }
        _ => None,
    };

    let service = Arc::new(FloodService::new(
        Box::new(store),
        notifier,
        config.notify.recipients.clone(),
    ));

    // Single-writer evaluation: one scheduler thread drives the engine on a
    // fixed cadence, decoupled from how often dashboard clients poll.
    let tick_secs = config.evaluation.tick_interval_secs.max(1);
    {
        let service = Arc::clone(&service);
        std::thread::spawn(move || scheduler_loop(service, tick_secs));
    }
    logging::info(
        Source::System,
        &format!("evaluation scheduler running every {}s", tick_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    logging::info(
        Source::System,
        &format!("listening on {}", config.server.bind_addr),
    );
    axum::serve(listener, api::router(service)).await?;

    Ok(())
}

fn scheduler_loop(service: Arc<FloodService>, tick_secs: u64) {
    loop {
        std::thread::sleep(Duration::from_secs(tick_secs));
        match service.evaluate_once() {
            Ok(outcome) => logging::debug(Source::Engine, &outcome.message()),
            // Fail fast per cycle; the next tick retries cleanly.
            Err(e) => logging::error(Source::Engine, &format!("evaluation cycle failed: {}", e)),
        }
    }
}
