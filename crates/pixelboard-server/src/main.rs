//! Pixelboard server binary.
//!
//! Wires the data tiers, the fan-out hub, the pub/sub bridge, and the
//! background job dispatcher together, then serves the HTTP surface.

use std::sync::Arc;

use pixelboard_broadcast::{bridge, hub};
use pixelboard_db::{CachePool, StoreConfig, StorePool};
use pixelboard_server::captcha::RecaptchaClient;
use pixelboard_server::{build_router, jobs, pipeline, server, AppState, Config};
use pixelboard_types::Grid;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pixelboard server starting");

    // 2. Configuration.
    let config = Config::from_env()?;
    let grid = Grid::default();

    // 3. Cache tier.
    let cache = CachePool::connect(&config.redis_url, grid).await?;

    // 4. Store tier.
    let store = StorePool::connect(&StoreConfig::new(&config.database_url)).await?;
    store.run_migrations().await?;

    // 5. Fan-out hub and pub/sub bridge.
    let (hub, _hub_task) = hub::spawn();
    let subscriber = bridge::subscriber_client(&config.redis_url).await?;
    {
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(err) = bridge::run_listener(subscriber, hub).await {
                error!(error = %err, "draw event listener stopped");
            }
        });
    }

    // 6. Background job dispatcher.
    let (jobs, _dispatcher_task) = jobs::spawn_dispatcher(store.clone(), cache.clone());

    // 7. CAPTCHA verifier.
    if config.recaptcha_secret.is_empty() {
        warn!("RECAPTCHA_SECRET is empty, placements will fail verification");
    }
    let captcha = RecaptchaClient::new(config.recaptcha_secret.clone());

    // 8. Serve.
    let state = Arc::new(AppState {
        cache,
        store,
        hub,
        jobs,
        captcha,
        cooldown: pipeline::DRAW_PERIOD,
    });
    let router = build_router(state).fallback_service(ServeDir::new(&config.static_dir));

    server::serve(router, config.port).await?;
    Ok(())
}
