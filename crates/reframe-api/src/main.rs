mod server;
mod telemetry;

use std::sync::Arc;

use reframe_core::Config;
use reframe_engine::RasterEngine;
use reframe_pipeline::ImagePipeline;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load .env if present, then configuration
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = Config::from_env()?;

    let store = reframe_storage::create_store(&config).await?;
    tracing::info!(backend = %store.backend_type(), "Storage ready");

    let engine = Arc::new(RasterEngine::new());
    let pipeline = Arc::new(ImagePipeline::new(store, engine));

    server::start_server(&config, pipeline).await?;

    Ok(())
}
