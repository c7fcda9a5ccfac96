use std::fs;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use avatarbot::config::BotConfig;
use avatarbot::core::animation::SpriteSet;
use avatarbot::core::pipeline::{MediaPipeline, PipelineConfig};
use avatarbot::model::TracingModelSession;
use avatarbot::persistence::{ConversationStore, MemoryStore, RestConversationStore};
use avatarbot::transport::TracingRoomTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env().context("loading configuration")?;
    info!(room = %config.room_url, engine = %config.vad_engine, "starting avatar bot");

    let sprites = SpriteSet::load_dir(&config.assets_dir)
        .with_context(|| format!("loading sprites from {}", config.assets_dir.display()))?;

    let greeting = fs::read_to_string(config.greeting_path())
        .with_context(|| format!("reading {}", config.greeting_path().display()))?;
    let system_prompt = fs::read_to_string(config.system_prompt_path())
        .with_context(|| format!("reading {}", config.system_prompt_path().display()))?;

    let store: Arc<dyn ConversationStore> = match &config.store {
        Some(store) => Arc::new(RestConversationStore::new(&store.url, &store.api_key)),
        None => {
            warn!("no store credentials configured; conversations stay in memory");
            Arc::new(MemoryStore::new())
        }
    };

    // The concrete room and model connections live behind trait boundaries;
    // this binary wires the logging stand-ins for local runs.
    let transport = Arc::new(TracingRoomTransport);
    let model = Arc::new(TracingModelSession);

    let pipeline = MediaPipeline::new(
        PipelineConfig {
            room_url: config.room_url.clone(),
            sample_rate: config.sample_rate,
            vad_engine: config.vad_engine,
            stop_secs: config.stop_secs,
            greeting: greeting.trim().to_owned(),
            system_prompt: system_prompt.trim().to_owned(),
        },
        transport,
        model,
        store,
        sprites,
    );
    let handle = pipeline.spawn().context("starting media pipeline")?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    handle.terminate();
    handle.join().await;

    Ok(())
}
