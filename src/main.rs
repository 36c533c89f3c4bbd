use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use zephyr_live::{create_router, AppState, Config, CueService, SynthCueService};

#[derive(Parser, Debug)]
#[command(name = "zephyr-live", about = "Realtime voice coaching session service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/zephyr-live")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);
    info!(
        "HTTP server will bind to {}:{}",
        cfg.service.http.bind, cfg.service.http.port
    );
    info!("Realtime endpoint: {}", cfg.live.endpoint);
    info!("Voice: {}", cfg.live.voice);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let cues: Arc<dyn CueService> = Arc::new(SynthCueService::new());
    let state = AppState::new(cfg, cues);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
