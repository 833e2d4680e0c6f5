use agriflow_live::{
    create_router, spawn_event_loop, AppState, Config, GeminiLiveConnector, GenAiClient,
    LiveControl, LiveSessionController, LocalDevices, SuggestionService, TextChatService, Transcript,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "agriflow-live", about = "Live voice and camera assistant for farmers")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/agriflow-live")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Run one live session from the configured devices
    Live {
        /// Stream camera frames as well
        #[arg(long)]
        camera: bool,
        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Ask the text assistant one question
    Chat { message: String },
}

fn build_controller(cfg: &Config) -> (Arc<Mutex<LiveSessionController>>, LiveControl) {
    let devices = Arc::new(LocalDevices::new(
        cfg.devices.microphone_wav.clone(),
        cfg.devices.camera_image.clone(),
        cfg.devices.output_dir.clone(),
    ));
    let connector = Arc::new(
        GeminiLiveConnector::new(cfg.genai.live_endpoint.clone(), cfg.genai.api_key.clone())
            .with_connect_timeout(Duration::from_millis(cfg.genai.connect_timeout_ms)),
    );

    let (controller, events) = LiveSessionController::new(cfg.live_session(), devices, connector);
    let control = controller.control();
    let controller = Arc::new(Mutex::new(controller));
    spawn_event_loop(Arc::clone(&controller), events);
    (controller, control)
}

async fn serve(cfg: Config) -> Result<()> {
    let client = GenAiClient::new(cfg.genai.rest_endpoint.clone(), cfg.genai.api_key.clone());
    let chat = TextChatService::new(client.clone(), cfg.genai.text_model.clone());
    let suggestions = SuggestionService::new(client, cfg.genai.suggestion_model.clone());

    let (live, control) = build_controller(&cfg);
    let state = AppState::new(live, control, chat, suggestions);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.live.lock().await.stop().await;
    info!("Shut down");
    Ok(())
}

async fn live(cfg: Config, camera: bool, seconds: Option<u64>) -> Result<()> {
    let (controller, control) = build_controller(&cfg);

    let start = async { controller.lock().await.start(camera).await };
    let id = tokio::select! {
        result = start => result?,
        _ = tokio::signal::ctrl_c() => {
            control.cancel_start();
            controller.lock().await.stop().await;
            info!("Start abandoned");
            return Ok(());
        }
    };
    info!("Live session {} running; press Ctrl-C to stop", id);

    match seconds {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    let mut live = controller.lock().await;
    live.stop().await;

    let stats = live.stats();
    info!(
        "Session finished: {} audio chunks sent, {} frames sent, {} buffers played, {} skipped",
        stats.audio_chunks_sent,
        stats.video_frames_sent,
        stats.buffers_scheduled,
        stats.buffers_skipped
    );
    Ok(())
}

async fn chat(cfg: Config, message: String) -> Result<()> {
    if cfg.genai.api_key.is_empty() {
        warn!("No API key configured; answering from the local knowledge base");
    }

    let client = GenAiClient::new(cfg.genai.rest_endpoint.clone(), cfg.genai.api_key.clone());
    let service = TextChatService::new(client, cfg.genai.text_model.clone());

    let mut transcript = Transcript::new();
    let reply = service.send(&mut transcript, &message).await;
    println!("{}", reply.text);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("AgriFlow Live v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Live { camera, seconds } => live(cfg, camera, seconds).await,
        Command::Chat { message } => chat(cfg, message).await,
    }
}
