use anyhow::{Context, Result};
use clap::Parser;
use loqa_interviewer::dialogue::LlmQuestionGenerator;
use loqa_interviewer::providers::{OpenAiChat, OpenAiSpeech, OpenAiTranscriber};
use loqa_interviewer::session::SessionServices;
use loqa_interviewer::{create_router, AppState, Config, InMemoryActivityStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "loqa-interviewer", about = "Real-time voice interview server")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/interviewer")]
    config: String,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("Loqa Interviewer v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Dialogue: {:?} mode, {} questions, {} max turns",
        cfg.dialogue.mode, cfg.dialogue.question_count, cfg.dialogue.max_turns
    );
    if cfg.providers.api_key.is_empty() {
        warn!("No provider API key configured (INTERVIEWER__PROVIDERS__API_KEY)");
    }

    let model = Arc::new(OpenAiChat::new(&cfg.providers)?);
    let services = SessionServices {
        transcriber: Arc::new(OpenAiTranscriber::new(&cfg.providers)?),
        model: model.clone(),
        synthesizer: Arc::new(OpenAiSpeech::new(&cfg.providers)?),
        questions: Arc::new(LlmQuestionGenerator::new(model)),
        store: Arc::new(InMemoryActivityStore::new()),
    };

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let router = create_router(AppState::new(cfg, services));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
