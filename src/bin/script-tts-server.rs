//! `script-tts-server` - serve Bark narration over HTTP.
//!
//! Usage:
//!   script-tts-server --model models/bark --port 8080
//!   curl "http://localhost:8080/generate-audio?text=Hello%20there.&voice_preset=v2/en_speaker_6" -o hello.wav

use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use script_tts::cli::{ModelArgs, PipelineArgs};
use script_tts::server::{self, AppState, DEFAULT_SERVER_VOICE};
use script_tts::BoxError;

#[derive(Parser, Debug)]
#[command(name = "script-tts-server", version)]
#[command(about = "Serve Bark text-to-speech over HTTP", long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Voice preset used when a request names none
    #[arg(long = "voice_preset", visible_alias = "voice-preset", default_value = DEFAULT_SERVER_VOICE)]
    voice_preset: String,

    /// Requests synthesized at the same time; later ones wait
    #[arg(long, default_value_t = 1)]
    max_inflight: usize,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    script_tts::log_builder().init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    log::info!("script-tts-server {}", env!("CARGO_PKG_VERSION"));

    let engine = cli.model.load_engine()?;
    let config = cli.pipeline.config(false)?;
    let state = AppState::new(engine, config, &cli.voice_preset, cli.max_inflight);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await?;
    server::serve_with_shutdown(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
