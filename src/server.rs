//! HTTP front end: `GET /generate-audio?text=..&voice_preset=..` returns the
//! narrated text as `audio/wav`.
//!
//! The engine is loaded once and shared by every request. Each request runs
//! the full sentence pipeline on a blocking thread; a semaphore caps how many
//! requests synthesize at the same time.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::{
    net::TcpListener,
    sync::{AcquireError, Semaphore},
    task::JoinError,
};

use crate::pipeline::{self, PipelineConfig, PipelineError};
use crate::{BoxError, VoicePresets};

/// Voice preset used by `/generate-audio` when the query names none.
pub const DEFAULT_SERVER_VOICE: &str = "v2/en_speaker_9";

/// Text spoken when the query carries no `text`.
pub const DEFAULT_TEXT: &str = "Hello";

const WRONG_ENDPOINT: &str = "<html><body>Hello. Wrong endpoint.</body></html>";

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("Unknown voice preset '{preset}': {source}")]
    Voice { preset: String, source: BoxError },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Failed to encode WAV: {0}")]
    Wav(#[from] hound::Error),
    #[error("Synthesis worker stopped: {0}")]
    Worker(#[from] JoinError),
    #[error("Server is shutting down")]
    Closed(#[from] AcquireError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Voice { .. } => StatusCode::BAD_REQUEST,
            Self::Closed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log::error!("Request failed: {self}");
        (status, self.to_string()).into_response()
    }
}

/// State shared by all request handlers.
pub struct AppState<E> {
    engine: Arc<E>,
    pipeline: Arc<PipelineConfig>,
    default_voice: Arc<str>,
    inflight: Arc<Semaphore>,
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            pipeline: Arc::clone(&self.pipeline),
            default_voice: Arc::clone(&self.default_voice),
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<E> AppState<E> {
    /// `max_inflight` is clamped to at least one concurrent request.
    pub fn new(engine: E, pipeline: PipelineConfig, default_voice: &str, max_inflight: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            pipeline: Arc::new(pipeline),
            default_voice: Arc::from(default_voice),
            inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    pub text: Option<String>,
    pub voice_preset: Option<String>,
}

/// Create the router: `/generate-audio`, `/healthz` and a fallback for everything else.
pub fn router<E>(state: AppState<E>) -> Router
where
    E: VoicePresets + Send + Sync + 'static,
    E::SynthesisParams: Sync,
{
    Router::new()
        .route("/generate-audio", get(generate_audio::<E>))
        .route("/healthz", get(healthz))
        .fallback(wrong_endpoint)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve_with_shutdown<E, F>(
    listener: TcpListener,
    state: AppState<E>,
    shutdown: F,
) -> std::io::Result<()>
where
    E: VoicePresets + Send + Sync + 'static,
    E::SynthesisParams: Sync,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening for requests at http://{addr}/");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("Server shut down");
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn wrong_endpoint() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(WRONG_ENDPOINT))
}

async fn generate_audio<E>(
    State(state): State<AppState<E>>,
    Query(query): Query<GenerateQuery>,
) -> Result<Response, ServerError>
where
    E: VoicePresets + Send + Sync + 'static,
    E::SynthesisParams: Sync,
{
    let text = query.text.unwrap_or_else(|| DEFAULT_TEXT.to_string());
    let preset = query
        .voice_preset
        .unwrap_or_else(|| state.default_voice.to_string());
    log::info!(
        "Received request: {} chars, voice '{preset}'",
        text.chars().count()
    );

    let permit = Arc::clone(&state.inflight).acquire_owned().await?;
    let engine = Arc::clone(&state.engine);
    let config = Arc::clone(&state.pipeline);
    let wav = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        render_wav(engine.as_ref(), &text, &preset, &config)
    })
    .await??;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

/// Narrate `text` with `preset` and encode the result as WAV bytes.
pub fn render_wav<E>(
    engine: &E,
    text: &str,
    preset: &str,
    config: &PipelineConfig,
) -> Result<Vec<u8>, ServerError>
where
    E: VoicePresets + Sync,
    E::SynthesisParams: Sync,
{
    let params = engine
        .preset_params(preset)
        .map_err(|source| ServerError::Voice {
            preset: preset.to_string(),
            source,
        })?;
    let audio = pipeline::synthesize_script(engine, text, &params, config)?;
    Ok(audio.to_wav_bytes()?)
}
