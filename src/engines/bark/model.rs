use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use ndarray::{ArrayD, IxDyn};
use ort::execution_providers::{ExecutionProviderDispatch, CPU as CPUExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::TensorRef;

use super::processor::BarkInputs;
use super::voices::PromptArray;
use crate::hub::SourceError;

/// Output sample rate of the Bark codec.
pub const SAMPLE_RATE: u32 = 24_000;

/// Graph input carrying the attention mask for `input_ids`.
pub const ATTENTION_MASK: &str = "attention_mask";
/// Graph inputs carrying the voice preset history prompts.
pub const SEMANTIC_PROMPT: &str = "semantic_prompt";
pub const COARSE_PROMPT: &str = "coarse_prompt";
pub const FINE_PROMPT: &str = "fine_prompt";

#[derive(thiserror::Error, Debug)]
pub enum BarkError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(
        "ONNX graph '{file}' not found in {location} ({source}). A Bark model source holds \
         {file} (the exported generation graph) next to tokenizer.json and speaker_embeddings/"
    )]
    MissingGraph {
        file: String,
        location: String,
        source: SourceError,
    },
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    #[error("Invalid model config: {0}")]
    Config(String),
    #[error("Failed to parse voice preset: {0}")]
    VoiceParse(String),
    #[error("Model graph requires input '{0}' but no voice preset was given")]
    VoiceRequired(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Compute device '{0}' is not available in this build or on this machine")]
    DeviceUnavailable(Device),
    #[error("An inference session was poisoned by a panicking worker")]
    SessionPoisoned,
    #[error("Model produced no output tensor")]
    EmptyOutput,
}

/// Compute device for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Device {
    /// CUDA when compiled in and usable, otherwise CPU
    #[default]
    Auto,
    /// CPU inference (always available)
    Cpu,
    /// NVIDIA CUDA acceleration (requires the `cuda` feature)
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

impl Device {
    /// Pick a concrete device. `Auto` never fails; an explicit `Cuda` does when
    /// no CUDA provider can be used.
    pub fn resolve(self) -> Result<Device, BarkError> {
        match self {
            Device::Cpu => Ok(Device::Cpu),
            Device::Cuda if cuda_available() => Ok(Device::Cuda),
            Device::Cuda => Err(BarkError::DeviceUnavailable(Device::Cuda)),
            Device::Auto if cuda_available() => Ok(Device::Cuda),
            Device::Auto => Ok(Device::Cpu),
        }
    }
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{ExecutionProvider, CUDA as CUDAExecutionProvider};
    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
    false
}

/// Internal Bark ONNX model state.
///
/// Holds `instances` independent sessions over the same graph. Each session
/// is behind its own mutex, so concurrent `generate` calls never share one;
/// callers beyond `instances` queue on a busy session.
pub struct BarkModel {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    /// Detected input name: "input_ids" or "tokens"
    tokens_input_name: String,
    input_names: HashSet<String>,
    device: Device,
}

impl BarkModel {
    /// Load the exported Bark graph from `onnx_path`.
    pub fn load(
        onnx_path: &Path,
        device: Device,
        instances: usize,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, BarkError> {
        let device = device.resolve()?;
        let instances = instances.max(1);
        log::info!(
            "Loading Bark model from {} on {device} ({instances} session(s))",
            onnx_path.display()
        );

        let mut sessions = Vec::with_capacity(instances);
        for _ in 0..instances {
            let session = init_session(onnx_path, device, num_threads, optimized_cache_path)?;
            sessions.push(Mutex::new(session));
        }

        let (tokens_input_name, input_names) = {
            let first = sessions[0].lock().map_err(|_| BarkError::SessionPoisoned)?;
            let names: HashSet<String> = first
                .inputs()
                .iter()
                .map(|input| input.name().to_string())
                .collect();
            (detect_tokens_input(&names), names)
        };

        log::info!("Detected graph inputs: {input_names:?}");

        Ok(Self {
            sessions,
            next: AtomicUsize::new(0),
            tokens_input_name,
            input_names,
            device,
        })
    }

    /// Resolved compute device.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of independent inference sessions.
    pub fn instances(&self) -> usize {
        self.sessions.len()
    }

    /// True if the graph consumes any voice preset prompt.
    pub fn accepts_voice(&self) -> bool {
        [SEMANTIC_PROMPT, COARSE_PROMPT, FINE_PROMPT]
            .iter()
            .any(|name| self.input_names.contains(*name))
    }

    /// Run the generation graph and return the mono waveform.
    pub fn generate(&self, inputs: &BarkInputs<'_>) -> Result<Vec<f32>, BarkError> {
        let feeds = self.feeds(inputs)?;

        let mut values: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            Vec::with_capacity(feeds.len());
        for (name, array) in &feeds {
            values.push((
                Cow::Borrowed(name.as_str()),
                TensorRef::from_array_view(array.view())?.into(),
            ));
        }

        let mut session = self.acquire()?;
        let outputs = session.run(values)?;

        // First output is the waveform, shaped [1, samples] or [samples]
        let (_, waveform) = outputs.iter().next().ok_or(BarkError::EmptyOutput)?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }

    /// Build the named input tensors the graph declares, each with a leading batch axis.
    fn feeds(&self, inputs: &BarkInputs<'_>) -> Result<Vec<(String, ArrayD<i64>)>, BarkError> {
        let len = inputs.input_ids.len();
        let mut feeds = Vec::with_capacity(5);
        feeds.push((
            self.tokens_input_name.clone(),
            ArrayD::from_shape_vec(IxDyn(&[1, len]), inputs.input_ids.clone())?,
        ));

        if self.input_names.contains(ATTENTION_MASK) {
            feeds.push((
                ATTENTION_MASK.to_string(),
                ArrayD::from_shape_vec(IxDyn(&[1, len]), inputs.attention_mask.clone())?,
            ));
        }

        let voice = inputs.voice;
        let prompts = [
            (SEMANTIC_PROMPT, voice.map(|v| &v.semantic)),
            (COARSE_PROMPT, voice.map(|v| &v.coarse)),
            (FINE_PROMPT, voice.map(|v| &v.fine)),
        ];
        for (name, prompt) in prompts {
            if !self.input_names.contains(name) {
                continue;
            }
            let prompt = prompt.ok_or_else(|| BarkError::VoiceRequired(name.to_string()))?;
            feeds.push((name.to_string(), batched(prompt)?));
        }

        Ok(feeds)
    }

    /// Take an idle session if there is one, otherwise queue on the next in rotation.
    fn acquire(&self) -> Result<MutexGuard<'_, Session>, BarkError> {
        for slot in &self.sessions {
            if let Ok(guard) = slot.try_lock() {
                return Ok(guard);
            }
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        self.sessions[idx]
            .lock()
            .map_err(|_| BarkError::SessionPoisoned)
    }
}

fn batched(prompt: &PromptArray) -> Result<ArrayD<i64>, BarkError> {
    let mut shape = Vec::with_capacity(prompt.shape.len() + 1);
    shape.push(1);
    shape.extend_from_slice(&prompt.shape);
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), prompt.data.clone())?)
}

fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::with_capacity(2);
    #[cfg(feature = "cuda")]
    if device == Device::Cuda {
        use ort::execution_providers::CUDA as CUDAExecutionProvider;
        providers.push(CUDAExecutionProvider::default().build().error_on_failure());
    }
    #[cfg(not(feature = "cuda"))]
    let _ = device;
    providers.push(CPUExecutionProvider::default().build());
    providers
}

/// Initialize an ONNX session with optional on-disk graph caching.
///
/// Level3 graph optimization is the acceleration pass applied to every loaded
/// graph. With a cache path the optimized graph is serialised on first load and
/// read back at `Disable` afterwards, skipping the re-optimization.
fn init_session(
    onnx_path: &Path,
    device: Device,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, BarkError> {
    let providers = execution_providers(device);

    let (load_path, opt_level, write_cache) = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!(
                "Loading pre-optimized Bark graph from {} (skipping Level3)",
                cache.display()
            );
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!(
                "First load: running Level3 optimization; saving graph to {}",
                cache.display()
            );
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(opt_level)
        .map_err(ort::Error::from)?
        .with_execution_providers(providers)
        .map_err(ort::Error::from)?
        .with_parallel_execution(true)
        .map_err(ort::Error::from)?;

    if let Some(cache) = write_cache {
        builder = builder
            .with_optimized_model_path(cache)
            .map_err(ort::Error::from)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(ort::Error::from)?
            .with_inter_threads(threads)
            .map_err(ort::Error::from)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Detect the token input name ("input_ids" or "tokens") from the graph inputs.
fn detect_tokens_input(names: &HashSet<String>) -> String {
    ["input_ids", "tokens"]
        .into_iter()
        .find(|name| names.contains(*name))
        .unwrap_or("input_ids")
        .to_string()
}
