//! Script-to-audio pipeline: split, synthesize in parallel, stitch, write.
//!
//! ```text
//! script ──split──▶ sentences ──worker pool──▶ clips (index-tagged)
//!                                               │ restore order
//!                                               ▼
//!            clip₀ ⊕ gap ⊕ clip₁ ⊕ gap ⊕ … ⊕ clipₙ₋₁ ──▶ WAV
//! ```

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::splitter::split_sentences;
use crate::{BoxError, SynthesisEngine, SynthesisResult};

/// Silence inserted between consecutive sentences.
pub const DEFAULT_SILENCE_GAP: Duration = Duration::from_millis(200);

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Synthesis failed for sentence {index}: {source}")]
    Synthesis { index: usize, source: BoxError },
    #[error("Sentence {index} was synthesized at {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to write WAV file: {0}")]
    Wav(#[from] hound::Error),
}

/// Knobs for a pipeline run.
///
/// ```
/// use script_tts::pipeline::PipelineConfigBuilder;
///
/// let config = PipelineConfigBuilder::default().jobs(2).build().unwrap();
/// assert_eq!(config.jobs, Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default)]
pub struct PipelineConfig {
    /// Worker-pool size. `None` (or zero) uses the available parallelism.
    #[builder(setter(strip_option))]
    pub jobs: Option<usize>,
    /// Silence between consecutive sentences.
    pub silence_gap: Duration,
    /// Sample rate written to the WAV header. `None` uses the engine's native rate.
    /// Samples and silence are never resampled, so they stay at the native rate.
    #[builder(setter(strip_option))]
    pub output_sample_rate: Option<u32>,
    /// Draw a progress bar on stderr while sentences are synthesized.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            silence_gap: DEFAULT_SILENCE_GAP,
            output_sample_rate: None,
            show_progress: false,
        }
    }
}

/// Zero-valued buffer lasting `gap` at `sample_rate` (rounded down to whole samples).
pub fn silence_samples(sample_rate: u32, gap: Duration) -> Vec<f32> {
    let len = gap.as_nanos() * u128::from(sample_rate) / 1_000_000_000;
    vec![0.0; len as usize]
}

/// Concatenate clips in order with `silence` between each consecutive pair.
pub fn assemble(clips: &[Vec<f32>], silence: &[f32]) -> Vec<f32> {
    let gaps = clips.len().saturating_sub(1);
    let total = clips.iter().map(Vec::len).sum::<usize>() + gaps * silence.len();

    let mut audio = Vec::with_capacity(total);
    for (i, clip) in clips.iter().enumerate() {
        if i > 0 {
            audio.extend_from_slice(silence);
        }
        audio.extend_from_slice(clip);
    }
    audio
}

/// Append `.wav` unless `filename` already ends with it (in any case).
pub fn ensure_wav_extension(filename: &str) -> String {
    if filename.to_lowercase().ends_with(".wav") {
        filename.to_string()
    } else {
        format!("{filename}.wav")
    }
}

/// Synthesize every sentence on a dedicated worker pool.
///
/// Returns one clip per sentence in input order, whatever order the workers
/// finish in. The first failing sentence aborts the run; no partial output
/// is returned.
pub fn synthesize_sentences<E>(
    engine: &E,
    sentences: &[String],
    params: &E::SynthesisParams,
    config: &PipelineConfig,
) -> Result<Vec<Vec<f32>>, PipelineError>
where
    E: SynthesisEngine + Sync,
    E::SynthesisParams: Sync,
{
    if sentences.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs.unwrap_or(0))
        .thread_name(|i| format!("tts-worker-{i}"))
        .build()?;
    log::info!(
        "Synthesizing {} sentences on {} workers",
        sentences.len(),
        pool.current_num_threads()
    );

    let progress = progress_bar(sentences.len(), config.show_progress);
    run_on_pool(engine, sentences, params, &pool, &progress)
}

fn run_on_pool<E>(
    engine: &E,
    sentences: &[String],
    params: &E::SynthesisParams,
    pool: &rayon::ThreadPool,
    progress: &ProgressBar,
) -> Result<Vec<Vec<f32>>, PipelineError>
where
    E: SynthesisEngine + Sync,
    E::SynthesisParams: Sync,
{
    let expected = engine.sample_rate();
    let collected: Result<Vec<(usize, Vec<f32>)>, PipelineError> = pool.install(|| {
        sentences
            .par_iter()
            .enumerate()
            .map(|(index, sentence)| {
                log::debug!("Sentence {index}: {sentence:?}");
                let result = engine
                    .synthesize(sentence, params)
                    .map_err(|source| PipelineError::Synthesis { index, source })?;
                if result.sample_rate != expected {
                    return Err(PipelineError::SampleRateMismatch {
                        index,
                        expected,
                        actual: result.sample_rate,
                    });
                }
                if result.samples.is_empty() {
                    log::warn!("Sentence {index} produced no audio: {sentence:?}");
                }
                progress.inc(1);
                Ok((index, result.samples))
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut tagged = collected?;
    tagged.sort_unstable_by_key(|(index, _)| *index);
    Ok(tagged.into_iter().map(|(_, clip)| clip).collect())
}

/// Run the whole pipeline on `script` and return the stitched audio.
pub fn synthesize_script<E>(
    engine: &E,
    script: &str,
    params: &E::SynthesisParams,
    config: &PipelineConfig,
) -> Result<SynthesisResult, PipelineError>
where
    E: SynthesisEngine + Sync,
    E::SynthesisParams: Sync,
{
    let sentences = split_sentences(script);
    log::info!("Split script into {} sentences", sentences.len());

    let clips = synthesize_sentences(engine, &sentences, params, config)?;

    let native_rate = engine.sample_rate();
    let sample_rate = config.output_sample_rate.unwrap_or(native_rate);
    if sample_rate != native_rate {
        log::warn!(
            "Writing {sample_rate} Hz header for {native_rate} Hz audio; playback speed and pitch will shift"
        );
    }

    let silence = silence_samples(native_rate, config.silence_gap);
    Ok(SynthesisResult {
        samples: assemble(&clips, &silence),
        sample_rate,
    })
}

/// Write `audio` to `filename` (with `.wav` appended if missing) and return the final path.
pub fn write_output(audio: &SynthesisResult, filename: &str) -> Result<PathBuf, PipelineError> {
    let path = PathBuf::from(ensure_wav_extension(filename));
    audio.write_wav(&path)?;
    log::info!(
        "Wrote {:.2}s of audio to {}",
        audio.duration_secs(),
        path.display()
    );
    Ok(path)
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} Synthesizing [{wide_bar:.cyan/blue}] {pos}/{len} sentences ({eta})",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
