use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use script_tts::pipeline::{
    self, assemble, silence_samples, PipelineConfig, PipelineConfigBuilder, PipelineError,
};
use script_tts::{BoxError, ModelSource, SynthesisEngine, SynthesisResult};

/// Deterministic engine for sentences of the form `S<n>.`.
///
/// Sentence `n` yields `n` samples of value `n`. By default lower-numbered
/// sentences sleep longer, so workers finish in roughly reverse order;
/// `with_delays` replaces that schedule.
struct StubEngine {
    rate: u32,
    result_rate: u32,
    fail_on: Option<usize>,
    delays_ms: Option<Vec<u64>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StubEngine {
    fn new(rate: u32) -> Self {
        Self {
            rate,
            result_rate: rate,
            fail_on: None,
            delays_ms: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Sleep `delays_ms[n - 1]` milliseconds on sentence `n`.
    fn with_delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.delays_ms = Some(delays_ms);
        self
    }

    fn delay_for(&self, n: usize) -> Duration {
        let ms = match &self.delays_ms {
            Some(delays) => delays.get(n.saturating_sub(1)).copied().unwrap_or(0),
            None => 5 * 12u64.saturating_sub(n as u64),
        };
        Duration::from_millis(ms)
    }
}

impl SynthesisEngine for StubEngine {
    type SynthesisParams = ();
    type ModelParams = ();

    fn load_model_with_params(&mut self, _: &ModelSource, _: ()) -> Result<(), BoxError> {
        Ok(())
    }

    fn unload_model(&mut self) {}

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn synthesize(&self, text: &str, _: &()) -> Result<SynthesisResult, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let n: usize = text
            .trim_start_matches('S')
            .trim_end_matches('.')
            .parse()
            .map_err(|e| format!("unexpected sentence {text:?}: {e}"))?;
        thread::sleep(self.delay_for(n));
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on == Some(n) {
            return Err(format!("stub failure on sentence {n}").into());
        }
        Ok(SynthesisResult {
            samples: vec![n as f32; n],
            sample_rate: self.result_rate,
        })
    }
}

fn script(count: usize) -> String {
    (1..=count)
        .map(|n| format!("S{n}."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn expected_audio(count: usize, silence_len: usize) -> Vec<f32> {
    let clips: Vec<Vec<f32>> = (1..=count).map(|n| vec![n as f32; n]).collect();
    assemble(&clips, &vec![0.0; silence_len])
}

fn config(jobs: usize) -> PipelineConfig {
    PipelineConfigBuilder::default()
        .jobs(jobs)
        .build()
        .expect("config")
}

#[test]
fn output_follows_sentence_order_not_completion_order() {
    let engine = StubEngine::new(100);
    let audio = pipeline::synthesize_script(&engine, &script(10), &(), &config(4))
        .expect("synthesize");

    // 200 ms at 100 Hz
    assert_eq!(audio.samples, expected_audio(10, 20));
    assert_eq!(audio.sample_rate, 100);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 10);
}

#[test]
fn order_holds_under_shuffled_completion_times() {
    for seed in [7, 42, 1234, 2026] {
        let mut delays: Vec<u64> = (0..12).map(|i| i * 3).collect();
        delays.shuffle(&mut StdRng::seed_from_u64(seed));

        let engine = StubEngine::new(100).with_delays(delays.clone());
        let audio = pipeline::synthesize_script(&engine, &script(12), &(), &config(5))
            .expect("synthesize");

        assert_eq!(audio.samples, expected_audio(12, 20), "seed {seed}, delays {delays:?}");
    }
}

#[test]
fn sentence_clips_come_back_in_input_order() {
    let engine = StubEngine::new(100);
    let sentences: Vec<String> = (1..=6).map(|n| format!("S{n}.")).collect();
    let clips = pipeline::synthesize_sentences(&engine, &sentences, &(), &config(6))
        .expect("synthesize");

    let lengths: Vec<usize> = clips.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn empty_script_gives_empty_audio() {
    let engine = StubEngine::new(24_000);
    let audio = pipeline::synthesize_script(&engine, "   ", &(), &PipelineConfig::default())
        .expect("synthesize");

    assert!(audio.samples.is_empty());
    assert_eq!(audio.sample_rate, 24_000);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn single_sentence_has_no_silence() {
    let engine = StubEngine::new(24_000);
    let audio = pipeline::synthesize_script(&engine, "S3.", &(), &PipelineConfig::default())
        .expect("synthesize");

    assert_eq!(audio.samples, vec![3.0, 3.0, 3.0]);
}

#[test]
fn any_failed_sentence_fails_the_run() {
    let engine = StubEngine::new(100).failing_on(5);
    let err = pipeline::synthesize_script(&engine, &script(8), &(), &config(3)).unwrap_err();

    match err {
        PipelineError::Synthesis { index, source } => {
            assert_eq!(index, 4);
            assert!(source.to_string().contains("stub failure on sentence 5"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn worker_pool_size_bounds_concurrency() {
    let engine = StubEngine::new(100);
    pipeline::synthesize_script(&engine, &script(8), &(), &config(2)).expect("synthesize");

    let peak = engine.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency {peak} exceeded pool size");
}

#[test]
fn single_worker_still_preserves_order() {
    let engine = StubEngine::new(100);
    let audio = pipeline::synthesize_script(&engine, &script(4), &(), &config(1))
        .expect("synthesize");

    assert_eq!(audio.samples, expected_audio(4, 20));
    assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn clip_at_wrong_sample_rate_is_rejected() {
    let mut engine = StubEngine::new(24_000);
    engine.result_rate = 22_050;
    let err = pipeline::synthesize_script(&engine, "S1.", &(), &PipelineConfig::default())
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::SampleRateMismatch {
            index: 0,
            expected: 24_000,
            actual: 22_050,
        }
    ));
}

#[test]
fn output_rate_override_only_changes_the_header() {
    let engine = StubEngine::new(100);
    let config = PipelineConfigBuilder::default()
        .output_sample_rate(50)
        .silence_gap(Duration::from_millis(100))
        .build()
        .expect("config");
    let audio = pipeline::synthesize_script(&engine, "S1. S2.", &(), &config).expect("synthesize");

    assert_eq!(audio.sample_rate, 50);
    // 100 ms at the engine's 100 Hz
    assert_eq!(audio.samples, expected_audio(2, 10));
    assert_eq!(silence_samples(100, config.silence_gap).len(), 10);
}

#[test]
fn legacy_header_rate_keeps_native_silence_length() {
    let engine = StubEngine::new(24_000);
    let config = PipelineConfigBuilder::default()
        .output_sample_rate(22_050)
        .build()
        .expect("config");
    let audio = pipeline::synthesize_script(&engine, "S1. S2.", &(), &config).expect("synthesize");

    assert_eq!(audio.sample_rate, 22_050);
    assert_eq!(audio.samples.len(), 1 + 4_800 + 2);
    assert_eq!(audio.samples, expected_audio(2, 4_800));
}

#[test]
fn writes_wav_with_normalized_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = StubEngine::new(22_050);
    let audio = pipeline::synthesize_script(&engine, &script(3), &(), &config(2))
        .expect("synthesize");

    let target = dir.path().join("narration");
    let path = pipeline::write_output(&audio, target.to_str().expect("utf-8 path"))
        .expect("write");
    assert_eq!(path, dir.path().join("narration.wav"));

    let mut reader = hound::WavReader::open(&path).expect("open");
    assert_eq!(reader.spec().sample_rate, 22_050);
    assert_eq!(reader.spec().channels, 1);
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.expect("sample")).collect();
    assert_eq!(samples, expected_audio(3, 4_410));
}

#[test]
fn write_errors_surface_as_wav_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = SynthesisResult {
        samples: vec![0.0; 4],
        sample_rate: 24_000,
    };
    let target = dir.path().join("no_such_dir").join("out.WAV");
    let err = pipeline::write_output(&audio, target.to_str().expect("utf-8 path")).unwrap_err();

    assert!(matches!(err, PipelineError::Wav(hound::Error::IoError(_))));
}
