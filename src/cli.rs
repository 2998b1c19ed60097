//! Command-line arguments shared by the `script-tts` binaries.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::engines::bark::{BarkEngine, BarkModelParams, Device};
use crate::pipeline::{PipelineConfig, PipelineConfigBuilder, PipelineConfigBuilderError};
use crate::{BoxError, ModelSource, SynthesisEngine};

/// Where the Bark export lives and how to run it.
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model location: a local directory or hf://owner/name[@revision] holding
    /// model.onnx, tokenizer.json and speaker_embeddings/ (falls back to
    /// `SCRIPT_TTS_MODEL` when the flag is absent)
    #[arg(long, env = "SCRIPT_TTS_MODEL")]
    pub model: ModelSource,

    /// ONNX graph path relative to the model location
    #[arg(long, default_value = "model.onnx")]
    pub onnx_file: String,

    /// Compute device
    #[arg(long, value_enum, default_value_t = Device::Auto)]
    pub device: Device,

    /// Independent inference sessions (each holds a copy of the model)
    #[arg(long, default_value_t = 1)]
    pub instances: usize,

    /// CPU threads per inference session
    #[arg(long)]
    pub threads: Option<usize>,

    /// Where to cache the optimized ONNX graph between runs
    #[arg(long)]
    pub optimized_cache: Option<PathBuf>,
}

impl ModelArgs {
    pub fn model_params(&self) -> BarkModelParams {
        BarkModelParams {
            device: self.device,
            instances: self.instances,
            num_threads: self.threads,
            onnx_file: self.onnx_file.clone(),
            optimized_model_cache_path: self.optimized_cache.clone(),
        }
    }

    /// Load Bark from `--model`, logging where it came from and how long it took.
    pub fn load_engine(&self) -> Result<BarkEngine, BoxError> {
        let mut engine = BarkEngine::new();
        let start = Instant::now();
        engine.load_model_with_params(&self.model, self.model_params())?;
        log::info!(
            "Model loaded from {} in {:.2?} (device: {}, sample rate: {} Hz)",
            self.model,
            start.elapsed(),
            engine.device().unwrap_or_default(),
            engine.sample_rate()
        );
        Ok(engine)
    }
}

/// Worker pool and output layout of a pipeline run.
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Sentences synthesized concurrently (defaults to the number of CPUs)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Sample rate written to the WAV header (defaults to the model's rate)
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Silence between sentences, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub gap_ms: u64,
}

impl PipelineArgs {
    pub fn config(&self, show_progress: bool) -> Result<PipelineConfig, PipelineConfigBuilderError> {
        let mut builder = PipelineConfigBuilder::default();
        builder
            .silence_gap(Duration::from_millis(self.gap_ms))
            .show_progress(show_progress);
        if let Some(jobs) = self.jobs {
            builder.jobs(jobs);
        }
        if let Some(rate) = self.sample_rate {
            builder.output_sample_rate(rate);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelArgs, PipelineArgs};
    use crate::engines::bark::Device;
    use crate::ModelSource;
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    }

    #[test]
    fn model_flags_map_onto_params() {
        let cli = TestCli::try_parse_from([
            "test",
            "--model",
            "hf://acme/bark-onnx@v1",
            "--device",
            "cpu",
            "--instances",
            "3",
            "--threads",
            "2",
            "--onnx-file",
            "onnx/bark.onnx",
            "--optimized-cache",
            "/tmp/bark.opt.onnx",
        ])
        .expect("parse");

        assert_eq!(
            cli.model.model,
            ModelSource::Hub {
                repo_id: "acme/bark-onnx".to_string(),
                revision: Some("v1".to_string()),
            }
        );
        let params = cli.model.model_params();
        assert_eq!(params.device, Device::Cpu);
        assert_eq!(params.instances, 3);
        assert_eq!(params.num_threads, Some(2));
        assert_eq!(params.onnx_file, "onnx/bark.onnx");
        assert_eq!(
            params.optimized_model_cache_path,
            Some(PathBuf::from("/tmp/bark.opt.onnx"))
        );
    }

    #[test]
    fn pipeline_flags_build_config() {
        let cli = TestCli::try_parse_from([
            "test",
            "--model",
            "models/bark",
            "--jobs",
            "4",
            "--sample-rate",
            "22050",
            "--gap-ms",
            "350",
        ])
        .expect("parse");

        let config = cli.pipeline.config(false).expect("config");
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.output_sample_rate, Some(22_050));
        assert_eq!(config.silence_gap, Duration::from_millis(350));
        assert!(!config.show_progress);
    }

    #[test]
    fn pipeline_defaults_leave_rate_and_jobs_open() {
        let cli = TestCli::try_parse_from(["test", "--model", "models/bark"]).expect("parse");

        let config = cli.pipeline.config(true).expect("config");
        assert_eq!(config.jobs, None);
        assert_eq!(config.output_sample_rate, None);
        assert_eq!(config.silence_gap, Duration::from_millis(200));
        assert!(config.show_progress);
    }
}
