use std::path::PathBuf;
use std::time::Instant;

use script_tts::{
    engines::bark::{BarkEngine, BarkModelParams},
    pipeline::{self, PipelineConfigBuilder},
    BoxError, ModelSource, SynthesisEngine,
};

fn main() -> Result<(), BoxError> {
    script_tts::log_builder().init();

    let mut engine = BarkEngine::new();
    let source = ModelSource::Local(PathBuf::from("models/bark"));

    let load_start = Instant::now();
    engine.load_model_with_params(&source, BarkModelParams::default())?;
    println!("Model loaded in {:.2?}", load_start.elapsed());

    println!("Available voices: {:?}", engine.list_voices()?);

    let params = engine.voice_params("v2/en_speaker_6")?;

    let script = "Hello! This is Bark, reading a short script. \
                  Every sentence is generated on its own worker. \
                  The clips are then stitched back together in order.";

    let config = PipelineConfigBuilder::default()
        .jobs(2)
        .show_progress(true)
        .build()?;

    let synth_start = Instant::now();
    let result = pipeline::synthesize_script(&engine, script, &params, &config)?;
    let synth_dur = synth_start.elapsed();

    let speedup = result.duration_secs() / synth_dur.as_secs_f64();
    println!(
        "Synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
        result.duration_secs(),
        synth_dur,
        speedup
    );

    let path = pipeline::write_output(&result, "output")?;
    println!("Saved to {}", path.display());

    engine.unload_model();
    Ok(())
}
