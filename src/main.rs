//! `script-tts` - narrate a text script into a WAV file with Bark.
//!
//! Usage:
//!   script-tts "Hello there. How are you today?" greeting --model models/bark
//!   SCRIPT_TTS_MODEL=models/bark script-tts - chapter1.wav --voice_preset v2/en_speaker_9 --jobs 2 < chapter1.txt

use std::io::Read;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use script_tts::cli::{ModelArgs, PipelineArgs};
use script_tts::engines::bark::DEFAULT_VOICE_PRESET;
use script_tts::pipeline;
use script_tts::splitter::clean_script;
use script_tts::BoxError;

#[derive(Parser, Debug)]
#[command(name = "script-tts", version)]
#[command(about = "Generate audio from text using Bark", long_about = None)]
struct Cli {
    /// The script text to convert into speech (`-` reads it from stdin)
    script: String,

    /// The output filename for the generated WAV file
    output_filename: String,

    /// The voice preset to use for generating speech (name or local .npz file)
    #[arg(long = "voice_preset", visible_alias = "voice-preset", default_value = DEFAULT_VOICE_PRESET)]
    voice_preset: String,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Decode HTML entities and collapse whitespace before splitting
    #[arg(long)]
    clean_text: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> ExitCode {
    script_tts::log_builder().init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BoxError> {
    log::info!("script-tts {}", env!("CARGO_PKG_VERSION"));

    let mut script = read_script(&cli.script)?;
    if cli.clean_text {
        script = clean_script(&script);
    }

    let engine = cli.model.load_engine()?;
    let params = engine.voice_params(&cli.voice_preset)?;
    let config = cli.pipeline.config(!cli.no_progress)?;

    let synth_start = Instant::now();
    let audio = pipeline::synthesize_script(&engine, &script, &params, &config)?;
    log::info!(
        "Synthesized {:.2}s of audio in {:.2?}",
        audio.duration_secs(),
        synth_start.elapsed()
    );

    let path = pipeline::write_output(&audio, &cli.output_filename)?;
    println!("Audio written to {}", path.display());
    Ok(())
}

fn read_script(arg: &str) -> std::io::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut script = String::new();
    std::io::stdin().read_to_string(&mut script)?;
    Ok(script)
}
