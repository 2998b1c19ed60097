//! Speech synthesis engines.
//!
//! This module contains implementations of text-to-speech engines.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `bark` - Bark TTS (ONNX export, hub-hosted voice presets). Enabled by default.
//! - `cuda` - Bark with the CUDA execution provider compiled in

#[cfg(feature = "bark")]
pub mod bark;
