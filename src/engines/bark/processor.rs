use std::path::Path;

use tokenizers::Tokenizer;

use super::model::BarkError;
use super::voices::VoicePreset;

/// Token window Bark conditions on; longer sentences are truncated.
pub const MAX_INPUT_LENGTH: usize = 256;

/// Id used to right-pad `input_ids` up to [`MAX_INPUT_LENGTH`].
const PAD_TOKEN_ID: i64 = 0;

/// Model-ready inputs for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct BarkInputs<'a> {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub voice: Option<&'a VoicePreset>,
}

/// Turns sentence text (plus an optional voice preset) into [`BarkInputs`].
pub struct BarkProcessor {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl BarkProcessor {
    /// Load the processor from a `tokenizer.json` file.
    pub fn load(tokenizer_path: &Path) -> Result<Self, BarkError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| BarkError::Tokenizer(format!("{}: {e}", tokenizer_path.display())))?;
        Ok(Self::from_tokenizer(tokenizer))
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            max_length: MAX_INPUT_LENGTH,
        }
    }

    /// Tokenize `text` without special tokens and fit it to the fixed window.
    pub fn encode<'a>(
        &self,
        text: &str,
        voice: Option<&'a VoicePreset>,
    ) -> Result<BarkInputs<'a>, BarkError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| BarkError::Tokenizer(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();

        if ids.len() > self.max_length {
            log::warn!(
                "Sentence has {} tokens; truncating to {}",
                ids.len(),
                self.max_length
            );
        }

        let (input_ids, attention_mask) = fit_to_window(ids, self.max_length);
        Ok(BarkInputs {
            input_ids,
            attention_mask,
            voice,
        })
    }
}

/// Truncate or right-pad `ids` to exactly `max_length`, returning ids and mask.
fn fit_to_window(mut ids: Vec<i64>, max_length: usize) -> (Vec<i64>, Vec<i64>) {
    ids.truncate(max_length);
    let real = ids.len();
    ids.resize(max_length, PAD_TOKEN_ID);

    let mut mask = vec![1i64; real];
    mask.resize(max_length, 0);
    (ids, mask)
}
