use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::{GptBotError, Result};
use crate::model::Message;

const PER_MESSAGE_OVERHEAD: usize = 4;
const REPLY_PRIMING_OVERHEAD: usize = 2;

/// Maps text to the number of model tokens it encodes to.
pub trait Tokenizer {
    fn count(&self, text: &str) -> usize;
}

pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Picks the encoding registered for `model`, falling back to `cl100k_base`.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(err) => {
                debug!(model = %model, error = %err, "no model-specific encoding, using cl100k_base");
                tiktoken_rs::cl100k_base().map_err(tokenizer_load_error)?
            }
        };
        Ok(Self { bpe })
    }
}

fn tokenizer_load_error(err: anyhow::Error) -> GptBotError {
    GptBotError::file_with("Failed to load tokenizer encoding data", err)
}

impl Tokenizer for TiktokenCounter {
    /// Special-token markers in prompt text are counted as plain text, as the provider does.
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// How prompt tokens are tallied before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TokenAccounting {
    /// Per-message overhead plus reply priming, matching the provider's own accounting.
    #[default]
    Strict,
    /// Plain sum of content token counts.
    Simplified,
}

impl TokenAccounting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Simplified => "simplified",
        }
    }

    pub fn tokens_consumed(&self, tokenizer: &dyn Tokenizer, messages: &[Message]) -> usize {
        match self {
            Self::Strict => {
                let per_message: usize = messages
                    .iter()
                    .map(|message| {
                        let tokens = PER_MESSAGE_OVERHEAD + tokenizer.count(&message.content);
                        if message.has_name() { tokens - 1 } else { tokens }
                    })
                    .sum();
                per_message + REPLY_PRIMING_OVERHEAD
            }
            Self::Simplified => messages
                .iter()
                .map(|message| tokenizer.count(&message.content))
                .sum(),
        }
    }
}

/// Generation allowance left once the prompt is paid for.
///
/// A prompt that leaves nothing to generate is rejected before any request goes out.
pub fn remaining_budget(max_tokens: usize, consumed: usize) -> Result<usize> {
    match max_tokens.checked_sub(consumed) {
        Some(remaining) if remaining >= 1 => Ok(remaining),
        _ => Err(GptBotError::validation(format!(
            "Prompt uses {consumed} tokens, leaving no room within max tokens ({max_tokens})"
        ))),
    }
}
