use super::fragment::{last_word, strip_prefix_ignore_case, without_last_word};
use crate::core::catalog::TokenizerKind;
use crate::core::model::{argmax, HeadModel};
use crate::core::tokenizer::{DecodeOptions, EncodeOptions, TextTokenizer};
use crate::core::Result;
use anyhow::anyhow;

/// Token ids ready for a forward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedInput {
    pub ids: Vec<u32>,
    /// Position whose logits carry the prediction.
    pub target: usize,
    /// Text a decoded continuation has to start with.
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    NextToken,
    MaskFill,
}

impl CompletionKind {
    pub fn from_needs_mask(needs_mask: bool) -> Self {
        if needs_mask {
            CompletionKind::MaskFill
        } else {
            CompletionKind::NextToken
        }
    }

    pub fn strategy(self, tokenizer: TokenizerKind) -> Result<Box<dyn CompletionStrategy>> {
        Ok(match self {
            CompletionKind::NextToken => Box::new(NextTokenStrategy::new(tokenizer.start_token())),
            CompletionKind::MaskFill => {
                let mask = tokenizer
                    .mask_token()
                    .ok_or_else(|| anyhow!("{:?} tokenizers have no mask token", tokenizer))?;
                Box::new(MaskFillStrategy::new(mask))
            }
        })
    }
}

/// How a model turns caller text into a completion.
pub trait CompletionStrategy: Send + Sync {
    fn kind(&self) -> CompletionKind;

    /// Tokenizes `text` into at most `context_limit` ids.
    fn frame(&self, text: &str, tokenizer: &dyn TextTokenizer, context_limit: usize) -> Result<FramedInput>;

    /// Runs one forward pass and decodes the raw prediction.
    fn predict(&self, input: &FramedInput, model: &dyn HeadModel, tokenizer: &dyn TextTokenizer) -> Result<String>;

    /// The part of `prediction` to append to `text`, or `None` when the
    /// prediction does not line up with the text.
    fn extract_fragment(&self, text: &str, input: &FramedInput, prediction: &str) -> Option<String>;
}

/// Left-to-right models: predict the token after the text.
pub struct NextTokenStrategy {
    start_token: &'static str,
}

impl NextTokenStrategy {
    pub fn new(start_token: &'static str) -> Self {
        Self { start_token }
    }
}

impl CompletionStrategy for NextTokenStrategy {
    fn kind(&self) -> CompletionKind {
        CompletionKind::NextToken
    }

    fn frame(&self, text: &str, tokenizer: &dyn TextTokenizer, context_limit: usize) -> Result<FramedInput> {
        let trimmed = text.trim_end();
        let mut ids = tokenizer.encode(trimmed)?;
        if ids.is_empty() {
            let start = tokenizer
                .token_to_id(self.start_token)
                .ok_or_else(|| anyhow!("tokenizer has no {} token", self.start_token))?;
            ids.push(start);
        }

        let context_limit = context_limit.max(1);
        let reference = if ids.len() > context_limit {
            let dropped = ids.len() - context_limit;
            ids.drain(..dropped);
            tracing::debug!("dropped {} leading tokens to fit a context of {}", dropped, context_limit);
            let window = tokenizer.decode_with_options(&ids, &DecodeOptions::new().skip_special())?;
            format!("{}{}", window, &text[trimmed.len()..])
        } else {
            text.to_string()
        };

        Ok(FramedInput {
            target: ids.len() - 1,
            ids,
            reference,
        })
    }

    fn predict(&self, input: &FramedInput, model: &dyn HeadModel, tokenizer: &dyn TextTokenizer) -> Result<String> {
        let logits = model.logits_at(&input.ids, input.target)?;
        let next = argmax(&logits).ok_or_else(|| anyhow!("model returned no logits"))?;

        let mut ids = input.ids.clone();
        ids.push(next);
        tokenizer.decode_with_options(&ids, &DecodeOptions::new().skip_special())
    }

    fn extract_fragment(&self, _text: &str, input: &FramedInput, prediction: &str) -> Option<String> {
        strip_prefix_ignore_case(prediction, &input.reference).map(str::to_string)
    }
}

/// Bidirectional models: replace the word being typed with a mask and fill it.
pub struct MaskFillStrategy {
    mask_token: &'static str,
}

impl MaskFillStrategy {
    pub fn new(mask_token: &'static str) -> Self {
        Self { mask_token }
    }
}

impl CompletionStrategy for MaskFillStrategy {
    fn kind(&self) -> CompletionKind {
        CompletionKind::MaskFill
    }

    fn frame(&self, text: &str, tokenizer: &dyn TextTokenizer, context_limit: usize) -> Result<FramedInput> {
        let mask_id = tokenizer
            .token_to_id(self.mask_token)
            .ok_or_else(|| anyhow!("tokenizer has no {} token", self.mask_token))?;

        let prefix = without_last_word(text);
        let sentence = if prefix.is_empty() {
            format!("{}.", self.mask_token)
        } else {
            format!("{} {}.", prefix, self.mask_token)
        };
        let mut ids = tokenizer.encode_with_options(&sentence, &EncodeOptions::new().with_special())?;

        // Keep the leading special token and the most recent tail.
        if ids.len() > context_limit && context_limit > 1 {
            let dropped = ids.len() - context_limit;
            ids.drain(1..1 + dropped);
            tracing::debug!("dropped {} tokens to fit a context of {}", dropped, context_limit);
        }

        let target = ids
            .iter()
            .rposition(|&id| id == mask_id)
            .ok_or_else(|| anyhow!("{} did not survive tokenization", self.mask_token))?;

        Ok(FramedInput {
            ids,
            target,
            reference: text.to_string(),
        })
    }

    fn predict(&self, input: &FramedInput, model: &dyn HeadModel, tokenizer: &dyn TextTokenizer) -> Result<String> {
        let logits = model.logits_at(&input.ids, input.target)?;
        let predicted = argmax(&logits).ok_or_else(|| anyhow!("model returned no logits"))?;

        let token = tokenizer.decode_with_options(&[predicted], &DecodeOptions::new().skip_special())?;
        let token = token.trim();
        let token = token.strip_prefix("##").unwrap_or(token);
        Ok(token.strip_suffix('.').unwrap_or(token).to_string())
    }

    fn extract_fragment(&self, text: &str, _input: &FramedInput, prediction: &str) -> Option<String> {
        let word = last_word(text);
        match strip_prefix_ignore_case(prediction, word) {
            Some(rest) => Some(rest.to_string()),
            None if word == " " => Some(prediction.to_string()),
            None => None,
        }
    }
}
