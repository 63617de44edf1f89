use super::traits::{DecodeOptions, EncodeOptions, TextTokenizer};
use crate::core::catalog::TokenizerKind;
use crate::core::Result;
use anyhow::Context;
use std::path::Path;

/// `tokenizer.json` backed tokenizer.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(kind: TokenizerKind, path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("failed to load tokenizer from {}", path.display()))?;

        if let Some(mask) = kind.mask_token() {
            if inner.token_to_id(mask).is_none() {
                anyhow::bail!("tokenizer {} has no {} token", path.display(), mask);
            }
        }

        Ok(Self { inner })
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode_with_options(&self, text: &str, options: &EncodeOptions) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, options.add_special_tokens)
            .map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode_with_options(&self, ids: &[u32], options: &DecodeOptions) -> Result<String> {
        self.inner
            .decode(ids, options.skip_special_tokens)
            .map_err(anyhow::Error::msg)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}
