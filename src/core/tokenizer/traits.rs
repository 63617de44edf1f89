use crate::core::Result;

/// Tokenizer capability consumed by the completion strategies.
pub trait TextTokenizer: Send + Sync {
    fn encode_with_options(&self, text: &str, options: &EncodeOptions) -> Result<Vec<u32>>;
    fn decode_with_options(&self, ids: &[u32], options: &DecodeOptions) -> Result<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.encode_with_options(text, &EncodeOptions::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub add_special_tokens: bool,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_special(mut self) -> Self {
        self.add_special_tokens = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub skip_special_tokens: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_special(mut self) -> Self {
        self.skip_special_tokens = true;
        self
    }
}
