//! Deterministic tokenizer and model doubles for unit tests.

use crate::core::model::{HeadModel, ModelMeta};
use crate::core::tokenizer::{DecodeOptions, EncodeOptions, TextTokenizer};
use crate::core::Result;
use candle_core::{Device, Tensor};
use std::collections::HashMap;

const SPECIAL: [&str; 4] = ["<|endoftext|>", "[MASK]", "[CLS]", "[SEP]"];

const WORDS: [&str; 17] = [
    "How", "are", "you", "y", "The", "cat", "sat", "on", "the", "mat", ".", "It", "was", "happy", "Hello",
    "##ou", "happy.",
];

/// One token per whitespace-separated word; periods are split off.
pub struct WordTokenizer {
    vocab: Vec<&'static str>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: SPECIAL.iter().chain(WORDS.iter()).copied().collect(),
        }
    }

    pub fn id(&self, word: &str) -> u32 {
        self.token_to_id(word)
            .unwrap_or_else(|| panic!("{word} is not in the test vocabulary"))
    }

    pub fn ids(&self, words: &[&str]) -> Vec<u32> {
        words.iter().map(|w| self.id(w)).collect()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

impl TextTokenizer for WordTokenizer {
    fn encode_with_options(&self, text: &str, options: &EncodeOptions) -> Result<Vec<u32>> {
        let mut ids = text
            .replace('.', " . ")
            .split_whitespace()
            .map(|word| {
                self.token_to_id(word)
                    .ok_or_else(|| anyhow::anyhow!("unknown word {word}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if options.add_special_tokens {
            ids.insert(0, self.id("[CLS]"));
            ids.push(self.id("[SEP]"));
        }
        Ok(ids)
    }

    fn decode_with_options(&self, ids: &[u32], options: &DecodeOptions) -> Result<String> {
        let words = ids
            .iter()
            .map(|&id| {
                self.vocab
                    .get(id as usize)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("unknown id {id}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let text = words
            .into_iter()
            .filter(|w| !(options.skip_special_tokens && SPECIAL.contains(w)))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text.replace(" .", "."))
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.iter().position(|w| *w == token).map(|i| i as u32)
    }
}

/// Predicts a fixed successor for each listed token. Unlisted tokens get flat
/// logits with the end-of-text token pushed far down.
pub struct ChainModel {
    next: HashMap<u32, u32>,
    vocab_size: usize,
    meta: ModelMeta,
}

impl ChainModel {
    pub fn new(tokenizer: &WordTokenizer, chain: &[(&str, &str)]) -> Self {
        let vocab_size = tokenizer.vocab_size();
        Self {
            next: chain
                .iter()
                .map(|(from, to)| (tokenizer.id(from), tokenizer.id(to)))
                .collect(),
            vocab_size,
            meta: ModelMeta {
                name: "chain".into(),
                architecture: "test".into(),
                context_length: 64,
                vocab_size,
            },
        }
    }

    pub fn with_context(mut self, context_length: usize) -> Self {
        self.meta.context_length = context_length;
        self
    }
}

impl HeadModel for ChainModel {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        let mut rows = Vec::with_capacity(input_ids.len() * self.vocab_size);
        for id in input_ids {
            let mut row = vec![0.0f32; self.vocab_size];
            row[0] = -20.0;
            if let Some(&next) = self.next.get(id) {
                row[next as usize] = 10.0;
            }
            rows.extend(row);
        }
        Ok(Tensor::from_vec(rows, (input_ids.len(), self.vocab_size), &Device::Cpu)?)
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }
}
