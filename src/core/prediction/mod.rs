pub mod fragment;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use fragment::{format_fragment, normalize_input, truncate_at_last_period, NBSP};
pub use strategy::{CompletionKind, CompletionStrategy, FramedInput, MaskFillStrategy, NextTokenStrategy};

use crate::core::catalog::{ModelIdentifier, TokenizerKind};
use crate::core::error::PredictionError;
use crate::core::generation::{BeamSearch, GenerationConfig};
use crate::core::model::HeadModel;
use crate::core::tokenizer::{DecodeOptions, TextTokenizer};
use crate::core::Result;
use std::sync::Arc;

/// A loaded tokenizer and model pair serving completions for one catalog entry.
///
/// Nothing is mutated after construction, so a shared instance answers
/// concurrent requests.
pub struct PredictionModel {
    id: ModelIdentifier,
    tokenizer: Arc<dyn TextTokenizer>,
    model: Box<dyn HeadModel>,
    strategy: Box<dyn CompletionStrategy>,
    generation: GenerationConfig,
    eos: Option<u32>,
}

impl PredictionModel {
    pub fn new(
        id: ModelIdentifier,
        tokenizer: Arc<dyn TextTokenizer>,
        model: Box<dyn HeadModel>,
        tokenizer_kind: TokenizerKind,
        needs_mask: bool,
    ) -> Result<Self> {
        let strategy = CompletionKind::from_needs_mask(needs_mask).strategy(tokenizer_kind)?;
        if let Some(mask) = tokenizer_kind.mask_token().filter(|_| needs_mask) {
            if tokenizer.token_to_id(mask).is_none() {
                anyhow::bail!("{} tokenizer has no {} token", id, mask);
            }
        }
        let eos = if needs_mask {
            None
        } else {
            tokenizer.token_to_id(tokenizer_kind.start_token())
        };

        Ok(Self {
            id,
            tokenizer,
            model,
            strategy,
            generation: GenerationConfig::default(),
            eos,
        })
    }

    pub fn with_strategy(mut self, strategy: Box<dyn CompletionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn id(&self) -> ModelIdentifier {
        self.id
    }

    pub fn needs_mask(&self) -> bool {
        self.strategy.kind() == CompletionKind::MaskFill
    }

    /// Suggests the next word, or the rest of the word being typed.
    ///
    /// Best effort: anything that goes wrong yields an empty fragment.
    pub fn get_prediction(&self, text: &str) -> String {
        let text = normalize_input(text);
        match self.predict_fragment(&text) {
            Ok(Some(fragment)) => format_fragment(&fragment),
            Ok(None) => {
                tracing::debug!("{} prediction does not extend {:?}", self.id, text);
                String::new()
            }
            Err(e) => {
                tracing::warn!("{} prediction failed: {:#}", self.id, e);
                String::new()
            }
        }
    }

    fn predict_fragment(&self, text: &str) -> Result<Option<String>> {
        let tokenizer = self.tokenizer.as_ref();
        let input = self.strategy.frame(text, tokenizer, self.model.max_positions())?;
        let prediction = self.strategy.predict(&input, self.model.as_ref(), tokenizer)?;
        Ok(self.strategy.extract_fragment(text, &input, &prediction))
    }

    /// Continues `text` up to the end of a sentence with beam search.
    pub fn get_full_prediction(&self, text: &str) -> std::result::Result<String, PredictionError> {
        if self.strategy.kind() != CompletionKind::NextToken {
            return Err(PredictionError::SentenceCompletionUnsupported(self.id));
        }

        let text = normalize_input(text);
        Ok(match self.complete_sentence(&text) {
            Ok(Some(continuation)) => format_fragment(truncate_at_last_period(&continuation)),
            Ok(None) => {
                tracing::debug!("{} sentence does not extend {:?}", self.id, text);
                String::new()
            }
            Err(e) => {
                tracing::warn!("{} sentence completion failed: {:#}", self.id, e);
                String::new()
            }
        })
    }

    fn complete_sentence(&self, text: &str) -> Result<Option<String>> {
        let tokenizer = self.tokenizer.as_ref();
        let max_positions = self.model.max_positions();
        let context_limit = max_positions.saturating_sub(self.generation.max_new_tokens);
        let input = self.strategy.frame(text, tokenizer, context_limit)?;

        // The caller's character count sets the token budget; the prompt
        // always gets room for at least one new token.
        let max_length = (text.chars().count() + self.generation.max_new_tokens)
            .max(input.ids.len() + 1)
            .min(max_positions);
        let output = BeamSearch::new(self.model.as_ref(), &self.generation, self.eos)
            .generate(&input.ids, max_length)?;
        let decoded = tokenizer.decode_with_options(&output, &DecodeOptions::new().skip_special())?;

        Ok(self.strategy.extract_fragment(text, &input, &decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ChainModel, WordTokenizer};
    use super::*;

    fn causal(chain: &[(&str, &str)]) -> PredictionModel {
        let tokenizer = WordTokenizer::new();
        let model = ChainModel::new(&tokenizer, chain);
        PredictionModel::new(
            ModelIdentifier::DistilGpt2,
            Arc::new(tokenizer),
            Box::new(model),
            TokenizerKind::Gpt2,
            false,
        )
        .unwrap()
    }

    fn masked(chain: &[(&str, &str)]) -> PredictionModel {
        let tokenizer = WordTokenizer::new();
        let model = ChainModel::new(&tokenizer, chain);
        PredictionModel::new(
            ModelIdentifier::Bert,
            Arc::new(tokenizer),
            Box::new(model),
            TokenizerKind::Bert,
            true,
        )
        .unwrap()
    }

    const CAT: [(&str, &str); 9] = [
        ("cat", "sat"),
        ("sat", "on"),
        ("on", "the"),
        ("the", "mat"),
        ("mat", "."),
        (".", "It"),
        ("It", "was"),
        ("was", "happy"),
        ("happy", "<|endoftext|>"),
    ];

    /// Answers every forward pass with the same decoded text.
    struct FixedPrediction(&'static str);

    impl CompletionStrategy for FixedPrediction {
        fn kind(&self) -> CompletionKind {
            CompletionKind::NextToken
        }

        fn frame(&self, text: &str, tokenizer: &dyn TextTokenizer, context_limit: usize) -> Result<FramedInput> {
            NextTokenStrategy::new("<|endoftext|>").frame(text, tokenizer, context_limit)
        }

        fn predict(&self, _: &FramedInput, _: &dyn HeadModel, _: &dyn TextTokenizer) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn extract_fragment(&self, text: &str, input: &FramedInput, prediction: &str) -> Option<String> {
            NextTokenStrategy::new("<|endoftext|>").extract_fragment(text, input, prediction)
        }
    }

    #[test]
    fn test_next_word_after_space() {
        let model = causal(&[("are", "you")]);
        assert_eq!(model.get_prediction("How are "), "you");
    }

    #[test]
    fn test_next_word_gets_space_marker() {
        let model = causal(&[("are", "you")]);
        assert_eq!(model.get_prediction("How are"), "&nbsp;you");
        assert_eq!(model.get_prediction("How are&nbsp;"), "you");
    }

    #[test]
    fn test_misaligned_prediction_is_empty() {
        let model = causal(&[]).with_strategy(Box::new(FixedPrediction("you")));
        assert_eq!(model.get_prediction("How are y"), "");
        assert_eq!(model.get_prediction("How are "), "");
    }

    #[test]
    fn test_empty_input() {
        let model = causal(&[("<|endoftext|>", "Hello")]);
        assert_eq!(model.get_prediction(""), "Hello");

        let model = masked(&[("[MASK]", "Hello")]);
        assert_eq!(model.get_prediction(""), "Hello");
    }

    #[test]
    fn test_inference_failure_is_absorbed() {
        let model = causal(&[("are", "you")]);
        assert_eq!(model.get_prediction("Zebra crossing"), "");
    }

    #[test]
    fn test_prediction_is_idempotent() {
        let model = causal(&CAT);
        let first = model.get_prediction("The cat");
        assert_eq!(first, "&nbsp;sat");
        assert_eq!(model.get_prediction("The cat"), first);
    }

    #[test]
    fn test_mask_completes_partial_word() {
        let model = masked(&[("[MASK]", "you")]);
        assert_eq!(model.get_prediction("How are y"), "ou");
        assert_eq!(model.get_prediction("How are "), "you");
        assert_eq!(model.get_prediction("How are"), "");
        assert!(model.needs_mask());
    }

    #[test]
    fn test_full_prediction_stops_at_last_period() {
        let model = causal(&CAT);
        assert_eq!(model.get_full_prediction("The cat").unwrap(), "&nbsp;sat on the mat.");
    }

    #[test]
    fn test_full_prediction_without_period_keeps_everything() {
        let model = causal(&[("cat", "sat"), ("sat", "<|endoftext|>")]);
        assert_eq!(model.get_full_prediction("The cat").unwrap(), "&nbsp;sat");
    }

    #[test]
    fn test_sentence_budget_follows_input_characters() {
        let model = causal(&[("It", "was"), ("was", "happy"), ("happy", "It")]).with_generation(GenerationConfig {
            no_repeat_ngram_size: 0,
            ..Default::default()
        });

        // 26 characters and 8 tokens leave room for 38 new tokens.
        let fragment = model.get_full_prediction("The cat sat on the mat. It").unwrap();
        assert!(fragment.starts_with("&nbsp;was happy It"));
        assert_eq!(fragment.split_whitespace().count(), 38);
    }

    #[test]
    fn test_sentence_budget_is_clamped_to_context() {
        let tokenizer = WordTokenizer::new();
        let model = ChainModel::new(&tokenizer, &[("It", "was"), ("was", "happy"), ("happy", "It")]).with_context(30);
        let model = PredictionModel::new(
            ModelIdentifier::DistilGpt2,
            Arc::new(tokenizer),
            Box::new(model),
            TokenizerKind::Gpt2,
            false,
        )
        .unwrap()
        .with_generation(GenerationConfig {
            no_repeat_ngram_size: 0,
            ..Default::default()
        });

        let fragment = model.get_full_prediction("The cat sat on the mat. It").unwrap();
        assert_eq!(fragment.split_whitespace().count(), 30 - 8);
    }

    #[test]
    fn test_full_prediction_on_masked_model() {
        let model = masked(&[]);
        assert!(matches!(
            model.get_full_prediction("The cat"),
            Err(PredictionError::SentenceCompletionUnsupported(ModelIdentifier::Bert))
        ));
    }

    #[test]
    fn test_missing_mask_token_fails_construction() {
        struct NoMask(WordTokenizer);

        impl TextTokenizer for NoMask {
            fn encode_with_options(&self, text: &str, options: &crate::core::tokenizer::EncodeOptions) -> Result<Vec<u32>> {
                self.0.encode_with_options(text, options)
            }

            fn decode_with_options(&self, ids: &[u32], options: &DecodeOptions) -> Result<String> {
                self.0.decode_with_options(ids, options)
            }

            fn token_to_id(&self, token: &str) -> Option<u32> {
                (token != "[MASK]").then(|| self.0.token_to_id(token)).flatten()
            }
        }

        let inner = WordTokenizer::new();
        let model = ChainModel::new(&inner, &[]);
        let result = PredictionModel::new(
            ModelIdentifier::Bert,
            Arc::new(NoMask(inner)),
            Box::new(model),
            TokenizerKind::Bert,
            true,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_long_input_is_truncated_before_inference() {
        let tokenizer = WordTokenizer::new();
        let model = ChainModel::new(&tokenizer, &[("mat", ".")]).with_context(3);
        let model = PredictionModel::new(
            ModelIdentifier::Gpt2,
            Arc::new(tokenizer),
            Box::new(model),
            TokenizerKind::Gpt2,
            false,
        )
        .unwrap();

        assert_eq!(model.get_prediction("The cat sat on the mat"), ".");
    }
}
