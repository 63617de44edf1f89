use super::error::PredictionError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelIdentifier {
    #[serde(rename = "GPT2")]
    Gpt2,
    #[serde(rename = "DGPT2")]
    DistilGpt2,
    #[serde(rename = "BERT")]
    Bert,
    #[serde(rename = "MODERNBERT")]
    ModernBert,
}

impl ModelIdentifier {
    pub const ALL: [ModelIdentifier; 4] = [
        ModelIdentifier::Gpt2,
        ModelIdentifier::DistilGpt2,
        ModelIdentifier::Bert,
        ModelIdentifier::ModernBert,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelIdentifier::Gpt2 => "GPT2",
            ModelIdentifier::DistilGpt2 => "DGPT2",
            ModelIdentifier::Bert => "BERT",
            ModelIdentifier::ModernBert => "MODERNBERT",
        }
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelIdentifier {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gpt2" | "gpt-2" => Ok(ModelIdentifier::Gpt2),
            "dgpt2" | "distilgpt2" => Ok(ModelIdentifier::DistilGpt2),
            "bert" | "bert-base-cased" => Ok(ModelIdentifier::Bert),
            "modernbert" | "modernbert-base" => Ok(ModelIdentifier::ModernBert),
            _ => Err(PredictionError::UnknownModel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenizerKind {
    Gpt2,
    Bert,
    ModernBert,
}

impl TokenizerKind {
    pub fn mask_token(&self) -> Option<&'static str> {
        match self {
            TokenizerKind::Gpt2 => None,
            TokenizerKind::Bert | TokenizerKind::ModernBert => Some("[MASK]"),
        }
    }

    /// Token used to give an empty causal prompt something to attend to.
    pub fn start_token(&self) -> &'static str {
        match self {
            TokenizerKind::Gpt2 => "<|endoftext|>",
            TokenizerKind::Bert | TokenizerKind::ModernBert => "[CLS]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HeadModelKind {
    Gpt2LmHead,
    BertMaskedLm,
    ModernBertMaskedLm,
}

/// Construction parameters for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub tokenizer: TokenizerKind,
    pub head_model: HeadModelKind,
    pub pretrained: String,
    pub needs_mask: bool,
}

impl ModelSpec {
    pub fn new(
        tokenizer: TokenizerKind,
        head_model: HeadModelKind,
        pretrained: impl Into<String>,
        needs_mask: bool,
    ) -> Self {
        Self {
            tokenizer,
            head_model,
            pretrained: pretrained.into(),
            needs_mask,
        }
    }
}

static BUILTIN: Lazy<ModelCatalog> = Lazy::new(|| {
    ModelCatalog::from_specs([
        (
            ModelIdentifier::Gpt2,
            ModelSpec::new(TokenizerKind::Gpt2, HeadModelKind::Gpt2LmHead, "openai-community/gpt2-medium", false),
        ),
        (
            ModelIdentifier::DistilGpt2,
            ModelSpec::new(TokenizerKind::Gpt2, HeadModelKind::Gpt2LmHead, "distilbert/distilgpt2", false),
        ),
        (
            ModelIdentifier::Bert,
            ModelSpec::new(TokenizerKind::Bert, HeadModelKind::BertMaskedLm, "google-bert/bert-base-cased", true),
        ),
        (
            ModelIdentifier::ModernBert,
            ModelSpec::new(
                TokenizerKind::ModernBert,
                HeadModelKind::ModernBertMaskedLm,
                "answerdotai/ModernBERT-base",
                true,
            ),
        ),
    ])
});

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    specs: BTreeMap<ModelIdentifier, ModelSpec>,
}

impl ModelCatalog {
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn from_specs<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = (ModelIdentifier, ModelSpec)>,
    {
        Self {
            specs: specs.into_iter().collect(),
        }
    }

    pub fn spec(&self, id: ModelIdentifier) -> Option<&ModelSpec> {
        self.specs.get(&id)
    }

    pub fn contains(&self, id: ModelIdentifier) -> bool {
        self.specs.contains_key(&id)
    }

    /// Parses a model name and checks it against this catalog.
    pub fn resolve(&self, name: &str) -> Result<(ModelIdentifier, &ModelSpec), PredictionError> {
        let id: ModelIdentifier = name.parse()?;
        self.spec(id)
            .map(|spec| (id, spec))
            .ok_or_else(|| PredictionError::UnknownModel(name.to_string()))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = ModelIdentifier> + '_ {
        self.specs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelIdentifier, &ModelSpec)> {
        self.specs.iter().map(|(id, spec)| (*id, spec))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Model that serves sentence completion on behalf of `id`.
    ///
    /// Masked models cannot continue a sentence, so they defer to the
    /// distilled causal model when the catalog has one.
    pub fn sentence_model_for(&self, id: ModelIdentifier) -> Option<ModelIdentifier> {
        match self.spec(id) {
            Some(spec) if !spec.needs_mask => Some(id),
            _ => self
                .spec(ModelIdentifier::DistilGpt2)
                .filter(|spec| !spec.needs_mask)
                .map(|_| ModelIdentifier::DistilGpt2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_exhaustive() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.len(), ModelIdentifier::ALL.len());
        for id in ModelIdentifier::ALL {
            assert!(catalog.contains(id), "{id} missing from catalog");
        }
    }

    #[test]
    fn test_mask_flags_follow_head_kind() {
        let catalog = ModelCatalog::builtin();
        for (_, spec) in catalog.iter() {
            let masked_head = !matches!(spec.head_model, HeadModelKind::Gpt2LmHead);
            assert_eq!(spec.needs_mask, masked_head);
            assert_eq!(spec.needs_mask, spec.tokenizer.mask_token().is_some());
        }
    }

    #[test]
    fn test_resolve_names() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.resolve("GPT2").unwrap().0, ModelIdentifier::Gpt2);
        assert_eq!(catalog.resolve("gpt-2").unwrap().0, ModelIdentifier::Gpt2);
        assert_eq!(catalog.resolve("DGPT2").unwrap().0, ModelIdentifier::DistilGpt2);
        assert_eq!(catalog.resolve("bert").unwrap().0, ModelIdentifier::Bert);
        assert!(matches!(
            catalog.resolve("nonexistent"),
            Err(PredictionError::UnknownModel(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn test_resolve_outside_subset() {
        let catalog = ModelCatalog::from_specs([(
            ModelIdentifier::Bert,
            ModelSpec::new(TokenizerKind::Bert, HeadModelKind::BertMaskedLm, "bert", true),
        )]);
        assert!(matches!(catalog.resolve("GPT2"), Err(PredictionError::UnknownModel(_))));
    }

    #[test]
    fn test_sentence_model_fallback() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.sentence_model_for(ModelIdentifier::Gpt2), Some(ModelIdentifier::Gpt2));
        assert_eq!(catalog.sentence_model_for(ModelIdentifier::Bert), Some(ModelIdentifier::DistilGpt2));
        assert_eq!(
            catalog.sentence_model_for(ModelIdentifier::ModernBert),
            Some(ModelIdentifier::DistilGpt2)
        );
    }

    #[test]
    fn test_identifier_display_round_trip() {
        for id in ModelIdentifier::ALL {
            assert_eq!(id.to_string().parse::<ModelIdentifier>().unwrap(), id);
        }
    }
}
