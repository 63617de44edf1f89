pub mod core;
pub mod infra;
pub mod app;
pub mod envconfig;

pub mod model {
    pub use crate::core::model::*;
}

pub mod tokenizer {
    pub use crate::core::tokenizer::*;
}

pub use crate::core::{
    ModelCatalog, ModelIdentifier, ModelSpec, TokenizerKind, HeadModelKind,
    PredictionError, PredictionModel, PredictionRegistry, ConstructionLock,
    CompletionKind, CompletionStrategy, GenerationConfig,
    HeadModel, TextTokenizer, Result,
};

pub use infra::{PretrainedFiles, PretrainedRepository};

pub use app::{Server, AppState, registry_from_config};

pub use envconfig::ScribeConfig;
