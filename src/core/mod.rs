pub mod catalog;
pub mod error;
pub mod lock;
pub mod tokenizer;
pub mod model;
pub mod generation;
pub mod prediction;

pub use catalog::{HeadModelKind, ModelCatalog, ModelIdentifier, ModelSpec, TokenizerKind};
pub use error::PredictionError;
pub use lock::ConstructionLock;
pub use tokenizer::{HfTokenizer, TextTokenizer};
pub use model::{HeadModel, ModelMeta, ModelBuilder, PredictionRegistry, PretrainedFactory};
pub use generation::{BeamSearch, GenerationConfig};
pub use prediction::{CompletionKind, CompletionStrategy, PredictionModel};

pub type Result<T> = anyhow::Result<T>;
