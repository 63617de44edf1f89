pub mod gpt2;
pub mod bert;
pub mod modernbert;

pub use gpt2::{Gpt2Config, Gpt2LmHeadModel};
pub use bert::BertMaskedLm;
pub use modernbert::ModernBertMaskedLm;

use super::ModelMeta;
use serde::Deserialize;

/// The `config.json` fields every encoder head reports through `ModelMeta`.
#[derive(Debug, Deserialize)]
struct HeadDims {
    vocab_size: usize,
    max_position_embeddings: usize,
}

impl HeadDims {
    fn meta(&self, name: &str, architecture: &str) -> ModelMeta {
        ModelMeta {
            name: name.to_string(),
            architecture: architecture.to_string(),
            context_length: self.max_position_embeddings,
            vocab_size: self.vocab_size,
        }
    }
}
