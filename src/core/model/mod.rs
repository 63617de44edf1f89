pub mod traits;
pub mod factory;
pub mod registry;
pub mod architectures;

pub use traits::{argmax, HeadModel, ModelMeta};
pub use factory::{builder, select_device, ModelBuilder, PretrainedFactory};
pub use registry::{InstanceStore, MemoryStore, PredictionRegistry};
