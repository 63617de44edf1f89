pub mod traits;
pub mod hf;

pub use traits::{TextTokenizer, EncodeOptions, DecodeOptions};
pub use hf::HfTokenizer;
