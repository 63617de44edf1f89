pub mod storage;

pub use storage::{PretrainedFiles, PretrainedRepository};
