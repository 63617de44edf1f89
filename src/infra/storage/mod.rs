use crate::core::Result;
use anyhow::Context;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// The three files a pretrained model is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PretrainedFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Resolves pretrained identifiers to files on disk.
///
/// An identifier naming an existing directory is read in place; anything else
/// is treated as a Hugging Face Hub repository and downloaded into the cache
/// directory on first use.
pub struct PretrainedRepository {
    models_dir: PathBuf,
}

impl PretrainedRepository {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    pub fn fetch(&self, pretrained: &str) -> Result<PretrainedFiles> {
        let local = Path::new(pretrained);
        if local.is_dir() {
            return Self::local_files(local);
        }

        std::fs::create_dir_all(&self.models_dir)
            .with_context(|| format!("failed to create {}", self.models_dir.display()))?;
        let api = ApiBuilder::new()
            .with_cache_dir(self.models_dir.clone())
            .with_progress(false)
            .build()?;
        let repo = api.repo(Repo::new(pretrained.to_string(), RepoType::Model));

        let get = |file: &str| {
            repo.get(file)
                .with_context(|| format!("failed to fetch {} from {}", file, pretrained))
        };
        Ok(PretrainedFiles {
            config: get(CONFIG_FILE)?,
            tokenizer: get(TOKENIZER_FILE)?,
            weights: get(WEIGHTS_FILE)?,
        })
    }

    fn local_files(dir: &Path) -> Result<PretrainedFiles> {
        let file = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(anyhow::anyhow!("{} is missing {}", dir.display(), name))
            }
        };
        Ok(PretrainedFiles {
            config: file(CONFIG_FILE)?,
            tokenizer: file(TOKENIZER_FILE)?,
            weights: file(WEIGHTS_FILE)?,
        })
    }
}

impl Default for PretrainedRepository {
    fn default() -> Self {
        Self::new(crate::envconfig::default_models_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scribe-models-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_local_directory_is_used_in_place() {
        let dir = temp_dir();
        for name in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            fs::write(dir.join(name), b"{}").unwrap();
        }

        let repository = PretrainedRepository::new(temp_dir());
        let files = repository.fetch(dir.to_str().unwrap()).unwrap();
        assert_eq!(files.config, dir.join(CONFIG_FILE));
        assert_eq!(files.tokenizer, dir.join(TOKENIZER_FILE));
        assert_eq!(files.weights, dir.join(WEIGHTS_FILE));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_local_directory_missing_weights() {
        let dir = temp_dir();
        fs::write(dir.join(CONFIG_FILE), b"{}").unwrap();
        fs::write(dir.join(TOKENIZER_FILE), b"{}").unwrap();

        let err = PretrainedRepository::new(temp_dir())
            .fetch(dir.to_str().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains(WEIGHTS_FILE));

        fs::remove_dir_all(dir).unwrap();
    }
}
