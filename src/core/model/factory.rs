use super::architectures::{BertMaskedLm, Gpt2Config, Gpt2LmHeadModel, ModernBertMaskedLm};
use super::traits::HeadModel;
use crate::core::catalog::{HeadModelKind, ModelIdentifier, ModelSpec};
use crate::core::prediction::PredictionModel;
use crate::core::tokenizer::HfTokenizer;
use crate::core::Result;
use crate::envconfig::DevicePreference;
use crate::infra::storage::{PretrainedFiles, PretrainedRepository};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use std::sync::Arc;
use std::time::Instant;

/// Constructs the value cached for one catalog entry.
pub type ModelBuilder<M> = Arc<dyn Fn(ModelIdentifier, &ModelSpec) -> Result<M> + Send + Sync>;

pub fn builder<M, F>(f: F) -> ModelBuilder<M>
where
    F: Fn(ModelIdentifier, &ModelSpec) -> Result<M> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn select_device(preference: DevicePreference) -> Result<Device> {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Auto => {
            if candle_core::utils::cuda_is_available() {
                Device::new_cuda(0)?
            } else if candle_core::utils::metal_is_available() {
                Device::new_metal(0)?
            } else {
                Device::Cpu
            }
        }
    };
    Ok(device)
}

/// Loads tokenizers and weights from the pretrained repository.
pub struct PretrainedFactory {
    repository: PretrainedRepository,
    device: Device,
}

impl PretrainedFactory {
    pub fn new(repository: PretrainedRepository, device: Device) -> Self {
        Self { repository, device }
    }

    pub fn create(&self, id: ModelIdentifier, spec: &ModelSpec) -> Result<PredictionModel> {
        let start = Instant::now();
        tracing::info!("Loading {} from {}", id, spec.pretrained);

        let files = self.repository.fetch(&spec.pretrained)?;
        let tokenizer = HfTokenizer::from_file(spec.tokenizer, &files.tokenizer)?;
        let model = self.load_head(spec, &files)?;
        let prediction = PredictionModel::new(id, Arc::new(tokenizer), model, spec.tokenizer, spec.needs_mask)?;

        tracing::info!("Loaded {} in {:.1}s", id, start.elapsed().as_secs_f32());
        Ok(prediction)
    }

    fn load_head(&self, spec: &ModelSpec, files: &PretrainedFiles) -> Result<Box<dyn HeadModel>> {
        let config_json = std::fs::read_to_string(&files.config)?;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &self.device)?
        };

        let model: Box<dyn HeadModel> = match spec.head_model {
            HeadModelKind::Gpt2LmHead => {
                let config: Gpt2Config = serde_json::from_str(&config_json)?;
                Box::new(Gpt2LmHeadModel::load(vb, &config, &spec.pretrained)?)
            }
            HeadModelKind::BertMaskedLm => {
                Box::new(BertMaskedLm::load(vb, &config_json, &spec.pretrained)?)
            }
            HeadModelKind::ModernBertMaskedLm => {
                Box::new(ModernBertMaskedLm::load(vb, &config_json, &spec.pretrained)?)
            }
        };
        Ok(model)
    }

    pub fn into_builder(self) -> ModelBuilder<PredictionModel> {
        builder(move |id, spec| self.create(id, spec))
    }
}
