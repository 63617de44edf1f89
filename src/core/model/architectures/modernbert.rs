use super::HeadDims;
use crate::core::model::{HeadModel, ModelMeta};
use crate::core::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::{Config, ModernBertForMaskedLM};

pub struct ModernBertMaskedLm {
    model: ModernBertForMaskedLM,
    device: Device,
    meta: ModelMeta,
}

impl ModernBertMaskedLm {
    pub fn load(vb: VarBuilder, config_json: &str, name: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(config_json)?;
        let dims: HeadDims = serde_json::from_str(config_json)?;
        let device = vb.device().clone();
        let model = ModernBertForMaskedLM::load(vb, &config)?;

        Ok(Self {
            model,
            device,
            meta: dims.meta(name, "modernbert"),
        })
    }
}

impl HeadModel for ModernBertMaskedLm {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = input.ones_like()?;
        let logits = self.model.forward(&input, &attention_mask)?;
        Ok(logits.squeeze(0)?)
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }
}
