use super::HeadDims;
use crate::core::model::{HeadModel, ModelMeta};
use crate::core::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertForMaskedLM, Config};

pub struct BertMaskedLm {
    model: BertForMaskedLM,
    device: Device,
    meta: ModelMeta,
}

impl BertMaskedLm {
    pub fn load(vb: VarBuilder, config_json: &str, name: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(config_json)?;
        let dims: HeadDims = serde_json::from_str(config_json)?;
        let device = vb.device().clone();
        let model = BertForMaskedLM::load(vb, &config)?;

        Ok(Self {
            model,
            device,
            meta: dims.meta(name, "bert"),
        })
    }
}

impl HeadModel for BertMaskedLm {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input.zeros_like()?;
        let attention_mask = input.ones_like()?;
        let logits = self
            .model
            .forward(&input, &token_type_ids, Some(&attention_mask))?;
        Ok(logits.squeeze(0)?)
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }
}
