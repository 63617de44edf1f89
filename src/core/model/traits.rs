use crate::core::Result;
use candle_core::{DType, IndexOp, Tensor, D};

/// A loaded language model with its prediction head attached.
///
/// Implementations are immutable after loading and hold no per-call state,
/// so one instance serves concurrent forward passes.
pub trait HeadModel: Send + Sync {
    /// Logits for every position of one unbatched sequence, shaped
    /// `(seq_len, vocab_size)`.
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor>;

    fn meta(&self) -> &ModelMeta;

    fn max_positions(&self) -> usize {
        self.meta().context_length
    }

    fn logits_at(&self, input_ids: &[u32], position: usize) -> Result<Vec<f32>> {
        let logits = self.forward(input_ids)?;
        Ok(logits.i(position)?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }

    fn log_probs_at(&self, input_ids: &[u32], position: usize) -> Result<Vec<f32>> {
        let logits = self.forward(input_ids)?.i(position)?.to_dtype(DType::F32)?;
        Ok(candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec1::<f32>()?)
    }
}

#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub name: String,
    pub architecture: String,
    pub context_length: usize,
    pub vocab_size: usize,
}

/// Index of the highest logit; ties resolve to the lowest index.
pub fn argmax(logits: &[f32]) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 3.0, -1.0]), Some(1));
        assert_eq!(argmax(&[2.0, 2.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
