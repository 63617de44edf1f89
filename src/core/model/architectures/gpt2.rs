use crate::core::model::{HeadModel, ModelMeta};
use crate::core::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, VarBuilder};
use serde::Deserialize;

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    pub vocab_size: usize,
    pub n_positions: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

/// GPT-2 stores its projections transposed: `(in_features, out_features)`.
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(n_in: usize, n_out: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get((n_in, n_out), "weight")?,
            bias: vb.get(n_out, "bias")?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(xs.matmul(&self.weight)?.broadcast_add(&self.bias)?)
    }
}

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let hidden = config.n_embd;
        Ok(Self {
            c_attn: Conv1D::load(hidden, 3 * hidden, vb.pp("c_attn"))?,
            c_proj: Conv1D::load(hidden, hidden, vb.pp("c_proj"))?,
            n_head: config.n_head,
            head_dim: hidden / config.n_head,
        })
    }

    fn forward(&self, xs: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (seq_len, hidden) = xs.dims2()?;
        let qkv = self.c_attn.forward(xs)?;

        let heads = |i: usize| -> Result<Tensor> {
            Ok(qkv
                .narrow(1, i * hidden, hidden)?
                .reshape((seq_len, self.n_head, self.head_dim))?
                .transpose(0, 1)?
                .contiguous()?)
        };
        let (q, k, v) = (heads(0)?, heads(1)?, heads(2)?);

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.t()?.contiguous()?)? * scale)?.broadcast_add(mask)?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;

        let out = probs
            .matmul(&v)?
            .transpose(0, 1)?
            .contiguous()?
            .reshape((seq_len, hidden))?;
        self.c_proj.forward(&out)
    }
}

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let hidden = config.n_embd;
        Ok(Self {
            c_fc: Conv1D::load(hidden, 4 * hidden, vb.pp("c_fc"))?,
            c_proj: Conv1D::load(4 * hidden, hidden, vb.pp("c_proj"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // gelu_new: the tanh approximation
        let xs = self.c_fc.forward(xs)?.gelu()?;
        self.c_proj.forward(&xs)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let eps = config.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(config.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(config, vb.pp("attn"))?,
            ln_2: layer_norm(config.n_embd, eps, vb.pp("ln_2"))?,
            mlp: Mlp::load(config, vb.pp("mlp"))?,
        })
    }

    fn forward(&self, xs: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let residual = xs;
        let xs = (self.attn.forward(&self.ln_1.forward(xs)?, mask)? + residual)?;
        let residual = &xs;
        Ok((self.mlp.forward(&self.ln_2.forward(&xs)?)? + residual)?)
    }
}

/// GPT-2 decoder with the language-modeling head tied to the token embeddings.
pub struct Gpt2LmHeadModel {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    device: Device,
    meta: ModelMeta,
}

impl Gpt2LmHeadModel {
    pub fn load(vb: VarBuilder, config: &Gpt2Config, name: &str) -> Result<Self> {
        // Checkpoints saved from the LM-head class nest everything under `transformer.`
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };

        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(config, vb.pp(format!("h.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;

        let meta = ModelMeta {
            name: name.to_string(),
            architecture: "gpt2".to_string(),
            context_length: config.n_positions,
            vocab_size: config.vocab_size,
        };

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            device: vb.device().clone(),
            meta,
        })
    }
}

fn causal_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| if j > i { f32::NEG_INFINITY } else { 0.0 }))
        .collect();
    Ok(Tensor::from_vec(mask, (seq_len, seq_len), device)?)
}

impl HeadModel for Gpt2LmHeadModel {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        let seq_len = input_ids.len();
        if seq_len == 0 {
            anyhow::bail!("gpt2 forward pass needs at least one token");
        }
        if seq_len > self.meta.context_length {
            anyhow::bail!(
                "sequence of {} tokens exceeds the {} positions of {}",
                seq_len,
                self.meta.context_length,
                self.meta.name
            );
        }

        let ids = Tensor::new(input_ids, &self.device)?;
        let positions = Tensor::arange(0u32, seq_len as u32, &self.device)?;
        let mut xs = (self.wte.forward(&ids)? + self.wpe.forward(&positions)?)?;

        let mask = causal_mask(seq_len, &self.device)?;
        for block in &self.blocks {
            xs = block.forward(&xs, &mask)?;
        }

        let xs = self.ln_f.forward(&xs)?;
        Ok(xs.matmul(&self.wte.embeddings().t()?)?)
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }
}
