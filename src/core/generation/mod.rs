//! Beam-search decoding over a [`HeadModel`].
//!
//! Every step re-runs the full sequence of each live beam through the model;
//! completions are short (a sentence) so no key/value cache is kept.

use crate::core::model::HeadModel;
use crate::core::Result;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub num_beams: usize,
    pub no_repeat_ngram_size: usize,
    pub early_stopping: bool,
    pub length_penalty: f32,
    pub max_new_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_beams: 5,
            no_repeat_ngram_size: 2,
            early_stopping: true,
            length_penalty: 1.0,
            max_new_tokens: 20,
        }
    }
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    score: f32,
}

/// Finished sequences, keeping only the `capacity` best by normalized score.
struct Hypotheses {
    capacity: usize,
    length_penalty: f32,
    prompt_len: usize,
    entries: Vec<(f32, Vec<u32>)>,
}

impl Hypotheses {
    fn new(capacity: usize, length_penalty: f32, prompt_len: usize) -> Self {
        Self {
            capacity,
            length_penalty,
            prompt_len,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    fn normalize(&self, tokens_len: usize, sum_logprobs: f32) -> f32 {
        let generated = tokens_len.saturating_sub(self.prompt_len).max(1);
        sum_logprobs / (generated as f32).powf(self.length_penalty)
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = self.normalize(tokens.len(), sum_logprobs);
        self.entries.push((score, tokens));
        self.entries.sort_by(|a, b| b.0.total_cmp(&a.0));
        self.entries.truncate(self.capacity);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_done(&self, early_stopping: bool, best_alive: Option<&Beam>) -> bool {
        if self.len() < self.capacity {
            return false;
        }
        if early_stopping {
            return true;
        }
        match (best_alive, self.entries.last()) {
            (Some(beam), Some((worst, _))) => *worst >= self.normalize(beam.tokens.len(), beam.score),
            _ => true,
        }
    }

    fn best(self) -> Option<Vec<u32>> {
        self.entries.into_iter().next().map(|(_, tokens)| tokens)
    }
}

pub struct BeamSearch<'a> {
    model: &'a dyn HeadModel,
    config: &'a GenerationConfig,
    eos: Option<u32>,
}

impl<'a> BeamSearch<'a> {
    pub fn new(model: &'a dyn HeadModel, config: &'a GenerationConfig, eos: Option<u32>) -> Self {
        Self { model, config, eos }
    }

    /// Returns the best sequence, prompt included, of at most `max_length`
    /// tokens. The end-of-sequence token is not part of the result.
    pub fn generate(&self, prompt: &[u32], max_length: usize) -> Result<Vec<u32>> {
        if prompt.is_empty() {
            anyhow::bail!("beam search needs a non-empty prompt");
        }

        let num_beams = self.config.num_beams.max(1);
        let mut hypotheses = Hypotheses::new(num_beams, self.config.length_penalty, prompt.len());
        let mut beams = vec![Beam {
            tokens: prompt.to_vec(),
            score: 0.0,
        }];
        let mut done = false;

        while beams.first().is_some_and(|b| b.tokens.len() < max_length) {
            let mut candidates: Vec<(usize, u32, f32)> = Vec::with_capacity(beams.len() * 2 * num_beams);

            for (index, beam) in beams.iter().enumerate() {
                let mut log_probs = self.model.log_probs_at(&beam.tokens, beam.tokens.len() - 1)?;
                for banned in banned_tokens(&beam.tokens, self.config.no_repeat_ngram_size) {
                    if let Some(lp) = log_probs.get_mut(banned as usize) {
                        *lp = f32::NEG_INFINITY;
                    }
                }
                for (token, lp) in top_k(&log_probs, 2 * num_beams) {
                    if lp.is_finite() {
                        candidates.push((index, token, beam.score + lp));
                    }
                }
            }
            candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

            let mut next = Vec::with_capacity(num_beams);
            for (rank, (index, token, score)) in candidates.into_iter().enumerate() {
                if Some(token) == self.eos {
                    if rank < num_beams {
                        hypotheses.add(beams[index].tokens.clone(), score);
                    }
                } else {
                    let mut tokens = beams[index].tokens.clone();
                    tokens.push(token);
                    next.push(Beam { tokens, score });
                }
                if next.len() == num_beams {
                    break;
                }
            }

            beams = next;
            if hypotheses.is_done(self.config.early_stopping, beams.first()) {
                done = true;
                break;
            }
        }

        if !done {
            for beam in beams {
                hypotheses.add(beam.tokens, beam.score);
            }
        }

        hypotheses
            .best()
            .ok_or_else(|| anyhow::anyhow!("beam search produced no hypothesis"))
    }
}

/// Tokens that would repeat an n-gram already present in `tokens`.
pub fn banned_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    tokens
        .windows(n)
        .filter(|window| &window[..n - 1] == prefix)
        .map(|window| window[n - 1])
        .collect()
}

fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as u32, v))
        .collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return Vec::new();
    }
    indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}
