//! # BERT encoder
//!
//! Wraps candle's `BertModel` and adds the standard pooler (dense + tanh over
//! the first token) so it satisfies [`PooledEncoder`]. The per-token hidden
//! states are consumed here and never leave this module.

use candle_core::{IndexOp, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};

use crate::model::encoder::PooledEncoder;

/// Dense + tanh over the `[CLS]` position.
struct BertPooler {
    dense: Linear,
}

impl BertPooler {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let dense = candle_nn::linear(config.hidden_size, config.hidden_size, vb.pp("dense"))?;
        Ok(Self { dense })
    }

    fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        let first_token = hidden_states.i((.., 0))?;
        self.dense.forward(&first_token)?.tanh()
    }
}

/// Pretrained BERT encoder producing pooled sentence vectors.
///
/// candle's `BertModel` has no dropout layers, so `forward_t` behaves the
/// same in train and eval mode: the encoder is fine-tuned without its
/// hidden-state dropout and only the classifier head applies dropout.
pub struct BertEncoder {
    model: BertModel,
    pooler: BertPooler,
    hidden_size: usize,
}

impl BertEncoder {
    /// Build the encoder from a var builder positioned at the `bert` prefix.
    ///
    /// Variable names follow the Hugging Face layout (`embeddings.*`,
    /// `encoder.*`, `pooler.dense.*`).
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let model = BertModel::load(vb.clone(), config)?;
        let pooler = BertPooler::load(vb.pp("pooler"), config)?;
        Ok(Self {
            model,
            pooler,
            hidden_size: config.hidden_size,
        })
    }
}

impl PooledEncoder for BertEncoder {
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        _train: bool,
    ) -> Result<Tensor> {
        // Single-segment input.
        let token_type_ids = input_ids.zeros_like()?;
        let hidden_states = self
            .model
            .forward(input_ids, &token_type_ids, Some(attention_mask))?;
        self.pooler.forward(&hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}
