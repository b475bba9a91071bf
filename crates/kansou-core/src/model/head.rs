use candle_core::{D, Result, Tensor};
use candle_nn::{Dropout, Linear, Module, ModuleT, VarBuilder};

/// Dropout, then a linear projection onto the class count, then softmax.
///
/// The projection is the only layer trained from scratch; its variables
/// live under the `classifier` prefix of the model's var map.
pub struct ClassifierHead {
    dropout: Dropout,
    out: Linear,
}

impl ClassifierHead {
    pub fn new(hidden_size: usize, num_classes: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let out = candle_nn::linear(hidden_size, num_classes, vb.pp("out"))?;
        Ok(Self {
            dropout: Dropout::new(dropout),
            out,
        })
    }

    /// Unnormalised class scores `[batch, num_classes]`. Dropout only when `train`.
    pub fn logits(&self, pooled: &Tensor, train: bool) -> Result<Tensor> {
        let dropped = self.dropout.forward_t(pooled, train)?;
        self.out.forward(&dropped)
    }
}

impl ModuleT for ClassifierHead {
    /// Class probabilities; every row is non-negative and sums to 1.
    fn forward_t(&self, pooled: &Tensor, train: bool) -> Result<Tensor> {
        let logits = self.logits(pooled, train)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}
