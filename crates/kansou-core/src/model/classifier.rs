use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{ModuleT, VarBuilder, VarMap};
use tracing::info;

use crate::error::Result as KansouResult;
use crate::model::bert::BertEncoder;
use crate::model::encoder::PooledEncoder;
use crate::model::head::ClassifierHead;
use crate::model::pretrained::{PretrainedFiles, load_pretrained_weights};
use crate::types::NUM_CLASSES;

/// Pretrained encoder with a sentiment head on its pooled output.
pub struct SentimentClassifier {
    encoder: Box<dyn PooledEncoder>,
    head: ClassifierHead,
}

impl SentimentClassifier {
    /// Attach a fresh head (under `vb`'s `classifier` prefix) to `encoder`.
    pub fn new(encoder: Box<dyn PooledEncoder>, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let head = ClassifierHead::new(
            encoder.hidden_size(),
            NUM_CLASSES,
            dropout,
            vb.pp("classifier"),
        )?;
        Ok(Self { encoder, head })
    }

    /// Class logits `[batch, NUM_CLASSES]`.
    pub fn logits(&self, input_ids: &Tensor, attention_mask: &Tensor, train: bool) -> Result<Tensor> {
        let pooled = self.encoder.forward_t(input_ids, attention_mask, train)?;
        self.head.logits(&pooled, train)
    }

    /// Class probabilities in eval mode, detached from the graph.
    pub fn probabilities(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let pooled = self.encoder.forward_t(input_ids, attention_mask, false)?;
        Ok(self.head.forward_t(&pooled, false)?.detach())
    }
}

/// Build a BERT sentiment classifier on a new var map and copy in the
/// pretrained encoder weights. The head starts freshly initialised.
pub fn load_bert_classifier(
    files: &PretrainedFiles,
    dropout: f32,
    device: &Device,
) -> KansouResult<(SentimentClassifier, VarMap)> {
    let (classifier, varmap) = build_bert_classifier(files, dropout, device)?;
    load_pretrained_weights(&varmap, &files.weights, device)?;
    Ok((classifier, varmap))
}

/// Build the classifier architecture without loading any weights.
///
/// Used to restore a fine-tuned checkpoint, which already contains
/// every var.
pub fn build_bert_classifier(
    files: &PretrainedFiles,
    dropout: f32,
    device: &Device,
) -> KansouResult<(SentimentClassifier, VarMap)> {
    let config = files.bert_config()?;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

    let encoder = BertEncoder::load(vb.pp("bert"), &config)?;
    let classifier = SentimentClassifier::new(Box::new(encoder), dropout, vb)?;
    info!(
        hidden_size = config.hidden_size,
        layers = config.num_hidden_layers,
        "built BERT sentiment classifier"
    );
    Ok((classifier, varmap))
}
