//! Small fixtures for tests: an in-memory word tokenizer, a trainable
//! bag-of-words encoder and a tiny BERT model directory on disk.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `testing` feature.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::Config as BertConfig;
use tokenizers::Tokenizer;

use crate::model::{BertEncoder, PooledEncoder, PretrainedFiles};

const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "i", "love", "this", "app", "best", "ever",
    "completing", "my", "todos", "!", "bad", "crashes", "hate", "ok", "fine", "great",
    "terrible", "it", "is",
];

/// WordLevel tokenizer with `[CLS] ... [SEP]` post-processing.
pub fn word_tokenizer() -> Tokenizer {
    Tokenizer::from_bytes(word_tokenizer_json().to_string().as_bytes())
        .expect("fixture tokenizer is valid")
}

/// `tokenizer.json` contents for [`word_tokenizer`].
pub fn word_tokenizer_json() -> serde_json::Value {
    let vocab: serde_json::Map<String, serde_json::Value> = VOCAB
        .iter()
        .enumerate()
        .map(|(i, w)| (w.to_string(), serde_json::Value::from(i)))
        .collect();

    let special = |name: &str, type_id: u32| {
        serde_json::json!({ "SpecialToken": { "id": name, "type_id": type_id } })
    };
    let sequence = |name: &str, type_id: u32| {
        serde_json::json!({ "Sequence": { "id": name, "type_id": type_id } })
    };

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0)],
            "pair": [
                special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0),
                sequence("B", 1), special("[SEP]", 1)
            ],
            "special_tokens": {
                "[CLS]": { "id": "[CLS]", "ids": [2], "tokens": ["[CLS]"] },
                "[SEP]": { "id": "[SEP]", "ids": [3], "tokens": ["[SEP]"] }
            }
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    })
}

pub const VOCAB_SIZE: usize = VOCAB.len();

/// Trainable masked-mean embedding encoder, small enough for unit tests.
pub struct MeanEmbedding {
    embedding: candle_nn::Embedding,
    hidden: usize,
}

impl MeanEmbedding {
    pub fn new(vb: VarBuilder, hidden: usize) -> candle_core::Result<Self> {
        let embedding = candle_nn::embedding(VOCAB_SIZE, hidden, vb.pp("embedding"))?;
        Ok(Self { embedding, hidden })
    }
}

impl PooledEncoder for MeanEmbedding {
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        _train: bool,
    ) -> candle_core::Result<Tensor> {
        let embedded = candle_nn::Module::forward(&self.embedding, input_ids)?;
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = embedded.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1f32, f32::MAX)?;
        summed.broadcast_div(&counts)
    }

    fn hidden_size(&self) -> usize {
        self.hidden
    }
}

/// Hidden size of the model written by [`write_tiny_bert`].
pub const TINY_BERT_HIDDEN: usize = 8;

/// `config.json` for a one-layer BERT over the fixture vocabulary.
pub fn tiny_bert_config_json() -> serde_json::Value {
    serde_json::json!({
        "vocab_size": VOCAB_SIZE,
        "hidden_size": TINY_BERT_HIDDEN,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "max_position_embeddings": 64,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "model_type": "bert"
    })
}

/// Write a complete pretrained model directory (`config.json`,
/// `tokenizer.json`, `model.safetensors`) with random encoder weights.
pub fn write_tiny_bert(dir: &Path) -> PretrainedFiles {
    std::fs::create_dir_all(dir).expect("create model dir");
    let files = PretrainedFiles::in_dir(dir);

    let config = tiny_bert_config_json();
    std::fs::write(&files.config, config.to_string()).expect("write config.json");
    std::fs::write(&files.tokenizer, word_tokenizer_json().to_string())
        .expect("write tokenizer.json");

    let config: BertConfig = serde_json::from_value(config).expect("valid bert config");
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    BertEncoder::load(vb.pp("bert"), &config).expect("build tiny bert");
    varmap.save(&files.weights).expect("write model.safetensors");
    files
}
