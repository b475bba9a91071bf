//! # Single-text inference
//!
//! Classifies one raw review with the same preprocessing used in training.

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{KansouError, Result};
use crate::model::{SentimentClassifier, TextEncoder};
use crate::types::{NUM_CLASSES, Sentiment};

/// Predicted class and the full probability vector behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPrediction {
    pub sentiment: Sentiment,
    /// Indexed by [`Sentiment::index`].
    pub probabilities: [f32; NUM_CLASSES],
}

impl SentimentPrediction {
    /// Arg-max over a probability row. Ties go to the lower class index.
    pub fn from_probabilities(probabilities: [f32; NUM_CLASSES]) -> Self {
        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[best] {
                best = i;
            }
        }
        Self {
            sentiment: Sentiment::ALL[best],
            probabilities,
        }
    }

    /// Probability of the predicted class.
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.sentiment.index()]
    }
}

/// Encode `text`, run one forward pass and return the arg-max class.
///
/// Empty and over-long inputs go through the usual truncation and padding.
pub fn predict_text(
    classifier: &SentimentClassifier,
    encoder: &dyn TextEncoder,
    text: &str,
    max_length: usize,
    device: &Device,
) -> Result<SentimentPrediction> {
    if max_length == 0 {
        return Err(KansouError::InvalidConfig(
            "max_length must be positive".into(),
        ));
    }
    let encoded = encoder.encode(text, max_length)?;
    let input_ids = Tensor::from_slice(&encoded.input_ids, (1, max_length), device)?;
    let attention_mask = Tensor::from_slice(&encoded.attention_mask, (1, max_length), device)?;

    let row = classifier
        .probabilities(&input_ids, &attention_mask)?
        .squeeze(0)?
        .to_vec1::<f32>()?;
    let probabilities: [f32; NUM_CLASSES] = row.try_into().map_err(|row: Vec<f32>| {
        KansouError::InvalidConfig(format!(
            "classifier produced {} classes, expected {NUM_CLASSES}",
            row.len()
        ))
    })?;

    Ok(SentimentPrediction::from_probabilities(probabilities))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use candle_core::DType;
    use candle_nn::VarBuilder;

    use super::*;
    use crate::model::HfTextEncoder;
    use crate::testing::{MeanEmbedding, VOCAB_SIZE, word_tokenizer};

    const POSITIVE_WORDS: &[u32] = &[6, 9, 20]; // love, best, great
    const NEGATIVE_WORDS: &[u32] = &[15, 16, 17, 21]; // bad, crashes, hate, terrible

    /// Two-feature model: feature 0 counts positive words, feature 1 negative ones.
    fn opinionated_classifier(device: &Device) -> SentimentClassifier {
        let mut embedding = vec![0f32; VOCAB_SIZE * 2];
        for &id in POSITIVE_WORDS {
            embedding[id as usize * 2] = 1.0;
        }
        for &id in NEGATIVE_WORDS {
            embedding[id as usize * 2 + 1] = 1.0;
        }

        let mut tensors = HashMap::new();
        tensors.insert(
            "encoder.embedding.weight".to_string(),
            Tensor::from_vec(embedding, (VOCAB_SIZE, 2), device).unwrap(),
        );
        tensors.insert(
            "classifier.out.weight".to_string(),
            Tensor::new(&[[0f32, 4.0], [0.0, 0.0], [4.0, 0.0]], device).unwrap(),
        );
        tensors.insert(
            "classifier.out.bias".to_string(),
            Tensor::zeros(3, DType::F32, device).unwrap(),
        );

        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let encoder = MeanEmbedding::new(vb.pp("encoder"), 2).unwrap();
        SentimentClassifier::new(Box::new(encoder), 0.3, vb).unwrap()
    }

    #[test]
    fn enthusiastic_review_is_positive() {
        let device = Device::Cpu;
        let classifier = opinionated_classifier(&device);
        let encoder = HfTextEncoder::new(word_tokenizer());

        let prediction = predict_text(
            &classifier,
            &encoder,
            "I love completing my todos! Best app ever!!!",
            160,
            &device,
        )
        .unwrap();

        assert_eq!(prediction.sentiment, Sentiment::Positive);
        assert_eq!(prediction.sentiment.name(), "positive");
        let [neg, neu, pos] = prediction.probabilities;
        assert!(pos > neg && pos > neu);
        assert!(((neg + neu + pos) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn complaint_is_negative() {
        let device = Device::Cpu;
        let classifier = opinionated_classifier(&device);
        let encoder = HfTextEncoder::new(word_tokenizer());
        let prediction =
            predict_text(&classifier, &encoder, "it crashes , terrible", 16, &device).unwrap();
        assert_eq!(prediction.sentiment, Sentiment::Negative);
    }

    #[test]
    fn empty_text_still_yields_a_distribution() {
        let device = Device::Cpu;
        let classifier = opinionated_classifier(&device);
        let encoder = HfTextEncoder::new(word_tokenizer());
        let prediction = predict_text(&classifier, &encoder, "", 8, &device).unwrap();
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn argmax_prefers_lower_index_on_ties() {
        let p = SentimentPrediction::from_probabilities([0.4, 0.4, 0.2]);
        assert_eq!(p.sentiment, Sentiment::Negative);
        assert_eq!(p.confidence(), 0.4);
    }
}
