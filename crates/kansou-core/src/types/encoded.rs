use super::sentiment::Sentiment;

/// Fixed-length token ids and attention mask for one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub input_ids: Vec<u32>,
    /// 1 for a real token, 0 for padding.
    pub attention_mask: Vec<u32>,
}

impl EncodedText {
    /// Truncates or pads `token_ids` to exactly `max_length` positions.
    ///
    /// Both returned vectors have length `max_length`. The mask holds
    /// `min(token_ids.len(), max_length)` leading ones followed by zeros.
    #[must_use]
    pub fn padded(token_ids: &[u32], max_length: usize, pad_id: u32) -> Self {
        let real = token_ids.len().min(max_length);

        let mut input_ids = Vec::with_capacity(max_length);
        input_ids.extend_from_slice(&token_ids[..real]);
        input_ids.resize(max_length, pad_id);

        let mut attention_mask = vec![1u32; real];
        attention_mask.resize(max_length, 0);

        Self {
            input_ids,
            attention_mask,
        }
    }

    /// Number of positions holding a real token.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Dataset item: encoded text plus its label and the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedExample {
    pub text: String,
    pub encoding: EncodedText,
    pub label: Sentiment,
}
