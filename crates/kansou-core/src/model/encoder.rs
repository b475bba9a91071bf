//! # Encoder seam
//!
//! The pretrained model is used through two narrow capabilities: turning a
//! text into fixed-length token ids, and turning token ids into one pooled
//! vector per sequence. Everything else in the crate depends only on these
//! traits.

use std::path::Path;

use candle_core::Tensor;
use tokenizers::{PaddingDirection, PostProcessor, Tokenizer, TruncationDirection};

use crate::error::{KansouError, Result};
use crate::types::EncodedText;

/// Text to fixed-length token ids.
pub trait TextEncoder: Send + Sync {
    /// Encode `text` to exactly `max_length` ids and mask positions.
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedText>;

    /// Number of tokens `text` produces before truncation, special tokens included.
    fn token_count(&self, text: &str) -> Result<usize>;

    /// Id used for padding positions.
    fn pad_id(&self) -> u32;
}

/// Token ids to one pooled vector per sequence.
pub trait PooledEncoder: Send + Sync {
    /// `input_ids`, `attention_mask`: `[batch, seq_len]`.
    /// Returns `[batch, hidden_size]`.
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        train: bool,
    ) -> candle_core::Result<Tensor>;

    fn hidden_size(&self) -> usize;
}

/// [`TextEncoder`] backed by a Hugging Face `tokenizer.json`.
pub struct HfTextEncoder {
    tokenizer: Tokenizer,
    pad_id: u32,
    pad_token: String,
}

impl HfTextEncoder {
    /// Wrap an already-built tokenizer.
    ///
    /// The pad token is taken from the tokenizer's padding settings, then
    /// from a `[PAD]` vocabulary entry, falling back to id 0.
    pub fn new(mut tokenizer: Tokenizer) -> Self {
        let (pad_id, pad_token) = match tokenizer.get_padding() {
            Some(params) => (params.pad_id, params.pad_token.clone()),
            None => match tokenizer.token_to_id("[PAD]") {
                Some(id) => (id, "[PAD]".to_string()),
                None => (0, "[PAD]".to_string()),
            },
        };

        // Length handling is done per call, not by the tokenizer's own settings.
        tokenizer.with_padding(None);
        let _ = tokenizer.with_truncation(None);

        Self {
            tokenizer,
            pad_id,
            pad_token,
        }
    }

    /// Load `tokenizer.json` from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            KansouError::ModelLoad(format!("tokenizer {}: {e}", path.display()))
        })?;
        Ok(Self::new(tokenizer))
    }

    fn special_token_count(&self) -> usize {
        self.tokenizer
            .get_post_processor()
            .map(|p| p.added_tokens(false))
            .unwrap_or(0)
    }
}

impl TextEncoder for HfTextEncoder {
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedText> {
        let mut encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| KansouError::Tokenizer(e.to_string()))?;

        // Leave room for [CLS]/[SEP] so truncation never drops them.
        let budget = max_length.saturating_sub(self.special_token_count());
        encoding.truncate(budget, 0, TruncationDirection::Right);

        let mut encoding = self
            .tokenizer
            .post_process(encoding, None, true)
            .map_err(|e| KansouError::Tokenizer(e.to_string()))?;
        encoding.truncate(max_length, 0, TruncationDirection::Right);
        encoding.pad(
            max_length,
            self.pad_id,
            0,
            &self.pad_token,
            PaddingDirection::Right,
        );

        let real = encoding
            .get_attention_mask()
            .iter()
            .filter(|&&m| m == 1)
            .count();
        Ok(EncodedText::padded(
            &encoding.get_ids()[..real],
            max_length,
            self.pad_id,
        ))
    }

    fn token_count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| KansouError::Tokenizer(e.to_string()))?;
        Ok(encoding.len())
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }
}
