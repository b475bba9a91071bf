use thiserror::Error;

/// Errors that can occur during Kansou core operations.
#[derive(Debug, Error)]
pub enum KansouError {
    /// Reading an input file or writing an artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The review table is not valid delimited text.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the table header.
    #[error("missing column {column:?} in review table")]
    MissingColumn {
        /// The configured column name.
        column: String,
    },

    /// A row could not be turned into a review record.
    #[error("invalid review at line {line}: {message}")]
    InvalidRow {
        /// 1-based line of the record in the source file.
        line: u64,
        /// What was wrong with the row.
        message: String,
    },

    /// A star rating outside 1..=5.
    #[error("rating {rating} at line {line} is outside 1..=5")]
    InvalidRating {
        /// 1-based line of the record in the source file.
        line: u64,
        /// The offending rating.
        rating: i64,
    },

    /// A configuration value is unusable (zero batch size, zero max length...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external tokenizer failed.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Pretrained artifacts could not be located or loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Candle ML framework error.
    #[error("ML backend error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for Kansou operations.
pub type Result<T> = std::result::Result<T, KansouError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = KansouError::MissingColumn {
            column: "content".into(),
        };
        assert_eq!(err.to_string(), "missing column \"content\" in review table");

        let err = KansouError::InvalidRating { line: 7, rating: 9 };
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KansouError>();
    }
}
