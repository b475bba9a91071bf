use serde::{Deserialize, Serialize};

use super::sentiment::Sentiment;

/// A single app review with its star rating and derived sentiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Raw review text.
    pub content: String,
    /// Star rating in `1..=5`.
    pub score: u8,
    /// Class derived from `score`.
    pub sentiment: Sentiment,
}

impl ReviewRecord {
    /// Creates a record, deriving the sentiment label from the rating.
    #[must_use]
    pub fn new(content: impl Into<String>, score: u8) -> Self {
        Self {
            content: content.into(),
            score,
            sentiment: Sentiment::from_rating(i64::from(score)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_derived_from_score() {
        let labels: Vec<Sentiment> = [1u8, 3, 5]
            .into_iter()
            .map(|score| ReviewRecord::new("text", score).sentiment)
            .collect();
        assert_eq!(
            labels,
            vec![Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive]
        );
    }
}
