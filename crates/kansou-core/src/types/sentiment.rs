use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of sentiment classes the classifier head projects onto.
pub const NUM_CLASSES: usize = 3;

/// Sentiment class derived from a 1-5 star rating.
///
/// The discriminant doubles as the class index used by the classifier head,
/// the loss and the reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// 1 or 2 stars.
    Negative = 0,
    /// 3 stars.
    Neutral = 1,
    /// 4 or 5 stars.
    Positive = 2,
}

impl Sentiment {
    /// All classes in index order.
    pub const ALL: [Sentiment; NUM_CLASSES] = [Self::Negative, Self::Neutral, Self::Positive];

    /// Maps a star rating onto a sentiment class.
    ///
    /// Total over all integers: anything at or below 2 is negative, anything
    /// at or above 4 is positive.
    #[must_use]
    pub fn from_rating(rating: i64) -> Self {
        match rating {
            r if r <= 2 => Self::Negative,
            3 => Self::Neutral,
            _ => Self::Positive,
        }
    }

    /// Class index in `0..NUM_CLASSES`.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Sentiment::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lowercase class name as printed in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
