//! Review table loading.
//!
//! The input is any delimited file with a header row. Only the text and
//! rating columns are read; every other column is ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{KansouError, Result};
use crate::types::{NUM_CLASSES, ReviewRecord, Sentiment};

/// Names of the columns holding the review text and its star rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub text: String,
    pub rating: String,
    pub delimiter: u8,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            text: "content".to_string(),
            rating: "score".to_string(),
            delimiter: b',',
        }
    }
}

impl CsvColumns {
    pub fn new(text: impl Into<String>, rating: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rating: rating.into(),
            ..Self::default()
        }
    }

    /// Set the field delimiter (e.g. `b'\t'` for TSV).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Load all reviews from a delimited file on disk.
pub fn load_reviews<P: AsRef<Path>>(path: P, columns: &CsvColumns) -> Result<Vec<ReviewRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = read_reviews(file, columns)?;
    info!(path = %path.display(), reviews = records.len(), "loaded review table");
    Ok(records)
}

/// Read reviews from any reader. Any malformed row aborts the load.
pub fn read_reviews<R: Read>(reader: R, columns: &CsvColumns) -> Result<Vec<ReviewRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(columns.delimiter)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let text_idx = column_index(&headers, &columns.text)?;
    let rating_idx = column_index(&headers, &columns.rating)?;
    debug!(text_idx, rating_idx, "resolved review columns");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let content = row.get(text_idx).ok_or_else(|| KansouError::InvalidRow {
            line,
            message: format!("no value for column {:?}", columns.text),
        })?;
        let raw_rating = row.get(rating_idx).ok_or_else(|| KansouError::InvalidRow {
            line,
            message: format!("no value for column {:?}", columns.rating),
        })?;

        let rating = parse_rating(raw_rating).ok_or_else(|| KansouError::InvalidRow {
            line,
            message: format!("rating {raw_rating:?} is not an integer"),
        })?;
        let score = u8::try_from(rating)
            .ok()
            .filter(|s| (1..=5).contains(s))
            .ok_or(KansouError::InvalidRating { line, rating })?;

        records.push(ReviewRecord::new(content, score));
    }

    Ok(records)
}

/// Count of records per sentiment class, in class-index order.
#[must_use]
pub fn class_distribution(records: &[ReviewRecord]) -> [usize; NUM_CLASSES] {
    let mut counts = [0usize; NUM_CLASSES];
    for record in records {
        counts[record.sentiment.index()] += 1;
    }
    counts
}

/// Log the class balance of a set of records.
pub fn log_class_distribution(name: &str, records: &[ReviewRecord]) {
    let counts = class_distribution(records);
    info!(
        split = name,
        negative = counts[Sentiment::Negative.index()],
        neutral = counts[Sentiment::Neutral.index()],
        positive = counts[Sentiment::Positive.index()],
        "class distribution"
    );
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| KansouError::MissingColumn {
            column: name.to_string(),
        })
}

// Spreadsheet exports sometimes write integral ratings as "4.0".
fn parse_rating(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(table: &str) -> Result<Vec<ReviewRecord>> {
        read_reviews(table.as_bytes(), &CsvColumns::default())
    }

    #[test]
    fn three_rows_map_to_three_classes() {
        let table = "userName,content,score\n\
                     a,Crashes all the time,1\n\
                     b,\"It's ok, I guess\",3\n\
                     c,Love it,5\n";
        let records = read(table).unwrap();
        let labels: Vec<Sentiment> = records.iter().map(|r| r.sentiment).collect();
        assert_eq!(
            labels,
            vec![Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive]
        );
        assert_eq!(records[1].content, "It's ok, I guess");
    }

    #[test]
    fn missing_column_is_reported() {
        let err = read("content,stars\nfine,4\n").unwrap_err();
        assert!(matches!(err, KansouError::MissingColumn { ref column } if column == "score"));
    }

    #[test]
    fn non_numeric_rating_fails_the_load() {
        let err = read("content,score\nfine,four\n").unwrap_err();
        assert!(matches!(err, KansouError::InvalidRow { line: 2, .. }));
    }

    #[test]
    fn out_of_range_rating_fails_the_load() {
        let err = read("content,score\nfine,4\nweird,6\n").unwrap_err();
        assert!(matches!(
            err,
            KansouError::InvalidRating { line: 3, rating: 6 }
        ));
    }

    #[test]
    fn float_formatted_ratings_are_accepted() {
        let records = read("content,score\nmeh,3.0\n").unwrap();
        assert_eq!(records[0].score, 3);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(matches!(
            read("content,score\nonly text\n"),
            Err(KansouError::Csv(_))
        ));
    }

    #[test]
    fn tab_delimited_input() {
        let columns = CsvColumns::new("review", "rating").with_delimiter(b'\t');
        let records = read_reviews("review\trating\nnice\t4\n".as_bytes(), &columns).unwrap();
        assert_eq!(records, vec![ReviewRecord::new("nice", 4)]);
    }

    #[test]
    fn distribution_counts_each_class() {
        let records = vec![
            ReviewRecord::new("a", 1),
            ReviewRecord::new("b", 2),
            ReviewRecord::new("c", 3),
            ReviewRecord::new("d", 5),
        ];
        assert_eq!(class_distribution(&records), [2, 1, 1]);
    }
}
