pub mod encoded;
pub mod review;
pub mod sentiment;

pub use encoded::{EncodedExample, EncodedText};
pub use review::ReviewRecord;
pub use sentiment::{NUM_CLASSES, Sentiment};
