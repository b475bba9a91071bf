pub mod bert;
pub mod classifier;
pub mod encoder;
pub mod head;
pub mod pretrained;

pub use bert::BertEncoder;
pub use classifier::{SentimentClassifier, build_bert_classifier, load_bert_classifier};
pub use encoder::{HfTextEncoder, PooledEncoder, TextEncoder};
pub use head::ClassifierHead;
pub use pretrained::{PretrainedFiles, PretrainedLoad, load_pretrained_weights, resolve_model_dir};
