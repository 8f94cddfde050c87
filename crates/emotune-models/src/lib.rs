//! Emotune Models
//!
//! Candle implementation of the training engine: a BERT sequence classifier,
//! GoEmotions data loading, pretrained checkpoint resolution and the
//! AdamW training loop.

pub mod classifier;
pub mod data;
pub mod device;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod tokenizer;

pub use classifier::{BertClassifier, BertShape};
pub use data::{EmotionDataset, EncodedSplit, Example, read_split};
pub use device::{device_name, select_device};
pub use engine::CandleEngine;
pub use error::{ModelError, ModelResult};
pub use scheduler::LinearSchedule;
pub use source::{ModelFiles, ModelSource, default_cache_dir};
pub use tokenizer::{BertTokenizer, Encoding};
