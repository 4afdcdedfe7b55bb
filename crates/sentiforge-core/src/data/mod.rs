pub mod batch;
pub mod inference;
pub mod labels;
pub mod split;

pub use batch::{BatchEncoder, EncodedBatch, EncodedBatches};
pub use inference::InferencePreprocessor;
pub use labels::{encode_labels, LabelMapping};
pub use split::{split, split_index};
