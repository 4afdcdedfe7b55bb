//! Preprocessing for single free-text inputs at prediction time.

use std::sync::Arc;

use crate::data::batch::EncodedBatch;
use crate::text::lookup::{LookupTable, TokenId};
use crate::text::tokenizer::Tokenizer;

/// Encodes free text with the tokenizer and table used for training.
#[derive(Debug, Clone)]
pub struct InferencePreprocessor {
    tokenizer: Tokenizer,
    table: Arc<LookupTable>,
}

impl InferencePreprocessor {
    pub fn new(tokenizer: Tokenizer, table: Arc<LookupTable>) -> Self {
        Self { tokenizer, table }
    }

    pub fn table(&self) -> &Arc<LookupTable> {
        &self.table
    }

    /// Token ids for `text`.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        self.table.lookup_all(&self.tokenizer.tokenize(text))
    }

    /// `text` as a one-element unlabeled batch, ready for a model's predict call.
    pub fn encode_batch(&self, text: &str) -> EncodedBatch {
        EncodedBatch::unlabeled(vec![self.encode(text)])
    }
}
