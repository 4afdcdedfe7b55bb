//! # Batch Encoder
//!
//! Turns records into batches of token-id sequences paired with labels.
//! Encoding is a pure transformation: every input record appears in exactly
//! one output batch, in order.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentiError};
use crate::text::lookup::{LookupTable, PAD_ID, TokenId};
use crate::text::tokenizer::Tokenizer;
use crate::types::{Dataset, Record};

/// A batch of ragged token-id sequences with their labels.
///
/// Inference batches carry no labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodedBatch {
    pub sequences: Vec<Vec<TokenId>>,
    pub labels: Vec<u8>,
}

impl EncodedBatch {
    /// A labeled batch. Both vectors must have the same length.
    pub fn new(sequences: Vec<Vec<TokenId>>, labels: Vec<u8>) -> Self {
        debug_assert_eq!(sequences.len(), labels.len());
        Self { sequences, labels }
    }

    /// A batch without labels, for prediction.
    pub fn unlabeled(sequences: Vec<Vec<TokenId>>) -> Self {
        Self {
            sequences,
            labels: Vec::new(),
        }
    }

    /// Number of examples in the batch.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty() && self.labels.len() == self.sequences.len()
    }

    /// Length of the longest sequence.
    pub fn max_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Right-pad every sequence with [`PAD_ID`] to a common width.
    ///
    /// The width is the longest sequence, but never less than `min_width`,
    /// so a batch of empty texts still yields a non-degenerate matrix.
    /// Returns the row-major ids and the `(rows, width)` shape.
    pub fn padded(&self, min_width: usize) -> (Vec<TokenId>, (usize, usize)) {
        let width = self.max_len().max(min_width);
        let mut ids = Vec::with_capacity(self.len() * width);
        for sequence in &self.sequences {
            ids.extend_from_slice(sequence);
            ids.extend(std::iter::repeat_n(PAD_ID, width - sequence.len()));
        }
        (ids, (self.len(), width))
    }
}

/// Tokenizes and looks up records, grouping them into fixed-size batches.
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    tokenizer: Tokenizer,
    table: Arc<LookupTable>,
    batch_size: usize,
}

impl BatchEncoder {
    /// Create an encoder. `batch_size` must be positive.
    pub fn new(tokenizer: Tokenizer, table: Arc<LookupTable>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(SentiError::InvalidConfig(
                "batch size must be positive".into(),
            ));
        }
        Ok(Self {
            tokenizer,
            table,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn table(&self) -> &Arc<LookupTable> {
        &self.table
    }

    /// Encode one text into token ids.
    pub fn encode_text(&self, text: &str) -> Vec<TokenId> {
        self.table.lookup_all(&self.tokenizer.tokenize(text))
    }

    /// Encode a slice of records as a single batch.
    pub fn encode_records(&self, records: &[Record]) -> EncodedBatch {
        let sequences = records.iter().map(|r| self.encode_text(&r.text)).collect();
        let labels = records.iter().map(|r| r.label).collect();
        EncodedBatch::new(sequences, labels)
    }

    /// Lazily encode `dataset`, one batch per iteration step.
    pub fn batches<'a>(&'a self, dataset: &'a Dataset) -> EncodedBatches<'a> {
        EncodedBatches {
            encoder: self,
            chunks: dataset.records().chunks(self.batch_size),
        }
    }

    /// Number of batches `dataset` encodes into.
    pub fn num_batches(&self, dataset: &Dataset) -> usize {
        dataset.len().div_ceil(self.batch_size)
    }

    /// Encode every batch of `dataset` in parallel.
    ///
    /// Produces the same batches, in the same order, as [`Self::batches`].
    pub fn encode_parallel(&self, dataset: &Dataset) -> Vec<EncodedBatch> {
        dataset
            .records()
            .par_chunks(self.batch_size)
            .map(|chunk| self.encode_records(chunk))
            .collect()
    }
}

/// Lazy iterator over the encoded batches of a dataset.
pub struct EncodedBatches<'a> {
    encoder: &'a BatchEncoder,
    chunks: std::slice::Chunks<'a, Record>,
}

impl Iterator for EncodedBatches<'_> {
    type Item = EncodedBatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|chunk| self.encoder.encode_records(chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for EncodedBatches<'_> {}
