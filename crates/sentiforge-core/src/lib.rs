//! # SentiForge Core
//!
//! Turns a labeled text table into encoded integer-sequence batches for a
//! binary sentiment model: label encoding, train/test split, tokenization,
//! vocabulary counting, word-id lookup and batch encoding.
//!
//! ## Quick Start
//!
//! ```rust
//! use sentiforge_core::{Pipeline, PipelineConfig, Table};
//!
//! let csv = "review,sentiment\n\
//!            Great movie!! 10/10,pos\n\
//!            Boring and slow,neg\n\
//!            A great cast,pos\n\
//!            Slow plot,neg\n";
//! let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
//! let config = PipelineConfig::new("review", "sentiment")
//!     .with_batch_size(2)
//!     .with_vocab_size(100)
//!     .with_num_oov_buckets(1);
//!
//! let ctx = Pipeline::run(&table, &config).unwrap();
//! assert_eq!(ctx.train().len(), 2);
//! assert_eq!(ctx.encoded_train().map(|b| b.len()).sum::<usize>(), 2);
//! ```
pub mod data;
pub mod error;
pub mod pipeline;
pub mod text;
pub mod types;

// Re-export primary API
pub use data::{BatchEncoder, EncodedBatch, InferencePreprocessor, LabelMapping};
pub use error::{Result, SentiError};
pub use pipeline::{Milestone, Pipeline, PipelineConfig, PipelineContext, Progress};
pub use text::{LookupTable, TokenId, Tokenizer, Vocabulary, VocabularyBuilder};
pub use types::{Dataset, RawRecord, Record, Table, TableSummary};
