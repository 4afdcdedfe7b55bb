use std::sync::Arc;

use crate::data::batch::{BatchEncoder, EncodedBatch, EncodedBatches};
use crate::data::inference::InferencePreprocessor;
use crate::data::labels::{encode_labels, LabelMapping};
use crate::data::split::split;
use crate::error::{Result, SentiError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::progress::{Milestone, NoProgress, Progress};
use crate::text::lookup::{LookupTable, TokenId};
use crate::text::tokenizer::Tokenizer;
use crate::text::vocabulary::{Vocabulary, VocabularyBuilder};
use crate::types::{Dataset, Table};

/// Every artifact produced by a preprocessing run.
///
/// Built once by [`Pipeline::run`]; the lookup table inside is shared
/// read-only by the train/test encoders and by inference.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    config: PipelineConfig,
    labels: LabelMapping,
    train: Dataset,
    test: Dataset,
    vocabulary: Vocabulary,
    table: Arc<LookupTable>,
    encoder: BatchEncoder,
    inference: InferencePreprocessor,
}

impl PipelineContext {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn train(&self) -> &Dataset {
        &self.train
    }

    pub fn test(&self) -> &Dataset {
        &self.test
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn table(&self) -> &Arc<LookupTable> {
        &self.table
    }

    pub fn encoder(&self) -> &BatchEncoder {
        &self.encoder
    }

    /// Lazily encoded training batches.
    pub fn encoded_train(&self) -> EncodedBatches<'_> {
        self.encoder.batches(&self.train)
    }

    /// Lazily encoded test batches.
    pub fn encoded_test(&self) -> EncodedBatches<'_> {
        self.encoder.batches(&self.test)
    }

    /// Token ids for a free-text input.
    pub fn encode_text(&self, text: &str) -> Vec<TokenId> {
        self.inference.encode(text)
    }

    /// A free-text input as a one-element batch.
    pub fn encode_text_batch(&self, text: &str) -> EncodedBatch {
        self.inference.encode_batch(text)
    }
}

/// The preprocessing pipeline: labels → split → vocabulary → table → encoders.
pub struct Pipeline;

impl Pipeline {
    /// Run the pipeline without progress reporting.
    pub fn run(table: &Table, config: &PipelineConfig) -> Result<PipelineContext> {
        Self::run_with_progress(table, config, &mut NoProgress)
    }

    /// Run the pipeline, reporting each [`Milestone`] to `progress`.
    ///
    /// Every check happens before any batch is encoded; on error nothing is
    /// returned.
    pub fn run_with_progress(
        table: &Table,
        config: &PipelineConfig,
        progress: &mut dyn Progress,
    ) -> Result<PipelineContext> {
        config.validate()?;

        let records = table.records(&config.input_column, &config.label_column)?;
        if records.is_empty() {
            return Err(SentiError::EmptyDataset { what: "input" });
        }

        let (dataset, labels) = encode_labels(records, &config.label_column)?;
        tracing::info!(
            rows = dataset.len(),
            zero = %labels.zero,
            one = %labels.one,
            "labels encoded"
        );
        progress.report(Milestone::LabelsEncoded);

        let (train, test) = split(dataset, config.split_ratio)?;
        tracing::info!(train = train.len(), test = test.len(), "dataset split");
        progress.report(Milestone::Split);

        let tokenizer = Tokenizer::new();
        let vocabulary = VocabularyBuilder::new(config.vocab_size)
            .with_max_batches(config.max_vocab_batches)
            .build_from_dataset(&train, &tokenizer, config.batch_size);
        tracing::info!(words = vocabulary.len(), "vocabulary built");
        progress.report(Milestone::VocabularyBuilt);

        let table = Arc::new(LookupTable::new(&vocabulary, config.oov_buckets_u32()));
        tracing::info!(id_space = table.id_space(), "lookup table built");
        progress.report(Milestone::TableBuilt);

        let encoder = BatchEncoder::new(tokenizer, Arc::clone(&table), config.batch_size)?;
        let inference = InferencePreprocessor::new(tokenizer, Arc::clone(&table));
        tracing::info!(
            train_batches = encoder.num_batches(&train),
            test_batches = encoder.num_batches(&test),
            "encoders ready"
        );
        progress.report(Milestone::Encoded);

        Ok(PipelineContext {
            config: config.clone(),
            labels,
            train,
            test,
            vocabulary,
            table,
            encoder,
            inference,
        })
    }
}
