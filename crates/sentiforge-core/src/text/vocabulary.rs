//! # Vocabulary Builder
//!
//! Counts word frequencies over a bounded sample of tokenized batches and
//! keeps the most frequent words.
//!
//! Ordering is by count (descending); words with the same count keep the
//! order in which they were first encountered, which makes the result
//! reproducible for a given input order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::text::tokenizer::Tokenizer;
use crate::types::Dataset;

/// Default cap on the number of batches sampled to build a vocabulary.
pub const DEFAULT_MAX_BATCHES: usize = 1000;

/// A word with its observed frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// Most frequent words of a corpus sample, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    entries: Vec<WordCount>,
}

impl Vocabulary {
    /// Build directly from words in rank order (counts unknown, set to 0).
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<WordCount> = Vec::new();
        for word in words {
            let word = word.into();
            if !entries.iter().any(|e| e.word == word) {
                entries.push(WordCount { word, count: 0 });
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order.
    pub fn entries(&self) -> &[WordCount] {
        &self.entries
    }

    /// Words in rank order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.word.as_str())
    }
}

/// Frequency-ranked vocabulary builder.
#[derive(Debug, Clone)]
pub struct VocabularyBuilder {
    vocab_size: usize,
    max_batches: Option<usize>,
}

impl VocabularyBuilder {
    /// Keep at most `vocab_size` words, sampling at most
    /// [`DEFAULT_MAX_BATCHES`] batches.
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            max_batches: Some(DEFAULT_MAX_BATCHES),
        }
    }

    /// Set the sampling cap; `None` reads every batch.
    pub fn with_max_batches(mut self, max_batches: Option<usize>) -> Self {
        self.max_batches = max_batches;
        self
    }

    /// Count words over batches of tokenized texts.
    pub fn build<I>(&self, batches: I) -> Vocabulary
    where
        I: IntoIterator<Item = Vec<Vec<String>>>,
    {
        let limit = self.max_batches.unwrap_or(usize::MAX);

        // word -> (count, first-seen position)
        let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
        let mut sampled = 0usize;

        for batch in batches.into_iter().take(limit) {
            sampled += 1;
            for tokens in batch {
                for token in tokens {
                    let next_rank = counts.len();
                    counts.entry(token).or_insert((0, next_rank)).0 += 1;
                }
            }
        }

        let mut ranked: Vec<(String, u64, usize)> = counts
            .into_iter()
            .map(|(word, (count, first))| (word, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        let distinct = ranked.len();
        ranked.truncate(self.vocab_size);

        tracing::debug!(
            sampled_batches = sampled,
            distinct_words = distinct,
            kept = ranked.len(),
            "built vocabulary"
        );

        Vocabulary {
            entries: ranked
                .into_iter()
                .map(|(word, count, _)| WordCount { word, count })
                .collect(),
        }
    }

    /// Tokenize `dataset` in batches of `batch_size` and count its words.
    pub fn build_from_dataset(
        &self,
        dataset: &Dataset,
        tokenizer: &Tokenizer,
        batch_size: usize,
    ) -> Vocabulary {
        let batches = dataset.records().chunks(batch_size.max(1)).map(|chunk| {
            chunk
                .iter()
                .map(|record| tokenizer.tokenize(&record.text))
                .collect::<Vec<_>>()
        });
        self.build(batches)
    }
}
