use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentiError};
use crate::text::vocabulary::DEFAULT_MAX_BATCHES;

/// Configuration for a preprocessing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Column holding the free text.
    pub input_column: String,
    /// Column holding the label.
    pub label_column: String,
    /// Fraction of rows assigned to the training split, exclusive `(0, 1)`.
    pub split_ratio: f64,
    /// Examples per encoded batch.
    pub batch_size: usize,
    /// Maximum number of vocabulary words.
    pub vocab_size: usize,
    /// Number of hashed buckets for unknown words.
    pub num_oov_buckets: usize,
    /// Cap on batches sampled for the vocabulary (`None` = all).
    pub max_vocab_batches: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_column: "text".into(),
            label_column: "label".into(),
            split_ratio: 0.5,
            batch_size: 32,
            vocab_size: 10_000,
            num_oov_buckets: 1_000,
            max_vocab_batches: Some(DEFAULT_MAX_BATCHES),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration for the given columns with default settings.
    pub fn new(input_column: impl Into<String>, label_column: impl Into<String>) -> Self {
        Self {
            input_column: input_column.into(),
            label_column: label_column.into(),
            ..Self::default()
        }
    }

    /// Set the train fraction.
    pub fn with_split_ratio(mut self, ratio: f64) -> Self {
        self.split_ratio = ratio;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the vocabulary size.
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Set the number of OOV buckets.
    pub fn with_num_oov_buckets(mut self, buckets: usize) -> Self {
        self.num_oov_buckets = buckets;
        self
    }

    /// Set the vocabulary sampling cap.
    pub fn with_max_vocab_batches(mut self, max_batches: Option<usize>) -> Self {
        self.max_vocab_batches = max_batches;
        self
    }

    /// Parse and validate a JSON configuration.
    ///
    /// Malformed values (e.g. a negative `vocab_size`) are reported as
    /// [`SentiError::InvalidConfig`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = Self::parse_json_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read_json_path(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration without range checks.
    ///
    /// Fields may be overridden afterwards; [`Pipeline::run`](crate::Pipeline::run)
    /// validates the final values.
    pub fn parse_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SentiError::InvalidConfig(e.to_string()))
    }

    /// Read a JSON configuration file without range checks.
    pub fn read_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::parse_json_str(&json)
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        if self.input_column.trim().is_empty() {
            return Err(invalid("input column must be set"));
        }
        if self.label_column.trim().is_empty() {
            return Err(invalid("label column must be set"));
        }
        if self.input_column == self.label_column {
            return Err(invalid("input and label columns must differ"));
        }
        if !self.split_ratio.is_finite() || self.split_ratio <= 0.0 || self.split_ratio >= 1.0 {
            return Err(invalid(format!(
                "split ratio must be strictly between 0 and 1, got {}",
                self.split_ratio
            )));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be positive"));
        }
        if self.max_vocab_batches == Some(0) {
            return Err(invalid("vocabulary sample must cover at least one batch"));
        }

        let id_space = 2u64
            .saturating_add(self.num_oov_buckets.max(1) as u64)
            .saturating_add(self.vocab_size as u64);
        if id_space > u64::from(u32::MAX) {
            return Err(invalid(format!(
                "vocab_size + num_oov_buckets too large ({id_space} ids)"
            )));
        }

        Ok(())
    }

    /// `num_oov_buckets` as the table's integer type. Call after [`Self::validate`].
    pub(crate) fn oov_buckets_u32(&self) -> u32 {
        u32::try_from(self.num_oov_buckets).unwrap_or(u32::MAX)
    }
}

fn invalid(msg: impl Into<String>) -> SentiError {
    SentiError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new("review", "sentiment")
            .with_split_ratio(0.8)
            .with_batch_size(64)
            .with_vocab_size(500)
            .with_num_oov_buckets(10)
            .with_max_vocab_batches(None);

        assert_eq!(config.input_column, "review");
        assert_eq!(config.split_ratio, 0.8);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.max_vocab_batches, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_split_ratio_bounds() {
        for ratio in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let config = PipelineConfig::default().with_split_ratio(ratio);
            assert!(
                matches!(config.validate(), Err(SentiError::InvalidConfig(_))),
                "ratio {ratio}"
            );
        }
    }

    #[test]
    fn test_zero_batch_size() {
        let config = PipelineConfig::default().with_batch_size(0);
        assert!(matches!(config.validate(), Err(SentiError::InvalidConfig(_))));
    }

    #[test]
    fn test_same_columns_rejected() {
        let config = PipelineConfig::new("text", "text");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_vocab_and_buckets_allowed() {
        let config = PipelineConfig::default()
            .with_vocab_size(0)
            .with_num_oov_buckets(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = PipelineConfig::from_json_str(
            r#"{"input_column": "review", "label_column": "sentiment", "batch_size": 16}"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.vocab_size, 10_000);
    }

    #[test]
    fn test_from_json_negative_vocab() {
        let err = PipelineConfig::from_json_str(r#"{"vocab_size": -5}"#).unwrap_err();
        assert!(matches!(err, SentiError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_json_defers_range_checks() {
        let json = r#"{"split_ratio": 1.0}"#;
        assert!(PipelineConfig::from_json_str(json).is_err());

        let config = PipelineConfig::parse_json_str(json).unwrap();
        assert_eq!(config.split_ratio, 1.0);
        assert!(config.with_split_ratio(0.5).validate().is_ok());

        let err = PipelineConfig::parse_json_str(r#"{"vocab_size": -5}"#).unwrap_err();
        assert!(matches!(err, SentiError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_unknown_field() {
        let err = PipelineConfig::from_json_str(r#"{"vocab": 5}"#).unwrap_err();
        assert!(matches!(err, SentiError::InvalidConfig(_)));
    }
}
