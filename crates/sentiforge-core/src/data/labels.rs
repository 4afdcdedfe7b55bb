//! # Label Encoder
//!
//! Turns the label column's surface values into `0`/`1`.
//!
//! The first distinct value encountered becomes `0` and the second becomes
//! `1`. A column that already holds only `0` and `1` keeps its numeric
//! meaning regardless of order.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentiError};
use crate::types::{Dataset, RawRecord, Record};

/// How many distinct values to echo back in an `InvalidLabelCardinality` error.
const MAX_REPORTED_VALUES: usize = 8;

/// The surface value behind each binary label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    /// Surface value encoded as `0`, the first one seen in the column.
    pub zero: String,
    /// Surface value encoded as `1`.
    pub one: String,
}

impl LabelMapping {
    /// Mapping for columns that are already `0`/`1`.
    pub fn binary() -> Self {
        Self {
            zero: "0".into(),
            one: "1".into(),
        }
    }

    /// Encode a surface value, or `None` if it is neither side of the mapping.
    pub fn encode(&self, value: &str) -> Option<u8> {
        let value = value.trim();
        if value == self.zero {
            Some(0)
        } else if value == self.one {
            Some(1)
        } else {
            None
        }
    }

    /// Surface value for an encoded label.
    pub fn name(&self, label: u8) -> &str {
        if label == 0 {
            &self.zero
        } else {
            &self.one
        }
    }
}

/// Binary-encode the labels of `records`.
///
/// `column` is only used in error messages.
pub fn encode_labels(records: Vec<RawRecord>, column: &str) -> Result<(Dataset, LabelMapping)> {
    if records.is_empty() {
        return Err(SentiError::EmptyDataset { what: "input" });
    }

    let mut distinct: Vec<&str> = Vec::new();
    for record in &records {
        if !distinct.contains(&record.label.as_str()) {
            distinct.push(record.label.as_str());
        }
    }

    let already_binary = distinct.iter().all(|v| *v == "0" || *v == "1");
    let mapping = if already_binary {
        LabelMapping::binary()
    } else if distinct.len() == 2 {
        LabelMapping {
            zero: distinct[0].to_string(),
            one: distinct[1].to_string(),
        }
    } else {
        return Err(SentiError::InvalidLabelCardinality {
            column: column.to_string(),
            found: distinct.len(),
            values: distinct
                .iter()
                .take(MAX_REPORTED_VALUES)
                .map(|v| v.to_string())
                .collect(),
        });
    };

    // Every label is one of the two mapped values at this point.
    let encoded = records
        .into_iter()
        .map(|record| {
            let label = u8::from(record.label == mapping.one);
            Record::new(record.text, label)
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        column,
        zero = %mapping.zero,
        one = %mapping.one,
        "encoded labels"
    );

    Ok((Dataset::new(encoded), mapping))
}
