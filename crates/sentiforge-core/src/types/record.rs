use serde::{Deserialize, Serialize};

/// A row as it comes out of the table: text plus the label's surface value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRecord {
    pub text: String,
    pub label: String,
}

impl RawRecord {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// A row with its label binary-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub label: u8,
}

impl Record {
    pub fn new(text: impl Into<String>, label: u8) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// An ordered, immutable sequence of label-encoded records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Number of records labeled `1`.
    pub fn ones(&self) -> usize {
        self.records.iter().filter(|r| r.label == 1).count()
    }
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_counts_ones() {
        let dataset = Dataset::new(vec![
            Record::new("good", 1),
            Record::new("bad", 0),
            Record::new("great", 1),
        ]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.ones(), 2);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = Record::new("Great movie!!", 1);
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
