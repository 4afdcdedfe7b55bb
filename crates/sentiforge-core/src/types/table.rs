use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentiError};
use crate::types::record::RawRecord;

/// An in-memory table of string cells, as read from a CSV upload.
///
/// Empty cells are stored as `None` so that missing text or labels can be
/// reported instead of silently turning into empty strings. Whitespace-only
/// cells are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Create a table from column names and rows.
    ///
    /// Rows shorter than the header are padded with nulls; longer rows are
    /// truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a table from a CSV file with a header row.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Read a table from any CSV source with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        tracing::debug!(rows = rows.len(), columns = columns.len(), "loaded csv table");
        Ok(Self::new(columns, rows))
    }

    /// Column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows, each as wide as the header. Empty cells are `None`.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SentiError::MissingColumn {
                column: name.to_string(),
                available: self.columns.clone(),
            })
    }

    /// Iterate over the cells of one column.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = Option<&str>> + '_> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| row[idx].as_deref()))
    }

    /// Project the table onto a (text, label) pair of columns.
    ///
    /// Fails on the first null text or label cell.
    pub fn records(&self, input_column: &str, label_column: &str) -> Result<Vec<RawRecord>> {
        let text_idx = self.column_index(input_column)?;
        let label_idx = self.column_index(label_column)?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let text = row[text_idx].as_ref().ok_or_else(|| SentiError::MissingValue {
                    column: input_column.to_string(),
                    row: row_idx,
                })?;
                let label = row[label_idx].as_ref().ok_or_else(|| SentiError::MissingValue {
                    column: label_column.to_string(),
                    row: row_idx,
                })?;
                Ok(RawRecord::new(text.clone(), label.trim()))
            })
            .collect()
    }

    /// Per-column overview of the table.
    pub fn summary(&self) -> TableSummary {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnSummary {
                name: name.clone(),
                non_null: self.rows.iter().filter(|row| row[idx].is_some()).count(),
            })
            .collect();

        TableSummary {
            rows: self.rows.len(),
            columns,
        }
    }
}

/// Non-null count of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub non_null: usize,
}

/// Shape and null counts of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rows, {} columns", self.rows, self.columns.len())?;
        for (idx, column) in self.columns.iter().enumerate() {
            writeln!(
                f,
                "  {idx:>3}  {:<24} {} non-null",
                column.name, column.non_null
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "review,sentiment\n\
                       \"Great movie!! 10/10\",positive\n\
                       \"Dull, slow, boring.\",negative\n\
                       ,positive\n";

    #[test]
    fn test_from_csv_reader() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.columns(), &["review", "sentiment"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_empty_cell_is_null() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        let reviews: Vec<_> = table.column("review").unwrap().collect();
        assert_eq!(reviews[2], None);
    }

    #[test]
    fn test_whitespace_cell_is_text() {
        let csv = "review,sentiment\n\"   \",positive\nok,negative\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        let reviews: Vec<_> = table.column("review").unwrap().collect();
        assert_eq!(reviews[0], Some("   "));

        let records = table.records("review", "sentiment").unwrap();
        assert_eq!(records[0].text, "   ");
    }

    #[test]
    fn test_records_missing_column() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        let err = table.records("text", "sentiment").unwrap_err();
        assert!(matches!(err, SentiError::MissingColumn { ref column, .. } if column == "text"));
    }

    #[test]
    fn test_records_missing_value() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        let err = table.records("review", "sentiment").unwrap_err();
        assert!(matches!(err, SentiError::MissingValue { row: 2, .. }));
    }

    #[test]
    fn test_summary() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        let summary = table.summary();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns[0].non_null, 2);
        assert_eq!(summary.columns[1].non_null, 3);
        assert!(summary.to_string().contains("sentiment"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![Some("x".into())]],
        );
        let b: Vec<_> = table.column("b").unwrap().collect();
        assert_eq!(b, vec![None]);
    }
}
