pub mod record;
pub mod table;

pub use record::{Dataset, RawRecord, Record};
pub use table::{ColumnSummary, Table, TableSummary};
