//! Human readable summaries of encoded tables.
use std::fmt;

use datafusion::arrow::datatypes::DataType;

use super::table::decode_table;
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSummary {
    pub index: usize,
    pub name: String,
    pub data_type: DataType,
    /// Total number of values across all batches.
    pub length: usize,
    pub null_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub num_rows: usize,
    pub num_batches: usize,
    pub columns: Vec<ColumnSummary>,
}

/// Describe an encoded table buffer.
pub fn describe_table(buf: &[u8]) -> Result<TableSummary> {
    let table = decode_table(buf)?;

    let columns = table
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let (length, null_count) = table.batches().iter().fold((0, 0), |(len, nulls), b| {
                let col = b.column(index);
                (len + col.len(), nulls + col.null_count())
            });
            ColumnSummary {
                index,
                name: field.name().clone(),
                data_type: field.data_type().clone(),
                length,
                null_count,
            }
        })
        .collect();

    Ok(TableSummary {
        num_rows: table.num_rows(),
        num_batches: table.batches().len(),
        columns,
    })
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows: {}, batches: {}", self.num_rows, self.num_batches)?;
        for col in &self.columns {
            writeln!(
                f,
                "  [{}] {}: {} (length: {}, nulls: {})",
                col.index, col.name, col.data_type, col.length, col.null_count
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::arrow::array::{ArrayRef, Int64Array};

    use super::*;
    use crate::codec::encode_table;
    use crate::table::Table;
    use crate::table::testutil::cost_table;

    #[test]
    fn describe_cost_table() {
        let buf = encode_table(&cost_table().rechunk(4).unwrap()).unwrap();
        let summary = describe_table(&buf).unwrap();

        assert_eq!(10, summary.num_rows);
        assert_eq!(3, summary.num_batches);
        assert_eq!(3, summary.columns.len());
        assert_eq!("cost", summary.columns[1].name);
        assert_eq!(DataType::Float64, summary.columns[1].data_type);
        assert_eq!(10, summary.columns[1].length);

        let out = summary.to_string();
        assert!(out.starts_with("rows: 10, batches: 3"), "{out}");
    }

    #[test]
    fn counts_nulls() {
        let table = Table::try_from_columns([(
            "v",
            Arc::new(Int64Array::from(vec![Some(1), None, None])) as ArrayRef,
        )])
        .unwrap();
        let summary = describe_table(&encode_table(&table).unwrap()).unwrap();
        assert_eq!(2, summary.columns[0].null_count);
    }
}
