//! Schema plus an ordered list of record batches.

use std::sync::Arc;

use datafusion::arrow::array::ArrayRef;
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::{Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;

use crate::errors::{Result, SkyhookError};

/// A logical table.
///
/// How rows are split across batches is not part of a table's identity, two
/// tables with the same schema and the same rows in the same order are equal.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Create a table, checking that every batch carries `schema`'s fields.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for (idx, batch) in batches.iter().enumerate() {
            if batch.schema().fields() != schema.fields() {
                return Err(SkyhookError::SchemaProjection(format!(
                    "batch {idx} has schema {:?}, expected {:?}",
                    batch.schema(),
                    schema
                )));
            }
        }
        Ok(Table { schema, batches })
    }

    /// Create a table from a non-empty list of batches, using the schema of
    /// the first.
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = match batches.first() {
            Some(batch) => batch.schema(),
            None => {
                return Err(SkyhookError::SchemaProjection(
                    "cannot infer schema from zero batches".to_string(),
                ));
            }
        };
        Self::try_new(schema, batches)
    }

    /// Build a single batch table from named columns.
    pub fn try_from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        let batch = RecordBatch::try_from_iter(columns)?;
        Ok(Table {
            schema: batch.schema(),
            batches: vec![batch],
        })
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Table {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Concatenate all batches into one.
    pub fn combine(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }

    /// Compare schema and rows, ignoring chunking.
    pub fn logically_eq(&self, other: &Table) -> bool {
        if self.schema.fields() != other.schema.fields() {
            return false;
        }
        if self.num_rows() != other.num_rows() {
            return false;
        }
        match (self.combine(), other.combine()) {
            (Ok(a), Ok(b)) => a.columns() == b.columns(),
            _ => false,
        }
    }

    /// Re-split the table into batches of at most `max_rows` rows.
    pub fn rechunk(&self, max_rows: usize) -> Result<Table> {
        let max_rows = max_rows.max(1);
        let combined = self.combine()?;

        let mut batches = Vec::new();
        let mut offset = 0;
        while offset < combined.num_rows() {
            let len = max_rows.min(combined.num_rows() - offset);
            batches.push(combined.slice(offset, len));
            offset += len;
        }

        Ok(Table {
            schema: self.schema.clone(),
            batches,
        })
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.logically_eq(other)
    }
}

impl From<RecordBatch> for Table {
    fn from(batch: RecordBatch) -> Self {
        Table {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty(Arc::new(Schema::empty()))
    }
}
