//! Procedures run by a storage node against the bytes of a single object.
//!
//! An object's content is an encoded table (see [`crate::codec::encode_table`]).
//! Client code never calls into this module directly, it only reaches it
//! through a transport's `exec`.
use std::sync::Arc;

use bytes::Bytes;
use datafusion::arrow::array::{Array, ArrayRef, new_null_array};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{Schema, SchemaRef};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::common::ScalarValue;
use tracing::debug;

use crate::codec::{decode_scan_request, decode_table, encode_schema, encode_table};
use crate::errors::{Result, SkyhookError};
use crate::table::Table;

/// Validate a table payload before it's persisted as an object's content.
pub fn write(input: &[u8]) -> Result<()> {
    let table = decode_table(input)?;
    debug!(rows = table.num_rows(), columns = table.num_columns(), "write table");
    Ok(())
}

/// Return the encoded schema of the stored table.
pub fn read_schema(stored: &[u8]) -> Result<Bytes> {
    let table = decode_table(stored)?;
    encode_schema(table.schema())
}

/// Execute an encoded scan request against the stored table.
pub fn scan(stored: &[u8], request: &[u8]) -> Result<Bytes> {
    let req = decode_scan_request(request)?;
    let table = decode_table(stored)?;
    let guarantees = req.partition_predicate.equality_guarantees();

    let mut batches = Vec::with_capacity(table.batches().len());
    for batch in table.batches() {
        let conformed = conform_batch(batch, &req.dataset_schema, &guarantees)?;
        let filtered = req.predicate.filter(&conformed)?;
        batches.push(project_batch(&filtered, &req.projection_schema)?);
    }

    let out = Table::try_new(req.projection_schema, batches)?;
    debug!(
        rows_in = table.num_rows(),
        rows_out = out.num_rows(),
        predicate = %req.predicate,
        "scan object"
    );

    encode_table(&out)
}

/// Read `batch` as a batch of `schema`.
///
/// Columns are matched by name and cast when the stored type differs. A
/// column missing from the object takes its value from the partition
/// guarantees, or is null when there is none.
fn conform_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
    guarantees: &[(String, ScalarValue)],
) -> Result<RecordBatch> {
    let num_rows = batch.num_rows();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let col: ArrayRef = match batch.schema().index_of(field.name()) {
            Ok(idx) => {
                let col = batch.column(idx);
                if col.data_type() == field.data_type() {
                    col.clone()
                } else {
                    cast(col, field.data_type())?
                }
            }
            Err(_) => match guarantees.iter().find(|(name, _)| name == field.name()) {
                Some((_, val)) => val
                    .cast_to(field.data_type())?
                    .to_array_of_size(num_rows)?,
                None => new_null_array(field.data_type(), num_rows),
            },
        };

        // Nullability is enforced against the projection, not here.
        if col.null_count() > 0 && !field.is_nullable() {
            fields.push(Arc::new(field.as_ref().clone().with_nullable(true)));
        } else {
            fields.push(field.clone());
        }
        columns.push(col);
    }

    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(num_rows)),
    )?)
}

fn project_batch(batch: &RecordBatch, projection: &SchemaRef) -> Result<RecordBatch> {
    let columns = projection
        .fields()
        .iter()
        .map(|field| {
            let idx = batch.schema().index_of(field.name()).map_err(|_| {
                SkyhookError::SchemaProjection(format!(
                    "projected column '{}' not in dataset schema",
                    field.name()
                ))
            })?;
            let col = batch.column(idx);
            if col.data_type() == field.data_type() {
                Ok(col.clone())
            } else {
                Ok(cast(col, field.data_type())?)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new_with_options(
        projection.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )?)
}
