//! Schema projection and widening checks.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Schema, SchemaRef};

use crate::errors::{Result, SkyhookError};

/// Returns if values of type `from` can be losslessly read as `to`.
pub fn can_widen(from: &DataType, to: &DataType) -> bool {
    use DataType::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Null, _)
            | (Int8, Int16 | Int32 | Int64)
            | (Int16, Int32 | Int64)
            | (Int32, Int64)
            | (UInt8, UInt16 | UInt32 | UInt64 | Int16 | Int32 | Int64)
            | (UInt16, UInt32 | UInt64 | Int32 | Int64)
            | (UInt32, UInt64 | Int64)
            | (Float16, Float32 | Float64)
            | (Float32, Float64)
            | (Int8 | Int16 | Int32 | UInt8 | UInt16 | UInt32, Float64)
            | (Utf8, LargeUtf8)
            | (Binary, LargeBinary)
    )
}

/// Check that `to` is a valid projection of `from`.
///
/// Every field in `to` must exist in `from` by name with a widenable type,
/// and must not drop nullability.
pub fn check_projectable(from: &Schema, to: &Schema) -> Result<()> {
    for field in to.fields() {
        let source = from.field_with_name(field.name()).map_err(|_| {
            SkyhookError::SchemaProjection(format!(
                "field '{}' does not exist in source schema",
                field.name()
            ))
        })?;

        if !can_widen(source.data_type(), field.data_type()) {
            return Err(SkyhookError::SchemaProjection(format!(
                "field '{}' cannot be read as {} from {}",
                field.name(),
                field.data_type(),
                source.data_type()
            )));
        }

        if source.is_nullable() && !field.is_nullable() {
            return Err(SkyhookError::SchemaProjection(format!(
                "field '{}' is nullable in source schema",
                field.name()
            )));
        }
    }

    Ok(())
}

/// Select `columns` from `schema`, in the order given.
pub fn project_schema<S: AsRef<str>>(schema: &Schema, columns: &[S]) -> Result<SchemaRef> {
    let fields = columns
        .iter()
        .map(|name| {
            schema
                .field_with_name(name.as_ref())
                .cloned()
                .map_err(|_| {
                    SkyhookError::SchemaProjection(format!(
                        "unknown column '{}'",
                        name.as_ref()
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    )))
}
