//! Partition values encoded in directory names.
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::common::{Column, ScalarValue};
use datafusion::logical_expr::utils::conjunction;
use datafusion::prelude::{Expr, lit};

use crate::errors::{Result, SkyhookError};
use crate::predicate::Predicate;

/// Directory value standing in for a null partition value.
pub const HIVE_NULL_FALLBACK: &str = "__HIVE_DEFAULT_PARTITION__";

/// Hive style partitioning: directories named `key=value` below the dataset
/// root.
///
/// Only keys present in the partition schema are recognized, other segments
/// are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct HivePartitioning {
    schema: SchemaRef,
}

impl HivePartitioning {
    pub fn new(schema: SchemaRef) -> Self {
        HivePartitioning { schema }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Partition values of the file at `path`, with `root` the directory the
    /// dataset was discovered from.
    ///
    /// Values are parsed as the type of their partition field.
    pub fn values(&self, root: &str, path: &str) -> Result<Vec<(String, Option<ScalarValue>)>> {
        let rel = path
            .strip_prefix(root.trim_end_matches('/'))
            .unwrap_or(path);

        // The last segment is the file name.
        let mut segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        segments.pop();

        let mut values = Vec::new();
        for segment in segments {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            let Ok(field) = self.schema.field_with_name(key) else {
                continue;
            };

            if value == HIVE_NULL_FALLBACK {
                values.push((key.to_string(), None));
                continue;
            }
            let scalar = ScalarValue::try_from_string(value.to_string(), field.data_type())
                .map_err(|e| {
                    SkyhookError::Partitioning(format!(
                        "value '{value}' of '{key}' in '{path}' is not {}: {e}",
                        field.data_type()
                    ))
                })?;
            values.push((key.to_string(), Some(scalar)));
        }

        Ok(values)
    }

    /// Partition predicate of the file at `path`: the conjunction of
    /// `key = value` for every non-null partition value.
    pub fn predicate(&self, root: &str, path: &str) -> Result<Predicate> {
        let terms = self
            .values(root, path)?
            .into_iter()
            .filter_map(|(key, value)| {
                value.map(|v| Expr::Column(Column::from_name(key)).eq(lit(v)))
            });

        Ok(match conjunction(terms) {
            Some(expr) => Predicate::new(expr),
            None => Predicate::always_true(),
        })
    }
}
