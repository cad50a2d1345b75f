use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;

use crate::errors::{Result, SkyhookError};
use crate::predicate::Predicate;
use crate::projection::check_projectable;
use crate::resolver::{ObjectResolver, ObjectTarget};
use crate::task::{ScanOptions, ScanTask};

pub type ScanTaskIter = Box<dyn Iterator<Item = ScanTask> + Send>;

/// A unit of a dataset that can produce scan tasks.
pub trait Scannable {
    fn scan(&self, options: Arc<ScanOptions>) -> Result<ScanTaskIter>;

    /// Whether the fragment can be split into multiple tasks.
    fn splittable(&self) -> bool;

    /// Schema of the data stored for this fragment.
    fn read_physical_schema(&self) -> Result<SchemaRef>;
}

/// One remote object of a dataset.
#[derive(Debug, Clone)]
pub struct Fragment {
    schema: SchemaRef,
    target: ObjectTarget,
    partition_predicate: Predicate,
    resolver: ObjectResolver,
}

impl Fragment {
    pub fn new(
        schema: SchemaRef,
        target: ObjectTarget,
        partition_predicate: Predicate,
        resolver: ObjectResolver,
    ) -> Self {
        Fragment {
            schema,
            target,
            partition_predicate,
            resolver,
        }
    }

    pub fn target(&self) -> &ObjectTarget {
        &self.target
    }

    pub fn partition_predicate(&self) -> &Predicate {
        &self.partition_predicate
    }
}

impl Scannable for Fragment {
    /// Yields exactly one task covering the whole object.
    fn scan(&self, options: Arc<ScanOptions>) -> Result<ScanTaskIter> {
        check_projectable(&self.schema, &options.projection).map_err(|e| {
            SkyhookError::SchemaProjection(format!(
                "fragment {} cannot produce projection: {e}",
                self.target
            ))
        })?;

        let task = ScanTask::new(
            options,
            self.target.clone(),
            self.partition_predicate.clone(),
            self.resolver.clone(),
        );
        Ok(Box::new(std::iter::once(task)))
    }

    fn splittable(&self) -> bool {
        false
    }

    fn read_physical_schema(&self) -> Result<SchemaRef> {
        Ok(self.schema.clone())
    }
}
