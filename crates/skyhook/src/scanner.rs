//! Scatter-gather scans over a dataset.
use std::sync::Arc;
use std::time::Duration;

use datafusion::arrow::datatypes::SchemaRef;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::dataset::{Dataset, FragmentSource};
use crate::errors::{Result, SkyhookError};
use crate::fragment::Scannable;
use crate::predicate::Predicate;
use crate::projection::project_schema;
use crate::table::Table;
use crate::task::{Executable, ScanOptions, ScanTask};

pub const DEFAULT_PARALLELISM: usize = 4;

#[derive(Debug, Clone)]
pub struct ScannerBuilder {
    dataset: Dataset,
    filter: Predicate,
    columns: Option<Vec<String>>,
    parallelism: usize,
    timeout: Option<Duration>,
}

impl ScannerBuilder {
    pub fn new(dataset: Dataset) -> Self {
        ScannerBuilder {
            dataset,
            filter: Predicate::always_true(),
            columns: None,
            parallelism: DEFAULT_PARALLELISM,
            timeout: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<Predicate>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Only return the named columns, in the given order.
    pub fn project<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Maximum number of tasks in flight. Clamped to at least 1.
    pub fn parallelism(mut self, n: usize) -> Self {
        self.parallelism = n.max(1);
        self
    }

    /// Timeout for each remote call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn finish(self) -> Result<Scanner> {
        let dataset_schema = self.dataset.schema().clone();
        let mut options = ScanOptions::new(dataset_schema.clone()).with_filter(self.filter);
        if let Some(columns) = &self.columns {
            let projection = project_schema(&dataset_schema, columns.as_slice())?;
            options = options.with_projection(projection)?;
        }
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }

        Ok(Scanner {
            dataset: self.dataset,
            options: Arc::new(options),
            parallelism: self.parallelism,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Scanner {
    dataset: Dataset,
    options: Arc<ScanOptions>,
    parallelism: usize,
}

impl Scanner {
    pub fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    pub fn projected_schema(&self) -> &SchemaRef {
        &self.options.projection
    }

    /// Every task of the scan, in fragment order.
    pub fn scan_tasks(&self) -> Result<Vec<ScanTask>> {
        let mut tasks = Vec::new();
        for fragment in self.dataset.get_fragments(&self.options.filter)? {
            tasks.extend(fragment.scan(self.options.clone())?);
        }
        Ok(tasks)
    }

    /// Run every task and gather the results into one table.
    ///
    /// Up to `parallelism` tasks run at once. Batches keep fragment order. Any
    /// failing task fails the whole scan.
    pub async fn to_table(&self) -> Result<Table> {
        let tasks = self.scan_tasks()?;
        let num_tasks = tasks.len();

        let results: Vec<_> = stream::iter(tasks.into_iter().map(|mut task| async move {
            let batches = task.execute().await?;
            Ok::<_, SkyhookError>(batches.collect::<Vec<_>>())
        }))
        .buffered(self.parallelism)
        .try_collect()
        .await?;

        let table = Table::try_new(
            self.options.projection.clone(),
            results.into_iter().flatten().collect(),
        )?;
        debug!(num_tasks, rows = table.num_rows(), "scan completed");

        Ok(table)
    }

    pub async fn count_rows(&self) -> Result<usize> {
        Ok(self.to_table().await?.num_rows())
    }
}
