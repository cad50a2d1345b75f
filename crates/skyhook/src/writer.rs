//! Writing a table across several objects.
use std::time::Duration;

use futures::future::try_join_all;
use tracing::info;

use crate::errors::Result;
use crate::resolver::{ObjectResolver, ObjectTarget};
use crate::table::Table;
use crate::task::{Executable, WriteTask};

pub const DEFAULT_ROWS_PER_FILE: usize = 128 * 1024;

/// Splits a table into files of at most `rows_per_file` rows, written as
/// `<dir>/file.<i>`.
///
/// Each file is backed by its own object, so a scan of the directory fans out
/// to one storage node per chunk.
#[derive(Debug, Clone)]
pub struct SplitWriter {
    resolver: ObjectResolver,
    rows_per_file: usize,
    timeout: Option<Duration>,
}

impl SplitWriter {
    pub fn new(resolver: ObjectResolver) -> Self {
        SplitWriter {
            resolver,
            rows_per_file: DEFAULT_ROWS_PER_FILE,
            timeout: None,
        }
    }

    /// Clamped to at least 1.
    pub fn with_rows_per_file(mut self, rows: usize) -> Self {
        self.rows_per_file = rows.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Write `table` under `dir`, returning the file paths in row order.
    ///
    /// An empty table is still written as one file so its schema can be
    /// discovered.
    pub async fn write(&self, dir: &str, table: &Table) -> Result<Vec<String>> {
        let dir = dir.trim_end_matches('/');
        self.resolver.create_dir(dir, true).await?;

        let mut chunks: Vec<Table> = table
            .rechunk(self.rows_per_file)?
            .into_batches()
            .into_iter()
            .map(Table::from)
            .collect();
        if chunks.is_empty() {
            chunks.push(Table::empty(table.schema().clone()));
        }

        let paths: Vec<String> = (0..chunks.len())
            .map(|i| format!("{dir}/file.{i}"))
            .collect();

        let writes = chunks.into_iter().zip(&paths).map(|(chunk, path)| {
            let mut task = WriteTask::new(chunk, ObjectTarget::path(path), self.resolver.clone());
            if let Some(timeout) = self.timeout {
                task = task.with_timeout(timeout);
            }
            async move { task.execute().await }
        });
        try_join_all(writes).await?;

        info!(%dir, num_files = paths.len(), rows = table.num_rows(), "wrote split table");
        Ok(paths)
    }
}
