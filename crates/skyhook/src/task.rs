//! Units of remote execution.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

use crate::codec::{ScanRequest, decode_schema, decode_table, encode_table};
use crate::errors::{Result, SkyhookError};
use crate::predicate::Predicate;
use crate::projection::check_projectable;
use crate::resolver::{ObjectAddress, ObjectResolver, ObjectTarget};
use crate::table::Table;

pub const SCAN_OP: &str = "scan";
pub const WRITE_OP: &str = "write";
pub const READ_SCHEMA_OP: &str = "read_schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Executing,
    Completed,
    Failed,
}

/// Options shared by every task of a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub filter: Predicate,
    /// Schema of the scan output. Always projectable from `dataset_schema`.
    pub projection: SchemaRef,
    pub dataset_schema: SchemaRef,
    pub timeout: Option<Duration>,
}

impl ScanOptions {
    /// Options selecting every row and column of `dataset_schema`.
    pub fn new(dataset_schema: SchemaRef) -> Self {
        ScanOptions {
            filter: Predicate::always_true(),
            projection: dataset_schema.clone(),
            dataset_schema,
            timeout: None,
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_projection(mut self, projection: SchemaRef) -> Result<Self> {
        check_projectable(&self.dataset_schema, &projection)?;
        self.projection = projection;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Something that runs once against the cluster.
#[async_trait]
pub trait Executable: Send {
    type Output;

    /// Run the task. A task may only be executed once.
    async fn execute(&mut self) -> Result<Self::Output>;

    fn state(&self) -> TaskState;
}

fn begin(state: &mut TaskState, task: &str) -> Result<()> {
    if *state != TaskState::Created {
        return Err(SkyhookError::TaskState(format!(
            "{task} task already executed, state: {state:?}"
        )));
    }
    *state = TaskState::Executing;
    Ok(())
}

fn finish<T>(state: &mut TaskState, res: Result<T>) -> Result<T> {
    *state = match &res {
        Ok(_) => TaskState::Completed,
        Err(_) => TaskState::Failed,
    };
    res
}

/// Batches returned by a scan task, in the order the storage node produced
/// them.
#[derive(Debug)]
pub struct ScanBatches {
    schema: SchemaRef,
    batches: std::vec::IntoIter<RecordBatch>,
}

impl ScanBatches {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

impl Iterator for ScanBatches {
    type Item = RecordBatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.batches.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.batches.size_hint()
    }
}

impl std::iter::FusedIterator for ScanBatches {}

/// Scan of a single object.
#[derive(Debug)]
pub struct ScanTask {
    options: Arc<ScanOptions>,
    target: ObjectTarget,
    partition_predicate: Predicate,
    resolver: ObjectResolver,
    state: TaskState,
}

impl ScanTask {
    pub fn new(
        options: Arc<ScanOptions>,
        target: ObjectTarget,
        partition_predicate: Predicate,
        resolver: ObjectResolver,
    ) -> Self {
        ScanTask {
            options,
            target,
            partition_predicate,
            resolver,
            state: TaskState::Created,
        }
    }

    pub fn target(&self) -> &ObjectTarget {
        &self.target
    }

    pub fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    async fn run(&self) -> Result<ScanBatches> {
        // Resolved first, the request carries the file size as its size hint.
        let resolved = self.resolver.resolve_target(&self.target).await?;

        let request = ScanRequest {
            predicate: self.options.filter.clone(),
            partition_predicate: self.partition_predicate.clone(),
            projection_schema: self.options.projection.clone(),
            dataset_schema: self.options.dataset_schema.clone(),
            size_hint: resolved.size_hint,
        }
        .encode()?;

        let response = self
            .resolver
            .execute(
                &resolved.address.physical_id,
                SCAN_OP,
                request,
                self.options.timeout,
            )
            .await?;

        let table = decode_table(&response)
            .map_err(|e| SkyhookError::MalformedResponse(format!("scan result: {e}")))?;
        if table.schema().fields() != self.options.projection.fields() {
            return Err(SkyhookError::MalformedResponse(format!(
                "scan result has schema {:?}, expected {:?}",
                table.schema(),
                self.options.projection
            )));
        }

        debug!(object = %self.target, rows = table.num_rows(), "scan task completed");

        Ok(ScanBatches {
            schema: self.options.projection.clone(),
            batches: table.into_batches().into_iter(),
        })
    }
}

#[async_trait]
impl Executable for ScanTask {
    type Output = ScanBatches;

    async fn execute(&mut self) -> Result<ScanBatches> {
        begin(&mut self.state, SCAN_OP)?;
        let res = self.run().await;
        if let Err(e) = &res {
            warn!(object = %self.target, %e, "scan task failed");
        }
        finish(&mut self.state, res)
    }

    fn state(&self) -> TaskState {
        self.state
    }
}

/// Write a table as the content of an object.
///
/// A path target is created in the namespace first.
#[derive(Debug)]
pub struct WriteTask {
    table: Table,
    target: ObjectTarget,
    resolver: ObjectResolver,
    timeout: Option<Duration>,
    state: TaskState,
}

impl WriteTask {
    pub fn new(table: Table, target: ObjectTarget, resolver: ObjectResolver) -> Self {
        WriteTask {
            table,
            target,
            resolver,
            timeout: None,
            state: TaskState::Created,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(&self) -> Result<ObjectAddress> {
        let address = match &self.target {
            ObjectTarget::Path(path) => self.resolver.create(path).await?,
            ObjectTarget::Object(id) => ObjectAddress::from_object_id(id.as_str()),
        };

        let payload = encode_table(&self.table)?;
        self.resolver
            .execute(&address.physical_id, WRITE_OP, payload, self.timeout)
            .await?;

        debug!(object = %self.target, rows = self.table.num_rows(), "wrote table");
        Ok(address)
    }
}

#[async_trait]
impl Executable for WriteTask {
    type Output = ObjectAddress;

    async fn execute(&mut self) -> Result<ObjectAddress> {
        begin(&mut self.state, WRITE_OP)?;
        let res = self.run().await;
        finish(&mut self.state, res)
    }

    fn state(&self) -> TaskState {
        self.state
    }
}

/// Read the physical schema of an object.
#[derive(Debug)]
pub struct ReadSchemaTask {
    target: ObjectTarget,
    resolver: ObjectResolver,
    timeout: Option<Duration>,
    state: TaskState,
}

impl ReadSchemaTask {
    pub fn new(target: ObjectTarget, resolver: ObjectResolver) -> Self {
        ReadSchemaTask {
            target,
            resolver,
            timeout: None,
            state: TaskState::Created,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(&self) -> Result<SchemaRef> {
        let resolved = self.resolver.resolve_target(&self.target).await?;
        let response = self
            .resolver
            .execute(
                &resolved.address.physical_id,
                READ_SCHEMA_OP,
                Bytes::new(),
                self.timeout,
            )
            .await?;

        decode_schema(&response)
            .map_err(|e| SkyhookError::MalformedResponse(format!("schema header: {e}")))
    }
}

#[async_trait]
impl Executable for ReadSchemaTask {
    type Output = SchemaRef;

    async fn execute(&mut self) -> Result<SchemaRef> {
        begin(&mut self.state, READ_SCHEMA_OP)?;
        let res = self.run().await;
        finish(&mut self.state, res)
    }

    fn state(&self) -> TaskState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::Int32Array;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::prelude::{col, lit};

    use super::*;
    use crate::cluster::Cluster;
    use crate::config::ClusterConfig;
    use crate::projection::project_schema;
    use crate::table::testutil::{cost_schema, cost_table};
    use crate::transport::memory::MemoryTransport;

    async fn resolver_with(transport: MemoryTransport) -> ObjectResolver {
        let cluster = Cluster::new(ClusterConfig::default(), Arc::new(transport));
        cluster.connect().await.unwrap();
        ObjectResolver::new(Arc::new(cluster))
    }

    async fn write(resolver: &ObjectResolver, path: &str) -> ObjectAddress {
        let mut task = WriteTask::new(cost_table(), ObjectTarget::path(path), resolver.clone());
        let addr = task.execute().await.unwrap();
        assert_eq!(TaskState::Completed, task.state());
        addr
    }

    #[tokio::test]
    async fn scan_by_path_and_object() {
        let resolver = resolver_with(MemoryTransport::new()).await;
        let addr = write(&resolver, "/ds/a.arrow").await;

        let options = Arc::new(
            ScanOptions::new(cost_schema())
                .with_filter(Predicate::new(col("id").eq(lit(8_i32)).or(col("id").eq(lit(7_i32)))))
                .with_projection(project_schema(&cost_schema(), &["id"]).unwrap())
                .unwrap(),
        );

        for target in [
            ObjectTarget::path("/ds/a.arrow"),
            ObjectTarget::object(addr.physical_id.clone()),
        ] {
            let mut task = ScanTask::new(
                options.clone(),
                target,
                Predicate::always_true(),
                resolver.clone(),
            );
            let batches: Vec<_> = task.execute().await.unwrap().collect();
            let table = Table::try_new(options.projection.clone(), batches).unwrap();
            let ids = table.combine().unwrap();
            assert_eq!(
                &Int32Array::from(vec![7, 8]),
                ids.column(0).as_any().downcast_ref::<Int32Array>().unwrap()
            );
        }
    }

    #[tokio::test]
    async fn execute_twice() {
        let resolver = resolver_with(MemoryTransport::new()).await;
        write(&resolver, "/a.arrow").await;

        let mut task = ScanTask::new(
            Arc::new(ScanOptions::new(cost_schema())),
            ObjectTarget::path("/a.arrow"),
            Predicate::always_true(),
            resolver,
        );
        task.execute().await.unwrap();
        let err = task.execute().await.unwrap_err();
        assert!(matches!(err, SkyhookError::TaskState(_)), "{err}");
        assert_eq!(TaskState::Completed, task.state());
    }

    #[tokio::test]
    async fn failed_task() {
        let resolver = resolver_with(MemoryTransport::new()).await;
        let mut task = ScanTask::new(
            Arc::new(ScanOptions::new(cost_schema())),
            ObjectTarget::object("missing.00000000"),
            Predicate::always_true(),
            resolver,
        );
        let err = task.execute().await.unwrap_err();
        assert!(matches!(err, SkyhookError::RemoteExecution { .. }), "{err}");
        assert_eq!(TaskState::Failed, task.state());
    }

    #[tokio::test]
    async fn corrupt_object() {
        let transport = MemoryTransport::new();
        let resolver = resolver_with(transport.clone()).await;
        // Stored object that isn't a table, the storage side fails to decode
        // it and reports an error status.
        transport.put_object("junk.00000000", Bytes::from_static(b"junk"));

        let mut task = ReadSchemaTask::new(ObjectTarget::object("junk.00000000"), resolver);
        let err = task.execute().await.unwrap_err();
        assert!(matches!(err, SkyhookError::RemoteExecution { .. }), "{err}");
    }

    #[tokio::test]
    async fn read_schema() {
        let resolver = resolver_with(MemoryTransport::new()).await;
        write(&resolver, "/a.arrow").await;

        let mut task = ReadSchemaTask::new(ObjectTarget::path("/a.arrow"), resolver);
        assert_eq!(cost_schema(), task.execute().await.unwrap());
    }

    #[test]
    fn options_reject_unknown_projection() {
        let projection = Arc::new(Schema::new(vec![Field::new("price", DataType::Float64, false)]));
        ScanOptions::new(cost_schema())
            .with_projection(projection)
            .unwrap_err();
    }
}
