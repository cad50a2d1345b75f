#![allow(dead_code)]

use std::sync::Arc;

use datafusion::arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, Int32Array, ListBuilder,
};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use skyhook::transport::memory::MemoryTransport;
use skyhook::{Cluster, ClusterConfig, Executable, ObjectResolver, ObjectTarget, Table, WriteTask};

// Mirrors `table::testutil` in the crate, keep the two fixtures identical.
pub fn cost_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("cost", DataType::Float64, false),
        Field::new(
            "cost_components",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
    ]))
}

/// Ten rows with ids 0 to 9.
pub fn cost_table() -> Table {
    let mut components = ListBuilder::new(Float64Builder::new());
    for i in 0..10 {
        let base = i as f64;
        components
            .values()
            .append_slice(&[base + 1.0, base + 2.0, base + 3.0]);
        components.append(true);
    }

    let batch = RecordBatch::try_new(
        cost_schema(),
        vec![
            Arc::new(Int32Array::from_iter_values(0..10)),
            Arc::new(Float64Array::from_iter_values((0..10).map(|i| i as f64 + 1.0))),
            Arc::new(components.finish()),
        ],
    )
    .unwrap();

    Table::from(batch)
}

pub fn int32_column(batch: &RecordBatch, name: &str) -> Vec<i32> {
    let col: &ArrayRef = batch.column_by_name(name).unwrap();
    col.as_any()
        .downcast_ref::<Int32Array>()
        .unwrap()
        .values()
        .to_vec()
}

pub async fn connect(transport: MemoryTransport) -> ObjectResolver {
    logutil::init_test();
    let cluster = Cluster::new(ClusterConfig::default(), Arc::new(transport));
    cluster.connect().await.unwrap();
    ObjectResolver::new(Arc::new(cluster))
}

pub async fn write_table(resolver: &ObjectResolver, path: &str, table: Table) {
    WriteTask::new(table, ObjectTarget::path(path), resolver.clone())
        .execute()
        .await
        .unwrap();
}
