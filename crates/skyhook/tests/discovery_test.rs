mod setup;

use std::sync::Arc;

use datafusion::arrow::array::{Array, ArrayRef, Int32Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::prelude::{col, lit};
use setup::*;
use skyhook::codec::inspect::describe_table;
use skyhook::transport::memory::MemoryTransport;
use skyhook::{
    DatasetFactory, FragmentSource, HivePartitioning, Predicate, SkyhookError, Table,
};

#[tokio::test]
async fn test_discover_and_unify_schemas() {
    let transport = MemoryTransport::new();
    let resolver = connect(transport.clone()).await;

    write_table(&resolver, "/ds/a.arrow", cost_table()).await;
    write_table(&resolver, "/ds/2020/b.arrow", cost_table()).await;
    let with_region = Table::try_from_columns([
        ("id", Arc::new(Int32Array::from(vec![100, 101])) as ArrayRef),
        (
            "region",
            Arc::new(StringArray::from(vec![Some("east"), None])) as ArrayRef,
        ),
    ])
    .unwrap();
    write_table(&resolver, "/ds/c.arrow", with_region).await;
    write_table(&resolver, "/elsewhere/d.arrow", cost_table()).await;
    resolver.create_dir("/ds/empty", false).await.unwrap();

    let factory = DatasetFactory::discover(resolver, "/ds").await.unwrap();
    assert_eq!(
        &["/ds/2020/b.arrow", "/ds/a.arrow", "/ds/c.arrow"],
        factory.paths()
    );

    let schemas = factory.inspect_schemas().await.unwrap();
    assert_eq!(3, schemas.len());
    assert_eq!(cost_schema(), schemas[0]);

    let dataset = factory.finish().await.unwrap();
    let names: Vec<_> = dataset
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(vec!["id", "cost", "cost_components", "region"], names);
    assert_eq!(
        3,
        dataset.get_fragments(&Predicate::always_true()).unwrap().count()
    );

    let table = dataset
        .new_scan()
        .filter(col("id").gt_eq(lit(9_i32)))
        .project(&["id", "region"])
        .finish()
        .unwrap()
        .to_table()
        .await
        .unwrap()
        .combine()
        .unwrap();
    assert_eq!(vec![9, 9, 100, 101], int32_column(&table, "id"));
    assert_eq!(3, table.column(1).null_count());
}

#[tokio::test]
async fn test_discover_missing_root() {
    let resolver = connect(MemoryTransport::new()).await;
    let err = DatasetFactory::discover(resolver, "/nothing/here")
        .await
        .unwrap_err();
    assert!(matches!(err, SkyhookError::Namespace { .. }), "{err}");
}

#[tokio::test]
async fn test_stored_object_inspection() {
    let transport = MemoryTransport::new();
    let resolver = connect(transport.clone()).await;
    write_table(&resolver, "/ds/a.arrow", cost_table()).await;

    let addr = resolver.resolve("/ds/a.arrow").await.unwrap();
    let stored = transport.object(&addr.physical_id).unwrap();
    let summary = describe_table(&stored).unwrap();

    assert_eq!(10, summary.num_rows);
    assert_eq!("cost_components", summary.columns[2].name);
    assert_eq!(0, summary.columns[2].null_count);

    let stat = resolver.stat("/ds/a.arrow").await.unwrap();
    assert_eq!(stored.len() as u64, stat.size);
}

#[tokio::test]
async fn test_discover_hive_partitions() {
    let resolver = connect(MemoryTransport::new()).await;
    let ids = Table::try_from_columns([(
        "id",
        Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef,
    )])
    .unwrap();
    write_table(&resolver, "/events/year=2020/a.arrow", ids.clone()).await;
    write_table(&resolver, "/events/year=2021/a.arrow", ids.clone()).await;
    write_table(&resolver, "/events/loose.arrow", ids).await;

    let partitioning = HivePartitioning::new(Arc::new(Schema::new(vec![Field::new(
        "year",
        DataType::Int32,
        false,
    )])));
    let dataset = DatasetFactory::discover(resolver, "/events")
        .await
        .unwrap()
        .with_partitioning(partitioning)
        .finish()
        .await
        .unwrap();

    let year = dataset.schema().field_with_name("year").unwrap();
    assert_eq!(&DataType::Int32, year.data_type());
    assert!(year.is_nullable());

    let partitions: Vec<_> = dataset
        .get_fragments(&Predicate::always_true())
        .unwrap()
        .map(|f| f.partition_predicate().clone())
        .collect();
    assert_eq!(
        vec![
            Predicate::always_true(),
            Predicate::new(col("year").eq(lit(2020_i32))),
            Predicate::new(col("year").eq(lit(2021_i32))),
        ],
        partitions
    );

    let table = dataset
        .new_scan()
        .filter(col("year").eq(lit(2021_i32)).and(col("id").gt(lit(1_i32))))
        .project(&["year", "id"])
        .finish()
        .unwrap()
        .to_table()
        .await
        .unwrap()
        .combine()
        .unwrap();
    assert_eq!(vec![2021, 2021], int32_column(&table, "year"));
    assert_eq!(vec![2, 3], int32_column(&table, "id"));

    // Files outside a partition directory have a null partition value.
    let nulls = dataset
        .new_scan()
        .filter(col("year").is_null())
        .finish()
        .unwrap()
        .count_rows()
        .await
        .unwrap();
    assert_eq!(3, nulls);
}

#[tokio::test]
async fn test_discover_bad_partition_value() {
    let resolver = connect(MemoryTransport::new()).await;
    write_table(&resolver, "/events/year=recent/a.arrow", cost_table()).await;

    let partitioning = HivePartitioning::new(Arc::new(Schema::new(vec![Field::new(
        "year",
        DataType::Int32,
        true,
    )])));
    let err = DatasetFactory::discover(resolver, "/events")
        .await
        .unwrap()
        .with_partitioning(partitioning)
        .finish()
        .await
        .unwrap_err();
    assert!(matches!(err, SkyhookError::Partitioning(_)), "{err}");
}
