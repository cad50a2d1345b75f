mod setup;

use setup::*;
use skyhook::transport::memory::MemoryTransport;
use skyhook::{DatasetFactory, SkyhookError, SplitWriter};

#[tokio::test]
async fn test_split_write_then_discover() {
    let transport = MemoryTransport::new();
    let resolver = connect(transport.clone()).await;

    let paths = SplitWriter::new(resolver.clone())
        .with_rows_per_file(3)
        .write("/split", &cost_table())
        .await
        .unwrap();
    assert_eq!(4, paths.len());
    assert_eq!(4, transport.num_objects());

    let dataset = DatasetFactory::discover(resolver, "/split")
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();
    let table = dataset.new_scan().finish().unwrap().to_table().await.unwrap();
    assert_eq!(cost_table(), table);
}

#[tokio::test]
async fn test_deleted_file_fails_scan() {
    let transport = MemoryTransport::new();
    let resolver = connect(transport.clone()).await;

    let paths = SplitWriter::new(resolver.clone())
        .with_rows_per_file(5)
        .write("/split", &cost_table())
        .await
        .unwrap();
    let dataset = DatasetFactory::discover(resolver.clone(), "/split")
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

    resolver.delete_file(&paths[1]).await.unwrap();
    assert_eq!(1, transport.num_objects());

    let err = dataset.new_scan().finish().unwrap().to_table().await.unwrap_err();
    match err {
        SkyhookError::Resolution { path, source } => {
            assert_eq!(paths[1], path);
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_delete_dir() {
    let transport = MemoryTransport::new();
    let resolver = connect(transport.clone()).await;

    resolver.create_dir("/warehouse/empty", true).await.unwrap();
    write_table(&resolver, "/warehouse/t/a.arrow", cost_table()).await;
    write_table(&resolver, "/keep/b.arrow", cost_table()).await;

    resolver.delete_dir("/warehouse").await.unwrap();
    assert_eq!(1, transport.num_objects());

    let err = DatasetFactory::discover(resolver.clone(), "/warehouse")
        .await
        .unwrap_err();
    assert!(matches!(err, SkyhookError::Namespace { .. }), "{err}");

    let err = resolver.resolve("/warehouse/t/a.arrow").await.unwrap_err();
    assert!(matches!(err, SkyhookError::Resolution { .. }), "{err}");
    assert_eq!(
        vec!["/keep/b.arrow"],
        resolver.list_files("/").await.unwrap()
    );
}
