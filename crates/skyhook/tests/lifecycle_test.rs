mod setup;

use std::sync::Arc;

use bytes::Bytes;
use setup::*;
use skyhook::transport::memory::MemoryTransport;
use skyhook::{
    Cluster, ClusterConfig, ConnectStep, ConnectionState, Dataset, ObjectResolver, ObjectTarget,
    SkyhookError,
};

#[tokio::test]
async fn test_execute_requires_connection() {
    logutil::init_test();
    let cluster = Arc::new(Cluster::new(
        ClusterConfig::default(),
        Arc::new(MemoryTransport::new()),
    ));
    let resolver = ObjectResolver::new(cluster.clone());

    let err = resolver
        .execute("1.00000000", "scan", Bytes::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkyhookError::NotConnected), "{err}");

    cluster.connect().await.unwrap();
    write_table(&resolver, "/a.arrow", cost_table()).await;

    cluster.disconnect().await.unwrap();
    let err = resolver.resolve("/a.arrow").await.unwrap_err();
    assert!(matches!(err, SkyhookError::NotConnected), "{err}");

    // Disconnecting twice is fine.
    cluster.disconnect().await.unwrap();
    assert_eq!(ConnectionState::Disconnected, cluster.state().await);
}

#[tokio::test]
async fn test_scan_after_disconnect() {
    let resolver = connect(MemoryTransport::new()).await;
    write_table(&resolver, "/a.arrow", cost_table()).await;

    let dataset = Dataset::from_targets(
        cost_schema(),
        [ObjectTarget::path("/a.arrow")],
        resolver.clone(),
    );
    assert_eq!(10, dataset.new_scan().finish().unwrap().count_rows().await.unwrap());

    resolver.cluster().disconnect().await.unwrap();
    let err = dataset
        .new_scan()
        .finish()
        .unwrap()
        .to_table()
        .await
        .unwrap_err();
    assert!(matches!(err, SkyhookError::NotConnected), "{err}");
}

#[tokio::test]
async fn test_failed_connect_step_is_retryable() {
    logutil::init_test();

    for failing in [
        ConnectStep::InitIdentity,
        ConnectStep::LoadConfig,
        ConnectStep::OpenConnection,
        ConnectStep::BindNamespace,
    ] {
        let transport = MemoryTransport::new().fail_connect_at(failing);
        let cluster = Cluster::new(ClusterConfig::default(), Arc::new(transport.clone()));

        match cluster.connect().await.unwrap_err() {
            SkyhookError::Connection { step, .. } => assert_eq!(failing, step),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ConnectionState::Unconnected, cluster.state().await);

        transport.clear_faults();
        cluster.connect().await.unwrap();
        assert_eq!(ConnectionState::Connected, cluster.state().await);
    }
}

#[tokio::test]
async fn test_wrong_object_class() {
    logutil::init_test();
    let transport = MemoryTransport::new();
    let config = ClusterConfig::default().with_class_name("tabular");
    let cluster = Arc::new(Cluster::new(config, Arc::new(transport)));
    cluster.connect().await.unwrap();
    let resolver = ObjectResolver::new(cluster);

    let err = resolver
        .execute("1.00000000", "read_schema", Bytes::new(), None)
        .await
        .unwrap_err();
    match err {
        SkyhookError::RemoteExecution { op, source, .. } => {
            assert_eq!("read_schema", op);
            assert_eq!(skyhook::transport::EOPNOTSUPP, source.code);
        }
        other => panic!("unexpected error: {other}"),
    }
}
