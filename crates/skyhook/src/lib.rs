//! Filter and projection pushdown into an object storage cluster.
//!
//! A [`dataset::Dataset`] is a set of remote objects each holding an arrow
//! table. Scanning it sends one compact scan request per object, the storage
//! node holding the object applies the filter and projection, and only the
//! matching rows come back to be gathered into a [`table::Table`].
pub mod cluster;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod fragment;
pub mod object_class;
pub mod partitioning;
pub mod predicate;
pub mod projection;
pub mod resolver;
pub mod scanner;
pub mod table;
pub mod task;
pub mod transport;
pub mod writer;

pub use cluster::{Cluster, ConnectStep, ConnectionState};
pub use config::ClusterConfig;
pub use dataset::{Dataset, DatasetFactory, FragmentSource, VectorObjectGenerator};
pub use errors::{Result, SkyhookError};
pub use fragment::{Fragment, Scannable};
pub use partitioning::HivePartitioning;
pub use predicate::Predicate;
pub use resolver::{ObjectAddress, ObjectResolver, ObjectTarget};
pub use scanner::{Scanner, ScannerBuilder};
pub use table::Table;
pub use task::{Executable, ReadSchemaTask, ScanOptions, ScanTask, TaskState, WriteTask};
pub use writer::SplitWriter;
