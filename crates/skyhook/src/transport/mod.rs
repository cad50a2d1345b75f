//! Boundary with the storage cluster.
//!
//! A transport is the client library of a storage cluster: it owns the
//! low-level connection, executes named object-class methods against single
//! objects, and exposes the metadata namespace that maps logical paths onto
//! objects.
pub mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Object or file does not exist.
pub const ENOENT: i32 = -2;
/// Generic I/O failure.
pub const EIO: i32 = -5;
/// Path already exists with a different type.
pub const EEXIST: i32 = -17;
/// Argument (payload, path) rejected.
pub const EINVAL: i32 = -22;
/// Object class or method not available.
pub const EOPNOTSUPP: i32 = -95;
/// Connection not established.
pub const ENOTCONN: i32 = -107;

/// Non-zero status reported by the transport or by a storage node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status {code}: {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        TransportError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ENOENT, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(EINVAL, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ENOENT
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Subset of file metadata needed to address a file's backing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub inode: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[async_trait]
pub trait StorageTransport: Debug + Send + Sync {
    /// Initialize the client identity.
    async fn init(&self, user: &str, cluster_name: &str, flags: u64) -> TransportResult<()>;

    /// Read the cluster configuration file.
    async fn load_config(&self, path: &str) -> TransportResult<()>;

    /// Open the network connection to the cluster.
    async fn open(&self) -> TransportResult<()>;

    /// Bind the connection to a pool.
    async fn bind_namespace(&self, pool: &str) -> TransportResult<()>;

    /// Tear down the connection. Never fails.
    async fn shutdown(&self);

    /// Execute `class_name.op` on a single object, returning the method's
    /// output.
    async fn exec(
        &self,
        object_id: &str,
        class_name: &str,
        op: &str,
        input: Bytes,
    ) -> TransportResult<Bytes>;

    async fn stat(&self, path: &str) -> TransportResult<FileStat>;

    /// Create a file (and its parent directories). Returns the existing
    /// file's metadata if it already exists.
    async fn create_file(&self, path: &str) -> TransportResult<FileStat>;

    /// Create a directory. Without `recursive` the parent must already
    /// exist. Creating an existing directory succeeds.
    async fn create_dir(&self, path: &str, recursive: bool) -> TransportResult<()>;

    /// Remove a file and its backing object.
    async fn delete_file(&self, path: &str) -> TransportResult<()>;

    /// Remove a directory and everything under it.
    async fn delete_dir(&self, path: &str) -> TransportResult<()>;

    /// List the direct children of a directory.
    async fn list_dir(&self, path: &str) -> TransportResult<Vec<DirEntry>>;
}
