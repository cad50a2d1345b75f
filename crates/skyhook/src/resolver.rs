//! Mapping logical paths onto the storage objects backing them.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::cluster::Cluster;
use crate::errors::{Result, SkyhookError};
use crate::transport::{FileStat, TransportError};

/// Suffix for the first (and only) stripe of a file.
pub const STRIPE_SUFFIX: &str = ".00000000";

/// Id of the object holding the first stripe of the file with `inode`.
pub fn physical_id_for_inode(inode: u64) -> String {
    format!("{inode:x}{STRIPE_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAddress {
    /// Path in the namespace, empty if the object was addressed directly.
    pub logical_path: String,
    pub physical_id: String,
}

impl ObjectAddress {
    pub fn from_inode(logical_path: impl Into<String>, inode: u64) -> Self {
        ObjectAddress {
            logical_path: logical_path.into(),
            physical_id: physical_id_for_inode(inode),
        }
    }

    pub fn from_object_id(physical_id: impl Into<String>) -> Self {
        ObjectAddress {
            logical_path: String::new(),
            physical_id: physical_id.into(),
        }
    }
}

/// How a fragment addresses its object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectTarget {
    /// A file path, resolved each time it's used.
    Path(String),
    /// An already resolved object id.
    Object(String),
}

impl ObjectTarget {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn object(id: impl Into<String>) -> Self {
        Self::Object(id.into())
    }
}

impl fmt::Display for ObjectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "path:{p}"),
            Self::Object(o) => write!(f, "object:{o}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObject {
    pub address: ObjectAddress,
    /// Size of the backing file, `0` when addressed by object id.
    pub size_hint: i64,
}

/// Resolves targets against a cluster's namespace and executes remote
/// operations on the resolved objects.
///
/// Nothing is cached, every resolve stats the path again.
#[derive(Debug, Clone)]
pub struct ObjectResolver {
    cluster: Arc<Cluster>,
}

impl ObjectResolver {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        ObjectResolver { cluster }
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat> {
        let _guard = self.cluster.connected().await?;
        self.cluster
            .transport()
            .stat(path)
            .await
            .map_err(|source| SkyhookError::Resolution {
                path: path.to_string(),
                source,
            })
    }

    pub async fn resolve(&self, path: &str) -> Result<ObjectAddress> {
        let stat = self.stat(path).await?;
        let address = ObjectAddress::from_inode(path, stat.inode);
        debug!(%path, physical_id = %address.physical_id, "resolved path");
        Ok(address)
    }

    pub async fn resolve_target(&self, target: &ObjectTarget) -> Result<ResolvedObject> {
        match target {
            ObjectTarget::Path(path) => {
                let stat = self.stat(path).await?;
                Ok(ResolvedObject {
                    address: ObjectAddress::from_inode(path.as_str(), stat.inode),
                    size_hint: i64::try_from(stat.size).unwrap_or(i64::MAX),
                })
            }
            ObjectTarget::Object(id) => Ok(ResolvedObject {
                address: ObjectAddress::from_object_id(id.as_str()),
                size_hint: 0,
            }),
        }
    }

    /// Execute `op` on the object with `physical_id`.
    pub async fn execute(
        &self,
        physical_id: &str,
        op: &str,
        input: Bytes,
        timeout: Option<Duration>,
    ) -> Result<Bytes> {
        self.cluster.exec(physical_id, op, input, timeout).await
    }

    /// Create a file, returning its (possibly pre-existing) address.
    pub async fn create(&self, path: &str) -> Result<ObjectAddress> {
        let _guard = self.cluster.connected().await?;
        let stat = self
            .cluster
            .transport()
            .create_file(path)
            .await
            .map_err(namespace_err(path))?;
        Ok(ObjectAddress::from_inode(path, stat.inode))
    }

    /// Create a directory, with its parents when `recursive`.
    pub async fn create_dir(&self, path: &str, recursive: bool) -> Result<()> {
        let _guard = self.cluster.connected().await?;
        self.cluster
            .transport()
            .create_dir(path, recursive)
            .await
            .map_err(namespace_err(path))
    }

    /// Delete a file and the object backing it.
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let _guard = self.cluster.connected().await?;
        self.cluster
            .transport()
            .delete_file(path)
            .await
            .map_err(namespace_err(path))?;
        debug!(%path, "deleted file");
        Ok(())
    }

    /// Delete files one by one, stopping at the first failure.
    pub async fn delete_files<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        for path in paths {
            self.delete_file(path.as_ref()).await?;
        }
        Ok(())
    }

    /// Delete a directory and everything under it.
    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        let _guard = self.cluster.connected().await?;
        self.cluster
            .transport()
            .delete_dir(path)
            .await
            .map_err(namespace_err(path))
    }

    /// Recursively list every file under `root`, sorted by path.
    pub async fn list_files(&self, root: &str) -> Result<Vec<String>> {
        let _guard = self.cluster.connected().await?;
        let transport = self.cluster.transport();

        let mut files = Vec::new();
        let mut pending = vec![root.trim_end_matches('/').to_string()];

        while let Some(dir) = pending.pop() {
            let entries = transport
                .list_dir(if dir.is_empty() { "/" } else { &dir })
                .await
                .map_err(namespace_err(&dir))?;

            for entry in entries {
                if entry.name == "." || entry.name == ".." {
                    continue;
                }
                let path = format!("{dir}/{}", entry.name);
                if entry.is_dir {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

fn namespace_err(path: &str) -> impl FnOnce(TransportError) -> SkyhookError + '_ {
    move |source| SkyhookError::Namespace {
        path: path.to_string(),
        source,
    }
}
