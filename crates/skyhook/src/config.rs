//! Cluster connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub const DEFAULT_POOL: &str = "cephfs_data";
pub const DEFAULT_USER: &str = "client.admin";
pub const DEFAULT_CLUSTER_NAME: &str = "ceph";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ceph/ceph.conf";
pub const DEFAULT_CLASS_NAME: &str = "arrow";

/// Everything needed to connect to a storage cluster and address its object
/// class.
///
/// Missing keys fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pool (namespace) the connection binds to. Defaults to `cephfs_data`.
    pub pool: String,
    /// Client identity used when initializing the connection. Defaults to
    /// `client.admin`.
    pub user: String,
    /// Name of the cluster. Defaults to `ceph`.
    pub cluster_name: String,
    /// Path of the cluster configuration file loaded during connect. Defaults
    /// to `/etc/ceph/ceph.conf`.
    pub config_path: String,
    /// Flags passed through to client initialization. Defaults to `0`.
    pub flags: u64,
    /// Object class implementing `scan`, `write` and `read_schema` on the
    /// storage nodes. Defaults to `arrow`.
    pub class_name: String,
    /// Timeout applied to every remote call unless a scan overrides it. No
    /// timeout by default.
    pub exec_timeout: Option<Duration>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            pool: DEFAULT_POOL.to_string(),
            user: DEFAULT_USER.to_string(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            flags: 0,
            class_name: DEFAULT_CLASS_NAME.to_string(),
            exec_timeout: None,
        }
    }
}

impl ClusterConfig {
    /// Default config bound to `pool`.
    pub fn from_pool(pool: impl Into<String>) -> Self {
        ClusterConfig {
            pool: pool.into(),
            ..Default::default()
        }
    }

    /// Parse a config from json.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self
    }

    pub fn with_config_path(mut self, config_path: impl Into<String>) -> Self {
        self.config_path = config_path.into();
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = Some(timeout);
        self
    }
}
