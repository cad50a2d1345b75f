//! Connection lifecycle for a storage cluster.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::errors::{Result, SkyhookError};
use crate::transport::{StorageTransport, TransportResult};

/// Steps performed when connecting, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectStep {
    InitIdentity,
    LoadConfig,
    OpenConnection,
    BindNamespace,
}

impl fmt::Display for ConnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InitIdentity => "init identity",
            Self::LoadConfig => "load config",
            Self::OpenConnection => "open connection",
            Self::BindNamespace => "bind namespace",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Disconnected,
}

/// Handle to a storage cluster.
///
/// Remote executions hold a shared lock on the connection state for their
/// whole duration, `connect` and `disconnect` take it exclusively.
#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    transport: Arc<dyn StorageTransport>,
    state: RwLock<ConnectionState>,
}

impl Cluster {
    pub fn new(config: ClusterConfig, transport: Arc<dyn StorageTransport>) -> Self {
        Cluster {
            config,
            transport,
            state: RwLock::new(ConnectionState::Unconnected),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Connect to the cluster.
    ///
    /// Only valid on a cluster that has never been connected. If any step
    /// fails the cluster is left unconnected and connect may be retried.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Unconnected {
            return Err(SkyhookError::InvalidState(format!(
                "cannot connect from state {:?}",
                *state
            )));
        }

        *state = ConnectionState::Connecting;
        match self.run_connect_steps().await {
            Ok(()) => {
                *state = ConnectionState::Connected;
                info!(pool = %self.config.pool, user = %self.config.user, "connected to cluster");
                Ok(())
            }
            Err(e) => {
                self.transport.shutdown().await;
                *state = ConnectionState::Unconnected;
                warn!(%e, "failed to connect to cluster");
                Err(e)
            }
        }
    }

    async fn run_connect_steps(&self) -> Result<()> {
        let conf = &self.config;

        step(
            ConnectStep::InitIdentity,
            self.transport
                .init(&conf.user, &conf.cluster_name, conf.flags)
                .await,
        )?;
        step(
            ConnectStep::LoadConfig,
            self.transport.load_config(&conf.config_path).await,
        )?;
        step(ConnectStep::OpenConnection, self.transport.open().await)?;
        step(
            ConnectStep::BindNamespace,
            self.transport.bind_namespace(&conf.pool).await,
        )?;

        Ok(())
    }

    /// Disconnect from the cluster. Disconnecting twice is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Connected => {
                self.transport.shutdown().await;
                *state = ConnectionState::Disconnected;
                info!(pool = %self.config.pool, "disconnected from cluster");
                Ok(())
            }
            ConnectionState::Disconnected => Ok(()),
            other => Err(SkyhookError::InvalidState(format!(
                "cannot disconnect from state {other:?}"
            ))),
        }
    }

    /// Hold the connection open, failing if the cluster isn't connected.
    pub(crate) async fn connected(&self) -> Result<RwLockReadGuard<'_, ConnectionState>> {
        let state = self.state.read().await;
        if *state != ConnectionState::Connected {
            return Err(SkyhookError::NotConnected);
        }
        Ok(state)
    }

    pub(crate) fn transport(&self) -> &dyn StorageTransport {
        self.transport.as_ref()
    }

    /// Execute `op` of the configured object class on an object.
    ///
    /// `timeout` overrides the configured execution timeout.
    pub async fn exec(
        &self,
        object_id: &str,
        op: &str,
        input: Bytes,
        timeout: Option<Duration>,
    ) -> Result<Bytes> {
        let _guard = self.connected().await?;

        debug!(%object_id, %op, input_len = input.len(), "remote exec");
        let fut = self
            .transport
            .exec(object_id, &self.config.class_name, op, input);

        let res = match timeout.or(self.config.exec_timeout) {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(%object_id, %op, ?timeout, "remote exec timed out");
                    return Err(SkyhookError::Timeout {
                        object: object_id.to_string(),
                        op: op.to_string(),
                        timeout,
                    });
                }
            },
            None => fut.await,
        };

        res.map_err(|source| SkyhookError::RemoteExecution {
            object: object_id.to_string(),
            op: op.to_string(),
            source,
        })
    }
}

fn step<T>(step: ConnectStep, res: TransportResult<T>) -> Result<T> {
    res.map_err(|source| SkyhookError::Connection { step, source })
}
