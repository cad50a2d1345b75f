use std::time::Duration;

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;

use crate::cluster::ConnectStep;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SkyhookError {
    #[error("Failed to connect to cluster, {step} failed: {source}")]
    Connection {
        step: ConnectStep,
        #[source]
        source: TransportError,
    },

    #[error("Cluster is not connected")]
    NotConnected,

    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    #[error("Failed to resolve '{path}': {source}")]
    Resolution {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Namespace operation on '{path}' failed: {source}")]
    Namespace {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Malformed scan request: {0}")]
    MalformedRequest(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Remote '{op}' on object '{object}' failed: {source}")]
    RemoteExecution {
        object: String,
        op: String,
        #[source]
        source: TransportError,
    },

    #[error("Remote '{op}' on object '{object}' timed out after {timeout:?}")]
    Timeout {
        object: String,
        op: String,
        timeout: Duration,
    },

    #[error("Invalid schema projection: {0}")]
    SchemaProjection(String),

    #[error("Invalid partitioning: {0}")]
    Partitioning(String),

    #[error("Invalid task state: {0}")]
    TaskState(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    DataFusion(#[from] DataFusionError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SkyhookError> = std::result::Result<T, E>;
