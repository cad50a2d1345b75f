//! In-process transport hosting the object class.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    DirEntry, EEXIST, EIO, ENOTCONN, EOPNOTSUPP, FileStat, StorageTransport, TransportError,
    TransportResult,
};
use crate::cluster::ConnectStep;
use crate::config::DEFAULT_CLASS_NAME;
use crate::object_class;
use crate::resolver::physical_id_for_inode;

const FIRST_INODE: u64 = 0x100_0000_0000;

#[derive(Debug, Default)]
struct Session {
    identity: Option<String>,
    config_loaded: bool,
    open: bool,
    pool: Option<String>,
}

#[derive(Debug)]
struct State {
    session: Session,
    fail_at: Option<ConnectStep>,
    /// Normalized file path to inode.
    files: BTreeMap<String, u64>,
    /// Explicitly created directories. Parents of files are implicit.
    dirs: BTreeSet<String>,
    objects: HashMap<String, Bytes>,
    next_inode: u64,
}

/// A storage cluster living in memory.
///
/// Files in the namespace are backed by the object whose id is derived from
/// the file's inode, the same as a real file system layered over an object
/// store. Cloning returns a handle to the same cluster.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    class_name: String,
    exec_delay: Option<Duration>,
    state: Arc<Mutex<State>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport {
            class_name: DEFAULT_CLASS_NAME.to_string(),
            exec_delay: None,
            state: Arc::new(Mutex::new(State {
                session: Session::default(),
                fail_at: None,
                files: BTreeMap::new(),
                dirs: BTreeSet::new(),
                objects: HashMap::new(),
                next_inode: FIRST_INODE,
            })),
        }
    }

    /// Name of the object class the cluster serves.
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Fail the given connect step with `EIO`.
    pub fn fail_connect_at(self, step: ConnectStep) -> Self {
        self.state.lock().fail_at = Some(step);
        self
    }

    /// Delay every `exec` call.
    pub fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = Some(delay);
        self
    }

    /// Stop failing connect steps.
    pub fn clear_faults(&self) {
        self.state.lock().fail_at = None;
    }

    /// Raw content of an object.
    pub fn object(&self, object_id: &str) -> Option<Bytes> {
        self.state.lock().objects.get(object_id).cloned()
    }

    /// Put an object directly, bypassing the object class.
    pub fn put_object(&self, object_id: impl Into<String>, content: Bytes) {
        self.state.lock().objects.insert(object_id.into(), content);
    }

    pub fn num_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().session.pool.is_some()
    }

    fn check_step(&self, step: ConnectStep) -> TransportResult<()> {
        if self.state.lock().fail_at == Some(step) {
            return Err(TransportError::new(EIO, format!("injected failure: {step}")));
        }
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let parts: Vec<_> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

fn not_connected() -> TransportError {
    TransportError::new(ENOTCONN, "not connected")
}

impl State {
    fn check_connected(&self) -> TransportResult<()> {
        if self.session.pool.is_none() {
            return Err(not_connected());
        }
        Ok(())
    }

    fn is_dir(&self, path: &str) -> bool {
        if path == "/" || self.dirs.contains(path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files.keys().any(|f| f.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }

    fn remove_file(&mut self, path: &str) -> Option<u64> {
        let inode = self.files.remove(path)?;
        self.objects.remove(&physical_id_for_inode(inode));
        Some(inode)
    }

    fn stat(&self, path: &str) -> Option<FileStat> {
        let inode = *self.files.get(path)?;
        let size = self
            .objects
            .get(&physical_id_for_inode(inode))
            .map(|b| b.len() as u64)
            .unwrap_or(0);
        Some(FileStat { inode, size })
    }
}

#[async_trait]
impl StorageTransport for MemoryTransport {
    async fn init(&self, user: &str, cluster_name: &str, flags: u64) -> TransportResult<()> {
        self.check_step(ConnectStep::InitIdentity)?;
        debug!(%user, %cluster_name, %flags, "init client identity");
        self.state.lock().session.identity = Some(user.to_string());
        Ok(())
    }

    async fn load_config(&self, path: &str) -> TransportResult<()> {
        self.check_step(ConnectStep::LoadConfig)?;
        let mut state = self.state.lock();
        if state.session.identity.is_none() {
            return Err(TransportError::invalid("client identity not initialized"));
        }
        debug!(%path, "load cluster config");
        state.session.config_loaded = true;
        Ok(())
    }

    async fn open(&self) -> TransportResult<()> {
        self.check_step(ConnectStep::OpenConnection)?;
        let mut state = self.state.lock();
        if !state.session.config_loaded {
            return Err(TransportError::invalid("cluster config not loaded"));
        }
        state.session.open = true;
        Ok(())
    }

    async fn bind_namespace(&self, pool: &str) -> TransportResult<()> {
        self.check_step(ConnectStep::BindNamespace)?;
        let mut state = self.state.lock();
        if !state.session.open {
            return Err(not_connected());
        }
        state.session.pool = Some(pool.to_string());
        Ok(())
    }

    async fn shutdown(&self) {
        self.state.lock().session = Session::default();
    }

    async fn exec(
        &self,
        object_id: &str,
        class_name: &str,
        op: &str,
        input: Bytes,
    ) -> TransportResult<Bytes> {
        if let Some(delay) = self.exec_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.check_connected()?;
        if class_name != self.class_name {
            return Err(TransportError::new(
                EOPNOTSUPP,
                format!("object class '{class_name}' not loaded"),
            ));
        }

        trace!(%object_id, %op, input_len = input.len(), "exec");
        let invalid = |e: crate::errors::SkyhookError| TransportError::invalid(e.to_string());

        match op {
            "write" => {
                object_class::write(&input).map_err(invalid)?;
                state.objects.insert(object_id.to_string(), input);
                Ok(Bytes::new())
            }
            "read_schema" | "scan" => {
                let stored = state.objects.get(object_id).ok_or_else(|| {
                    TransportError::not_found(format!("object '{object_id}' does not exist"))
                })?;
                if op == "scan" {
                    object_class::scan(stored, &input).map_err(invalid)
                } else {
                    object_class::read_schema(stored).map_err(invalid)
                }
            }
            other => Err(TransportError::new(
                EOPNOTSUPP,
                format!("method '{class_name}.{other}' does not exist"),
            )),
        }
    }

    async fn stat(&self, path: &str) -> TransportResult<FileStat> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check_connected()?;
        state
            .stat(&path)
            .ok_or_else(|| TransportError::not_found(format!("no such file '{path}'")))
    }

    async fn create_file(&self, path: &str) -> TransportResult<FileStat> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check_connected()?;

        if let Some(stat) = state.stat(&path) {
            return Ok(stat);
        }
        if path == "/" || state.is_dir(&path) {
            return Err(TransportError::invalid(format!("'{path}' is a directory")));
        }

        let inode = state.next_inode;
        state.next_inode += 1;
        state.files.insert(path.clone(), inode);
        debug!(%path, %inode, "created file");

        Ok(FileStat { inode, size: 0 })
    }

    async fn create_dir(&self, path: &str, recursive: bool) -> TransportResult<()> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check_connected()?;

        if state.files.contains_key(&path) {
            return Err(TransportError::new(
                EEXIST,
                format!("'{path}' exists and is a file"),
            ));
        }
        if state.is_dir(&path) {
            return Ok(());
        }

        let parent = match path.rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        };
        if state.files.contains_key(&parent) {
            return Err(TransportError::new(
                EEXIST,
                format!("parent '{parent}' is a file"),
            ));
        }
        if !recursive && !state.is_dir(&parent) {
            return Err(TransportError::not_found(format!(
                "parent directory '{parent}' does not exist"
            )));
        }

        debug!(%path, %recursive, "created directory");
        state.dirs.insert(path);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> TransportResult<()> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check_connected()?;

        let inode = state
            .remove_file(&path)
            .ok_or_else(|| TransportError::not_found(format!("no such file '{path}'")))?;
        debug!(%path, %inode, "deleted file");
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> TransportResult<()> {
        let path = normalize(path);
        let mut state = self.state.lock();
        state.check_connected()?;

        if path == "/" {
            return Err(TransportError::invalid("cannot delete the root directory"));
        }
        if !state.is_dir(&path) {
            return Err(TransportError::not_found(format!(
                "no such directory '{path}'"
            )));
        }

        let prefix = format!("{path}/");
        let files: Vec<String> = state
            .files
            .keys()
            .filter(|f| f.starts_with(&prefix))
            .cloned()
            .collect();
        for file in &files {
            state.remove_file(file);
        }
        state
            .dirs
            .retain(|d| d.as_str() != path && !d.starts_with(&prefix));

        debug!(%path, num_files = files.len(), "deleted directory");
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> TransportResult<Vec<DirEntry>> {
        let path = normalize(path);
        let state = self.state.lock();
        state.check_connected()?;

        if !state.is_dir(&path) {
            return Err(TransportError::not_found(format!("no such directory '{path}'")));
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };

        let mut entries: BTreeMap<String, bool> = BTreeMap::new();
        for candidate in state.files.keys().chain(state.dirs.iter()) {
            let Some(rest) = candidate.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                Some((child, _)) => {
                    entries.insert(child.to_string(), true);
                }
                None => {
                    let is_dir = state.dirs.contains(candidate.as_str());
                    entries.entry(rest.to_string()).or_insert(is_dir);
                }
            }
        }

        let mut out = vec![
            DirEntry {
                name: ".".to_string(),
                is_dir: true,
            },
            DirEntry {
                name: "..".to_string(),
                is_dir: true,
            },
        ];
        out.extend(
            entries
                .into_iter()
                .map(|(name, is_dir)| DirEntry { name, is_dir }),
        );

        Ok(out)
    }
}
