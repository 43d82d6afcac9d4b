//! The session registry: one worker task owns every session record and
//! applies operations strictly one at a time.
//!
//! Callers talk to the worker through a cloneable [`RegistryHandle`]. Each
//! call sends a [`RegistryCommand`] carrying a oneshot reply channel and
//! waits (bounded by the configured timeout) for the answer. There is no
//! lock around the store; the single worker is the only synchronization.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use {
    chrono::Utc,
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
    uuid::Uuid,
};

use crate::{
    error::{RegistryError, Result},
    log_file::{FsLogWriter, LogWriter, format_log_line},
    record::SessionRecord,
};

/// Default bound on a single registry call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a registry worker.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory every session file path is rooted under.
    pub log_dir: PathBuf,
    /// How long a caller waits for the worker before giving up.
    pub request_timeout: Duration,
}

impl RegistryConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Protocol ─────────────────────────────────────────────────────────────────

/// One operation queued for the worker, with the channel its result goes to.
#[derive(Debug)]
pub enum RegistryCommand {
    Create {
        name: String,
        reply: oneshot::Sender<Uuid>,
    },
    List {
        reply: oneshot::Sender<Vec<SessionRecord>>,
    },
    Close {
        id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    Write {
        id: Uuid,
        content: String,
        reply: oneshot::Sender<Result<PathBuf>>,
    },
}

impl RegistryCommand {
    fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::List { .. } => "list",
            Self::Close { .. } => "close",
            Self::Write { .. } => "write",
        }
    }

    /// The caller stopped waiting (timed out or was dropped).
    fn is_abandoned(&self) -> bool {
        match self {
            Self::Create { reply, .. } => reply.is_closed(),
            Self::List { reply } => reply.is_closed(),
            Self::Close { reply, .. } => reply.is_closed(),
            Self::Write { reply, .. } => reply.is_closed(),
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

struct StoredSession {
    seq: u64,
    record: SessionRecord,
}

/// id → record. Only ever touched from inside the worker.
#[derive(Default)]
struct SessionStore {
    sessions: HashMap<Uuid, StoredSession>,
    next_seq: u64,
}

impl SessionStore {
    fn insert(&mut self, record: SessionRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.sessions.insert(record.id, StoredSession { seq, record });
    }

    fn get(&self, id: &Uuid) -> Option<&SessionRecord> {
        self.sessions.get(id).map(|s| &s.record)
    }

    fn remove(&mut self, id: &Uuid) -> Option<SessionRecord> {
        self.sessions.remove(id).map(|s| s.record)
    }

    /// All records, oldest first.
    fn list(&self) -> Vec<SessionRecord> {
        let mut stored: Vec<_> = self.sessions.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.record.clone()).collect()
    }
}

// ── Worker ───────────────────────────────────────────────────────────────────

struct RegistryWorker {
    store: SessionStore,
    log_dir: PathBuf,
    writer: Arc<dyn LogWriter>,
    commands: mpsc::UnboundedReceiver<RegistryCommand>,
    shutdown: CancellationToken,
}

impl RegistryWorker {
    async fn run(mut self) {
        debug!(log_dir = %self.log_dir.display(), "session registry started");
        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            if command.is_abandoned() {
                debug!(kind = command.kind(), "skipping abandoned registry command");
                continue;
            }
            self.handle(command).await;
        }
        info!(
            sessions = self.store.sessions.len(),
            "session registry stopped"
        );
    }

    async fn handle(&mut self, command: RegistryCommand) {
        // A dropped receiver only means the caller went away; nothing to do.
        match command {
            RegistryCommand::Create { name, reply } => {
                let _ = reply.send(self.create(name));
            },
            RegistryCommand::List { reply } => {
                let _ = reply.send(self.store.list());
            },
            RegistryCommand::Close { id, reply } => {
                let _ = reply.send(self.close(id));
            },
            RegistryCommand::Write { id, content, reply } => {
                let result = self.write(id, &content).await;
                let _ = reply.send(result);
            },
        }
    }

    fn create(&mut self, name: String) -> Uuid {
        let record = SessionRecord::new(&self.log_dir, &name, Utc::now());
        let id = record.id;
        info!(%id, name = %record.name, path = %record.file_path.display(), "session created");
        self.store.insert(record);
        id
    }

    fn close(&mut self, id: Uuid) -> Result<()> {
        match self.store.remove(&id) {
            Some(record) => {
                info!(%id, name = %record.name, "session closed");
                Ok(())
            },
            None => {
                debug!(%id, "close for unknown session");
                Err(RegistryError::NotFound(id))
            },
        }
    }

    async fn write(&mut self, id: Uuid, content: &str) -> Result<PathBuf> {
        let Some(path) = self.store.get(&id).map(|r| r.file_path.clone()) else {
            debug!(%id, "write for unknown session");
            return Err(RegistryError::NotFound(id));
        };

        let line = format_log_line(Utc::now(), content);
        let written = match self.writer.ensure_file(&path).await {
            Ok(()) => self.writer.append_line(&path, &line).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                debug!(%id, path = %path.display(), "session log appended");
                Ok(path)
            },
            Err(source) => {
                warn!(%id, path = %path.display(), error = %source, "session log write failed");
                Err(RegistryError::Io { path, source })
            },
        }
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Cloneable entry point to a running registry worker.
#[derive(Clone)]
pub struct RegistryHandle {
    commands: mpsc::UnboundedSender<RegistryCommand>,
    request_timeout: Duration,
}

impl RegistryHandle {
    /// Start a worker that writes session logs to the local filesystem.
    pub fn spawn(config: RegistryConfig, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        Self::spawn_with_writer(config, Arc::new(FsLogWriter), shutdown)
    }

    /// Start a worker with a custom [`LogWriter`].
    ///
    /// The worker exits when `shutdown` is cancelled or every handle is
    /// dropped. Commands still queued at that point are dropped and their
    /// callers see [`RegistryError::Unavailable`].
    pub fn spawn_with_writer(
        config: RegistryConfig,
        writer: Arc<dyn LogWriter>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = RegistryWorker {
            store: SessionStore::default(),
            log_dir: config.log_dir,
            writer,
            commands: rx,
            shutdown,
        };
        let task = tokio::spawn(worker.run());
        let handle = Self {
            commands: tx,
            request_timeout: config.request_timeout,
        };
        (handle, task)
    }

    /// Register a new session and return its id.
    pub async fn create(&self, name: impl Into<String>) -> Result<Uuid> {
        let name = name.into();
        self.call(|reply| RegistryCommand::Create { name, reply })
            .await
    }

    /// Every live session, in creation order.
    pub async fn list(&self) -> Result<Vec<SessionRecord>> {
        self.call(|reply| RegistryCommand::List { reply }).await
    }

    /// Discard a session. Its log file is left on disk.
    pub async fn close(&self, id: Uuid) -> Result<()> {
        self.call(|reply| RegistryCommand::Close { id, reply })
            .await?
    }

    /// Append one line to a session's log file, creating it on first use.
    /// Returns the path that was written.
    pub async fn write(&self, id: Uuid, content: impl Into<String>) -> Result<PathBuf> {
        let content = content.into();
        self.call(|reply| RegistryCommand::Write { id, content, reply })
            .await?
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| RegistryError::Unavailable)?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(RegistryError::Unavailable),
            Err(_) => Err(RegistryError::Timeout(self.request_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, io, path::Path};

    use {async_trait::async_trait, tempfile::TempDir};

    use super::*;

    fn start(dir: &TempDir) -> RegistryHandle {
        let (handle, _task) =
            RegistryHandle::spawn(RegistryConfig::new(dir.path()), CancellationToken::new());
        handle
    }

    struct FailingWriter;

    #[async_trait]
    impl LogWriter for FailingWriter {
        async fn ensure_file(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        async fn append_line(&self, _path: &Path, _line: &str) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    struct SlowWriter(Duration);

    #[async_trait]
    impl LogWriter for SlowWriter {
        async fn ensure_file(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        async fn append_line(&self, _path: &Path, _line: &str) -> io::Result<()> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let id = registry.create("build").await.unwrap();
        let sessions = registry.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].name, "build");
        assert_eq!(sessions[0].file_path.parent(), Some(dir.path()));
    }

    #[tokio::test]
    async fn ids_are_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let a = registry.create("same").await.unwrap();
        let b = registry.create("same").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_is_in_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            ids.push(registry.create(name).await.unwrap());
        }
        registry.close(ids[1]).await.unwrap();
        ids.remove(1);

        let listed: Vec<Uuid> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn close_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);
        registry.create("keep").await.unwrap();

        let missing = Uuid::new_v4();
        let err = registry.close(missing).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(id) if id == missing));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let id = registry.create("short-lived").await.unwrap();
        registry.close(id).await.unwrap();
        assert!(registry.list().await.unwrap().iter().all(|r| r.id != id));
        assert!(matches!(
            registry.close(id).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_append_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let id = registry.create("build").await.unwrap();
        let first = registry.write(id, "started").await.unwrap();
        let second = registry.write(id, "finished").await.unwrap();
        assert_eq!(first, second);

        let contents = std::fs::read_to_string(&first).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" Log: started"));
        assert!(lines[1].ends_with(" Log: finished"));
    }

    #[tokio::test]
    async fn write_unknown_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let err = registry.write(Uuid::new_v4(), "orphan").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn long_names_are_still_writable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let name = "a".repeat(300);
        let id = registry.create(name.clone()).await.unwrap();
        registry.write(id, "fits").await.unwrap();

        let sessions = registry.list().await.unwrap();
        assert_eq!(sessions[0].name, name);
        let path = &sessions[0].file_path;
        assert_eq!(path.parent(), Some(dir.path()));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.ends_with(" Log: fits\n"));
    }

    #[tokio::test]
    async fn failed_write_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _task) = RegistryHandle::spawn_with_writer(
            RegistryConfig::new(dir.path()),
            Arc::new(FailingWriter),
            CancellationToken::new(),
        );

        let id = registry.create("fragile").await.unwrap();
        let err = registry.write(id, "lost").await.unwrap_err();
        match err {
            RegistryError::Io { source, .. } => assert_eq!(source.to_string(), "disk full"),
            other => panic!("unexpected error: {other}"),
        }

        let sessions = registry.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_are_all_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start(&dir);

        let tasks: Vec<_> = (0..100)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create(format!("job-{i}")).await })
            })
            .collect();

        let ids: HashSet<Uuid> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        assert_eq!(ids.len(), 100);

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 100);
        let listed_ids: HashSet<Uuid> = listed.iter().map(|r| r.id).collect();
        assert_eq!(listed_ids, ids);
    }

    #[tokio::test]
    async fn stalled_worker_times_out_and_skips_abandoned_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _task) = RegistryHandle::spawn_with_writer(
            RegistryConfig::new(dir.path()).with_request_timeout(Duration::from_millis(50)),
            Arc::new(SlowWriter(Duration::from_millis(500))),
            CancellationToken::new(),
        );

        let id = registry.create("slow").await.unwrap();
        assert!(matches!(
            registry.write(id, "blocking").await,
            Err(RegistryError::Timeout(_))
        ));
        // Queued behind the stalled write; the caller gives up first.
        assert!(matches!(
            registry.create("abandoned").await,
            Err(RegistryError::Timeout(_))
        ));

        tokio::time::sleep(Duration::from_millis(700)).await;
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["slow".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_worker_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let (registry, task) =
            RegistryHandle::spawn(RegistryConfig::new(dir.path()), shutdown.clone());

        registry.create("before").await.unwrap();
        shutdown.cancel();
        task.await.unwrap();

        assert!(matches!(
            registry.create("after").await,
            Err(RegistryError::Unavailable)
        ));
        assert!(matches!(
            registry.list().await,
            Err(RegistryError::Unavailable)
        ));
    }
}
