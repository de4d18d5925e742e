//! In-Memory Backend
//!
//! Process-local stand-in for the managed document store. Like the real
//! service it stamps documents on write (`updatedAt`, `version`), which is why
//! the coordinator invalidates instead of caching what it wrote. Failure
//! injection and write holds let tests script outages and mid-replay
//! disconnects.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tracing::debug;

use crate::cache::Payload;
use crate::queue::ActionKind;
use crate::sync::{Backend, BackendError, WriteMode};

type DocKey = (String, String);

fn doc_key(partition: &str, id: &str) -> DocKey {
    (partition.to_string(), id.to_string())
}

/// One operation the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOp {
    pub partition: String,
    pub id: String,
    pub kind: ActionKind,
}

#[derive(Debug)]
pub struct MemoryBackend {
    documents: RwLock<HashMap<DocKey, Payload>>,
    failures: Mutex<HashMap<DocKey, BackendError>>,
    single_failures: Mutex<HashMap<DocKey, BackendError>>,
    unavailable: AtomicBool,
    held: Mutex<HashSet<DocKey>>,
    released: watch::Sender<u64>,
    hold_reached: Notify,
    applied: Mutex<Vec<AppliedOp>>,
    reads: AtomicU64,
    version: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (released, _) = watch::channel(0);
        Self {
            documents: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            single_failures: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            held: Mutex::new(HashSet::new()),
            released,
            hold_reached: Notify::new(),
            applied: Mutex::new(Vec::new()),
            reads: AtomicU64::new(0),
            version: AtomicU64::new(0),
        }
    }

    // == Seeding & Inspection ==
    /// Stores a document verbatim, without server-side stamps.
    pub async fn insert(&self, partition: &str, id: &str, payload: Payload) {
        self.documents
            .write()
            .await
            .insert(doc_key(partition, id), payload);
    }

    pub async fn document(&self, partition: &str, id: &str) -> Option<Payload> {
        self.documents.read().await.get(&doc_key(partition, id)).cloned()
    }

    /// Operations accepted so far, in order.
    pub async fn applied(&self) -> Vec<AppliedOp> {
        self.applied.lock().await.clone()
    }

    /// Number of read calls served (including failed ones).
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    // == Failure Injection ==
    /// Every operation on (partition, id) fails with `error` until cleared.
    pub async fn fail_on(&self, partition: &str, id: &str, error: BackendError) {
        self.failures.lock().await.insert(doc_key(partition, id), error);
    }

    /// Only the next operation on (partition, id) fails.
    pub async fn fail_once(&self, partition: &str, id: &str, error: BackendError) {
        self.single_failures
            .lock()
            .await
            .insert(doc_key(partition, id), error);
    }

    pub async fn clear_failure(&self, partition: &str, id: &str) {
        let key = doc_key(partition, id);
        self.failures.lock().await.remove(&key);
        self.single_failures.lock().await.remove(&key);
    }

    /// Makes every operation fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // == Write Holds ==
    /// Writes and deletes on (partition, id) block until [`release`](Self::release).
    pub async fn hold(&self, partition: &str, id: &str) {
        self.held.lock().await.insert(doc_key(partition, id));
    }

    pub async fn release(&self, partition: &str, id: &str) {
        self.held.lock().await.remove(&doc_key(partition, id));
        self.released.send_modify(|generation| *generation += 1);
    }

    /// Resolves once an operation is blocked on a hold.
    pub async fn wait_for_hold(&self) {
        self.hold_reached.notified().await;
    }

    async fn check(&self, key: &DocKey) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        if let Some(error) = self.single_failures.lock().await.remove(key) {
            return Err(error);
        }
        match self.failures.lock().await.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn wait_while_held(&self, key: &DocKey) {
        let mut released = self.released.subscribe();
        if !self.held.lock().await.contains(key) {
            return;
        }
        self.hold_reached.notify_one();
        loop {
            if released.changed().await.is_err() {
                return;
            }
            if !self.held.lock().await.contains(key) {
                return;
            }
        }
    }

    async fn record(&self, key: &DocKey, kind: ActionKind) {
        self.applied.lock().await.push(AppliedOp {
            partition: key.0.clone(),
            id: key.1.clone(),
            kind,
        });
    }

    /// Adds the stamps the managed store puts on every write.
    fn stamp(&self, mut document: Map<String, Value>) -> Payload {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        document.insert("updatedAt".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        document.insert("version".to_string(), json!(version));
        Value::Object(document)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn into_object(payload: Payload) -> Result<Map<String, Value>, BackendError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Rejected(format!(
            "documents must be JSON objects, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, partition: &str, id: &str) -> Result<Option<Payload>, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let key = doc_key(partition, id);
        self.check(&key).await?;
        Ok(self.documents.read().await.get(&key).cloned())
    }

    async fn write(
        &self,
        partition: &str,
        id: &str,
        payload: Payload,
        mode: WriteMode,
    ) -> Result<(), BackendError> {
        let key = doc_key(partition, id);
        self.wait_while_held(&key).await;
        self.check(&key).await?;
        let incoming = into_object(payload)?;

        let mut documents = self.documents.write().await;
        let document = match mode {
            WriteMode::Replace => incoming,
            WriteMode::Merge => {
                let Some(existing) = documents.get(&key) else {
                    return Err(BackendError::NotFound(format!("{}/{}", partition, id)));
                };
                let mut merged = into_object(existing.clone())?;
                merged.extend(incoming);
                merged
            }
        };
        documents.insert(key.clone(), self.stamp(document));
        drop(documents);

        let kind = match mode {
            WriteMode::Replace => ActionKind::Create,
            WriteMode::Merge => ActionKind::Update,
        };
        debug!(partition, id, ?mode, "backend write applied");
        self.record(&key, kind).await;
        Ok(())
    }

    async fn delete(&self, partition: &str, id: &str) -> Result<(), BackendError> {
        let key = doc_key(partition, id);
        self.wait_while_held(&key).await;
        self.check(&key).await?;

        self.documents.write().await.remove(&key);
        self.record(&key, ActionKind::Delete).await;
        Ok(())
    }
}
