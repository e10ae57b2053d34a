// src/store/memory.rs
//! In-memory document store with optional JSON snapshots.
//!
//! Each call takes the collection lock once, so every primitive is atomic per call,
//! which is all the engine assumes of a real store. `set_offline(true)` makes every
//! call fail with `PersistenceError::Unavailable`, simulating connectivity loss;
//! `set_read_only(true)` fails only `upsert`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AnalysisRecord, Collection, Document, Store};
use crate::error::PersistenceError;
use crate::model::{Author, Question};

/// Number of calls per primitive, for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub upserts: usize,
    pub exists_any: usize,
    pub finds: usize,
    pub gets: usize,
}

#[derive(Debug, Default)]
struct Counters {
    upserts: AtomicUsize,
    exists_any: AtomicUsize,
    finds: AtomicUsize,
    gets: AtomicUsize,
}

#[derive(Debug)]
pub struct MemoryCollection<D: Document> {
    docs: RwLock<BTreeMap<D::Key, D>>,
    offline: AtomicBool,
    read_only: AtomicBool,
    counters: Counters,
}

impl<D: Document> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }
}

impl<D: Document> MemoryCollection<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_docs(docs: impl IntoIterator<Item = D>) -> Self {
        let map = docs.into_iter().map(|d| (d.key(), d)).collect();
        Self {
            docs: RwLock::new(map),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            upserts: self.counters.upserts.load(Ordering::SeqCst),
            exists_any: self.counters.exists_any.load(Ordering::SeqCst),
            finds: self.counters.finds.load(Ordering::SeqCst),
            gets: self.counters.gets.load(Ordering::SeqCst),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All documents in `D::sort` order, bypassing the offline switch.
    pub fn snapshot(&self) -> Result<Vec<D>, PersistenceError> {
        let guard = self.docs.read().map_err(|_| poisoned::<D>())?;
        let mut out: Vec<D> = guard.values().cloned().collect();
        D::sort(&mut out);
        Ok(out)
    }

    fn check_online(&self) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                collection: D::COLLECTION,
                reason: "connection lost".into(),
            });
        }
        Ok(())
    }
}

fn poisoned<D: Document>() -> PersistenceError {
    PersistenceError::Unavailable {
        collection: D::COLLECTION,
        reason: "collection lock poisoned".into(),
    }
}

#[async_trait]
impl<D: Document> Collection<D> for MemoryCollection<D> {
    async fn upsert(&self, key: D::Key, doc: D) -> Result<(), PersistenceError> {
        self.counters.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                collection: D::COLLECTION,
                reason: "store is read-only".into(),
            });
        }
        if doc.key() != key {
            return Err(PersistenceError::Rejected {
                collection: D::COLLECTION,
                key: format!("{key:?}"),
                reason: format!("document key {:?} does not match", doc.key()),
            });
        }
        let mut guard = self.docs.write().map_err(|_| poisoned::<D>())?;
        guard.insert(key, doc);
        Ok(())
    }

    async fn exists_any(&self, keys: &BTreeSet<D::Key>) -> Result<BTreeSet<D::Key>, PersistenceError> {
        self.counters.exists_any.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let guard = self.docs.read().map_err(|_| poisoned::<D>())?;
        Ok(keys.iter().filter(|k| guard.contains_key(*k)).cloned().collect())
    }

    async fn find(&self, filter: &D::Filter) -> Result<Vec<D>, PersistenceError> {
        self.counters.finds.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let guard = self.docs.read().map_err(|_| poisoned::<D>())?;
        let mut out: Vec<D> = guard.values().filter(|d| d.matches(filter)).cloned().collect();
        D::sort(&mut out);
        Ok(out)
    }

    async fn get(&self, key: &D::Key) -> Result<Option<D>, PersistenceError> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let guard = self.docs.read().map_err(|_| poisoned::<D>())?;
        Ok(guard.get(key).cloned())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    analyses: Vec<AnalysisRecord>,
}

/// The three in-memory collections, with typed access for tests and snapshots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub questions: Arc<MemoryCollection<Question>>,
    pub authors: Arc<MemoryCollection<Author>>,
    pub analyses: Arc<MemoryCollection<AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased handles for the engine.
    pub fn store(&self) -> Store {
        Store::new(
            self.questions.clone(),
            self.authors.clone(),
            self.analyses.clone(),
        )
    }

    /// Load a snapshot; a missing file yields an empty store.
    pub async fn load_snapshot(path: &Path) -> Result<Self, PersistenceError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let snap: Snapshot = serde_json::from_slice(&bytes)?;
        info!(
            target: "store",
            path = %path.display(),
            questions = snap.questions.len(),
            authors = snap.authors.len(),
            "snapshot loaded"
        );
        Ok(Self {
            questions: Arc::new(MemoryCollection::from_docs(snap.questions)),
            authors: Arc::new(MemoryCollection::from_docs(snap.authors)),
            analyses: Arc::new(MemoryCollection::from_docs(snap.analyses)),
        })
    }

    /// Write all collections to `path` (parent directories are created).
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), PersistenceError> {
        let snap = Snapshot {
            questions: self.questions.snapshot()?,
            authors: self.authors.snapshot()?,
            analyses: self.analyses.snapshot()?,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(&snap)?).await?;
        info!(target: "store", path = %path.display(), "snapshot written");
        Ok(())
    }
}
