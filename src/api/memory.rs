//! Implements the `DocumentStore` trait using in-memory data.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without touching the shared document on disk. Clones share the same
//! documents, which makes it a convenient stand-in for several admins on different devices.

use crate::api::{DocumentStore, Event, Subscription};
use crate::error::Res;
use crate::model::{Patch, ProjectDocument};
use anyhow::bail;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, ProjectDocument>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Event>>>,
    fail_writes: Option<String>,
}

/// An implementation of the `DocumentStore` trait that holds its documents in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `document` at `key`.
    pub fn with_document(key: &str, document: ProjectDocument) -> Self {
        let store = Self::new();
        store.lock().documents.insert(key.to_string(), document);
        store
    }

    /// A copy of the document at `key`, if it exists.
    pub fn document(&self, key: &str) -> Option<ProjectDocument> {
        self.lock().documents.get(key).cloned()
    }

    /// While `message` is `Some`, every write fails with it.
    pub fn fail_writes(&self, message: Option<&str>) {
        self.lock().fail_writes = message.map(str::to_string);
    }

    /// Sends an error event to every subscriber of `key`.
    pub fn emit_error(&self, key: &str, message: &str) {
        let mut inner = self.lock();
        if let Some(watchers) = inner.watchers.get_mut(key) {
            watchers.retain(|tx| tx.send(Event::Error(message.to_string())).is_ok());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocument {
    async fn subscribe(&self, key: &str) -> Res<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let current = inner.documents.get(key).cloned();
        // The receiver is still in scope, so this cannot fail.
        let _ = tx.send(Event::Snapshot(current));
        inner.watchers.entry(key.to_string()).or_default().push(tx);
        Ok(Subscription::new(rx, None))
    }

    async fn write(&self, key: &str, patch: &Patch, last_updated: DateTime<Utc>) -> Res<()> {
        let mut inner = self.lock();
        if let Some(message) = &inner.fail_writes {
            bail!("{message}");
        }
        let document = inner.documents.entry(key.to_string()).or_default();
        document.merge(patch, last_updated);
        let snapshot = document.clone();
        trace!("Wrote {} change(s) to '{key}'", patch.ops().len());

        if let Some(watchers) = inner.watchers.get_mut(key) {
            watchers.retain(|tx| tx.send(Event::Snapshot(Some(snapshot.clone()))).is_ok());
        }
        Ok(())
    }
}
