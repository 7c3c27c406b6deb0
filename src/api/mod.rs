//! Interfaces to the collaborators that live outside the ledger core: the shared document store
//! that every admin reads and writes, and the authentication service.
//!
//! Both are traits so that the core can be driven by the in-memory implementations in tests and in
//! test mode, and by the file-backed implementations otherwise.

mod auth;
mod file;
mod memory;

pub use auth::{AdminCredentials, Identity, LocalAuth};
pub use file::FileDocument;
pub use memory::MemoryDocument;

use crate::error::Res;
use crate::model::{Patch, ProjectDocument};
use crate::Config;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// When this environment variable is set and non-empty the program keeps the shared document in
/// memory instead of on disk.
pub const TEST_MODE_ENV: &str = "FOUNDATION_IN_TEST_MODE";

/// A notification from a document subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The current contents of the document, or `None` if it does not exist yet.
    Snapshot(Option<ProjectDocument>),
    /// The subscription could not read the document. Later events may still arrive.
    Error(String),
}

/// A live subscription to one document. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Event>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Waits for the next event. `None` means the store has closed the subscription.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The shared document store.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Subscribes to the document at `key`. The current state is delivered as the first event.
    async fn subscribe(&self, key: &str) -> Res<Subscription>;

    /// Merge-writes `patch` into the document at `key`, creating the document if needed, and
    /// stamps it with `last_updated`.
    async fn write(&self, key: &str, patch: &Patch, last_updated: DateTime<Utc>) -> Res<()>;
}

/// The authentication service. The identity it yields is only used as a display label.
#[async_trait::async_trait]
pub trait Auth: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Res<Identity>;

    async fn sign_out(&self) -> Res<()>;

    /// A receiver that observes every sign-in and sign-out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// Where the shared document lives.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// A JSON file in the foundation home directory.
    #[default]
    Local,
    /// In memory, for the lifetime of the process.
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Local,
        }
    }
}

/// Creates the document store for `mode`.
pub(crate) fn documents(config: &Config, mode: Mode) -> Arc<dyn DocumentStore> {
    match mode {
        Mode::Local => Arc::new(FileDocument::new(
            config.document_path(),
            Duration::from_millis(config.poll_interval_ms()),
        )),
        Mode::Test => Arc::new(MemoryDocument::new()),
    }
}

/// Creates the auth service from the admins file in the secrets directory.
pub(crate) async fn auth(config: &Config) -> Res<Arc<dyn Auth>> {
    Ok(Arc::new(LocalAuth::load(config.admins_path()).await?))
}
