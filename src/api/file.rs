//! Implements the `DocumentStore` trait on top of a JSON file that every admin on the machine (or
//! on a synced folder) shares.
//!
//! The file holds an object keyed by document key. Writers serialize through a lock, re-read the
//! file, merge their patch and atomically replace it. Subscribers poll the file and emit a
//! snapshot whenever the parsed document changes.

use crate::api::{DocumentStore, Event, Subscription};
use crate::error::Res;
use crate::model::{Patch, ProjectDocument};
use crate::utils;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

type Documents = BTreeMap<String, ProjectDocument>;

/// A `DocumentStore` backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    poll_interval: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_all(path: &Path) -> Res<Documents> {
    if !path.is_file() {
        return Ok(Documents::new());
    }
    utils::deserialize(path).await
}

async fn read_document(path: &Path, key: &str) -> Res<Option<ProjectDocument>> {
    Ok(read_all(path).await?.remove(key))
}

#[async_trait::async_trait]
impl DocumentStore for FileDocument {
    async fn subscribe(&self, key: &str) -> Res<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path.clone();
        let key = key.to_string();
        let mut interval = tokio::time::interval(self.poll_interval);

        let task = tokio::spawn(async move {
            let mut last: Option<Event> = None;
            loop {
                interval.tick().await;
                let event = match read_document(&path, &key).await {
                    Ok(document) => Event::Snapshot(document),
                    Err(e) => Event::Error(format!("{e:#}")),
                };
                if last.as_ref() == Some(&event) {
                    continue;
                }
                trace!("Document '{key}' changed on disk");
                if tx.send(event.clone()).is_err() {
                    debug!("Subscriber for '{key}' went away");
                    break;
                }
                last = Some(event);
            }
        });
        Ok(Subscription::new(rx, Some(task)))
    }

    async fn write(&self, key: &str, patch: &Patch, last_updated: DateTime<Utc>) -> Res<()> {
        let _guard = self.write_lock.lock().await;
        let mut documents = read_all(&self.path).await?;
        documents
            .entry(key.to_string())
            .or_default()
            .merge(patch, last_updated);
        let json =
            serde_json::to_string_pretty(&documents).context("Unable to serialize the document")?;
        utils::replace(&self.path, json).await?;
        trace!("Wrote {} change(s) to '{key}'", patch.ops().len());
        Ok(())
    }
}
