//! The client loop: sign in, subscribe to the shared document, feed its events into the mirror and
//! route user mutations through the pipeline.
//!
//! A `Session` handles one event or one mutation at a time (`&mut self`), so within a client
//! mutations are applied in call order.

use crate::aggregate::current_year;
use crate::api::{Auth, DocumentStore, Event, Identity, Subscription};
use crate::error::{Error, ErrorType, IntoResult, Result};
use crate::mirror::{DashboardView, SyncMirror, SyncStatus};
use crate::model::{Patch, PatchOp, Project, ProjectDocument, TransactionId, TransactionKind, Year};
use crate::mutation::{Mutation, Pipeline, TransactionForm};
use anyhow::{anyhow, Context};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What woke `next_event` up.
enum Wake {
    Auth,
    AuthClosed,
    Event(Option<Event>),
}

pub struct Session {
    auth: Arc<dyn Auth>,
    auth_state: watch::Receiver<Option<Identity>>,
    auth_closed: bool,
    documents: Arc<dyn DocumentStore>,
    pipeline: Pipeline,
    default_project: String,
    identity: Option<Identity>,
    subscription: Option<Subscription>,
    mirror: SyncMirror,
}

impl Session {
    pub fn new(
        auth: Arc<dyn Auth>,
        documents: Arc<dyn DocumentStore>,
        key: impl Into<String>,
        default_project: impl Into<String>,
    ) -> Self {
        let auth_state = auth.watch();
        Self {
            pipeline: Pipeline::new(documents.clone(), key),
            auth,
            auth_state,
            auth_closed: false,
            documents,
            default_project: default_project.into(),
            identity: None,
            subscription: None,
            mirror: SyncMirror::new(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn key(&self) -> &str {
        self.pipeline.key()
    }

    pub fn mirror(&self) -> &SyncMirror {
        &self.mirror
    }

    pub fn view(&self) -> DashboardView {
        self.mirror.view()
    }

    /// Signs in and subscribes to the shared document. Nothing is loaded until events are
    /// processed, see `sync`.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity> {
        let identity = self
            .auth
            .sign_in(email, password)
            .await
            .pub_result(ErrorType::Auth)?;
        self.auth_state.borrow_and_update();
        self.start(identity.clone()).await?;
        Ok(identity)
    }

    /// Signs out, unsubscribes and forgets all local state.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.stop();
        self.auth.sign_out().await.pub_result(ErrorType::Auth)?;
        self.auth_state.borrow_and_update();
        Ok(())
    }

    async fn start(&mut self, identity: Identity) -> Result<()> {
        self.stop();
        let subscription = self
            .documents
            .subscribe(self.pipeline.key())
            .await
            .context("Unable to subscribe to the shared document")
            .pub_result(ErrorType::Persistence)?;
        debug!("Subscribed to '{}' as {}", self.key(), identity.email());
        self.subscription = Some(subscription);
        self.identity = Some(identity);
        Ok(())
    }

    fn stop(&mut self) {
        if self.subscription.take().is_some() {
            debug!("Unsubscribed from '{}'", self.key());
        }
        self.identity = None;
        self.mirror.clear();
    }

    /// Waits for and handles the next subscription or auth event. Returns `false` if there is
    /// nothing left to wait for (signed out, or the subscription closed).
    pub async fn next_event(&mut self) -> Result<bool> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(false);
        };
        let auth_state = &mut self.auth_state;
        let wake = tokio::select! {
            changed = auth_state.changed(), if !self.auth_closed => match changed {
                Ok(()) => Wake::Auth,
                Err(_) => Wake::AuthClosed,
            },
            event = subscription.next() => Wake::Event(event),
        };

        match wake {
            Wake::Auth => {
                let current = self.auth_state.borrow_and_update().clone();
                match current {
                    None => {
                        info!("Signed out elsewhere, clearing local state");
                        self.stop();
                        return Ok(false);
                    }
                    Some(identity) => self.identity = Some(identity),
                }
            }
            Wake::AuthClosed => self.auth_closed = true,
            Wake::Event(Some(event)) => self.handle(event).await?,
            Wake::Event(None) => {
                warn!("The shared document subscription closed");
                self.subscription = None;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Handles every event that is already queued without waiting. Returns the number handled.
    pub async fn catch_up(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.handle(event).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Waits until the first snapshot has been loaded into the mirror.
    pub async fn sync(&mut self) -> Result<()> {
        self.require_signed_in()?;
        while !self.mirror.is_loaded() {
            if !self.next_event().await? {
                return Err(Error::new(
                    ErrorType::Persistence,
                    anyhow!("The subscription ended before the shared document was loaded"),
                ));
            }
            if self.mirror.status() == SyncStatus::Stale && !self.mirror.is_loaded() {
                let message = self.mirror.last_error().unwrap_or_default().to_string();
                return Err(Error::new(
                    ErrorType::Persistence,
                    anyhow!("Unable to load the shared document: {message}"),
                ));
            }
        }
        Ok(())
    }

    async fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Snapshot(Some(document)) => self.mirror.on_snapshot(document),
            Event::Snapshot(None) => self.initialize().await?,
            Event::Error(message) => self.mirror.on_error(message),
        }
        Ok(())
    }

    /// Creates the shared document with the default project and loads it as the first snapshot.
    async fn initialize(&mut self) -> Result<()> {
        info!(
            "The shared document '{}' does not exist yet, creating it with project '{}'",
            self.key(),
            self.default_project
        );
        let now = Utc::now();
        let patch = Patch::single(PatchOp::PutProject {
            name: self.default_project.clone(),
            project: Project::new(now, Some(current_year())),
        });
        let written = self
            .documents
            .write(self.pipeline.key(), &patch, now)
            .await
            .context("Unable to create the shared document");
        if let Err(e) = written {
            self.mirror.on_error(format!("{e:#}"));
            return Err(Error::new(ErrorType::Persistence, e));
        }
        let mut document = ProjectDocument::default();
        document.merge(&patch, now);
        self.mirror.on_snapshot(document);
        Ok(())
    }

    fn require_signed_in(&self) -> Result<()> {
        if self.identity.is_none() {
            return Err(Error::new(ErrorType::Auth, anyhow!("Not signed in")));
        }
        Ok(())
    }

    pub fn select_project(&mut self, name: &str) -> bool {
        self.mirror.select_project(name)
    }

    pub fn select_year(&mut self, year: Year) {
        self.mirror.select_year(year)
    }

    pub async fn add_project(&mut self, name: &str, starting_year: Year) -> Result<Mutation> {
        self.require_signed_in()?;
        self.pipeline
            .add_project(&mut self.mirror, name, starting_year)
            .await
    }

    pub async fn add_transaction(
        &mut self,
        project: &str,
        kind: TransactionKind,
        form: &TransactionForm,
    ) -> Result<Mutation> {
        self.require_signed_in()?;
        self.pipeline
            .add_transaction(&mut self.mirror, project, kind, form)
            .await
    }

    pub async fn delete_transaction(
        &mut self,
        project: &str,
        kind: TransactionKind,
        year: Year,
        id: &TransactionId,
    ) -> Result<Mutation> {
        self.require_signed_in()?;
        self.pipeline
            .delete_transaction(&mut self.mirror, project, kind, year, id)
            .await
    }
}
