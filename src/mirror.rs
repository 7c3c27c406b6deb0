//! The client-side mirror of the shared document.
//!
//! The mirror holds two slots: the last snapshot received from the document store, which is always
//! authoritative, and an optional overlay of local changes that have been written but not yet
//! echoed back. Readers see the overlay if there is one. The next snapshot discards it.
//!
//! It also holds the derived view state (selected project and year), which is never persisted.

use crate::aggregate::{
    available_years, default_selection, default_year, totals_all_years, totals_for_year,
    current_year, ProjectTotals, Totals,
};
use crate::model::{ProjectDocument, ProjectStore, Transaction, TransactionKind, Year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

static EMPTY: ProjectStore = ProjectStore::new();

/// How current the mirror is.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Subscribed, but no snapshot has arrived yet.
    #[default]
    Connecting,
    /// The last event was a snapshot.
    Live,
    /// The subscription reported an error. The last known store is still shown.
    Stale,
}

serde_plain::derive_display_from_serialize!(SyncStatus);

/// A read-only snapshot of everything the dashboard shows.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DashboardView {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub projects: Vec<String>,
    pub current_project: Option<String>,
    pub selected_year: Year,
    pub available_years: Vec<Year>,
    pub year_totals: Totals,
    pub all_years: ProjectTotals,
    /// Income of the selected project and year, newest first.
    pub income: Vec<Transaction>,
    /// Expenses of the selected project and year, newest first.
    pub expenses: Vec<Transaction>,
}

#[derive(Debug)]
pub struct SyncMirror {
    authoritative: Option<ProjectDocument>,
    pending_local: Option<ProjectStore>,
    current_project: Option<String>,
    selected_year: Year,
    status: SyncStatus,
    last_error: Option<String>,
}

impl Default for SyncMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMirror {
    pub fn new() -> Self {
        Self {
            authoritative: None,
            pending_local: None,
            current_project: None,
            selected_year: current_year(),
            status: SyncStatus::default(),
            last_error: None,
        }
    }

    /// The store to read: the local overlay if present, otherwise the last snapshot.
    pub fn store(&self) -> &ProjectStore {
        if let Some(pending) = &self.pending_local {
            return pending;
        }
        self.authoritative
            .as_ref()
            .map(|doc| &doc.projects)
            .unwrap_or(&EMPTY)
    }

    /// Whether a snapshot has been received since the last `clear`.
    pub fn is_loaded(&self) -> bool {
        self.authoritative.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_local.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn current_project(&self) -> Option<&str> {
        self.current_project.as_deref()
    }

    pub fn selected_year(&self) -> Year {
        self.selected_year
    }

    /// Replaces the mirror with a snapshot from the document store.
    pub fn on_snapshot(&mut self, mut document: ProjectDocument) {
        let pruned = document.projects.prune_empty();
        if pruned > 0 {
            info!("Ignoring {pruned} empty bucket(s) in the received document");
        }
        document.projects.warn_misfiled();

        if self.pending_local.take().is_some() {
            debug!("Local changes superseded by a snapshot");
        }
        self.status = SyncStatus::Live;
        self.last_error = None;

        let selection_lost = self
            .current_project
            .as_deref()
            .map_or(true, |name| !document.projects.contains(name));
        if selection_lost {
            let selection = default_selection(&document.projects);
            self.current_project = selection.as_ref().map(|s| s.project.clone());
            if let Some(selection) = selection {
                debug!("Selected '{}' {}", selection.project, selection.year);
                self.selected_year = selection.year;
            }
        }
        self.authoritative = Some(document);
    }

    /// Records a subscription error. The last known store stays visible.
    pub fn on_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("Document subscription error: {message}");
        self.status = SyncStatus::Stale;
        self.last_error = Some(message);
    }

    /// Shows a locally derived store until the next snapshot arrives.
    pub fn apply_local(&mut self, store: ProjectStore) {
        self.pending_local = Some(store);
    }

    /// Selects a project and its most recent year. Unknown names are ignored. Returns whether the
    /// selection changed.
    pub fn select_project(&mut self, name: &str) -> bool {
        let Some(project) = self.store().get(name) else {
            debug!("Ignoring selection of unknown project '{name}'");
            return false;
        };
        self.selected_year = default_year(project);
        self.current_project = Some(name.to_string());
        true
    }

    pub fn select_year(&mut self, year: Year) {
        self.selected_year = year;
    }

    /// Forgets everything, as on sign-out.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn view(&self) -> DashboardView {
        let store = self.store();
        let project = self
            .current_project
            .as_deref()
            .and_then(|name| store.get(name));
        let listing = |kind: TransactionKind| -> Vec<Transaction> {
            project
                .and_then(|p| p.bucket(kind, self.selected_year))
                .map(|bucket| bucket.newest_first().into_iter().cloned().collect())
                .unwrap_or_default()
        };

        DashboardView {
            status: self.status,
            last_error: self.last_error.clone(),
            last_updated: self.authoritative.as_ref().and_then(|d| d.last_updated),
            projects: store.names().map(str::to_string).collect(),
            current_project: self.current_project.clone(),
            selected_year: self.selected_year,
            available_years: available_years(project),
            year_totals: project
                .map(|p| totals_for_year(p, self.selected_year))
                .unwrap_or_default(),
            all_years: project.map(totals_all_years).unwrap_or_default(),
            income: listing(TransactionKind::Income),
            expenses: listing(TransactionKind::Expenses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, Patch, PatchOp, Project, TransactionId};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn transaction(id: &str, date: &str, amount: &str) -> Transaction {
        Transaction::new(
            TransactionId::new(id),
            NaiveDate::from_str(date).unwrap(),
            "Label",
            Amount::from_str(amount).unwrap(),
            DateTime::<Utc>::default(),
        )
    }

    fn document(ops: Vec<PatchOp>) -> ProjectDocument {
        let mut doc = ProjectDocument::default();
        doc.merge(&Patch::new(ops), DateTime::<Utc>::default());
        doc
    }

    fn put_project(name: &str) -> PatchOp {
        PatchOp::PutProject {
            name: name.to_string(),
            project: Project::default(),
        }
    }

    fn put_income(project: &str, t: Transaction) -> PatchOp {
        PatchOp::PutTransaction {
            project: project.to_string(),
            kind: TransactionKind::Income,
            transaction: t,
        }
    }

    #[test]
    fn test_first_snapshot_selects_first_project() {
        let mut mirror = SyncMirror::new();
        assert_eq!(mirror.status(), SyncStatus::Connecting);
        assert!(mirror.store().is_empty());

        mirror.on_snapshot(document(vec![
            put_project("Zakat"),
            put_income("Building", transaction("1", "2022-05-01", "10")),
        ]));
        assert_eq!(mirror.status(), SyncStatus::Live);
        assert_eq!(mirror.current_project(), Some("Building"));
        assert_eq!(mirror.selected_year(), 2022);
    }

    #[test]
    fn test_empty_snapshot_selects_nothing() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(ProjectDocument::default());
        assert!(mirror.is_loaded());
        assert_eq!(mirror.current_project(), None);
        assert_eq!(mirror.selected_year(), current_year());
    }

    #[test]
    fn test_snapshot_supersedes_pending() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![put_project("General Fund")]));

        let mut local = mirror.store().clone();
        local.apply(&put_project("Local Only"));
        mirror.apply_local(local);
        assert!(mirror.has_pending());
        assert!(mirror.store().contains("Local Only"));

        mirror.on_snapshot(document(vec![put_project("General Fund")]));
        assert!(!mirror.has_pending());
        assert!(!mirror.store().contains("Local Only"));
        assert_eq!(mirror.current_project(), Some("General Fund"));
    }

    #[test]
    fn test_error_keeps_last_store() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![put_project("General Fund")]));
        mirror.on_error("permission denied");

        assert_eq!(mirror.status(), SyncStatus::Stale);
        assert_eq!(mirror.last_error(), Some("permission denied"));
        assert!(mirror.store().contains("General Fund"));

        mirror.on_snapshot(document(vec![put_project("General Fund")]));
        assert_eq!(mirror.status(), SyncStatus::Live);
        assert_eq!(mirror.last_error(), None);
    }

    #[test]
    fn test_selection_survives_snapshots() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![put_project("A"), put_project("B")]));
        assert!(mirror.select_project("B"));
        mirror.select_year(2019);

        mirror.on_snapshot(document(vec![put_project("A"), put_project("B")]));
        assert_eq!(mirror.current_project(), Some("B"));
        assert_eq!(mirror.selected_year(), 2019);
    }

    #[test]
    fn test_select_unknown_project_is_ignored() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![put_project("A")]));
        assert!(!mirror.select_project("Nope"));
        assert_eq!(mirror.current_project(), Some("A"));
    }

    #[test]
    fn test_select_project_picks_latest_year() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![
            put_project("A"),
            put_income("B", transaction("1", "2021-01-01", "1")),
            put_income("B", transaction("2", "2023-01-01", "1")),
        ]));
        mirror.select_project("B");
        assert_eq!(mirror.selected_year(), 2023);
    }

    #[test]
    fn test_snapshot_with_empty_bucket_is_pruned() {
        let json = r#"{ "projects": { "A": { "income": { "2024": {} }, "expenses": {} } } }"#;
        let doc: ProjectDocument = serde_json::from_str(json).unwrap();
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(doc);
        let project = mirror.store().get("A").unwrap();
        assert!(project.partition(TransactionKind::Income).is_empty());
        assert_eq!(mirror.view().available_years, vec![current_year()]);
    }

    #[test]
    fn test_view_of_oversized_snapshot() {
        let max = Decimal::MAX;
        let json = format!(
            r#"{{ "projects": {{ "A": {{ "income": {{ "2024": {{
                "1": {{ "id": "1", "date": "2024-01-01", "donor": "a", "amount": "{max}" }},
                "2": {{ "id": "2", "date": "2024-02-01", "donor": "b", "amount": "{max}" }} }} }} }} }} }}"#
        );
        let doc: ProjectDocument = serde_json::from_str(&json).unwrap();
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(doc);
        let view = mirror.view();
        assert_eq!(view.current_project.as_deref(), Some("A"));
        assert_eq!(view.selected_year, 2024);
        assert_eq!(view.year_totals.income_total, max);
        assert_eq!(view.all_years.totals.balance, max);
        assert_eq!(view.income.len(), 2);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![put_project("A")]));
        mirror.apply_local(ProjectStore::default());
        mirror.clear();
        assert!(!mirror.is_loaded());
        assert!(!mirror.has_pending());
        assert_eq!(mirror.current_project(), None);
        assert_eq!(mirror.status(), SyncStatus::Connecting);
    }

    #[test]
    fn test_view() {
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(document(vec![
            put_income("A", transaction("1", "2024-01-05", "100")),
            put_income("A", transaction("2", "2024-03-01", "50.25")),
            put_income("A", transaction("3", "2023-03-01", "1")),
            PatchOp::PutTransaction {
                project: "A".to_string(),
                kind: TransactionKind::Expenses,
                transaction: transaction("4", "2024-02-01", "20"),
            },
        ]));
        let view = mirror.view();
        assert_eq!(view.current_project.as_deref(), Some("A"));
        assert_eq!(view.selected_year, 2024);
        assert_eq!(view.available_years, vec![2024, 2023]);
        assert_eq!(view.year_totals.income_total, Decimal::from_str("150.25").unwrap());
        assert_eq!(view.year_totals.balance, Decimal::from_str("130.25").unwrap());
        assert_eq!(view.all_years.totals.income_total, Decimal::from_str("151.25").unwrap());
        let ids: Vec<&str> = view.income.iter().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(view.expenses.len(), 1);
    }
}
