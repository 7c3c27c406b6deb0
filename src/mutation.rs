//! The three user mutations: add a project, add a transaction, delete a transaction.
//!
//! Planning is pure. Each planner validates its input and derives the next store from the current
//! one, copying only the path it touches, together with the `Patch` that makes the same change in
//! the shared document. `Pipeline` then applies the plan: optimistically to the mirror first, and
//! then as a merge-write to the document store.

use crate::api::DocumentStore;
use crate::error::{validation, ErrorType, IntoResult, Result};
use crate::mirror::SyncMirror;
use crate::model::{
    Amount, AmountError, Patch, PatchOp, Project, ProjectStore, Transaction, TransactionId,
    TransactionKind, Year,
};
use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The raw fields of a new transaction as entered by a user.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TransactionForm {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Donor (income) or purpose (expenses).
    pub label: String,
    /// A non-negative number. A leading `$` and thousands separators are accepted.
    pub amount: String,
}

impl TransactionForm {
    pub fn new(
        date: impl Into<String>,
        label: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            label: label.into(),
            amount: amount.into(),
        }
    }
}

/// A planned change: the store after the change and the patch that persists it.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// The project the change applies to, after trimming.
    pub project: String,
    pub store: ProjectStore,
    /// Empty when the change turned out to be a no-op.
    pub patch: Patch,
    /// The year the change landed in.
    pub year: Year,
}

impl Mutation {
    pub fn is_noop(&self) -> bool {
        self.patch.is_empty()
    }

    fn from_ops(project: String, store: &ProjectStore, ops: Vec<PatchOp>, year: Year) -> Self {
        let mut next = store.clone();
        for op in &ops {
            next.apply(op);
        }
        Self {
            project,
            store: next,
            patch: Patch::new(ops),
            year,
        }
    }
}

/// Plans the creation of an empty project. An existing project of the same name is replaced.
pub fn add_project(
    store: &ProjectStore,
    name: &str,
    starting_year: Year,
    now: DateTime<Utc>,
) -> Result<Mutation> {
    let name = name.trim();
    if name.is_empty() {
        return Err(validation("Project name cannot be empty"));
    }
    if store.contains(name) {
        warn!("Project '{name}' already exists and will be replaced by an empty project");
    }
    let op = PatchOp::PutProject {
        name: name.to_string(),
        project: Project::new(now, Some(starting_year)),
    };
    Ok(Mutation::from_ops(
        name.to_string(),
        store,
        vec![op],
        starting_year,
    ))
}

/// Plans the addition of a transaction to `project`, filed under the year of its date.
pub fn add_transaction(
    store: &ProjectStore,
    project: &str,
    kind: TransactionKind,
    form: &TransactionForm,
    now: DateTime<Utc>,
) -> Result<Mutation> {
    let project = project.trim();
    let Some(existing) = store.get(project) else {
        return Err(validation(format!("Project '{project}' does not exist")));
    };
    let date = form.date.trim();
    let label = form.label.trim();
    let amount = form.amount.trim();
    if date.is_empty() || label.is_empty() || amount.is_empty() {
        return Err(validation("Please fill all fields"));
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| validation(format!("Invalid date '{date}', expected YYYY-MM-DD: {e}")))?;
    let amount = Amount::from_str(amount).map_err(|e| match e {
        AmountError::Negative(_) => validation(format!("Amount cannot be negative: {amount}")),
        e => validation(format!("Invalid amount '{amount}': {e}")),
    })?;

    let year = date.year();
    let id = TransactionId::generate(now, existing.bucket(kind, year));
    debug!("Adding {kind} transaction {id} to '{project}' {year}");
    let op = PatchOp::PutTransaction {
        project: project.to_string(),
        kind,
        transaction: Transaction::new(id, date, label, amount, now),
    };
    Ok(Mutation::from_ops(project.to_string(), store, vec![op], year))
}

/// Plans the removal of a transaction. A path that does not exist yields a no-op whose store is the
/// input store.
pub fn delete_transaction(
    store: &ProjectStore,
    project: &str,
    kind: TransactionKind,
    year: Year,
    id: &TransactionId,
) -> Mutation {
    let project = project.trim();
    let exists = store
        .get(project)
        .and_then(|p| p.bucket(kind, year))
        .is_some_and(|bucket| bucket.contains(id));
    if !exists {
        debug!("No {kind} transaction {id} in '{project}' {year}, nothing to delete");
        return Mutation {
            project: project.to_string(),
            store: store.clone(),
            patch: Patch::default(),
            year,
        };
    }
    let op = PatchOp::RemoveTransaction {
        project: project.to_string(),
        kind,
        year,
        id: id.clone(),
    };
    Mutation::from_ops(project.to_string(), store, vec![op], year)
}

/// Applies planned mutations to the mirror and the shared document.
#[derive(Clone)]
pub struct Pipeline {
    documents: Arc<dyn DocumentStore>,
    key: String,
}

impl Pipeline {
    pub fn new(documents: Arc<dyn DocumentStore>, key: impl Into<String>) -> Self {
        Self {
            documents,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Adds a project and selects it at its starting year.
    pub async fn add_project(
        &self,
        mirror: &mut SyncMirror,
        name: &str,
        starting_year: Year,
    ) -> Result<Mutation> {
        let mutation = add_project(mirror.store(), name, starting_year, Utc::now())?;
        mirror.apply_local(mutation.store.clone());
        mirror.select_project(&mutation.project);
        mirror.select_year(mutation.year);
        info!("Added project '{}'", mutation.project);
        self.persist(mutation).await
    }

    /// Adds a transaction and selects its year.
    pub async fn add_transaction(
        &self,
        mirror: &mut SyncMirror,
        project: &str,
        kind: TransactionKind,
        form: &TransactionForm,
    ) -> Result<Mutation> {
        let mutation = add_transaction(mirror.store(), project, kind, form, Utc::now())?;
        mirror.apply_local(mutation.store.clone());
        if mirror.selected_year() != mutation.year {
            mirror.select_year(mutation.year);
        }
        info!("Added {kind} to '{project}' {}", mutation.year);
        self.persist(mutation).await
    }

    /// Deletes a transaction. Deleting one that does not exist succeeds without writing.
    pub async fn delete_transaction(
        &self,
        mirror: &mut SyncMirror,
        project: &str,
        kind: TransactionKind,
        year: Year,
        id: &TransactionId,
    ) -> Result<Mutation> {
        let mutation = delete_transaction(mirror.store(), project, kind, year, id);
        if mutation.is_noop() {
            return Ok(mutation);
        }
        mirror.apply_local(mutation.store.clone());
        info!("Deleted {kind} transaction {id} from '{project}' {year}");
        self.persist(mutation).await
    }

    /// Writes the patch. On failure the optimistic local state is left in place.
    async fn persist(&self, mutation: Mutation) -> Result<Mutation> {
        self.documents
            .write(&self.key, &mutation.patch, Utc::now())
            .await
            .context("Unable to save changes to the shared document")
            .pub_result(ErrorType::Persistence)?;
        Ok(mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{
        available_years, current_year, totals_all_years, totals_for_year, Totals,
    };
    use crate::api::MemoryDocument;
    use crate::model::{ProjectDocument, MAX_AMOUNT};
    use rust_decimal::Decimal;

    const KEY: &str = "foundations/test";

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_710_000_000_000).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn store_with(names: &[&str]) -> ProjectStore {
        names.iter().fold(ProjectStore::default(), |store, name| {
            add_project(&store, name, 2024, now()).unwrap().store
        })
    }

    fn add(
        store: &ProjectStore,
        project: &str,
        kind: TransactionKind,
        date: &str,
        amount: &str,
    ) -> Mutation {
        add_transaction(
            store,
            project,
            kind,
            &TransactionForm::new(date, "Donor X", amount),
            now(),
        )
        .unwrap()
    }

    fn only_id(
        store: &ProjectStore,
        project: &str,
        kind: TransactionKind,
        year: Year,
    ) -> TransactionId {
        let bucket = store.get(project).unwrap().bucket(kind, year).unwrap();
        assert_eq!(bucket.len(), 1);
        bucket.iter().next().unwrap().id().clone()
    }

    #[test]
    fn test_scenario_add_first_project() {
        let mutation = add_project(&ProjectStore::default(), "General Fund", 2024, now()).unwrap();
        let project = mutation.store.get("General Fund").unwrap();
        assert_eq!(mutation.store.len(), 1);
        assert!(project.is_empty());
        assert_eq!(project.created_year(), Some(2024));
        assert_eq!(available_years(Some(project)), vec![current_year()]);
        assert_eq!(totals_all_years(project).totals, Totals::default());
        assert!(totals_all_years(project).years.is_empty());
    }

    #[test]
    fn test_scenario_add_first_transaction() {
        let store = store_with(&["General Fund"]);
        let mutation = add(&store, "General Fund", TransactionKind::Income, "2024-03-01", "500");
        assert_eq!(mutation.year, 2024);
        let project = mutation.store.get("General Fund").unwrap();
        let bucket = project.bucket(TransactionKind::Income, 2024).unwrap();
        assert_eq!(bucket.len(), 1);
        let t = bucket.iter().next().unwrap();
        assert_eq!(t.amount().value(), dec("500"));
        assert_eq!(t.label(), "Donor X");
        assert_eq!(totals_for_year(project, 2024).income_total, dec("500"));
        // The input store is untouched.
        assert!(store.get("General Fund").unwrap().is_empty());
    }

    #[test]
    fn test_scenario_delete_missing_id() {
        let store = add(
            &store_with(&["General Fund"]),
            "General Fund",
            TransactionKind::Income,
            "2024-03-01",
            "500",
        )
        .store;
        let mutation = delete_transaction(
            &store,
            "General Fund",
            TransactionKind::Income,
            2024,
            &TransactionId::new("missing"),
        );
        assert!(mutation.is_noop());
        assert_eq!(mutation.store, store);
        assert!(Arc::ptr_eq(
            mutation.store.get_arc("General Fund").unwrap(),
            store.get_arc("General Fund").unwrap()
        ));

        // Also a no-op for a missing project or year.
        let id = only_id(&store, "General Fund", TransactionKind::Income, 2024);
        assert!(delete_transaction(&store, "Nope", TransactionKind::Income, 2024, &id).is_noop());
        assert!(
            delete_transaction(&store, "General Fund", TransactionKind::Income, 2023, &id)
                .is_noop()
        );
    }

    #[test]
    fn test_delete_prunes_emptied_bucket() {
        let store = store_with(&["General Fund"]);
        let store = add(&store, "General Fund", TransactionKind::Expenses, "2023-06-30", "12.50").store;
        let id = only_id(&store, "General Fund", TransactionKind::Expenses, 2023);

        let mutation =
            delete_transaction(&store, "General Fund", TransactionKind::Expenses, 2023, &id);
        assert!(!mutation.is_noop());
        let project = mutation.store.get("General Fund").unwrap();
        assert!(!project
            .partition(TransactionKind::Expenses)
            .contains_key(&2023));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = store_with(&["General Fund"]);
        let store = add(&store, "General Fund", TransactionKind::Income, "2024-01-01", "1").store;
        let store = add(&store, "General Fund", TransactionKind::Income, "2024-01-02", "2").store;
        let id = store
            .get("General Fund")
            .unwrap()
            .bucket(TransactionKind::Income, 2024)
            .unwrap()
            .iter()
            .next()
            .unwrap()
            .id()
            .clone();

        let once = delete_transaction(&store, "General Fund", TransactionKind::Income, 2024, &id);
        let twice =
            delete_transaction(&once.store, "General Fund", TransactionKind::Income, 2024, &id);
        assert!(twice.is_noop());
        assert_eq!(once.store, twice.store);
        assert_eq!(
            twice
                .store
                .get("General Fund")
                .unwrap()
                .bucket(TransactionKind::Income, 2024)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_add_transaction_does_not_touch_other_projects() {
        let store = store_with(&["A", "B"]);
        let store = add(&store, "B", TransactionKind::Income, "2024-01-01", "1").store;
        let store = add(&store, "A", TransactionKind::Income, "2023-01-01", "1").store;
        let next = add(&store, "A", TransactionKind::Income, "2024-02-01", "5").store;

        assert!(Arc::ptr_eq(store.get_arc("B").unwrap(), next.get_arc("B").unwrap()));
        // Untouched buckets of the touched project are shared too.
        assert!(Arc::ptr_eq(
            store.get("A").unwrap().bucket_arc(TransactionKind::Income, 2023).unwrap(),
            next.get("A").unwrap().bucket_arc(TransactionKind::Income, 2023).unwrap()
        ));
    }

    #[test]
    fn test_year_comes_from_date() {
        let store = store_with(&["A"]);
        for (label, amount) in [("Zakat 2023", "1"), ("", "0")] {
            let form = TransactionForm::new("2024-01-15", label, amount);
            let result = add_transaction(&store, "A", TransactionKind::Income, &form, now());
            if label.is_empty() {
                assert!(result.is_err());
                continue;
            }
            let mutation = result.unwrap();
            assert_eq!(mutation.year, 2024);
            assert!(mutation
                .store
                .get("A")
                .unwrap()
                .bucket(TransactionKind::Income, 2024)
                .is_some());
        }
    }

    #[test]
    fn test_add_transaction_validation() {
        let store = store_with(&["A"]);
        let cases = [
            ("Nope", TransactionForm::new("2024-01-01", "x", "1")),
            ("A", TransactionForm::new("", "x", "1")),
            ("A", TransactionForm::new("2024-01-01", "  ", "1")),
            ("A", TransactionForm::new("2024-01-01", "x", "")),
            ("A", TransactionForm::new("01/02/2024", "x", "1")),
            ("A", TransactionForm::new("2024-02-30", "x", "1")),
            ("A", TransactionForm::new("2024-01-01", "x", "ten")),
            ("A", TransactionForm::new("2024-01-01", "x", "-5")),
        ];
        for (project, form) in cases {
            let err = add_transaction(&store, project, TransactionKind::Income, &form, now())
                .unwrap_err();
            assert_eq!(err.error_type(), ErrorType::Validation, "{form:?}");
        }
    }

    #[test]
    fn test_add_transaction_accepts_currency_formatting() {
        let store = store_with(&["A"]);
        let mutation = add(&store, "A", TransactionKind::Income, "2024-01-01", "$1,250.50");
        let id = only_id(&mutation.store, "A", TransactionKind::Income, 2024);
        let t = mutation
            .store
            .get("A")
            .unwrap()
            .bucket(TransactionKind::Income, 2024)
            .unwrap()
            .get(&id)
            .unwrap()
            .clone();
        assert_eq!(t.amount().value(), dec("1250.50"));
        assert!(id.as_str().starts_with("1710000000000-"), "{id}");
    }

    #[test]
    fn test_add_transaction_amount_limit() {
        let store = store_with(&["A"]);
        let too_large = TransactionForm::new("2024-01-01", "x", "79228162514264337593543950335");
        let err = add_transaction(&store, "A", TransactionKind::Income, &too_large, now())
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let largest = MAX_AMOUNT.to_string();
        let store = add(&store, "A", TransactionKind::Income, "2024-01-01", &largest).store;
        let store = add(&store, "A", TransactionKind::Income, "2024-06-01", &largest).store;
        let totals = totals_for_year(store.get("A").unwrap(), 2024);
        assert_eq!(totals.income_total, Decimal::from(MAX_AMOUNT) * Decimal::from(2));
        assert_eq!(totals.balance, totals.income_total);
    }

    #[test]
    fn test_transaction_project_name_is_trimmed() {
        let store = store_with(&["General Fund"]);
        let mutation = add(&store, " General Fund ", TransactionKind::Income, "2024-01-01", "5");
        assert_eq!(mutation.project, "General Fund");
        let id = only_id(&mutation.store, "General Fund", TransactionKind::Income, 2024);

        let deleted = delete_transaction(
            &mutation.store,
            "General Fund  ",
            TransactionKind::Income,
            2024,
            &id,
        );
        assert!(!deleted.is_noop());
        assert!(deleted.store.get("General Fund").unwrap().is_empty());
    }

    #[test]
    fn test_add_project_validation_and_replace() {
        let err = add_project(&ProjectStore::default(), "   ", 2024, now()).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let store = store_with(&["A"]);
        let store = add(&store, "A", TransactionKind::Income, "2024-01-01", "1").store;
        let mutation = add_project(&store, "  A ", 2020, now()).unwrap();
        assert_eq!(mutation.project, "A");
        let project = mutation.store.get("A").unwrap();
        assert!(project.is_empty());
        assert_eq!(project.created_year(), Some(2020));
    }

    #[tokio::test]
    async fn test_pipeline_writes_and_selects() {
        let documents = MemoryDocument::new();
        let pipeline = Pipeline::new(Arc::new(documents.clone()), KEY);
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(ProjectDocument::default());

        pipeline
            .add_project(&mut mirror, "General Fund", 2021)
            .await
            .unwrap();
        assert_eq!(mirror.current_project(), Some("General Fund"));
        assert_eq!(mirror.selected_year(), 2021);
        assert!(mirror.has_pending());

        let mutation = pipeline
            .add_transaction(
                &mut mirror,
                "General Fund",
                TransactionKind::Income,
                &TransactionForm::new("2024-03-01", "Donor X", "500"),
            )
            .await
            .unwrap();
        assert_eq!(mirror.selected_year(), 2024);

        let saved = documents.document(KEY).unwrap();
        assert_eq!(saved.projects, mutation.store);
        assert!(saved.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_pipeline_keeps_local_state_when_write_fails() {
        let documents = MemoryDocument::new();
        let pipeline = Pipeline::new(Arc::new(documents.clone()), KEY);
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(ProjectDocument::default());

        documents.fail_writes(Some("offline"));
        let err = pipeline
            .add_project(&mut mirror, "General Fund", 2024)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Persistence);
        assert!(err.to_string().contains("offline"));
        assert!(mirror.store().contains("General Fund"));
        assert!(documents.document(KEY).is_none());
    }

    #[tokio::test]
    async fn test_pipeline_validation_changes_nothing() {
        let documents = MemoryDocument::new();
        let pipeline = Pipeline::new(Arc::new(documents.clone()), KEY);
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(ProjectDocument::default());

        let err = pipeline
            .add_transaction(
                &mut mirror,
                "Nope",
                TransactionKind::Expenses,
                &TransactionForm::new("2024-03-01", "Rent", "10"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(!mirror.has_pending());
        assert!(documents.document(KEY).is_none());
    }

    #[tokio::test]
    async fn test_pipeline_noop_delete_does_not_write() {
        let documents = MemoryDocument::new();
        documents.fail_writes(Some("should not be called"));
        let pipeline = Pipeline::new(Arc::new(documents.clone()), KEY);
        let mut mirror = SyncMirror::new();
        mirror.on_snapshot(ProjectDocument::default());

        let mutation = pipeline
            .delete_transaction(
                &mut mirror,
                "General Fund",
                TransactionKind::Income,
                2024,
                &TransactionId::new("x"),
            )
            .await
            .unwrap();
        assert!(mutation.is_noop());
        assert!(!mirror.has_pending());
    }
}
