use crate::model::{Project, Transaction, TransactionId, TransactionKind, Year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Every project of the foundation, keyed by its unique name.
///
/// Cloning a store is shallow: the clone shares every project with the original until one of them
/// is modified through `apply`, at which point only the touched project and bucket are copied.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectStore(BTreeMap<String, Arc<Project>>);

impl ProjectStore {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Project> {
        self.0.get(name).map(Arc::as_ref)
    }

    /// The `Arc` holding a project, for checking whether two stores share it.
    pub fn get_arc(&self, name: &str) -> Option<&Arc<Project>> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Project names in iteration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Project)> {
        self.0.iter().map(|(name, p)| (name.as_str(), p.as_ref()))
    }

    /// Applies a single merge operation in place, copying only the modified path.
    pub(crate) fn apply(&mut self, op: &PatchOp) {
        match op {
            PatchOp::PutProject { name, project } => {
                trace!("Putting project '{name}'");
                self.0.insert(name.clone(), Arc::new(project.clone()));
            }
            PatchOp::PutTransaction {
                project,
                kind,
                transaction,
            } => {
                trace!("Putting {kind} transaction {} in '{project}'", transaction.id());
                let entry = self.0.entry(project.clone()).or_default();
                Arc::make_mut(entry).insert(*kind, transaction.clone());
            }
            PatchOp::RemoveTransaction {
                project,
                kind,
                year,
                id,
            } => {
                let Some(entry) = self.0.get_mut(project) else {
                    return;
                };
                let present = entry.bucket(*kind, *year).is_some_and(|b| b.contains(id));
                if present {
                    trace!("Removing {kind} transaction {id} from '{project}' {year}");
                    Arc::make_mut(entry).remove(*kind, *year, id);
                }
            }
        }
    }

    /// Removes empty buckets from every project. Returns the number removed.
    pub(crate) fn prune_empty(&mut self) -> usize {
        let mut pruned = 0;
        for project in self.0.values_mut() {
            let has_empty = [TransactionKind::Income, TransactionKind::Expenses]
                .iter()
                .any(|kind| project.partition(*kind).values().any(|b| b.is_empty()));
            if has_empty {
                pruned += Arc::make_mut(project).prune_empty();
            }
        }
        pruned
    }

    /// Logs a warning for every transaction whose year key disagrees with its date. Returns the
    /// number found.
    pub(crate) fn warn_misfiled(&self) -> usize {
        let mut count = 0;
        for (name, project) in self.iter() {
            for (kind, year, transaction) in project.misfiled() {
                warn!(
                    "Transaction {} in '{name}' {kind} is filed under {year} but dated {}",
                    transaction.id(),
                    transaction.date()
                );
                count += 1;
            }
        }
        count
    }
}

impl FromIterator<(String, Project)> for ProjectStore {
    fn from_iter<T: IntoIterator<Item = (String, Project)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, project)| (name, Arc::new(project)))
                .collect(),
        )
    }
}

/// The whole shared document: all projects plus the time of the last write.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectDocument {
    #[serde(default)]
    pub projects: ProjectStore,
    #[serde(default, alias = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProjectDocument {
    /// Merges `patch` into the document key by key. Paths the patch does not mention are left
    /// alone, which is what lets concurrent writers touching different paths both survive.
    pub fn merge(&mut self, patch: &Patch, last_updated: DateTime<Utc>) {
        for op in patch.ops() {
            self.projects.apply(op);
        }
        self.last_updated = Some(last_updated);
    }
}

/// One key-wise change to the shared document.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PatchOp {
    /// Sets a project, replacing any project of the same name.
    PutProject { name: String, project: Project },
    /// Sets a transaction under `project/kind/<transaction year>/<id>`, creating the path.
    PutTransaction {
        project: String,
        kind: TransactionKind,
        transaction: Transaction,
    },
    /// Deletes a transaction, and its bucket if that leaves the bucket empty. A missing path is
    /// ignored.
    RemoveTransaction {
        project: String,
        kind: TransactionKind,
        year: Year,
        id: TransactionId,
    },
}

/// A set of changes to merge-write into the shared document.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Patch(Vec<PatchOp>);

impl Patch {
    pub fn new(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }

    pub fn single(op: PatchOp) -> Self {
        Self(vec![op])
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
