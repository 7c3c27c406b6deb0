use crate::model::{Transaction, TransactionId, TransactionKind, Year, YearBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One kind (income or expenses) of a project's transactions, keyed by year.
pub type Partition = BTreeMap<Year, Arc<YearBucket>>;

/// A named fund or initiative with its own income and expense records.
///
/// Buckets are held behind `Arc` so that a new store derived from an old one shares every bucket
/// it did not touch.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Project {
    #[serde(default)]
    income: Partition,
    #[serde(default)]
    expenses: Partition,
    #[serde(default, alias = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(default, alias = "createdYear", skip_serializing_if = "Option::is_none")]
    created_year: Option<Year>,
}

impl Project {
    /// Creates a project with no transactions.
    pub fn new(created_at: DateTime<Utc>, created_year: Option<Year>) -> Self {
        Self {
            income: Partition::new(),
            expenses: Partition::new(),
            created_at,
            created_year,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_year(&self) -> Option<Year> {
        self.created_year
    }

    pub fn partition(&self, kind: TransactionKind) -> &Partition {
        match kind {
            TransactionKind::Income => &self.income,
            TransactionKind::Expenses => &self.expenses,
        }
    }

    pub fn bucket(&self, kind: TransactionKind, year: Year) -> Option<&YearBucket> {
        self.partition(kind).get(&year).map(Arc::as_ref)
    }

    /// The `Arc` holding a bucket, for checking whether two stores share it.
    pub fn bucket_arc(&self, kind: TransactionKind, year: Year) -> Option<&Arc<YearBucket>> {
        self.partition(kind).get(&year)
    }

    /// True when the project holds no transactions of either kind.
    pub fn is_empty(&self) -> bool {
        self.income.is_empty() && self.expenses.is_empty()
    }

    fn partition_mut(&mut self, kind: TransactionKind) -> &mut Partition {
        match kind {
            TransactionKind::Income => &mut self.income,
            TransactionKind::Expenses => &mut self.expenses,
        }
    }

    /// Inserts into the bucket for the transaction's own year, creating it if needed.
    pub(crate) fn insert(&mut self, kind: TransactionKind, transaction: Transaction) {
        let bucket = self
            .partition_mut(kind)
            .entry(transaction.year())
            .or_default();
        Arc::make_mut(bucket).insert(transaction);
    }

    /// Removes a transaction and prunes its bucket if it is left empty. Returns whether anything
    /// was removed.
    pub(crate) fn remove(&mut self, kind: TransactionKind, year: Year, id: &TransactionId) -> bool {
        let partition = self.partition_mut(kind);
        let Some(bucket) = partition.get_mut(&year) else {
            return false;
        };
        if !bucket.contains(id) {
            return false;
        }
        Arc::make_mut(bucket).remove(id);
        if bucket.is_empty() {
            partition.remove(&year);
        }
        true
    }

    /// Removes any empty buckets. Returns the number removed.
    pub(crate) fn prune_empty(&mut self) -> usize {
        let mut pruned = 0;
        for kind in [TransactionKind::Income, TransactionKind::Expenses] {
            let partition = self.partition_mut(kind);
            let before = partition.len();
            partition.retain(|_, bucket| !bucket.is_empty());
            pruned += before - partition.len();
        }
        pruned
    }

    /// Transactions filed under a year key that does not match their date.
    pub fn misfiled(&self) -> Vec<(TransactionKind, Year, &Transaction)> {
        let mut found = Vec::new();
        for kind in [TransactionKind::Income, TransactionKind::Expenses] {
            for (year, bucket) in self.partition(kind) {
                for transaction in bucket.iter() {
                    if transaction.year() != *year {
                        found.push((kind, *year, transaction));
                    }
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Amount;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn transaction(id: &str, date: &str) -> Transaction {
        Transaction::new(
            TransactionId::new(id),
            NaiveDate::from_str(date).unwrap(),
            "Label",
            Amount::from_str("10").unwrap(),
            DateTime::<Utc>::default(),
        )
    }

    #[test]
    fn test_insert_uses_date_year() {
        let mut project = Project::default();
        project.insert(TransactionKind::Income, transaction("1", "2023-12-31"));
        assert!(project.bucket(TransactionKind::Income, 2023).is_some());
        assert!(project.bucket(TransactionKind::Expenses, 2023).is_none());
    }

    #[test]
    fn test_remove_last_prunes_bucket() {
        let mut project = Project::default();
        project.insert(TransactionKind::Expenses, transaction("1", "2024-02-02"));
        assert!(project.remove(TransactionKind::Expenses, 2024, &TransactionId::new("1")));
        assert!(project.partition(TransactionKind::Expenses).is_empty());
    }

    #[test]
    fn test_remove_missing_is_false() {
        let mut project = Project::default();
        project.insert(TransactionKind::Expenses, transaction("1", "2024-02-02"));
        assert!(!project.remove(TransactionKind::Expenses, 2024, &TransactionId::new("2")));
        assert!(!project.remove(TransactionKind::Income, 2024, &TransactionId::new("1")));
        assert_eq!(project.bucket(TransactionKind::Expenses, 2024).unwrap().len(), 1);
    }

    #[test]
    fn test_deserialize_with_string_year_keys_and_empty_buckets() {
        let json = r#"{
            "income": { "2024": {}, "2023": { "7": { "id": "7", "date": "2023-05-05", "donor": "A", "amount": "5" } } },
            "createdAt": "2024-01-01T00:00:00Z",
            "createdYear": 2024
        }"#;
        let mut project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.created_year(), Some(2024));
        assert!(project.partition(TransactionKind::Expenses).is_empty());
        assert_eq!(project.prune_empty(), 1);
        assert_eq!(
            project.partition(TransactionKind::Income).keys().copied().collect::<Vec<_>>(),
            vec![2023]
        );
    }

    #[test]
    fn test_misfiled() {
        let json = r#"{
            "expenses": { "2022": { "7": { "id": "7", "date": "2023-05-05", "donor": "A", "amount": "5" } } }
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        let misfiled = project.misfiled();
        assert_eq!(misfiled.len(), 1);
        assert_eq!(misfiled[0].1, 2022);
    }
}
