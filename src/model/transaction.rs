use crate::model::{Amount, Year};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Which partition of a project a transaction belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Donations and other money coming in.
    Income,
    /// Money going out.
    Expenses,
}

serde_plain::derive_display_from_serialize!(TransactionKind);
serde_plain::derive_fromstr_from_deserialize!(TransactionKind);

/// The identifier of a transaction. Unique within its year bucket.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates an id of the form `<unix millis>-<random hex>` that does not exist in `bucket`.
    pub(crate) fn generate(now: DateTime<Utc>, bucket: Option<&YearBucket>) -> Self {
        let millis = now.timestamp_millis();
        Self::generate_with(bucket, || {
            let random = Uuid::new_v4().simple().to_string();
            format!("{millis}-{}", &random[..8])
        })
    }

    /// Draws candidates from `next` until one is not already a key in `bucket`.
    pub(crate) fn generate_with(
        bucket: Option<&YearBucket>,
        mut next: impl FnMut() -> String,
    ) -> Self {
        loop {
            let candidate = TransactionId(next());
            match bucket {
                Some(bucket) if bucket.contains(&candidate) => {
                    tracing::debug!("Transaction id {candidate} already taken, regenerating");
                }
                _ => return candidate,
            }
        }
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single dated income or expense record. Transactions are never edited, only added or
/// deleted.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    id: TransactionId,
    date: NaiveDate,
    /// The donor for income, a description for expenses.
    #[serde(rename = "donor")]
    label: String,
    amount: Amount,
    #[serde(default, alias = "createdAt")]
    created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        date: NaiveDate,
        label: impl Into<String>,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            date,
            label: label.into(),
            amount,
            created_at,
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The year bucket this transaction belongs in.
    pub fn year(&self) -> Year {
        self.date.year()
    }
}

/// The transactions of one kind, for one project, in one calendar year, keyed by id.
///
/// A bucket is never stored empty; removing its last transaction removes the bucket.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearBucket(BTreeMap<TransactionId, Transaction>);

impl YearBucket {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &TransactionId) -> Option<&Transaction> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.0.values()
    }

    /// Exact sum of every amount in the bucket, saturating at `Decimal::MAX`.
    pub fn total(&self) -> Decimal {
        self.iter()
            .fold(Decimal::ZERO, |acc, t| acc.saturating_add(t.amount().value()))
    }

    /// Transactions ordered for display: newest date first, then newest id first.
    pub fn newest_first(&self) -> Vec<&Transaction> {
        let mut list: Vec<&Transaction> = self.iter().collect();
        list.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        list
    }

    pub(crate) fn insert(&mut self, transaction: Transaction) {
        self.0.insert(transaction.id.clone(), transaction);
    }

    pub(crate) fn remove(&mut self, id: &TransactionId) -> Option<Transaction> {
        self.0.remove(id)
    }
}

impl FromIterator<Transaction> for YearBucket {
    fn from_iter<T: IntoIterator<Item = Transaction>>(iter: T) -> Self {
        let mut bucket = YearBucket::default();
        for transaction in iter {
            bucket.insert(transaction);
        }
        bucket
    }
}
