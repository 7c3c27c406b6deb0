//! Types that represent the core data model, such as `Transaction` and `Project`.
//!
//! The shared document is a nested mapping: project name → kind (income/expenses) → year →
//! transaction id → transaction.
mod amount;
mod project;
mod store;
mod transaction;

pub use amount::{format_currency, format_money, Amount, AmountError, MAX_AMOUNT};
pub use project::{Partition, Project};
pub use store::{Patch, PatchOp, ProjectDocument, ProjectStore};
pub use transaction::{Transaction, TransactionId, TransactionKind, YearBucket};

/// A calendar year. Serialized as a string when used as a document key.
pub type Year = i32;
