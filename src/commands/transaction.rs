use crate::aggregate::default_year;
use crate::api::Mode;
use crate::args::{TransactionAddArgs, TransactionDeleteArgs, TransactionListArgs};
use crate::commands::{open_session, Credentials, Out};
use crate::error::validation;
use crate::model::{format_currency, PatchOp, Transaction, TransactionId, TransactionKind, Year};
use crate::mutation::TransactionForm;
use crate::{Config, Result};
use serde::Serialize;

/// The transactions of one project and year.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TransactionListing {
    pub project: String,
    pub year: Year,
    /// Newest first.
    pub income: Vec<Transaction>,
    /// Newest first.
    pub expenses: Vec<Transaction>,
}

pub async fn transaction_add(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &TransactionAddArgs,
) -> Result<Out<Transaction>> {
    let mut session = open_session(&config, mode, credentials).await?;
    let form = TransactionForm::new(args.date(), args.label(), args.amount());
    let mutation = session
        .add_transaction(args.project(), args.kind(), &form)
        .await?;

    let added = mutation.patch.ops().iter().find_map(|op| match op {
        PatchOp::PutTransaction { transaction, .. } => Some(transaction.clone()),
        _ => None,
    });
    let Some(transaction) = added else {
        return Ok(format!("Nothing was added to '{}'", args.project()).into());
    };
    Ok(Out::new(
        format!(
            "Added {} of {} ({}) to '{}' {} with id {}",
            args.kind(),
            format_currency(transaction.amount().value(), config.currency_symbol()),
            transaction.label(),
            mutation.project,
            mutation.year,
            transaction.id()
        ),
        transaction,
    ))
}

pub async fn transaction_delete(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &TransactionDeleteArgs,
) -> Result<Out<()>> {
    let mut session = open_session(&config, mode, credentials).await?;
    let id = TransactionId::new(args.id());
    let mutation = session
        .delete_transaction(args.project(), args.kind(), args.year(), &id)
        .await?;
    let message = if mutation.is_noop() {
        format!(
            "There is no {} transaction {id} in '{}' {}, nothing was deleted",
            args.kind(),
            args.project(),
            args.year()
        )
    } else {
        format!(
            "Deleted {} transaction {id} from '{}' {}",
            args.kind(),
            args.project(),
            args.year()
        )
    };
    Ok(message.into())
}

pub async fn transaction_list(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &TransactionListArgs,
) -> Result<Out<TransactionListing>> {
    let session = open_session(&config, mode, credentials).await?;
    let Some(project) = session.mirror().store().get(args.project()) else {
        return Err(validation(format!(
            "Project '{}' does not exist",
            args.project()
        )));
    };
    let year = args.year().unwrap_or_else(|| default_year(project));
    let list = |kind: TransactionKind| -> Vec<Transaction> {
        project
            .bucket(kind, year)
            .map(|bucket| bucket.newest_first().into_iter().cloned().collect())
            .unwrap_or_default()
    };
    let listing = TransactionListing {
        project: args.project().to_string(),
        year,
        income: list(TransactionKind::Income),
        expenses: list(TransactionKind::Expenses),
    };

    let symbol = config.currency_symbol();
    let mut lines = vec![format!("'{}' {year}", listing.project)];
    for (title, transactions) in [("Income", &listing.income), ("Expenses", &listing.expenses)] {
        lines.push(format!("{title}:"));
        if transactions.is_empty() {
            lines.push("  (none)".to_string());
        }
        lines.extend(transactions.iter().map(|t| render_transaction(t, symbol)));
    }
    Ok(Out::new(lines.join("\n"), listing))
}

pub(super) fn render_transaction(t: &Transaction, symbol: &str) -> String {
    format!(
        "  {}  {:>14}  {}  [{}]",
        t.date(),
        format_currency(t.amount().value(), symbol),
        t.label(),
        t.id()
    )
}
