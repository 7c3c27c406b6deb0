use crate::aggregate::{summary_rows, totals_for_store, StoreTotals, SummaryRow, Totals};
use crate::api::Mode;
use crate::args::{ShowArgs, SummaryArgs};
use crate::commands::transaction::render_transaction;
use crate::commands::{open_session, Credentials, Out};
use crate::error::validation;
use crate::mirror::DashboardView;
use crate::model::format_currency;
use crate::{Config, Result};
use serde::Serialize;

/// The yearly summary report.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Summary {
    /// Year descending, then project name ascending.
    pub rows: Vec<SummaryRow>,
    pub grand_totals: StoreTotals,
}

/// Shows the dashboard for a project and year.
pub async fn show(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &ShowArgs,
) -> Result<Out<DashboardView>> {
    let mut session = open_session(&config, mode, credentials).await?;
    if let Some(project) = args.project() {
        if !session.select_project(project) {
            return Err(validation(format!("Project '{project}' does not exist")));
        }
    }
    if let Some(year) = args.year() {
        session.select_year(year);
    }
    let view = session.view();
    Ok(Out::new(
        render_view(&view, config.currency_symbol()),
        view,
    ))
}

/// The yearly summary: one row per project and year, filtered, with grand totals.
pub async fn summary(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &SummaryArgs,
) -> Result<Out<Summary>> {
    let session = open_session(&config, mode, credentials).await?;
    let store = session.mirror().store();
    let summary = Summary {
        rows: summary_rows(store, args.project(), args.year()),
        grand_totals: totals_for_store(store, args.project(), args.year()),
    };

    let symbol = config.currency_symbol();
    let mut lines = vec![format!(
        "Yearly summary (project: {}, year: {})",
        args.project(),
        args.year()
    )];
    if summary.rows.is_empty() {
        lines.push("  No data for the selected filters".to_string());
    }
    lines.extend(summary.rows.iter().map(|row| {
        format!(
            "  {}  {}: {} ({} transaction(s))",
            row.year,
            row.project,
            render_totals(&row.totals, symbol),
            row.transaction_count
        )
    }));
    lines.push(format!(
        "Grand totals: {} ({} transaction(s))",
        render_totals(&summary.grand_totals.totals, symbol),
        summary.grand_totals.transaction_count
    ));
    Ok(Out::new(lines.join("\n"), summary))
}

fn render_totals(totals: &Totals, symbol: &str) -> String {
    format!(
        "income {}, expenses {}, balance {}",
        format_currency(totals.income_total, symbol),
        format_currency(totals.expense_total, symbol),
        format_currency(totals.balance, symbol)
    )
}

/// Renders the dashboard as text.
pub(super) fn render_view(view: &DashboardView, symbol: &str) -> String {
    let Some(project) = view.current_project.as_deref() else {
        return format!("[{}] There are no projects", view.status);
    };
    let years: Vec<String> = view.available_years.iter().map(|y| y.to_string()).collect();
    let mut lines = vec![
        format!("[{}] '{project}' {}", view.status, view.selected_year),
        format!("Years: {}", years.join(", ")),
        format!(
            "{}: {}",
            view.selected_year,
            render_totals(&view.year_totals, symbol)
        ),
        format!("All years: {}", render_totals(&view.all_years.totals, symbol)),
    ];
    if let Some(error) = &view.last_error {
        lines.push(format!("Last sync error: {error}"));
    }
    for (title, transactions) in [("Income", &view.income), ("Expenses", &view.expenses)] {
        lines.push(format!("{title}:"));
        if transactions.is_empty() {
            lines.push("  (none)".to_string());
        }
        lines.extend(transactions.iter().map(|t| render_transaction(t, symbol)));
    }
    lines.join("\n")
}
