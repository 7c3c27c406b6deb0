//! Totals and year lists derived from a `ProjectStore`.
//!
//! Every function here is total: a missing project, kind, or year contributes zero or falls back to
//! a default rather than failing, since most (project, kind, year) combinations simply do not
//! exist. Sums use `Decimal`, so totals are exact. They saturate at the bounds of `Decimal` instead
//! of overflowing, since a received document may hold amounts no local input would accept.

use crate::model::{Project, ProjectStore, TransactionKind, Year};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::str::FromStr;

/// Income, expenses and their difference.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Totals {
    pub income_total: Decimal,
    pub expense_total: Decimal,
    pub balance: Decimal,
}

impl Totals {
    pub fn new(income_total: Decimal, expense_total: Decimal) -> Self {
        Self {
            income_total,
            expense_total,
            balance: income_total.saturating_sub(expense_total),
        }
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Self) -> Self::Output {
        Totals::new(
            self.income_total.saturating_add(rhs.income_total),
            self.expense_total.saturating_add(rhs.expense_total),
        )
    }
}

/// Totals for a project across all of its years.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectTotals {
    #[serde(flatten)]
    pub totals: Totals,
    /// The years that contributed, most recent first.
    pub years: Vec<Year>,
}

/// Totals for a filtered slice of the whole store.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreTotals {
    #[serde(flatten)]
    pub totals: Totals,
    pub transaction_count: usize,
}

/// One line of the yearly summary: a project in a year.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummaryRow {
    pub project: String,
    pub year: Year,
    #[serde(flatten)]
    pub totals: Totals,
    pub transaction_count: usize,
}

/// Selects projects by name, or all of them.
#[derive(Default, Debug, Clone, Eq, PartialEq, Hash)]
pub enum ProjectFilter {
    #[default]
    All,
    Named(String),
}

impl ProjectFilter {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ProjectFilter::All => true,
            ProjectFilter::Named(n) => n == name,
        }
    }
}

impl FromStr for ProjectFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("all") {
            ProjectFilter::All
        } else {
            ProjectFilter::Named(s.trim().to_string())
        })
    }
}

impl Display for ProjectFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectFilter::All => write!(f, "all"),
            ProjectFilter::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Selects a single year, or all of them.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum YearFilter {
    #[default]
    All,
    Year(Year),
}

impl YearFilter {
    pub fn matches(&self, year: Year) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(y) => *y == year,
        }
    }
}

impl FromStr for YearFilter {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(YearFilter::All);
        }
        Ok(YearFilter::Year(s.parse()?))
    }
}

impl Display for YearFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            YearFilter::All => write!(f, "all"),
            YearFilter::Year(year) => write!(f, "{year}"),
        }
    }
}

/// A project and year chosen for the dashboard.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Selection {
    pub project: String,
    pub year: Year,
}

/// The current calendar year in local time.
pub fn current_year() -> Year {
    chrono::Local::now().year()
}

/// Every year that has income or expenses in `project`, most recent first.
pub fn years_of(project: &Project) -> Vec<Year> {
    let years: BTreeSet<Year> = [TransactionKind::Income, TransactionKind::Expenses]
        .iter()
        .flat_map(|kind| project.partition(*kind).keys().copied())
        .collect();
    years.into_iter().rev().collect()
}

/// Sums one year of a project. A year with no bucket contributes zero.
pub fn totals_for_year(project: &Project, year: Year) -> Totals {
    let sum = |kind: TransactionKind| {
        project
            .bucket(kind, year)
            .map(|bucket| bucket.total())
            .unwrap_or_default()
    };
    Totals::new(sum(TransactionKind::Income), sum(TransactionKind::Expenses))
}

/// Sums every year of a project.
pub fn totals_all_years(project: &Project) -> ProjectTotals {
    let years = years_of(project);
    let totals = years
        .iter()
        .map(|year| totals_for_year(project, *year))
        .fold(Totals::default(), |acc, t| acc + t);
    ProjectTotals { totals, years }
}

fn transaction_count(project: &Project, year: Year) -> usize {
    [TransactionKind::Income, TransactionKind::Expenses]
        .iter()
        .filter_map(|kind| project.bucket(*kind, year))
        .map(|bucket| bucket.len())
        .sum()
}

/// One row per matching (project, year) pair, ordered by year descending and then by project
/// name ascending.
pub fn summary_rows(
    store: &ProjectStore,
    project_filter: &ProjectFilter,
    year_filter: &YearFilter,
) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = store
        .iter()
        .filter(|(name, _)| project_filter.matches(name))
        .flat_map(move |(name, project)| {
            years_of(project)
                .into_iter()
                .filter(move |year| year_filter.matches(*year))
                .map(move |year| SummaryRow {
                    project: name.to_string(),
                    year,
                    totals: totals_for_year(project, year),
                    transaction_count: transaction_count(project, year),
                })
        })
        .collect();
    rows.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.project.cmp(&b.project)));
    rows
}

/// Grand totals over every matching (project, year) pair.
pub fn totals_for_store(
    store: &ProjectStore,
    project_filter: &ProjectFilter,
    year_filter: &YearFilter,
) -> StoreTotals {
    summary_rows(store, project_filter, year_filter)
        .iter()
        .fold(StoreTotals::default(), |acc, row| StoreTotals {
            totals: acc.totals + row.totals,
            transaction_count: acc.transaction_count.saturating_add(row.transaction_count),
        })
}

/// The years to offer in a year selector. Never empty: falls back to the current year.
pub fn available_years(project: Option<&Project>) -> Vec<Year> {
    let years = project.map(years_of).unwrap_or_default();
    if years.is_empty() {
        vec![current_year()]
    } else {
        years
    }
}

/// The year to show when a project is opened: its most recent year with data, otherwise the
/// current year.
pub fn default_year(project: &Project) -> Year {
    years_of(project)
        .first()
        .copied()
        .unwrap_or_else(current_year)
}

/// The initial selection for a store: its first project in iteration order, at that project's
/// most recent year. `None` if the store is empty.
pub fn default_selection(store: &ProjectStore) -> Option<Selection> {
    let (name, project) = store.iter().next()?;
    Some(Selection {
        project: name.to_string(),
        year: default_year(project),
    })
}
