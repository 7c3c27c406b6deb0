//! These structs provide the CLI interface for the foundation CLI.

use crate::aggregate::{ProjectFilter, YearFilter};
use crate::model::{TransactionKind, Year};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// foundation: A shared income and expense ledger for the projects of a foundation.
///
/// Every admin works against the same shared document. Projects hold income and expense
/// transactions partitioned by calendar year, and the dashboard shows totals per year and across
/// all years. Changes made by one admin show up for every other admin.
///
/// Start with `foundation init`. Every other command signs in with --email and --password (or
/// FOUNDATION_EMAIL and FOUNDATION_PASSWORD).
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the foundation home directory, its configuration and the first admin account.
    ///
    /// The shared document itself is created the first time an admin signs in, with a single
    /// default project in it.
    Init(InitArgs),
    /// Add or list projects.
    Project(ProjectArgs),
    /// Add, delete or list the transactions of a project.
    Transaction(TransactionArgs),
    /// Show the dashboard for a project and year: totals, all-years totals and transactions.
    Show(ShowArgs),
    /// The yearly summary: income, expenses and balance per project and year, with grand totals.
    Summary(SummaryArgs),
    /// Stay signed in and print the dashboard every time the shared document changes.
    Watch,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration, secrets and local shared document are held.
    /// Defaults to ~/foundation
    #[arg(long, env = "FOUNDATION_HOME", default_value_t = default_foundation_home())]
    home: DisplayPath,

    /// The email of the admin to sign in as.
    #[arg(long, env = "FOUNDATION_EMAIL")]
    email: Option<String>,

    /// The password of the admin to sign in as.
    #[arg(long, env = "FOUNDATION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
            email: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// Args for the `foundation init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The email of the first admin.
    #[arg(long)]
    admin_email: String,

    /// The password of the first admin. It is stored in the secrets directory, readable only by
    /// you.
    #[arg(long)]
    admin_password: String,

    /// The project to create when the shared document does not exist yet. Defaults to
    /// "General Fund".
    #[arg(long)]
    default_project: Option<String>,

    /// The key of the shared document. Admins that should see the same data need the same key.
    #[arg(long)]
    document_key: Option<String>,
}

impl InitArgs {
    pub fn new(admin_email: impl Into<String>, admin_password: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
            admin_password: admin_password.into(),
            default_project: None,
            document_key: None,
        }
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    pub fn document_key(&self) -> Option<&str> {
        self.document_key.as_deref()
    }
}

/// Args for the `foundation project` command.
#[derive(Debug, Parser, Clone)]
pub struct ProjectArgs {
    #[command(subcommand)]
    command: ProjectSubcommand,
}

impl ProjectArgs {
    pub fn command(&self) -> &ProjectSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectSubcommand {
    /// Add a project. A project with the same name is replaced by the new, empty one.
    Add(ProjectAddArgs),
    /// List every project with its all-years totals.
    List,
}

/// Args for the `foundation project add` command.
#[derive(Debug, Parser, Clone)]
pub struct ProjectAddArgs {
    /// The name of the project.
    name: String,

    /// The year the project starts in. Defaults to the current year.
    #[arg(long)]
    year: Option<Year>,
}

impl ProjectAddArgs {
    pub fn new(name: impl Into<String>, year: Option<Year>) -> Self {
        Self {
            name: name.into(),
            year,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn year(&self) -> Option<Year> {
        self.year
    }
}

/// Args for the `foundation transaction` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionArgs {
    #[command(subcommand)]
    command: TransactionSubcommand,
}

impl TransactionArgs {
    pub fn command(&self) -> &TransactionSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TransactionSubcommand {
    /// Add an income or expense transaction. It is filed under the year of its date.
    Add(TransactionAddArgs),
    /// Delete a transaction. Deleting a transaction that does not exist is not an error.
    Delete(TransactionDeleteArgs),
    /// List the transactions of a project and year, newest first.
    List(TransactionListArgs),
}

/// Args for the `foundation transaction add` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionAddArgs {
    /// The project to add the transaction to.
    #[arg(long)]
    project: String,

    /// Income or expenses.
    #[arg(long = "type", value_enum)]
    kind: TransactionKind,

    /// The date of the transaction, YYYY-MM-DD.
    #[arg(long)]
    date: String,

    /// The donor for income, or what the money was spent on for expenses.
    #[arg(long)]
    label: String,

    /// The amount, a non-negative number. A leading $ and thousands separators are accepted.
    #[arg(long)]
    amount: String,
}

impl TransactionAddArgs {
    pub fn new(
        project: impl Into<String>,
        kind: TransactionKind,
        date: impl Into<String>,
        label: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            kind,
            date: date.into(),
            label: label.into(),
            amount: amount.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }
}

/// Args for the `foundation transaction delete` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionDeleteArgs {
    #[arg(long)]
    project: String,

    /// Income or expenses.
    #[arg(long = "type", value_enum)]
    kind: TransactionKind,

    /// The year the transaction is filed under.
    #[arg(long)]
    year: Year,

    /// The id of the transaction, as shown by `foundation transaction list`.
    #[arg(long)]
    id: String,
}

impl TransactionDeleteArgs {
    pub fn new(
        project: impl Into<String>,
        kind: TransactionKind,
        year: Year,
        id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            kind,
            year,
            id: id.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Args for the `foundation transaction list` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionListArgs {
    #[arg(long)]
    project: String,

    /// Defaults to the most recent year with data.
    #[arg(long)]
    year: Option<Year>,
}

impl TransactionListArgs {
    pub fn new(project: impl Into<String>, year: Option<Year>) -> Self {
        Self {
            project: project.into(),
            year,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn year(&self) -> Option<Year> {
        self.year
    }
}

/// Args for the `foundation show` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct ShowArgs {
    /// Defaults to the first project.
    #[arg(long)]
    project: Option<String>,

    /// Defaults to the most recent year of the project with data, or the current year.
    #[arg(long)]
    year: Option<Year>,
}

impl ShowArgs {
    pub fn new(project: Option<String>, year: Option<Year>) -> Self {
        Self { project, year }
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn year(&self) -> Option<Year> {
        self.year
    }
}

/// Args for the `foundation summary` command.
#[derive(Debug, Parser, Clone)]
pub struct SummaryArgs {
    /// A project name, or "all".
    #[arg(long, default_value = "all")]
    project: ProjectFilter,

    /// A year, or "all".
    #[arg(long, default_value = "all")]
    year: YearFilter,
}

impl SummaryArgs {
    pub fn new(project: ProjectFilter, year: YearFilter) -> Self {
        Self { project, year }
    }

    pub fn project(&self) -> &ProjectFilter {
        &self.project
    }

    pub fn year(&self) -> &YearFilter {
        &self.year
    }
}

fn default_foundation_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("foundation"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or FOUNDATION_HOME instead of relying on the default \
                foundation home directory.",
            );
            PathBuf::from("foundation")
        }
    })
}

/// A path that can be used as a clap default value.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction_add() {
        let args = Args::try_parse_from([
            "foundation",
            "--home",
            "/tmp/f",
            "transaction",
            "add",
            "--project",
            "General Fund",
            "--type",
            "income",
            "--date",
            "2024-03-01",
            "--label",
            "Donor X",
            "--amount",
            "500",
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/f"));
        let Command::Transaction(t) = args.command() else {
            panic!("wrong command {:?}", args.command());
        };
        let TransactionSubcommand::Add(add) = t.command() else {
            panic!("wrong subcommand {:?}", t.command());
        };
        assert_eq!(add.kind(), TransactionKind::Income);
        assert_eq!(add.project(), "General Fund");
        assert_eq!(add.amount(), "500");
    }

    #[test]
    fn test_parse_summary_defaults() {
        let args = Args::try_parse_from(["foundation", "summary"]).unwrap();
        let Command::Summary(summary) = args.command() else {
            panic!("wrong command {:?}", args.command());
        };
        assert_eq!(summary.project(), &ProjectFilter::All);
        assert_eq!(summary.year(), &YearFilter::All);
    }

    #[test]
    fn test_parse_summary_filters() {
        let args =
            Args::try_parse_from(["foundation", "summary", "--project", "Zakat", "--year", "2023"])
                .unwrap();
        let Command::Summary(summary) = args.command() else {
            panic!("wrong command {:?}", args.command());
        };
        assert_eq!(summary.project(), &ProjectFilter::Named("Zakat".to_string()));
        assert_eq!(summary.year(), &YearFilter::Year(2023));
    }

    #[test]
    fn test_bad_type_is_rejected() {
        let result = Args::try_parse_from([
            "foundation",
            "transaction",
            "delete",
            "--project",
            "A",
            "--type",
            "gifts",
            "--year",
            "2024",
            "--id",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        let args =
            Args::try_parse_from(["foundation", "--log-level", "debug", "project", "list"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
    }
}
