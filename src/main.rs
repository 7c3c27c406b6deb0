use clap::Parser;
use foundation_ledger::args::{
    Args, Command, ProjectSubcommand, TransactionSubcommand,
};
use foundation_ledger::commands::{self, Credentials};
use foundation_ledger::{Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // This allows for running the program without touching the shared document on disk. When
    // FOUNDATION_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Local.
    let mode = Mode::from_env();

    // Init is the only command that does not need a config or a sign-in.
    if let Command::Init(init_args) = args.command() {
        commands::init(home, init_args).await?.print();
        return Ok(());
    }

    let config = Config::load(home).await?;
    let credentials = Credentials::from_common(args.common())?;

    let _: () = match args.command() {
        Command::Init(_) => {}

        Command::Project(project_args) => match project_args.command() {
            ProjectSubcommand::Add(add_args) => {
                commands::project_add(config, mode, &credentials, add_args)
                    .await?
                    .print()
            }
            ProjectSubcommand::List => commands::project_list(config, mode, &credentials)
                .await?
                .print(),
        },

        Command::Transaction(transaction_args) => match transaction_args.command() {
            TransactionSubcommand::Add(add_args) => {
                commands::transaction_add(config, mode, &credentials, add_args)
                    .await?
                    .print()
            }
            TransactionSubcommand::Delete(delete_args) => {
                commands::transaction_delete(config, mode, &credentials, delete_args)
                    .await?
                    .print()
            }
            TransactionSubcommand::List(list_args) => {
                commands::transaction_list(config, mode, &credentials, list_args)
                    .await?
                    .print()
            }
        },

        Command::Show(show_args) => commands::show(config, mode, &credentials, show_args)
            .await?
            .print(),

        Command::Summary(summary_args) => {
            commands::summary(config, mode, &credentials, summary_args)
                .await?
                .print()
        }

        Command::Watch => commands::watch(config, mode, &credentials).await?.print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use the default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
