use crate::aggregate::{current_year, totals_all_years, ProjectTotals, Selection};
use crate::api::Mode;
use crate::args::ProjectAddArgs;
use crate::commands::{open_session, Credentials, Out};
use crate::model::{format_currency, Year};
use crate::{Config, Result};
use serde::Serialize;

/// One line of `foundation project list`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ProjectListing {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_year: Option<Year>,
    pub totals: ProjectTotals,
}

/// Adds a project, replacing any project of the same name, and writes it to the shared document.
pub async fn project_add(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
    args: &ProjectAddArgs,
) -> Result<Out<Selection>> {
    let mut session = open_session(&config, mode, credentials).await?;
    let year = args.year().unwrap_or_else(current_year);
    let mutation = session.add_project(args.name(), year).await?;
    Ok(Out::new(
        format!("Added project '{}' starting {year}", mutation.project),
        Selection {
            project: mutation.project,
            year,
        },
    ))
}

/// Lists every project with its totals across all years.
pub async fn project_list(
    config: Config,
    mode: Mode,
    credentials: &Credentials,
) -> Result<Out<Vec<ProjectListing>>> {
    let session = open_session(&config, mode, credentials).await?;
    let listings: Vec<ProjectListing> = session
        .mirror()
        .store()
        .iter()
        .map(|(name, project)| ProjectListing {
            name: name.to_string(),
            created_year: project.created_year(),
            totals: totals_all_years(project),
        })
        .collect();

    if listings.is_empty() {
        return Ok(Out::new("There are no projects", listings));
    }
    let symbol = config.currency_symbol();
    let lines: Vec<String> = listings
        .iter()
        .map(|p| {
            format!(
                "{}: income {}, expenses {}, balance {} ({} year(s) with data)",
                p.name,
                format_currency(p.totals.totals.income_total, symbol),
                format_currency(p.totals.totals.expense_total, symbol),
                format_currency(p.totals.totals.balance, symbol),
                p.totals.years.len()
            )
        })
        .collect();
    Ok(Out::new(
        format!("{} project(s):\n{}", listings.len(), lines.join("\n")),
        listings,
    ))
}
