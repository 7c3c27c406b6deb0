//! Command handlers for the foundation CLI.
//!
//! This module contains implementations for all CLI subcommands. Every command other than `init`
//! signs in, waits for the shared document to load, and then reads or mutates it through a
//! `Session`.

mod init;
mod project;
mod show;
mod transaction;
mod watch;

use crate::api::{self, Mode};
use crate::args::Common;
use crate::error::{Error, ErrorType, IntoResult};
use crate::session::Session;
use crate::{Config, Result};
use anyhow::anyhow;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use init::init;
pub use project::{project_add, project_list, ProjectListing};
pub use show::{show, summary, Summary};
pub use transaction::{transaction_add, transaction_delete, transaction_list, TransactionListing};
pub use watch::{watch, watch_until};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// The email and password a command signs in with.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Takes the credentials from `--email` and `--password` (or their environment variables).
    pub fn from_common(common: &Common) -> Result<Self> {
        match (common.email(), common.password()) {
            (Some(email), Some(password)) => Ok(Self::new(email, password)),
            _ => Err(Error::new(
                ErrorType::Auth,
                anyhow!(
                    "Sign in with --email and --password, or set FOUNDATION_EMAIL and \
                    FOUNDATION_PASSWORD"
                ),
            )),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Signs in and waits for the shared document to load.
async fn open_session(config: &Config, mode: Mode, credentials: &Credentials) -> Result<Session> {
    let auth = api::auth(config).await.pub_result(ErrorType::Config)?;
    let documents = api::documents(config, mode);
    let mut session = Session::new(
        auth,
        documents,
        config.document_key(),
        config.default_project(),
    );
    session
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    session.sync().await?;
    debug!(
        "Loaded {} project(s) from '{}'",
        session.mirror().store().len(),
        config.document_key()
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tracing_subscriber::filter::LevelFilter;

    fn common() -> Common {
        Common::new(LevelFilter::INFO, PathBuf::from("/tmp/foundation"))
    }

    #[test]
    fn test_credentials_from_common() {
        let credentials =
            Credentials::from_common(&common().with_credentials("a@b.c", "secret")).unwrap();
        assert_eq!(credentials.email(), "a@b.c");
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn test_credentials_missing() {
        let err = Credentials::from_common(&common()).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Auth);
    }
}
