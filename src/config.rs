//! Configuration file handling for the foundation ledger.
//!
//! The configuration file is stored at `$FOUNDATION_HOME/config.json` and names the shared
//! document, the project to create on first run and a few display settings. Admin credentials
//! live next to it in `$FOUNDATION_HOME/.secrets/admins.json`.

use crate::api::{AdminCredentials, LocalAuth};
use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "foundation";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const ADMINS_JSON: &str = "admins.json";
const DOCUMENT_JSON: &str = "foundation.json";
pub const DEFAULT_DOCUMENT_KEY: &str = "foundations/as-salsabil";
pub const DEFAULT_PROJECT: &str = "General Fund";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_CURRENCY_SYMBOL: &str = "$";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$FOUNDATION_HOME` and from there it loads `$FOUNDATION_HOME/config.json`. It
/// provides paths to the files that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its secrets directory and:
    /// - an initial `config.json` with default settings, overridden by `default_project` and
    ///   `document_key` when given
    /// - `.secrets/admins.json` holding `admin`
    ///
    /// # Errors
    /// - Returns an error if the directory is already initialized or any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        admin: AdminCredentials,
        default_project: Option<&str>,
        document_key: Option<&str>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), admin, default_project, document_key)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(
        maybe_relative: PathBuf,
        admin: AdminCredentials,
        default_project: Option<&str>,
        document_key: Option<&str>,
    ) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the foundation home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "The foundation home is already initialized, '{}' exists",
                config_path.display()
            );
        }
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let mut config_file = ConfigFile::default();
        if let Some(project) = default_project {
            config_file.default_project = project.trim().to_string();
        }
        if let Some(key) = document_key {
            config_file.document_key = key.trim().to_string();
        }
        config_file.validate()?;
        ensure!(!admin.email().is_empty(), "The admin email cannot be empty");

        LocalAuth::save(&secrets.join(ADMINS_JSON), &[admin]).await?;
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `$FOUNDATION_HOME` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The foundation home is missing, run 'foundation init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }
        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn admins_path(&self) -> PathBuf {
        self.secrets.join(ADMINS_JSON)
    }

    /// The JSON file backing the shared document in local mode.
    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_JSON)
    }

    pub fn document_key(&self) -> &str {
        &self.config_file.document_key
    }

    pub fn default_project(&self) -> &str {
        &self.config_file.default_project
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.config_file.poll_interval_ms
    }

    pub fn currency_symbol(&self) -> &str {
        &self.config_file.currency_symbol
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "foundation",
///   "config_version": 1,
///   "document_key": "foundations/as-salsabil",
///   "default_project": "General Fund",
///   "poll_interval_ms": 1000,
///   "currency_symbol": "$"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "foundation"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The key of the shared document that holds every project
    #[serde(default = "default_document_key")]
    document_key: String,

    /// The project created when the shared document does not exist yet
    #[serde(default = "default_project")]
    default_project: String,

    /// How often the file backend checks the shared document for changes
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    #[serde(default = "default_currency_symbol")]
    currency_symbol: String,
}

fn default_document_key() -> String {
    DEFAULT_DOCUMENT_KEY.to_string()
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_currency_symbol() -> String {
    DEFAULT_CURRENCY_SYMBOL.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            document_key: default_document_key(),
            default_project: default_project(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            currency_symbol: default_currency_symbol(),
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from the specified path.
    async fn load(path: &Path) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Res<()> {
        ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        ensure!(!self.document_key.is_empty(), "document_key cannot be empty");
        ensure!(
            !self.default_project.is_empty(),
            "default_project cannot be empty"
        );
        ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be positive");
        Ok(())
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: &Path) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}
