//! A local implementation of the `Auth` trait. Admin credentials live in
//! `$FOUNDATION_HOME/.secrets/admins.json`, which is only readable by its owner.

use crate::api::Auth;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info};

/// The signed-in admin. Only used as a display label.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// One admin account.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AdminCredentials {
    email: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    fn matches(&self, email: &str, password: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim()) && self.password == password
    }
}

impl Debug for AdminCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct AdminsFile {
    admins: Vec<AdminCredentials>,
}

/// Signs admins in against the credentials in the admins file.
#[derive(Debug)]
pub struct LocalAuth {
    admins: Vec<AdminCredentials>,
    state: watch::Sender<Option<Identity>>,
}

impl LocalAuth {
    pub fn new(admins: Vec<AdminCredentials>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            admins,
            state,
        }
    }

    /// Loads the admins file at `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let file: AdminsFile = utils::deserialize(&path)
            .await
            .context("Unable to load the admins file")?;
        debug!("Loaded {} admin(s) from {}", file.admins.len(), path.display());
        Ok(Self::new(file.admins))
    }

    /// Writes `admins` to `path` with owner-only permissions.
    pub async fn save(path: &Path, admins: &[AdminCredentials]) -> Res<()> {
        let file = AdminsFile {
            admins: admins.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize admins")?;
        utils::write(path, json).await?;
        utils::restrict_permissions(path)
    }

    pub fn admins(&self) -> &[AdminCredentials] {
        &self.admins
    }
}

#[async_trait::async_trait]
impl Auth for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Res<Identity> {
        if email.trim().is_empty() || password.is_empty() {
            bail!("Please enter both email and password");
        }
        let Some(admin) = self.admins.iter().find(|a| a.matches(email, password)) else {
            bail!("Login failed: invalid email or password");
        };
        let identity = Identity::new(admin.email());
        info!("Signed in as {}", identity.email());
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Res<()> {
        if let Some(identity) = self.state.send_replace(None) {
            info!("Signed out {}", identity.email());
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn auth() -> LocalAuth {
        LocalAuth::new(vec![AdminCredentials::new("admin@example.org", "s3cret")])
    }

    #[tokio::test]
    async fn test_sign_in_and_out_are_observed() {
        let auth = auth();
        let mut rx = auth.watch();
        assert!(rx.borrow().is_none());

        let identity = auth.sign_in(" Admin@Example.org ", "s3cret").await.unwrap();
        assert_eq!(identity.email(), "admin@example.org");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));

        auth.sign_out().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let auth = auth();
        let err = auth.sign_in("admin@example.org", "nope").await.unwrap_err();
        assert!(err.to_string().contains("Login failed"));
        assert!(auth.sign_in("", "s3cret").await.is_err());
        assert!(auth.watch().borrow().is_none());
    }

    #[tokio::test]
    async fn test_admins_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admins.json");
        LocalAuth::save(&path, &[AdminCredentials::new("a@b.c", "pw")])
            .await
            .unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let auth = LocalAuth::load(&path).await.unwrap();
        assert_eq!(auth.admins().len(), 1);
        assert!(auth.sign_in("a@b.c", "pw").await.is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let text = format!("{:?}", AdminCredentials::new("a@b.c", "pw"));
        assert!(!text.contains("pw\""), "{text}");
    }
}
