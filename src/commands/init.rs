use crate::api::AdminCredentials;
use crate::args::InitArgs;
use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the foundation home directory and:
/// - an initial `config.json` with default settings, or the project name and document key given
///   in `args`
/// - `.secrets/admins.json` with the first admin's credentials
///
/// The shared document is not created here. The first sign-in creates it.
///
/// # Errors
/// - Returns an error if the directory is already initialized or any file operation fails.
pub async fn init(home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let admin = AdminCredentials::new(args.admin_email(), args.admin_password());
    let config = Config::create(home, admin, args.default_project(), args.document_key()).await?;
    Ok(format!(
        "Successfully created the foundation home at {}",
        config.root().display()
    )
    .into())
}
