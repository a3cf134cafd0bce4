//! Admin bootstrap for initial setup.
//!
//! Creates the first admin account on startup when configured. Safe to run on
//! every boot: an existing account with the same email is left untouched.

use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::services::auth::{AuthError, AuthService};

/// Minimum length accepted for a bootstrap password.
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Bootstrap the admin account if configured.
pub async fn bootstrap_admin(auth: &AuthService, config: &AdminConfig) -> Result<(), BootstrapError> {
    let email = match config.bootstrap_email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email,
        _ => return Ok(()),
    };

    let password = match config.bootstrap_password.as_deref() {
        Some(password) if !password.is_empty() => password,
        _ => {
            warn!("CR__ADMIN__BOOTSTRAP_EMAIL is set but no password was given - skipping bootstrap");
            return Ok(());
        }
    };

    if password.len() < MIN_PASSWORD_LEN {
        return Err(BootstrapError::Config(format!(
            "Bootstrap password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if auth.ensure_admin(email, password).await? {
        info!(email = %email, "Bootstrap admin created");
    } else {
        info!(email = %email, "Bootstrap admin already exists - skipping");
    }
    Ok(())
}
