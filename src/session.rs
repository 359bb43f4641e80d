//! The authenticated session passed to every command.

use crate::api::{ApiClient, ApiClientConfig};
use crate::models::User;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Token, API client and current user, carried explicitly.
pub struct Session {
    pub user: User,
    pub api: Arc<ApiClient>,
}

impl Session {
    /// Authenticate with `token` and load the current user.
    pub async fn open(config: ApiClientConfig, token: &str) -> Result<Self> {
        let api = ApiClient::new(config, token).context("Failed to create API client")?;
        let user = api
            .current_user()
            .await
            .context("Failed to load the current user")?;

        info!("Signed in as {} ({})", user.name, user.role);

        Ok(Self {
            user,
            api: Arc::new(api),
        })
    }
}

/// Pick the API token: explicit value first, then the token file.
pub fn resolve_token(explicit: Option<&str>, token_file: Option<&Path>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    if let Some(path) = token_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let token = content.trim();
        if token.is_empty() {
            bail!("Token file is empty: {}", path.display());
        }
        return Ok(token.to_string());
    }

    bail!("No API token: pass --token, set FIRMDESK_TOKEN, or set api.token_file in the config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_token_wins() {
        let token = resolve_token(Some("  abc  "), Some(Path::new("/nonexistent"))).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_token_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-token").unwrap();

        let token = resolve_token(Some(""), Some(file.path())).unwrap();
        assert_eq!(token, "file-token");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        assert!(resolve_token(None, None).is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(resolve_token(None, Some(file.path())).is_err());
    }
}
