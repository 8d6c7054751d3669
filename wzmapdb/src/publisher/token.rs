//! Short-lived repository access tokens from a GitHub App.
//!
//! The app signs a JWT with its private key, looks up its installation on
//! the target repository and asks for an installation token restricted to
//! that single repository.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::host::{GITHUB_ACCEPT, GITHUB_API_VERSION};
use crate::command::{CommandRunner, CommandSpec};
use crate::tools::ToolError;

/// Environment prefix of the app that creates map repository releases.
pub const MAPREPO_MANAGER_APP_ENV: &str = "WZ_GH_APP_MAPREPO_MANAGER";

/// Environment prefix of the app used by the push helper.
pub const GIT_PUSH_APP_ENV: &str = "WZ_GH_APP_GIT_PUSH";

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// JWT lifetime. GitHub accepts at most ten minutes.
const JWT_LIFETIME_SECS: u64 = 120;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors obtaining an access token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("GitHub App private key is empty")]
    MissingPrivateKey,

    #[error("failed to sign app JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed getting installation for {repo}, with error: {status}")]
    Installation { repo: String, status: u16 },

    #[error("Failed to get repository id for: {repo}: {source}")]
    RepositoryId {
        repo: String,
        #[source]
        source: ToolError,
    },

    #[error("Failed calling: api.github.com/app/installations/{installation}/access_tokens, with error: {status}")]
    AccessToken { installation: u64, status: u16 },

    #[error("unexpected response from {endpoint}: missing '{field}'")]
    InvalidResponse { endpoint: String, field: &'static str },

    #[error("invalid repository name '{0}' - expected owner/name")]
    InvalidRepository(String),
}

/// Supplies access tokens for a repository.
pub trait AccessTokenSource {
    /// Token for `repo` (`owner/name`).
    fn access_token(&self, repo: &str) -> Result<String, TokenError>;
}

/// App id and private key of a GitHub App.
#[derive(Clone)]
pub struct GithubAppCredentials {
    pub app_id: String,
    pub private_key: String,
}

impl std::fmt::Debug for GithubAppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubAppCredentials")
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl GithubAppCredentials {
    /// Read `<prefix>_APP_ID` and `<prefix>_PRIVATE_KEY_SECRET`.
    ///
    /// Returns `None` unless both are set.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let app_id = std::env::var(format!("{}_APP_ID", prefix)).ok()?;
        let private_key = std::env::var(format!("{}_PRIVATE_KEY_SECRET", prefix)).ok()?;
        Some(Self {
            app_id,
            private_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: u64,
    exp: u64,
    iss: String,
}

/// Sign the app JWT used to authenticate as the app itself.
pub fn build_app_jwt(credentials: &GithubAppCredentials, now: SystemTime) -> Result<String, TokenError> {
    if credentials.private_key.trim().is_empty() {
        return Err(TokenError::MissingPrivateKey);
    }
    let iat = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let claims = AppClaims {
        iat,
        exp: iat + JWT_LIFETIME_SECS,
        iss: credentials.app_id.clone(),
    };
    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

/// [`AccessTokenSource`] minting installation tokens for a GitHub App.
pub struct GithubAppTokenProvider {
    credentials: GithubAppCredentials,
    client: Client,
    api_url: String,
    gh: PathBuf,
    runner: CommandRunner,
}

impl GithubAppTokenProvider {
    /// Create a provider. The repository id is looked up through `gh`, so any
    /// credentials configured for it apply.
    pub fn new(
        credentials: GithubAppCredentials,
        gh: &Path,
        runner: CommandRunner,
    ) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("wzmapdb/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            credentials,
            client,
            api_url: GITHUB_API_URL.to_string(),
            gh: gh.to_path_buf(),
            runner,
        })
    }

    fn authorized(&self, request: RequestBuilder, jwt: &str) -> RequestBuilder {
        request
            .header("Accept", GITHUB_ACCEPT)
            .header("Authorization", format!("Bearer {}", jwt))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    fn installation_id(&self, repo: &str, jwt: &str) -> Result<u64, TokenError> {
        let endpoint = format!("{}/repos/{}/installation", self.api_url, repo);
        let response = self.authorized(self.client.get(&endpoint), jwt).send()?;
        if !response.status().is_success() {
            return Err(TokenError::Installation {
                repo: repo.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body: Value = serde_json::from_str(&response.text()?).unwrap_or(Value::Null);
        body.get("id")
            .and_then(Value::as_u64)
            .ok_or(TokenError::InvalidResponse {
                endpoint,
                field: "id",
            })
    }

    fn repository_id(&self, repo: &str) -> Result<u64, TokenError> {
        let spec = CommandSpec::new(&self.gh)
            .args(["api", "-H"])
            .arg(format!("Accept: {}", GITHUB_ACCEPT))
            .arg("-H")
            .arg(format!("X-GitHub-Api-Version: {}", GITHUB_API_VERSION))
            .arg(format!("/repos/{}", repo));
        let output = self
            .runner
            .run_checked(&spec)
            .map_err(|source| TokenError::RepositoryId {
                repo: repo.to_string(),
                source,
            })?;
        let body: Value = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
        body.get("id")
            .and_then(Value::as_u64)
            .ok_or(TokenError::InvalidResponse {
                endpoint: format!("/repos/{}", repo),
                field: "id",
            })
    }
}

impl AccessTokenSource for GithubAppTokenProvider {
    fn access_token(&self, repo: &str) -> Result<String, TokenError> {
        if repo.split_once('/').is_none() {
            return Err(TokenError::InvalidRepository(repo.to_string()));
        }
        let jwt = build_app_jwt(&self.credentials, SystemTime::now())?;

        let installation = self.installation_id(repo, &jwt)?;
        let repository = self.repository_id(repo)?;
        debug!(installation, repository, "requesting installation token");

        let endpoint = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation
        );
        let body = serde_json::json!({ "repository_ids": [repository] }).to_string();
        let response = self
            .authorized(self.client.post(&endpoint), &jwt)
            .header("Content-Type", "application/json")
            .body(body)
            .send()?;
        if !response.status().is_success() {
            return Err(TokenError::AccessToken {
                installation,
                status: response.status().as_u16(),
            });
        }
        let body: Value = serde_json::from_str(&response.text()?).unwrap_or(Value::Null);
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(TokenError::InvalidResponse {
                endpoint,
                field: "token",
            })
    }
}
