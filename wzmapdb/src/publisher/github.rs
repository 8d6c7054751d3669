//! GitHub repository naming and the REST release catalog.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::host::{GITHUB_ACCEPT, GITHUB_API_VERSION, HOST_TIMESTAMP_FORMAT};
use super::token::GITHUB_API_URL;
use super::PublishError;

/// Organization owning every map repository.
pub const GITHUB_ORG: &str = "Warzone2100";

/// Prefix of map repository names.
pub const MAP_REPO_PREFIX: &str = "maps-";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// An `owner/name` repository inside [`GITHUB_ORG`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName {
    name: String,
}

impl RepoName {
    /// Repository name without the owner.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", GITHUB_ORG, self.name)
    }

    /// The part after `maps-`, identifying the repository in download info.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidRepository`] if the name lacks the prefix.
    pub fn maps_suffix(&self) -> Result<&str, PublishError> {
        self.name.strip_prefix(MAP_REPO_PREFIX).ok_or_else(|| {
            PublishError::InvalidRepository(format!(
                "Invalid map repo name - expected to start with \"{}\": {}",
                MAP_REPO_PREFIX, self.name
            ))
        })
    }
}

impl FromStr for RepoName {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if owner == GITHUB_ORG && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    name: name.to_string(),
                })
            }
            _ => Err(PublishError::InvalidRepository(format!(
                "Unexpected map repo name - expected to start with \"{}/\": {}",
                GITHUB_ORG, s
            ))),
        }
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", GITHUB_ORG, self.name)
    }
}

/// Errors listing releases through the REST API.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API returned status code: {0}")]
    Status(u16),

    #[error("unexpected release list from GitHub API: {0}")]
    UnexpectedBody(String),

    #[error("release {tag} has an invalid publish time: '{value}'")]
    InvalidPublishTime { tag: String, value: String },
}

/// A release as listed by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedRelease {
    pub tag_name: String,
    pub published_at: String,
}

/// Lists the published releases of a repository.
pub trait ReleaseCatalog {
    /// Releases oldest first. With `since_tag`, only releases after that tag
    /// are returned, unless the tag is not found.
    fn releases_since(
        &self,
        repo: &str,
        since_tag: Option<&str>,
    ) -> Result<Vec<HostedRelease>, CatalogError>;
}

/// [`ReleaseCatalog`] over `api.github.com`.
pub struct RestReleaseCatalog {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl RestReleaseCatalog {
    /// `token` raises the rate limit; `GH_TOKEN` is the usual source.
    pub fn new(token: Option<String>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("wzmapdb/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
            token,
        })
    }

    /// Catalog authenticated with `GH_TOKEN`, if set.
    pub fn from_env() -> Result<Self, CatalogError> {
        Self::new(std::env::var("GH_TOKEN").ok())
    }

    fn fetch_page(&self, url: &str) -> Result<(Vec<HostedRelease>, Option<String>), CatalogError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let response = request.send()?;
        if response.status().as_u16() != 200 {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        let next = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_url);
        let text = response.text()?;
        let releases = serde_json::from_str(&text)
            .map_err(|e| CatalogError::UnexpectedBody(e.to_string()))?;
        Ok((releases, next))
    }
}

impl ReleaseCatalog for RestReleaseCatalog {
    fn releases_since(
        &self,
        repo: &str,
        since_tag: Option<&str>,
    ) -> Result<Vec<HostedRelease>, CatalogError> {
        let (mut releases, mut next) =
            self.fetch_page(&format!("{}/repos/{}/releases", self.api_url, repo))?;
        let mut page = 1;
        while let Some(url) = next {
            info!("- Fetching page ({}): {}", page, url);
            let (more, following) = self.fetch_page(&url)?;
            releases.extend(more);
            next = following;
            page += 1;
        }
        releases_after(releases, since_tag)
    }
}

/// `<base>/<owner>/<name>` for an `owner/name` repository.
pub fn repo_subdir(base: &Path, github_repo: &str) -> PathBuf {
    github_repo
        .split('/')
        .filter(|c| !c.is_empty())
        .fold(base.to_path_buf(), |path, c| path.join(c))
}

/// The `rel="next"` target of a `Link` header.
pub fn next_page_url(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let url = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if is_next {
            url.strip_prefix('<')
                .and_then(|u| u.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}

/// Sort releases by publish time and keep those after `since_tag`.
pub fn releases_after(
    releases: Vec<HostedRelease>,
    since_tag: Option<&str>,
) -> Result<Vec<HostedRelease>, CatalogError> {
    let mut dated = releases
        .into_iter()
        .map(|release| {
            NaiveDateTime::parse_from_str(&release.published_at, HOST_TIMESTAMP_FORMAT)
                .map(|published| (published, release.clone()))
                .map_err(|_| CatalogError::InvalidPublishTime {
                    tag: release.tag_name.clone(),
                    value: release.published_at.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    dated.sort_by_key(|(published, _)| *published);

    let mut releases: Vec<HostedRelease> = dated.into_iter().map(|(_, r)| r).collect();
    if let Some(tag) = since_tag {
        if let Some(index) = releases.iter().position(|r| r.tag_name == tag) {
            releases.drain(..=index);
        }
    }
    Ok(releases)
}
