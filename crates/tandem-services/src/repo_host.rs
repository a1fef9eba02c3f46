//! External repository host integration
//!
//! Workspaces mirror a repository's metadata. [`GitHubRepositoryHost`] talks to the GitHub
//! REST API; [`NoopRepositoryHost`] synthesizes metadata locally and is used when no API
//! token is configured (local development and tests).

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::models::RepositoryLink;
use tandem_core::{AppError, Config};

pub const GITHUB_PROVIDER: &str = "github";
const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("tandem/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Resolve `owner/name` into repository metadata
    async fn fetch_repository(&self, full_name: &str) -> Result<RepositoryLink, AppError>;

    /// Register the push/issue webhook. `Ok(None)` when webhooks are not configured.
    async fn register_webhook(&self, repository: &RepositoryLink)
        -> Result<Option<String>, AppError>;

    fn provider(&self) -> &'static str;
}

/// Split and validate `owner/name`
pub fn parse_full_name(full_name: &str) -> Result<(&str, &str), AppError> {
    let valid_part = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    match full_name.trim().split_once('/') {
        Some((owner, name)) if valid_part(owner) && valid_part(name) => Ok((owner, name)),
        _ => Err(AppError::InvalidInput(format!(
            "Repository must be given as owner/name, got '{}'",
            full_name
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    id: u64,
    full_name: String,
    html_url: String,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitHubHook {
    id: u64,
}

pub struct GitHubRepositoryHost {
    http_client: reqwest::Client,
    api_url: String,
    token: String,
    callback_url: Option<String>,
    webhook_secret: Option<String>,
}

impl Debug for GitHubRepositoryHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GitHubRepositoryHost")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GitHubRepositoryHost {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        callback_url: Option<String>,
        webhook_secret: Option<String>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client for repository host")?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            callback_url,
            webhook_secret,
        })
    }

    fn upstream(context: &str, err: impl std::fmt::Display) -> AppError {
        tracing::warn!(error = %err, "{}", context);
        AppError::Upstream(format!("{}: {}", context, err))
    }
}

#[async_trait]
impl RepositoryHost for GitHubRepositoryHost {
    #[tracing::instrument(skip(self))]
    async fn fetch_repository(&self, full_name: &str) -> Result<RepositoryLink, AppError> {
        let (owner, name) = parse_full_name(full_name)?;
        let url = format!("{}/repos/{}/{}", self.api_url, owner, name);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Self::upstream("Repository host request failed", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!(
                "Repository {}/{} not found",
                owner, name
            )));
        }
        if !status.is_success() {
            return Err(Self::upstream(
                "Repository host returned an error",
                status,
            ));
        }

        let repo: GitHubRepository = response
            .json()
            .await
            .map_err(|e| Self::upstream("Invalid repository host response", e))?;

        Ok(RepositoryLink {
            provider: GITHUB_PROVIDER.to_string(),
            external_id: repo.id.to_string(),
            full_name: repo.full_name,
            url: repo.html_url,
            default_branch: repo.default_branch,
            webhook_id: None,
        })
    }

    #[tracing::instrument(skip(self, repository), fields(repository = %repository.full_name))]
    async fn register_webhook(
        &self,
        repository: &RepositoryLink,
    ) -> Result<Option<String>, AppError> {
        let Some(callback_url) = &self.callback_url else {
            return Ok(None);
        };

        let mut config = json!({ "url": callback_url, "content_type": "json" });
        if let Some(secret) = &self.webhook_secret {
            config["secret"] = json!(secret);
        }
        let body = json!({
            "name": "web",
            "active": true,
            "events": ["push", "pull_request", "issues"],
            "config": config,
        });

        let url = format!("{}/repos/{}/hooks", self.api_url, repository.full_name);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::upstream("Webhook registration request failed", e))?;

        if !response.status().is_success() {
            return Err(Self::upstream(
                "Webhook registration rejected",
                response.status(),
            ));
        }

        let hook: GitHubHook = response
            .json()
            .await
            .map_err(|e| Self::upstream("Invalid webhook registration response", e))?;
        Ok(Some(hook.id.to_string()))
    }

    fn provider(&self) -> &'static str {
        GITHUB_PROVIDER
    }
}

/// Offline host: metadata derived from the name, no webhooks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRepositoryHost;

#[async_trait]
impl RepositoryHost for NoopRepositoryHost {
    async fn fetch_repository(&self, full_name: &str) -> Result<RepositoryLink, AppError> {
        let (owner, name) = parse_full_name(full_name)?;
        let full_name = format!("{}/{}", owner, name);
        Ok(RepositoryLink {
            provider: GITHUB_PROVIDER.to_string(),
            external_id: full_name.to_lowercase(),
            url: format!("https://github.com/{}", full_name),
            full_name,
            default_branch: "main".to_string(),
            webhook_id: None,
        })
    }

    async fn register_webhook(
        &self,
        _repository: &RepositoryLink,
    ) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    fn provider(&self) -> &'static str {
        GITHUB_PROVIDER
    }
}

/// Pick the host implementation from configuration
pub fn create_repository_host(config: &Config) -> anyhow::Result<Arc<dyn RepositoryHost>> {
    match &config.repo_host_token {
        Some(token) => {
            let api_url = config
                .repo_host_api_url
                .as_deref()
                .unwrap_or(DEFAULT_API_URL);
            tracing::info!(api_url = %api_url, "Using GitHub repository host");
            Ok(Arc::new(GitHubRepositoryHost::new(
                api_url,
                token.clone(),
                config.webhook_callback_url.clone(),
                config.webhook_secret.clone(),
            )?))
        }
        None => {
            tracing::warn!("REPO_HOST_TOKEN not set, repository metadata will be synthesized");
            Ok(Arc::new(NoopRepositoryHost))
        }
    }
}
