//! GitHub implementation of [`ContentPlatform`]: contents API for listings,
//! the raw host for file bytes, and the tarball API for whole refs.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, RequestBuilder, Response, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use crate::{
    error::Error,
    fetch::{ContentPlatform, EntryKind, ListingEntry, PlatformError, PlatformResult},
    paths::encode_path,
    source::SourceReference,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_USER_AGENT: &str = concat!("skillsync/", env!("CARGO_PKG_VERSION"));

/// GitHub answers a contents request for an unknown ref with this message.
const REF_NOT_FOUND_MESSAGE: &str = "No commit found for the ref";

/// Connection settings for [`GitHubPlatform`].
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub raw_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub token: Option<Secret<String>>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            raw_url: DEFAULT_RAW_URL.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

pub struct GitHubPlatform {
    client: Client,
    api_url: String,
    raw_url: String,
    token: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<ContentItem>),
    File(ContentItem),
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl GitHubPlatform {
    pub fn new(settings: GitHubSettings) -> crate::error::Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|source| Error::network(settings.api_url.as_str(), source))?;
        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            raw_url: settings.raw_url.trim_end_matches('/').to_string(),
            token: settings.token,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> PlatformResult<Response> {
        debug!(%url, "GET");
        request
            .send()
            .await
            .map_err(|source| PlatformError::Failed(Error::network(url, source)))
    }
}

/// Map a non-success status to a [`PlatformError`]. 404s are resolved by the
/// caller since their meaning depends on the endpoint.
fn status_error(url: &str, status: StatusCode) -> PlatformError {
    if status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        PlatformError::Unavailable {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        PlatformError::Failed(Error::source_not_found(
            url,
            format!("unexpected HTTP {status}"),
        ))
    }
}

#[async_trait]
impl ContentPlatform for GitHubPlatform {
    async fn list_dir(&self, at: &SourceReference, path: &str) -> PlatformResult<Vec<ListingEntry>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            at.owner,
            at.repo,
            encode_path(path)
        );
        let request = self
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("ref", at.git_ref.as_str())]);
        let response = self.send(request, &url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body: ApiMessage = response.json().await.unwrap_or_default();
            return Err(if body.message.contains(REF_NOT_FOUND_MESSAGE) {
                PlatformError::RefNotFound
            } else {
                PlatformError::PathNotFound
            });
        }
        if !status.is_success() {
            return Err(status_error(&url, status));
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|source| PlatformError::Failed(Error::network(url.as_str(), source)))?;
        let items = match contents {
            ContentsResponse::Dir(items) => items,
            ContentsResponse::File(item) => vec![item],
        };

        Ok(items
            .into_iter()
            .map(|item| ListingEntry {
                kind: match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                path: item.path,
            })
            .collect())
    }

    async fn fetch_file(&self, at: &SourceReference, path: &str) -> PlatformResult<Vec<u8>> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            at.owner,
            at.repo,
            at.git_ref,
            encode_path(path)
        );
        let response = self.send(self.get(&url), &url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::PathNotFound);
        }
        if !status.is_success() {
            return Err(status_error(&url, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| PlatformError::Failed(Error::network(url.as_str(), source)))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_archive(&self, at: &SourceReference) -> PlatformResult<Vec<u8>> {
        let url = format!(
            "{}/repos/{}/{}/tarball/{}",
            self.api_url, at.owner, at.repo, at.git_ref
        );
        let response = self.send(self.get(&url), &url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::RefNotFound);
        }
        if !status.is_success() {
            return Err(status_error(&url, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| PlatformError::Failed(Error::network(url.as_str(), source)))?;
        Ok(bytes.to_vec())
    }
}
