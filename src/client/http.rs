//! reqwest-backed implementation of [`PaperlessApi`].

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::api::PaperlessApi;
use super::error::ClientError;
use super::logs::parse_log_lines;
use super::types::{
    CatalogEntry, CatalogKind, CountedResource, LogEntry, Page, RemoteVersion, Statistics,
    SystemStatus, Task,
};

/// Default request timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used when walking paginated collections.
const PAGE_SIZE: &str = "100";

/// Connection settings for [`PaperlessClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Base URL of the Paperless instance, e.g. `http://paperless:8000`.
    pub base_url: String,
    /// API token sent as `Authorization: Token <token>`.
    pub auth_token: Option<String>,
    /// Username for HTTP basic auth.
    pub username: Option<String>,
    /// Password for HTTP basic auth.
    pub password: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            username: None,
            password: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Authenticate with an API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Authenticate with username and password.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum Auth {
    None,
    Token(String),
    Basic { username: String, password: Option<String> },
}

/// Paperless-ngx REST client.
#[derive(Clone)]
pub struct PaperlessClient {
    base: Url,
    http: Client,
    auth: Auth,
}

impl PaperlessClient {
    /// Build a client.
    ///
    /// # Errors
    /// Returns `ClientError::Url` for an unparsable base URL and
    /// `ClientError::Request` if the HTTP client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let mut base = Url::parse(&options.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder().timeout(options.timeout).build()?;

        let auth = match (options.auth_token, options.username) {
            (Some(token), _) => Auth::Token(token),
            (None, Some(username)) => Auth::Basic {
                username,
                password: options.password,
            },
            (None, None) => Auth::None,
        };

        Ok(Self { base, http, auth })
    }

    /// Base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join("api/")?.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let mut request = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");

        request = match &self.auth {
            Auth::None => request,
            Auth::Token(token) => request.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Walk a paginated collection by following `next` links.
    async fn get_all_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(url).await?;
            items.extend(page.results);

            next = match page.next {
                Some(link) => Some(self.base.join(&link)?),
                None => None,
            };
        }

        Ok(items)
    }
}

impl fmt::Debug for PaperlessClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperlessClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl PaperlessApi for PaperlessClient {
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ClientError> {
        let mut url = self.endpoint(kind.path())?;
        url.query_pairs_mut()
            .append_pair("ordering", "name")
            .append_pair("page_size", PAGE_SIZE);

        self.get_all_pages(url).await
    }

    async fn count(&self, resource: CountedResource) -> Result<Option<u64>, ClientError> {
        let mut url = self.endpoint(resource.path())?;
        url.query_pairs_mut().append_pair("page_size", "1");

        let page: Page<serde_json::Value> = self.get_json(url).await?;
        Ok(page.count)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.get_json(self.endpoint("tasks/")?).await
    }

    async fn list_logs(&self) -> Result<Vec<String>, ClientError> {
        self.get_json(self.endpoint("logs/")?).await
    }

    async fn get_log(&self, name: &str) -> Result<Vec<LogEntry>, ClientError> {
        let mut url = self.endpoint("logs/")?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name).push("");
        }

        let lines: Vec<String> = self.get_json(url).await?;
        Ok(parse_log_lines(lines))
    }

    async fn get_status(&self) -> Result<SystemStatus, ClientError> {
        self.get_json(self.endpoint("status/")?).await
    }

    async fn get_statistics(&self) -> Result<Statistics, ClientError> {
        self.get_json(self.endpoint("statistics/")?).await
    }

    async fn get_remote_version(&self) -> Result<RemoteVersion, ClientError> {
        self.get_json(self.endpoint("remote_version/")?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_builder() {
        let options = ClientOptions::new("http://paperless:8000")
            .with_token("secret")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(options.auth_token.as_deref(), Some("secret"));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert!(!format!("{options:?}").contains("secret"));
    }

    #[test]
    fn test_endpoint_resolution_keeps_base_path() {
        let client = PaperlessClient::new(ClientOptions::new("http://host:8000/paperless")).unwrap();

        assert_eq!(client.base_url().as_str(), "http://host:8000/paperless/");
        assert_eq!(
            client.endpoint("tags/").unwrap().as_str(),
            "http://host:8000/paperless/api/tags/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = PaperlessClient::new(ClientOptions::new("not a url"));
        assert!(matches!(result, Err(ClientError::Url(_))));
    }
}
