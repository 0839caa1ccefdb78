use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::config::{Credentials, ConfigError, load_credentials, resolve_secrets_dir};
use crate::mime::MimeBuildError;
use crate::oauth::{
    DEFAULT_EXPIRY_SKEW, OAuthError, OAuthTokens, TOKEN_ENDPOINT,
    refresh_access_token_with_endpoint,
};
use crate::token_store::{FileTokenStore, TokenStore, TokenStoreError};

pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GmailClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oauth error: {0}")]
    OAuth(#[from] OAuthError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("token file error: {0}")]
    TokenFile(#[from] TokenStoreError),
    #[error("token persistence error: {0}")]
    TokenStore(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("mime error: {0}")]
    Mime(#[from] MimeBuildError),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unauthorized after refresh")]
    Unauthorized,
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
}

/// Bounded exponential backoff applied to 429/5xx responses and transient
/// transport failures. Authentication failures are never covered by this
/// budget; they get exactly one forced-refresh retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn next_backoff(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.multiplier;
        Duration::from_secs_f64(next.min(self.max_backoff.as_secs_f64()))
    }
}

// Jitter: 75%-125% of the nominal backoff.
fn jittered(backoff: Duration) -> Duration {
    let factor = 0.75 + rand::random::<f64>() * 0.5;
    backoff.mul_f64(factor)
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Client for one Gmail account. All resource operations (messages, threads,
/// drafts, labels, attachments, filters, settings, history, convenience
/// helpers) are defined in their own modules as `impl` blocks on this type
/// and funnel through [`GmailClient::send_json`].
#[derive(Debug)]
pub struct GmailClient<S: TokenStore> {
    http: Client,
    credentials: Credentials,
    api_base: String,
    token_endpoint: String,
    timeout: Duration,
    retry: RetryPolicy,
    tokens: RwLock<OAuthTokens>,
    refresh_lock: Mutex<()>,
    token_store: Arc<S>,
}

impl<S: TokenStore> GmailClient<S> {
    pub fn new(
        http: Client,
        credentials: Credentials,
        initial_tokens: OAuthTokens,
        token_store: Arc<S>,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            tokens: RwLock::new(initial_tokens),
            refresh_lock: Mutex::new(()),
            token_store,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_token_endpoint(mut self, token_endpoint: impl Into<String>) -> Self {
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Per-request timeout. Defaults to 60 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Snapshot of the tokens currently held by this session.
    pub async fn current_tokens(&self) -> OAuthTokens {
        self.tokens.read().await.clone()
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub(crate) async fn send_json<T, B>(&self, build: B) -> Result<T, GmailClientError>
    where
        T: DeserializeOwned,
        B: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let response = self.perform_authenticated(build).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(GmailClientError::Decode)
    }

    /// For endpoints that answer 204/empty (DELETE, batchModify).
    pub(crate) async fn send_unit<B>(&self, build: B) -> Result<(), GmailClientError>
    where
        B: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        self.perform_authenticated(build).await.map(|_| ())
    }

    async fn perform_authenticated<B>(
        &self,
        build: B,
    ) -> Result<reqwest::Response, GmailClientError>
    where
        B: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut forced_refresh_done = false;
        let mut attempt: u32 = 0;
        let mut backoff = self.retry.initial_backoff;

        loop {
            let tokens = self.ensure_fresh_token(false).await?;
            let result = build()
                .timeout(self.timeout)
                .bearer_auth(&tokens.access_token)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    attempt += 1;
                    if !is_transient(&err) || attempt >= self.retry.max_attempts {
                        return Err(err.into());
                    }
                    tracing::warn!(attempt, error = %err, "transport error, retrying");
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff = self.retry.next_backoff(backoff);
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                // The token may have been revoked or the clock skewed; force
                // one refresh and retry exactly once.
                if forced_refresh_done {
                    return Err(GmailClientError::Unauthorized);
                }
                forced_refresh_done = true;
                tracing::warn!("unauthorized response, forcing token refresh");
                self.ensure_fresh_token(true).await?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                attempt += 1;
                if attempt >= self.retry.max_attempts {
                    return Err(api_error(response).await);
                }
                tracing::warn!(status = %status, attempt, "retryable status, backing off");
                tokio::time::sleep(jittered(backoff)).await;
                backoff = self.retry.next_backoff(backoff);
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            tracing::debug!(status = %status, "request complete");
            return Ok(response);
        }
    }

    async fn ensure_fresh_token(
        &self,
        force_refresh: bool,
    ) -> Result<OAuthTokens, GmailClientError> {
        {
            let tokens = self.tokens.read().await;
            if !force_refresh && !tokens.is_expired(Utc::now(), DEFAULT_EXPIRY_SKEW) {
                return Ok(tokens.clone());
            }
        }

        // Single-flight: concurrent callers coalesce into one refresh.
        let _guard = self.refresh_lock.lock().await;

        {
            let tokens = self.tokens.read().await;
            if !force_refresh && !tokens.is_expired(Utc::now(), DEFAULT_EXPIRY_SKEW) {
                return Ok(tokens.clone());
            }
        }

        let current = { self.tokens.read().await.clone() };
        let refreshed = refresh_access_token_with_endpoint(
            &self.http,
            &self.credentials.client_id,
            &self.credentials.client_secret,
            &current,
            &self.token_endpoint,
        )
        .await?;

        {
            let mut tokens = self.tokens.write().await;
            *tokens = refreshed.clone();
        }

        self.token_store
            .save_tokens(&refreshed)
            .await
            .map_err(|err| GmailClientError::TokenStore(err.to_string()))?;

        Ok(refreshed)
    }
}

impl GmailClient<FileTokenStore> {
    /// Open an existing session for an account whose token file already
    /// exists. Purely local: no HTTP call is made, and a missing token file
    /// surfaces as [`TokenStoreError::Missing`] before anything else happens.
    pub async fn for_account(
        account: &str,
        secrets_dir: Option<PathBuf>,
    ) -> Result<Self, GmailClientError> {
        let dir = resolve_secrets_dir(secrets_dir);
        let credentials = load_credentials(&dir).await?;
        let store = FileTokenStore::new(&dir, account);
        let tokens = store.load().await?;
        Ok(Self::new(
            Client::new(),
            credentials,
            tokens,
            Arc::new(store),
        ))
    }
}

async fn api_error(response: reqwest::Response) -> GmailClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    GmailClientError::Api { status, body }
}

/// A list response that can drive pagination.
pub trait Page {
    fn next_page_token(&self) -> Option<&str>;
}

/// Lazily walk a paginated list endpoint: fetch a page, follow its
/// `nextPageToken`, stop when the token is absent. Restartable by building a
/// fresh stream.
pub(crate) fn paginate<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, GmailClientError>>
where
    T: Page,
    F: Fn(Option<String>) -> Fut + Clone,
    Fut: Future<Output = Result<T, GmailClientError>>,
{
    enum Cursor {
        Start,
        Next(String),
        Done,
    }

    futures::stream::try_unfold(Cursor::Start, move |cursor| {
        let fetch = fetch.clone();
        async move {
            let token = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };
            let page = fetch(token).await?;
            let next = match page.next_page_token() {
                Some(token) => Cursor::Next(token.to_string()),
                None => Cursor::Done,
            };
            Ok(Some((page, next)))
        }
    })
}

impl Page for crate::types::ListMessagesResponse {
    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }
}

impl Page for crate::types::ListThreadsResponse {
    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }
}

impl Page for crate::types::ListDraftsResponse {
    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }
}

impl Page for crate::types::ListHistoryResponse {
    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }
}
