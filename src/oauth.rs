use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json;
use thiserror::Error;
use url::Url;

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8090";

/// Safety margin subtracted from the expiry timestamp so a token is never
/// presented while it could lapse mid-flight.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::seconds(60);

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://mail.google.com/",
];

/// One account's OAuth token pair. Serializes to the on-disk token file
/// format: `expires_at` is stored as epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthTokens {
    /// True when the access token has expired or will expire within `skew`.
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + skew >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("missing refresh token")]
    MissingRefreshToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token endpoint error {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("invalid expires_in value: {0}")]
    InvalidExpires(i64),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Build the user-facing consent URL for the authorization-code grant.
/// Requests offline access so a refresh token is issued.
pub fn build_auth_url(
    client_id: &str,
    redirect_uri: &str,
    scopes: &[&str],
) -> Result<Url, OAuthError> {
    let url = Url::parse_with_params(
        AUTH_ENDPOINT,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", &scopes.join(" ")),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )?;
    Ok(url)
}

/// Exchange an authorization code for a token pair.
pub async fn exchange_code(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<OAuthTokens, OAuthError> {
    exchange_code_with_endpoint(
        client,
        client_id,
        client_secret,
        code,
        redirect_uri,
        TOKEN_ENDPOINT,
    )
    .await
}

pub async fn exchange_code_with_endpoint(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
    endpoint: &str,
) -> Result<OAuthTokens, OAuthError> {
    let response = client
        .post(endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await?;

    let payload = decode_token_response(response).await?;
    let refresh_token = payload.refresh_token.clone().unwrap_or_default();
    if refresh_token.is_empty() {
        return Err(OAuthError::MissingRefreshToken);
    }

    Ok(OAuthTokens {
        access_token: payload.access_token.clone(),
        refresh_token,
        expires_at: Utc::now() + Duration::seconds(payload.expires_in),
        scopes: payload.scopes(),
    })
}

/// Exchange the refresh token for a new access token. The refresh token is
/// carried over unless the provider rotates it.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    tokens: &OAuthTokens,
) -> Result<OAuthTokens, OAuthError> {
    refresh_access_token_with_endpoint(client, client_id, client_secret, tokens, TOKEN_ENDPOINT)
        .await
}

pub async fn refresh_access_token_with_endpoint(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    tokens: &OAuthTokens,
    endpoint: &str,
) -> Result<OAuthTokens, OAuthError> {
    if tokens.refresh_token.is_empty() {
        return Err(OAuthError::MissingRefreshToken);
    }

    let response = client
        .post(endpoint)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", tokens.refresh_token.as_str()),
        ])
        .send()
        .await?;

    let payload = decode_token_response(response).await?;

    let refresh_token = payload
        .refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| tokens.refresh_token.clone());
    let mut scopes = payload.scopes();
    if scopes.is_empty() {
        scopes = tokens.scopes.clone();
    }

    Ok(OAuthTokens {
        access_token: payload.access_token,
        refresh_token,
        expires_at: Utc::now() + Duration::seconds(payload.expires_in),
        scopes,
    })
}

async fn decode_token_response(response: reqwest::Response) -> Result<TokenResponse, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    let payload: TokenResponse = serde_json::from_str(&body).map_err(OAuthError::Decode)?;
    if payload.expires_in <= 0 {
        return Err(OAuthError::InvalidExpires(payload.expires_in));
    }
    Ok(payload)
}
