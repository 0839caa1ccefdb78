//! Interactive authorization: open the consent page in a browser, catch the
//! redirect on a loopback listener, exchange the code, and persist the
//! resulting tokens for [`crate::client::GmailClient::for_account`].

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::{ConfigError, load_credentials, resolve_secrets_dir};
use crate::oauth::{OAuthError, OAuthTokens, SCOPES, build_auth_url, exchange_code};
use crate::token_store::{FileTokenStore, TokenStoreError};

const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Authorized</title></head>
<body><p>Authorization complete. You can close this window and return to the terminal.</p></body></html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Authorization failed</title></head>
<body><p>Authorization failed. Return to the terminal and try again.</p></body></html>"#;

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Store(#[from] TokenStoreError),
    #[error("redirect URI {0} is not a usable loopback address")]
    InvalidRedirect(String),
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("timed out waiting for the OAuth redirect")]
    Timeout,
    #[error("callback listener failed: {0}")]
    Callback(String),
}

#[derive(Debug, Clone)]
pub struct AuthorizeOptions {
    pub secrets_dir: Option<PathBuf>,
    /// Launch the system browser at the consent URL. When false the URL is
    /// only logged and the user opens it themselves.
    pub open_browser: bool,
    pub timeout: Duration,
}

impl Default for AuthorizeOptions {
    fn default() -> Self {
        Self {
            secrets_dir: None,
            open_browser: true,
            timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

/// Run the full authorization-code flow for one account and write its token
/// file. Returns the freshly issued tokens.
pub async fn authorize(
    account: &str,
    options: AuthorizeOptions,
) -> Result<OAuthTokens, AuthorizeError> {
    let secrets_dir = resolve_secrets_dir(options.secrets_dir.clone());
    let credentials = load_credentials(&secrets_dir).await?;

    let listener = bind_redirect_listener(&credentials.redirect_uri)?;
    let auth_url = build_auth_url(&credentials.client_id, &credentials.redirect_uri, SCOPES)?;

    info!(account, url = %auth_url, "waiting for OAuth consent");
    if options.open_browser {
        // Best effort; the URL in the log always works as a fallback.
        if let Err(err) = open::that(auth_url.as_str()) {
            info!(error = %err, "could not launch a browser, open the URL manually");
        }
    }

    let timeout = options.timeout;
    let code = tokio::task::spawn_blocking(move || wait_for_code(listener, timeout))
        .await
        .map_err(|err| AuthorizeError::Callback(err.to_string()))??;

    let http = reqwest::Client::new();
    let tokens = exchange_code(
        &http,
        &credentials.client_id,
        &credentials.client_secret,
        &code,
        &credentials.redirect_uri,
    )
    .await?;
    let store = FileTokenStore::new(secrets_dir, account);
    store.save(&tokens).await?;
    info!(account, path = %store.path().display(), "stored OAuth tokens");

    Ok(tokens)
}

/// Exchange a code obtained out of band (e.g. pasted from another machine)
/// and write the token file.
pub async fn authorize_with_code(
    account: &str,
    code: &str,
    secrets_dir: Option<PathBuf>,
) -> Result<OAuthTokens, AuthorizeError> {
    let secrets_dir = resolve_secrets_dir(secrets_dir);
    let credentials = load_credentials(&secrets_dir).await?;

    let http = reqwest::Client::new();
    let tokens = exchange_code(
        &http,
        &credentials.client_id,
        &credentials.client_secret,
        code,
        &credentials.redirect_uri,
    )
    .await?;
    let store = FileTokenStore::new(secrets_dir, account);
    store.save(&tokens).await?;

    Ok(tokens)
}

fn bind_redirect_listener(redirect_uri: &str) -> Result<TcpListener, AuthorizeError> {
    let url = Url::parse(redirect_uri)
        .map_err(|_| AuthorizeError::InvalidRedirect(redirect_uri.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AuthorizeError::InvalidRedirect(redirect_uri.to_string()))?;

    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|err| AuthorizeError::Callback(err.to_string()))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| AuthorizeError::Callback(err.to_string()))?;
    Ok(listener)
}

/// Accept connections until one carries a `code` query parameter. Non-OAuth
/// requests (favicons and the like) get an error page and are ignored.
fn wait_for_code(listener: TcpListener, timeout: Duration) -> Result<String, AuthorizeError> {
    let deadline = Instant::now() + timeout;

    loop {
        if Instant::now() > deadline {
            return Err(AuthorizeError::Timeout);
        }

        match listener.accept() {
            Ok((mut stream, _addr)) => {
                stream.set_nonblocking(false).ok();
                stream.set_read_timeout(Some(Duration::from_secs(5))).ok();

                let mut buf = [0u8; 4096];
                let n = stream.read(&mut buf).unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);

                match parse_redirect_request(&request) {
                    Ok(Some(code)) => {
                        send_response(&mut stream, SUCCESS_HTML);
                        return Ok(code);
                    }
                    Ok(None) => {
                        send_response(&mut stream, ERROR_HTML);
                    }
                    Err(err) => {
                        send_response(&mut stream, ERROR_HTML);
                        return Err(err);
                    }
                }
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(err) => return Err(AuthorizeError::Callback(err.to_string())),
        }
    }
}

fn send_response(stream: &mut std::net::TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Pull `code` out of the redirect's query string. `Ok(None)` means this was
/// not an OAuth redirect at all; an `error` parameter is a hard stop.
fn parse_redirect_request(request: &str) -> Result<Option<String>, AuthorizeError> {
    let Some(first_line) = request.lines().next() else {
        return Ok(None);
    };
    let Some(path) = first_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let Some(query) = path.split('?').nth(1) else {
        return Ok(None);
    };

    let mut code = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" if !value.is_empty() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = error {
        return Err(AuthorizeError::Denied(reason));
    }
    Ok(code)
}
