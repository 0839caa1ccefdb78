use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::oauth::DEFAULT_REDIRECT_URI;

pub const SECRETS_DIR_ENV: &str = "GMAIL_SECRETS_DIR";
pub const DEFAULT_SECRETS_DIR: &str = "~/secrets/google-oauth";
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// OAuth client credentials shared by every account session. Loaded once,
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("credentials file not found: {path}")]
    CredentialsMissing { path: PathBuf },
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolve the secrets directory: explicit argument, then the
/// `GMAIL_SECRETS_DIR` environment variable, then `~/secrets/google-oauth`.
pub fn resolve_secrets_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Ok(dir) = env::var(SECRETS_DIR_ENV) {
        return PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    PathBuf::from(shellexpand::tilde(DEFAULT_SECRETS_DIR).as_ref())
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl From<RawCredentials> for Credentials {
    fn from(raw: RawCredentials) -> Self {
        let redirect_uri = raw
            .redirect_uri
            .or_else(|| raw.redirect_uris.into_iter().next())
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        Credentials {
            client_id: raw.client_id,
            client_secret: raw.client_secret,
            redirect_uri,
        }
    }
}

/// Load `credentials.json` from the secrets directory. Accepts either a flat
/// object or Google's download format with an `installed`/`web` wrapper.
pub async fn load_credentials(secrets_dir: &Path) -> Result<Credentials, ConfigError> {
    let path = secrets_dir.join(CREDENTIALS_FILE);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::CredentialsMissing { path });
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    let value: serde_json::Value =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    let inner = value
        .get("installed")
        .or_else(|| value.get("web"))
        .cloned()
        .unwrap_or(value);

    let raw: RawCredentials =
        serde_json::from_value(inner).map_err(|source| ConfigError::Parse { path, source })?;
    Ok(raw.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().expect("lock env");
        let saved: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (k.to_string(), env::var(k).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        f();

        for (key, value) in saved {
            match value {
                Some(v) => unsafe { env::set_var(&key, v) },
                None => unsafe { env::remove_var(&key) },
            }
        }
    }

    #[test]
    fn explicit_dir_wins_over_env() {
        with_env(&[(SECRETS_DIR_ENV, Some("/env/secrets"))], || {
            let dir = resolve_secrets_dir(Some(PathBuf::from("/explicit")));
            assert_eq!(dir, PathBuf::from("/explicit"));
        });
    }

    #[test]
    fn env_dir_wins_over_default() {
        with_env(&[(SECRETS_DIR_ENV, Some("/env/secrets"))], || {
            let dir = resolve_secrets_dir(None);
            assert_eq!(dir, PathBuf::from("/env/secrets"));
        });
    }

    #[test]
    fn default_dir_expands_tilde() {
        with_env(
            &[(SECRETS_DIR_ENV, None), ("HOME", Some("/home/tester"))],
            || {
                let dir = resolve_secrets_dir(None);
                assert_eq!(dir, PathBuf::from("/home/tester/secrets/google-oauth"));
            },
        );
    }

    #[tokio::test]
    async fn loads_flat_credentials() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CREDENTIALS_FILE),
            r#"{"client_id": "id", "client_secret": "secret", "redirect_uri": "http://localhost:9999"}"#,
        )
        .unwrap();

        let creds = load_credentials(dir.path()).await.expect("loads");
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
        assert_eq!(creds.redirect_uri, "http://localhost:9999");
    }

    #[tokio::test]
    async fn loads_installed_wrapper_with_redirect_uris_list() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CREDENTIALS_FILE),
            r#"{"installed": {"client_id": "id", "client_secret": "secret", "redirect_uris": ["http://localhost:8090", "urn:ietf:wg:oauth:2.0:oob"]}}"#,
        )
        .unwrap();

        let creds = load_credentials(dir.path()).await.expect("loads");
        assert_eq!(creds.redirect_uri, "http://localhost:8090");
    }

    #[tokio::test]
    async fn defaults_redirect_uri_when_absent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CREDENTIALS_FILE),
            r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();

        let creds = load_credentials(dir.path()).await.expect("loads");
        assert_eq!(creds.redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[tokio::test]
    async fn missing_file_is_distinct_error() {
        let dir = TempDir::new().unwrap();
        let err = load_credentials(dir.path()).await.expect_err("missing");
        assert!(matches!(err, ConfigError::CredentialsMissing { .. }));
    }

    #[tokio::test]
    async fn unparsable_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "not json").unwrap();
        let err = load_credentials(dir.path()).await.expect_err("corrupt");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
