use std::convert::Infallible;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::oauth::OAuthTokens;

/// Persistence hook invoked whenever the client obtains a new token pair
/// (after a refresh or an interactive authorization).
#[async_trait]
pub trait TokenStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn save_tokens(&self, tokens: &OAuthTokens) -> Result<(), Self::Error>;
}

/// Store that discards tokens. Useful when the caller manages persistence.
#[derive(Debug, Clone, Default)]
pub struct NoopTokenStore;

#[async_trait]
impl TokenStore for NoopTokenStore {
    type Error = Infallible;

    async fn save_tokens(&self, _tokens: &OAuthTokens) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("no token file for this account: {path} (run authorize first)")]
    Missing { path: PathBuf },
    #[error("token file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("token file io error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One account's token file under the secrets directory:
/// `{secrets_dir}/gmail-{account}.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    secrets_dir: PathBuf,
    account: String,
}

impl FileTokenStore {
    pub fn new(secrets_dir: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            secrets_dir: secrets_dir.into(),
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn path(&self) -> PathBuf {
        self.secrets_dir.join(format!("gmail-{}.json", self.account))
    }

    /// Read and parse the token file. `Missing` and `Corrupt` are distinct
    /// failures: the first means the account was never authorized, the second
    /// that the file exists but cannot be trusted.
    pub async fn load(&self) -> Result<OAuthTokens, TokenStoreError> {
        let path = self.path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TokenStoreError::Missing { path });
            }
            Err(source) => return Err(TokenStoreError::Io { path, source }),
        };

        serde_json::from_str(&contents).map_err(|source| TokenStoreError::Corrupt { path, source })
    }

    /// Serialize the tokens to a sibling temp file and rename it over the
    /// target, so a crash mid-write never leaves a truncated token file.
    pub async fn save(&self, tokens: &OAuthTokens) -> Result<(), TokenStoreError> {
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(tokens).map_err(|source| TokenStoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        write_private(&tmp, &body)
            .await
            .map_err(|source| TokenStoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| TokenStoreError::Io { path, source })
    }
}

#[cfg(unix)]
async fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, body).await
}

#[async_trait]
impl TokenStore for FileTokenStore {
    type Error = TokenStoreError;

    async fn save_tokens(&self, tokens: &OAuthTokens) -> Result<(), Self::Error> {
        self.save(tokens).await
    }
}
