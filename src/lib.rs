//! Async Gmail REST client with file-backed OAuth sessions.
//!
//! Each [`GmailClient`] wraps one account: it holds the account's token pair,
//! refreshes the access token before it lapses (coalescing concurrent
//! refreshes into one), persists rotated tokens through a [`TokenStore`], and
//! retries transient failures with jittered backoff. Resource operations
//! (messages, threads, drafts, labels, attachments, filters, vacation
//! settings, history) live in their own modules as `impl` blocks on the
//! client.
//!
//! ```no_run
//! use gmail_sdk::GmailClient;
//! use gmail_sdk::messages::MessageListParams;
//!
//! # async fn demo() -> Result<(), gmail_sdk::GmailClientError> {
//! let client = GmailClient::for_account("work", None).await?;
//! let unread = client
//!     .list_messages(MessageListParams {
//!         query: Some("is:unread".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} unread messages", unread.messages.len());
//! # Ok(())
//! # }
//! ```
//!
//! First-time setup for an account goes through [`authorize`], which runs the
//! browser consent flow and writes the token file that
//! [`GmailClient::for_account`] later loads.

pub mod attachments;
pub mod authorize;
pub mod client;
pub mod config;
pub mod convenience;
pub mod drafts;
pub mod filters;
pub mod history;
pub mod labels;
pub mod messages;
pub mod mime;
pub mod oauth;
pub mod parser;
pub mod settings;
pub mod threads;
pub mod token_store;
pub mod types;

pub use authorize::{AuthorizeError, AuthorizeOptions, authorize, authorize_with_code};
pub use client::{DEFAULT_API_BASE, GmailClient, GmailClientError, Page, RetryPolicy};
pub use config::{Credentials, load_credentials, resolve_secrets_dir};
pub use messages::{GetMessageOptions, MessageFormat, MessageListParams, NewMessage};
pub use oauth::{OAuthError, OAuthTokens, SCOPES};
pub use parser::{ParsedMessage, parse_message};
pub use token_store::{FileTokenStore, NoopTokenStore, TokenStore, TokenStoreError};
