use futures::Stream;
use serde::Serialize;

use crate::client::{GmailClient, GmailClientError, paginate};
use crate::mime::build_simple_message;
use crate::token_store::TokenStore;
use crate::types::{ListMessagesResponse, Message, Profile};

/// Response format for message and thread fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageFormat {
    #[default]
    Full,
    Metadata,
    Minimal,
    Raw,
}

impl MessageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
            MessageFormat::Minimal => "minimal",
            MessageFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetMessageOptions {
    pub format: MessageFormat,
    /// Headers to include when `format` is `Metadata`.
    pub metadata_headers: Vec<String>,
}

impl GetMessageOptions {
    pub fn metadata(headers: &[&str]) -> Self {
        Self {
            format: MessageFormat::Metadata,
            metadata_headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageListParams {
    /// Gmail search query, e.g. `is:unread`.
    pub query: Option<String>,
    pub max_results: Option<u32>,
    pub label_ids: Vec<String>,
    pub page_token: Option<String>,
    pub include_spam_trash: bool,
}

/// Outgoing plain-text email for `send_message` and `create_draft`.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Gmail substitutes the authenticated user when absent.
    pub from: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub(crate) raw: &'a str,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub(crate) thread_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ModifyRequest<'a> {
    #[serde(rename = "addLabelIds", skip_serializing_if = "Option::is_none")]
    add_label_ids: Option<&'a [String]>,
    #[serde(rename = "removeLabelIds", skip_serializing_if = "Option::is_none")]
    remove_label_ids: Option<&'a [String]>,
}

#[derive(Serialize)]
struct BatchModifyRequest<'a> {
    ids: &'a [String],
    #[serde(rename = "addLabelIds", skip_serializing_if = "Option::is_none")]
    add_label_ids: Option<&'a [String]>,
    #[serde(rename = "removeLabelIds", skip_serializing_if = "Option::is_none")]
    remove_label_ids: Option<&'a [String]>,
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/profile
    pub async fn get_profile(&self) -> Result<Profile, GmailClientError> {
        let url = self.url("/users/me/profile");
        self.send_json(|| self.http().get(&url)).await
    }

    /// GET /users/me/messages
    pub async fn list_messages(
        &self,
        params: MessageListParams,
    ) -> Result<ListMessagesResponse, GmailClientError> {
        let url = self.url("/users/me/messages");
        self.send_json(|| {
            let mut builder = self.http().get(&url);
            if let Some(query) = params.query.as_deref() {
                builder = builder.query(&[("q", query)]);
            }
            if let Some(max) = params.max_results {
                builder = builder.query(&[("maxResults", max)]);
            }
            for label in &params.label_ids {
                builder = builder.query(&[("labelIds", label)]);
            }
            if let Some(token) = params.page_token.as_deref() {
                builder = builder.query(&[("pageToken", token)]);
            }
            if params.include_spam_trash {
                builder = builder.query(&[("includeSpamTrash", "true")]);
            }
            builder
        })
        .await
    }

    /// Lazily walk every page of a message listing.
    pub fn stream_messages(
        &self,
        params: MessageListParams,
    ) -> impl Stream<Item = Result<ListMessagesResponse, GmailClientError>> + '_ {
        paginate(move |token| {
            let mut params = params.clone();
            params.page_token = token;
            async move { self.list_messages(params).await }
        })
    }

    /// GET /users/me/messages/{id}
    pub async fn get_message(
        &self,
        message_id: &str,
        options: GetMessageOptions,
    ) -> Result<Message, GmailClientError> {
        let url = self.url(&format!("/users/me/messages/{message_id}"));
        self.send_json(|| {
            let mut builder = self
                .http()
                .get(&url)
                .query(&[("format", options.format.as_str())]);
            for header in &options.metadata_headers {
                builder = builder.query(&[("metadataHeaders", header)]);
            }
            builder
        })
        .await
    }

    /// POST /users/me/messages/send — build a plain-text message and send it.
    pub async fn send_message(&self, message: NewMessage) -> Result<Message, GmailClientError> {
        let raw = build_simple_message(
            &message.to,
            &message.subject,
            &message.body,
            message.from.as_deref(),
            message.cc.as_deref(),
            message.bcc.as_deref(),
        )?;
        self.send_raw_message(&raw, message.thread_id.as_deref())
            .await
    }

    /// POST /users/me/messages/send — send a pre-encoded base64url message.
    pub async fn send_raw_message(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<Message, GmailClientError> {
        let url = self.url("/users/me/messages/send");
        let payload = SendMessageRequest { raw, thread_id };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// POST /users/me/messages/{id}/modify
    pub async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: Option<&[String]>,
        remove_label_ids: Option<&[String]>,
    ) -> Result<Message, GmailClientError> {
        let url = self.url(&format!("/users/me/messages/{message_id}/modify"));
        let payload = ModifyRequest {
            add_label_ids,
            remove_label_ids,
        };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// POST /users/me/messages/{id}/trash
    pub async fn trash_message(&self, message_id: &str) -> Result<Message, GmailClientError> {
        let url = self.url(&format!("/users/me/messages/{message_id}/trash"));
        self.send_json(|| self.http().post(&url)).await
    }

    /// POST /users/me/messages/{id}/untrash
    pub async fn untrash_message(&self, message_id: &str) -> Result<Message, GmailClientError> {
        let url = self.url(&format!("/users/me/messages/{message_id}/untrash"));
        self.send_json(|| self.http().post(&url)).await
    }

    /// DELETE /users/me/messages/{id} — permanent, bypasses trash.
    pub async fn delete_message(&self, message_id: &str) -> Result<(), GmailClientError> {
        let url = self.url(&format!("/users/me/messages/{message_id}"));
        self.send_unit(|| self.http().delete(&url)).await
    }

    /// POST /users/me/messages/batchModify
    pub async fn batch_modify_messages(
        &self,
        message_ids: &[String],
        add_label_ids: Option<&[String]>,
        remove_label_ids: Option<&[String]>,
    ) -> Result<(), GmailClientError> {
        let url = self.url("/users/me/messages/batchModify");
        let payload = BatchModifyRequest {
            ids: message_ids,
            add_label_ids,
            remove_label_ids,
        };
        self.send_unit(|| self.http().post(&url).json(&payload))
            .await
    }
}
