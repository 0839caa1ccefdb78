use futures::Stream;
use serde::Serialize;

use crate::client::{GmailClient, GmailClientError, paginate};
use crate::messages::GetMessageOptions;
use crate::token_store::TokenStore;
use crate::types::{ListThreadsResponse, Thread};

#[derive(Debug, Clone, Default)]
pub struct ThreadListParams {
    pub query: Option<String>,
    pub max_results: Option<u32>,
    pub label_ids: Vec<String>,
    pub page_token: Option<String>,
    pub include_spam_trash: bool,
}

#[derive(Serialize)]
struct ModifyThreadRequest<'a> {
    #[serde(rename = "addLabelIds", skip_serializing_if = "Option::is_none")]
    add_label_ids: Option<&'a [String]>,
    #[serde(rename = "removeLabelIds", skip_serializing_if = "Option::is_none")]
    remove_label_ids: Option<&'a [String]>,
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/threads
    pub async fn list_threads(
        &self,
        params: ThreadListParams,
    ) -> Result<ListThreadsResponse, GmailClientError> {
        let url = self.url("/users/me/threads");
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

    /// Lazily walk every page of a thread listing.
    pub fn stream_threads(
        &self,
        params: ThreadListParams,
    ) -> impl Stream<Item = Result<ListThreadsResponse, GmailClientError>> + '_ {
        paginate(move |token| {
            let mut params = params.clone();
            params.page_token = token;
            async move { self.list_threads(params).await }
        })
    }

    /// GET /users/me/threads/{id} — all messages in the conversation.
    pub async fn get_thread(
        &self,
        thread_id: &str,
        options: GetMessageOptions,
    ) -> Result<Thread, GmailClientError> {
        let url = self.url(&format!("/users/me/threads/{thread_id}"));
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

    /// POST /users/me/threads/{id}/modify — applies to every message in the
    /// thread.
    pub async fn modify_thread(
        &self,
        thread_id: &str,
        add_label_ids: Option<&[String]>,
        remove_label_ids: Option<&[String]>,
    ) -> Result<Thread, GmailClientError> {
        let url = self.url(&format!("/users/me/threads/{thread_id}/modify"));
        let payload = ModifyThreadRequest {
            add_label_ids,
            remove_label_ids,
        };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// POST /users/me/threads/{id}/trash
    pub async fn trash_thread(&self, thread_id: &str) -> Result<Thread, GmailClientError> {
        let url = self.url(&format!("/users/me/threads/{thread_id}/trash"));
        self.send_json(|| self.http().post(&url)).await
    }

    /// POST /users/me/threads/{id}/untrash
    pub async fn untrash_thread(&self, thread_id: &str) -> Result<Thread, GmailClientError> {
        let url = self.url(&format!("/users/me/threads/{thread_id}/untrash"));
        self.send_json(|| self.http().post(&url)).await
    }

    /// DELETE /users/me/threads/{id} — permanent, bypasses trash.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), GmailClientError> {
        let url = self.url(&format!("/users/me/threads/{thread_id}"));
        self.send_unit(|| self.http().delete(&url)).await
    }
}
