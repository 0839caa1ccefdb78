use futures::Stream;
use serde::Serialize;

use crate::client::{GmailClient, GmailClientError, paginate};
use crate::messages::{GetMessageOptions, NewMessage, SendMessageRequest};
use crate::mime::build_simple_message;
use crate::token_store::TokenStore;
use crate::types::{Draft, ListDraftsResponse, Message};

#[derive(Debug, Clone, Default)]
pub struct DraftListParams {
    pub query: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

#[derive(Serialize)]
struct DraftRequest<'a> {
    message: SendMessageRequest<'a>,
}

#[derive(Serialize)]
struct SendDraftRequest<'a> {
    id: &'a str,
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/drafts
    pub async fn list_drafts(
        &self,
        params: DraftListParams,
    ) -> Result<ListDraftsResponse, GmailClientError> {
        let url = self.url("/users/me/drafts");
        self.send_json(|| {
            let mut builder = self.http().get(&url);
            if let Some(query) = params.query.as_deref() {
                builder = builder.query(&[("q", query)]);
            }
            if let Some(max) = params.max_results {
                builder = builder.query(&[("maxResults", max)]);
            }
            if let Some(token) = params.page_token.as_deref() {
                builder = builder.query(&[("pageToken", token)]);
            }
            builder
        })
        .await
    }

    /// Lazily walk every page of a draft listing.
    pub fn stream_drafts(
        &self,
        params: DraftListParams,
    ) -> impl Stream<Item = Result<ListDraftsResponse, GmailClientError>> + '_ {
        paginate(move |token| {
            let mut params = params.clone();
            params.page_token = token;
            async move { self.list_drafts(params).await }
        })
    }

    /// GET /users/me/drafts/{id}
    pub async fn get_draft(
        &self,
        draft_id: &str,
        options: GetMessageOptions,
    ) -> Result<Draft, GmailClientError> {
        let url = self.url(&format!("/users/me/drafts/{draft_id}"));
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

    /// POST /users/me/drafts — build a plain-text draft.
    pub async fn create_draft(&self, message: NewMessage) -> Result<Draft, GmailClientError> {
        let raw = build_simple_message(
            &message.to,
            &message.subject,
            &message.body,
            message.from.as_deref(),
            message.cc.as_deref(),
            message.bcc.as_deref(),
        )?;
        self.create_raw_draft(&raw, message.thread_id.as_deref())
            .await
    }

    /// POST /users/me/drafts — create a draft from a pre-encoded base64url
    /// message.
    pub async fn create_raw_draft(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<Draft, GmailClientError> {
        let url = self.url("/users/me/drafts");
        let payload = DraftRequest {
            message: SendMessageRequest { raw, thread_id },
        };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// PUT /users/me/drafts/{id} — replace the draft's content.
    pub async fn update_draft(
        &self,
        draft_id: &str,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<Draft, GmailClientError> {
        let url = self.url(&format!("/users/me/drafts/{draft_id}"));
        let payload = DraftRequest {
            message: SendMessageRequest { raw, thread_id },
        };
        self.send_json(|| self.http().put(&url).json(&payload))
            .await
    }

    /// POST /users/me/drafts/send — send an existing draft. The draft is
    /// consumed and the sent message comes back.
    pub async fn send_draft(&self, draft_id: &str) -> Result<Message, GmailClientError> {
        let url = self.url("/users/me/drafts/send");
        let payload = SendDraftRequest { id: draft_id };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// DELETE /users/me/drafts/{id}
    pub async fn delete_draft(&self, draft_id: &str) -> Result<(), GmailClientError> {
        let url = self.url(&format!("/users/me/drafts/{draft_id}"));
        self.send_unit(|| self.http().delete(&url)).await
    }
}
