use futures::Stream;

use crate::client::{GmailClient, GmailClientError, paginate};
use crate::token_store::TokenStore;
use crate::types::ListHistoryResponse;

#[derive(Debug, Clone, Default)]
pub struct HistoryListParams {
    /// Where to resume from; usually the `history_id` of a previous message
    /// or profile fetch.
    pub start_history_id: String,
    pub label_id: Option<String>,
    /// Subset of `messageAdded`, `messageDeleted`, `labelAdded`,
    /// `labelRemoved`. Empty means all.
    pub history_types: Vec<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl HistoryListParams {
    pub fn starting_from(start_history_id: impl Into<String>) -> Self {
        Self {
            start_history_id: start_history_id.into(),
            ..Default::default()
        }
    }
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/history — incremental changes since a known history ID.
    /// A 404 means the ID is too old and the caller must do a full resync.
    pub async fn list_history(
        &self,
        params: HistoryListParams,
    ) -> Result<ListHistoryResponse, GmailClientError> {
        let url = self.url("/users/me/history");
        self.send_json(|| {
            let mut builder = self
                .http()
                .get(&url)
                .query(&[("startHistoryId", params.start_history_id.as_str())]);
            if let Some(label) = params.label_id.as_deref() {
                builder = builder.query(&[("labelId", label)]);
            }
            for history_type in &params.history_types {
                builder = builder.query(&[("historyTypes", history_type)]);
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

    /// Lazily walk every page of a history listing.
    pub fn stream_history(
        &self,
        params: HistoryListParams,
    ) -> impl Stream<Item = Result<ListHistoryResponse, GmailClientError>> + '_ {
        paginate(move |token| {
            let mut params = params.clone();
            params.page_token = token;
            async move { self.list_history(params).await }
        })
    }
}
