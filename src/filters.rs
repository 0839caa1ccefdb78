use serde::Serialize;

use crate::client::{GmailClient, GmailClientError};
use crate::token_store::TokenStore;
use crate::types::{Filter, FilterAction, FilterCriteria, ListFiltersResponse};

#[derive(Serialize)]
struct CreateFilterRequest<'a> {
    criteria: &'a FilterCriteria,
    action: &'a FilterAction,
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/settings/filters — unpaginated.
    pub async fn list_filters(&self) -> Result<Vec<Filter>, GmailClientError> {
        let url = self.url("/users/me/settings/filters");
        let response: ListFiltersResponse = self.send_json(|| self.http().get(&url)).await?;
        Ok(response.filters)
    }

    /// GET /users/me/settings/filters/{id}
    pub async fn get_filter(&self, filter_id: &str) -> Result<Filter, GmailClientError> {
        let url = self.url(&format!("/users/me/settings/filters/{filter_id}"));
        self.send_json(|| self.http().get(&url)).await
    }

    /// POST /users/me/settings/filters — filters are immutable once created;
    /// replace by create-then-delete.
    pub async fn create_filter(
        &self,
        criteria: FilterCriteria,
        action: FilterAction,
    ) -> Result<Filter, GmailClientError> {
        let url = self.url("/users/me/settings/filters");
        let payload = CreateFilterRequest {
            criteria: &criteria,
            action: &action,
        };
        self.send_json(|| self.http().post(&url).json(&payload))
            .await
    }

    /// DELETE /users/me/settings/filters/{id}
    pub async fn delete_filter(&self, filter_id: &str) -> Result<(), GmailClientError> {
        let url = self.url(&format!("/users/me/settings/filters/{filter_id}"));
        self.send_unit(|| self.http().delete(&url)).await
    }
}
