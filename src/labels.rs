use serde::Serialize;

use crate::client::{GmailClient, GmailClientError};
use crate::token_store::TokenStore;
use crate::types::{Label, LabelColor, ListLabelsResponse};

/// Fields accepted when creating or patching a label.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "labelListVisibility", skip_serializing_if = "Option::is_none")]
    pub label_list_visibility: Option<String>,
    #[serde(
        rename = "messageListVisibility",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_list_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
}

impl LabelSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/labels — system and user labels, unpaginated.
    pub async fn list_labels(&self) -> Result<Vec<Label>, GmailClientError> {
        let url = self.url("/users/me/labels");
        let response: ListLabelsResponse = self.send_json(|| self.http().get(&url)).await?;
        Ok(response.labels)
    }

    /// GET /users/me/labels/{id} — includes message/thread counts.
    pub async fn get_label(&self, label_id: &str) -> Result<Label, GmailClientError> {
        let url = self.url(&format!("/users/me/labels/{label_id}"));
        self.send_json(|| self.http().get(&url)).await
    }

    /// POST /users/me/labels
    pub async fn create_label(&self, settings: LabelSettings) -> Result<Label, GmailClientError> {
        let url = self.url("/users/me/labels");
        self.send_json(|| self.http().post(&url).json(&settings))
            .await
    }

    /// PATCH /users/me/labels/{id} — partial update, unset fields are left
    /// alone.
    pub async fn update_label(
        &self,
        label_id: &str,
        settings: LabelSettings,
    ) -> Result<Label, GmailClientError> {
        let url = self.url(&format!("/users/me/labels/{label_id}"));
        self.send_json(|| self.http().patch(&url).json(&settings))
            .await
    }

    /// DELETE /users/me/labels/{id} — the label is removed from every message
    /// that carries it.
    pub async fn delete_label(&self, label_id: &str) -> Result<(), GmailClientError> {
        let url = self.url(&format!("/users/me/labels/{label_id}"));
        self.send_unit(|| self.http().delete(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_labels_unwraps_collection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "labels": [
                    { "id": "INBOX", "name": "INBOX", "type": "system" },
                    { "id": "Label_1", "name": "Receipts", "type": "user" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let labels = client.list_labels().await.expect("list labels");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label_type.as_deref(), Some("system"));
        assert_eq!(labels[1].name, "Receipts");
    }

    #[tokio::test]
    async fn create_label_posts_only_set_fields() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/labels"))
            .and(body_json(json!({"name": "Receipts"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "Label_1",
                "name": "Receipts",
                "type": "user"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let label = client
            .create_label(LabelSettings::named("Receipts"))
            .await
            .expect("create label");

        assert_eq!(label.id, "Label_1");
    }

    #[tokio::test]
    async fn update_label_patches_partial_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/gmail/v1/users/me/labels/Label_1"))
            .and(body_partial_json(json!({
                "color": { "backgroundColor": "#fb4c2f" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "Label_1",
                "name": "Receipts",
                "color": { "backgroundColor": "#fb4c2f", "textColor": "#ffffff" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let label = client
            .update_label(
                "Label_1",
                LabelSettings {
                    color: Some(LabelColor {
                        background_color: Some("#fb4c2f".into()),
                        text_color: Some("#ffffff".into()),
                    }),
                    ..Default::default()
                },
            )
            .await
            .expect("update label");

        assert_eq!(
            label.color.and_then(|c| c.background_color).as_deref(),
            Some("#fb4c2f")
        );
    }

    #[tokio::test]
    async fn delete_label_handles_no_content() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/gmail/v1/users/me/labels/Label_1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        client.delete_label("Label_1").await.expect("delete label");
    }
}
