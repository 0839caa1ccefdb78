use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use crate::client::{GmailClient, GmailClientError};
use crate::token_store::TokenStore;
use crate::types::{Attachment, AttachmentBody};

/// Gmail returns base64url, but accept standard base64 too.
pub(crate) fn decode_attachment_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    match URL_SAFE_NO_PAD.decode(data) {
        Ok(bytes) => Ok(bytes),
        Err(err) => STANDARD.decode(data).map_err(|_| err),
    }
}

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/messages/{messageId}/attachments/{id} — the body comes
    /// back already decoded to raw bytes.
    pub async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Attachment, GmailClientError> {
        let url = self.url(&format!(
            "/users/me/messages/{message_id}/attachments/{attachment_id}"
        ));
        let body: AttachmentBody = self.send_json(|| self.http().get(&url)).await?;

        let data = match body.data.as_deref() {
            Some(encoded) => decode_attachment_data(encoded)?,
            None => Vec::new(),
        };
        Ok(Attachment {
            size: body.size,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::*;
    use base64::Engine;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn attachment_body_is_decoded_from_base64url() {
        let server = MockServer::start().await;
        let payload = b"%PDF-1.4 fake attachment bytes\xff\xfe";

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1/attachments/att1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": payload.len(),
                "data": URL_SAFE_NO_PAD.encode(payload)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let attachment = client
            .get_attachment("m1", "att1")
            .await
            .expect("attachment loads");

        assert_eq!(attachment.size as usize, payload.len());
        assert_eq!(attachment.data, payload);
    }

    #[tokio::test]
    async fn attachment_falls_back_to_standard_base64() {
        let server = MockServer::start().await;
        // Bytes whose encoding needs '+' or '/' in the standard alphabet.
        let payload: Vec<u8> = vec![0xfb, 0xff, 0xbf, 0xef];
        let encoded = STANDARD.encode(&payload);
        assert!(encoded.contains('+') || encoded.contains('/') || encoded.contains('='));

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1/attachments/att1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": payload.len(),
                "data": encoded
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let attachment = client
            .get_attachment("m1", "att1")
            .await
            .expect("attachment loads");

        assert_eq!(attachment.data, payload);
    }

    #[tokio::test]
    async fn missing_data_yields_empty_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1/attachments/att1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "size": 0 })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let attachment = client
            .get_attachment("m1", "att1")
            .await
            .expect("attachment loads");

        assert!(attachment.data.is_empty());
    }

    #[tokio::test]
    async fn undecodable_data_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1/attachments/att1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 4,
                "data": "!!not base64!!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let err = client
            .get_attachment("m1", "att1")
            .await
            .expect_err("bad data");
        assert!(matches!(err, crate::client::GmailClientError::Base64(_)));
    }
}
