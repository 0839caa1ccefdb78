//! Shortcuts built on the message operations: threading-aware replies,
//! forwards, and the common label flips.

use crate::client::{GmailClient, GmailClientError};
use crate::messages::GetMessageOptions;
use crate::mime::{EmailAddress, MimeMessage, forward_subject, parse_address_list, reply_subject};
use crate::parser::{Recipient, header_value, parse_message};
use crate::token_store::TokenStore;
use crate::types::Message;

const FORWARD_SEPARATOR: &str = "---------- Forwarded message ----------";

impl<S: TokenStore> GmailClient<S> {
    /// Reply to the original sender only. Threading headers and the thread ID
    /// are carried over so Gmail groups the reply with the original.
    pub async fn reply(&self, message_id: &str, body: &str) -> Result<Message, GmailClientError> {
        self.reply_inner(message_id, body, false).await
    }

    /// Reply to the sender plus every other recipient, excluding the
    /// authenticated user's own address.
    pub async fn reply_all(
        &self,
        message_id: &str,
        body: &str,
    ) -> Result<Message, GmailClientError> {
        self.reply_inner(message_id, body, true).await
    }

    async fn reply_inner(
        &self,
        message_id: &str,
        body: &str,
        include_all: bool,
    ) -> Result<Message, GmailClientError> {
        // Headers are all a reply needs; skip the body payload.
        let original = self
            .get_message(
                message_id,
                GetMessageOptions::metadata(&[
                    "From", "To", "Cc", "Reply-To", "Subject", "Message-ID", "References",
                ]),
            )
            .await?;
        let parsed = parse_message(&original);

        // Honor Reply-To when the sender set one.
        let reply_to = header_value(original.payload.as_ref(), "Reply-To")
            .map(|v| crate::parser::parse_recipient_list(&v))
            .unwrap_or_default();

        let mut to: Vec<EmailAddress> = Vec::new();
        if !reply_to.is_empty() {
            for recipient in &reply_to {
                to.push(EmailAddress {
                    email: recipient.email.clone(),
                    name: recipient.name.clone(),
                });
            }
        } else if let Some(email) = parsed.from_email.clone() {
            to.push(EmailAddress {
                email,
                name: parsed.from_name.clone(),
            });
        }

        let mut cc: Vec<EmailAddress> = Vec::new();
        if include_all {
            let own_address = self.get_profile().await?.email_address;
            extend_recipients(&mut to, &parsed.to, &own_address);
            let mut others = to.clone();
            extend_recipients(&mut others, &parsed.cc, &own_address);
            cc = others.split_off(to.len());
        }

        let references = parsed
            .references
            .as_deref()
            .map(|r| r.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let mime = MimeMessage {
            to,
            cc,
            subject: Some(reply_subject(parsed.subject.as_deref().unwrap_or(""))),
            body_plain: Some(body.to_string()),
            in_reply_to: parsed.message_id.clone(),
            references,
            ..Default::default()
        };
        let raw = mime.to_base64_url()?;
        self.send_raw_message(&raw, original.thread_id.as_deref())
            .await
    }

    /// Forward a message as quoted plain text, with an optional note above
    /// the quoted block. Starts a new thread.
    pub async fn forward(
        &self,
        message_id: &str,
        to: &str,
        note: Option<&str>,
    ) -> Result<Message, GmailClientError> {
        let original = self
            .get_message(message_id, GetMessageOptions::default())
            .await?;
        let parsed = parse_message(&original);
        let date = header_value(original.payload.as_ref(), "Date");

        let mut body = String::new();
        if let Some(note) = note {
            body.push_str(note);
            body.push_str("\n\n");
        }
        body.push_str(FORWARD_SEPARATOR);
        body.push('\n');
        if let Some(from) = format_sender(&parsed.from_name, &parsed.from_email) {
            body.push_str(&format!("From: {from}\n"));
        }
        if let Some(date) = date.as_deref() {
            body.push_str(&format!("Date: {date}\n"));
        }
        if let Some(subject) = parsed.subject.as_deref() {
            body.push_str(&format!("Subject: {subject}\n"));
        }
        if !parsed.to.is_empty() {
            body.push_str(&format!("To: {}\n", format_recipients(&parsed.to)));
        }
        body.push('\n');
        body.push_str(parsed.body_plain.as_deref().unwrap_or(""));

        let mime = MimeMessage {
            to: parse_address_list(to),
            subject: Some(forward_subject(parsed.subject.as_deref().unwrap_or(""))),
            body_plain: Some(body),
            ..Default::default()
        };
        let raw = mime.to_base64_url()?;
        self.send_raw_message(&raw, None).await
    }

    /// Remove the `UNREAD` label.
    pub async fn mark_as_read(&self, message_id: &str) -> Result<Message, GmailClientError> {
        self.modify_message(message_id, None, Some(&["UNREAD".to_string()]))
            .await
    }

    /// Add the `UNREAD` label back.
    pub async fn mark_as_unread(&self, message_id: &str) -> Result<Message, GmailClientError> {
        self.modify_message(message_id, Some(&["UNREAD".to_string()]), None)
            .await
    }

    /// Remove the `INBOX` label, leaving the message under All Mail.
    pub async fn archive(&self, message_id: &str) -> Result<Message, GmailClientError> {
        self.modify_message(message_id, None, Some(&["INBOX".to_string()]))
            .await
    }
}

fn extend_recipients(into: &mut Vec<EmailAddress>, from: &[Recipient], own_address: &str) {
    for recipient in from {
        if recipient.email.eq_ignore_ascii_case(own_address) {
            continue;
        }
        if into
            .iter()
            .any(|a| a.email.eq_ignore_ascii_case(&recipient.email))
        {
            continue;
        }
        into.push(EmailAddress {
            email: recipient.email.clone(),
            name: recipient.name.clone(),
        });
    }
}

fn format_sender(name: &Option<String>, email: &Option<String>) -> Option<String> {
    let email = email.as_deref()?;
    Some(match name.as_deref() {
        Some(name) => format!("{name} <{email}>"),
        None => email.to_string(),
    })
}

fn format_recipients(recipients: &[Recipient]) -> String {
    recipients
        .iter()
        .map(|r| match r.name.as_deref() {
            Some(name) => format!("{name} <{}>", r.email),
            None => r.email.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn original_message_json(to_header: &str) -> serde_json::Value {
        json!({
            "id": "m1",
            "threadId": "t1",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    { "name": "From", "value": "Alice <alice@example.com>" },
                    { "name": "To", "value": to_header },
                    { "name": "Cc", "value": "carol@example.com" },
                    { "name": "Subject", "value": "Hello" },
                    { "name": "Date", "value": "Mon, 1 Jan 2024 10:00:00 +0000" },
                    { "name": "Message-ID", "value": "<orig@mail.example.com>" }
                ],
                "body": {
                    "size": 13,
                    "data": URL_SAFE_NO_PAD.encode("Original body")
                }
            }
        })
    }

    async fn sent_raw_mime(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        let send = requests
            .iter()
            .find(|r| r.url.path().ends_with("/messages/send"))
            .expect("send request recorded");
        let body: serde_json::Value = serde_json::from_slice(&send.body).unwrap();
        let raw = URL_SAFE_NO_PAD
            .decode(body["raw"].as_str().unwrap())
            .unwrap();
        String::from_utf8(raw).unwrap()
    }

    #[tokio::test]
    async fn reply_threads_onto_the_original() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(original_message_json("me@example.com")),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(body_partial_json(json!({"threadId": "t1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m2",
                "threadId": "t1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let sent = client.reply("m1", "Thanks!").await.expect("reply");
        assert_eq!(sent.thread_id.as_deref(), Some("t1"));

        let mime = sent_raw_mime(&server).await;
        assert!(mime.contains("alice@example.com"));
        assert!(mime.contains("Subject: Re: Hello"));
        assert!(mime.contains("In-Reply-To: <orig@mail.example.com>"));
        assert!(mime.contains("Thanks!"));
        // Sender-only reply ignores the other recipients.
        assert!(!mime.contains("carol@example.com"));
    }

    #[tokio::test]
    async fn reply_prefers_reply_to_header() {
        let server = MockServer::start().await;

        let mut original = original_message_json("me@example.com");
        original["payload"]["headers"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "name": "Reply-To", "value": "list@example.com" }));

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(original))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m2",
                "threadId": "t1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        client.reply("m1", "Thanks!").await.expect("reply");

        let mime = sent_raw_mime(&server).await;
        assert!(mime.contains("To: <list@example.com>") || mime.contains("list@example.com"));
        assert!(!mime.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn reply_all_includes_everyone_but_self() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(original_message_json(
                "me@example.com, Bob <bob@example.com>",
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emailAddress": "me@example.com",
                "historyId": "1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m2",
                "threadId": "t1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        client.reply_all("m1", "Thanks all!").await.expect("reply all");

        let mime = sent_raw_mime(&server).await;
        assert!(mime.contains("alice@example.com"));
        assert!(mime.contains("bob@example.com"));
        assert!(mime.contains("Cc:"));
        assert!(mime.contains("carol@example.com"));
        assert!(!mime.contains("me@example.com"));
    }

    #[tokio::test]
    async fn forward_quotes_original_and_starts_new_thread() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(original_message_json("me@example.com")),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m3",
                "threadId": "t-new"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        client
            .forward("m1", "dave@example.com", Some("FYI"))
            .await
            .expect("forward");

        let requests = server.received_requests().await.unwrap();
        let send = requests
            .iter()
            .find(|r| r.url.path().ends_with("/messages/send"))
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&send.body).unwrap();
        // Forwards do not thread onto the original.
        assert!(body.get("threadId").is_none());

        let mime = sent_raw_mime(&server).await;
        assert!(mime.contains("dave@example.com"));
        assert!(mime.contains("Subject: Fwd: Hello"));
        assert!(mime.contains("FYI"));
        assert!(mime.contains(FORWARD_SEPARATOR));
        assert!(mime.contains("From: Alice <alice@example.com>"));
        assert!(mime.contains("Original body"));
    }

    #[tokio::test]
    async fn read_state_helpers_flip_the_unread_label() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/m1/modify"))
            .and(body_partial_json(json!({"removeLabelIds": ["UNREAD"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "labelIds": ["INBOX"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let message = client.mark_as_read("m1").await.expect("mark as read");
        assert_eq!(message.label_ids, vec!["INBOX"]);
    }

    #[tokio::test]
    async fn archive_removes_inbox_label() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/m1/modify"))
            .and(body_partial_json(json!({"removeLabelIds": ["INBOX"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "labelIds": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let client = make_client(&server, fresh_tokens(), store);

        let message = client.archive("m1").await.expect("archive");
        assert!(message.label_ids.is_empty());
    }
}
