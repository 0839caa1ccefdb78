use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mail_builder::MessageBuilder;
use mail_builder::headers::address::Address;
use mail_builder::headers::message_id::MessageId;
use thiserror::Error;

/// Simple representation of an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub email: String,
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(name: Option<impl Into<String>>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.map(|n| n.into()),
        }
    }
}

impl From<&str> for EmailAddress {
    fn from(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
        }
    }
}

impl From<String> for EmailAddress {
    fn from(email: String) -> Self {
        Self { email, name: None }
    }
}

/// Binary attachment to include in an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// High-level MIME message builder. `from` may be left unset; Gmail fills in
/// the authenticated user's address when the header is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeMessage {
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub subject: Option<String>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub attachments: Vec<MimeAttachment>,
}

impl MimeMessage {
    /// Build the RFC 5322 message as a string.
    pub fn to_rfc822(self) -> Result<String, MimeBuildError> {
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(MimeBuildError::MissingRecipients);
        }

        if self.body_plain.is_none() && self.body_html.is_none() && self.attachments.is_empty() {
            return Err(MimeBuildError::MissingBody);
        }

        let mut builder = MessageBuilder::new();

        if let Some(from) = self.from.as_ref() {
            builder = builder.from(to_header_address(from));
        }
        if !self.to.is_empty() {
            builder = builder.to(address_list(&self.to));
        }
        if !self.cc.is_empty() {
            builder = builder.cc(address_list(&self.cc));
        }
        if !self.bcc.is_empty() {
            builder = builder.bcc(address_list(&self.bcc));
        }
        if let Some(subject) = self.subject.as_ref() {
            builder = builder.subject(subject.as_str());
        }
        if let Some(body) = self.body_plain.as_ref() {
            builder = builder.text_body(body.as_str());
        }
        if let Some(body) = self.body_html.as_ref() {
            builder = builder.html_body(body.as_str());
        }

        if let Some(in_reply_to) = self
            .in_reply_to
            .as_ref()
            .and_then(|id| normalize_message_id(id))
        {
            builder = builder.in_reply_to(MessageId::new(in_reply_to.clone()));
            builder = builder.references(MessageId::from(combined_references(
                &self.references,
                Some(&in_reply_to),
            )));
        } else if !self.references.is_empty() {
            builder =
                builder.references(MessageId::from(combined_references(&self.references, None)));
        }

        for attachment in self.attachments {
            let content_type = if attachment.content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                attachment.content_type.clone()
            };
            builder = builder.attachment(
                content_type,
                attachment.filename.clone(),
                attachment.data.clone(),
            );
        }

        builder.write_to_string().map_err(MimeBuildError::Io)
    }

    /// Build the message and return it base64url encoded for the Gmail API.
    pub fn to_base64_url(self) -> Result<String, MimeBuildError> {
        let raw = self.to_rfc822()?;
        Ok(URL_SAFE_NO_PAD.encode(raw.as_bytes()))
    }
}

#[derive(Debug, Error)]
pub enum MimeBuildError {
    #[error("at least one recipient is required")]
    MissingRecipients,
    #[error("a body or attachment is required")]
    MissingBody,
    #[error("failed to build message: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a plain-text email, the workhorse behind `send_message` and
/// `create_draft`. Recipient arguments are comma-separated address lists.
pub fn build_simple_message(
    to: &str,
    subject: &str,
    body: &str,
    from: Option<&str>,
    cc: Option<&str>,
    bcc: Option<&str>,
) -> Result<String, MimeBuildError> {
    let message = MimeMessage {
        from: from.map(EmailAddress::from),
        to: parse_address_list(to),
        cc: cc.map(parse_address_list).unwrap_or_default(),
        bcc: bcc.map(parse_address_list).unwrap_or_default(),
        subject: Some(subject.to_string()),
        body_plain: Some(body.to_string()),
        ..Default::default()
    };
    message.to_base64_url()
}

/// Split a comma-separated header value into addresses, respecting quoted
/// display names that contain commas.
pub fn parse_address_list(value: &str) -> Vec<EmailAddress> {
    crate::parser::parse_recipient_list(value)
        .into_iter()
        .map(|r| EmailAddress {
            email: r.email,
            name: r.name,
        })
        .collect()
}

/// Prefix a subject with `Re: ` unless it already carries one.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"))
    {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

/// Prefix a subject with `Fwd: ` unless it already carries one.
pub fn forward_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..4)
        .is_some_and(|p| p.eq_ignore_ascii_case("fwd:"))
    {
        trimmed.to_string()
    } else {
        format!("Fwd: {trimmed}")
    }
}

fn to_header_address(addr: &EmailAddress) -> Address<'static> {
    Address::new_address(addr.name.clone(), addr.email.clone())
}

fn address_list(addrs: &[EmailAddress]) -> Address<'static> {
    let list: Vec<Address<'static>> = addrs.iter().map(to_header_address).collect();
    Address::new_list(list)
}

/// Normalize a message ID by removing surrounding whitespace and angle brackets.
/// Returns `None` if the result is empty.
pub fn normalize_message_id(id: &str) -> Option<String> {
    let trimmed = id.trim().trim_matches('<').trim_matches('>');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Deduplicate a list of message IDs, normalizing each one first.
/// Preserves order, keeping the first occurrence of each unique ID.
pub fn dedup_message_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        if let Some(normalized) = normalize_message_id(&id) {
            if !seen.iter().any(|existing: &String| existing == &normalized) {
                seen.push(normalized);
            }
        }
    }
    seen
}

fn combined_references(existing: &[String], in_reply_to: Option<&str>) -> Vec<String> {
    let mut all_ids: Vec<String> = existing.to_vec();
    if let Some(reply) = in_reply_to {
        all_ids.push(reply.to_string());
    }
    dedup_message_ids(all_ids)
}
