use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use crate::types::{Message, MessagePart};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

/// The interesting parts of a `full`-format message, pulled out of the MIME
/// tree: addressing headers plus the first plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParsedMessage {
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub to: Vec<Recipient>,
    pub cc: Vec<Recipient>,
    pub bcc: Vec<Recipient>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub references: Option<String>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
}

pub fn parse_message(message: &Message) -> ParsedMessage {
    let payload = message.payload.as_ref();

    let from = header_value(payload, "From").and_then(|v| parse_recipient(v.trim()));
    let to = header_value(payload, "To")
        .map(|v| parse_recipient_list(&v))
        .unwrap_or_default();
    let cc = header_value(payload, "Cc")
        .map(|v| parse_recipient_list(&v))
        .unwrap_or_default();
    let bcc = header_value(payload, "Bcc")
        .map(|v| parse_recipient_list(&v))
        .unwrap_or_default();
    let subject = header_value(payload, "Subject");
    let message_id = header_value(payload, "Message-ID");
    let references = header_value(payload, "References");

    let mut body_plain = None;
    let mut body_html = None;
    if let Some(part) = payload {
        extract_bodies(part, &mut body_plain, &mut body_html, 0);
    }

    ParsedMessage {
        from_email: from.as_ref().map(|r| r.email.clone()),
        from_name: from.and_then(|r| r.name),
        to,
        cc,
        bcc,
        subject,
        message_id,
        references,
        body_plain,
        body_html,
    }
}

/// Case-insensitive lookup of a header on the top-level payload.
pub fn header_value(payload: Option<&MessagePart>, name: &str) -> Option<String> {
    payload.and_then(|p| {
        p.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    })
}

pub fn parse_recipient_list(value: &str) -> Vec<Recipient> {
    split_addresses(value)
        .into_iter()
        .filter_map(|s| parse_recipient(s.trim()))
        .collect()
}

fn parse_recipient(input: &str) -> Option<Recipient> {
    if input.is_empty() {
        return None;
    }

    if let (Some(start), Some(end)) = (input.find('<'), input.rfind('>')) {
        let email = input[start + 1..end].trim();
        if email.is_empty() {
            return None;
        }
        let name_raw = input[..start].trim();
        let name = if name_raw.is_empty() {
            None
        } else {
            Some(strip_quotes(name_raw))
        };
        return Some(Recipient {
            email: email.to_string(),
            name,
        });
    }

    let trimmed = input.trim().trim_matches('<').trim_matches('>');
    if trimmed.is_empty() {
        None
    } else {
        Some(Recipient {
            email: trimmed.to_string(),
            name: None,
        })
    }
}

fn strip_quotes(input: &str) -> String {
    let stripped = input
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(input);
    // Unescape escaped quotes within the string
    stripped.replace("\\\"", "\"")
}

fn split_addresses(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev_char: Option<char> = None;

    for ch in input.chars() {
        match ch {
            '"' => {
                let is_escaped = prev_char == Some('\\');
                if !is_escaped {
                    in_quotes = !in_quotes;
                }
                current.push(ch);
            }
            ',' if !in_quotes => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
        prev_char = Some(ch);
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

/// Maximum depth for MIME tree traversal to prevent stack overflow from malicious emails
const MAX_MIME_DEPTH: usize = 50;

fn extract_bodies(
    part: &MessagePart,
    body_plain: &mut Option<String>,
    body_html: &mut Option<String>,
    depth: usize,
) {
    if depth > MAX_MIME_DEPTH {
        return;
    }

    if let Some(mime) = part.mime_type.as_deref() {
        if let Some(body) = part.body.as_ref() {
            if let Some(data) = body.data.as_ref() {
                let decoded = decode_body(data);
                match mime {
                    m if m.eq_ignore_ascii_case("text/plain") => {
                        if body_plain.is_none() {
                            *body_plain = decoded;
                        }
                    }
                    m if m.eq_ignore_ascii_case("text/html") => {
                        if body_html.is_none() {
                            *body_html = decoded;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    for child in &part.parts {
        extract_bodies(child, body_plain, body_html, depth + 1);
    }
}

/// Gmail sends base64url, but some producers hand back standard base64.
fn decode_body(data: &str) -> Option<String> {
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(data) {
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }

    if let Ok(bytes) = STANDARD.decode(data) {
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }

    None
}
