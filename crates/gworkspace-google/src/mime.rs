//! RFC 2822 message assembly for Gmail `raw` payloads, and recovery of the
//! plain-text body and headers from Gmail's parsed message format.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// URL-safe alphabet that accepts input with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub const NO_SUBJECT: &str = "(No Subject)";

/// A plain-text email. Empty address lists produce no header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub in_reply_to: Option<String>,
    pub body: String,
}

impl OutgoingMessage {
    /// Serialize to RFC 2822 with a base64 transfer-encoded UTF-8 body.
    pub fn to_rfc2822(&self) -> String {
        let mut headers = Vec::new();
        headers.push("MIME-Version: 1.0".to_string());
        headers.push("Content-Type: text/plain; charset=\"utf-8\"".to_string());
        headers.push("Content-Transfer-Encoding: base64".to_string());

        if let Some(from) = &self.from {
            headers.push(format!("From: {}", single_line(from)));
        }
        if !self.to.is_empty() {
            headers.push(format!("To: {}", single_line(&self.to.join(", "))));
        }
        if !self.cc.is_empty() {
            headers.push(format!("Cc: {}", single_line(&self.cc.join(", "))));
        }
        if !self.bcc.is_empty() {
            headers.push(format!("Bcc: {}", single_line(&self.bcc.join(", "))));
        }
        headers.push(format!("Subject: {}", encode_header_value(&single_line(&self.subject))));
        if let Some(reply_to) = &self.in_reply_to {
            let reply_to = single_line(reply_to);
            headers.push(format!("In-Reply-To: {}", reply_to));
            headers.push(format!("References: {}", reply_to));
        }

        let encoded_body = STANDARD.encode(self.body.as_bytes());
        let wrapped: Vec<&str> = encoded_body
            .as_bytes()
            .chunks(76)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok())
            .collect();

        format!("{}\r\n\r\n{}\r\n", headers.join("\r\n"), wrapped.join("\r\n"))
    }

    /// Base64url form expected by Gmail's `raw` field.
    pub fn to_raw(&self) -> String {
        URL_SAFE_LENIENT.encode(self.to_rfc2822().as_bytes())
    }
}

/// Subject line with the `Re: ` prefix applied when replying.
pub fn reply_subject(subject: Option<&str>, replying: bool) -> String {
    let subject = match subject.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NO_SUBJECT.to_string(),
    };
    if replying && !subject.to_ascii_lowercase().starts_with("re:") {
        format!("Re: {}", subject)
    } else {
        subject
    }
}

/// Join the lines of a header value with single spaces so it cannot start a new header.
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Decode Gmail's base64url body data.
pub fn decode_body_data(data: &str) -> Option<String> {
    let bytes = URL_SAFE_LENIENT.decode(data.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// First `text/plain` body found in a message payload, searching nested parts.
pub fn plain_text_body(payload: &Value) -> Option<String> {
    let mime_type = payload.get("mimeType").and_then(|v| v.as_str()).unwrap_or("");
    let data = payload.get("body").and_then(|b| b.get("data")).and_then(|v| v.as_str());

    if let Some(data) = data {
        if mime_type.is_empty() || mime_type == "text/plain" {
            return decode_body_data(data);
        }
    }

    payload
        .get("parts")
        .and_then(|v| v.as_array())
        .and_then(|parts| parts.iter().find_map(plain_text_body))
}

/// Case-insensitive header lookup in a message payload.
pub fn header<'a>(payload: &'a Value, name: &str) -> Option<&'a str> {
    payload
        .get("headers")
        .and_then(|v| v.as_array())?
        .iter()
        .find(|h| {
            h.get("name")
                .and_then(|n| n.as_str())
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|h| h.get("value"))
        .and_then(|v| v.as_str())
}
