//! MIME decoding facility.
//!
//! The rest of the engine treats this module as a black box: raw message
//! bytes go in, plain text / HTML bodies and attachment descriptors come
//! out. Internally it wraps `mail-parser`, with fallbacks for messages the
//! parser rejects.

use chrono::NaiveDateTime;
use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{ArchiveError, Result};
use crate::model::message::AttachmentMeta;

/// Decoded bodies and sender identity of one message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// Display name from the `From:` header, possibly empty.
    pub from_name: String,
    /// Address from the `From:` header, possibly empty.
    pub from_email: String,
    /// Decoded `Subject:` header.
    pub subject: Option<String>,
    /// `Date:` header, as a naive timestamp.
    pub date: Option<NaiveDateTime>,
    /// Plain-text body. Derived from the HTML part when no text part exists.
    pub text: Option<String>,
    /// HTML body, if the message has one.
    pub html: Option<String>,
    /// Attachment descriptors, in part order.
    pub attachments: Vec<AttachmentMeta>,
}

/// Sender identity extracted from the headers alone.
#[derive(Debug, Clone, Default)]
pub struct HeaderSummary {
    pub from_name: String,
    pub from_email: String,
    pub subject: Option<String>,
    pub date: Option<NaiveDateTime>,
}

/// Decode a complete raw message.
///
/// Unparsable messages degrade to a headerless plain-text body rather than
/// failing: the archive cannot be fixed, so the reader shows what it can.
pub fn decode_message(raw: &[u8]) -> Result<DecodedMessage> {
    let parser = MessageParser::default();
    match parser.parse(raw) {
        Some(msg) => {
            let (from_name, from_email) = sender_of(&msg);
            let text = msg
                .body_text(0)
                .map(|s| s.into_owned())
                .or_else(|| msg.body_html(0).map(|html| strip_html_tags(&html)));
            let html = msg.body_html(0).map(|s| s.into_owned());
            let attachments = list_attachments(&msg);
            Ok(DecodedMessage {
                from_name,
                from_email,
                subject: msg.subject().map(String::from),
                date: date_of(&msg),
                text,
                html,
                attachments,
            })
        }
        None => Ok(DecodedMessage {
            from_name: String::new(),
            from_email: String::new(),
            subject: None,
            date: None,
            text: Some(body_fallback(raw)),
            html: None,
            attachments: Vec::new(),
        }),
    }
}

/// Extract the sender identity without decoding bodies.
pub fn decode_headers(raw: &[u8]) -> HeaderSummary {
    let parser = MessageParser::default();
    match parser.parse(raw) {
        Some(msg) => {
            let (from_name, from_email) = sender_of(&msg);
            HeaderSummary {
                from_name,
                from_email,
                subject: msg.subject().map(String::from),
                date: date_of(&msg),
            }
        }
        None => HeaderSummary::default(),
    }
}

/// Decode every attachment of a message to `(descriptor, bytes)` pairs.
pub fn decoded_attachments(raw: &[u8]) -> Result<Vec<(AttachmentMeta, Vec<u8>)>> {
    let parser = MessageParser::default();
    let msg = parser
        .parse(raw)
        .ok_or_else(|| ArchiveError::Mime("unparsable message".to_string()))?;

    let mut result = Vec::new();
    for (idx, part) in msg.attachments().enumerate() {
        let meta = attachment_meta(part, idx);
        result.push((meta, part.contents().to_vec()));
    }
    Ok(result)
}

fn date_of(msg: &mail_parser::Message<'_>) -> Option<NaiveDateTime> {
    msg.date()
        .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
        .map(|dt| dt.naive_utc())
}

fn sender_of(msg: &mail_parser::Message<'_>) -> (String, String) {
    let addr = msg.from().and_then(|a| a.first());
    let name = addr
        .and_then(|a| a.name.as_deref())
        .unwrap_or_default()
        .to_string();
    let email = addr
        .and_then(|a| a.address.as_deref())
        .unwrap_or_default()
        .to_string();
    (name, email)
}

fn list_attachments(msg: &mail_parser::Message<'_>) -> Vec<AttachmentMeta> {
    msg.attachments()
        .enumerate()
        .map(|(idx, part)| attachment_meta(part, idx))
        .collect()
}

fn attachment_meta(part: &mail_parser::MessagePart<'_>, idx: usize) -> AttachmentMeta {
    let filename = part
        .attachment_name()
        .map(String::from)
        .unwrap_or_else(|| format!("attachment_{idx}"));

    let content_type = part
        .content_type()
        .map(|ct| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let encoding = part
        .content_transfer_encoding()
        .unwrap_or_default()
        .to_string();

    AttachmentMeta {
        filename,
        content_type,
        encoding,
    }
}

/// Everything after the first blank line, when the parser gave up entirely.
fn body_fallback(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else {
        String::new()
    }
}

/// Minimal tag stripper for deriving a text body from an HTML-only message.
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result = result.replace("&amp;", "&");
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&nbsp;", " ");
    result.trim().to_string()
}
