//! Core message types.

use chrono::NaiveDateTime;

/// A single archived message, reconstructed from the flat-file archive.
///
/// Everything except `contents` comes from the index record and the message
/// file headers. `contents` is only present when the query asked for it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Archive ordinal. Positive, globally unique, assigned sequentially
    /// at archival time. `id / 100` is the subfolder, `id % 100` the
    /// two-digit file name.
    pub id: u64,

    /// Opaque token grouping replies into a thread.
    pub subject_hash: String,

    /// Subject line from the index record, normalized to UTF-8.
    pub subject: String,

    /// Date from the index record.
    /// `None` when the date portion of the record failed to parse.
    pub date: Option<NaiveDateTime>,

    /// Opaque token identifying a distinct sender across the archive.
    pub author_hash: String,

    /// Display name of the sender, heuristically de-obfuscated.
    pub author_name: String,

    /// Sender address resolved from the stored message's `From:` header.
    /// Empty when the message file could not be read.
    pub author_email: String,

    /// Decoded bodies, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<MessageContents>,

    /// Attachment descriptors, filled when contents were decoded.
    pub attachments: Vec<AttachmentMeta>,
}

impl Message {
    /// A filled "not found" placeholder for callers that prefer a stub over
    /// a hard error when a message file is missing.
    pub fn not_found_stub(id: u64) -> Self {
        Self {
            id,
            subject_hash: String::new(),
            subject: "(message not found)".to_string(),
            date: None,
            author_hash: String::new(),
            author_name: String::new(),
            author_email: String::new(),
            contents: None,
            attachments: Vec::new(),
        }
    }
}

/// Decoded message bodies.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageContents {
    /// Plain-text body, sanitized. `None` if the message has no text part.
    pub text: Option<String>,

    /// HTML body, sanitized. `None` if the message has no HTML part.
    pub html: Option<String>,

    /// HTML body with `cid:` references rewritten to the attachment cache
    /// layout, so embedded images resolve after extraction.
    pub html_embedded: Option<String>,

    /// `true` when the bodies were truncated to the abstract budget.
    pub abstracted: bool,
}

/// How much of a message's contents a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WantContents {
    /// Index metadata only.
    None,
    /// Bodies truncated to the configured abstract budget.
    Abstract,
    /// Complete bodies.
    Full,
}

impl WantContents {
    /// Whether any body decoding is required at all.
    pub fn wants_bodies(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One attachment descriptor: filename, MIME type, transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// Filename of the attachment. Generated if missing from the headers.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Content-Transfer-Encoding as declared in the part headers.
    pub encoding: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_stub() {
        let stub = Message::not_found_stub(42);
        assert_eq!(stub.id, 42);
        assert!(stub.contents.is_none());
        assert!(stub.author_email.is_empty());
    }

    #[test]
    fn test_want_contents_bodies() {
        assert!(!WantContents::None.wants_bodies());
        assert!(WantContents::Abstract.wants_bodies());
        assert!(WantContents::Full.wants_bodies());
    }

    #[test]
    fn test_message_serializes_without_contents_key() {
        let stub = Message::not_found_stub(7);
        let json = serde_json::to_string(&stub).unwrap();
        assert!(!json.contains("\"contents\""));
    }
}
