//! Per-author message chains.
//!
//! ezmlm keeps `archive/authors/<h2>/<rest>` chain files symmetrical to the
//! subject chains: a `<hash> <name>` head line, then one
//! `<id>:<yyyymm>:<subjectHash> <subject>` line per message the author
//! posted, oldest first.

use encoding_rs::Encoding;

use crate::archive::layout::{self, ArchiveLayout};
use crate::error::{ArchiveError, Result};
use crate::parser::record;

/// One message in an author's posting history.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthorMessage {
    pub message_id: u64,
    /// `YYYYMM` of the month the message was archived under.
    pub year_month: String,
    pub subject_hash: String,
    pub subject: String,
}

/// An author's identity and posting history.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthorListing {
    pub author_hash: String,
    pub author_name: String,
    pub messages: Vec<AuthorMessage>,
}

/// Read an author's chain file.
///
/// Fails with `AuthorNotFound` when no chain file exists for the hash and
/// `InvalidPattern` when the hash has the wrong shape.
pub fn author_messages(
    layout: &ArchiveLayout,
    hash: &str,
    fallback: &'static Encoding,
) -> Result<AuthorListing> {
    layout::validate_hash(hash)?;
    let path = layout.author_chain_path(hash);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArchiveError::AuthorNotFound(hash.to_string()))
        }
        Err(e) => return Err(ArchiveError::io(&path, e)),
    };

    let mut author_name = String::new();
    let mut messages: Vec<AuthorMessage> = Vec::new();
    for line in bytes.split(|&b| b == b'\n') {
        if let Some(rec) = record::parse_chain_line(line, fallback) {
            messages.push(AuthorMessage {
                message_id: rec.message_id,
                year_month: rec.year_month,
                subject_hash: rec.token_hash,
                subject: rec.text,
            });
        } else if author_name.is_empty() {
            // Head line: "<hash> <name>".
            let (text, _) = record::normalize_text(line, fallback);
            if let Some(rest) = text.strip_prefix(hash) {
                author_name = rest.trim().to_string();
            }
        }
    }

    Ok(AuthorListing {
        author_hash: hash.to_string(),
        author_name,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn test_author_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("flora/archive/authors/fa");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("ce12"),
            "face12 Jane Doe\n12:202001:abcd Orchids\n57:202003:efgh Re: Ferns\n",
        )
        .unwrap();

        let layout = ArchiveLayout::new(tmp.path(), "flora");
        let listing = author_messages(&layout, "face12", WINDOWS_1252).unwrap();
        assert_eq!(listing.author_name, "Jane Doe");
        assert_eq!(listing.messages.len(), 2);
        assert_eq!(listing.messages[0].message_id, 12);
        assert_eq!(listing.messages[1].subject_hash, "efgh");
        assert_eq!(listing.messages[1].subject, "Re: Ferns");
    }

    #[test]
    fn test_author_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("flora/archive")).unwrap();
        let layout = ArchiveLayout::new(tmp.path(), "flora");
        assert!(matches!(
            author_messages(&layout, "nosuch", WINDOWS_1252),
            Err(ArchiveError::AuthorNotFound(_))
        ));
        assert!(matches!(
            author_messages(&layout, "..", WINDOWS_1252),
            Err(ArchiveError::InvalidPattern(_))
        ));
    }
}
