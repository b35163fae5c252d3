//! Message store: reads individual message files by id.
//!
//! Nothing is cached here. Every read opens, decodes and drops its own data,
//! so concurrent queries share no mutable state; the attachment cache is the
//! only place bytes persist.

use std::path::PathBuf;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::archive::ident;
use crate::archive::layout::ArchiveLayout;
use crate::error::{ArchiveError, Result};
use crate::locale::MonthTable;
use crate::model::message::{Message, MessageContents, WantContents};
use crate::parser::author::resolve_author_name;
use crate::parser::record::{self, IndexRecord};
use crate::store::attachments::AttachmentCache;
use crate::store::mime::{self, DecodedMessage};

/// Reads messages from one list's archive by id.
pub struct MessageStore {
    layout: ArchiveLayout,
    months: MonthTable,
    fallback: &'static Encoding,
    abstract_size: usize,
    cache: AttachmentCache,
}

impl MessageStore {
    pub fn new(
        layout: ArchiveLayout,
        months: MonthTable,
        fallback: &'static Encoding,
        abstract_size: usize,
        cache: AttachmentCache,
    ) -> Self {
        Self {
            layout,
            months,
            fallback,
            abstract_size,
            cache,
        }
    }

    /// Read a message by id.
    ///
    /// The index record of the id's subfolder provides subject, hashes and
    /// date; the message file provides the sender address and, on request,
    /// the bodies. Fails with `MessageNotFound` when the message file is
    /// absent; a missing index record only degrades the metadata.
    pub fn read(&self, id: u64, want: WantContents) -> Result<Message> {
        let raw = self.raw_bytes(id)?;
        let rec = match self.index_record_for(id) {
            Ok(rec) => rec,
            Err(e) => {
                warn!(id, error = %e, "Index record lookup failed, using headers only");
                None
            }
        };
        Ok(self.assemble(id, rec, &raw, want))
    }

    /// Like [`read`](Self::read), but a missing message file yields a filled
    /// "not found" stub instead of an error.
    pub fn read_or_stub(&self, id: u64, want: WantContents) -> Message {
        match self.read(id, want) {
            Ok(msg) => msg,
            Err(ArchiveError::MessageNotFound(_)) => Message::not_found_stub(id),
            Err(e) => {
                warn!(id, error = %e, "Read failed, emitting stub");
                Message::not_found_stub(id)
            }
        }
    }

    /// Turn an already-parsed index record into a full message.
    ///
    /// Used by the archive walker so each emitted record costs exactly one
    /// message-file read. Fails with `MessageNotFound` when the file named
    /// by the record's id is gone.
    pub fn enrich(&self, rec: IndexRecord, want: WantContents) -> Result<Message> {
        let id = rec.id;
        let raw = self.raw_bytes(id)?;
        Ok(self.assemble(id, Some(rec), &raw, want))
    }

    /// Fully decode a message's bodies without sanitization.
    ///
    /// Search verification matches patterns against what the sender actually
    /// wrote, so it needs the bodies before markup escaping.
    pub fn decoded(&self, id: u64) -> Result<DecodedMessage> {
        let raw = self.raw_bytes(id)?;
        mime::decode_message(&raw)
    }

    /// Fetch one attachment of a message through the extraction cache.
    pub fn attachment(&self, id: u64, filename: &str, force_refresh: bool) -> Result<PathBuf> {
        let raw = self.raw_bytes(id)?;
        self.cache.fetch(id, &raw, filename, force_refresh)
    }

    /// Raw bytes of the message file, `MessageNotFound` when absent.
    pub fn raw_bytes(&self, id: u64) -> Result<Vec<u8>> {
        let path = self.layout.message_path(id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::MessageNotFound(id))
            }
            Err(e) => Err(ArchiveError::io(&path, e)),
        }
    }

    fn assemble(
        &self,
        id: u64,
        rec: Option<IndexRecord>,
        raw: &[u8],
        want: WantContents,
    ) -> Message {
        let headers = mime::decode_headers(raw);
        let (subject_hash, subject, date, author_hash, index_name) = match rec {
            Some(rec) => (
                rec.subject_hash,
                rec.subject,
                rec.date,
                rec.author_hash,
                rec.author_name,
            ),
            None => (
                String::new(),
                headers.subject.clone().unwrap_or_default(),
                headers.date,
                String::new(),
                headers.from_name.clone(),
            ),
        };

        let author_name = if index_name.is_empty() {
            headers.from_name.clone()
        } else {
            resolve_author_name(&index_name, &headers.from_email)
        };

        let (contents, attachments) = if want.wants_bodies() {
            match mime::decode_message(raw) {
                Ok(decoded) => {
                    let contents = self.build_contents(id, &decoded, want);
                    (Some(contents), decoded.attachments)
                }
                Err(e) => {
                    warn!(id, error = %e, "Body decode failed, returning metadata only");
                    (None, Vec::new())
                }
            }
        } else {
            (None, Vec::new())
        };

        Message {
            id,
            subject_hash,
            subject,
            date,
            author_hash,
            author_name,
            author_email: headers.from_email,
            contents,
            attachments,
        }
    }

    fn build_contents(&self, id: u64, decoded: &DecodedMessage, want: WantContents) -> MessageContents {
        let abstracted = want == WantContents::Abstract;
        let budget = self.abstract_size;
        let prepare = |body: &str| -> String {
            let body = if abstracted {
                abstract_of(body, budget)
            } else {
                body.to_string()
            };
            sanitize(&body)
        };

        let text = decoded.text.as_deref().map(|b| prepare(b));
        let html = decoded.html.as_deref().map(|b| prepare(b));
        let html_embedded = decoded.html.as_deref().map(|h| {
            let rewritten = rewrite_cid_references(h);
            let rewritten = if abstracted {
                abstract_of(&rewritten, budget)
            } else {
                rewritten
            };
            sanitize(&rewritten)
        });
        debug!(id, abstracted, "Decoded message contents");

        MessageContents {
            text,
            html,
            html_embedded,
            abstracted,
        }
    }
}

/// Escape angle brackets so archived bodies cannot inject markup into
/// whatever renders the query results.
pub fn sanitize(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// First `budget` code points of a body.
///
/// Counted in characters, not bytes, so multi-byte text is never split in
/// the middle of a scalar value.
pub fn abstract_of(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((byte_pos, _)) => text[..byte_pos].to_string(),
        None => text.to_string(),
    }
}

/// Rewrite `cid:` references to the relative `attachments/` cache layout,
/// so embedded images resolve once the message's attachments are extracted.
fn rewrite_cid_references(html: &str) -> String {
    html.replace("cid:", "attachments/")
}

impl MessageStore {
    /// Locate the index record for an id by scanning its subfolder's index.
    fn index_record_for(&self, id: u64) -> Result<Option<IndexRecord>> {
        let (subfolder, _) = ident::locate(id)?;
        let path = self.layout.index_path(subfolder);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };
        let lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
        for pair in lines.chunks(2) {
            if pair.len() < 2 {
                break;
            }
            if let Some(rec) =
                record::parse_index_record(pair[0], pair[1], &self.months, self.fallback)
            {
                if rec.id == id {
                    return Ok(Some(rec));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use std::path::Path;

    fn write_message(list: &Path, id: u64, raw: &[u8]) {
        let sub = list.join("archive").join((id / 100).to_string());
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(format!("{:02}", id % 100)), raw).unwrap();
    }

    fn store_for(root: &Path) -> MessageStore {
        MessageStore::new(
            ArchiveLayout::new(root, "flora"),
            MonthTable::for_locale("en"),
            WINDOWS_1252,
            5,
            AttachmentCache::new(root.join("cache"), "flora"),
        )
    }

    const RAW: &[u8] = b"From: John Doe <john@example.com>\r\n\
Subject: hello world\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hello, world\r\n";

    #[test]
    fn test_read_with_index_record() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write_message(&list, 42, RAW);
        std::fs::write(
            list.join("archive/0/index"),
            "42: ab3f hello world\n\t05 Jan 2020 10:00;c9de John Doe\n",
        )
        .unwrap();

        let store = store_for(tmp.path());
        let msg = store.read(42, WantContents::None).unwrap();
        assert_eq!(msg.id, 42);
        assert_eq!(msg.subject, "hello world");
        assert_eq!(msg.subject_hash, "ab3f");
        assert_eq!(msg.author_hash, "c9de");
        assert_eq!(msg.author_name, "John Doe");
        assert_eq!(msg.author_email, "john@example.com");
        assert!(msg.contents.is_none());
    }

    #[test]
    fn test_read_abstract_truncates_code_points() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write_message(&list, 42, RAW);

        let store = store_for(tmp.path());
        let msg = store.read(42, WantContents::Abstract).unwrap();
        let contents = msg.contents.unwrap();
        assert!(contents.abstracted);
        assert_eq!(contents.text.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("flora/archive")).unwrap();
        let store = store_for(tmp.path());
        assert!(matches!(
            store.read(9, WantContents::None),
            Err(ArchiveError::MessageNotFound(9))
        ));
        let stub = store.read_or_stub(9, WantContents::None);
        assert_eq!(stub.id, 9);
        assert_eq!(stub.subject, "(message not found)");
    }

    #[test]
    fn test_read_without_index_falls_back_to_headers() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write_message(&list, 42, RAW);

        let store = store_for(tmp.path());
        let msg = store.read(42, WantContents::None).unwrap();
        assert_eq!(msg.subject, "hello world");
        assert!(msg.subject_hash.is_empty());
        assert_eq!(msg.author_name, "John Doe");
    }

    #[test]
    fn test_sanitize_escapes_markup() {
        assert_eq!(sanitize("a <b> c"), "a &lt;b&gt; c");
    }

    #[test]
    fn test_abstract_of_multibyte() {
        assert_eq!(abstract_of("héllo wörld", 6), "héllo ");
        assert_eq!(abstract_of("ab", 5), "ab");
    }

    #[test]
    fn test_dotted_author_name_is_deobfuscated() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write_message(&list, 42, RAW);
        std::fs::write(
            list.join("archive/0/index"),
            "42: ab3f hello world\n\t05 Jan 2020 10:00;c9de john.example.com\n",
        )
        .unwrap();

        let store = store_for(tmp.path());
        let msg = store.read(42, WantContents::None).unwrap();
        // Header email is john@example.com; the index name is its dotted form.
        assert_eq!(msg.author_name, "John Example");
    }
}
