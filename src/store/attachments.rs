//! Per-message attachment cache.
//!
//! Extracted attachments land in
//! `<cacheRoot>/<listName>/<subfolder>/<twoDigitSuffix>/attachments/<filename>`,
//! mirroring the archive's radix-100 scheme under a separate root. The layout
//! is a persistence contract: repeat requests across runs resolve to the same
//! paths.
//!
//! Extraction is lazy and idempotent. The first request for any attachment of
//! a message extracts all of them; concurrent duplicate extraction is wasted
//! work, not corruption, because every writer overwrites the same
//! deterministic targets.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::ident;
use crate::error::{ArchiveError, Result};
use crate::store::mime;

/// Cache of extracted attachments for one list.
#[derive(Debug, Clone)]
pub struct AttachmentCache {
    root: PathBuf,
    list_name: String,
}

impl AttachmentCache {
    pub fn new(root: impl AsRef<Path>, list_name: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            list_name: list_name.to_string(),
        }
    }

    /// The `attachments/` directory for a message id.
    pub fn message_dir(&self, id: u64) -> Result<PathBuf> {
        let (subfolder, suffix) = ident::locate(id)?;
        Ok(self
            .root
            .join(&self.list_name)
            .join(subfolder.to_string())
            .join(suffix)
            .join("attachments"))
    }

    /// Fetch one attachment of a message, extracting on first use.
    ///
    /// `raw` is the full raw message; extraction decodes every attachment it
    /// declares. With `force_refresh` the cache directory is rewritten even
    /// if it already exists. Fails with `AttachmentNotFound` when extraction
    /// does not yield `filename`.
    pub fn fetch(
        &self,
        id: u64,
        raw: &[u8],
        filename: &str,
        force_refresh: bool,
    ) -> Result<PathBuf> {
        let dir = self.message_dir(id)?;
        if force_refresh || !dir.is_dir() {
            self.extract_all(id, raw)?;
        } else {
            debug!(id, dir = %dir.display(), "Attachment cache hit");
        }

        let target = dir.join(safe_file_name(filename));
        if target.is_file() {
            Ok(target)
        } else {
            Err(ArchiveError::AttachmentNotFound {
                id,
                filename: filename.to_string(),
            })
        }
    }

    /// Extract every attachment of a message into its cache directory.
    ///
    /// Returns the written paths. Existing files are overwritten in full.
    pub fn extract_all(&self, id: u64, raw: &[u8]) -> Result<Vec<PathBuf>> {
        let dir = self.message_dir(id)?;
        std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;

        let mut written = Vec::new();
        for (meta, bytes) in mime::decoded_attachments(raw)? {
            let path = dir.join(safe_file_name(&meta.filename));
            std::fs::write(&path, &bytes).map_err(|e| ArchiveError::io(&path, e))?;
            written.push(path);
        }
        info!(
            id,
            count = written.len(),
            dir = %dir.display(),
            "Extracted attachments"
        );
        Ok(written)
    }
}

/// Reduce an attachment filename to a single safe path component.
///
/// Archived messages declare arbitrary filenames; anything that could walk
/// out of the cache directory is flattened.
fn safe_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .trim_start_matches('.');
    if base.is_empty() {
        "attachment".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: bob@example.com\r\n\
Subject: Report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XX--\r\n";

    #[test]
    fn test_message_dir_layout() {
        let cache = AttachmentCache::new("/var/cache/ezarc", "flora");
        assert_eq!(
            cache.message_dir(7).unwrap(),
            PathBuf::from("/var/cache/ezarc/flora/0/07/attachments")
        );
        assert_eq!(
            cache.message_dir(256).unwrap(),
            PathBuf::from("/var/cache/ezarc/flora/2/56/attachments")
        );
    }

    #[test]
    fn test_fetch_extracts_then_reuses() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = AttachmentCache::new(tmp.path(), "flora");

        let first = cache.fetch(7, RAW, "report.pdf", false).unwrap();
        let content1 = std::fs::read(&first).unwrap();

        // Poison the cached file; a plain re-fetch must NOT re-extract.
        std::fs::write(&first, b"poisoned").unwrap();
        let second = cache.fetch(7, RAW, "report.pdf", false).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"poisoned");

        // Force refresh re-extracts and restores the real bytes.
        let third = cache.fetch(7, RAW, "report.pdf", true).unwrap();
        assert_eq!(std::fs::read(&third).unwrap(), content1);
    }

    #[test]
    fn test_fetch_unknown_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = AttachmentCache::new(tmp.path(), "flora");
        let err = cache.fetch(7, RAW, "nope.txt", false).unwrap_err();
        assert!(matches!(err, ArchiveError::AttachmentNotFound { .. }));
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("c:\\temp\\x.doc"), "x.doc");
        assert_eq!(safe_file_name(""), "attachment");
    }
}
