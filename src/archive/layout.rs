//! On-disk layout of one list's archive.
//!
//! A list directory contains `num` (colon-delimited counters), `archive/`
//! with numbered subfolders of message files plus an `index` file each, and
//! optionally `archive/threads/`, `archive/subjects/` and
//! `archive/authors/` summary trees.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::ident;
use crate::error::{ArchiveError, Result};

/// Path resolution for one list. Cheap to clone, does no I/O on its own
/// except where documented.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    list_dir: PathBuf,
    list_name: String,
}

impl ArchiveLayout {
    /// Layout for `<lists_root>/<list_name>`.
    pub fn new(lists_root: impl AsRef<Path>, list_name: &str) -> Self {
        Self {
            list_dir: lists_root.as_ref().join(list_name),
            list_name: list_name.to_string(),
        }
    }

    pub fn list_name(&self) -> &str {
        &self.list_name
    }

    pub fn list_dir(&self) -> &Path {
        &self.list_dir
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.list_dir.join("archive")
    }

    pub fn num_file(&self) -> PathBuf {
        self.list_dir.join("num")
    }

    pub fn threads_dir(&self) -> PathBuf {
        self.archive_dir().join("threads")
    }

    pub fn subjects_dir(&self) -> PathBuf {
        self.archive_dir().join("subjects")
    }

    pub fn authors_dir(&self) -> PathBuf {
        self.archive_dir().join("authors")
    }

    /// Path of the message file for an id.
    pub fn message_path(&self, id: u64) -> Result<PathBuf> {
        let (subfolder, suffix) = ident::locate(id)?;
        Ok(self.archive_dir().join(subfolder.to_string()).join(suffix))
    }

    /// Path of a subfolder's chronological index file.
    pub fn index_path(&self, subfolder: u64) -> PathBuf {
        self.archive_dir()
            .join(subfolder.to_string())
            .join("index")
    }

    /// Path of a monthly thread file (`YYYYMM`).
    pub fn thread_month_path(&self, month: &str) -> PathBuf {
        self.threads_dir().join(month)
    }

    /// Path of a subject chain file: first two hash characters form the
    /// subfolder, the remainder the file name.
    pub fn subject_chain_path(&self, hash: &str) -> PathBuf {
        chain_path(self.subjects_dir(), hash)
    }

    /// Path of an author chain file, same two-level scheme as subjects.
    pub fn author_chain_path(&self, hash: &str) -> PathBuf {
        chain_path(self.authors_dir(), hash)
    }

    /// Fail with `ArchiveNotFound` unless the archive directory exists.
    pub fn ensure_archive(&self) -> Result<()> {
        let dir = self.archive_dir();
        if !dir.is_dir() {
            return Err(ArchiveError::ArchiveNotFound(dir));
        }
        Ok(())
    }

    /// Numerically-named subfolders under the archive root, sorted ascending.
    ///
    /// An archive with no numbered subfolder is a list that never recorded a
    /// message: the result is empty, not an error.
    pub fn numbered_subfolders(&self) -> Result<Vec<u64>> {
        self.ensure_archive()?;
        let dir = self.archive_dir();
        let mut subfolders: Vec<u64> = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
            let name = entry.file_name();
            if let Some(n) = name.to_str().and_then(|s| s.parse::<u64>().ok()) {
                if entry.path().is_dir() {
                    subfolders.push(n);
                }
            }
        }
        subfolders.sort_unstable();
        debug!(
            archive = %dir.display(),
            subfolders = subfolders.len(),
            "Enumerated archive subfolders"
        );
        Ok(subfolders)
    }

    /// Total message count from the `num` file.
    ///
    /// The first colon-delimited field is the count. A missing `num` file is
    /// a brand-new list that never archived anything: count 0, not an error.
    pub fn message_count(&self) -> Result<u64> {
        let path = self.num_file();
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };
        let first = raw.trim().split(':').next().unwrap_or("");
        first
            .parse::<u64>()
            .map_err(|_| ArchiveError::InvalidId(first.to_string()))
    }
}

fn chain_path(base: PathBuf, hash: &str) -> PathBuf {
    let split = hash.len().min(2);
    base.join(&hash[..split]).join(&hash[split..])
}

/// Validate the shape of a subject or author hash: lowercase ASCII letters
/// and digits, long enough to split into the two-level chain layout.
pub fn validate_hash(hash: &str) -> Result<()> {
    if hash.len() < 3
        || !hash
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(ArchiveError::InvalidPattern(hash.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = ArchiveLayout::new("/srv/lists", "flora");
        assert_eq!(
            layout.message_path(256).unwrap(),
            PathBuf::from("/srv/lists/flora/archive/2/56")
        );
        assert_eq!(
            layout.index_path(0),
            PathBuf::from("/srv/lists/flora/archive/0/index")
        );
        assert_eq!(
            layout.thread_month_path("202001"),
            PathBuf::from("/srv/lists/flora/archive/threads/202001")
        );
        assert_eq!(
            layout.subject_chain_path("abcdefgh"),
            PathBuf::from("/srv/lists/flora/archive/subjects/ab/cdefgh")
        );
        assert_eq!(
            layout.author_chain_path("mnopqrst"),
            PathBuf::from("/srv/lists/flora/archive/authors/mn/opqrst")
        );
    }

    #[test]
    fn test_validate_hash() {
        assert!(validate_hash("abcdefghij").is_ok());
        assert!(validate_hash("ab3f99").is_ok());
        assert!(validate_hash("ab").is_err());
        assert!(validate_hash("ABCDEF").is_err());
        assert!(validate_hash("../etc/passwd").is_err());
    }

    #[test]
    fn test_missing_num_file_means_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(tmp.path(), "empty");
        assert_eq!(layout.message_count().unwrap(), 0);
    }

    #[test]
    fn test_num_file_first_field() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        std::fs::create_dir_all(&list).unwrap();
        std::fs::write(list.join("num"), "1234:99\n").unwrap();
        let layout = ArchiveLayout::new(tmp.path(), "flora");
        assert_eq!(layout.message_count().unwrap(), 1234);
    }

    #[test]
    fn test_missing_archive_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(tmp.path(), "ghost");
        assert!(matches!(
            layout.ensure_archive(),
            Err(ArchiveError::ArchiveNotFound(_))
        ));
        assert!(layout.numbered_subfolders().is_err());
    }
}
