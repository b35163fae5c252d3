//! Thread reconstruction from monthly thread files and subject chains.
//!
//! Each `archive/threads/YYYYMM` file summarizes every subject hash that saw
//! traffic that month, one line per hash with the hash's most recent state.
//! A thread spanning several months therefore appears in several files, and
//! visiting the files in chronological filename order makes plain
//! last-write-wins reconstruction correct: the newest file's line is the
//! thread's current state.

use std::collections::HashMap;
use std::path::PathBuf;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::archive::layout::{self, ArchiveLayout};
use crate::error::{ArchiveError, Result};
use crate::model::message::WantContents;
use crate::model::page::{paginate_in_place, PaginationSpec, SearchResult};
use crate::model::thread::Thread;
use crate::parser::record::{self, ChainRecord, ThreadRecord};
use crate::search::pattern;
use crate::store::reader::MessageStore;

/// Reconstructs [`Thread`] entities for one list.
pub struct ThreadReader<'a> {
    layout: &'a ArchiveLayout,
    fallback: &'static Encoding,
}

impl<'a> ThreadReader<'a> {
    pub fn new(layout: &'a ArchiveLayout, fallback: &'static Encoding) -> Self {
        Self { layout, fallback }
    }

    /// List threads, optionally filtered by a wildcard subject pattern.
    ///
    /// `total` counts every thread matching the filter; `data` is the
    /// paginated slice, sorted by `last_message_id` (descending = most
    /// recent activity first).
    pub fn list_threads(
        &self,
        store: &MessageStore,
        filter: Option<&str>,
        spec: &PaginationSpec,
        with_details: bool,
    ) -> Result<SearchResult<Thread>> {
        self.layout.ensure_archive()?;
        let re = match filter {
            Some(p) => Some(pattern::compile_wildcard(p)?),
            None => None,
        };

        let mut latest: HashMap<String, ThreadRecord> = HashMap::new();
        for (month, path) in self.month_files()? {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(month = %month, error = %e, "Unreadable thread file, skipping");
                    continue;
                }
            };
            for line in bytes.split(|&b| b == b'\n') {
                if let Some(rec) = record::parse_thread_line(line, re.as_ref(), self.fallback) {
                    // Later months overwrite earlier ones.
                    latest.insert(rec.subject_hash.clone(), rec);
                }
            }
        }

        let mut threads: Vec<Thread> = latest
            .into_values()
            .map(|rec| self.thread_from_record(rec))
            .collect();
        threads = merge_subject_variants(threads);

        let total = threads.len();
        threads.sort_by_key(|t| t.last_message_id);
        if spec.sort.is_descending() {
            threads.reverse();
        }
        paginate_in_place(&mut threads, spec);

        if with_details {
            for thread in &mut threads {
                self.resolve_details(store, thread)?;
            }
        }

        debug!(total, returned = threads.len(), "Listed threads");
        Ok(SearchResult {
            total,
            data: threads,
        })
    }

    /// Fetch a single thread by subject hash.
    ///
    /// Thread files are small, so this scans them directly for the matching
    /// line instead of materializing the whole thread list.
    pub fn get_thread(
        &self,
        store: &MessageStore,
        hash: &str,
        with_details: bool,
    ) -> Result<Thread> {
        layout::validate_hash(hash)?;
        self.layout.ensure_archive()?;

        let mut found: Option<ThreadRecord> = None;
        for (_, path) in self.month_files()? {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable thread file, skipping");
                    continue;
                }
            };
            for line in bytes.split(|&b| b == b'\n') {
                if let Some(rec) = record::parse_thread_line(line, None, self.fallback) {
                    if rec.subject_hash == hash {
                        found = Some(rec);
                    }
                }
            }
        }

        let rec = found.ok_or_else(|| ArchiveError::ThreadNotFound(hash.to_string()))?;
        let mut thread = self.thread_from_record(rec);
        if with_details {
            self.resolve_details(store, &mut thread)?;
        }
        Ok(thread)
    }

    /// Read a subject chain file: `(head subject, entries oldest-first)`.
    ///
    /// A chain file missing while its thread record exists is structural
    /// damage and propagates, unlike per-line parse failures.
    pub fn read_chain(&self, hash: &str) -> Result<Vec<ChainRecord>> {
        let path = self.layout.subject_chain_path(hash);
        let bytes = std::fs::read(&path).map_err(|e| ArchiveError::io(&path, e))?;
        let mut entries: Vec<ChainRecord> = Vec::new();
        for line in bytes.split(|&b| b == b'\n') {
            if let Some(rec) = record::parse_chain_line(line, self.fallback) {
                entries.push(rec);
            }
        }
        Ok(entries)
    }

    /// Month/thread-file pairs in chronological filename order.
    fn month_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.layout.threads_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            // A list that never threaded anything simply has no threads dir.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::io(&dir, e)),
        };

        let mut months: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if name.len() == 6 && name.bytes().all(|b| b.is_ascii_digit()) {
                    months.push((name.to_string(), entry.path()));
                }
            }
        }
        months.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(months)
    }

    /// Lowest and highest message id referenced by a month's thread file.
    ///
    /// `None` when the month has no thread file or no parsable line.
    pub fn month_bounds(&self, month: &str) -> Result<Option<(u64, u64)>> {
        let path = self.layout.thread_month_path(month);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };
        let mut bounds: Option<(u64, u64)> = None;
        for line in bytes.split(|&b| b == b'\n') {
            if let Some(rec) = record::parse_thread_line(line, None, self.fallback) {
                let id = rec.last_message_id;
                bounds = Some(match bounds {
                    Some((lo, hi)) => (lo.min(id), hi.max(id)),
                    None => (id, id),
                });
            }
        }
        Ok(bounds)
    }

    fn thread_from_record(&self, rec: ThreadRecord) -> Thread {
        let subject = strip_reply_prefixes(&rec.subject, self.layout.list_name());
        Thread {
            subject_hash: rec.subject_hash,
            last_message_id: rec.last_message_id,
            first_message_id: rec.last_message_id,
            message_count: rec.message_count,
            subject,
            charset_converted: rec.charset_converted,
            first_message: None,
            last_message: None,
            author: None,
        }
    }

    /// Resolve `first_message_id` from the subject chain and load the
    /// boundary messages.
    fn resolve_details(&self, store: &MessageStore, thread: &mut Thread) -> Result<()> {
        let chain = self.read_chain(&thread.subject_hash)?;
        if let Some(first) = chain.first() {
            thread.first_message_id = first.message_id;
            if chain.windows(2).any(|w| w[0].message_id >= w[1].message_id) {
                warn!(
                    hash = %thread.subject_hash,
                    "Subject chain ids are not strictly increasing"
                );
            }
        }

        let last = store.read_or_stub(thread.last_message_id, WantContents::None);
        if thread.first_message_id == thread.last_message_id {
            // Single-message thread: one read serves both ends.
            thread.first_message = Some(last.clone());
        } else {
            thread.first_message =
                Some(store.read_or_stub(thread.first_message_id, WantContents::None));
        }

        thread.author = thread
            .first_message
            .as_ref()
            .map(|m| m.author_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| chain.first().map(|c| c.text.clone()));
        thread.last_message = Some(last);
        Ok(())
    }
}

/// Hook for coalescing threads split by encoding glitches or reply/forward
/// prefix variants of the same subject.
///
/// Deliberately a no-op: the grouping key is the archiver's subject hash,
/// and second-guessing it here would silently corrupt thread identity.
/// Callers relying on merge behavior must not — none exists.
pub fn merge_subject_variants(threads: Vec<Thread>) -> Vec<Thread> {
    threads
}

/// Strip reply/forward prefixes and the list tag from a display subject.
pub fn strip_reply_prefixes(subject: &str, list_name: &str) -> String {
    let mut s = subject.trim();
    let tag = format!("[{list_name}]");
    loop {
        let lower = s.to_lowercase();
        if lower.starts_with("re:") {
            s = s[3..].trim_start();
        } else if lower.starts_with("fwd:") {
            s = s[4..].trim_start();
        } else if lower.starts_with("fw:") {
            s = s[3..].trim_start();
        } else if lower.starts_with(&tag.to_lowercase()) {
            s = s[tag.len()..].trim_start();
        } else {
            break;
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::MonthTable;
    use crate::model::page::SortOrder;
    use crate::store::attachments::AttachmentCache;
    use encoding_rs::WINDOWS_1252;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn harness(root: &Path) -> (ArchiveLayout, MessageStore) {
        let layout = ArchiveLayout::new(root, "flora");
        let store = MessageStore::new(
            layout.clone(),
            MonthTable::for_locale("en"),
            WINDOWS_1252,
            300,
            AttachmentCache::new(root.join("cache"), "flora"),
        );
        (layout, store)
    }

    #[test]
    fn test_later_month_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write(&list.join("archive/threads/202001"), "120:abcf [3] Hello\n");
        write(&list.join("archive/threads/202002"), "150:abcf [5] Hello\n");

        let (layout, store) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);
        let result = reader
            .list_threads(&store, None, &PaginationSpec::default(), false)
            .unwrap();
        assert_eq!(result.total, 1);
        let t = &result.data[0];
        assert_eq!(t.last_message_id, 150);
        assert_eq!(t.message_count, 5);
    }

    #[test]
    fn test_list_threads_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write(
            &list.join("archive/threads/202001"),
            "10:aaaa [1] Orchids\n20:bbbb [2] Re: Ferns\n30:cccc [1] Mosses\n",
        );

        let (layout, store) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);

        let all = reader
            .list_threads(
                &store,
                None,
                &PaginationSpec {
                    sort: SortOrder::Descending,
                    offset: 0,
                    limit: None,
                },
                false,
            )
            .unwrap();
        assert_eq!(all.total, 3);
        let ids: Vec<u64> = all.data.iter().map(|t| t.last_message_id).collect();
        assert_eq!(ids, vec![30, 20, 10]);

        let ferns = reader
            .list_threads(&store, Some("*fern*"), &PaginationSpec::default(), false)
            .unwrap();
        assert_eq!(ferns.total, 1);
        assert_eq!(ferns.data[0].subject, "Ferns");
    }

    #[test]
    fn test_get_thread_and_details() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write(&list.join("archive/threads/202001"), "103:abcf [2] Re: Hello\n");
        write(
            &list.join("archive/subjects/ab/cf"),
            "abcf Hello\n101:202001:dddd Jane Doe\n103:202001:eeee John Doe\n",
        );
        for (id, author) in [(101u64, "Jane Doe"), (103, "John Doe")] {
            let raw = format!("From: {author} <x@example.com>\r\nSubject: Hello\r\n\r\nBody\r\n");
            write(
                &list.join(format!("archive/{}/{:02}", id / 100, id % 100)),
                &raw,
            );
        }
        write(
            &list.join("archive/1/index"),
            "101: abcf Hello\n\t05 Jan 2020 10:00;dddd Jane Doe\n103: abcf Re: Hello\n\t06 Jan 2020 11:00;eeee John Doe\n",
        );

        let (layout, store) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);

        let bare = reader.get_thread(&store, "abcf", false).unwrap();
        assert_eq!(bare.subject, "Hello");
        assert_eq!(bare.first_message_id, bare.last_message_id);
        assert!(bare.first_message.is_none());

        let detailed = reader.get_thread(&store, "abcf", true).unwrap();
        assert_eq!(detailed.first_message_id, 101);
        assert_eq!(detailed.last_message_id, 103);
        assert!(detailed.first_message_id <= detailed.last_message_id);
        assert_eq!(detailed.author.as_deref(), Some("Jane Doe"));
        assert_eq!(detailed.last_message.as_ref().unwrap().id, 103);
    }

    #[test]
    fn test_get_thread_unknown_hash() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("flora/archive")).unwrap();
        let (layout, store) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);
        assert!(matches!(
            reader.get_thread(&store, "zzzz", false),
            Err(ArchiveError::ThreadNotFound(_))
        ));
        assert!(matches!(
            reader.get_thread(&store, "NOT A HASH", false),
            Err(ArchiveError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_missing_chain_is_structural_error() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write(&list.join("archive/threads/202001"), "103:abcf [2] Hello\n");

        let (layout, store) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);
        assert!(matches!(
            reader.get_thread(&store, "abcf", true),
            Err(ArchiveError::Io { .. })
        ));
    }

    #[test]
    fn test_month_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("flora");
        write(
            &list.join("archive/threads/202001"),
            "120:aaaa [3] One\n95:bbbb [1] Two\n130:cccc [2] Three\n",
        );
        let (layout, _) = harness(tmp.path());
        let reader = ThreadReader::new(&layout, WINDOWS_1252);
        assert_eq!(reader.month_bounds("202001").unwrap(), Some((95, 130)));
        assert_eq!(reader.month_bounds("209901").unwrap(), None);
    }

    #[test]
    fn test_strip_reply_prefixes() {
        assert_eq!(strip_reply_prefixes("Re: Hello", "flora"), "Hello");
        assert_eq!(strip_reply_prefixes("RE: FWD: Hello", "flora"), "Hello");
        assert_eq!(strip_reply_prefixes("[flora] Re: Hello", "flora"), "Hello");
        assert_eq!(strip_reply_prefixes("Regards", "flora"), "Regards");
    }
}
