//! Ordered, bounded traversal of the archive's index files.
//!
//! The archive has no queryable index, so "latest N" and friends are
//! answered by walking numbered subfolders in id order and consuming index
//! lines two at a time. The offset and remaining-limit counters are shared
//! across subfolders and short-circuit the walk as soon as the window is
//! filled: cost stays proportional to `offset + limit`, not archive size.

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::archive::layout::ArchiveLayout;
use crate::error::{ArchiveError, Result};
use crate::locale::MonthTable;
use crate::model::message::{Message, WantContents};
use crate::model::page::PaginationSpec;
use crate::parser::record::{self, IndexRecord};
use crate::store::reader::MessageStore;

/// Drives paginated scans over one list's archive.
pub struct Walker<'a> {
    layout: &'a ArchiveLayout,
    months: &'a MonthTable,
    fallback: &'static Encoding,
    contents_cap: usize,
}

impl<'a> Walker<'a> {
    pub fn new(
        layout: &'a ArchiveLayout,
        months: &'a MonthTable,
        fallback: &'static Encoding,
        contents_cap: usize,
    ) -> Self {
        Self {
            layout,
            months,
            fallback,
            contents_cap,
        }
    }

    /// Scan the archive and return the window of messages the spec selects.
    ///
    /// Fails with `ArchiveNotFound` when the archive directory is missing;
    /// an archive that exists but never recorded a message yields an empty
    /// vector. Messages whose file disappeared since the index was written
    /// are skipped with a warning.
    pub fn scan(
        &self,
        store: &MessageStore,
        spec: &PaginationSpec,
        want: WantContents,
    ) -> Result<Vec<Message>> {
        let limit = self.effective_limit(spec, want)?;
        let mut subfolders = self.layout.numbered_subfolders()?;
        if spec.sort.is_descending() {
            subfolders.reverse();
        }

        let mut to_skip = spec.offset;
        let mut remaining = limit;
        let mut out: Vec<Message> = Vec::new();

        for subfolder in subfolders {
            if remaining == Some(0) {
                break;
            }
            let records = match self.subfolder_records(subfolder, spec) {
                Some(records) => records,
                None => continue,
            };
            for rec in records {
                if to_skip > 0 {
                    to_skip -= 1;
                    continue;
                }
                match store.enrich(rec, want) {
                    Ok(msg) => out.push(msg),
                    Err(ArchiveError::MessageNotFound(id)) => {
                        warn!(id, "Indexed message file is gone, skipping");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
                if let Some(ref mut n) = remaining {
                    *n -= 1;
                    if *n == 0 {
                        debug!(emitted = out.len(), "Limit reached, stopping traversal");
                        return Ok(out);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Index records of one subfolder, ordered according to the spec.
    ///
    /// A subfolder without a readable index is skipped: per-file damage must
    /// not abort the whole scan.
    fn subfolder_records(&self, subfolder: u64, spec: &PaginationSpec) -> Option<Vec<IndexRecord>> {
        let path = self.layout.index_path(subfolder);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable index file, skipping subfolder");
                return None;
            }
        };

        let lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
        let mut records: Vec<IndexRecord> = Vec::with_capacity(lines.len() / 2);
        for pair in lines.chunks(2) {
            if pair.len() < 2 {
                break;
            }
            match record::parse_index_record(pair[0], pair[1], self.months, self.fallback) {
                Some(rec) => records.push(rec),
                None => {
                    if !pair[0].is_empty() {
                        warn!(
                            subfolder,
                            line = %String::from_utf8_lossy(pair[0]),
                            "Malformed index record, skipping"
                        );
                    }
                }
            }
        }

        if spec.sort.is_descending() {
            records.reverse();
        }
        Some(records)
    }

    /// Resolve the effective emission bound for a scan.
    ///
    /// Metadata-only scans honor the spec as-is. When bodies are requested
    /// the bound is clamped to the contents cap, and a caller explicitly
    /// asking for more than the cap is refused.
    fn effective_limit(&self, spec: &PaginationSpec, want: WantContents) -> Result<Option<usize>> {
        if !want.wants_bodies() {
            return Ok(spec.limit);
        }
        match spec.limit {
            Some(limit) if limit > self.contents_cap => Err(ArchiveError::ContentsLimitExceeded {
                requested: limit,
                cap: self.contents_cap,
            }),
            Some(limit) => Ok(Some(limit)),
            None => Ok(Some(self.contents_cap)),
        }
    }
}
