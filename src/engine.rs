//! Query facade over one list's archive.
//!
//! An [`ArchiveEngine`] owns nothing mutable: it wires configuration, the
//! path layout, the month table and the attachment cache together and hands
//! each query to the component that answers it. Independent engines (or the
//! same engine from several threads of a read-only embedding) can run
//! concurrently against the same archive; freshness under concurrent
//! external mutation is best-effort by design.

use std::path::PathBuf;

use encoding_rs::Encoding;

use crate::archive::authors::{self, AuthorListing};
use crate::archive::calendar::{self, Calendar};
use crate::archive::layout::ArchiveLayout;
use crate::archive::threads::ThreadReader;
use crate::archive::walker::Walker;
use crate::config::{self, Config};
use crate::error::{ArchiveError, Result};
use crate::locale::MonthTable;
use crate::model::message::{Message, WantContents};
use crate::model::page::{paginate_in_place, PaginationSpec, SearchResult, SortOrder};
use crate::model::thread::Thread;
use crate::search::candidates::{CandidateSource, GrepCandidates, ScanCandidates};
use crate::search::engine::{Progress, SearchEngine};
use crate::store::attachments::AttachmentCache;
use crate::store::reader::MessageStore;

/// Read-only query engine for one mailing list's archive.
pub struct ArchiveEngine {
    layout: ArchiveLayout,
    months: MonthTable,
    fallback: &'static Encoding,
    store: MessageStore,
    candidate_source: Box<dyn CandidateSource>,
    contents_cap: usize,
    default_limit: usize,
}

impl ArchiveEngine {
    /// Build an engine for `<lists_root>/<list_name>` from configuration.
    pub fn new(cfg: &Config, list_name: &str) -> Self {
        let layout = ArchiveLayout::new(&cfg.general.lists_root, list_name);
        let months = MonthTable::for_locale(&cfg.archive.locale);
        let fallback = Encoding::for_label(cfg.archive.fallback_charset.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1252);
        let cache = AttachmentCache::new(config::attachments_dir(cfg), list_name);
        let store = MessageStore::new(
            layout.clone(),
            months.clone(),
            fallback,
            cfg.archive.abstract_size,
            cache,
        );
        let candidate_source: Box<dyn CandidateSource> = match cfg.search.engine.as_str() {
            "scan" => Box::new(ScanCandidates),
            _ => Box::new(GrepCandidates::new(&cfg.search.grep_path)),
        };

        Self {
            layout,
            months,
            fallback,
            store,
            candidate_source,
            contents_cap: cfg.archive.contents_cap,
            default_limit: cfg.general.default_limit,
        }
    }

    pub fn list_name(&self) -> &str {
        self.layout.list_name()
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Total number of archived messages, from the `num` file.
    pub fn count_all_messages(&self) -> Result<u64> {
        self.layout.message_count()
    }

    /// All messages the pagination window selects.
    pub fn get_all_messages(
        &self,
        spec: &PaginationSpec,
        want: WantContents,
    ) -> Result<SearchResult<Message>> {
        let total = self.count_all_messages()? as usize;
        let walker = Walker::new(&self.layout, &self.months, self.fallback, self.contents_cap);
        let data = walker.scan(&self.store, spec, want)?;
        Ok(SearchResult { total, data })
    }

    /// The newest messages, newest first.
    pub fn get_latest_messages(
        &self,
        limit: Option<usize>,
        want: WantContents,
    ) -> Result<Vec<Message>> {
        let spec = PaginationSpec::latest(limit.unwrap_or(self.default_limit));
        let walker = Walker::new(&self.layout, &self.months, self.fallback, self.contents_cap);
        walker.scan(&self.store, &spec, want)
    }

    /// One message by id.
    pub fn get_message(&self, id: u64, want: WantContents) -> Result<Message> {
        self.store.read(id, want)
    }

    /// The message archived right after `id`.
    pub fn next_message(&self, id: u64, want: WantContents) -> Result<Message> {
        self.get_message(id + 1, want)
    }

    /// The message archived right before `id`.
    pub fn previous_message(&self, id: u64, want: WantContents) -> Result<Message> {
        if id <= 1 {
            return Err(ArchiveError::InvalidId(format!("{} - 1", id)));
        }
        self.get_message(id - 1, want)
    }

    /// Messages of one calendar month.
    ///
    /// The month's thread file bounds the id range; each id in the range is
    /// then read directly, skipping holes. Messages at the range edges can
    /// belong to neighbouring months when traffic straddles midnight on the
    /// first, exactly as the flat-file format itself blurs that line.
    pub fn month_messages(
        &self,
        month: &str,
        spec: &PaginationSpec,
        want: WantContents,
    ) -> Result<Vec<Message>> {
        validate_month(month)?;
        self.layout.ensure_archive()?;
        let threads = ThreadReader::new(&self.layout, self.fallback);
        let Some((lo, hi)) = threads.month_bounds(month)? else {
            return Ok(Vec::new());
        };

        let mut ids: Vec<u64> = (lo..=hi).collect();
        if spec.sort.is_descending() {
            ids.reverse();
        }
        paginate_in_place(&mut ids, spec);

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.read(id, want) {
                Ok(msg) => out.push(msg),
                Err(ArchiveError::MessageNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// List threads, optionally filtered by a wildcard subject pattern.
    pub fn list_threads(
        &self,
        filter: Option<&str>,
        spec: &PaginationSpec,
        with_details: bool,
    ) -> Result<SearchResult<Thread>> {
        let reader = ThreadReader::new(&self.layout, self.fallback);
        reader.list_threads(&self.store, filter, spec, with_details)
    }

    /// One thread by subject hash.
    pub fn get_thread(&self, hash: &str, with_details: bool) -> Result<Thread> {
        let reader = ThreadReader::new(&self.layout, self.fallback);
        reader.get_thread(&self.store, hash, with_details)
    }

    /// Full-text search across message bodies.
    pub fn search_messages(
        &self,
        pattern: &str,
        spec: &PaginationSpec,
        want: WantContents,
        progress: Option<Progress<'_>>,
    ) -> Result<SearchResult<Message>> {
        let engine = SearchEngine::new(&self.layout, self.candidate_source.as_ref(), self.contents_cap);
        engine.search(&self.store, pattern, want, spec, progress)
    }

    /// An author's posting history from the author chain files.
    pub fn author_messages(&self, author_hash: &str) -> Result<AuthorListing> {
        self.layout.ensure_archive()?;
        authors::author_messages(&self.layout, author_hash, self.fallback)
    }

    /// Per-month message-count histogram.
    pub fn calendar(&self) -> Result<Calendar> {
        calendar::calendar(&self.layout, &self.months)
    }

    /// Fetch one attachment through the extraction cache.
    pub fn get_attachment(&self, id: u64, filename: &str, force_refresh: bool) -> Result<PathBuf> {
        self.store.attachment(id, filename, force_refresh)
    }

    /// Default pagination for thread listings: most recent activity first.
    pub fn default_thread_spec(&self) -> PaginationSpec {
        PaginationSpec {
            sort: SortOrder::Descending,
            offset: 0,
            limit: None,
        }
    }
}

/// A month argument must be `YYYYMM`.
fn validate_month(month: &str) -> Result<()> {
    let ok = month.len() == 6
        && month.bytes().all(|b| b.is_ascii_digit())
        && matches!(month[4..].parse::<u32>(), Ok(1..=12));
    if ok {
        Ok(())
    } else {
        Err(ArchiveError::InvalidDateFragment(month.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_month() {
        assert!(validate_month("202001").is_ok());
        assert!(validate_month("199912").is_ok());
        assert!(validate_month("202013").is_err());
        assert!(validate_month("202000").is_err());
        assert!(validate_month("20201").is_err());
        assert!(validate_month("2020-1").is_err());
    }
}
