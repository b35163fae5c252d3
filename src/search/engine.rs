//! Two-phase search: candidates, then body verification.

use tracing::{debug, info, warn};

use crate::archive::layout::ArchiveLayout;
use crate::error::{ArchiveError, Result};
use crate::model::message::{Message, WantContents};
use crate::model::page::{paginate_in_place, PaginationSpec, SearchResult};
use crate::search::candidates::CandidateSource;
use crate::search::pattern;
use crate::store::reader::MessageStore;

/// Progress callback: `(verified, total_candidates)`, return `false` to stop.
pub type Progress<'p> = &'p dyn Fn(usize, usize) -> bool;

/// Full-text search over one list's archive.
pub struct SearchEngine<'a> {
    layout: &'a ArchiveLayout,
    source: &'a dyn CandidateSource,
    contents_cap: usize,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        layout: &'a ArchiveLayout,
        source: &'a dyn CandidateSource,
        contents_cap: usize,
    ) -> Self {
        Self {
            layout,
            source,
            contents_cap,
        }
    }

    /// Search message bodies for a case-insensitive literal pattern.
    ///
    /// Phase 1 collects candidate ids from the raw files; phase 2 decodes
    /// each candidate and re-applies the pattern to the plain text, then the
    /// HTML if the text did not match, so header and attachment-name hits
    /// are rejected. `total` counts phase-2 true positives only.
    pub fn search(
        &self,
        store: &MessageStore,
        raw_pattern: &str,
        want: WantContents,
        spec: &PaginationSpec,
        progress: Option<Progress<'_>>,
    ) -> Result<SearchResult<Message>> {
        let needle = pattern::literal_needle(raw_pattern)?;

        let candidates = self.source.candidates(self.layout, raw_pattern)?;
        debug!(candidates = candidates.len(), "Search phase 1 done");

        let mut verified: Vec<u64> = Vec::new();
        let total_candidates = candidates.len();
        for (i, id) in candidates.into_iter().enumerate() {
            if let Some(cb) = progress {
                if !cb(i, total_candidates) {
                    info!(verified = verified.len(), "Search cancelled by caller");
                    break;
                }
            }
            match self.body_matches(store, id, &needle) {
                Ok(true) => verified.push(id),
                Ok(false) => {}
                Err(ArchiveError::MessageNotFound(_)) => {
                    warn!(id, "Candidate vanished before verification, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(cb) = progress {
            let _ = cb(total_candidates, total_candidates);
        }

        let total = verified.len();
        info!(total, total_candidates, "Search phase 2 done");

        // The working set is already in memory: sort and slice there instead
        // of re-walking the archive.
        verified.sort_unstable();
        if spec.sort.is_descending() {
            verified.reverse();
        }
        paginate_in_place(&mut verified, spec);

        // Materializing bodies obeys the same cap as any other
        // full-contents pagination: explicit over-cap limits are refused,
        // an absent limit is clamped.
        if want.wants_bodies() {
            match spec.limit {
                Some(limit) if limit > self.contents_cap => {
                    return Err(ArchiveError::ContentsLimitExceeded {
                        requested: limit,
                        cap: self.contents_cap,
                    });
                }
                Some(_) => {}
                None => verified.truncate(self.contents_cap),
            }
        }

        let data = verified
            .into_iter()
            .map(|id| store.read_or_stub(id, want))
            .collect();

        Ok(SearchResult { total, data })
    }

    /// Does the decoded body of `id` really contain the needle?
    fn body_matches(&self, store: &MessageStore, id: u64, needle: &str) -> Result<bool> {
        let decoded = store.decoded(id)?;
        if let Some(text) = decoded.text.as_deref() {
            if text.to_lowercase().contains(needle) {
                return Ok(true);
            }
        }
        if let Some(html) = decoded.html.as_deref() {
            if html.to_lowercase().contains(needle) {
                return Ok(true);
            }
        }
        Ok(false)
    }

}
