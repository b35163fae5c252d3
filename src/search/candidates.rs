//! Phase-1 candidate collection strategies.
//!
//! The candidate source only has to be fast and never miss a true match;
//! over-matching is fine because phase 2 re-verifies every candidate against
//! the decoded bodies. The default strategy shells out to the system `grep`
//! across the raw message files; the in-process scanner exists for
//! environments without a usable grep.

use std::process::Command;

use tracing::{debug, warn};

use crate::archive::ident;
use crate::archive::layout::ArchiveLayout;
use crate::error::{ArchiveError, Result};

/// Produces the candidate message ids whose raw files may match a pattern.
pub trait CandidateSource {
    fn candidates(&self, layout: &ArchiveLayout, pattern: &str) -> Result<Vec<u64>>;
}

/// Candidates via the external `grep` binary (`grep -r -i -l -F`).
///
/// grep sees raw undecoded files, so headers, encoded bodies and attachment
/// names all count as matches here; phase 2 sorts the true positives out.
pub struct GrepCandidates {
    grep_path: String,
}

impl GrepCandidates {
    pub fn new(grep_path: &str) -> Self {
        Self {
            grep_path: grep_path.to_string(),
        }
    }
}

impl CandidateSource for GrepCandidates {
    fn candidates(&self, layout: &ArchiveLayout, pattern: &str) -> Result<Vec<u64>> {
        layout.ensure_archive()?;
        let archive = layout.archive_dir();

        let output = Command::new(&self.grep_path)
            .arg("-r")
            .arg("-i")
            .arg("-l")
            .arg("-F")
            .arg("--")
            .arg(pattern)
            .arg(&archive)
            .output()
            .map_err(|e| ArchiveError::SearchUnavailable(format!("cannot run grep: {e}")))?;

        // Exit code 1 is grep's "no matches"; anything above is a failure.
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ArchiveError::SearchUnavailable(format!(
                    "grep exited with {code:?}: {}",
                    stderr.trim()
                )));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ids: Vec<u64> = Vec::new();
        for line in stdout.lines() {
            match id_from_path(layout, line) {
                Some(id) => ids.push(id),
                // Hits in index/threads/subjects files are not messages.
                None => debug!(path = line, "Ignoring non-message grep hit"),
            }
        }
        ids.sort_unstable();
        ids.dedup();
        debug!(count = ids.len(), "grep candidate phase done");
        Ok(ids)
    }
}

/// In-process fallback: streams every message file and does a
/// case-insensitive substring check on the raw bytes.
pub struct ScanCandidates;

impl CandidateSource for ScanCandidates {
    fn candidates(&self, layout: &ArchiveLayout, pattern: &str) -> Result<Vec<u64>> {
        let needle = pattern.to_lowercase();
        let mut ids: Vec<u64> = Vec::new();

        for subfolder in layout.numbered_subfolders()? {
            let dir = layout.archive_dir().join(subfolder.to_string());
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Unreadable subfolder, skipping");
                    continue;
                }
            };
            for entry in entries {
                let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let Ok(id) = ident::compose(subfolder, name) else {
                    continue;
                };
                match std::fs::read(entry.path()) {
                    Ok(bytes) => {
                        let haystack = String::from_utf8_lossy(&bytes).to_lowercase();
                        if haystack.contains(&needle) {
                            ids.push(id);
                        }
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Unreadable message file, skipping");
                    }
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        debug!(count = ids.len(), "scan candidate phase done");
        Ok(ids)
    }
}

/// Map a grep hit path back to a message id.
///
/// Only paths of the shape `<archive>/<subfolder>/<one-or-two-digits>`
/// qualify; everything else (index files, thread summaries, chains) is
/// ignored.
fn id_from_path(layout: &ArchiveLayout, path: &str) -> Option<u64> {
    let archive = layout.archive_dir();
    let rel = std::path::Path::new(path).strip_prefix(&archive).ok()?;
    let mut components = rel.components();
    let subfolder: u64 = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let file = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }
    ident::compose(subfolder, file).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn build_archive(root: &Path) -> ArchiveLayout {
        let layout = ArchiveLayout::new(root, "flora");
        for (id, body) in [
            (1u64, "nothing to see"),
            (2, "rare ORCHID sighting"),
            (3, "ferns and mosses"),
            (101, "orchid care tips"),
        ] {
            let sub = layout.archive_dir().join((id / 100).to_string());
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(
                sub.join(format!("{:02}", id % 100)),
                format!("From: a@b.c\r\nSubject: s\r\n\r\n{body}\r\n"),
            )
            .unwrap();
        }
        // An index file mentioning "orchid" must never become a candidate.
        std::fs::write(
            layout.archive_dir().join("0").join("index"),
            "2: aaaa orchid\n\t05 Jan 2020 10:00;bbbb X\n",
        )
        .unwrap();
        layout
    }

    #[test]
    fn test_scan_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = build_archive(tmp.path());
        let ids = ScanCandidates.candidates(&layout, "orchid").unwrap();
        assert_eq!(ids, vec![2, 101]);
    }

    #[test]
    fn test_grep_candidates_skip_non_message_hits() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = build_archive(tmp.path());
        let source = GrepCandidates::new("grep");
        match source.candidates(&layout, "orchid") {
            Ok(ids) => assert_eq!(ids, vec![2, 101]),
            // Not every test environment has grep on PATH.
            Err(ArchiveError::SearchUnavailable(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_grep_missing_binary_is_search_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = build_archive(tmp.path());
        let source = GrepCandidates::new("/nonexistent/grep-binary");
        assert!(matches!(
            source.candidates(&layout, "x"),
            Err(ArchiveError::SearchUnavailable(_))
        ));
    }

    #[test]
    fn test_id_from_path() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(tmp.path(), "flora");
        let archive = layout.archive_dir();
        let msg = format!("{}/2/56", archive.display());
        assert_eq!(id_from_path(&layout, &msg), Some(256));
        let index = format!("{}/2/index", archive.display());
        assert_eq!(id_from_path(&layout, &index), None);
        let chain = format!("{}/subjects/ab/cdef", archive.display());
        assert_eq!(id_from_path(&layout, &chain), None);
        assert_eq!(id_from_path(&layout, "/elsewhere/2/56"), None);
    }
}
