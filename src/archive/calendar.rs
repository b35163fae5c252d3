//! Per-month message-count histogram.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::archive::layout::ArchiveLayout;
use crate::error::Result;
use crate::locale::MonthTable;
use crate::parser::record;

/// Year → month → message count.
pub type Calendar = BTreeMap<i32, BTreeMap<u32, u64>>;

/// Count archived messages per calendar month.
///
/// Only the date lines of the index files are inspected — the subject lines
/// are skipped entirely. Month abbreviations resolve through the active
/// locale table with baseline fallback, because an archive may have been
/// written under several locales over its lifetime. Lines whose month still
/// does not resolve are dropped with a warning rather than failing the scan.
pub fn calendar(layout: &ArchiveLayout, months: &MonthTable) -> Result<Calendar> {
    let mut counts: Calendar = BTreeMap::new();
    let mut unparsable: u64 = 0;

    for subfolder in layout.numbered_subfolders()? {
        let path = layout.index_path(subfolder);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                warn!(subfolder, error = %e, "Unreadable index file, skipping subfolder");
                continue;
            }
        };
        for line in bytes.split(|&b| b == b'\n') {
            // Date lines are the only tab-prefixed lines in an index file.
            if !line.starts_with(b"\t") {
                continue;
            }
            match record::parse_date_line_month(line, months) {
                Some((year, month)) => {
                    *counts.entry(year).or_default().entry(month).or_insert(0) += 1;
                }
                None => unparsable += 1,
            }
        }
    }

    if unparsable > 0 {
        warn!(unparsable, "Date lines skipped while building calendar");
    }
    debug!(years = counts.len(), "Calendar aggregated");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_index(root: &Path, subfolder: u64, contents: &str) {
        let dir = root.join("flora/archive").join(subfolder.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index"), contents).unwrap();
    }

    #[test]
    fn test_calendar_counts_per_month() {
        let tmp = tempfile::tempdir().unwrap();
        write_index(
            tmp.path(),
            0,
            "1: aaaa One\n\t05 Jan 2020 10:00;xxxx A\n\
             2: bbbb Two\n\t06 Jan 2020 11:00;yyyy B\n\
             3: cccc Three\n\t01 Feb 2020 09:00;zzzz C\n",
        );
        write_index(
            tmp.path(),
            1,
            "100: dddd Hundred\n\t07 Mar 2021 10:00;xxxx A\n",
        );

        let layout = ArchiveLayout::new(tmp.path(), "flora");
        let months = MonthTable::for_locale("en");
        let cal = calendar(&layout, &months).unwrap();

        assert_eq!(cal[&2020][&1], 2);
        assert_eq!(cal[&2020][&2], 1);
        assert_eq!(cal[&2021][&3], 1);
        assert!(!cal.contains_key(&2019));
    }

    #[test]
    fn test_calendar_mixed_locales() {
        let tmp = tempfile::tempdir().unwrap();
        // French archive with one English month from an older host.
        write_index(
            tmp.path(),
            0,
            "1: aaaa Un\n\t05 f\u{e9}v 2010 10:00;xxxx A\n\
             2: bbbb Deux\n\t06 Feb 2010 11:00;yyyy B\n",
        );
        let layout = ArchiveLayout::new(tmp.path(), "flora");
        let months = MonthTable::for_locale("fr");
        let cal = calendar(&layout, &months).unwrap();
        assert_eq!(cal[&2010][&2], 2);
    }

    #[test]
    fn test_calendar_skips_unparsable_dates() {
        let tmp = tempfile::tempdir().unwrap();
        write_index(
            tmp.path(),
            0,
            "1: aaaa One\n\t05 Zzz 2020 10:00;xxxx A\n\
             2: bbbb Two\n\t06 Jan 2020 11:00;yyyy B\n",
        );
        let layout = ArchiveLayout::new(tmp.path(), "flora");
        let months = MonthTable::for_locale("en");
        let cal = calendar(&layout, &months).unwrap();
        assert_eq!(cal[&2020][&1], 1);
    }
}
