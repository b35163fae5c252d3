//! Month-abbreviation tables for index date lines.
//!
//! ezmlm writes index date lines with the three-letter month abbreviation of
//! whatever locale the delivery host ran under, and long-lived archives mix
//! several of them. Abbreviations are resolved against the table of the
//! configured locale first and the baseline (English) table second, so an
//! archive that changed locale mid-life still aggregates correctly.

/// Locale code of the baseline table.
pub const BASELINE_LOCALE: &str = "en";

/// English month abbreviations, as produced by a C/POSIX locale.
const MONTHS_EN: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// French month abbreviations, with and without accents.
///
/// Accented forms appear in archives written under ISO-8859-1 French locales;
/// the bare forms appear after the bytes went through a charset fallback.
const MONTHS_FR: [(&str, u32); 16] = [
    ("jan", 1),
    ("fév", 2),
    ("fev", 2),
    ("mar", 3),
    ("avr", 4),
    ("mai", 5),
    ("jui", 6),
    ("juin", 6),
    ("juil", 7),
    ("aoû", 8),
    ("aou", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("déc", 12),
    ("dec", 12),
];

/// Immutable month lookup table for one locale, with baseline fallback.
///
/// Built once from configuration and shared by every query; never mutated.
#[derive(Debug, Clone)]
pub struct MonthTable {
    locale: String,
    entries: Vec<(String, u32)>,
}

impl MonthTable {
    /// Build the table for a locale code. Unknown codes get the baseline table.
    pub fn for_locale(locale: &str) -> Self {
        let entries: Vec<(String, u32)> = match locale {
            "fr" => MONTHS_FR
                .iter()
                .map(|(name, m)| (name.to_string(), *m))
                .collect(),
            _ => MONTHS_EN
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u32 + 1))
                .collect(),
        };
        Self {
            locale: locale.to_string(),
            entries,
        }
    }

    /// Locale code this table was built for.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Resolve a month abbreviation to 1..=12.
    ///
    /// Matching is case-insensitive and ignores a trailing dot. The active
    /// locale is tried first; unrecognized abbreviations fall back to the
    /// baseline table, since archives may predate the current locale setting.
    pub fn month(&self, abbrev: &str) -> Option<u32> {
        let needle = abbrev.trim().trim_end_matches('.').to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if let Some(m) = lookup(&self.entries, &needle) {
            return Some(m);
        }
        if self.locale != BASELINE_LOCALE {
            let baseline: Vec<(String, u32)> = MONTHS_EN
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u32 + 1))
                .collect();
            return lookup(&baseline, &needle);
        }
        None
    }
}

/// Exact match first, then unique-prefix match for longer abbreviations
/// ("janv" still resolves against "jan").
fn lookup(entries: &[(String, u32)], needle: &str) -> Option<u32> {
    for (name, m) in entries {
        if name == needle {
            return Some(*m);
        }
    }
    let mut found: Option<u32> = None;
    for (name, m) in entries {
        if needle.starts_with(name.as_str()) {
            match found {
                Some(prev) if prev != *m => return None,
                _ => found = Some(*m),
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_months() {
        let table = MonthTable::for_locale("en");
        assert_eq!(table.month("Jan"), Some(1));
        assert_eq!(table.month("dec"), Some(12));
        assert_eq!(table.month("Sep"), Some(9));
        assert_eq!(table.month("xyz"), None);
    }

    #[test]
    fn test_french_months_with_accents() {
        let table = MonthTable::for_locale("fr");
        assert_eq!(table.month("fév"), Some(2));
        assert_eq!(table.month("fev"), Some(2));
        assert_eq!(table.month("aoû"), Some(8));
        assert_eq!(table.month("déc"), Some(12));
    }

    #[test]
    fn test_baseline_fallback() {
        // An English abbreviation in a French-configured archive still resolves.
        let table = MonthTable::for_locale("fr");
        assert_eq!(table.month("Feb"), Some(2));
        assert_eq!(table.month("Aug"), Some(8));
    }

    #[test]
    fn test_trailing_dot_and_longer_forms() {
        let table = MonthTable::for_locale("fr");
        assert_eq!(table.month("janv."), Some(1));
        assert_eq!(table.month("juil"), Some(7));
    }

    #[test]
    fn test_unknown_locale_gets_baseline() {
        let table = MonthTable::for_locale("tlh");
        assert_eq!(table.month("Mar"), Some(3));
    }
}
