//! Line-level parsers for index, thread and chain files.
//!
//! All three formats are positional text with no escaping:
//!
//! - Index files hold two lines per message:
//!   `<id>: <subjectHash> <subject>` then
//!   `\t<day> <monAbbrev> <year> <time>;<authorHash> <authorName>`.
//! - Monthly thread files hold one line per subject hash:
//!   `<lastId>:<hash> [<count>] <subject>`.
//! - Subject/author chain files hold a `<hash> <text>` head line followed by
//!   `<id>:<yyyymm>:<hash> <text>` entries, oldest first.
//!
//! Lines are handled as raw bytes until proven UTF-8: subjects and author
//! names written under pre-UTF-8 locales are re-decoded with the configured
//! fallback encoding, and that conversion is flagged on the record.

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use regex::Regex;
use tracing::warn;

use crate::locale::MonthTable;

/// One message's fragment as recorded in an index file.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: u64,
    pub subject_hash: String,
    pub subject: String,
    /// `None` when the date portion of the second line failed to parse.
    pub date: Option<NaiveDateTime>,
    pub author_hash: String,
    pub author_name: String,
    /// `true` if subject or author name needed the fallback-charset decode.
    pub charset_converted: bool,
}

/// One subject hash's summary line from a monthly thread file.
#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub last_message_id: u64,
    pub subject_hash: String,
    pub message_count: u64,
    pub subject: String,
    pub charset_converted: bool,
}

/// One entry of a subject or author chain file.
#[derive(Debug, Clone)]
pub struct ChainRecord {
    pub message_id: u64,
    /// `YYYYMM` of the month the message was archived under.
    pub year_month: String,
    /// Author hash in subject chains, subject hash in author chains.
    pub token_hash: String,
    /// Author name in subject chains, subject in author chains.
    pub text: String,
    pub charset_converted: bool,
}

/// Decode bytes to UTF-8, falling back to `fallback` for invalid sequences.
///
/// Returns the text and whether the fallback decode was needed.
pub fn normalize_text(bytes: &[u8], fallback: &'static Encoding) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), false),
        Err(_) => {
            let (decoded, _, _) = fallback.decode(bytes);
            (decoded.into_owned(), true)
        }
    }
}

/// Parse a consecutive index line pair into an [`IndexRecord`].
///
/// Returns `None` when the first line does not have the
/// `<id>: <hash> <subject>` shape. A malformed second line only costs the
/// fields it carries: an unparsable date leaves `date` unset, a missing
/// author part leaves empty author fields.
pub fn parse_index_record(
    line1: &[u8],
    line2: &[u8],
    months: &MonthTable,
    fallback: &'static Encoding,
) -> Option<IndexRecord> {
    let (id, rest) = split_id_prefix(line1, b": ")?;
    let rest = trim_line(rest);
    let space = rest.iter().position(|&b| b == b' ')?;
    let hash_bytes = &rest[..space];
    if !is_hash(hash_bytes) {
        return None;
    }
    let subject_hash = String::from_utf8_lossy(hash_bytes).into_owned();
    let (subject, subject_converted) = normalize_text(trim_line(&rest[space + 1..]), fallback);

    let mut date = None;
    let mut author_hash = String::new();
    let mut author_name = String::new();
    let mut author_converted = false;

    if let Some(stripped) = line2.strip_prefix(b"\t") {
        let stripped = trim_line(stripped);
        if let Some(semi) = stripped.iter().position(|&b| b == b';') {
            let date_part = &stripped[..semi];
            let author_part = &stripped[semi + 1..];

            date = parse_archive_date(&String::from_utf8_lossy(date_part), months);
            if date.is_none() {
                warn!(
                    id,
                    raw = %String::from_utf8_lossy(date_part),
                    "Unparsable date in index record, leaving it unset"
                );
            }

            match author_part.iter().position(|&b| b == b' ') {
                Some(sp) => {
                    author_hash = String::from_utf8_lossy(&author_part[..sp]).into_owned();
                    let (name, converted) = normalize_text(trim_line(&author_part[sp + 1..]), fallback);
                    author_name = name;
                    author_converted = converted;
                }
                None => {
                    author_hash = String::from_utf8_lossy(author_part).into_owned();
                }
            }
        }
    }

    Some(IndexRecord {
        id,
        subject_hash,
        subject,
        date,
        author_hash,
        author_name,
        charset_converted: subject_converted || author_converted,
    })
}

/// Parse one monthly thread file line: `<lastId>:<hash> [<count>] <subject>`.
///
/// When `filter` is given, the subject is matched before the record is
/// allocated and non-matching lines return `None` immediately.
pub fn parse_thread_line(
    line: &[u8],
    filter: Option<&Regex>,
    fallback: &'static Encoding,
) -> Option<ThreadRecord> {
    let (last_message_id, rest) = split_id_prefix(line, b":")?;
    let space = rest.iter().position(|&b| b == b' ')?;
    let hash_bytes = &rest[..space];
    if !is_hash(hash_bytes) {
        return None;
    }
    let after_hash = &rest[space + 1..];
    let open = after_hash.iter().position(|&b| b == b'[')?;
    let close = after_hash.iter().position(|&b| b == b']')?;
    if close <= open {
        return None;
    }
    let count_bytes = &after_hash[open + 1..close];
    let message_count: u64 = std::str::from_utf8(count_bytes).ok()?.parse().ok()?;

    let subject_bytes = trim_line(after_hash.get(close + 1..).unwrap_or(b""));
    let (subject, charset_converted) = normalize_text(subject_bytes, fallback);
    let subject = subject.trim_start().to_string();

    if let Some(re) = filter {
        if !re.is_match(&subject) {
            return None;
        }
    }

    Some(ThreadRecord {
        last_message_id,
        subject_hash: String::from_utf8_lossy(hash_bytes).into_owned(),
        message_count,
        subject,
        charset_converted,
    })
}

/// Parse one chain file entry: `<id>:<yyyymm>:<hash> <text>`.
///
/// The `<hash> <text>` head line of a chain file does not match this shape
/// and returns `None`, as do blank lines.
pub fn parse_chain_line(line: &[u8], fallback: &'static Encoding) -> Option<ChainRecord> {
    let (message_id, rest) = split_id_prefix(line, b":")?;
    let colon = rest.iter().position(|&b| b == b':')?;
    let ym_bytes = &rest[..colon];
    if ym_bytes.len() != 6 || !ym_bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let after = &rest[colon + 1..];
    let (token_hash, text_bytes) = match after.iter().position(|&b| b == b' ') {
        Some(sp) => (&after[..sp], trim_line(&after[sp + 1..])),
        None => (trim_line(after), &b""[..]),
    };
    if !is_hash(token_hash) {
        return None;
    }
    let (text, charset_converted) = normalize_text(text_bytes, fallback);

    Some(ChainRecord {
        message_id,
        year_month: String::from_utf8_lossy(ym_bytes).into_owned(),
        token_hash: String::from_utf8_lossy(token_hash).into_owned(),
        text,
        charset_converted,
    })
}

/// Parse the `<day> <monAbbrev> <year> <time>` portion of an index date line.
///
/// The month abbreviation resolves through the locale table (with baseline
/// fallback); time accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_archive_date(raw: &str, months: &MonthTable) -> Option<NaiveDateTime> {
    let mut tokens = raw.split_whitespace();
    let day: u32 = tokens.next()?.parse().ok()?;
    let month = months.month(tokens.next()?)?;
    let year: i32 = tokens.next()?.parse().ok()?;
    let time = tokens.next().unwrap_or("00:00");

    let mut hms = time.split(':');
    let hour: u32 = hms.next()?.parse().ok()?;
    let minute: u32 = hms.next().unwrap_or("0").parse().ok()?;
    let second: u32 = match hms.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Extract `(year, month)` from an index date line, for calendar bucketing.
///
/// Only the day/month/year prefix is inspected; the line must start with a
/// tab like every index date line.
pub fn parse_date_line_month(line: &[u8], months: &MonthTable) -> Option<(i32, u32)> {
    let stripped = line.strip_prefix(b"\t")?;
    let text = String::from_utf8_lossy(trim_line(stripped));
    let date_part = text.split(';').next()?;
    let mut tokens = date_part.split_whitespace();
    let _day: u32 = tokens.next()?.parse().ok()?;
    let month = months.month(tokens.next()?)?;
    let year: i32 = tokens.next()?.parse().ok()?;
    Some((year, month))
}

/// Split a leading decimal id followed by `sep` off a line.
fn split_id_prefix<'a>(line: &'a [u8], sep: &[u8]) -> Option<(u64, &'a [u8])> {
    let digits = line.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let id: u64 = std::str::from_utf8(&line[..digits]).ok()?.parse().ok()?;
    let rest = &line[digits..];
    let rest = rest.strip_prefix(sep)?;
    Some((id, rest))
}

/// Subject/author hashes are lowercase letters and digits.
fn is_hash(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Strip trailing CR/LF and surrounding stray whitespace bytes.
fn trim_line(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = bytes.len();
    while end > start && matches!(bytes[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    while start < end && bytes[start] == b' ' {
        start += 1;
    }
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    fn months() -> MonthTable {
        MonthTable::for_locale("en")
    }

    #[test]
    fn test_parse_index_record_basic() {
        let rec = parse_index_record(
            b"42: ab3f hello world",
            b"\t05 Jan 2020 10:00;c9de John Doe",
            &months(),
            WINDOWS_1252,
        )
        .expect("record");
        assert_eq!(rec.id, 42);
        assert_eq!(rec.subject_hash, "ab3f");
        assert_eq!(rec.subject, "hello world");
        assert_eq!(rec.author_hash, "c9de");
        assert_eq!(rec.author_name, "John Doe");
        assert!(!rec.charset_converted);
        let date = rec.date.expect("date");
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2020-01-05 10:00");
    }

    #[test]
    fn test_parse_index_record_bad_first_line() {
        assert!(parse_index_record(b"not a record", b"\t", &months(), WINDOWS_1252).is_none());
        assert!(parse_index_record(b"42 missing colon", b"\t", &months(), WINDOWS_1252).is_none());
        assert!(parse_index_record(b"", b"", &months(), WINDOWS_1252).is_none());
    }

    #[test]
    fn test_parse_index_record_bad_date_keeps_record() {
        let rec = parse_index_record(
            b"7: abcd Subject here",
            b"\t99 Zzz 20XX 10:00;beef Jane",
            &months(),
            WINDOWS_1252,
        )
        .expect("record survives bad date");
        assert_eq!(rec.id, 7);
        assert!(rec.date.is_none());
        assert_eq!(rec.author_hash, "beef");
        assert_eq!(rec.author_name, "Jane");
    }

    #[test]
    fn test_parse_index_record_latin1_subject() {
        // "Présentation" in ISO-8859-1 bytes — not valid UTF-8.
        let mut line1 = b"9: cafe Pr".to_vec();
        line1.push(0xE9);
        line1.extend_from_slice(b"sentation");
        let rec = parse_index_record(
            &line1,
            b"\t12 Mar 2005 08:30;dada Marie",
            &months(),
            WINDOWS_1252,
        )
        .expect("record");
        assert_eq!(rec.subject, "Pr\u{e9}sentation");
        assert!(rec.charset_converted);
    }

    #[test]
    fn test_parse_index_record_seconds_in_time() {
        let rec = parse_index_record(
            b"100: aaaa x",
            b"\t01 Feb 1999 23:59:58;bbbb Y",
            &months(),
            WINDOWS_1252,
        )
        .unwrap();
        assert_eq!(
            rec.date.unwrap().format("%H:%M:%S").to_string(),
            "23:59:58"
        );
    }

    #[test]
    fn test_parse_thread_line() {
        let rec =
            parse_thread_line(b"120:ab3f [3] Hello", None, WINDOWS_1252).expect("thread record");
        assert_eq!(rec.last_message_id, 120);
        assert_eq!(rec.subject_hash, "ab3f");
        assert_eq!(rec.message_count, 3);
        assert_eq!(rec.subject, "Hello");
    }

    #[test]
    fn test_parse_thread_line_filter_rejects_before_allocation() {
        let re = Regex::new("(?i)^nothing$").unwrap();
        assert!(parse_thread_line(b"120:ab3f [3] Hello", Some(&re), WINDOWS_1252).is_none());
        let re2 = Regex::new("(?i)^hel.*$").unwrap();
        assert!(parse_thread_line(b"120:ab3f [3] Hello", Some(&re2), WINDOWS_1252).is_some());
    }

    #[test]
    fn test_parse_thread_line_malformed() {
        assert!(parse_thread_line(b"garbage", None, WINDOWS_1252).is_none());
        assert!(parse_thread_line(b"12:hash-no-count Subject", None, WINDOWS_1252).is_none());
        assert!(parse_thread_line(b":abcd [1] x", None, WINDOWS_1252).is_none());
    }

    #[test]
    fn test_parse_chain_line() {
        let rec = parse_chain_line(b"216:200605:f4ce Jean Dupont", WINDOWS_1252).expect("chain");
        assert_eq!(rec.message_id, 216);
        assert_eq!(rec.year_month, "200605");
        assert_eq!(rec.token_hash, "f4ce");
        assert_eq!(rec.text, "Jean Dupont");
    }

    #[test]
    fn test_parse_chain_line_head_line_is_none() {
        // Chain files open with "<hash> <subject>" which must not parse.
        assert!(parse_chain_line(b"ab3f Hello world", WINDOWS_1252).is_none());
        assert!(parse_chain_line(b"", WINDOWS_1252).is_none());
    }

    #[test]
    fn test_parse_date_line_month() {
        let (year, month) =
            parse_date_line_month(b"\t22 May 2006 18:03;abcd Someone", &months()).unwrap();
        assert_eq!(year, 2006);
        assert_eq!(month, 5);
        assert!(parse_date_line_month(b"no tab prefix", &months()).is_none());
    }

    #[test]
    fn test_parse_archive_date_rejects_impossible_days() {
        assert!(parse_archive_date("31 Feb 2020 10:00", &months()).is_none());
        assert!(parse_archive_date("29 Feb 2020 10:00", &months()).is_some());
    }
}
