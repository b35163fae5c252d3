//! Author identity resolution.
//!
//! Index records carry the author as an opaque hash plus a display name that
//! the archiver sometimes obfuscated by rewriting the address with dots in
//! place of `@`. The real address lives in the stored message's `From:`
//! header; the display name is recovered from the obfuscated form with a
//! heuristic documented on [`deobfuscated_name`].

/// Top-level-domain suffixes stripped by the de-obfuscation heuristic.
const TLD_SUFFIXES: &[&str] = &[
    "com", "org", "net", "edu", "gov", "int", "mil", "info", "biz", "name", "fr", "de", "uk",
    "es", "it", "be", "ch", "ca", "eu",
];

/// Whether an archived display name is just the address with dots standing
/// in for `@` (the archiver's anti-harvesting rewrite).
pub fn is_dotted_email(name: &str, email: &str) -> bool {
    if name.is_empty() || email.is_empty() {
        return false;
    }
    name.eq_ignore_ascii_case(&email.replace('@', "."))
}

/// Derive a human-looking name from a dotted-address display name.
///
/// `"jean.dupont.example.org"` becomes `"Jean Dupont Example"`: known TLD
/// suffixes are stripped and the remaining dot-separated tokens are
/// title-cased and joined.
///
/// This is a heuristic, not an identity lookup. It cannot tell name tokens
/// from domain tokens ("Example" above is a domain label, not a surname),
/// and initials or single-word local parts come out as-is. Callers must not
/// treat the result as an authoritative name.
pub fn deobfuscated_name(dotted: &str) -> String {
    let mut tokens: Vec<&str> = dotted.split('.').filter(|t| !t.is_empty()).collect();
    while let Some(last) = tokens.last() {
        if TLD_SUFFIXES.contains(&last.to_lowercase().as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens
        .iter()
        .map(|t| title_case(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pick the display name for a message: the index record's name, run through
/// the de-obfuscation heuristic when it is just the dotted address.
pub fn resolve_author_name(index_name: &str, email: &str) -> String {
    if is_dotted_email(index_name, email) {
        let derived = deobfuscated_name(index_name);
        if !derived.is_empty() {
            return derived;
        }
    }
    index_name.to_string()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}
