//! Store key layout.
//!
//! Every term owns a `URLSet:<term>` set and every indexed page owns a
//! `TermCounter:<url>` hash. Terms and urls are embedded verbatim: a term that
//! itself contains `:` still round-trips through [`term_from_url_set_key`], but
//! glob metacharacters in a term or url are not escaped when building scan
//! patterns.

pub const URL_SET_PREFIX: &str = "URLSet:";
pub const TERM_COUNTER_PREFIX: &str = "TermCounter:";

pub const URL_SET_PATTERN: &str = "URLSet:*";
pub const TERM_COUNTER_PATTERN: &str = "TermCounter:*";
pub const ALL_KEYS_PATTERN: &str = "*";

pub fn url_set_key(term: &str) -> String {
    format!("{URL_SET_PREFIX}{term}")
}

pub fn term_counter_key(url: &str) -> String {
    format!("{TERM_COUNTER_PREFIX}{url}")
}

/// Recover the term from a `URLSet:` key. Keys of any other family yield `None`.
pub fn term_from_url_set_key(key: &str) -> Option<&str> {
    key.strip_prefix(URL_SET_PREFIX)
}

/// Literal prefix of a pattern, up to its first metacharacter.
pub fn literal_prefix(pattern: &str) -> &str {
    let end = pattern.find(&['*', '?', '[', '\\'][..]).unwrap_or(pattern.len());
    &pattern[..end]
}

/// Redis-style `KEYS` matching for adapters without native pattern support.
/// Supports `*`, `?` and `\`-escapes; character classes are not supported and
/// `[` matches literally.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = key.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    // position of the last `*` in the pattern and the text index it resumed at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pat.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => Some(1),
            Some('\\') if p + 1 < pat.len() => (pat[p + 1] == text[t]).then_some(2),
            Some(c) => (*c == text[t]).then_some(1),
            None => None,
        };
        match (step, backtrack) {
            (Some(n), _) => {
                p += n;
                t += 1;
            }
            (None, Some((star, resume))) => {
                p = star + 1;
                t = resume + 1;
                backtrack = Some((star, resume + 1));
            }
            (None, None) => return false,
        }
    }
    pat[p..].iter().all(|c| *c == '*')
}
