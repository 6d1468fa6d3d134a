// Nonce extraction from embed page markup
//
// The provider hides a 48-character token in the player page, either as one
// run or split into three 16-character runs. Both patterns track the
// provider's current obfuscation and are kept here so they can be updated
// independently of the rest of the pipeline.

use regex::Regex;

// Word boundaries are ASCII-only: a token directly after a non-ASCII letter
// still counts as a separate run.
lazy_static::lazy_static! {
    static ref SINGLE_RUN_RE: Regex = Regex::new(r"(?-u:\b)[a-zA-Z0-9]{48}(?-u:\b)").unwrap();
    static ref SPLIT_RUN_RE: Regex = Regex::new(
        r"(?-u:\b)([a-zA-Z0-9]{16})(?-u:\b).*?(?-u:\b)([a-zA-Z0-9]{16})(?-u:\b).*?(?-u:\b)([a-zA-Z0-9]{16})(?-u:\b)"
    )
    .unwrap();
}

/// Provider-issued page token, used as the `_k` API parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the nonce from raw HTML; first matching pattern wins
pub fn extract_nonce(html: &str) -> Option<Nonce> {
    if let Some(m) = SINGLE_RUN_RE.find(html) {
        return Some(Nonce(m.as_str().to_string()));
    }

    SPLIT_RUN_RE
        .captures(html)
        .map(|caps| Nonce(format!("{}{}{}", &caps[1], &caps[2], &caps[3])))
}
