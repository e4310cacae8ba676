//! Backend Module
//!
//! Remote kana-to-kanji conversion behind a small trait, so the lookup
//! service can run against the real HTTP client or a test double.

mod client;

use async_trait::async_trait;

pub use client::SocialImeClient;

/// A source of conversion candidates.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Looks up candidates for `query`.
    ///
    /// Returns the normalized candidate string (see [`normalize_candidates`]),
    /// or None on any failure. Implementations never return errors.
    async fn fetch(&self, query: &[u8]) -> Option<Vec<u8>>;
}

/// Value of the `resize[0]` parameter: half the query length in bytes.
pub fn size_hint(query: &[u8]) -> usize {
    query.len() / 2
}

/// Request path and query string for a lookup of `query`.
pub fn request_path(query: &[u8]) -> String {
    format!(
        "/api/?string={}&resize[0]=+{}",
        urlencoding::encode_binary(query),
        size_hint(query)
    )
}

/// Turns a response body into the SKK candidate form.
///
/// Lines become `/`-separated candidates, tabs inside a line become `/` too,
/// and the result carries a leading `/`. Trailing blank lines are dropped.
pub fn normalize_candidates(body: &[u8]) -> Vec<u8> {
    let mut lines: Vec<&[u8]> = body.split(|&b| b == b'\n').collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(b'/');
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        out.extend(line.iter().map(|&b| if b == b'\t' { b'/' } else { b }));
    }
    out
}
