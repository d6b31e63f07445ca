//! Header sink: parses `X-RateLimit-{Limit,Remaining,Reset}` off a response
//! (success or error) and feeds only the fields actually present into the
//! tracker, case-insensitively. A non-numeric or empty value leaves that
//! field unknown rather than clobbering prior state.

use std::collections::BTreeMap;

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";

fn parse_u64(headers: &BTreeMap<String, String>, name: &str) -> Option<u64> {
    headers.get(name).and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            trimmed.parse().ok()
        }
    })
}

fn parse_i64(headers: &BTreeMap<String, String>, name: &str) -> Option<i64> {
    headers.get(name).and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            trimmed.parse().ok()
        }
    })
}

/// Extracts `(limit, remaining, reset_at)` from already-lower-cased response
/// headers. Any subset may come back `None`.
pub fn extract(headers: &BTreeMap<String, String>) -> (Option<u64>, Option<u64>, Option<i64>) {
    (
        parse_u64(headers, HEADER_LIMIT),
        parse_u64(headers, HEADER_REMAINING),
        parse_i64(headers, HEADER_RESET),
    )
}
