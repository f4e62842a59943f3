//! Locator normalization.
//!
//! Elements are matched on their canonical locator: origin removed and the
//! trailing `?<digits>` cache-busting suffix dropped, so
//! `http://localhost:3000/_/main.js?1699` and `/_/main.js` are the same
//! resource.

use regex::Regex;
use std::sync::LazyLock;

static ORIGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^/]*").unwrap());
static CACHE_BUST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\?[0-9]+$").unwrap());

/// Drop `scheme://host[:port]`.
pub fn remove_origin(locator: &str) -> &str {
    match ORIGIN.find(locator) {
        Some(m) => &locator[m.end()..],
        None => locator,
    }
}

/// Drop a trailing `?<digits>` suffix.
pub fn remove_cache_bust(locator: &str) -> &str {
    match CACHE_BUST.find(locator) {
        Some(m) => &locator[..m.start()],
        None => locator,
    }
}

/// Replace any cache-busting suffix with `?{stamp}`.
pub fn with_cache_bust(locator: &str, stamp: u64) -> String {
    format!("{}?{stamp}", remove_cache_bust(locator))
}

pub fn canonical(locator: &str) -> String {
    remove_cache_bust(remove_origin(locator)).to_string()
}

/// Whether two locators name the same resource.
pub fn matches(candidate: &str, pattern: &str) -> bool {
    remove_cache_bust(remove_origin(candidate)) == remove_cache_bust(remove_origin(pattern))
}
