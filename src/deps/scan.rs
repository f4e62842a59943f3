//! Import extraction.
//!
//! Recognized forms:
//!
//! ```js
//! import React from 'react'          // import … from
//! import 'left-pad'                  // bare import
//! export { x } from "./util"         // re-export
//! const fp = require('lodash/fp')    // require
//! const m = await import('./lazy')   // dynamic import
//! ```
//!
//! Specifiers starting with `.` or `/` are internal; everything else is
//! reduced to its package name.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\bfrom|\bimport)\s*['"]([^'"\n]+)['"]|\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#,
    )
    .unwrap()
});

/// Import references of one file, in first-seen order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    /// Relative or rooted specifiers, as written.
    pub internal: Vec<String>,
    /// Package names.
    pub external: Vec<String>,
}

impl DependencySet {
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }
}

/// Extract and partition the imports of `source`.
pub fn scan_source(source: &str) -> DependencySet {
    let mut set = DependencySet::default();
    let mut seen_internal = FxHashSet::default();
    let mut seen_external = FxHashSet::default();

    for caps in IMPORT.captures_iter(source) {
        let Some(spec) = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().trim()) else {
            continue;
        };

        if is_internal(spec) {
            if seen_internal.insert(spec.to_string()) {
                set.internal.push(spec.to_string());
            }
        } else if let Some(name) = package_name(spec)
            && seen_external.insert(name.to_string())
        {
            set.external.push(name.to_string());
        }
    }
    set
}

/// Relative (`./x`, `../x`) or rooted (`/x`) specifier.
pub fn is_internal(spec: &str) -> bool {
    spec.starts_with('.') || spec.starts_with('/')
}

/// Package a specifier resolves to: `lodash/fp` → `lodash`,
/// `@scope/pkg/deep` → `@scope/pkg`.
///
/// Returns `None` for URLs, protocol imports (`node:fs`) and malformed names.
pub fn package_name(spec: &str) -> Option<&str> {
    if spec.is_empty() || spec.contains(':') || spec.contains(char::is_whitespace) {
        return None;
    }

    let end = if spec.starts_with('@') {
        let mut parts = spec.splitn(3, '/');
        let scope = parts.next()?;
        let name = parts.next().filter(|n| !n.is_empty())?;
        if scope.len() < 2 {
            return None;
        }
        scope.len() + 1 + name.len()
    } else {
        spec.find('/').unwrap_or(spec.len())
    };

    Some(&spec[..end]).filter(|name| !name.is_empty())
}
