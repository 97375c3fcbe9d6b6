//! Sheet-name derivation, sanitization and deduplication
//!
//! The workbook format constrains sheet names: at most 31 characters, no
//! `\ / ? * [ ] :`, and uniqueness is case-insensitive. Names are fixed up
//! here, at registration time, so the references recorded during flattening
//! and the sheets created by the emitter can never disagree.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::flatten::types::NamingStrategy;

/// Hard limit imposed by the xlsx format
const MAX_SHEET_NAME_LEN: usize = 31;

/// Name of the sheet holding the top-level rows
pub const MAIN_SHEET: &str = "Main";

static FORBIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\/\?\*\[\]:]").expect("valid regex"));

/// Assigns unique, workbook-valid names to auxiliary sheets
pub struct SheetNamer {
    separator: String,
    naming: NamingStrategy,
    /// Lowercased names already handed out (uniqueness is case-insensitive)
    taken: HashSet<String>,
}

impl SheetNamer {
    pub fn new(naming: NamingStrategy, separator: &str) -> Self {
        let mut taken = HashSet::new();
        taken.insert(MAIN_SHEET.to_lowercase());
        SheetNamer {
            separator: separator.to_string(),
            naming,
            taken,
        }
    }

    /// Derive the sheet name for `key` nested under the sheet named
    /// `parent` (empty for top-level keys), sanitize it and make it unique.
    pub fn assign(&mut self, parent: &str, key: &str) -> String {
        let candidate = match self.naming {
            NamingStrategy::KeyOnly => key.to_string(),
            NamingStrategy::PathPrefixed if parent.is_empty() => key.to_string(),
            NamingStrategy::PathPrefixed => {
                format!("{}{}{}", parent, self.separator, key)
            }
        };

        let base = sanitize(&candidate);
        let name = self.dedup(&base);
        self.taken.insert(name.to_lowercase());
        debug!(sheet = %name, %key, "registered sheet name");
        name
    }

    fn dedup(&self, base: &str) -> String {
        if !self.taken.contains(&base.to_lowercase()) {
            return base.to_string();
        }

        // Suffix with _2, _3, ... keeping the result within the length cap
        let mut n: u64 = 2;
        loop {
            let suffix = format!("{}{}", self.separator, n);
            let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
            let mut name: String = base.chars().take(room).collect();
            name.push_str(&suffix);
            if !self.taken.contains(&name.to_lowercase()) {
                return name;
            }
            n += 1;
        }
    }
}

/// Strip forbidden characters and fit the name into the format's limits
fn sanitize(raw: &str) -> String {
    let stripped = FORBIDDEN.replace_all(raw, "");
    // Apostrophes are forbidden at the start/end of a sheet name
    let trimmed = stripped.trim().trim_matches('\'').trim();
    let truncated: String = trimmed.chars().take(MAX_SHEET_NAME_LEN).collect();
    let name = truncated.trim_end().to_string();
    if name.is_empty() {
        String::from("Sheet")
    } else {
        name
    }
}
