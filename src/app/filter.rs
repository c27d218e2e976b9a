//! Glob filtering of artifact paths
//!
//! Patterns follow shell glob rules on slash-separated paths: `*` matches a
//! run of characters within one path segment, `?` matches one character and
//! `[...]` a character class. Matching is case-sensitive.
//!
//! By default only the first configured pattern is honored, matching the
//! behavior of earlier releases. [`MatchMode::Any`] opts in to matching
//! against every pattern.

use std::fmt;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{ConfigError, ConfigResult};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How a list of patterns is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Only the first pattern is used; the rest are ignored
    #[default]
    FirstOnly,
    /// A path qualifies if any pattern matches
    Any,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::FirstOnly => write!(f, "first-only"),
            MatchMode::Any => write!(f, "any"),
        }
    }
}

/// Compiled artifact path filter
#[derive(Debug, Clone)]
pub struct PatternFilter {
    patterns: Vec<Pattern>,
    mode: MatchMode,
}

impl PatternFilter {
    /// Compile the given patterns
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for an empty list or a pattern
    /// that fails to compile.
    pub fn new<I, P>(patterns: I, mode: MatchMode) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: String::new(),
                reason: "at least one pattern is required".to_string(),
            });
        }

        if mode == MatchMode::FirstOnly && patterns[0].as_str().is_empty() {
            warn!("First pattern is empty; no artifact will match");
        }

        Ok(Self { patterns, mode })
    }

    /// Parse a semicolon-separated pattern list
    ///
    /// Entries are trimmed and empty ones after the first are dropped. A blank
    /// leading entry is kept so it stays the first pattern; a list with no
    /// non-blank entry yields nothing.
    pub fn parse_list(list: &str) -> Vec<String> {
        let mut entries = list.split(';').map(str::trim);
        if list.trim_matches(|c: char| c == ';' || c.is_whitespace()).is_empty() {
            return Vec::new();
        }

        let first = entries.next().unwrap_or_default().to_string();
        std::iter::once(first)
            .chain(entries.filter(|p| !p.is_empty()).map(str::to_string))
            .collect()
    }

    /// Whether an artifact path is selected for download
    pub fn matches(&self, path: &str) -> bool {
        match self.mode {
            MatchMode::FirstOnly => self.patterns[0].matches_with(path, MATCH_OPTIONS),
            MatchMode::Any => self
                .patterns
                .iter()
                .any(|p| p.matches_with(path, MATCH_OPTIONS)),
        }
    }

    /// Patterns that take part in matching under the current mode
    pub fn active_patterns(&self) -> impl Iterator<Item = &str> {
        let take = match self.mode {
            MatchMode::FirstOnly => 1,
            MatchMode::Any => self.patterns.len(),
        };
        self.patterns.iter().take(take).map(Pattern::as_str)
    }

    /// Patterns that were configured but are ignored under the current mode
    pub fn ignored_patterns(&self) -> impl Iterator<Item = &str> {
        let skip = match self.mode {
            MatchMode::FirstOnly => 1,
            MatchMode::Any => self.patterns.len(),
        };
        self.patterns.iter().skip(skip).map(Pattern::as_str)
    }
}

impl FromStr for PatternFilter {
    type Err = ConfigError;

    fn from_str(list: &str) -> Result<Self, Self::Err> {
        Self::new(Self::parse_list(list), MatchMode::default())
    }
}
