//! Immutable search options threaded through compilation and matching.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default upper bound on the number of matches reported by one search.
pub const DEFAULT_MAX_MATCHES: usize = 10_000;

/// Grammar entry point a pattern fragment is parsed as.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PatternContext {
    /// Try the file, statement and member readings in that order.
    #[default]
    Default,
    /// A sequence of top-level items.
    File,
    /// A class, impl or trait member.
    Member,
    /// Statements inside a function body.
    Statement,
    /// A single expression.
    Expression,
}

/// Options consumed by the compiler, the matcher and the replacer.
///
/// Values are plain data: build one with [`SearchOptions::default`] and the
/// `with_*` methods, or deserialize one from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct SearchOptions {
    case_sensitive_match: bool,
    recursive_search: bool,
    loose_matching: bool,
    distinct: bool,
    reformat: bool,
    shorten_fqn: bool,
    pattern_context: PatternContext,
    max_matches: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive_match: true,
            recursive_search: true,
            loose_matching: true,
            distinct: false,
            reformat: false,
            shorten_fqn: false,
            pattern_context: PatternContext::Default,
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

impl SearchOptions {
    /// Whether token text and regular expressions compare case sensitively.
    #[must_use]
    pub const fn case_sensitive_match(&self) -> bool {
        self.case_sensitive_match
    }

    /// Whether the nodes inside a successful match are searched as well.
    #[must_use]
    pub const fn recursive_search(&self) -> bool {
        self.recursive_search
    }

    /// Whether profile equivalences and optional terminators apply.
    #[must_use]
    pub const fn loose_matching(&self) -> bool {
        self.loose_matching
    }

    /// Whether structurally equal results are merged.
    #[must_use]
    pub const fn distinct(&self) -> bool {
        self.distinct
    }

    /// Whether replacement text is re-indented to the match site.
    #[must_use]
    pub const fn reformat(&self) -> bool {
        self.reformat
    }

    /// Whether qualified names written in a replacement are shortened.
    #[must_use]
    pub const fn shorten_fqn(&self) -> bool {
        self.shorten_fqn
    }

    /// The grammar entry point patterns are parsed as.
    #[must_use]
    pub const fn pattern_context(&self) -> PatternContext {
        self.pattern_context
    }

    /// Maximum number of matches reported by one search.
    #[must_use]
    pub const fn max_matches(&self) -> usize {
        self.max_matches
    }

    /// Sets case sensitivity.
    #[must_use]
    pub const fn with_case_sensitive_match(mut self, value: bool) -> Self {
        self.case_sensitive_match = value;
        self
    }

    /// Sets recursive search.
    #[must_use]
    pub const fn with_recursive_search(mut self, value: bool) -> Self {
        self.recursive_search = value;
        self
    }

    /// Sets loose matching.
    #[must_use]
    pub const fn with_loose_matching(mut self, value: bool) -> Self {
        self.loose_matching = value;
        self
    }

    /// Sets distinct accumulation.
    #[must_use]
    pub const fn with_distinct(mut self, value: bool) -> Self {
        self.distinct = value;
        self
    }

    /// Sets replacement re-indentation.
    #[must_use]
    pub const fn with_reformat(mut self, value: bool) -> Self {
        self.reformat = value;
        self
    }

    /// Sets qualified name shortening.
    #[must_use]
    pub const fn with_shorten_fqn(mut self, value: bool) -> Self {
        self.shorten_fqn = value;
        self
    }

    /// Sets the pattern context.
    #[must_use]
    pub const fn with_pattern_context(mut self, value: PatternContext) -> Self {
        self.pattern_context = value;
        self
    }

    /// Sets the match cap. Zero means unlimited.
    #[must_use]
    pub const fn with_max_matches(mut self, value: usize) -> Self {
        self.max_matches = value;
        self
    }

    pub(crate) const fn match_limit(&self) -> usize {
        if self.max_matches == 0 {
            usize::MAX
        } else {
            self.max_matches
        }
    }
}
