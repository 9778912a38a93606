//! Match driver and backtracking tree matcher.
//!
//! The driver walks a parsed file in pre-order and offers each candidate root
//! to the tree matcher. Patterns made of several statements are matched
//! against contiguous runs of statements inside statement containers
//! instead. Results come back in source order with a snapshot of the
//! bindings that produced them.
//!
//! ```ignore
//! use stencil::{Matcher, Parser, Pattern, SupportedLanguage};
//!
//! let pattern = Pattern::compile("'_a = '_a;", SupportedLanguage::TypeScript)?;
//! let parsed = Parser::new(SupportedLanguage::TypeScript)?.parse("a = a; a = b;")?;
//! assert_eq!(Matcher::new(&pattern).find_all(&parsed).len(), 1);
//! ```

mod capture;
mod context;
mod driver;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::AtomicBool;

use tracing::debug;
use tree_sitter::Node;

use crate::bindings::Equality;
use crate::constraint::EvalContext;
use crate::parser::ParseResult;
use crate::pattern::Pattern;
use crate::position::point_to_one_based;
use crate::semantics::{
    LayeredHierarchy, NoSemantics, Resolver, SyntacticSemantics, TypeHierarchy,
};

pub use capture::{CapturedNode, CapturedNodes, CapturedText, CapturedValue};

pub(crate) use driver::encloses;

use context::MatchContext;
use driver::{MATCH_TARGET, Search, all_bindings};

/// Result of a successful pattern match.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    nodes: Vec<Node<'a>>,
    source: &'a str,
    captures: BTreeMap<String, CapturedValue<'a>>,
}

impl<'a> MatchResult<'a> {
    /// Returns the first matched node.
    ///
    /// Single-node patterns match exactly one node; statement sequences
    /// match a run whose first statement is returned here.
    #[must_use]
    pub fn node(&self) -> Option<Node<'a>> {
        self.nodes.first().copied()
    }

    /// Returns every matched node in order.
    #[must_use]
    pub fn nodes(&self) -> &[Node<'a>] {
        &self.nodes
    }

    /// Returns the byte range of the match in the source.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => first.start_byte()..last.end_byte(),
            _ => 0..0,
        }
    }

    /// Returns the text of the matched region.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.source.get(self.byte_range()).unwrap_or_default()
    }

    /// Returns the source the match was found in.
    #[must_use]
    pub const fn source(&self) -> &'a str {
        self.source
    }

    /// Returns the start position (line, column) of the match.
    ///
    /// Both line and column are one-based for display purposes.
    #[must_use]
    pub fn start_position(&self) -> (u32, u32) {
        self.nodes
            .first()
            .map_or((1, 1), |node| point_to_one_based(node.start_position()))
    }

    /// Returns the end position (line, column) of the match.
    ///
    /// Both line and column are one-based for display purposes.
    #[must_use]
    pub fn end_position(&self) -> (u32, u32) {
        self.nodes
            .last()
            .map_or((1, 1), |node| point_to_one_based(node.end_position()))
    }

    /// Gets a captured variable by name.
    #[must_use]
    pub fn capture(&self, name: &str) -> Option<&CapturedValue<'a>> {
        self.captures.get(name)
    }

    /// Returns all reported variables, ordered by name.
    #[must_use]
    pub const fn captures(&self) -> &BTreeMap<String, CapturedValue<'a>> {
        &self.captures
    }
}

/// Pattern matcher that finds occurrences in parsed code.
///
/// A matcher is cheap to build; share the compiled [`Pattern`] across
/// threads and give each worker its own matcher.
#[derive(Clone, Copy)]
pub struct Matcher<'p> {
    pattern: &'p Pattern,
    hierarchy: Option<&'p dyn TypeHierarchy>,
    cancel: Option<&'p AtomicBool>,
}

impl fmt::Debug for Matcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("pattern", &self.pattern.source())
            .field("external_hierarchy", &self.hierarchy.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl<'p> Matcher<'p> {
    /// Creates a new matcher for the given pattern.
    #[must_use]
    pub const fn new(pattern: &'p Pattern) -> Self {
        Self {
            pattern,
            hierarchy: None,
            cancel: None,
        }
    }

    /// Layers an external type hierarchy over the one derived from the file.
    #[must_use]
    pub const fn with_hierarchy(mut self, hierarchy: &'p dyn TypeHierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Checks `flag` before every candidate root and stops once it is set.
    ///
    /// Matches found before cancellation are still returned.
    #[must_use]
    pub const fn with_cancellation(mut self, flag: &'p AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Finds all matches of the pattern in the parsed source.
    #[must_use]
    pub fn find_all<'t>(&self, parsed: &'t ParseResult) -> Vec<MatchResult<'t>> {
        self.with_semantics(parsed, |ctx| self.search(ctx, parsed, usize::MAX))
    }

    /// Finds the first match of the pattern in the parsed source.
    #[must_use]
    pub fn find_first<'t>(&self, parsed: &'t ParseResult) -> Option<MatchResult<'t>> {
        self.with_semantics(parsed, |ctx| self.search(ctx, parsed, 1))
            .into_iter()
            .next()
    }

    /// Finds all matches, answering semantic constraints with `resolver`.
    #[must_use]
    pub fn find_all_with<'t>(
        &self,
        parsed: &'t ParseResult,
        resolver: &dyn Resolver<'t>,
    ) -> Vec<MatchResult<'t>> {
        let local = SyntacticSemantics::new(parsed);
        self.with_collaborators(parsed, resolver, &local, |ctx| {
            self.search(ctx, parsed, usize::MAX)
        })
    }

    /// Returns every binding the backtracking search can produce with `node`
    /// as the candidate root, in the order they are found.
    ///
    /// For statement sequences `node` is the container whose statements form
    /// the run.
    #[must_use]
    pub fn bindings_at<'t>(
        &self,
        parsed: &'t ParseResult,
        node: Node<'t>,
    ) -> Vec<BTreeMap<String, CapturedValue<'t>>> {
        if parsed.language() != self.pattern.language() {
            return Vec::new();
        }
        self.with_semantics(parsed, |ctx| all_bindings(ctx, node))
    }

    fn search<'t>(
        &self,
        ctx: &MatchContext<'_, 'p, 't>,
        parsed: &'t ParseResult,
        limit: usize,
    ) -> Vec<MatchResult<'t>> {
        if parsed.language() != self.pattern.language() {
            debug!(
                target: MATCH_TARGET,
                pattern = %self.pattern.language(),
                file = %parsed.language(),
                "language mismatch; nothing to search"
            );
            return Vec::new();
        }
        Search::new(ctx, self.cancel, limit).run(parsed.root_node())
    }

    fn with_semantics<'t, R>(
        &self,
        parsed: &'t ParseResult,
        run: impl FnOnce(&MatchContext<'_, 'p, 't>) -> R,
    ) -> R {
        if self.pattern.needs_semantics() {
            let semantics = SyntacticSemantics::new(parsed);
            self.with_collaborators(parsed, &semantics, &semantics, run)
        } else {
            self.with_collaborators(parsed, &NoSemantics, &NoSemantics, run)
        }
    }

    fn with_collaborators<'t, R>(
        &self,
        parsed: &'t ParseResult,
        resolver: &dyn Resolver<'t>,
        local: &dyn TypeHierarchy,
        run: impl FnOnce(&MatchContext<'_, 'p, 't>) -> R,
    ) -> R {
        let options = self.pattern.options();
        let profile = self.pattern.language().profile();
        let source = parsed.source();
        let hierarchy = LayeredHierarchy {
            local,
            external: self.hierarchy,
        };
        let ctx = MatchContext {
            pattern: self.pattern,
            source,
            profile,
            loose: options.loose_matching(),
            equality: Equality {
                source,
                profile,
                case_sensitive: options.case_sensitive_match(),
                loose: options.loose_matching(),
            },
            eval: EvalContext {
                source,
                profile,
                resolver,
                hierarchy: &hierarchy,
            },
        };
        run(&ctx)
    }
}

/// Searches `parsed` for every match of `pattern`.
#[must_use]
pub fn search<'t>(pattern: &Pattern, parsed: &'t ParseResult) -> Vec<MatchResult<'t>> {
    Matcher::new(pattern).find_all(parsed)
}

impl Pattern {
    /// Finds all matches of this pattern in the parsed source.
    #[must_use]
    pub fn find_all<'t>(&self, parsed: &'t ParseResult) -> Vec<MatchResult<'t>> {
        Matcher::new(self).find_all(parsed)
    }

    /// Finds the first match of this pattern in the parsed source.
    #[must_use]
    pub fn find_first<'t>(&self, parsed: &'t ParseResult) -> Option<MatchResult<'t>> {
        Matcher::new(self).find_first(parsed)
    }
}

#[cfg(test)]
mod tests;
