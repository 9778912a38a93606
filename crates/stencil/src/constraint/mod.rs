//! Constraint language attached to pattern variables.
//!
//! Constraints are compiled once, at pattern compile time, into a small
//! expression tree and interpreted for every candidate a variable may bind.
//! `!` binds tighter than `&&`, which binds tighter than `||`; parentheses
//! group. `within(...)` carries a whole nested pattern, compiled with the
//! language and options of the pattern that declares it.

mod eval;
mod parse;

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::StencilError;
use crate::pattern::Pattern;

pub(crate) use eval::{EvalContext, Subject, evaluate};
pub(crate) use parse::{Dialect, parse_bare, parse_block};

/// A compiled constraint expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintExpr {
    /// A single predicate.
    Predicate(Predicate),
    /// Logical negation.
    Not(Box<Self>),
    /// Logical conjunction.
    And(Vec<Self>),
    /// Logical disjunction.
    Or(Vec<Self>),
}

impl ConstraintExpr {
    /// Returns whether evaluating this expression needs semantic information.
    #[must_use]
    pub fn needs_semantics(&self) -> bool {
        match self {
            Self::Predicate(predicate) => predicate.needs_semantics(),
            Self::Not(inner) => inner.needs_semantics(),
            Self::And(items) | Self::Or(items) => items.iter().any(Self::needs_semantics),
        }
    }

    /// Returns the names of variables referenced with `ref(...)`.
    #[must_use]
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Predicate(Predicate::Reference(name)) => out.push(name),
            Self::Predicate(_) => {}
            Self::Not(inner) => inner.collect_references(out),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
        }
    }
}

/// A named predicate over a candidate binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Regular expression over the candidate text.
    Regex(TextRegex),
    /// Regular expression over the candidate's expression type.
    ExprType(TypePattern),
    /// Regular expression over the declared type of the parameter that the
    /// candidate argument is passed to.
    FormalType(TypePattern),
    /// The candidate refers to the declaration bound to another variable.
    Reference(String),
    /// The candidate is read.
    Read,
    /// The candidate is written.
    Write,
    /// Bounds on how many nodes (or words, for text) a binding holds.
    Count {
        /// Inclusive minimum.
        min: u32,
        /// Inclusive maximum; `None` is unbounded.
        max: Option<u32>,
    },
    /// Some enclosing node, or run of statements, matches the nested pattern.
    Within(Box<Pattern>),
}

impl Predicate {
    fn needs_semantics(&self) -> bool {
        match self {
            Self::ExprType(_)
            | Self::FormalType(_)
            | Self::Reference(_)
            | Self::Read
            | Self::Write => true,
            Self::Within(pattern) => pattern.needs_semantics(),
            Self::Regex(_) | Self::Count { .. } => false,
        }
    }
}

/// A type-name pattern, optionally extended to subtypes.
#[derive(Debug, Clone, PartialEq)]
pub struct TypePattern {
    /// Regular expression applied to type names.
    pub regex: TextRegex,
    /// Whether a type also matches when one of its supertypes matches.
    pub with_subtypes: bool,
}

/// A regular expression compiled for both whole-node and in-text use.
#[derive(Clone)]
pub struct TextRegex {
    source: String,
    whole_word: bool,
    case_sensitive: bool,
    anchored: Regex,
    search: Regex,
}

impl TextRegex {
    /// Compiles `source` with the given flags.
    ///
    /// # Errors
    ///
    /// Returns [`StencilError::MalformedPattern`] when `source` is empty,
    /// carries leading or trailing whitespace, or is not a valid regex.
    pub fn new(
        source: &str,
        whole_word: bool,
        case_sensitive: bool,
        offset: usize,
    ) -> Result<Self, StencilError> {
        if source.is_empty() {
            return Err(StencilError::malformed(offset, "empty regular expression"));
        }
        if source.trim() != source {
            return Err(StencilError::malformed(
                offset,
                format!("regular expression '{source}' has surrounding whitespace"),
            ));
        }

        let build = |pattern: String| {
            RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|err| StencilError::malformed(offset, err.to_string()))
        };
        let (anchored, search) = if whole_word {
            (
                build(format!(r"\b(?:{source})\b"))?,
                build(format!(r"\b(?:{source})\b"))?,
            )
        } else {
            (build(format!("^(?:{source})$"))?, build(source.to_owned())?)
        };

        Ok(Self {
            source: source.to_owned(),
            whole_word,
            case_sensitive,
            anchored,
            search,
        })
    }

    /// Returns the expression as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns whether the expression only matches whole words.
    #[must_use]
    pub const fn whole_word(&self) -> bool {
        self.whole_word
    }

    /// Matches the whole of a code node's text.
    #[must_use]
    pub fn matches_node_text(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// Searches inside comment or literal text.
    #[must_use]
    pub fn matches_within(&self, text: &str) -> bool {
        self.search.is_match(text)
    }
}

impl PartialEq for TextRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.whole_word == other.whole_word
            && self.case_sensitive == other.case_sensitive
    }
}

impl fmt::Debug for TextRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRegex")
            .field("source", &self.source)
            .field("whole_word", &self.whole_word)
            .field("case_sensitive", &self.case_sensitive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchored_matching_covers_the_whole_text() {
        let regex = TextRegex::new("get.*", false, true, 0).expect("regex");
        assert!(regex.matches_node_text("getName"));
        assert!(!regex.matches_node_text("isGetter"));
        assert!(regex.matches_within("isgetter"));
    }

    #[test]
    fn whole_word_requires_boundaries() {
        let regex = TextRegex::new("hello", true, true, 0).expect("regex");
        assert!(regex.matches_within("say hello there"));
        assert!(!regex.matches_within("helloworld"));
    }

    #[test]
    fn case_insensitive_flag_applies() {
        let regex = TextRegex::new("foo", false, false, 0).expect("regex");
        assert!(regex.matches_node_text("FOO"));
    }

    #[test]
    fn invalid_regex_is_malformed() {
        let err = TextRegex::new("a(", false, true, 7).expect_err("malformed");
        assert!(matches!(err, StencilError::MalformedPattern { offset: 7, .. }));
    }

    #[test]
    fn equality_ignores_compiled_state() {
        let a = TextRegex::new("x+", false, true, 0).expect("regex");
        let b = TextRegex::new("x+", false, true, 9).expect("regex");
        assert_eq!(a, b);
    }
}
