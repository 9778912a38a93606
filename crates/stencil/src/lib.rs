//! Structural search and replace over Tree-sitter syntax trees.
//!
//! A search pattern is ordinary source code of the target language in which
//! placeholders stand for syntax subtrees. The crate provides:
//!
//! - **Pattern compilation** via [`Pattern`], turning placeholder-bearing
//!   text into a tree of literal nodes and variables
//! - **Constraints** on variables: text regexes, inferred types, formal
//!   parameter types, references, read/write access and counts
//! - **Matching** via [`Matcher`], a backtracking tree matcher driven over
//!   every candidate root of a parsed file
//! - **Replacement** via [`ReplacementTemplate`] and [`Rewriter`], which
//!   print bound variables back into a template and splice the result into
//!   the file
//!
//! # Supported Languages
//!
//! - Rust (`.rs`)
//! - Python (`.py`, `.pyi`)
//! - TypeScript (`.ts`, `.tsx`, `.mts`, `.cts`)
//!
//! # Pattern Language
//!
//! - `'name` or `$name$` - Matches one syntax node and binds it
//! - `'_` or `$_$` - Matches one node without reporting it
//! - `'name*`, `'name+`, `'name?`, `'name{a,b}` - Match runs of sibling
//!   nodes; a trailing `?` makes the run lazy
//! - `'name:[regex(re) && !write]` - Attaches a constraint
//!
//! Rust uses `'` for lifetimes, so Rust patterns only accept `$name$`.
//!
//! # Example: Pattern Matching
//!
//! ```
//! use stencil::{Parser, Pattern, SupportedLanguage};
//!
//! let mut parser = Parser::new(SupportedLanguage::TypeScript)?;
//! let source = parser.parse("a = a; b = c;")?;
//!
//! let pattern = Pattern::compile("'x = 'x;", SupportedLanguage::TypeScript)?;
//! let matches = pattern.find_all(&source);
//! assert_eq!(matches.len(), 1);
//! # Ok::<(), stencil::StencilError>(())
//! ```
//!
//! # Example: Code Rewriting
//!
//! ```
//! use stencil::{Pattern, RewriteRule, Rewriter, SupportedLanguage};
//!
//! let pattern = Pattern::compile("dbg!($expr$)", SupportedLanguage::Rust)?;
//! let rule = RewriteRule::new(pattern, "println!(\"{:?}\", $expr$)")?;
//!
//! let rewriter = Rewriter::new(SupportedLanguage::Rust);
//! let result = rewriter.apply(&rule, "fn main() { dbg!(x); }")?;
//!
//! assert!(result.has_changes());
//! # Ok::<(), stencil::StencilError>(())
//! ```

mod bindings;
mod constraint;
mod error;
mod language;
mod matcher;
mod options;
mod parser;
mod pattern;
mod placeholder;
mod position;
mod profile;
mod replacer;
mod rewriter;
mod semantics;

pub use constraint::{ConstraintExpr, Predicate, TextRegex, TypePattern};
pub use error::StencilError;
pub use language::{LanguageParseError, SupportedLanguage};
pub use matcher::{
    CapturedNode, CapturedNodes, CapturedText, CapturedValue, MatchResult, Matcher, search,
};
pub use options::{DEFAULT_MAX_MATCHES, PatternContext, SearchOptions};
pub use parser::{ParseResult, Parser, SyntaxErrorInfo};
pub use pattern::{
    Pattern, PatternBuilder, PatternNode, PatternRoot, Quantifier, Slot, TextCategory,
    TextSegment, TextTemplate, VarRef, VariableSpec,
};
pub use profile::LanguageProfile;
pub use replacer::{ReplacementTemplate, Replacer, replace};
pub use rewriter::{RewriteResult, RewriteRule, Rewriter};
pub use semantics::{NoSemantics, Resolver, SyntacticSemantics, TypeHierarchy, TypeRef};

#[cfg(test)]
mod tests;
