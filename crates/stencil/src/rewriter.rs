//! Whole-file rewriting built on the matcher and the replacer.
//!
//! A [`RewriteRule`] pairs a pattern with a compiled replacement template.
//! The [`Rewriter`] parses a source file, finds the outermost
//! non-overlapping matches of the rule and splices each rendered
//! replacement into the text.

use std::cmp::Reverse;

use tracing::debug;

use crate::error::StencilError;
use crate::language::SupportedLanguage;
use crate::matcher::MatchResult;
use crate::parser::Parser;
use crate::pattern::Pattern;
use crate::replacer::{REPLACE_TARGET, ReplacementTemplate, Replacer};

/// A structural rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Pattern,
    template: ReplacementTemplate,
}

impl RewriteRule {
    /// Creates a new rewrite rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement does not compile against the
    /// pattern, for example when it names a variable the pattern lacks.
    pub fn new(pattern: Pattern, replacement: impl AsRef<str>) -> Result<Self, StencilError> {
        let template = ReplacementTemplate::compile(replacement.as_ref(), &pattern)?;
        Ok(Self { pattern, template })
    }

    /// Returns the pattern for this rule.
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the compiled replacement.
    #[must_use]
    pub const fn template(&self) -> &ReplacementTemplate {
        &self.template
    }
}

/// Engine for applying structural rewrites.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter {
    language: SupportedLanguage,
}

impl Rewriter {
    /// Creates a new rewriter for the given language.
    #[must_use]
    pub const fn new(language: SupportedLanguage) -> Self {
        Self { language }
    }

    /// Returns the language this rewriter is configured for.
    #[must_use]
    pub const fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Applies a rewrite rule to source code.
    ///
    /// Nested matches inside a replaced region are left to the replacement.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule targets another language or parsing
    /// fails.
    pub fn apply(&self, rule: &RewriteRule, source: &str) -> Result<RewriteResult, StencilError> {
        if rule.pattern.language() != self.language {
            return Err(StencilError::unsupported(
                rule.pattern.language(),
                format!("rule cannot rewrite {} source", self.language),
            ));
        }
        let mut parser = Parser::new(self.language)?;
        let parsed = parser.parse(source)?;

        let matches = outermost(rule.pattern.find_all(&parsed));
        if matches.is_empty() {
            return Ok(RewriteResult {
                output: source.to_owned(),
                num_replacements: 0,
            });
        }

        let output = apply_replacements(source, &matches, &Replacer::new(&rule.template))?;
        debug!(
            target: REPLACE_TARGET,
            language = %self.language,
            replacements = matches.len(),
            "rewrote source"
        );

        Ok(RewriteResult {
            output,
            num_replacements: matches.len(),
        })
    }

    /// Applies multiple rewrite rules in sequence.
    ///
    /// Each rule is applied to the result of the previous rule.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails during any rule application.
    pub fn apply_all(
        &self,
        rules: &[RewriteRule],
        source: &str,
    ) -> Result<RewriteResult, StencilError> {
        let mut current = source.to_owned();
        let mut total_replacements: usize = 0;

        for rule in rules {
            let result = self.apply(rule, &current)?;
            total_replacements = total_replacements.saturating_add(result.num_replacements);
            current = result.output;
        }

        Ok(RewriteResult {
            output: current,
            num_replacements: total_replacements,
        })
    }
}

/// Keeps matches that do not start inside an earlier kept match.
fn outermost(mut matches: Vec<MatchResult<'_>>) -> Vec<MatchResult<'_>> {
    matches.sort_by_key(|found| {
        let range = found.byte_range();
        (range.start, Reverse(range.end))
    });
    let mut end = 0;
    matches.retain(|found| {
        let range = found.byte_range();
        let keep = range.start >= end;
        if keep {
            end = range.end;
        }
        keep
    });
    matches
}

fn apply_replacements(
    source: &str,
    matches: &[MatchResult<'_>],
    replacer: &Replacer<'_>,
) -> Result<String, StencilError> {
    let mut result = source.to_owned();

    for found in matches.iter().rev() {
        let range = found.byte_range();
        if range.end > result.len() {
            continue;
        }
        if !result.is_char_boundary(range.start) || !result.is_char_boundary(range.end) {
            return Err(StencilError::internal(
                "rewrite match range is not on a UTF-8 boundary",
            ));
        }
        result.replace_range(range, &replacer.replace(found));
    }

    Ok(result)
}

/// Result of a rewrite operation.
#[derive(Debug, Clone)]
pub struct RewriteResult {
    /// The transformed source code.
    output: String,
    /// Number of replacements made.
    num_replacements: usize,
}

impl RewriteResult {
    /// Returns the transformed source code.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Returns the number of replacements made.
    #[must_use]
    pub const fn num_replacements(&self) -> usize {
        self.num_replacements
    }

    /// Returns whether any replacements were made.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.num_replacements > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(language: SupportedLanguage, pattern: &str, replacement: &str) -> RewriteRule {
        let compiled = Pattern::compile(pattern, language).expect("pattern");
        RewriteRule::new(compiled, replacement).expect("rule")
    }

    #[test]
    fn rewrite_simple_replacement() {
        let rule = rule(SupportedLanguage::Rust, "let $x$ = $y$;", "const $x$: i32 = $y$;");
        let result = Rewriter::new(SupportedLanguage::Rust)
            .apply(&rule, "fn main() { let x = 1; }")
            .expect("rewrite");

        assert_eq!(result.num_replacements(), 1);
        assert_eq!(result.output(), "fn main() { const x: i32 = 1; }");
    }

    #[test]
    fn rewrite_no_match_returns_unchanged() {
        let rule = rule(SupportedLanguage::Rust, "struct $name$ {}", "enum $name$ {}");
        let source = "fn main() {}";
        let result = Rewriter::new(SupportedLanguage::Rust)
            .apply(&rule, source)
            .expect("rewrite");

        assert!(!result.has_changes());
        assert_eq!(result.output(), source);
    }

    #[test]
    fn duplicated_statements_collapse_to_one() {
        let rule = rule(SupportedLanguage::TypeScript, "'T; 'T;", "'T;");
        let result = Rewriter::new(SupportedLanguage::TypeScript)
            .apply(&rule, "a = 1; a = 1;")
            .expect("rewrite");

        assert_eq!(result.output(), "a = 1;");
    }

    #[test]
    fn identity_rule_leaves_the_file_alone() {
        let source = "foo(a,   b);\nbar(c);\n";
        let rule = rule(SupportedLanguage::TypeScript, "'f('args*)", "'f('args*)");
        let result = Rewriter::new(SupportedLanguage::TypeScript)
            .apply(&rule, source)
            .expect("rewrite");

        assert_eq!(result.num_replacements(), 2);
        assert_eq!(result.output(), source);
    }

    #[test]
    fn nested_matches_are_left_to_the_outer_replacement() {
        let rule = rule(SupportedLanguage::TypeScript, "f('x)", "g($x$)");
        let result = Rewriter::new(SupportedLanguage::TypeScript)
            .apply(&rule, "f(f(1));")
            .expect("rewrite");

        assert_eq!(result.num_replacements(), 1);
        assert_eq!(result.output(), "g(f(1));");
    }

    #[test]
    fn rewrite_rule_rejects_unknown_variables() {
        let pattern = Pattern::compile("'a = 1;", SupportedLanguage::TypeScript).expect("pattern");
        let err = RewriteRule::new(pattern, "$b$ = 1;").expect_err("unknown variable");
        assert!(err.is_unsupported());
    }

    #[test]
    fn rules_only_apply_to_their_language() {
        let rule = rule(SupportedLanguage::Python, "print('x)", "log('x)");
        let err = Rewriter::new(SupportedLanguage::TypeScript)
            .apply(&rule, "print(1);")
            .expect_err("language mismatch");
        assert!(err.is_unsupported());
    }

    #[test]
    fn apply_all_chains_rules() {
        let rules = [
            rule(SupportedLanguage::Python, "print('x)", "log('x)"),
            rule(SupportedLanguage::Python, "log('x)", "logger.info('x)"),
        ];
        let result = Rewriter::new(SupportedLanguage::Python)
            .apply_all(&rules, "print(1)\n")
            .expect("rewrite");

        assert_eq!(result.num_replacements(), 2);
        assert_eq!(result.output(), "logger.info(1)\n");
    }
}
