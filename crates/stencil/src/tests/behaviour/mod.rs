//! Behaviour-driven development (BDD) step definitions for stencil scenarios.

mod scenarios;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::str::FromStr;

use rstest::fixture;
use rstest_bdd_macros::{given, then, when};

use crate::{
    MatchResult, ParseResult, Parser, Pattern, ReplacementTemplate, RewriteResult, RewriteRule,
    Rewriter, StencilError, SupportedLanguage,
};

// =============================================================================
// Test World
// =============================================================================

/// State shared across BDD steps.
#[derive(Default)]
pub(super) struct TestWorld {
    /// Language for current operations.
    language: Option<SupportedLanguage>,
    /// Parsed source code for pattern matching.
    parsed_source: Option<ParseResult>,
    /// Compiled pattern for matching.
    pattern: Option<Pattern>,
    /// Replacement template for rewriting.
    replacement: Option<String>,
    /// Pattern match results.
    matches: Vec<MatchSnapshot>,
    /// Rewrite result.
    rewrite_result: Option<RewriteResult>,
    /// Error from the last compilation step.
    error: Option<StencilError>,
}

/// Owned copy of a match's reported bindings.
#[derive(Debug)]
struct MatchSnapshot {
    captures: BTreeMap<String, String>,
}

impl From<&MatchResult<'_>> for MatchSnapshot {
    fn from(found: &MatchResult<'_>) -> Self {
        Self {
            captures: found
                .captures()
                .iter()
                .map(|(name, value)| (name.clone(), value.text().to_owned()))
                .collect(),
        }
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}

/// Strips surrounding double quotes from a string if present.
fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

// =============================================================================
// Given Steps
// =============================================================================

#[given("language {language}")]
fn given_language(world: &RefCell<TestWorld>, language: String) {
    let mut w = world.borrow_mut();
    let name = strip_quotes(&language);
    w.language = Some(SupportedLanguage::from_str(name).expect("language"));
}

#[given("source code {code}")]
fn given_source(world: &RefCell<TestWorld>, code: String) {
    let mut w = world.borrow_mut();
    let language = w.language.expect("language should be set");
    let mut parser = Parser::new(language).expect("parser init");
    w.parsed_source = Some(parser.parse(strip_quotes(&code)).expect("parse"));
}

#[given("a pattern {pattern}")]
fn given_pattern(world: &RefCell<TestWorld>, pattern: String) {
    let mut w = world.borrow_mut();
    let language = w.language.expect("language should be set");
    let compiled = Pattern::compile(strip_quotes(&pattern), language).expect("pattern compile");
    w.pattern = Some(compiled);
}

#[given("a rewrite rule from {from_pattern} to {to_replacement}")]
fn given_rewrite_rule(world: &RefCell<TestWorld>, from_pattern: String, to_replacement: String) {
    let mut w = world.borrow_mut();
    let language = w.language.expect("language should be set");
    w.pattern = Some(Pattern::compile(strip_quotes(&from_pattern), language).expect("pattern"));
    w.replacement = Some(strip_quotes(&to_replacement).to_owned());
}

// =============================================================================
// When Steps
// =============================================================================

#[when("the pattern is matched against the source")]
fn when_match_pattern(world: &RefCell<TestWorld>) {
    let mut w = world.borrow_mut();
    let parsed = w
        .parsed_source
        .as_ref()
        .expect("parsed source should be set before matching");
    let pattern = w
        .pattern
        .as_ref()
        .expect("pattern should be set before matching");

    let snapshots: Vec<MatchSnapshot> = pattern
        .find_all(parsed)
        .iter()
        .map(MatchSnapshot::from)
        .collect();
    w.matches = snapshots;
}

#[when("the rewrite is applied")]
fn when_apply_rewrite(world: &RefCell<TestWorld>) {
    let mut w = world.borrow_mut();
    let language = w.language.expect("language should be set");
    let source_text = w
        .parsed_source
        .as_ref()
        .map(|parsed| parsed.source().to_owned())
        .expect("parsed source should be set before applying rewrite");
    let pattern = w
        .pattern
        .take()
        .expect("pattern should be set before applying rewrite");
    let replacement = w
        .replacement
        .take()
        .expect("replacement should be set before applying rewrite");

    let rule = RewriteRule::new(pattern, &replacement).expect("rewrite rule should build");
    let result = Rewriter::new(language)
        .apply(&rule, &source_text)
        .expect("rewrite should apply");
    w.rewrite_result = Some(result);
}

#[when("the replacement {replacement} is compiled")]
fn when_compile_replacement(world: &RefCell<TestWorld>, replacement: String) {
    let mut w = world.borrow_mut();
    let pattern = w.pattern.as_ref().expect("pattern should be set");
    let outcome = ReplacementTemplate::compile(strip_quotes(&replacement), pattern);
    w.error = outcome.err();
}

// =============================================================================
// Then Steps
// =============================================================================

#[then("the match count is {count}")]
fn then_match_count(world: &RefCell<TestWorld>, count: usize) {
    let w = world.borrow();
    assert_eq!(
        w.matches.len(),
        count,
        "unexpected matches: {:?}",
        w.matches
    );
}

#[then("no matches are found")]
fn then_no_matches(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    assert!(w.matches.is_empty(), "Expected no matches, got {:?}", w.matches);
}

#[then("the capture {name} contains {expected}")]
fn then_capture_contains(world: &RefCell<TestWorld>, name: String, expected: String) {
    let w = world.borrow();
    let capture_name = strip_quotes(&name);
    let expected_text = strip_quotes(&expected);
    let found = w.matches.iter().any(|snapshot| {
        snapshot
            .captures
            .get(capture_name)
            .is_some_and(|text| text.contains(expected_text))
    });
    assert!(
        found,
        "Expected capture '{capture_name}' to contain '{expected_text}', matches: {:?}",
        w.matches
    );
}

#[then("the output is {text}")]
fn then_output_is(world: &RefCell<TestWorld>, text: String) {
    let w = world.borrow();
    let result = w.rewrite_result.as_ref().expect("rewrite result");
    assert_eq!(result.output(), strip_quotes(&text));
}

#[then("the rewrite made no changes")]
fn then_rewrite_unchanged(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    let result = w.rewrite_result.as_ref().expect("rewrite result");
    assert!(!result.has_changes(), "Expected rewrite to make no changes");
}

#[then("the replacement is rejected as unsupported")]
fn then_replacement_rejected(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    let err = w.error.as_ref().expect("compilation should fail");
    assert!(err.is_unsupported(), "unexpected error: {err}");
}
