use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rstest::rstest;

use super::*;

use crate::language::SupportedLanguage;
use crate::options::SearchOptions;
use crate::parser::Parser;

fn parse(language: SupportedLanguage, source: &str) -> ParseResult {
    Parser::new(language)
        .and_then(|mut parser| parser.parse(source))
        .expect("parse")
}

fn count(language: SupportedLanguage, pattern: &str, source: &str) -> usize {
    let pattern = Pattern::compile(pattern, language).expect("pattern");
    pattern.find_all(&parse(language, source)).len()
}

fn count_with(pattern: &str, source: &str, options: SearchOptions) -> usize {
    let language = SupportedLanguage::TypeScript;
    let pattern = Pattern::compile_with(pattern, language, options).expect("pattern");
    pattern.find_all(&parse(language, source)).len()
}

#[rstest]
#[case("{ '_T*; '_T2*; }", 1)]
#[case("{ '_T+; '_T2+; '_T3+; }", 1)]
#[case("{ '_T+; '_T2+; '_T3+; '_T4+; }", 0)]
#[case("{ '_T{4,}; }", 0)]
fn quantified_statements_in_a_block(#[case] pattern: &str, #[case] expected: usize) {
    assert_eq!(
        count(SupportedLanguage::TypeScript, pattern, "{a=1;b=2;c=3;}"),
        expected
    );
}

#[test]
fn greedy_run_takes_every_statement() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "{a=1;b=2;c=3;}");
    let pattern = Pattern::compile("{ '_T*; '_T2*; }", language).expect("pattern");
    let found = pattern.find_first(&parsed).expect("match");

    let first = found.capture("_T").and_then(CapturedValue::as_multiple).expect("_T");
    let second = found.capture("_T2").and_then(CapturedValue::as_multiple).expect("_T2");
    assert_eq!(first.nodes().len(), 3);
    assert!(second.is_empty());
    assert_eq!(first.text(), "a=1;b=2;c=3;");
}

#[test]
fn repeated_variables_require_equal_text() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "a = b; b = c; a=a; c=c;");
    let pattern = Pattern::compile("'_a = '_a;", language).expect("pattern");
    let matches = pattern.find_all(&parsed);

    let bound: Vec<&str> = matches
        .iter()
        .filter_map(|found| found.capture("_a"))
        .map(CapturedValue::text)
        .collect();
    assert_eq!(bound, ["a", "c"]);
    assert!(matches.iter().all(|found| found.captures().len() == 1));
}

#[rstest]
#[case("function '_name() {}", 2)]
#[case("function f1() {}", 1)]
#[case("function '_name('_arg) {}", 0)]
fn function_declarations(#[case] pattern: &str, #[case] expected: usize) {
    let source = "function f1() {}\nfunction f2() {}\n";
    assert_eq!(count(SupportedLanguage::TypeScript, pattern, source), expected);
}

#[test]
fn statement_sequence_binds_one_run() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "a = 1; a = 1;");
    let pattern = Pattern::compile("'T; 'T;", language).expect("pattern");
    let matches = pattern.find_all(&parsed);

    assert_eq!(matches.len(), 1);
    let found = matches.first().expect("match");
    assert_eq!(found.nodes().len(), 2);
    assert_eq!(found.text(), "a = 1; a = 1;");
    assert_eq!(found.capture("T").map(CapturedValue::text), Some("a = 1;"));
}

#[rstest]
#[case(true)]
#[case(false)]
fn a_lone_block_is_not_a_statement_run(#[case] recursive: bool) {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "{a=1;b=2;c=3;}");
    let options = SearchOptions::default().with_recursive_search(recursive);
    let pattern = Pattern::compile_with("'_T*;", language, options).expect("pattern");
    let matches = pattern.find_all(&parsed);

    assert_eq!(matches.len(), 1);
    let run = matches
        .first()
        .and_then(|found| found.capture("_T"))
        .and_then(CapturedValue::as_multiple)
        .expect("_T");
    assert_eq!(run.nodes().len(), 3);
    assert_eq!(run.text(), "a=1;b=2;c=3;");
}

#[test]
fn a_wrapped_rust_block_is_not_a_statement_run() {
    let found = count(SupportedLanguage::Rust, "'_T*;", "{ let a = 1; let b = 2; }");
    assert_eq!(found, 1);
}

#[rstest]
#[case("x;\n", 0)]
#[case("x;\nfoo();\n", 1)]
fn long_statement_lists_are_searched_once_per_start(
    #[case] line: &str,
    #[case] expected: usize,
) {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, &line.repeat(400));
    let pattern = Pattern::compile("'_a*; foo();", language).expect("pattern");
    let started = Instant::now();
    let matches = pattern.find_all(&parsed);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(matches.len(), expected);
}

#[test]
fn statement_runs_do_not_overlap() {
    assert_eq!(
        count(SupportedLanguage::TypeScript, "'T; 'T;", "x; x; x; x; x;"),
        2
    );
}

#[test]
fn bindings_at_enumerates_every_split() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "f(1, 2);");
    let pattern = Pattern::compile("f('a*, 'b*)", language).expect("pattern");
    let call = parsed
        .root_node()
        .named_child(0)
        .and_then(|stmt| stmt.named_child(0))
        .expect("call");

    let splits: Vec<(String, String)> = Matcher::new(&pattern)
        .bindings_at(&parsed, call)
        .iter()
        .map(|captures| {
            let text = |name: &str| {
                captures
                    .get(name)
                    .map(|value| value.text().to_owned())
                    .unwrap_or_default()
            };
            (text("a"), text("b"))
        })
        .collect();
    assert_eq!(
        splits,
        [
            ("1, 2".to_owned(), String::new()),
            ("1".to_owned(), "2".to_owned()),
            (String::new(), "1, 2".to_owned()),
        ]
    );
}

#[test]
fn lazy_quantifier_prefers_the_shortest_run() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "f(1, 2);");
    let pattern = Pattern::compile("f('a*?, 'b*)", language).expect("pattern");
    let found = pattern.find_first(&parsed).expect("match");

    let a = found.capture("a").and_then(CapturedValue::as_multiple).expect("a");
    let b = found.capture("b").and_then(CapturedValue::as_multiple).expect("b");
    assert!(a.is_empty());
    assert_eq!(b.nodes().len(), 2);
}

#[test]
fn negated_constraint_partitions_the_candidates() {
    let source = "foo = 1; bar = 1; fooBar = 1; baz = 2;";
    let language = SupportedLanguage::TypeScript;
    let all = count(language, "'x = 1;", source);
    let positive = count(language, "'x:[regex(foo.*)] = 1;", source);
    let negative = count(language, "'x:[!regex(foo.*)] = 1;", source);

    assert_eq!(all, 3);
    assert_eq!(positive, 2);
    assert_eq!(positive + negative, all);
}

#[test]
fn reference_constraint_waits_for_its_target() {
    let language = SupportedLanguage::TypeScript;
    let source = "count = 2;\nlet count = 1;\nother = 2;\nlet other2 = 1;";
    let pattern = Pattern::compile(
        "'target:[ref(v)] = 'value; let 'v = 'init;",
        language,
    )
    .expect("pattern");
    let parsed = parse(language, source);
    let matches = pattern.find_all(&parsed);

    assert_eq!(matches.len(), 1);
    let found = matches.first().expect("match");
    assert_eq!(found.capture("v").map(CapturedValue::text), Some("count"));
}

#[rstest]
#[case(r#"within("if ('_c) { '_s*; }")"#, "x")]
#[case(r#"!within("if ('_c) { '_s*; }")"#, "y")]
fn within_checks_the_enclosing_code(#[case] constraint: &str, #[case] expected: &str) {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "if (ready) { x = 1; }\ny = 2;");
    let pattern = Pattern::builder("'v = 'n;", language)
        .constraint("v", constraint)
        .build()
        .expect("pattern");
    let matches = pattern.find_all(&parsed);

    let bound: Vec<&str> = matches
        .iter()
        .filter_map(|found| found.capture("v"))
        .map(CapturedValue::text)
        .collect();
    assert_eq!(bound, [expected]);
}

#[test]
fn within_is_written_inline_in_a_constraint_block() {
    let language = SupportedLanguage::TypeScript;
    let source = "function f() { log(1); }\nlog(2);";
    let inline = r#"log('n:[within("function '_f() { '_body*; }")])"#;
    assert_eq!(count(language, inline, source), 1);
    assert_eq!(count(language, "log('n)", source), 2);
}

#[test]
fn string_templates_capture_text() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "log(\"upload failed\");\nlog(\"ok\");");
    let pattern = Pattern::compile("log(\"$msg$ failed\")", language).expect("pattern");
    let matches = pattern.find_all(&parsed);

    assert_eq!(matches.len(), 1);
    let msg = matches
        .first()
        .and_then(|found| found.capture("msg"))
        .and_then(CapturedValue::as_text)
        .expect("msg");
    assert_eq!(msg.text(), "upload");
    assert_eq!(parsed.source().get(msg.byte_range()), Some("upload"));
}

#[test]
fn comment_templates_match_comment_bodies() {
    let language = SupportedLanguage::TypeScript;
    let source = "// TODO: fix parser\nlet a = 1; /* TODO: later */\n/** TODO: docs */";
    let parsed = parse(language, source);

    let plain = Pattern::compile("// TODO: $what$", language).expect("pattern");
    let found: Vec<&str> = plain
        .find_all(&parsed)
        .iter()
        .filter_map(|found| found.capture("what").map(CapturedValue::text))
        .collect();
    assert_eq!(found, ["fix parser", "later", "docs"]);

    let doc = Pattern::compile("/** TODO: $what$ */", language).expect("pattern");
    assert_eq!(doc.find_all(&parsed).len(), 1);
}

#[test]
fn distinct_merges_equal_bindings() {
    let source = "log(a); log(b); log(a);";
    assert_eq!(count_with("log('x)", source, SearchOptions::default()), 3);
    assert_eq!(
        count_with("log('x)", source, SearchOptions::default().with_distinct(true)),
        2
    );
}

#[test]
fn recursive_search_controls_nested_matches() {
    let source = "f(f(1));";
    assert_eq!(count_with("f('x)", source, SearchOptions::default()), 2);
    assert_eq!(
        count_with(
            "f('x)",
            source,
            SearchOptions::default().with_recursive_search(false)
        ),
        1
    );
}

#[test]
fn loose_matching_treats_a_single_statement_block_as_the_statement() {
    let pattern = "if (x) { foo(); }";
    let source = "if (x) foo();";
    assert_eq!(count_with(pattern, source, SearchOptions::default()), 1);
    assert_eq!(
        count_with(
            pattern,
            source,
            SearchOptions::default().with_loose_matching(false)
        ),
        0
    );
}

#[test]
fn case_insensitive_matching_folds_tokens() {
    let source = "FOO(1);";
    assert_eq!(count_with("foo(1)", source, SearchOptions::default()), 0);
    assert_eq!(
        count_with(
            "foo(1)",
            source,
            SearchOptions::default().with_case_sensitive_match(false)
        ),
        1
    );
}

#[test]
fn max_matches_caps_the_results() {
    let options = SearchOptions::default().with_max_matches(2);
    assert_eq!(count_with("log('x)", "log(1); log(2); log(3);", options), 2);
}

#[test]
fn cancellation_stops_before_the_next_candidate() {
    let language = SupportedLanguage::TypeScript;
    let parsed = parse(language, "log(1); log(2);");
    let pattern = Pattern::compile("log('x)", language).expect("pattern");
    let flag = AtomicBool::new(false);
    let matcher = Matcher::new(&pattern).with_cancellation(&flag);

    assert_eq!(matcher.find_all(&parsed).len(), 2);
    flag.store(true, Ordering::Relaxed);
    assert!(matcher.find_all(&parsed).is_empty());
}

#[test]
fn language_mismatch_finds_nothing() {
    let pattern = Pattern::compile("print('x)", SupportedLanguage::Python).expect("pattern");
    let parsed = parse(SupportedLanguage::TypeScript, "print(1);");
    assert!(pattern.find_all(&parsed).is_empty());
}

#[rstest]
#[case(SupportedLanguage::Rust, "let $x$ = $y$;", "fn main() { let a = 1; let b = 2; }", 2)]
#[case(SupportedLanguage::Python, "print('x)", "print(1)\nprint(2)\n", 2)]
#[case(SupportedLanguage::TypeScript, "print('x)", "print(1);\nprint(2);\n", 2)]
fn matches_in_every_language(
    #[case] language: SupportedLanguage,
    #[case] pattern: &str,
    #[case] source: &str,
    #[case] expected: usize,
) {
    assert_eq!(count(language, pattern, source), expected);
}

#[test]
fn match_result_reports_positions() {
    let language = SupportedLanguage::Rust;
    let parsed = parse(language, "fn main() {\n    let a = 1;\n}");
    let pattern = Pattern::compile("let $x$ = 1;", language).expect("pattern");
    let found = pattern.find_first(&parsed).expect("match");

    assert_eq!(found.start_position(), (2, 5));
    assert_eq!(found.end_position(), (2, 15));
    assert_eq!(found.text(), "let a = 1;");
}
