//! Recursive-descent parser for constraint blocks.

use crate::error::StencilError;
use crate::language::SupportedLanguage;
use crate::options::{PatternContext, SearchOptions};
use crate::pattern::Pattern;
use crate::placeholder::{is_name_continuation, is_name_start};

use super::{ConstraintExpr, Predicate, TextRegex, TypePattern};

/// Settings of the pattern a constraint block belongs to. Patterns nested
/// in `within(...)` compile with the same language and options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dialect {
    pub(crate) language: SupportedLanguage,
    pub(crate) options: SearchOptions,
}

impl Dialect {
    const fn case_sensitive(&self) -> bool {
        self.options.case_sensitive_match()
    }
}

/// Parses the inside of a `[ ... ]` constraint block.
///
/// `base` is the offset of the block text inside the pattern, used for error
/// reporting.
pub(crate) fn parse_block(
    text: &str,
    base: usize,
    dialect: Dialect,
) -> Result<ConstraintExpr, StencilError> {
    let mut parser = BlockParser {
        text,
        pos: 0,
        base,
        dialect,
    };
    let expr = parser.or()?;
    parser.skip_ws();
    if parser.pos < text.len() {
        return Err(parser.error("unexpected text after constraint"));
    }
    Ok(expr)
}

/// Builds the constraint for a bare `'name:regex` suffix.
pub(crate) fn parse_bare(
    regex: &str,
    negated: bool,
    base: usize,
    case_sensitive: bool,
) -> Result<ConstraintExpr, StencilError> {
    let atom = ConstraintExpr::Predicate(Predicate::Regex(TextRegex::new(
        regex,
        false,
        case_sensitive,
        base,
    )?));
    Ok(if negated {
        ConstraintExpr::Not(Box::new(atom))
    } else {
        atom
    })
}

struct BlockParser<'a> {
    text: &'a str,
    pos: usize,
    base: usize,
    dialect: Dialect,
}

impl<'a> BlockParser<'a> {
    fn error(&self, message: impl Into<String>) -> StencilError {
        StencilError::malformed(self.base + self.pos, message)
    }

    fn rest(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<ConstraintExpr, StencilError> {
        let mut terms = vec![self.and()?];
        while self.eat("||") {
            terms.push(self.and()?);
        }
        Ok(collapse(terms, ConstraintExpr::Or))
    }

    fn and(&mut self) -> Result<ConstraintExpr, StencilError> {
        let mut terms = vec![self.unary()?];
        while self.eat("&&") {
            terms.push(self.unary()?);
        }
        Ok(collapse(terms, ConstraintExpr::And))
    }

    fn unary(&mut self) -> Result<ConstraintExpr, StencilError> {
        if self.eat("!") {
            return Ok(ConstraintExpr::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            if !self.eat(")") {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<ConstraintExpr, StencilError> {
        self.skip_ws();
        let start = self.pos;
        let name_len = self
            .rest()
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(self.rest().len());
        if name_len == 0 {
            return Err(self.error("expected a constraint predicate"));
        }
        let name = self
            .text
            .get(start..start + name_len)
            .unwrap_or_default()
            .to_ascii_lowercase();
        self.pos += name_len;

        let argument = if self.eat("(") {
            Some(self.argument(name == "within")?)
        } else {
            None
        };
        let arg_offset = self.base + start + name_len + 1;
        let case_sensitive = self.dialect.case_sensitive();

        let predicate = match (name.as_str(), argument) {
            ("regex", Some(arg)) => {
                Predicate::Regex(TextRegex::new(arg, false, case_sensitive, arg_offset)?)
            }
            ("regexw", Some(arg)) => {
                Predicate::Regex(TextRegex::new(arg, true, case_sensitive, arg_offset)?)
            }
            ("exprtype", Some(arg)) => Predicate::ExprType(self.type_pattern(arg, arg_offset)?),
            ("formal", Some(arg)) => Predicate::FormalType(self.type_pattern(arg, arg_offset)?),
            ("ref", Some(arg)) => Predicate::Reference(reference_name(arg, arg_offset)?),
            ("read", None) => Predicate::Read,
            ("write", None) => Predicate::Write,
            ("read", Some(arg)) if arg.trim().is_empty() => Predicate::Read,
            ("write", Some(arg)) if arg.trim().is_empty() => Predicate::Write,
            ("count", Some(arg)) => count(arg, arg_offset)?,
            ("within", Some(arg)) => Predicate::Within(Box::new(self.nested(arg, arg_offset)?)),
            ("regex" | "regexw" | "exprtype" | "formal" | "ref" | "count" | "within", None) => {
                return Err(StencilError::malformed(
                    self.base + start,
                    format!("{name} requires an argument"),
                ));
            }
            (other, _) => {
                return Err(StencilError::malformed(
                    self.base + start,
                    format!("unknown constraint predicate '{other}'"),
                ));
            }
        };
        Ok(ConstraintExpr::Predicate(predicate))
    }

    /// Reads raw argument text up to the matching `)`. With `quoted`,
    /// parentheses inside double quotes are not counted.
    fn argument(&mut self, quoted: bool) -> Result<&'a str, StencilError> {
        let start = self.pos;
        let text = self.text;
        let mut depth = 0_usize;
        let mut in_quotes = false;
        let mut chars = self.rest().char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' if quoted => in_quotes = !in_quotes,
                _ if in_quotes => {}
                '(' => depth += 1,
                ')' if depth == 0 => {
                    self.pos = start + idx + 1;
                    return Ok(text.get(start..start + idx).unwrap_or_default());
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        Err(StencilError::malformed(
            self.base + start,
            "unterminated predicate argument",
        ))
    }

    /// Compiles the pattern a `within(...)` predicate searches ancestors for.
    /// The argument may be wrapped in double quotes.
    fn nested(&self, arg: &str, offset: usize) -> Result<Pattern, StencilError> {
        let lead = arg.len() - arg.trim_start().len();
        let trimmed = arg.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'));
        let (source, shift) = match unquoted {
            Some(inner) => (inner.replace("\\\"", "\""), 1),
            None => (trimmed.to_owned(), 0),
        };
        if source.trim().is_empty() {
            return Err(StencilError::malformed(offset, "within requires a pattern"));
        }
        let options = self
            .dialect
            .options
            .with_pattern_context(PatternContext::Default);
        Pattern::compile_with(&source, self.dialect.language, options).map_err(|err| match err {
            StencilError::MalformedPattern {
                message,
                offset: inner,
            } => StencilError::malformed(offset + lead + shift + inner, message),
            unsupported => unsupported,
        })
    }

    fn type_pattern(&self, arg: &str, offset: usize) -> Result<TypePattern, StencilError> {
        let (with_subtypes, regex) = match arg.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, arg),
        };
        Ok(TypePattern {
            regex: TextRegex::new(regex, false, self.dialect.case_sensitive(), offset)?,
            with_subtypes,
        })
    }
}

fn collapse(
    mut terms: Vec<ConstraintExpr>,
    join: fn(Vec<ConstraintExpr>) -> ConstraintExpr,
) -> ConstraintExpr {
    if terms.len() == 1 {
        if let Some(single) = terms.pop() {
            return single;
        }
    }
    join(terms)
}

fn reference_name(arg: &str, offset: usize) -> Result<String, StencilError> {
    let trimmed = arg.trim();
    let name = trimmed
        .strip_prefix('$')
        .and_then(|rest| rest.strip_suffix('$'))
        .or_else(|| trimmed.strip_prefix('\''))
        .unwrap_or(trimmed);
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_name_start) && chars.all(is_name_continuation);
    if !valid || name == "_" {
        return Err(StencilError::malformed(
            offset,
            format!("'{trimmed}' is not a variable name"),
        ));
    }
    Ok(name.to_owned())
}

fn count(arg: &str, offset: usize) -> Result<Predicate, StencilError> {
    let parse = |text: &str| -> Result<Option<u32>, StencilError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(None);
        }
        trimmed.parse().map(Some).map_err(|_| {
            StencilError::malformed(offset, format!("'{trimmed}' is not a count"))
        })
    };
    let (min, max) = match arg.split_once(',') {
        Some((low, high)) => (parse(low)?.unwrap_or(0), parse(high)?),
        None => (parse(arg)?.unwrap_or(0), None),
    };
    if max.is_some_and(|high| high < min) {
        return Err(StencilError::malformed(
            offset,
            format!("count minimum {min} exceeds its maximum"),
        ));
    }
    Ok(Predicate::Count { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn typescript() -> Dialect {
        Dialect {
            language: SupportedLanguage::TypeScript,
            options: SearchOptions::default(),
        }
    }

    fn parse(text: &str) -> ConstraintExpr {
        parse_block(text, 0, typescript()).expect("constraint")
    }

    fn regex(source: &str) -> ConstraintExpr {
        ConstraintExpr::Predicate(Predicate::Regex(
            TextRegex::new(source, false, true, 0).expect("regex"),
        ))
    }

    #[test]
    fn not_binds_tighter_than_and_which_binds_tighter_than_or() {
        let expr = parse("!regex(a) && regex(b) || regex(c)");
        let expected = ConstraintExpr::Or(vec![
            ConstraintExpr::And(vec![ConstraintExpr::Not(Box::new(regex("a"))), regex("b")]),
            regex("c"),
        ]);
        assert_eq!(expr, expected);
    }

    #[test]
    fn negation_applies_to_a_parenthesised_group() {
        let expr = parse("!(regex(a) || regex(b))");
        let expected = ConstraintExpr::Not(Box::new(ConstraintExpr::Or(vec![
            regex("a"),
            regex("b"),
        ])));
        assert_eq!(expr, expected);
    }

    #[test]
    fn regex_arguments_keep_nested_parentheses() {
        let expr = parse("regex((get|set)[A-Z].*)");
        assert_eq!(expr, regex("(get|set)[A-Z].*"));
    }

    #[rstest]
    #[case("exprtype(*Base)", true)]
    #[case("exprtype(Base)", false)]
    fn type_patterns_record_subtype_flag(#[case] text: &str, #[case] expected: bool) {
        let ConstraintExpr::Predicate(Predicate::ExprType(pattern)) = parse(text) else {
            panic!("expected exprtype");
        };
        assert_eq!(pattern.with_subtypes, expected);
        assert_eq!(pattern.regex.as_str(), "Base");
    }

    #[rstest]
    #[case("ref(decl)", "decl")]
    #[case("ref('decl)", "decl")]
    #[case("ref($decl$)", "decl")]
    fn ref_accepts_names_with_or_without_sigils(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(
            parse(text),
            ConstraintExpr::Predicate(Predicate::Reference(expected.to_owned()))
        );
    }

    #[rstest]
    #[case("count(2,4)", 2, Some(4))]
    #[case("count(1)", 1, None)]
    #[case("count(0,*)", 0, None)]
    fn count_bounds(#[case] text: &str, #[case] min: u32, #[case] max: Option<u32>) {
        assert_eq!(
            parse(text),
            ConstraintExpr::Predicate(Predicate::Count { min, max })
        );
    }

    #[test]
    fn read_and_write_take_no_arguments() {
        assert_eq!(
            parse("read || write()"),
            ConstraintExpr::Or(vec![
                ConstraintExpr::Predicate(Predicate::Read),
                ConstraintExpr::Predicate(Predicate::Write),
            ])
        );
    }

    #[rstest]
    #[case(r#"within("if ('_c) { '_s*; }")"#)]
    #[case("within(while ('_c) { '_s*; })")]
    fn within_compiles_a_nested_pattern(#[case] text: &str) {
        let ConstraintExpr::Predicate(Predicate::Within(pattern)) = parse(text) else {
            panic!("expected within");
        };
        assert_eq!(pattern.language(), SupportedLanguage::TypeScript);
        assert!(pattern.variable("_c").is_some());
    }

    #[test]
    fn within_skips_parentheses_inside_quotes() {
        let expr = parse(r#"!within("f(\")\")") && regex(x)"#);
        let ConstraintExpr::And(items) = expr else {
            panic!("expected conjunction");
        };
        let Some(ConstraintExpr::Not(inner)) = items.first() else {
            panic!("expected negation");
        };
        let ConstraintExpr::Predicate(Predicate::Within(pattern)) = inner.as_ref() else {
            panic!("expected within");
        };
        assert_eq!(pattern.source(), r#"f(")")"#);
        assert_eq!(items.get(1), Some(&regex("x")));
    }

    #[test]
    fn within_reports_nested_errors_at_their_offset() {
        let text = r#"within("f('x:[bogus(1)])")"#;
        let err = parse_block(text, 4, typescript()).expect_err("malformed");
        let StencilError::MalformedPattern { offset, .. } = err else {
            panic!("expected malformed pattern, got {err}");
        };
        assert_eq!(offset, 4 + text.find("bogus").unwrap_or_default());
    }

    #[rstest]
    #[case("within()")]
    #[case("within")]
    #[case("regex( a )")]
    #[case("regex()")]
    #[case("bogus(a)")]
    #[case("regex(a) &&")]
    #[case("(regex(a)")]
    #[case("regex(a")]
    #[case("count(3,1)")]
    #[case("regex(a) regex(b)")]
    fn malformed_blocks_are_rejected(#[case] text: &str) {
        let err = parse_block(text, 0, typescript()).expect_err("malformed");
        assert!(err.is_malformed(), "{text}: {err}");
    }

    #[test]
    fn bare_negated_regex_wraps_in_not() {
        let expr = parse_bare("foo", true, 0, true).expect("bare");
        assert_eq!(expr, ConstraintExpr::Not(Box::new(regex("foo"))));
    }
}
