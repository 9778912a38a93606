//! Placeholder tokenizer shared by search patterns and replacement templates.
//!
//! Patterns are written in the target language with two placeholder sigils:
//! `'name` (languages where `'` is not part of ordinary identifiers) and
//! `$name$` (every language). A placeholder may carry a quantifier suffix and
//! a constraint suffix:
//!
//! ```text
//! 'args*            zero or more, greedy
//! 'stmt{1,3}?       one to three, lazy
//! 'name:get.*       bare regex constraint
//! 'ty:*Base         regex tried against the type and its supertypes
//! 'x:[regexw(id) && !read]
//! ```
//!
//! Tokenizing replaces each placeholder by a marker identifier that every
//! supported grammar accepts, so the remaining text can be parsed normally.

use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

use crate::error::StencilError;
use crate::pattern::Quantifier;
use crate::profile::LanguageProfile;

const MARKER_PREFIX: &str = "__stencil_var_";
const MARKER_SUFFIX: &str = "__";

/// Prefix of the generated names given to anonymous placeholders.
pub(crate) const ANONYMOUS_PREFIX: &str = "_#";

/// Constraint text attached to a placeholder occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawConstraint {
    /// The inside of a `[ ... ]` block.
    Block { text: String, offset: usize },
    /// A bare regular expression, optionally negated with a leading `!`.
    Bare {
        regex: String,
        negated: bool,
        offset: usize,
    },
}

impl RawConstraint {
    /// Canonical text used to detect conflicting declarations.
    pub(crate) fn canonical(&self, hierarchy: bool) -> String {
        let star = if hierarchy { "*" } else { "" };
        match self {
            Self::Block { text, .. } => format!("{star}[{}]", text.trim()),
            Self::Bare { regex, negated, .. } => {
                let bang = if *negated { "!" } else { "" };
                format!("{star}{bang}{regex}")
            }
        }
    }
}

/// One placeholder occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub(crate) name: String,
    pub(crate) anonymous: bool,
    pub(crate) quantifier: Quantifier,
    pub(crate) constraint: Option<RawConstraint>,
    pub(crate) hierarchy: bool,
    /// Byte offset of the sigil in the original text.
    pub(crate) offset: usize,
    /// Range of the marker in the tokenized text.
    pub(crate) marker_range: Range<usize>,
}

/// Text with placeholders replaced by markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tokenized {
    pub(crate) text: String,
    pub(crate) placeholders: Vec<Placeholder>,
}

impl Tokenized {
    /// Returns the placeholder whose marker is exactly `text`.
    pub(crate) fn placeholder_for_marker(&self, text: &str) -> Option<&Placeholder> {
        marker_index(text).and_then(|index| self.placeholders.get(index))
    }

    /// Returns whether `text` contains any marker.
    pub(crate) fn contains_marker(text: &str) -> bool {
        text.contains(MARKER_PREFIX)
    }
}

/// Builds the marker identifier for the placeholder at `index`.
pub(crate) fn marker_for(index: usize) -> String {
    format!("{MARKER_PREFIX}{index}{MARKER_SUFFIX}")
}

/// Extracts the occurrence index from a marker identifier.
pub(crate) fn marker_index(text: &str) -> Option<usize> {
    text.strip_prefix(MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
        .and_then(|digits| digits.parse().ok())
}

/// A piece of tokenized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Marker(usize),
}

/// Splits `text` into literal runs and marker occurrences.
pub(crate) fn split_markers(text: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(MARKER_PREFIX) {
        let after_prefix = rest.get(start + MARKER_PREFIX.len()..).unwrap_or_default();
        let digits = after_prefix
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_prefix.len());
        let marker_len = MARKER_PREFIX.len() + digits + MARKER_SUFFIX.len();
        let candidate = rest.get(start..start + marker_len).unwrap_or_default();
        let Some(index) = marker_index(candidate) else {
            let literal_end = start + MARKER_PREFIX.len();
            parts.push(Segment::Literal(rest.get(..literal_end).unwrap_or_default()));
            rest = rest.get(literal_end..).unwrap_or_default();
            continue;
        };
        if start > 0 {
            parts.push(Segment::Literal(rest.get(..start).unwrap_or_default()));
        }
        parts.push(Segment::Marker(index));
        rest = rest.get(start + marker_len..).unwrap_or_default();
    }
    if !rest.is_empty() {
        parts.push(Segment::Literal(rest));
    }
    parts
}

pub(crate) const fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) const fn is_name_continuation(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replaces placeholders in `source` by markers.
///
/// # Errors
///
/// Returns [`StencilError::MalformedPattern`] for unterminated or inverted
/// quantifier ranges, unterminated constraint blocks and placeholders glued
/// to a following identifier.
pub(crate) fn tokenize(source: &str, profile: &LanguageProfile) -> Result<Tokenized, StencilError> {
    Tokenizer {
        source,
        chars: source.char_indices().peekable(),
        quote_sigil: profile.quote_sigil,
        optional_suffix: !profile.postfix_try,
        out: String::with_capacity(source.len()),
        placeholders: Vec::new(),
    }
    .run()
}

struct Tokenizer<'s> {
    source: &'s str,
    chars: Peekable<CharIndices<'s>>,
    quote_sigil: bool,
    optional_suffix: bool,
    out: String,
    placeholders: Vec<Placeholder>,
}

impl<'s> Tokenizer<'s> {
    fn run(mut self) -> Result<Tokenized, StencilError> {
        while let Some((offset, ch)) = self.chars.next() {
            match ch {
                '$' => self.dollar(offset)?,
                '\'' if self.quote_sigil => self.quote(offset)?,
                other => self.out.push(other),
            }
        }
        Ok(Tokenized {
            text: self.out,
            placeholders: self.placeholders,
        })
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |(idx, _)| *idx)
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            let valid = if name.is_empty() {
                is_name_start(c)
            } else {
                is_name_continuation(c)
            };
            if !valid {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        name
    }

    fn dollar(&mut self, offset: usize) -> Result<(), StencilError> {
        if self.peek_char() == Some('$') {
            self.chars.next();
            self.out.push('$');
            return Ok(());
        }
        if !self.peek_char().is_some_and(is_name_start) {
            self.out.push('$');
            return Ok(());
        }

        let name = self.read_name();
        if self.peek_char() != Some('$') {
            self.out.push('$');
            self.out.push_str(&name);
            return Ok(());
        }
        self.chars.next();
        if self.peek_char().is_some_and(is_name_continuation) {
            return Err(StencilError::malformed(
                offset,
                format!("placeholder ${name}$ is immediately followed by an identifier"),
            ));
        }
        self.placeholder(name, offset)
    }

    fn quote(&mut self, offset: usize) -> Result<(), StencilError> {
        match self.peek_char() {
            Some('\'') if self.peek_second().is_some_and(is_name_start) => {
                self.chars.next();
                self.out.push('\'');
                Ok(())
            }
            Some(c) if is_name_start(c) => {
                let name = self.read_name();
                if self.peek_char() == Some('\'') {
                    // A quoted word is a string literal.
                    self.chars.next();
                    self.out.push('\'');
                    self.out.push_str(&name);
                    self.out.push('\'');
                    return Ok(());
                }
                self.placeholder(name, offset)
            }
            _ => {
                self.out.push('\'');
                Ok(())
            }
        }
    }

    fn placeholder(&mut self, name: String, offset: usize) -> Result<(), StencilError> {
        let quantifier = self.quantifier()?;
        let (constraint, hierarchy) = self.constraint()?;

        let index = self.placeholders.len();
        let anonymous = name == "_";
        let reported = if anonymous {
            format!("{ANONYMOUS_PREFIX}{index}")
        } else {
            name
        };
        let marker = marker_for(index);
        let start = self.out.len();
        self.out.push_str(&marker);
        self.placeholders.push(Placeholder {
            name: reported,
            anonymous,
            quantifier,
            constraint,
            hierarchy,
            offset,
            marker_range: start..self.out.len(),
        });
        Ok(())
    }

    fn quantifier(&mut self) -> Result<Quantifier, StencilError> {
        let base = match self.peek_char() {
            Some('?') if self.optional_suffix && self.peek_second() != Some('.') => {
                self.chars.next();
                Quantifier::optional()
            }
            Some('*') => {
                self.chars.next();
                Quantifier::any()
            }
            Some('+') => {
                self.chars.next();
                Quantifier::at_least_one()
            }
            Some('{') if self.peek_second().is_some_and(|c| c.is_ascii_digit() || c == ',') => {
                let start = self.position();
                self.chars.next();
                self.range(start)?
            }
            _ => return Ok(Quantifier::one()),
        };

        if self.peek_char() == Some('?') && self.peek_second() != Some('.') {
            self.chars.next();
            return Ok(base.lazy());
        }
        Ok(base)
    }

    fn range(&mut self, start: usize) -> Result<Quantifier, StencilError> {
        let mut body = String::new();
        loop {
            match self.chars.next() {
                Some((_, '}')) => break,
                Some((_, c)) if c.is_ascii_digit() || c == ',' || c == ' ' => body.push(c),
                Some((idx, c)) => {
                    return Err(StencilError::malformed(
                        idx,
                        format!("unexpected '{c}' in quantifier range"),
                    ));
                }
                None => {
                    return Err(StencilError::malformed(
                        start,
                        "unterminated quantifier range",
                    ));
                }
            }
        }

        let parse_bound = |text: &str| -> Result<Option<u32>, StencilError> {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse()
                .map(Some)
                .map_err(|_| StencilError::malformed(start, "quantifier bound is out of range"))
        };

        let (min, max) = match body.split_once(',') {
            Some((low, high)) => (parse_bound(low)?.unwrap_or(0), parse_bound(high)?),
            None => {
                let exact = parse_bound(&body)?
                    .ok_or_else(|| StencilError::malformed(start, "empty quantifier range"))?;
                (exact, Some(exact))
            }
        };

        if max.is_some_and(|high| high < min) {
            return Err(StencilError::malformed(
                start,
                format!("quantifier minimum {min} exceeds its maximum"),
            ));
        }
        Ok(Quantifier::new(min, max))
    }

    fn constraint(&mut self) -> Result<(Option<RawConstraint>, bool), StencilError> {
        if self.peek_char() != Some(':') {
            return Ok((None, false));
        }
        let next = self.peek_second();
        let opens = match next {
            Some('[' | '*' | '!') => true,
            Some(c) => !c.is_whitespace() && !matches!(c, '$' | '\'' | '"' | ':' | ')' | ']' | '}'),
            None => false,
        };
        if !opens {
            return Ok((None, false));
        }
        self.chars.next();

        let hierarchy = self.peek_char() == Some('*');
        if hierarchy {
            self.chars.next();
        }

        if self.peek_char() == Some('[') {
            let open = self.position();
            self.chars.next();
            let text = self.block(open)?;
            return Ok((
                Some(RawConstraint::Block {
                    text,
                    offset: open + 1,
                }),
                hierarchy,
            ));
        }

        let negated = self.peek_char() == Some('!');
        if negated {
            self.chars.next();
        }
        let offset = self.position();
        let regex = self.bare();
        if regex.is_empty() {
            return Err(StencilError::malformed(offset, "empty constraint"));
        }
        Ok((
            Some(RawConstraint::Bare {
                regex,
                negated,
                offset,
            }),
            hierarchy,
        ))
    }

    fn block(&mut self, open: usize) -> Result<String, StencilError> {
        let mut text = String::new();
        let mut depth = 0_usize;
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(StencilError::malformed(open, "unterminated constraint block"));
            };
            match c {
                '\\' => {
                    text.push(c);
                    if let Some((_, escaped)) = self.chars.next() {
                        text.push(escaped);
                    }
                }
                '[' => {
                    depth += 1;
                    text.push(c);
                }
                ']' if depth == 0 => return Ok(text),
                ']' => {
                    depth -= 1;
                    text.push(c);
                }
                other => text.push(other),
            }
        }
    }

    fn bare(&mut self) -> String {
        let mut text = String::new();
        let mut depth = 0_usize;
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.chars.next();
                    text.push(c);
                    if let Some((_, escaped)) = self.chars.next() {
                        text.push(escaped);
                    }
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                ';' | ',' | '\'' | '"' | '`' if depth == 0 => break,
                _ if c.is_whitespace() => break,
                _ => {}
            }
            self.chars.next();
            text.push(c);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{RUST, TYPESCRIPT};
    use rstest::rstest;

    fn only(source: &str) -> Placeholder {
        let tokenized = tokenize(source, &TYPESCRIPT).expect("tokenize");
        assert_eq!(tokenized.placeholders.len(), 1, "in {source}");
        tokenized.placeholders.into_iter().next().expect("placeholder")
    }

    #[test]
    fn replaces_both_sigils_with_markers() {
        let tokenized = tokenize("'a = $b$;", &TYPESCRIPT).expect("tokenize");
        assert_eq!(tokenized.text, "__stencil_var_0__ = __stencil_var_1__;");
        let names: Vec<_> = tokenized.placeholders.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[rstest]
    #[case("'x", Quantifier::one())]
    #[case("'x?", Quantifier::optional())]
    #[case("'x*", Quantifier::any())]
    #[case("'x+", Quantifier::at_least_one())]
    #[case("'x{2}", Quantifier::new(2, Some(2)))]
    #[case("'x{1,}", Quantifier::new(1, None))]
    #[case("'x{,3}", Quantifier::new(0, Some(3)))]
    #[case("'x{1,3}?", Quantifier::new(1, Some(3)).lazy())]
    #[case("'x*?", Quantifier::any().lazy())]
    fn parses_quantifier_suffixes(#[case] source: &str, #[case] expected: Quantifier) {
        assert_eq!(only(source).quantifier, expected);
    }

    #[rstest]
    #[case("'x{1,3")]
    #[case("'x{3,1}")]
    #[case("'x{1,a}")]
    fn rejects_bad_ranges(#[case] source: &str) {
        let err = tokenize(source, &TYPESCRIPT).expect_err("malformed");
        assert!(err.is_malformed(), "{err}");
    }

    #[test]
    fn rust_question_mark_stays_the_try_operator() {
        let tokenized = tokenize("$call$?;", &RUST).expect("tokenize");
        assert_eq!(tokenized.text, "__stencil_var_0__?;");
        assert_eq!(
            tokenized.placeholders.first().map(|p| p.quantifier),
            Some(Quantifier::one())
        );
    }

    #[test]
    fn quoted_words_stay_string_literals() {
        let tokenized = tokenize("f('abc')", &TYPESCRIPT).expect("tokenize");
        assert_eq!(tokenized.text, "f('abc')");
        assert!(tokenized.placeholders.is_empty());
    }

    #[test]
    fn escapes_produce_literal_sigils() {
        let tokenized = tokenize("''x + $$y", &TYPESCRIPT).expect("tokenize");
        assert_eq!(tokenized.text, "'x + $y");
        assert!(tokenized.placeholders.is_empty());
    }

    #[test]
    fn rust_ignores_the_quote_sigil() {
        let tokenized = tokenize("fn f<'a>(x: &'a str) { $body$; }", &RUST).expect("tokenize");
        assert!(tokenized.text.starts_with("fn f<'a>(x: &'a str)"));
        assert_eq!(tokenized.placeholders.len(), 1);
    }

    #[test]
    fn anonymous_placeholders_get_unique_names() {
        let tokenized = tokenize("'_ + '_", &TYPESCRIPT).expect("tokenize");
        let [first, second] = tokenized.placeholders.as_slice() else {
            panic!("expected two placeholders");
        };
        assert!(first.anonymous && second.anonymous);
        assert_ne!(first.name, second.name);
    }

    #[test]
    fn reads_block_and_bare_constraints() {
        let block = only("'x:[regex( a[bc] ) && !read];");
        assert_eq!(
            block.constraint,
            Some(RawConstraint::Block {
                text: "regex( a[bc] ) && !read".to_owned(),
                offset: 4,
            })
        );

        let bare = only("'T:*!Base,");
        assert!(bare.hierarchy);
        assert!(matches!(
            bare.constraint,
            Some(RawConstraint::Bare { ref regex, negated: true, .. }) if regex == "Base"
        ));
    }

    #[test]
    fn colon_followed_by_space_is_not_a_constraint() {
        let tokenized = tokenize("{ 'k: 'v }", &TYPESCRIPT).expect("tokenize");
        assert_eq!(tokenized.placeholders.len(), 2);
        assert!(tokenized.placeholders.iter().all(|p| p.constraint.is_none()));
    }

    #[test]
    fn unterminated_block_is_malformed() {
        let err = tokenize("'x:[regex(a)", &TYPESCRIPT).expect_err("malformed");
        assert!(err.is_malformed());
    }

    #[test]
    fn glued_dollar_placeholder_is_malformed() {
        let err = tokenize("$a$b", &TYPESCRIPT).expect_err("malformed");
        assert!(err.is_malformed());
    }

    #[test]
    fn split_markers_separates_literals() {
        let parts = split_markers("x __stencil_var_3__ is null");
        assert_eq!(
            parts,
            vec![
                Segment::Literal("x "),
                Segment::Marker(3),
                Segment::Literal(" is null")
            ]
        );
    }
}
