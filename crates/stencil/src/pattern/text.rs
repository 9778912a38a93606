//! Text templates for comment and string-literal patterns.
//!
//! Comments and string literals are opaque leaves to the grammar, so a
//! placeholder inside one is matched against the literal's body text rather
//! than against syntax nodes.

use std::fmt;
use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::error::StencilError;
use crate::placeholder::{Segment, Tokenized, split_markers};

/// What kind of leaf a text template matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextCategory {
    /// A comment; doc-comment templates only match doc comments.
    Comment {
        /// Whether the template was written as a doc comment.
        doc: bool,
    },
    /// The body of a string literal.
    StringLiteral,
}

/// A piece of a text template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextSegment {
    /// Text that must appear literally (whitespace runs match any whitespace).
    Literal(String),
    /// A variable capturing the text between its neighbours.
    Variable(String),
}

/// A compiled comment or string-literal template.
#[derive(Clone)]
pub struct TextTemplate {
    category: TextCategory,
    segments: Vec<TextSegment>,
    regex: Regex,
}

impl TextTemplate {
    pub(crate) fn compile(
        category: TextCategory,
        body: &str,
        tokenized: &Tokenized,
        case_sensitive: bool,
    ) -> Result<Self, StencilError> {
        let mut segments = Vec::new();
        for part in split_markers(body) {
            match part {
                Segment::Literal(text) => segments.push(TextSegment::Literal(text.to_owned())),
                Segment::Marker(index) => {
                    let placeholder = tokenized.placeholders.get(index).ok_or_else(|| {
                        StencilError::internal(format!("marker {index} has no placeholder"))
                    })?;
                    segments.push(TextSegment::Variable(placeholder.name.clone()));
                }
            }
        }

        let mut source = String::from("^");
        for segment in &segments {
            match segment {
                TextSegment::Literal(text) => {
                    let words: Vec<String> = text.split_whitespace().map(regex::escape).collect();
                    if text.starts_with(char::is_whitespace) {
                        source.push_str(r"\s*");
                    }
                    source.push_str(&words.join(r"\s+"));
                    if text.ends_with(char::is_whitespace) && !words.is_empty() {
                        source.push_str(r"\s*");
                    }
                }
                TextSegment::Variable(_) => source.push_str("(?s:(.*?))"),
            }
        }
        source.push('$');

        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|err| StencilError::internal(err.to_string()))?;

        Ok(Self {
            category,
            segments,
            regex,
        })
    }

    /// Returns the leaf category this template matches.
    #[must_use]
    pub const fn category(&self) -> TextCategory {
        self.category
    }

    /// Returns the template pieces in order.
    #[must_use]
    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Returns the variable names in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            TextSegment::Variable(name) => Some(name.as_str()),
            TextSegment::Literal(_) => None,
        })
    }

    /// Matches `body` and returns the captured range for each variable
    /// segment, relative to `body`.
    pub(crate) fn captures(&self, body: &str) -> Option<Vec<Range<usize>>> {
        let captures = self.regex.captures(body)?;
        Some(
            captures
                .iter()
                .skip(1)
                .map(|group| group.map_or(0..0, |m| m.range()))
                .collect(),
        )
    }
}

impl PartialEq for TextTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.segments == other.segments
    }
}

impl fmt::Debug for TextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextTemplate")
            .field("category", &self.category)
            .field("segments", &self.segments)
            .finish_non_exhaustive()
    }
}

/// Locates the body of a comment: the text between its delimiters, trimmed.
///
/// Returns the body range within `text` and whether the comment is a doc
/// comment.
pub(crate) fn comment_body(text: &str) -> (Range<usize>, bool) {
    let (open, close, doc) = if text.starts_with("///") && !text.starts_with("////") {
        (3, 0, true)
    } else if text.starts_with("//!") {
        (3, 0, true)
    } else if text.starts_with("//") {
        (2, 0, false)
    } else if text.starts_with("/**") && text != "/**/" {
        (3, 2, true)
    } else if text.starts_with("/*!") {
        (3, 2, true)
    } else if text.starts_with("/*") {
        (2, 2, false)
    } else if text.starts_with('#') {
        (1, 0, false)
    } else {
        (0, 0, false)
    };

    let end = if close > 0 && text.ends_with("*/") {
        text.len().saturating_sub(close)
    } else {
        text.trim_end_matches(['\r', '\n']).len()
    };
    (trim_range(text, open.min(end)..end), doc)
}

/// Locates the body of a string literal, between its quotes.
pub(crate) fn string_body(text: &str) -> Range<usize> {
    let Some(quote_at) = text.find(['"', '\'', '`']) else {
        return 0..text.len();
    };
    let prefix = text.get(..quote_at).unwrap_or_default();
    let hashes = prefix.chars().filter(|c| *c == '#').count();
    let rest = text.get(quote_at..).unwrap_or_default();
    let delimiter = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        3
    } else {
        1
    };

    let start = quote_at + delimiter;
    let end = text.len().saturating_sub(delimiter + hashes);
    if end < start {
        return start.min(text.len())..start.min(text.len());
    }
    start..end
}

fn trim_range(text: &str, range: Range<usize>) -> Range<usize> {
    let Some(slice) = text.get(range.clone()) else {
        return range.start..range.start;
    };
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    let start = range.start + leading;
    let end = range.end.saturating_sub(trailing).max(start);
    start..end
}
