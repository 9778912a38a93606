//! Parsing a tokenized pattern as a fragment of the target grammar.

use std::ops::Range;

use tree_sitter::Node;

use crate::error::StencilError;
use crate::language::SupportedLanguage;
use crate::options::PatternContext;
use crate::parser::{ParseResult, Parser};

/// Contexts tried, in order, when the caller does not pick one.
const DEFAULT_CONTEXTS: &[PatternContext] = &[
    PatternContext::File,
    PatternContext::Statement,
    PatternContext::Member,
];

/// A pattern fragment parsed inside a context wrapper.
#[derive(Debug)]
pub(crate) struct Fragment {
    parsed: ParseResult,
    context: PatternContext,
    /// Offset of the fragment's first byte inside the wrapped text.
    start: usize,
    /// Trimmed extent of the fragment inside the wrapped text.
    region: Range<usize>,
    indent: &'static str,
}

impl Fragment {
    /// Parses `text` as a fragment of `language` in the requested context.
    ///
    /// # Errors
    ///
    /// Returns [`StencilError::UnsupportedPattern`] when the text is empty or
    /// does not parse cleanly in any candidate context.
    pub(crate) fn parse(
        text: &str,
        language: SupportedLanguage,
        requested: PatternContext,
    ) -> Result<Self, StencilError> {
        if text.trim().is_empty() {
            return Err(StencilError::unsupported(language, "pattern is empty"));
        }

        let contexts: &[PatternContext] = match requested {
            PatternContext::Default => DEFAULT_CONTEXTS,
            PatternContext::File => &[PatternContext::File],
            PatternContext::Member => &[PatternContext::Member],
            PatternContext::Statement => &[PatternContext::Statement],
            PatternContext::Expression => &[PatternContext::Expression],
        };

        let profile = language.profile();
        let mut parser = Parser::new(language)?;
        for context in contexts {
            let (prefix, suffix, indent) = profile
                .wrapper(*context)
                .map_or(("", "", ""), |w| (w.prefix, w.suffix, w.indent));

            let mut wrapped = String::with_capacity(prefix.len() + text.len() + suffix.len());
            wrapped.push_str(prefix);
            let start = wrapped.len();
            for (idx, line) in text.split('\n').enumerate() {
                if idx > 0 {
                    wrapped.push('\n');
                }
                wrapped.push_str(indent);
                wrapped.push_str(line);
            }
            let end = wrapped.len();
            wrapped.push_str(suffix);

            let parsed = parser.parse(&wrapped)?;
            if parsed.has_errors() {
                continue;
            }
            let region = trimmed(&wrapped, start..end);
            return Ok(Self {
                parsed,
                context: *context,
                start,
                region,
                indent,
            });
        }

        let tried: Vec<String> = contexts.iter().map(ToString::to_string).collect();
        Err(StencilError::unsupported(
            language,
            format!(
                "pattern is not a valid {language} fragment in context {}",
                tried.join(", ")
            ),
        ))
    }

    pub(crate) const fn parsed(&self) -> &ParseResult {
        &self.parsed
    }

    pub(crate) const fn context(&self) -> PatternContext {
        self.context
    }

    /// Returns the outermost nodes that lie entirely inside the fragment.
    pub(crate) fn roots(&self) -> Vec<Node<'_>> {
        let Range { start, end } = self.region;
        let profile = self.parsed.language().profile();
        let mut node = self.parsed.root_node();
        loop {
            let mut cursor = node.walk();
            let overlapping: Vec<Node<'_>> = node
                .children(&mut cursor)
                .filter(|child| child.start_byte() < end && child.end_byte() > start)
                .collect();

            if let [single] = overlapping.as_slice() {
                let inside = single.start_byte() >= start && single.end_byte() <= end;
                let bare_container = profile.is_statement_container(single.kind())
                    && single.child(0).is_some_and(|first| first.is_named());
                if inside && !bare_container {
                    return vec![*single];
                }
                if single.child_count() == 0 {
                    return if inside { vec![*single] } else { Vec::new() };
                }
                node = *single;
                continue;
            }

            return overlapping
                .into_iter()
                .filter(|child| child.start_byte() >= start && child.end_byte() <= end)
                .collect();
        }
    }

    /// Maps an offset in the wrapped text back to the tokenized pattern.
    pub(crate) fn local_offset(&self, wrapped: usize) -> usize {
        let relative = wrapped.saturating_sub(self.start);
        if self.indent.is_empty() {
            return relative;
        }
        let preceding = self
            .parsed
            .source()
            .get(self.start..wrapped.max(self.start))
            .unwrap_or_default();
        let lines = preceding.matches('\n').count() + 1;
        relative.saturating_sub(self.indent.len() * lines)
    }

    /// Maps a node's byte range back to the tokenized pattern.
    pub(crate) fn local_range(&self, node: Node<'_>) -> Range<usize> {
        self.local_offset(node.start_byte())..self.local_offset(node.end_byte())
    }
}

fn trimmed(text: &str, range: Range<usize>) -> Range<usize> {
    let slice = text.get(range.clone()).unwrap_or_default();
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());
    start..end.max(start)
}
