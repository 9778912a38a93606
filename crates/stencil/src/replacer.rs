//! Replacement templates and their rendering.
//!
//! A replacement template is written like a pattern: target-language text in
//! which placeholders name variables of the search pattern. Rendering a
//! match substitutes each placeholder with the printed text of its binding.
//! Quantified bindings keep the separators that appeared between their nodes
//! in the source; an empty binding also removes the separator tied to its
//! placeholder in the template.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;
use tree_sitter::Node;

use crate::error::StencilError;
use crate::language::SupportedLanguage;
use crate::matcher::{CapturedValue, MatchResult};
use crate::options::SearchOptions;
use crate::pattern::{Fragment, Lowerer, Pattern, sole_named_child};
use crate::placeholder::{Tokenized, marker_index, tokenize};
use crate::position::line_indent;
use crate::profile::LanguageProfile;

pub(crate) const REPLACE_TARGET: &str = "stencil::replace";

/// One placeholder occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Substitution {
    name: String,
    /// Marker range in the template text.
    range: Range<usize>,
    /// Extent of the enclosing statement when the placeholder is a whole
    /// statement.
    statement: Option<Range<usize>>,
    /// Text removed when the binding is empty.
    tied: Range<usize>,
}

/// A compiled replacement template.
#[derive(Debug, Clone)]
pub struct ReplacementTemplate {
    source: String,
    text: String,
    language: SupportedLanguage,
    options: SearchOptions,
    substitutions: Vec<Substitution>,
    shortened: Vec<(Range<usize>, String)>,
    identity: bool,
}

impl ReplacementTemplate {
    /// Compiles `text` as a replacement for matches of `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`StencilError::UnsupportedPattern`] when the template names a
    /// variable the pattern does not report, uses an anonymous placeholder,
    /// or does not parse as a fragment of the pattern's language, and
    /// [`StencilError::MalformedPattern`] for placeholder syntax errors.
    pub fn compile(text: &str, pattern: &Pattern) -> Result<Self, StencilError> {
        let language = pattern.language();
        let profile = language.profile();
        let options = *pattern.options();
        let tokenized = tokenize(text, profile)?;

        for placeholder in &tokenized.placeholders {
            if placeholder.anonymous {
                return Err(StencilError::unsupported(
                    language,
                    "anonymous placeholders cannot be substituted",
                ));
            }
            if pattern
                .variable(&placeholder.name)
                .is_none_or(|spec| spec.is_anonymous())
            {
                return Err(StencilError::unsupported(
                    language,
                    format!(
                        "replacement references unknown variable '{}'",
                        placeholder.name
                    ),
                ));
            }
        }

        let fragment = Fragment::parse(&tokenized.text, language, options.pattern_context())?;
        let identity = Lowerer {
            fragment: &fragment,
            tokenized: &tokenized,
            profile,
            loose: options.loose_matching(),
            case_sensitive: options.case_sensitive_match(),
        }
        .lower_roots()
        .is_ok_and(|root| &root == pattern.root());

        let markers = marker_nodes(&fragment);
        let substitutions = tokenized
            .placeholders
            .iter()
            .enumerate()
            .map(|(index, placeholder)| {
                let statement = markers
                    .get(&index)
                    .and_then(|node| statement_extent(&fragment, profile, *node));
                let tied = tied_range(&tokenized.text, &placeholder.marker_range, statement.as_ref());
                Substitution {
                    name: placeholder.name.clone(),
                    range: placeholder.marker_range.clone(),
                    statement,
                    tied,
                }
            })
            .collect();
        let shortened = shortened_names(&fragment, profile);

        debug!(
            target: REPLACE_TARGET,
            language = %language,
            substitutions = tokenized.placeholders.len(),
            identity,
            "compiled replacement"
        );

        Ok(Self {
            source: text.to_owned(),
            text: tokenized.text,
            language,
            options,
            substitutions,
            shortened,
            identity,
        })
    }

    /// Returns the template text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the template language.
    #[must_use]
    pub const fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Returns whether the template has the same shape as its pattern, in
    /// which case a replacement reproduces the matched text.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.identity
    }

    /// Returns the substituted variable names in order of appearance.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.substitutions.iter().map(|sub| sub.name.as_str())
    }

    fn render(&self, found: &MatchResult<'_>) -> String {
        if self.identity {
            return found.text().to_owned();
        }
        let profile = self.language.profile();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for sub in &self.substitutions {
            let value = found.capture(&sub.name);
            let empty = value.is_none_or(
                |captured| matches!(captured, CapturedValue::Multiple(nodes) if nodes.is_empty()),
            );
            if empty {
                edits.push((sub.tied.clone(), String::new()));
                continue;
            }
            let text = value.map_or("", CapturedValue::text);
            let swallow_terminator = value.is_some_and(|captured| {
                binds_statements(profile, captured) || ends_with_terminator(profile, text)
            });
            let range = match &sub.statement {
                Some(statement) if swallow_terminator => sub.range.start..statement.end,
                _ => sub.range.clone(),
            };
            edits.push((range, text.to_owned()));
        }
        if self.options.shorten_fqn() {
            edits.extend(self.shortened.iter().cloned());
        }

        let indent = self
            .options
            .reformat()
            .then(|| line_indent(found.source(), found.byte_range().start));
        splice(&self.text, edits, indent)
    }
}

/// Renders replacements for matches.
#[derive(Debug, Clone, Copy)]
pub struct Replacer<'r> {
    template: &'r ReplacementTemplate,
}

impl<'r> Replacer<'r> {
    /// Creates a replacer for the given template.
    #[must_use]
    pub const fn new(template: &'r ReplacementTemplate) -> Self {
        Self { template }
    }

    /// Returns the replacement text for one match.
    #[must_use]
    pub fn replace(&self, found: &MatchResult<'_>) -> String {
        let output = self.template.render(found);
        debug!(
            target: REPLACE_TARGET,
            start = found.byte_range().start,
            matched_len = found.byte_range().len(),
            output_len = output.len(),
            identity = self.template.identity,
            "rendered replacement"
        );
        output
    }
}

/// Returns the replacement text for `found` under `template`.
#[must_use]
pub fn replace(found: &MatchResult<'_>, template: &ReplacementTemplate) -> String {
    Replacer::new(template).replace(found)
}

/// Maps each marker occurrence to the leaf that carries it.
fn marker_nodes(fragment: &Fragment) -> BTreeMap<usize, Node<'_>> {
    let parsed = fragment.parsed();
    let mut out = BTreeMap::new();
    let mut stack = fragment.roots();
    while let Some(node) = stack.pop() {
        if node.child_count() == 0 {
            if let Some(index) = marker_index(parsed.node_text(node)) {
                out.entry(index).or_insert(node);
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    out
}

fn statement_extent(
    fragment: &Fragment,
    profile: &LanguageProfile,
    node: Node<'_>,
) -> Option<Range<usize>> {
    let parent = node.parent()?;
    (profile.is_statement_wrapper(parent.kind()) && sole_named_child(parent) == Some(node))
        .then(|| fragment.local_range(parent))
}

/// Chooses the text deleted with an empty binding: the whole statement line
/// for statement placeholders, else a following comma, else a preceding one.
fn tied_range(text: &str, marker: &Range<usize>, statement: Option<&Range<usize>>) -> Range<usize> {
    if let Some(extent) = statement {
        return line_extent(text, extent);
    }

    let after = text.get(marker.end..).unwrap_or_default();
    let gap = after.len() - after.trim_start().len();
    if after.trim_start().starts_with(',') {
        let rest = after.get(gap + 1..).unwrap_or_default();
        let trailing = rest.len() - rest.trim_start().len();
        return marker.start..marker.end + gap + 1 + trailing;
    }

    let before = text.get(..marker.start).unwrap_or_default().trim_end();
    if let Some(head) = before.strip_suffix(',') {
        return head.len()..marker.end;
    }
    marker.clone()
}

fn line_extent(text: &str, range: &Range<usize>) -> Range<usize> {
    let head = text.get(..range.start).unwrap_or_default();
    let line_start = head.rfind('\n').map_or(0, |idx| idx + 1);
    let lead_blank = head.get(line_start..).unwrap_or_default().trim().is_empty();

    let tail = text.get(range.end..).unwrap_or_default();
    let line_len = tail.find('\n').map_or(tail.len(), |idx| idx + 1);
    let trail_blank = tail.get(..line_len).unwrap_or_default().trim().is_empty();

    if lead_blank && trail_blank {
        line_start..range.end + line_len
    } else {
        let spaces = tail.len() - tail.trim_start_matches([' ', '\t']).len();
        range.start..range.end + spaces
    }
}

/// Collects outermost qualified names written literally in the template,
/// with their leading lower-case path segments dropped.
fn shortened_names(fragment: &Fragment, profile: &LanguageProfile) -> Vec<(Range<usize>, String)> {
    let parsed = fragment.parsed();
    let mut out = Vec::new();
    let mut stack = fragment.roots();
    while let Some(node) = stack.pop() {
        let text = parsed.node_text(node);
        if profile.is_qualified_name(node.kind()) && !Tokenized::contains_marker(text) {
            let segments: Vec<&str> = text.split(profile.path_separator).collect();
            let keep_from = segments
                .iter()
                .position(|segment| !segment.starts_with(|c: char| c.is_lowercase()))
                .unwrap_or(segments.len())
                .min(segments.len().saturating_sub(1));
            let short = segments
                .get(keep_from..)
                .unwrap_or_default()
                .join(profile.path_separator);
            if short != text {
                out.push((fragment.local_range(node), short));
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    out
}

fn binds_statements(profile: &LanguageProfile, value: &CapturedValue<'_>) -> bool {
    let nodes = value.nodes();
    !nodes.is_empty()
        && nodes.iter().all(|node| {
            node.parent()
                .is_some_and(|parent| profile.is_statement_container(parent.kind()))
        })
}

fn ends_with_terminator(profile: &LanguageProfile, text: &str) -> bool {
    let trimmed = text.trim_end();
    profile
        .terminators
        .iter()
        .any(|terminator| trimmed.ends_with(terminator))
}

/// Applies non-overlapping edits to `text`. Overlapping deletions collapse
/// into one. Literal template text is re-indented when `indent` is given.
fn splice(text: &str, mut edits: Vec<(Range<usize>, String)>, indent: Option<&str>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            cursor = cursor.max(range.end);
            out.push_str(&replacement);
            continue;
        }
        let literal = text.get(cursor..range.start).unwrap_or_default();
        push_literal(&mut out, literal, indent, true);
        out.push_str(&replacement);
        cursor = range.end;
    }
    push_literal(&mut out, text.get(cursor..).unwrap_or_default(), indent, false);
    out
}

/// Appends template text, indenting each line after a newline. Blank lines
/// stay bare unless a substitution follows on the same line.
fn push_literal(out: &mut String, literal: &str, indent: Option<&str>, followed: bool) {
    let Some(prefix) = indent.filter(|prefix| !prefix.is_empty()) else {
        out.push_str(literal);
        return;
    };
    let mut lines = literal.split('\n').enumerate().peekable();
    while let Some((idx, line)) = lines.next() {
        if idx > 0 {
            out.push('\n');
            let last = lines.peek().is_none();
            if !line.trim().is_empty() || (last && followed) {
                out.push_str(prefix);
            }
        }
        out.push_str(line);
    }
}
