//! Lowering a parsed fragment into a pattern tree.

use tree_sitter::Node;

use crate::error::StencilError;
use crate::placeholder::Tokenized;
use crate::profile::LanguageProfile;

use super::fragment::Fragment;
use super::text::{TextCategory, TextTemplate, comment_body, string_body};
use super::{PatternNode, PatternRoot, Slot, VarRef};

/// Returns the children that take part in structural comparison.
///
/// Extras (comments) and list separators never do; statement terminators
/// are dropped as well under loose matching.
pub(crate) fn significant_children<'t>(
    profile: &LanguageProfile,
    node: Node<'t>,
    loose: bool,
) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| {
            !child.is_extra()
                && !child.is_missing()
                && !profile.is_separator(child.kind())
                && !(loose && profile.is_terminator(child.kind()))
        })
        .collect()
}

/// Returns whether a statement wrapper ends with its terminator.
pub(crate) fn is_terminated(profile: &LanguageProfile, node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| !child.is_extra())
        .last()
        .is_some_and(|last| !last.is_missing() && profile.is_terminator(last.kind()))
}

/// Returns the only named, non-extra child of `node`, if there is exactly one.
pub(crate) fn sole_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let mut named = node
        .children(&mut cursor)
        .filter(|child| child.is_named() && !child.is_extra());
    let first = named.next()?;
    named.next().is_none().then_some(first)
}

pub(crate) struct Lowerer<'f> {
    pub(crate) fragment: &'f Fragment,
    pub(crate) tokenized: &'f Tokenized,
    pub(crate) profile: &'static LanguageProfile,
    pub(crate) loose: bool,
    pub(crate) case_sensitive: bool,
}

impl Lowerer<'_> {
    fn language(&self) -> crate::language::SupportedLanguage {
        self.fragment.parsed().language()
    }

    fn text(&self, node: Node<'_>) -> &str {
        self.fragment.parsed().node_text(node)
    }

    pub(crate) fn lower_roots(&self) -> Result<PatternRoot, StencilError> {
        let roots = self.fragment.roots();
        let (code, extras): (Vec<Node<'_>>, Vec<Node<'_>>) =
            roots.into_iter().partition(|node| !node.is_extra());

        if code.is_empty() {
            return match extras.as_slice() {
                [comment] if self.profile.is_comment(comment.kind()) => {
                    Ok(PatternRoot::Single(self.comment(*comment)?))
                }
                _ => Err(StencilError::unsupported(
                    self.language(),
                    "pattern contains no code",
                )),
            };
        }

        let mut lowered = Vec::with_capacity(code.len());
        for node in code {
            lowered.push(self.lower_root(node)?);
        }

        if let [PatternNode::Token { kind, .. }] = lowered.as_slice() {
            return Err(StencilError::unsupported(
                self.language(),
                format!("a lone {kind} token has no structure to match"),
            ));
        }
        let repeated = matches!(
            lowered.as_slice(),
            [PatternNode::Variable(var)] if !var.quantifier.is_single()
        );
        if lowered.len() == 1 && !repeated {
            if let Some(single) = lowered.pop() {
                return Ok(PatternRoot::Single(single));
            }
        }
        Ok(PatternRoot::Sequence(lowered))
    }

    fn lower_root(&self, node: Node<'_>) -> Result<PatternNode, StencilError> {
        if self.profile.is_statement_wrapper(node.kind()) && !is_terminated(self.profile, node) {
            if let Some(inner) = sole_named_child(node) {
                return self.lower(inner);
            }
        }
        self.lower(node)
    }

    pub(crate) fn lower(&self, node: Node<'_>) -> Result<PatternNode, StencilError> {
        let kind = node.kind();
        let text = self.text(node);

        if let Some(placeholder) = self.tokenized.placeholder_for_marker(text) {
            if self.may_stand_for_placeholder(kind) {
                return Ok(PatternNode::Variable(VarRef {
                    name: placeholder.name.clone(),
                    quantifier: placeholder.quantifier,
                    slot: Slot::Node,
                }));
            }
        }

        if self.profile.is_statement_wrapper(kind) {
            if let Some(placeholder) = sole_named_child(node)
                .and_then(|inner| self.tokenized.placeholder_for_marker(self.text(inner)))
            {
                return Ok(PatternNode::Variable(VarRef {
                    name: placeholder.name.clone(),
                    quantifier: placeholder.quantifier,
                    slot: Slot::Statement,
                }));
            }
        }

        if self.profile.is_string(kind) && Tokenized::contains_marker(text) {
            let body = text.get(string_body(text)).unwrap_or_default();
            return Ok(PatternNode::Text(TextTemplate::compile(
                TextCategory::StringLiteral,
                body,
                self.tokenized,
                self.case_sensitive,
            )?));
        }

        if self.profile.is_comment(kind) {
            return self.comment(node);
        }

        if node.child_count() == 0 {
            return Ok(PatternNode::Token {
                kind,
                text: text.to_owned(),
            });
        }

        let mut children = Vec::new();
        for child in significant_children(self.profile, node, self.loose) {
            children.push(self.lower(child)?);
        }
        Ok(PatternNode::Node { kind, children })
    }

    fn comment(&self, node: Node<'_>) -> Result<PatternNode, StencilError> {
        let text = self.text(node);
        let (range, doc) = comment_body(text);
        let body = text.get(range).unwrap_or_default();
        Ok(PatternNode::Text(TextTemplate::compile(
            TextCategory::Comment { doc },
            body,
            self.tokenized,
            self.case_sensitive,
        )?))
    }

    fn may_stand_for_placeholder(&self, kind: &str) -> bool {
        !self.profile.is_statement_wrapper(kind)
            && !self.profile.is_statement_container(kind)
            && !self.profile.is_block(kind)
    }
}
