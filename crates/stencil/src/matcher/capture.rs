//! Capture types reported for successful matches.
//!
//! Captures are snapshots of the binding stack taken when a match completes,
//! keyed by variable name. Anonymous variables are never reported.

use std::collections::BTreeMap;
use std::ops::Range;

use tree_sitter::Node;

use crate::bindings::{BoundValue, Bindings};
use crate::pattern::Pattern;

/// A single captured syntax node.
#[derive(Debug, Clone)]
pub struct CapturedNode<'a> {
    node: Node<'a>,
    text: &'a str,
}

impl<'a> CapturedNode<'a> {
    /// Returns the captured syntax node.
    #[must_use]
    pub const fn node(&self) -> Node<'a> {
        self.node
    }

    /// Returns the text of the captured node.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Returns the byte range of the captured node.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.node.byte_range()
    }
}

/// A run of sibling nodes bound by a quantified variable.
#[derive(Debug, Clone)]
pub struct CapturedNodes<'a> {
    nodes: Vec<CapturedNode<'a>>,
    text: &'a str,
    byte_range: Range<usize>,
}

impl<'a> CapturedNodes<'a> {
    /// Returns the captured nodes in order.
    #[must_use]
    pub fn nodes(&self) -> &[CapturedNode<'a>] {
        &self.nodes
    }

    /// Returns the source text from the first node to the last, separators
    /// included.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Returns the byte range covered by the run.
    ///
    /// An empty run reports an empty range at the start of the match.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.byte_range.clone()
    }

    /// Returns whether the run bound no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Text bound inside a comment or string literal.
#[derive(Debug, Clone)]
pub struct CapturedText<'a> {
    text: &'a str,
    byte_range: Range<usize>,
}

impl<'a> CapturedText<'a> {
    /// Returns the captured text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Returns the byte range of the captured text in the source.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.byte_range.clone()
    }
}

/// Captured variable value.
#[derive(Debug, Clone)]
pub enum CapturedValue<'a> {
    /// A single-node capture (`'x`).
    Single(CapturedNode<'a>),
    /// A quantified capture (`'xs*`, `'xs{1,3}`).
    Multiple(CapturedNodes<'a>),
    /// Text captured inside a comment or string literal.
    Text(CapturedText<'a>),
}

impl<'a> CapturedValue<'a> {
    /// Returns the captured text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        match self {
            Self::Single(node) => node.text(),
            Self::Multiple(nodes) => nodes.text(),
            Self::Text(text) => text.text(),
        }
    }

    /// Returns the byte range of the capture.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        match self {
            Self::Single(node) => node.byte_range(),
            Self::Multiple(nodes) => nodes.byte_range(),
            Self::Text(text) => text.byte_range(),
        }
    }

    /// Returns the capture as a single node, if applicable.
    #[must_use]
    pub const fn as_single(&self) -> Option<&CapturedNode<'a>> {
        match self {
            Self::Single(node) => Some(node),
            Self::Multiple(_) | Self::Text(_) => None,
        }
    }

    /// Returns the capture as a node run, if applicable.
    #[must_use]
    pub const fn as_multiple(&self) -> Option<&CapturedNodes<'a>> {
        match self {
            Self::Multiple(nodes) => Some(nodes),
            Self::Single(_) | Self::Text(_) => None,
        }
    }

    /// Returns the capture as text, if applicable.
    #[must_use]
    pub const fn as_text(&self) -> Option<&CapturedText<'a>> {
        match self {
            Self::Text(text) => Some(text),
            Self::Single(_) | Self::Multiple(_) => None,
        }
    }

    /// Returns the captured nodes; text captures have none.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node<'a>> {
        match self {
            Self::Single(node) => vec![node.node()],
            Self::Multiple(nodes) => nodes.nodes().iter().map(CapturedNode::node).collect(),
            Self::Text(_) => Vec::new(),
        }
    }
}

/// Converts the reported bindings of a completed attempt into captures.
pub(super) fn snapshot<'t>(
    pattern: &Pattern,
    bindings: &Bindings<'_, 't>,
    source: &'t str,
    anchor: usize,
) -> BTreeMap<String, CapturedValue<'t>> {
    let mut captures = BTreeMap::new();
    for (name, value) in bindings.iter() {
        if captures.contains_key(name)
            || pattern.variable(name).is_none_or(|spec| spec.is_anonymous())
        {
            continue;
        }
        captures.insert(name.to_owned(), capture(value, source, anchor));
    }
    captures
}

fn capture<'t>(value: &BoundValue<'t>, source: &'t str, anchor: usize) -> CapturedValue<'t> {
    let captured = |node: Node<'t>| CapturedNode {
        node,
        text: source.get(node.byte_range()).unwrap_or_default(),
    };
    match value {
        BoundValue::Node(node) => CapturedValue::Single(captured(*node)),
        BoundValue::Nodes(run) => {
            let nodes = run.nodes();
            let byte_range = match (nodes.first(), nodes.last()) {
                (Some(first), Some(last)) => first.start_byte()..last.end_byte(),
                _ => anchor..anchor,
            };
            CapturedValue::Multiple(CapturedNodes {
                nodes: nodes.iter().copied().map(captured).collect(),
                text: source.get(byte_range.clone()).unwrap_or_default(),
                byte_range,
            })
        }
        BoundValue::Text { text, start } => CapturedValue::Text(CapturedText {
            text,
            byte_range: *start..start + text.len(),
        }),
    }
}
