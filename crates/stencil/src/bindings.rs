//! Binding context with checkpoint and rollback.
//!
//! Bindings live on a stack for the duration of one match attempt. A
//! checkpoint is the current stack height; rolling back truncates to it, so
//! undoing a rejected branch costs only the bindings that branch made.

use std::ops::Range;
use std::rc::Rc;

use tree_sitter::Node;

use crate::constraint::ConstraintExpr;
use crate::pattern::{significant_children, sole_named_child};
use crate::profile::LanguageProfile;

/// A value bound to a variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundValue<'t> {
    /// One syntax node.
    Node(Node<'t>),
    /// A run of sibling nodes, possibly empty.
    Nodes(Run<'t>),
    /// Text captured from a comment or string literal, with its start offset.
    Text { text: &'t str, start: usize },
}

/// A contiguous slice of a shared sibling list.
///
/// Every run length tried for one quantified variable shares the same list,
/// so binding a run never copies nodes.
#[derive(Debug, Clone)]
pub(crate) struct Run<'t> {
    siblings: Rc<[Node<'t>]>,
    range: Range<usize>,
}

impl<'t> Run<'t> {
    pub(crate) const fn new(siblings: Rc<[Node<'t>]>, range: Range<usize>) -> Self {
        Self { siblings, range }
    }

    pub(crate) fn nodes(&self) -> &[Node<'t>] {
        self.siblings.get(self.range.clone()).unwrap_or_default()
    }
}

impl PartialEq for Run<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes() == other.nodes()
    }
}

/// A constraint that could not be decided when its variable was bound.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pending<'p> {
    pub(crate) name: &'p str,
    pub(crate) expr: &'p ConstraintExpr,
    pub(crate) hierarchy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    entries: usize,
    pending: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Bindings<'p, 't> {
    entries: Vec<(&'p str, BoundValue<'t>)>,
    pending: Vec<Pending<'p>>,
}

impl<'p, 't> Bindings<'p, 't> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&BoundValue<'t>> {
        self.entries
            .iter()
            .rev()
            .find(|(bound, _)| *bound == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn push(&mut self, name: &'p str, value: BoundValue<'t>) {
        self.entries.push((name, value));
    }

    pub(crate) fn defer(&mut self, pending: Pending<'p>) {
        self.pending.push(pending);
    }

    pub(crate) fn pending(&self) -> &[Pending<'p>] {
        &self.pending
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            entries: self.entries.len(),
            pending: self.pending.len(),
        }
    }

    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.entries.truncate(checkpoint.entries);
        self.pending.truncate(checkpoint.pending);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&'p str, &BoundValue<'t>)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }
}

/// Structural equality used for repeated variables and distinct results.
///
/// Two values are equal when they have the same shape and the same leaf
/// text; whitespace, comments and node identity are ignored.
#[derive(Clone, Copy)]
pub(crate) struct Equality<'a> {
    pub(crate) source: &'a str,
    pub(crate) profile: &'a LanguageProfile,
    pub(crate) case_sensitive: bool,
    pub(crate) loose: bool,
}

impl Equality<'_> {
    pub(crate) fn text(&self, a: &str, b: &str) -> bool {
        a == b || (!self.case_sensitive && a.to_lowercase() == b.to_lowercase())
    }

    fn node_text<'n>(&self, node: Node<'n>) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    pub(crate) fn values(&self, a: &BoundValue<'_>, b: &BoundValue<'_>) -> bool {
        match (a, b) {
            (BoundValue::Node(x), BoundValue::Node(y)) => self.nodes(*x, *y),
            (BoundValue::Nodes(xs), BoundValue::Nodes(ys)) => self.runs(xs.nodes(), ys.nodes()),
            (BoundValue::Node(x), BoundValue::Nodes(ys))
            | (BoundValue::Nodes(ys), BoundValue::Node(x)) => {
                matches!(ys.nodes(), [y] if self.nodes(*x, *y))
            }
            (BoundValue::Text { text: s, .. }, BoundValue::Text { text: t, .. }) => {
                self.text(s, t)
            }
            (BoundValue::Text { text: s, .. }, BoundValue::Node(x))
            | (BoundValue::Node(x), BoundValue::Text { text: s, .. }) => {
                self.text(s, self.node_text(*x))
            }
            (BoundValue::Text { text: s, .. }, BoundValue::Nodes(xs))
            | (BoundValue::Nodes(xs), BoundValue::Text { text: s, .. }) => match xs.nodes() {
                [x] => self.text(s, self.node_text(*x)),
                [] => s.is_empty(),
                _ => false,
            },
        }
    }

    pub(crate) fn runs(&self, xs: &[Node<'_>], ys: &[Node<'_>]) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.nodes(*x, *y))
    }

    pub(crate) fn nodes(&self, a: Node<'_>, b: Node<'_>) -> bool {
        if a.kind() != b.kind() {
            let unwrapped_a = self.unwrap_statement(a);
            let unwrapped_b = self.unwrap_statement(b);
            if unwrapped_a != a || unwrapped_b != b {
                return self.nodes(unwrapped_a, unwrapped_b);
            }
            if !(self.loose && self.profile.equivalent_slot(a.kind(), b.kind())) {
                return false;
            }
        }

        if a.child_count() == 0 || b.child_count() == 0 {
            return a.child_count() == b.child_count()
                && self.text(self.node_text(a), self.node_text(b));
        }

        let left = significant_children(self.profile, a, self.loose);
        let right = significant_children(self.profile, b, self.loose);
        self.runs(&left, &right)
    }

    fn unwrap_statement<'n>(&self, node: Node<'n>) -> Node<'n> {
        if self.profile.is_statement_wrapper(node.kind()) {
            sole_named_child(node).unwrap_or(node)
        } else {
            node
        }
    }
}
