//! Backtracking tree matcher shared by every search entry point.
//!
//! Matching is written in continuation-passing style: each step receives the
//! rest of the attempt as a closure and calls it once per way it can succeed.
//! A continuation returning `true` ends the search; returning `false` asks
//! for the next alternative. Every function leaves the binding stack exactly
//! as it found it.

use std::rc::Rc;

use tree_sitter::Node;

use crate::bindings::{BoundValue, Bindings, Equality, Pending, Run};
use crate::constraint::{EvalContext, Subject, evaluate};
use crate::pattern::{
    Pattern, PatternNode, TextCategory, TextTemplate, VarRef, comment_body, significant_children,
    string_body,
};
use crate::profile::LanguageProfile;

/// The rest of a match attempt.
pub(super) type Continuation<'k, 'p, 't> = dyn FnMut(&mut Bindings<'p, 't>) -> bool + 'k;

/// The rest of a match attempt over a sibling list, told where the matched
/// prefix ended.
pub(super) type SeqContinuation<'k, 'p, 't> =
    dyn FnMut(&mut Bindings<'p, 't>, usize) -> bool + 'k;

pub(super) struct MatchContext<'a, 'p, 't> {
    pub(super) pattern: &'p Pattern,
    pub(super) source: &'t str,
    pub(super) profile: &'static LanguageProfile,
    pub(super) loose: bool,
    pub(super) equality: Equality<'t>,
    pub(super) eval: EvalContext<'a, 't>,
}

impl<'p, 't> MatchContext<'_, 'p, 't> {
    pub(super) fn kinds_compatible(&self, pattern_kind: &str, node_kind: &str) -> bool {
        pattern_kind == node_kind
            || (self.loose && self.profile.equivalent_slot(pattern_kind, node_kind))
    }

    /// Re-checks constraints that were undecided when their variable was
    /// bound. A reference whose target never got bound fails.
    pub(super) fn pending_hold(&self, bindings: &Bindings<'p, 't>) -> bool {
        bindings.pending().iter().all(|pending| {
            bindings.get(pending.name).is_some_and(|value| {
                evaluate(
                    pending.expr,
                    Subject::of(value),
                    pending.hierarchy,
                    &self.eval,
                    bindings,
                ) == Some(true)
            })
        })
    }

    /// Matches one pattern node against one syntax node.
    pub(super) fn match_node(
        &self,
        pattern: &'p PatternNode,
        node: Node<'t>,
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        match pattern {
            PatternNode::Variable(var) => {
                node.is_named()
                    && !node.is_extra()
                    && self.bind(&var.name, BoundValue::Node(node), bindings, next)
            }
            PatternNode::Token { kind, text } => {
                self.kinds_compatible(kind, node.kind())
                    && self.equality.text(text, self.text(node))
                    && next(bindings)
            }
            PatternNode::Node { kind, children } => {
                if !self.kinds_compatible(kind, node.kind()) {
                    return false;
                }
                let kids: Rc<[Node<'t>]> =
                    significant_children(self.profile, node, self.loose).into();
                self.match_seq(children, &kids, bindings, next)
            }
            PatternNode::Text(template) => self.match_text(template, node, bindings, next),
        }
    }

    /// Matches a pattern child against a child slot.
    ///
    /// Under loose matching a block holding one statement and a statement
    /// wrapper around one expression stand in for their content.
    fn match_slot(
        &self,
        pattern: &'p PatternNode,
        node: Node<'t>,
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        if self.match_node(pattern, node, bindings, next) {
            return true;
        }
        let Some(kind) = pattern.kind() else {
            return false;
        };
        if !self.loose || self.kinds_compatible(kind, node.kind()) {
            return false;
        }
        if let Some(inner) = self.unwrap_pattern(pattern) {
            return self.match_slot(inner, node, bindings, next);
        }
        if let Some(inner) = self.unwrap_node(node) {
            return self.match_slot(pattern, inner, bindings, next);
        }
        false
    }

    fn is_transparent(&self, kind: &str) -> bool {
        self.profile.is_block(kind) || self.profile.is_statement_wrapper(kind)
    }

    fn unwrap_pattern(&self, pattern: &'p PatternNode) -> Option<&'p PatternNode> {
        let PatternNode::Node { kind, children } = pattern else {
            return None;
        };
        if !self.is_transparent(kind) {
            return None;
        }
        let mut inner = children
            .iter()
            .filter(|child| !matches!(child, PatternNode::Token { .. }));
        let only = inner.next()?;
        let single = match only {
            PatternNode::Variable(var) => var.quantifier.is_single(),
            _ => true,
        };
        (single && inner.next().is_none()).then_some(only)
    }

    fn unwrap_node(&self, node: Node<'t>) -> Option<Node<'t>> {
        if !self.is_transparent(node.kind()) {
            return None;
        }
        let kids = significant_children(self.profile, node, self.loose);
        let mut named = kids.into_iter().filter(Node::is_named);
        let only = named.next()?;
        named.next().is_none().then_some(only)
    }

    /// Matches pattern children against a sibling list, consuming it fully.
    pub(super) fn match_seq(
        &self,
        patterns: &'p [PatternNode],
        kids: &Rc<[Node<'t>]>,
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        let mut whole = |inner: &mut Bindings<'p, 't>, _end: usize| next(inner);
        self.match_from(patterns, kids, 0, false, bindings, &mut whole)
    }

    /// Matches pattern children against a prefix of `kids[from..]`. The
    /// continuation sees each candidate end in the quantifiers' search order.
    pub(super) fn match_open(
        &self,
        patterns: &'p [PatternNode],
        kids: &Rc<[Node<'t>]>,
        from: usize,
        bindings: &mut Bindings<'p, 't>,
        next: &mut SeqContinuation<'_, 'p, 't>,
    ) -> bool {
        self.match_from(patterns, kids, from, true, bindings, next)
    }

    fn match_from(
        &self,
        patterns: &'p [PatternNode],
        kids: &Rc<[Node<'t>]>,
        from: usize,
        open: bool,
        bindings: &mut Bindings<'p, 't>,
        next: &mut SeqContinuation<'_, 'p, 't>,
    ) -> bool {
        let Some((first, rest)) = patterns.split_first() else {
            return (open || from == kids.len()) && next(bindings, from);
        };
        let needed: usize = rest.iter().map(min_len).sum();
        if kids.len().saturating_sub(from) < needed + min_len(first) {
            return false;
        }

        match first {
            PatternNode::Variable(var) if !var.quantifier.is_single() => {
                let tail = Tail { rest, needed, open };
                self.match_run(var, &tail, kids, from, bindings, next)
            }
            _ => {
                let Some(head) = kids.get(from) else {
                    return false;
                };
                self.match_slot(first, *head, bindings, &mut |inner: &mut Bindings<'p, 't>| {
                    self.match_from(rest, kids, from + 1, open, inner, next)
                })
            }
        }
    }

    /// Tries every legal run length for a quantified variable, longest first
    /// when greedy and shortest first when lazy.
    fn match_run(
        &self,
        var: &'p VarRef,
        tail: &Tail<'p>,
        kids: &Rc<[Node<'t>]>,
        from: usize,
        bindings: &mut Bindings<'p, 't>,
        next: &mut SeqContinuation<'_, 'p, 't>,
    ) -> bool {
        let available = kids.len().saturating_sub(from + tail.needed);
        let eligible = kids
            .get(from..)
            .unwrap_or_default()
            .iter()
            .take(available)
            .take_while(|node| node.is_named() && !node.is_extra())
            .count();
        let min = var.quantifier.min_len();
        let max = var.quantifier.max_len(eligible);
        let (low, high) = if tail.rest.is_empty() && !tail.open {
            (min.max(available), max.min(available))
        } else {
            (min, max)
        };
        if low > high {
            return false;
        }

        for step in 0..=high - low {
            let len = if var.quantifier.is_greedy() {
                high - step
            } else {
                low + step
            };
            let value = BoundValue::Nodes(Run::new(Rc::clone(kids), from..from + len));
            let found = self.bind(
                &var.name,
                value,
                bindings,
                &mut |inner: &mut Bindings<'p, 't>| {
                    self.match_from(tail.rest, kids, from + len, tail.open, inner, next)
                },
            );
            if found {
                return true;
            }
        }
        false
    }

    /// Binds `name`, or checks equality with its earlier binding, then runs
    /// the continuation.
    fn bind(
        &self,
        name: &'p str,
        value: BoundValue<'t>,
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        if let Some(existing) = bindings.get(name) {
            return self.equality.values(existing, &value) && next(bindings);
        }

        let checkpoint = bindings.checkpoint();
        if let Some(spec) = self.pattern.variable(name) {
            if let Some(expr) = spec.constraint() {
                let verdict = evaluate(
                    expr,
                    Subject::of(&value),
                    spec.hierarchy(),
                    &self.eval,
                    bindings,
                );
                match verdict {
                    Some(false) => return false,
                    Some(true) => {}
                    None => bindings.defer(Pending {
                        name,
                        expr,
                        hierarchy: spec.hierarchy(),
                    }),
                }
            }
        }

        bindings.push(name, value);
        let found = next(bindings);
        bindings.rollback(checkpoint);
        found
    }

    fn match_text(
        &self,
        template: &'p TextTemplate,
        node: Node<'t>,
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        let kind = node.kind();
        let text = self.text(node);
        let body = match template.category() {
            TextCategory::StringLiteral if self.profile.is_string(kind) => string_body(text),
            TextCategory::Comment { doc } if self.profile.is_comment(kind) => {
                let (range, is_doc) = comment_body(text);
                if doc && !is_doc {
                    return false;
                }
                range
            }
            TextCategory::StringLiteral | TextCategory::Comment { .. } => return false,
        };
        let start = node.start_byte() + body.start;
        let body_text = text.get(body).unwrap_or_default();
        let Some(ranges) = template.captures(body_text) else {
            return false;
        };

        let values: Vec<(&'p str, BoundValue<'t>)> = template
            .variables()
            .zip(ranges)
            .map(|(name, range)| {
                let value = BoundValue::Text {
                    text: body_text.get(range.clone()).unwrap_or_default(),
                    start: start + range.start,
                };
                (name, value)
            })
            .collect();
        self.bind_all(&values, bindings, next)
    }

    fn bind_all(
        &self,
        values: &[(&'p str, BoundValue<'t>)],
        bindings: &mut Bindings<'p, 't>,
        next: &mut Continuation<'_, 'p, 't>,
    ) -> bool {
        let Some(((name, value), rest)) = values.split_first() else {
            return next(bindings);
        };
        self.bind(
            name,
            value.clone(),
            bindings,
            &mut |inner: &mut Bindings<'p, 't>| self.bind_all(rest, inner, next),
        )
    }

    fn text(&self, node: Node<'t>) -> &'t str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

/// Pattern children still to match after a quantified variable.
struct Tail<'p> {
    rest: &'p [PatternNode],
    needed: usize,
    open: bool,
}

/// Fewest sibling slots a pattern node can occupy.
pub(super) fn min_len(pattern: &PatternNode) -> usize {
    match pattern {
        PatternNode::Variable(var) => var.quantifier.min_len(),
        _ => 1,
    }
}
