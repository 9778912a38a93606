//! Candidate traversal for the [`Matcher`](super::Matcher).

use std::collections::BTreeMap;
use std::ops::Range;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};
use tree_sitter::Node;

use crate::bindings::{Bindings, Equality};
use crate::constraint::EvalContext;
use crate::pattern::{
    Pattern, PatternNode, PatternRoot, Slot, significant_children, sole_named_child,
};

use super::MatchResult;
use super::capture::{CapturedValue, snapshot};
use super::context::MatchContext;

pub(super) const MATCH_TARGET: &str = "stencil::match";

type Captures<'t> = BTreeMap<String, CapturedValue<'t>>;

/// One search over one tree. Bindings never outlive a candidate.
pub(super) struct Search<'c, 'a, 'p, 't> {
    ctx: &'c MatchContext<'a, 'p, 't>,
    cancel: Option<&'c AtomicBool>,
    limit: usize,
    results: Vec<MatchResult<'t>>,
    candidates: usize,
    halted: bool,
    cancelled: bool,
}

impl<'c, 'a, 'p, 't> Search<'c, 'a, 'p, 't> {
    pub(super) fn new(
        ctx: &'c MatchContext<'a, 'p, 't>,
        cancel: Option<&'c AtomicBool>,
        limit: usize,
    ) -> Self {
        Self {
            ctx,
            cancel,
            limit: limit.min(ctx.pattern.options().match_limit()),
            results: Vec::new(),
            candidates: 0,
            halted: false,
            cancelled: false,
        }
    }

    pub(super) fn run(mut self, root: Node<'t>) -> Vec<MatchResult<'t>> {
        match self.ctx.pattern.root() {
            PatternRoot::Single(pattern) => self.visit(pattern, root),
            PatternRoot::Sequence(patterns) => self.visit_containers(patterns, root),
        }
        debug!(
            target: MATCH_TARGET,
            language = %self.ctx.pattern.language(),
            candidates = self.candidates,
            matches = self.results.len(),
            cancelled = self.cancelled,
            "search finished"
        );
        self.results
    }

    fn should_stop(&mut self) -> bool {
        if self.halted {
            return true;
        }
        if self.results.len() >= self.limit {
            self.halted = true;
        } else if self
            .cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            self.cancelled = true;
            self.halted = true;
        }
        self.halted
    }

    fn recursive(&self) -> bool {
        self.ctx.pattern.options().recursive_search()
    }

    fn visit(&mut self, pattern: &'p PatternNode, node: Node<'t>) {
        if self.should_stop() {
            return;
        }
        let matched = self.is_candidate(pattern, node) && self.try_single(pattern, node);
        if matched && !self.recursive() {
            return;
        }
        for child in children(node) {
            self.visit(pattern, child);
            if self.halted {
                return;
            }
        }
    }

    fn is_candidate(&self, pattern: &PatternNode, node: Node<'t>) -> bool {
        match pattern {
            PatternNode::Variable(var) => {
                node.is_named()
                    && !node.is_extra()
                    && match var.slot {
                        Slot::Statement => node.parent().is_some_and(|parent| {
                            self.ctx.profile.is_statement_container(parent.kind())
                        }),
                        Slot::Node => node.parent().is_some(),
                    }
            }
            PatternNode::Text(_) => true,
            PatternNode::Token { kind, .. } | PatternNode::Node { kind, .. } => {
                self.ctx.kinds_compatible(kind, node.kind())
            }
        }
    }

    fn try_single(&mut self, pattern: &'p PatternNode, node: Node<'t>) -> bool {
        self.candidates += 1;
        let ctx = self.ctx;
        let mut bindings = Bindings::new();
        let mut captures = None;
        let found = ctx.match_node(
            pattern,
            node,
            &mut bindings,
            &mut |complete: &mut Bindings<'p, 't>| {
                if !ctx.pending_hold(complete) {
                    return false;
                }
                captures = Some(snapshot(ctx.pattern, complete, ctx.source, node.start_byte()));
                true
            },
        );
        match captures.filter(|_| found) {
            Some(captured) => {
                self.record(vec![node], captured);
                true
            }
            None => false,
        }
    }

    fn visit_containers(&mut self, patterns: &'p [PatternNode], node: Node<'t>) {
        if self.should_stop() {
            return;
        }
        let covered = if self.ctx.profile.is_statement_container(node.kind()) {
            let statements = statements_of(self.ctx, node);
            self.search_runs(patterns, &statements)
        } else {
            Vec::new()
        };

        let recursive = self.recursive();
        for child in children(node) {
            let inside = covered
                .iter()
                .any(|run| run.start <= child.start_byte() && child.end_byte() <= run.end);
            if inside && !recursive {
                continue;
            }
            self.visit_containers(patterns, child);
            if self.halted {
                return;
            }
        }
    }

    /// Finds non-overlapping runs of statements matching the sequence. At
    /// each start the run is the first one the quantifiers' search order
    /// reaches.
    fn search_runs(
        &mut self,
        patterns: &'p [PatternNode],
        statements: &Rc<[Node<'t>]>,
    ) -> Vec<Range<usize>> {
        let mut covered = Vec::new();
        let mut start = 0;
        while start < statements.len() {
            if self.should_stop() {
                break;
            }
            let matched = self.try_run(patterns, statements, start);
            match matched.and_then(|(end, captured)| {
                statements.get(start..end).map(|run| (run, captured))
            }) {
                Some((run, captured)) => {
                    if let (Some(first), Some(last)) = (run.first(), run.last()) {
                        covered.push(first.start_byte()..last.end_byte());
                    }
                    self.record(run.to_vec(), captured);
                    start += run.len();
                }
                None => start += 1,
            }
        }
        covered
    }

    /// Matches the sequence once from `start`, returning where the run ends.
    fn try_run(
        &mut self,
        patterns: &'p [PatternNode],
        statements: &Rc<[Node<'t>]>,
        start: usize,
    ) -> Option<(usize, Captures<'t>)> {
        self.candidates += 1;
        let ctx = self.ctx;
        let anchor = statements.get(start).map_or(0, Node::start_byte);
        let mut bindings = Bindings::new();
        let mut matched = None;
        let found = ctx.match_open(
            patterns,
            statements,
            start,
            &mut bindings,
            &mut |complete: &mut Bindings<'p, 't>, end: usize| {
                let run = statements.get(start..end).unwrap_or_default();
                if run.is_empty() || is_lone_block(ctx, run) || !ctx.pending_hold(complete) {
                    return false;
                }
                matched = Some((end, snapshot(ctx.pattern, complete, ctx.source, anchor)));
                true
            },
        );
        matched.filter(|_| found)
    }

    fn record(&mut self, nodes: Vec<Node<'t>>, captures: Captures<'t>) {
        if self.ctx.pattern.options().distinct() && self.is_duplicate(&nodes, &captures) {
            trace!(target: MATCH_TARGET, start = ?nodes.first().map(Node::start_byte), "merged duplicate");
            return;
        }
        trace!(target: MATCH_TARGET, start = ?nodes.first().map(Node::start_byte), "match");
        self.results.push(MatchResult {
            nodes,
            source: self.ctx.source,
            captures,
        });
    }

    fn is_duplicate(&self, nodes: &[Node<'t>], captures: &Captures<'t>) -> bool {
        let eq = &self.ctx.equality;
        self.results.iter().any(|seen| {
            if captures.is_empty() && seen.captures().is_empty() {
                eq.runs(seen.nodes(), nodes)
            } else {
                captures_equal(eq, seen.captures(), captures)
            }
        })
    }
}

/// Every complete binding the backtracking search produces for one node, in
/// search order.
pub(super) fn all_bindings<'p, 't>(
    ctx: &MatchContext<'_, 'p, 't>,
    node: Node<'t>,
) -> Vec<Captures<'t>> {
    let mut out = Vec::new();
    let mut bindings = Bindings::new();
    let anchor = node.start_byte();
    let mut collect = |complete: &mut Bindings<'p, 't>| {
        if ctx.pending_hold(complete) {
            out.push(snapshot(ctx.pattern, complete, ctx.source, anchor));
        }
        false
    };
    match ctx.pattern.root() {
        PatternRoot::Single(pattern) => {
            ctx.match_node(pattern, node, &mut bindings, &mut collect);
        }
        PatternRoot::Sequence(patterns) => {
            let statements = statements_of(ctx, node);
            ctx.match_seq(patterns, &statements, &mut bindings, &mut collect);
        }
    }
    out
}

/// Whether a strict ancestor of `node` matches `pattern`. Sequence patterns
/// need a run of statements in an enclosing container that covers `node`.
pub(crate) fn encloses<'t>(
    pattern: &Pattern,
    node: Node<'t>,
    eval: &EvalContext<'_, 't>,
) -> bool {
    let options = pattern.options();
    let profile = pattern.language().profile();
    let ctx = MatchContext {
        pattern,
        source: eval.source,
        profile,
        loose: options.loose_matching(),
        equality: Equality {
            source: eval.source,
            profile,
            case_sensitive: options.case_sensitive_match(),
            loose: options.loose_matching(),
        },
        eval: EvalContext {
            source: eval.source,
            profile,
            resolver: eval.resolver,
            hierarchy: eval.hierarchy,
        },
    };

    let mut ancestor = node.parent();
    while let Some(current) = ancestor {
        if matches_around(&ctx, current, node) {
            trace!(target: MATCH_TARGET, kind = current.kind(), "enclosing match");
            return true;
        }
        ancestor = current.parent();
    }
    false
}

fn matches_around<'p, 't>(
    ctx: &MatchContext<'_, 'p, 't>,
    container: Node<'t>,
    node: Node<'t>,
) -> bool {
    match ctx.pattern.root() {
        PatternRoot::Single(pattern) => ctx.match_node(
            pattern,
            container,
            &mut Bindings::new(),
            &mut |complete: &mut Bindings<'p, 't>| ctx.pending_hold(complete),
        ),
        PatternRoot::Sequence(patterns) => {
            if !ctx.profile.is_statement_container(container.kind()) {
                return false;
            }
            let statements = statements_of(ctx, container);
            (0..statements.len()).any(|start| {
                ctx.match_open(
                    patterns,
                    &statements,
                    start,
                    &mut Bindings::new(),
                    &mut |complete: &mut Bindings<'p, 't>, end: usize| {
                        statements
                            .get(start..end)
                            .is_some_and(|run| covers(run, node))
                            && ctx.pending_hold(complete)
                    },
                )
            })
        }
    }
}

fn covers(run: &[Node<'_>], node: Node<'_>) -> bool {
    match (run.first(), run.last()) {
        (Some(first), Some(last)) => {
            first.start_byte() <= node.start_byte() && node.end_byte() <= last.end_byte()
        }
        _ => false,
    }
}

fn statements_of<'t>(ctx: &MatchContext<'_, '_, 't>, container: Node<'t>) -> Rc<[Node<'t>]> {
    significant_children(ctx.profile, container, ctx.loose)
        .into_iter()
        .filter(Node::is_named)
        .collect()
}

/// A run made of one block, bare or wrapped as a statement. The block's own
/// statements are searched instead.
fn is_lone_block(ctx: &MatchContext<'_, '_, '_>, run: &[Node<'_>]) -> bool {
    let [only] = run else {
        return false;
    };
    let inner = if ctx.profile.is_statement_wrapper(only.kind()) {
        sole_named_child(*only).unwrap_or(*only)
    } else {
        *only
    };
    ctx.profile.is_block(inner.kind()) && ctx.profile.is_statement_container(inner.kind())
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn captures_equal(eq: &Equality<'_>, a: &Captures<'_>, b: &Captures<'_>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|((left_name, left), (right_name, right))| {
                left_name == right_name && values_equal(eq, left, right)
            })
}

fn values_equal(eq: &Equality<'_>, a: &CapturedValue<'_>, b: &CapturedValue<'_>) -> bool {
    match (a, b) {
        (CapturedValue::Text(_), _) | (_, CapturedValue::Text(_)) => eq.text(a.text(), b.text()),
        _ => eq.runs(&a.nodes(), &b.nodes()),
    }
}
