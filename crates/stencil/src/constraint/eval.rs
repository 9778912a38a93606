//! Interpreter for compiled constraints.
//!
//! Evaluation is three-valued: `None` means a `ref(...)` target is not bound
//! yet, so the matcher defers the whole constraint and re-checks it once the
//! attempt is complete.

use tree_sitter::Node;

use crate::bindings::{BoundValue, Bindings};
use crate::matcher::encloses;
use crate::pattern::{comment_body, sole_named_child, string_body};
use crate::profile::LanguageProfile;
use crate::semantics::{Resolver, TypeHierarchy, TypeRef, declared_name};

use super::{ConstraintExpr, Predicate, TextRegex, TypePattern};

/// What a constraint is evaluated against.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Subject<'a, 't> {
    Node(Node<'t>),
    Nodes(&'a [Node<'t>]),
    Text(&'t str),
}

impl<'a, 't> Subject<'a, 't> {
    pub(crate) fn of(value: &'a BoundValue<'t>) -> Self {
        match value {
            BoundValue::Node(node) => Self::Node(*node),
            BoundValue::Nodes(run) => Self::Nodes(run.nodes()),
            BoundValue::Text { text, .. } => Self::Text(text),
        }
    }
}

/// Collaborators available while evaluating constraints.
pub(crate) struct EvalContext<'a, 't> {
    pub(crate) source: &'t str,
    pub(crate) profile: &'static LanguageProfile,
    pub(crate) resolver: &'a dyn Resolver<'t>,
    pub(crate) hierarchy: &'a dyn TypeHierarchy,
}

impl<'t> EvalContext<'_, 't> {
    fn text(&self, node: Node<'t>) -> &'t str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

/// Evaluates `expr` against `subject`.
///
/// `hierarchy` extends regular expressions to the supertypes of the type
/// named by the candidate text.
pub(crate) fn evaluate<'t>(
    expr: &ConstraintExpr,
    subject: Subject<'_, 't>,
    hierarchy: bool,
    ctx: &EvalContext<'_, 't>,
    bindings: &Bindings<'_, 't>,
) -> Option<bool> {
    match expr {
        ConstraintExpr::Predicate(predicate) => {
            predicate_holds(predicate, subject, hierarchy, ctx, bindings)
        }
        ConstraintExpr::Not(inner) => {
            evaluate(inner, subject, hierarchy, ctx, bindings).map(|value| !value)
        }
        ConstraintExpr::And(items) => all(
            items
                .iter()
                .map(|item| evaluate(item, subject, hierarchy, ctx, bindings)),
        ),
        ConstraintExpr::Or(items) => {
            let mut undecided = false;
            for item in items {
                match evaluate(item, subject, hierarchy, ctx, bindings) {
                    Some(true) => return Some(true),
                    Some(false) => {}
                    None => undecided = true,
                }
            }
            if undecided { None } else { Some(false) }
        }
    }
}

fn all(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut undecided = false;
    for result in results {
        match result {
            Some(false) => return Some(false),
            Some(true) => {}
            None => undecided = true,
        }
    }
    if undecided { None } else { Some(true) }
}

fn predicate_holds<'t>(
    predicate: &Predicate,
    subject: Subject<'_, 't>,
    hierarchy: bool,
    ctx: &EvalContext<'_, 't>,
    bindings: &Bindings<'_, 't>,
) -> Option<bool> {
    match (predicate, subject) {
        (Predicate::Count { min, max }, _) => {
            let size = match subject {
                Subject::Node(_) => 1,
                Subject::Nodes(nodes) => nodes.len(),
                Subject::Text(text) => text.split_whitespace().count(),
            };
            let count = u32::try_from(size).unwrap_or(u32::MAX);
            Some(count >= *min && max.is_none_or(|high| count <= high))
        }
        (_, Subject::Nodes(nodes)) => all(
            nodes
                .iter()
                .map(|node| node_predicate(predicate, *node, hierarchy, ctx, bindings)),
        ),
        (_, Subject::Node(node)) => node_predicate(predicate, node, hierarchy, ctx, bindings),
        (Predicate::Regex(regex), Subject::Text(text)) => Some(regex.matches_within(text)),
        (_, Subject::Text(_)) => Some(false),
    }
}

fn node_predicate<'t>(
    predicate: &Predicate,
    node: Node<'t>,
    hierarchy: bool,
    ctx: &EvalContext<'_, 't>,
    bindings: &Bindings<'_, 't>,
) -> Option<bool> {
    let holds = match predicate {
        Predicate::Regex(regex) => regex_holds(regex, node, hierarchy, ctx),
        Predicate::ExprType(pattern) => ctx
            .resolver
            .expression_type(unwrap_statement(ctx.profile, node))
            .is_some_and(|ty| type_matches(pattern, &ty, hierarchy, ctx)),
        Predicate::FormalType(pattern) => ctx
            .resolver
            .formal_type(node)
            .is_some_and(|ty| type_matches(pattern, &ty, hierarchy, ctx)),
        Predicate::Reference(target) => return reference_holds(target, node, ctx, bindings),
        Predicate::Read => !ctx.resolver.is_write_access(node),
        Predicate::Write => ctx.resolver.is_write_access(node),
        Predicate::Count { .. } => true,
        Predicate::Within(pattern) => encloses(pattern, node, ctx),
    };
    Some(holds)
}

fn unwrap_statement<'t>(profile: &LanguageProfile, node: Node<'t>) -> Node<'t> {
    if profile.is_statement_wrapper(node.kind()) {
        sole_named_child(node).unwrap_or(node)
    } else {
        node
    }
}

fn regex_holds<'t>(
    regex: &TextRegex,
    node: Node<'t>,
    hierarchy: bool,
    ctx: &EvalContext<'_, 't>,
) -> bool {
    let kind = node.kind();
    let text = ctx.text(node);
    if ctx.profile.is_comment(kind) {
        let (body, _) = comment_body(text);
        return regex.matches_within(text.get(body).unwrap_or_default());
    }
    if ctx.profile.is_string(kind) {
        return regex.matches_within(text.get(string_body(text)).unwrap_or_default());
    }

    let subject = ctx.text(unwrap_statement(ctx.profile, node));
    if regex.matches_node_text(subject) {
        return true;
    }
    hierarchy
        && ctx
            .hierarchy
            .ancestors(&TypeRef::new(subject))
            .iter()
            .skip(1)
            .any(|ty| regex.matches_node_text(ty.name()) || regex.matches_node_text(ty.simple_name()))
}

fn type_matches(
    pattern: &TypePattern,
    ty: &TypeRef,
    hierarchy: bool,
    ctx: &EvalContext<'_, '_>,
) -> bool {
    let direct = |candidate: &TypeRef| {
        pattern.regex.matches_node_text(candidate.name())
            || pattern.regex.matches_node_text(candidate.simple_name())
    };
    if direct(ty) {
        return true;
    }
    (pattern.with_subtypes || hierarchy) && ctx.hierarchy.ancestors(ty).iter().any(direct)
}

fn reference_holds<'t>(
    target: &str,
    node: Node<'t>,
    ctx: &EvalContext<'_, 't>,
    bindings: &Bindings<'_, 't>,
) -> Option<bool> {
    let bound = match bindings.get(target)? {
        BoundValue::Node(bound) => *bound,
        BoundValue::Nodes(run) => match run.nodes() {
            [single] => *single,
            _ => return Some(false),
        },
        BoundValue::Text { .. } => return Some(false),
    };
    let Some(resolved) = ctx.resolver.resolve_reference(node) else {
        return Some(false);
    };
    Some(resolved == bound || declared_name(ctx.profile, bound) == Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Dialect, parse_block};
    use crate::language::SupportedLanguage;
    use crate::options::SearchOptions;
    use crate::parser::{ParseResult, Parser};
    use crate::semantics::{NoSemantics, SyntacticSemantics};
    use mockall::mock;

    mock! {
        Hierarchy {}
        impl TypeHierarchy for Hierarchy {
            fn supertypes(&self, ty: &TypeRef) -> Vec<TypeRef>;
        }
    }

    fn dialect(case_sensitive: bool) -> Dialect {
        Dialect {
            language: SupportedLanguage::TypeScript,
            options: SearchOptions::default().with_case_sensitive_match(case_sensitive),
        }
    }

    fn parse(source: &str) -> ParseResult {
        Parser::new(SupportedLanguage::TypeScript)
            .and_then(|mut parser| parser.parse(source))
            .expect("parse")
    }

    fn first_identifier<'t>(parsed: &'t ParseResult, text: &str) -> Node<'t> {
        let mut stack = vec![parsed.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "identifier" && parsed.node_text(node) == text {
                return node;
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        panic!("identifier {text} not found");
    }

    #[test]
    fn unbound_reference_is_undecided_and_negation_preserves_it() {
        let parsed = parse("let a = 1; a;");
        let semantics = SyntacticSemantics::new(&parsed);
        let ctx = EvalContext {
            source: parsed.source(),
            profile: parsed.language().profile(),
            resolver: &semantics,
            hierarchy: &semantics,
        };
        let expr = parse_block("!ref(decl)", 0, dialect(true)).expect("constraint");
        let bindings = Bindings::new();
        let node = first_identifier(&parsed, "a");
        assert_eq!(evaluate(&expr, Subject::Node(node), false, &ctx, &bindings), None);
    }

    #[test]
    fn or_short_circuits_past_undecided_terms() {
        let parsed = parse("foo;");
        let ctx = EvalContext {
            source: parsed.source(),
            profile: parsed.language().profile(),
            resolver: &NoSemantics,
            hierarchy: &NoSemantics,
        };
        let expr = parse_block("ref(x) || regex(fo+)", 0, dialect(true)).expect("constraint");
        let node = first_identifier(&parsed, "foo");
        assert_eq!(
            evaluate(&expr, Subject::Node(node), false, &ctx, &Bindings::new()),
            Some(true)
        );
    }

    #[test]
    fn subtype_patterns_consult_the_hierarchy() {
        let parsed = parse("let w = new Widget(); w;");
        let semantics = SyntacticSemantics::new(&parsed);
        let mut hierarchy = MockHierarchy::new();
        hierarchy.expect_supertypes().returning(|ty| {
            if ty.simple_name() == "Widget" {
                vec![TypeRef::new("Component")]
            } else {
                Vec::new()
            }
        });
        let ctx = EvalContext {
            source: parsed.source(),
            profile: parsed.language().profile(),
            resolver: &semantics,
            hierarchy: &hierarchy,
        };
        let usage = {
            let mut stack = vec![parsed.root_node()];
            let mut found = Vec::new();
            while let Some(node) = stack.pop() {
                if node.kind() == "identifier" && parsed.node_text(node) == "w" {
                    found.push(node);
                }
                let mut cursor = node.walk();
                let children: Vec<_> = node.children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
            found.last().copied().expect("usage")
        };
        let bindings = Bindings::new();
        let exact = parse_block("exprtype(Component)", 0, dialect(true)).expect("exact");
        let sub = parse_block("exprtype(*Component)", 0, dialect(true)).expect("sub");
        assert_eq!(evaluate(&exact, Subject::Node(usage), false, &ctx, &bindings), Some(false));
        assert_eq!(evaluate(&sub, Subject::Node(usage), false, &ctx, &bindings), Some(true));
    }

    #[test]
    fn count_applies_to_runs_and_words() {
        let parsed = parse("a; b; c;");
        let ctx = EvalContext {
            source: parsed.source(),
            profile: parsed.language().profile(),
            resolver: &NoSemantics,
            hierarchy: &NoSemantics,
        };
        let root = parsed.root_node();
        let mut cursor = root.walk();
        let statements: Vec<_> = root.named_children(&mut cursor).collect();
        let expr = parse_block("count(2,3)", 0, dialect(true)).expect("count");
        let bindings = Bindings::new();
        assert_eq!(
            evaluate(&expr, Subject::Nodes(&statements), false, &ctx, &bindings),
            Some(true)
        );
        assert_eq!(
            evaluate(&expr, Subject::Nodes(statements.get(..1).unwrap_or_default()), false, &ctx, &bindings),
            Some(false)
        );
        assert_eq!(
            evaluate(&expr, Subject::Text("two words"), false, &ctx, &bindings),
            Some(true)
        );
    }

    #[test]
    fn text_subjects_use_search_semantics() {
        let parsed = parse("x;");
        let ctx = EvalContext {
            source: parsed.source(),
            profile: parsed.language().profile(),
            resolver: &NoSemantics,
            hierarchy: &NoSemantics,
        };
        let expr = parse_block("regexw(todo)", 0, dialect(false)).expect("regexw");
        let bindings = Bindings::new();
        assert_eq!(
            evaluate(&expr, Subject::Text("fix TODO later"), false, &ctx, &bindings),
            Some(true)
        );
        assert_eq!(
            evaluate(&expr, Subject::Text("todos"), false, &ctx, &bindings),
            Some(false)
        );
    }
}
