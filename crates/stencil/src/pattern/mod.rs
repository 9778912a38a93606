//! Pattern compilation.
//!
//! A pattern is source text of the target language in which placeholders
//! stand for syntax nodes. Compilation tokenizes the placeholders, parses the
//! remaining text as a grammar fragment, and lowers the resulting syntax tree
//! into an immutable [`PatternNode`] tree. Compiling the same text with the
//! same options always yields an equal tree.
//!
//! # Example
//!
//! ```ignore
//! use stencil::{Pattern, SupportedLanguage};
//!
//! let pattern = Pattern::compile("'a = 'a;", SupportedLanguage::TypeScript)?;
//! assert_eq!(pattern.variable_names().collect::<Vec<_>>(), ["a"]);
//! ```

mod fragment;
mod lower;
mod text;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use tracing::debug;

use crate::constraint::{ConstraintExpr, Dialect, parse_bare, parse_block};
use crate::error::StencilError;
use crate::language::SupportedLanguage;
use crate::options::SearchOptions;
use crate::placeholder::{RawConstraint, Tokenized, tokenize};

pub(crate) use fragment::Fragment;
pub(crate) use lower::{significant_children, sole_named_child};
pub use text::{TextCategory, TextSegment, TextTemplate};
pub(crate) use text::{comment_body, string_body};

pub(crate) use lower::Lowerer;

pub(crate) const COMPILE_TARGET: &str = "stencil::compile";

/// Repetition bounds and policy for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantifier {
    min: u32,
    max: Option<u32>,
    greedy: bool,
}

impl Quantifier {
    /// Exactly one occurrence.
    #[must_use]
    pub const fn one() -> Self {
        Self::new(1, Some(1))
    }

    /// Zero or one occurrence (`?`).
    #[must_use]
    pub const fn optional() -> Self {
        Self::new(0, Some(1))
    }

    /// Zero or more occurrences (`*`).
    #[must_use]
    pub const fn any() -> Self {
        Self::new(0, None)
    }

    /// One or more occurrences (`+`).
    #[must_use]
    pub const fn at_least_one() -> Self {
        Self::new(1, None)
    }

    /// A counted range; `None` leaves the maximum unbounded.
    #[must_use]
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self {
            min,
            max,
            greedy: true,
        }
    }

    /// Returns the same bounds with lazy (shortest first) policy.
    #[must_use]
    pub const fn lazy(self) -> Self {
        Self {
            greedy: false,
            ..self
        }
    }

    /// Inclusive minimum.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Inclusive maximum; `None` is unbounded.
    #[must_use]
    pub const fn max(&self) -> Option<u32> {
        self.max
    }

    /// Whether longer runs are tried first.
    #[must_use]
    pub const fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Whether this is the plain `{1,1}` quantifier.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        self.min == 1 && matches!(self.max, Some(1))
    }

    pub(crate) fn min_len(&self) -> usize {
        usize::try_from(self.min).unwrap_or(usize::MAX)
    }

    /// Longest run allowed when `available` nodes remain.
    pub(crate) fn max_len(&self, available: usize) -> usize {
        self.max
            .map_or(available, |max| usize::try_from(max).unwrap_or(usize::MAX))
            .min(available)
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            return Ok(());
        }
        match self.max {
            Some(max) => write!(f, "{{{},{max}}}", self.min)?,
            None => write!(f, "{{{},}}", self.min)?,
        }
        if !self.greedy {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// The kind of slot a variable occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The variable is a whole statement (`'x;`).
    Statement,
    /// The variable stands for any named node.
    Node,
}

/// A variable occurrence inside a pattern tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    /// Variable name (anonymous variables get generated names).
    pub name: String,
    /// Repetition bounds for this occurrence.
    pub quantifier: Quantifier,
    /// Slot kind of this occurrence.
    pub slot: Slot,
}

/// A node of a compiled pattern tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternNode {
    /// A leaf that must match by kind and text.
    Token {
        /// Grammar kind of the leaf.
        kind: &'static str,
        /// Literal text of the leaf.
        text: String,
    },
    /// An interior node whose significant children must match in order.
    Node {
        /// Grammar kind of the node.
        kind: &'static str,
        /// Lowered significant children.
        children: Vec<Self>,
    },
    /// A placeholder.
    Variable(VarRef),
    /// A comment or string literal with placeholders in its text.
    Text(TextTemplate),
}

impl PatternNode {
    /// Returns the grammar kind this node requires, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<&'static str> {
        match self {
            Self::Token { kind, .. } | Self::Node { kind, .. } => Some(*kind),
            Self::Variable(_) | Self::Text(_) => None,
        }
    }

    fn write_plan(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { text, .. } => write!(f, "{text:?}"),
            Self::Node { kind, children } => {
                write!(f, "({kind}")?;
                for child in children {
                    f.write_str(" ")?;
                    child.write_plan(f)?;
                }
                f.write_str(")")
            }
            Self::Variable(var) => {
                let stmt = if var.slot == Slot::Statement { ";" } else { "" };
                write!(f, "${}{}{stmt}", var.name, var.quantifier)
            }
            Self::Text(template) => {
                let tag = match template.category() {
                    TextCategory::Comment { doc: true } => "doc",
                    TextCategory::Comment { doc: false } => "comment",
                    TextCategory::StringLiteral => "string",
                };
                write!(f, "{tag}[")?;
                for segment in template.segments() {
                    match segment {
                        TextSegment::Literal(text) => write!(f, "{text:?}")?,
                        TextSegment::Variable(name) => write!(f, "${name}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// The top-level shape of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternRoot {
    /// One node, matched against each candidate node.
    Single(PatternNode),
    /// Several sibling nodes, matched against runs of statements.
    Sequence(Vec<PatternNode>),
}

impl fmt::Display for PatternRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(node) => node.write_plan(f),
            Self::Sequence(nodes) => {
                f.write_str("(sequence")?;
                for node in nodes {
                    f.write_str(" ")?;
                    node.write_plan(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Declaration-level facts about one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    name: String,
    anonymous: bool,
    constraint: Option<ConstraintExpr>,
    hierarchy: bool,
    canonical: Option<String>,
}

impl VariableSpec {
    /// Variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the variable was written as `'_` or `$_$`.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Compiled constraint, if any.
    #[must_use]
    pub const fn constraint(&self) -> Option<&ConstraintExpr> {
        self.constraint.as_ref()
    }

    /// Whether regex constraints also try the candidate's supertypes.
    #[must_use]
    pub const fn hierarchy(&self) -> bool {
        self.hierarchy
    }

    fn declare(
        &mut self,
        canonical: String,
        expr: ConstraintExpr,
        hierarchy: bool,
        offset: usize,
    ) -> Result<(), StencilError> {
        match &self.canonical {
            Some(existing) if *existing != canonical => Err(StencilError::malformed(
                offset,
                format!(
                    "variable '{}' has conflicting constraints {existing} and {canonical}",
                    self.name
                ),
            )),
            Some(_) => Ok(()),
            None => {
                self.canonical = Some(canonical);
                self.constraint = Some(expr);
                self.hierarchy = hierarchy;
                Ok(())
            }
        }
    }
}

/// A compiled structural search pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    language: SupportedLanguage,
    options: SearchOptions,
    root: PatternRoot,
    variables: BTreeMap<String, VariableSpec>,
}

impl Pattern {
    /// Compiles a pattern with default options.
    ///
    /// # Errors
    ///
    /// Returns [`StencilError::MalformedPattern`] for placeholder or
    /// constraint syntax errors and [`StencilError::UnsupportedPattern`] when
    /// the text is not a fragment of `language`.
    pub fn compile(source: &str, language: SupportedLanguage) -> Result<Self, StencilError> {
        Self::compile_with(source, language, SearchOptions::default())
    }

    /// Compiles a pattern with explicit options.
    ///
    /// # Errors
    ///
    /// See [`Pattern::compile`].
    pub fn compile_with(
        source: &str,
        language: SupportedLanguage,
        options: SearchOptions,
    ) -> Result<Self, StencilError> {
        PatternBuilder::new(source, language).options(options).build()
    }

    /// Starts building a pattern with out-of-band variable constraints.
    #[must_use]
    pub fn builder(source: impl Into<String>, language: SupportedLanguage) -> PatternBuilder {
        PatternBuilder::new(source, language)
    }

    /// Returns the pattern text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the pattern language.
    #[must_use]
    pub const fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Returns the options the pattern was compiled with.
    #[must_use]
    pub const fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Returns the compiled tree.
    #[must_use]
    pub const fn root(&self) -> &PatternRoot {
        &self.root
    }

    /// Returns a compact textual rendering of the compiled tree.
    #[must_use]
    pub fn plan(&self) -> String {
        self.root.to_string()
    }

    /// Looks up a variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.get(name)
    }

    /// Returns all variables, anonymous ones included.
    pub fn variables(&self) -> impl Iterator<Item = &VariableSpec> {
        self.variables.values()
    }

    /// Returns the names of reported (non-anonymous) variables in order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .values()
            .filter(|spec| !spec.anonymous)
            .map(VariableSpec::name)
    }

    /// Returns whether any constraint needs a type or reference resolver.
    #[must_use]
    pub fn needs_semantics(&self) -> bool {
        self.variables.values().any(|spec| {
            spec.hierarchy
                || spec
                    .constraint
                    .as_ref()
                    .is_some_and(ConstraintExpr::needs_semantics)
        })
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.language == other.language
            && self.root == other.root
            && self.variables == other.variables
    }
}

/// Builder for patterns whose variables receive constraints out of band.
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    source: String,
    language: SupportedLanguage,
    options: SearchOptions,
    constraints: Vec<(String, String)>,
}

impl PatternBuilder {
    /// Starts a builder for `source` in `language`.
    #[must_use]
    pub fn new(source: impl Into<String>, language: SupportedLanguage) -> Self {
        Self {
            source: source.into(),
            language,
            options: SearchOptions::default(),
            constraints: Vec::new(),
        }
    }

    /// Replaces the search options.
    #[must_use]
    pub const fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches a constraint, written in the constraint-block language, to a
    /// variable. A leading `*` requests hierarchy navigation; surrounding
    /// brackets are optional.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.constraints.push((name.into(), text.into()));
        self
    }

    /// Compiles the pattern.
    ///
    /// # Errors
    ///
    /// See [`Pattern::compile`]. A constraint for a variable the pattern does
    /// not contain is [`StencilError::UnsupportedPattern`].
    pub fn build(self) -> Result<Pattern, StencilError> {
        let Self {
            source,
            language,
            options,
            constraints,
        } = self;
        let profile = language.profile();
        let case_sensitive = options.case_sensitive_match();

        let tokenized = tokenize(&source, profile)?;
        let dialect = Dialect { language, options };
        let variables = declare_variables(&tokenized, &constraints, dialect)?;

        let fragment = Fragment::parse(&tokenized.text, language, options.pattern_context())?;
        let root = Lowerer {
            fragment: &fragment,
            tokenized: &tokenized,
            profile,
            loose: options.loose_matching(),
            case_sensitive,
        }
        .lower_roots()?;

        debug!(
            target: COMPILE_TARGET,
            language = %language,
            pattern_len = source.len(),
            variables = variables.len(),
            context = %fragment.context(),
            "compiled pattern"
        );

        Ok(Pattern {
            source,
            language,
            options,
            root,
            variables,
        })
    }
}

fn declare_variables(
    tokenized: &Tokenized,
    constraints: &[(String, String)],
    dialect: Dialect,
) -> Result<BTreeMap<String, VariableSpec>, StencilError> {
    let Dialect { language, options } = dialect;
    let case_sensitive = options.case_sensitive_match();
    let mut variables: BTreeMap<String, VariableSpec> = BTreeMap::new();

    for placeholder in &tokenized.placeholders {
        let spec = match variables.entry(placeholder.name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(VariableSpec {
                name: placeholder.name.clone(),
                anonymous: placeholder.anonymous,
                constraint: None,
                hierarchy: false,
                canonical: None,
            }),
        };
        let Some(raw) = &placeholder.constraint else {
            if placeholder.hierarchy {
                spec.hierarchy = true;
            }
            continue;
        };
        let expr = match raw {
            RawConstraint::Block { text, offset } => parse_block(text, *offset, dialect)?,
            RawConstraint::Bare {
                regex,
                negated,
                offset,
            } => parse_bare(regex, *negated, *offset, case_sensitive)?,
        };
        spec.declare(
            raw.canonical(placeholder.hierarchy),
            expr,
            placeholder.hierarchy,
            placeholder.offset,
        )?;
    }

    for (name, text) in constraints {
        let Some(spec) = variables.get_mut(name) else {
            return Err(StencilError::unsupported(
                language,
                format!("constraint given for unknown variable '{name}'"),
            ));
        };
        let trimmed = text.trim();
        let (hierarchy, unstarred) = trimmed
            .strip_prefix('*')
            .map_or((false, trimmed), |rest| (true, rest.trim_start()));
        let inner = unstarred
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(unstarred);
        let expr = parse_block(inner, 0, dialect)?;
        let star = if hierarchy { "*" } else { "" };
        spec.declare(format!("{star}[{}]", inner.trim()), expr, hierarchy, 0)?;
    }

    for spec in variables.values() {
        let Some(expr) = &spec.constraint else {
            continue;
        };
        for target in expr.references() {
            if !variables.contains_key(target) {
                return Err(StencilError::unsupported(
                    language,
                    format!(
                        "variable '{}' references unknown variable '{target}'",
                        spec.name
                    ),
                ));
            }
        }
    }

    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PatternContext;
    use rstest::rstest;

    fn plan(source: &str, language: SupportedLanguage) -> String {
        Pattern::compile(source, language)
            .unwrap_or_else(|err| panic!("{source}: {err}"))
            .plan()
    }

    #[rstest]
    #[case("'_T*;", "(sequence $_T{0,};)")]
    #[case("'T; 'T;", "(sequence $T; $T;)")]
    #[case("'a = 'a;", "(expression_statement (assignment_expression $a \"=\" $a))")]
    #[case("foo('args*?)", "(call_expression \"foo\" (arguments \"(\" $args{0,}? \")\"))")]
    fn typescript_plans(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(plan(source, SupportedLanguage::TypeScript), expected);
    }

    #[test]
    fn string_placeholders_become_text_templates() {
        assert_eq!(
            plan("\"$exp$ is null\"", SupportedLanguage::TypeScript),
            "string[$exp\" is null\"]"
        );
    }

    #[test]
    fn comment_patterns_keep_their_category() {
        assert_eq!(
            plan("/** $doc$ */", SupportedLanguage::TypeScript),
            "doc[$doc]"
        );
    }

    #[test]
    fn compiling_twice_yields_equal_patterns() {
        let first = Pattern::compile("if ('c) { 'body*; }", SupportedLanguage::TypeScript)
            .expect("first");
        let second = Pattern::compile("if ('c) { 'body*; }", SupportedLanguage::TypeScript)
            .expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn anonymous_variables_are_not_reported() {
        let pattern = Pattern::compile("'_ = 'value;", SupportedLanguage::TypeScript)
            .expect("pattern");
        assert_eq!(pattern.variable_names().collect::<Vec<_>>(), ["value"]);
        assert_eq!(pattern.variables().count(), 2);
    }

    #[test]
    fn builder_attaches_constraints_to_dollar_variables() {
        let pattern = Pattern::builder("$x$ = 1;", SupportedLanguage::TypeScript)
            .constraint("x", "[regex(a.*)]")
            .build()
            .expect("pattern");
        assert!(pattern.variable("x").and_then(VariableSpec::constraint).is_some());
    }

    #[test]
    fn conflicting_constraints_are_malformed() {
        let err = Pattern::compile("'x:a + 'x:b", SupportedLanguage::TypeScript)
            .expect_err("conflict");
        assert!(err.is_malformed(), "{err}");
    }

    #[test]
    fn repeated_identical_constraints_are_accepted() {
        let pattern = Pattern::compile("'x:a + 'x:a", SupportedLanguage::TypeScript);
        assert!(pattern.is_ok());
    }

    #[test]
    fn builder_rejects_unknown_variables() {
        let err = Pattern::builder("$x$;", SupportedLanguage::TypeScript)
            .constraint("y", "regex(a)")
            .build()
            .expect_err("unknown");
        assert!(err.is_unsupported());
    }

    #[test]
    fn references_to_unknown_variables_are_unsupported() {
        let err = Pattern::compile("'x:[ref(missing)];", SupportedLanguage::TypeScript)
            .expect_err("unknown ref");
        assert!(err.is_unsupported());
    }

    #[test]
    fn lone_identifier_is_unsupported() {
        let err = Pattern::compile("foo", SupportedLanguage::Python).expect_err("unsupported");
        assert!(err.is_unsupported());
    }

    #[test]
    fn semantic_constraints_are_detected() {
        let plain = Pattern::compile("'x:foo;", SupportedLanguage::TypeScript).expect("plain");
        let typed = Pattern::compile("'x:[exprtype(Foo)];", SupportedLanguage::TypeScript)
            .expect("typed");
        assert!(!plain.needs_semantics());
        assert!(typed.needs_semantics());
    }

    #[test]
    fn explicit_expression_context_is_honoured() {
        let options = SearchOptions::default().with_pattern_context(PatternContext::Expression);
        let pattern = Pattern::compile_with("'a + 1", SupportedLanguage::Python, options)
            .expect("pattern");
        assert_eq!(pattern.plan(), "(binary_operator $a \"+\" \"1\")");
    }

    #[rstest]
    #[case(Quantifier::one(), "")]
    #[case(Quantifier::any(), "{0,}")]
    #[case(Quantifier::new(1, Some(3)).lazy(), "{1,3}?")]
    fn quantifiers_render_compactly(#[case] quantifier: Quantifier, #[case] expected: &str) {
        assert_eq!(quantifier.to_string(), expected);
    }
}
