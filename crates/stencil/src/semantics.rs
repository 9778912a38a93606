//! Semantic collaborators consulted by type, reference and access constraints.
//!
//! The matcher never resolves names or types itself. It asks a [`Resolver`]
//! about individual nodes and a [`TypeHierarchy`] about supertypes. The
//! built-in [`SyntacticSemantics`] answers both from a single parsed file,
//! using declarations, annotations and literals; a richer hierarchy (for
//! example one backed by a project index) can be layered on top.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use tree_sitter::Node;

use crate::parser::ParseResult;
use crate::profile::LanguageProfile;

const MAX_TYPE_DEPTH: usize = 8;

/// A normalised type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    name: String,
}

impl TypeRef {
    /// Normalises whitespace in `name`.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        let mut normalised = String::new();
        let mut pending_space = false;
        for c in name.as_ref().trim().chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            let glue = |ch: char| "<>,[]()&*:.|".contains(ch);
            if pending_space
                && !glue(c)
                && !normalised.ends_with(glue)
                && !normalised.is_empty()
            {
                normalised.push(' ');
            }
            pending_space = false;
            normalised.push(c);
        }
        Self { name: normalised }
    }

    /// Returns the full normalised name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name without generic arguments, references or a path
    /// qualifier: `&std::vec::Vec<i32>` becomes `Vec`.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        let unqualified = self
            .name
            .trim_start_matches(['&', '*'])
            .trim_start_matches("mut ")
            .trim_start();
        let base = unqualified
            .split(['<', '['])
            .next()
            .unwrap_or(unqualified);
        base.rsplit(&[':', '.'][..]).next().unwrap_or(base)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Answers subtype questions for `exprtype(*T)`, `formal(*T)` and hierarchy
/// navigation.
pub trait TypeHierarchy {
    /// Returns the direct supertypes of `ty`.
    fn supertypes(&self, ty: &TypeRef) -> Vec<TypeRef>;

    /// Returns whether `sub` is `sup` or transitively extends it.
    fn is_subtype(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        self.ancestors(sub)
            .iter()
            .any(|ty| ty.simple_name() == sup.simple_name())
    }

    /// Returns `ty` followed by all of its transitive supertypes.
    fn ancestors(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([ty.clone()]);
        let mut out = Vec::new();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.simple_name().to_owned()) {
                continue;
            }
            queue.extend(self.supertypes(&next));
            out.push(next);
        }
        out
    }
}

/// Resolves types, references and access modes of nodes in one file.
pub trait Resolver<'t> {
    /// Returns the static type of an expression.
    fn expression_type(&self, node: Node<'t>) -> Option<TypeRef>;

    /// Returns the declared type of the parameter an argument is passed to.
    fn formal_type(&self, node: Node<'t>) -> Option<TypeRef>;

    /// Returns the name node of the declaration `node` refers to.
    fn resolve_reference(&self, node: Node<'t>) -> Option<Node<'t>>;

    /// Returns whether `node` is written rather than read.
    fn is_write_access(&self, node: Node<'t>) -> bool;
}

/// A collaborator that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSemantics;

impl TypeHierarchy for NoSemantics {
    fn supertypes(&self, _ty: &TypeRef) -> Vec<TypeRef> {
        Vec::new()
    }
}

impl<'t> Resolver<'t> for NoSemantics {
    fn expression_type(&self, _node: Node<'t>) -> Option<TypeRef> {
        None
    }

    fn formal_type(&self, _node: Node<'t>) -> Option<TypeRef> {
        None
    }

    fn resolve_reference(&self, _node: Node<'t>) -> Option<Node<'t>> {
        None
    }

    fn is_write_access(&self, _node: Node<'t>) -> bool {
        false
    }
}

/// Unions a local hierarchy with an optional external one.
pub(crate) struct LayeredHierarchy<'a> {
    pub(crate) local: &'a dyn TypeHierarchy,
    pub(crate) external: Option<&'a dyn TypeHierarchy>,
}

impl TypeHierarchy for LayeredHierarchy<'_> {
    fn supertypes(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut out = self.local.supertypes(ty);
        if let Some(external) = self.external {
            for extra in external.supertypes(ty) {
                if !out.contains(&extra) {
                    out.push(extra);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
struct Declared<'t> {
    decl: Node<'t>,
    name: Node<'t>,
    scope: Node<'t>,
}

/// Per-file semantics computed from the syntax tree alone.
pub struct SyntacticSemantics<'t> {
    parsed: &'t ParseResult,
    profile: &'static LanguageProfile,
    declarations: HashMap<&'t str, Vec<Declared<'t>>>,
    heritage: HashMap<String, Vec<TypeRef>>,
}

impl fmt::Debug for SyntacticSemantics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntacticSemantics")
            .field("language", &self.parsed.language())
            .field("declarations", &self.declarations.len())
            .field("types_with_supertypes", &self.heritage.len())
            .finish()
    }
}

impl<'t> SyntacticSemantics<'t> {
    /// Indexes declarations and type heritage in `parsed`.
    #[must_use]
    pub fn new(parsed: &'t ParseResult) -> Self {
        let mut semantics = Self {
            parsed,
            profile: parsed.language().profile(),
            declarations: HashMap::new(),
            heritage: HashMap::new(),
        };

        let mut stack = vec![parsed.root_node()];
        while let Some(node) = stack.pop() {
            semantics.index(node);
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        semantics
    }

    fn text(&self, node: Node<'t>) -> &'t str {
        self.parsed.source().get(node.byte_range()).unwrap_or_default()
    }

    fn index(&mut self, node: Node<'t>) {
        let kind = node.kind();
        if let Some(decl) = self.profile.declaration(kind) {
            let name_node = decl.name_field.map_or_else(
                || node.named_child(0),
                |field| node.child_by_field_name(field),
            );
            if let Some(name) = name_node.filter(|n| n.child_count() == 0 && n.is_named()) {
                self.declare(node, name);
            }
        }
        if kind == "parameters" {
            let mut cursor = node.walk();
            let plain: Vec<Node<'t>> = node
                .named_children(&mut cursor)
                .filter(|child| child.kind() == "identifier")
                .collect();
            for param in plain {
                self.declare(param, param);
            }
        }
        self.index_heritage(node);
    }

    fn declare(&mut self, decl: Node<'t>, name: Node<'t>) {
        let scope = self.enclosing_scope(decl);
        let key = self.text(name);
        self.declarations
            .entry(key)
            .or_default()
            .push(Declared { decl, name, scope });
    }

    fn enclosing_scope(&self, node: Node<'t>) -> Node<'t> {
        let mut current = node.parent();
        while let Some(candidate) = current {
            if self.profile.is_scope(candidate.kind()) {
                return candidate;
            }
            current = candidate.parent();
        }
        self.parsed.root_node()
    }

    fn index_heritage(&mut self, node: Node<'t>) {
        let kind = node.kind();
        let (subject, supers): (Option<Node<'t>>, Vec<Node<'t>>) = match kind {
            "class_declaration" | "class" | "abstract_class_declaration" | "interface_declaration" => {
                let mut cursor = node.walk();
                let clauses: Vec<Node<'t>> = node
                    .named_children(&mut cursor)
                    .filter(|c| matches!(c.kind(), "class_heritage" | "extends_type_clause"))
                    .collect();
                let mut supers = Vec::new();
                for clause in clauses {
                    collect_heritage_types(clause, &mut supers);
                }
                (node.child_by_field_name("name"), supers)
            }
            "impl_item" => (
                node.child_by_field_name("type"),
                node.child_by_field_name("trait").into_iter().collect(),
            ),
            "trait_item" => (
                node.child_by_field_name("name"),
                node.child_by_field_name("bounds")
                    .map(named_children)
                    .unwrap_or_default(),
            ),
            "class_definition" => (
                node.child_by_field_name("name"),
                node.child_by_field_name("superclasses")
                    .map(named_children)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|c| c.kind() != "keyword_argument")
                    .collect(),
            ),
            _ => return,
        };

        let Some(subject) = subject else {
            return;
        };
        if supers.is_empty() {
            return;
        }
        let key = TypeRef::new(self.text(subject)).simple_name().to_owned();
        let types: Vec<TypeRef> = supers
            .into_iter()
            .map(|sup| TypeRef::new(self.text(sup)))
            .collect();
        let entry = self.heritage.entry(key).or_default();
        for ty in types {
            if !entry.contains(&ty) {
                entry.push(ty);
            }
        }
    }

    fn declared_type(&self, declared: Declared<'t>, depth: usize) -> Option<TypeRef> {
        let spec = self.profile.declaration(declared.decl.kind())?;
        if let Some(ty) = spec
            .type_field
            .and_then(|field| declared.decl.child_by_field_name(field))
        {
            return Some(type_annotation(self.text(ty)));
        }
        let value = spec
            .value_field
            .and_then(|field| declared.decl.child_by_field_name(field))?;
        self.type_of(value, depth + 1)
    }

    fn type_of(&self, node: Node<'t>, depth: usize) -> Option<TypeRef> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let kind = node.kind();
        if self.profile.is_parenthesized(kind) || self.profile.is_statement_wrapper(kind) {
            return node
                .named_child(0)
                .and_then(|inner| self.type_of(inner, depth + 1));
        }
        if let Some(literal) = self.profile.literal_type(kind) {
            return Some(TypeRef::new(literal));
        }
        if let Some(field) = self.profile.constructor_field(kind) {
            return node
                .child_by_field_name(field)
                .map(|ty| TypeRef::new(self.text(ty)));
        }
        if self.profile.is_call(kind) {
            return node
                .child_by_field_name("function")
                .and_then(|callee| constructor_like(self.text(callee)));
        }
        if node.child_count() == 0 {
            let declared = self.lookup(node)?;
            return self.declared_type(declared, depth);
        }
        None
    }

    fn lookup(&self, node: Node<'t>) -> Option<Declared<'t>> {
        let candidates = self.declarations.get(self.text(node))?;
        let mut best: Option<Declared<'t>> = None;
        for candidate in candidates {
            if let Some(current) = best {
                if candidate.scope.start_byte() < current.scope.start_byte()
                    || candidate.scope.end_byte() > current.scope.end_byte()
                {
                    continue;
                }
            }
            let visible = candidate.scope.start_byte() <= node.start_byte()
                && node.end_byte() <= candidate.scope.end_byte();
            if !visible {
                continue;
            }
            let precedes = candidate.name.start_byte() <= node.start_byte();
            let replace = best.is_none_or(|current| {
                current.scope != candidate.scope
                    || (precedes
                        && (current.name.start_byte() > node.start_byte()
                            || candidate.name.start_byte() > current.name.start_byte()))
            });
            if replace {
                best = Some(*candidate);
            }
        }
        best
    }

    fn callee_declaration(&self, call: Node<'t>) -> Option<Node<'t>> {
        let callee = call.child_by_field_name("function")?;
        let name_node = last_identifier(callee)?;
        let candidates = self.declarations.get(self.text(name_node))?;
        candidates
            .iter()
            .map(|declared| declared.decl)
            .find(|decl| decl.child_by_field_name("parameters").is_some())
    }
}

impl<'t> Resolver<'t> for SyntacticSemantics<'t> {
    fn expression_type(&self, node: Node<'t>) -> Option<TypeRef> {
        self.type_of(node, 0)
    }

    fn formal_type(&self, node: Node<'t>) -> Option<TypeRef> {
        let arguments = node.parent()?;
        let call = arguments.parent()?;
        if !self.profile.is_call(call.kind()) {
            return None;
        }
        let position = named_children(arguments)
            .iter()
            .position(|arg| *arg == node)?;

        let decl = self.callee_declaration(call)?;
        let parameters = decl.child_by_field_name("parameters")?;
        let formals: Vec<Node<'t>> = named_children(parameters)
            .into_iter()
            .filter(|param| param.kind() != "self_parameter" && self.text(*param) != "self")
            .collect();
        let param = formals.get(position)?;
        let spec = self.profile.declaration(param.kind())?;
        let ty = param.child_by_field_name(spec.type_field?)?;
        Some(type_annotation(self.text(ty)))
    }

    fn resolve_reference(&self, node: Node<'t>) -> Option<Node<'t>> {
        if node.child_count() != 0 {
            return None;
        }
        self.lookup(node).map(|declared| declared.name)
    }

    fn is_write_access(&self, node: Node<'t>) -> bool {
        let mut target = node;
        while let Some(parent) = target.parent() {
            let kind = parent.kind();
            if self.profile.is_parenthesized(kind) {
                target = parent;
                continue;
            }
            if let Some(field) = self.profile.write_target_field(kind) {
                return parent.child_by_field_name(field) == Some(target);
            }
            if let Some(decl) = self.profile.declaration(kind) {
                let is_name = decl
                    .name_field
                    .and_then(|field| parent.child_by_field_name(field))
                    == Some(target);
                let has_value = decl
                    .value_field
                    .and_then(|field| parent.child_by_field_name(field))
                    .is_some();
                return is_name && has_value;
            }
            return false;
        }
        false
    }
}

impl TypeHierarchy for SyntacticSemantics<'_> {
    fn supertypes(&self, ty: &TypeRef) -> Vec<TypeRef> {
        self.heritage
            .get(ty.simple_name())
            .cloned()
            .unwrap_or_default()
    }
}

/// Returns the declared name when `node` is (or directly wraps) a
/// declaration.
pub(crate) fn declared_name<'t>(profile: &LanguageProfile, node: Node<'t>) -> Option<Node<'t>> {
    let direct = |candidate: Node<'t>| {
        let spec = profile.declaration(candidate.kind())?;
        spec.name_field.map_or_else(
            || candidate.named_child(0),
            |field| candidate.child_by_field_name(field),
        )
    };
    direct(node).or_else(|| {
        named_children(node).into_iter().find_map(direct)
    })
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

fn collect_heritage_types<'t>(clause: Node<'t>, out: &mut Vec<Node<'t>>) {
    for child in named_children(clause) {
        match child.kind() {
            "extends_clause" | "implements_clause" => collect_heritage_types(child, out),
            "type_arguments" => {}
            _ => out.push(child),
        }
    }
}

fn last_identifier(node: Node<'_>) -> Option<Node<'_>> {
    if node.child_count() == 0 {
        return Some(node);
    }
    ["property", "attribute", "field", "name"]
        .iter()
        .find_map(|field| node.child_by_field_name(field))
        .or_else(|| named_children(node).last().copied())
        .and_then(last_identifier)
}

fn type_annotation(text: &str) -> TypeRef {
    TypeRef::new(text.trim_start_matches(':').trim())
}

fn constructor_like(callee: &str) -> Option<TypeRef> {
    let segments: Vec<&str> = callee.split(['.', ':']).filter(|s| !s.is_empty()).collect();
    let starts_upper = |segment: &&str| segment.chars().next().is_some_and(char::is_uppercase);
    match segments.as_slice() {
        [.., last] if starts_upper(last) => Some(TypeRef::new(*last)),
        [.., owner, "new"] if starts_upper(owner) => Some(TypeRef::new(*owner)),
        _ => None,
    }
}
