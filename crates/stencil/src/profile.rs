//! Per-language capability tables.
//!
//! The matcher is language agnostic: everything it needs to know about a
//! grammar (which node kinds hold statements, which kinds are interchangeable
//! under loose matching, where declarations keep their names) lives in one
//! static [`LanguageProfile`] per language.

use crate::options::PatternContext;

/// Source text wrapped around a pattern fragment so that it parses in a
/// particular grammar context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Wrapper {
    pub(crate) prefix: &'static str,
    pub(crate) suffix: &'static str,
    /// Indentation inserted before every line of the fragment.
    pub(crate) indent: &'static str,
}

/// A node kind that declares a named entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub(crate) kind: &'static str,
    /// Field holding the declared name; `None` means the first named child.
    pub(crate) name_field: Option<&'static str>,
    pub(crate) type_field: Option<&'static str>,
    pub(crate) value_field: Option<&'static str>,
}

/// Static description of a grammar's structure.
#[derive(Debug)]
pub struct LanguageProfile {
    pub(crate) quote_sigil: bool,
    /// Whether a postfix `?` is an operator, leaving `{0,1}` as the only
    /// spelling of an optional placeholder.
    pub(crate) postfix_try: bool,
    pub(crate) equivalences: &'static [&'static [&'static str]],
    pub(crate) statement_containers: &'static [&'static str],
    pub(crate) block_kinds: &'static [&'static str],
    pub(crate) statement_wrappers: &'static [&'static str],
    pub(crate) comment_kinds: &'static [&'static str],
    pub(crate) string_kinds: &'static [&'static str],
    pub(crate) separators: &'static [&'static str],
    pub(crate) terminators: &'static [&'static str],
    pub(crate) qualified_name_kinds: &'static [&'static str],
    pub(crate) path_separator: &'static str,
    /// Assignment-like kinds and the field holding the written target.
    pub(crate) write_targets: &'static [(&'static str, &'static str)],
    pub(crate) declarations: &'static [Declaration],
    pub(crate) literal_types: &'static [(&'static str, &'static str)],
    /// Kinds that construct a value of the type named by the given field.
    pub(crate) constructors: &'static [(&'static str, &'static str)],
    pub(crate) call_kinds: &'static [&'static str],
    pub(crate) scope_kinds: &'static [&'static str],
    pub(crate) parenthesized_kinds: &'static [&'static str],
    pub(crate) statement_wrapper: Wrapper,
    pub(crate) member_wrapper: Wrapper,
    pub(crate) expression_wrapper: Wrapper,
}

impl LanguageProfile {
    /// Returns whether two node kinds may stand in for each other when loose
    /// matching is enabled.
    #[must_use]
    pub fn equivalent_slot(&self, kind_a: &str, kind_b: &str) -> bool {
        kind_a == kind_b
            || self
                .equivalences
                .iter()
                .any(|class| class.contains(&kind_a) && class.contains(&kind_b))
    }

    /// Returns whether children of this kind are statements or members.
    #[must_use]
    pub fn is_statement_container(&self, kind: &str) -> bool {
        self.statement_containers.contains(&kind)
    }

    /// Returns whether `kind` is a comment.
    #[must_use]
    pub fn is_comment(&self, kind: &str) -> bool {
        self.comment_kinds.contains(&kind)
    }

    /// Returns whether `kind` is a string literal.
    #[must_use]
    pub fn is_string(&self, kind: &str) -> bool {
        self.string_kinds.contains(&kind)
    }

    pub(crate) fn is_block(&self, kind: &str) -> bool {
        self.block_kinds.contains(&kind)
    }

    pub(crate) fn is_statement_wrapper(&self, kind: &str) -> bool {
        self.statement_wrappers.contains(&kind)
    }

    pub(crate) fn is_separator(&self, kind: &str) -> bool {
        self.separators.contains(&kind)
    }

    pub(crate) fn is_terminator(&self, kind: &str) -> bool {
        self.terminators.contains(&kind)
    }

    pub(crate) fn is_qualified_name(&self, kind: &str) -> bool {
        self.qualified_name_kinds.contains(&kind)
    }

    pub(crate) fn is_scope(&self, kind: &str) -> bool {
        self.scope_kinds.contains(&kind)
    }

    pub(crate) fn is_call(&self, kind: &str) -> bool {
        self.call_kinds.contains(&kind)
    }

    pub(crate) fn is_parenthesized(&self, kind: &str) -> bool {
        self.parenthesized_kinds.contains(&kind)
    }

    pub(crate) fn declaration(&self, kind: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|decl| decl.kind == kind)
    }

    pub(crate) fn write_target_field(&self, kind: &str) -> Option<&'static str> {
        self.write_targets
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, field)| *field)
    }

    pub(crate) fn literal_type(&self, kind: &str) -> Option<&'static str> {
        self.literal_types
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, ty)| *ty)
    }

    pub(crate) fn constructor_field(&self, kind: &str) -> Option<&'static str> {
        self.constructors
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, field)| *field)
    }

    /// Wrapper used to parse a fragment in `context`; `None` parses as a file.
    pub(crate) const fn wrapper(&self, context: PatternContext) -> Option<&Wrapper> {
        match context {
            PatternContext::Default | PatternContext::File => None,
            PatternContext::Statement => Some(&self.statement_wrapper),
            PatternContext::Member => Some(&self.member_wrapper),
            PatternContext::Expression => Some(&self.expression_wrapper),
        }
    }
}

pub(crate) static RUST: LanguageProfile = LanguageProfile {
    quote_sigil: false,
    postfix_try: true,
    equivalences: &[
        &["identifier", "field_identifier", "shorthand_field_identifier"],
        &["string_literal", "raw_string_literal"],
    ],
    statement_containers: &["source_file", "block", "declaration_list"],
    block_kinds: &["block"],
    statement_wrappers: &["expression_statement"],
    comment_kinds: &["line_comment", "block_comment"],
    string_kinds: &["string_literal", "raw_string_literal"],
    separators: &[","],
    terminators: &[";"],
    qualified_name_kinds: &["scoped_identifier", "scoped_type_identifier"],
    path_separator: "::",
    write_targets: &[
        ("assignment_expression", "left"),
        ("compound_assignment_expr", "left"),
    ],
    declarations: &[
        Declaration {
            kind: "let_declaration",
            name_field: Some("pattern"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "parameter",
            name_field: Some("pattern"),
            type_field: Some("type"),
            value_field: None,
        },
        Declaration {
            kind: "function_item",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "struct_item",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "enum_item",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "trait_item",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "const_item",
            name_field: Some("name"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "static_item",
            name_field: Some("name"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
    ],
    literal_types: &[
        ("integer_literal", "i32"),
        ("float_literal", "f64"),
        ("string_literal", "&str"),
        ("raw_string_literal", "&str"),
        ("char_literal", "char"),
        ("boolean_literal", "bool"),
    ],
    constructors: &[("struct_expression", "name")],
    call_kinds: &["call_expression"],
    scope_kinds: &[
        "source_file",
        "block",
        "function_item",
        "closure_expression",
        "declaration_list",
    ],
    parenthesized_kinds: &["parenthesized_expression"],
    statement_wrapper: Wrapper {
        prefix: "fn __stencil_wrapper__() {\n",
        suffix: "\n}\n",
        indent: "",
    },
    member_wrapper: Wrapper {
        prefix: "impl __StencilWrapper {\n",
        suffix: "\n}\n",
        indent: "",
    },
    expression_wrapper: Wrapper {
        prefix: "fn __stencil_wrapper__() {\nlet _ = ",
        suffix: ";\n}\n",
        indent: "",
    },
};

pub(crate) static PYTHON: LanguageProfile = LanguageProfile {
    quote_sigil: true,
    postfix_try: false,
    equivalences: &[&["string", "concatenated_string"]],
    statement_containers: &["module", "block"],
    block_kinds: &["block"],
    statement_wrappers: &["expression_statement"],
    comment_kinds: &["comment"],
    string_kinds: &["string"],
    separators: &[","],
    terminators: &[";"],
    qualified_name_kinds: &["dotted_name"],
    path_separator: ".",
    write_targets: &[("assignment", "left"), ("augmented_assignment", "left")],
    declarations: &[
        Declaration {
            kind: "assignment",
            name_field: Some("left"),
            type_field: Some("type"),
            value_field: Some("right"),
        },
        Declaration {
            kind: "typed_parameter",
            name_field: None,
            type_field: Some("type"),
            value_field: None,
        },
        Declaration {
            kind: "default_parameter",
            name_field: Some("name"),
            type_field: None,
            value_field: Some("value"),
        },
        Declaration {
            kind: "typed_default_parameter",
            name_field: Some("name"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "function_definition",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "class_definition",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
    ],
    literal_types: &[
        ("integer", "int"),
        ("float", "float"),
        ("string", "str"),
        ("true", "bool"),
        ("false", "bool"),
        ("none", "None"),
        ("list", "list"),
        ("dictionary", "dict"),
    ],
    constructors: &[],
    call_kinds: &["call"],
    scope_kinds: &[
        "module",
        "block",
        "function_definition",
        "class_definition",
        "lambda",
    ],
    parenthesized_kinds: &["parenthesized_expression"],
    statement_wrapper: Wrapper {
        prefix: "def __stencil_wrapper__():\n",
        suffix: "\n",
        indent: "    ",
    },
    member_wrapper: Wrapper {
        prefix: "class __StencilWrapper:\n",
        suffix: "\n",
        indent: "    ",
    },
    expression_wrapper: Wrapper {
        prefix: "__stencil_wrapper__ = (",
        suffix: ")\n",
        indent: "",
    },
};

pub(crate) static TYPESCRIPT: LanguageProfile = LanguageProfile {
    quote_sigil: true,
    postfix_try: false,
    equivalences: &[
        &[
            "identifier",
            "property_identifier",
            "shorthand_property_identifier",
        ],
        &["lexical_declaration", "variable_declaration"],
        &["function_expression", "arrow_function"],
        &["string", "template_string"],
    ],
    statement_containers: &[
        "program",
        "statement_block",
        "class_body",
        "switch_case",
        "switch_default",
    ],
    block_kinds: &["statement_block"],
    statement_wrappers: &["expression_statement"],
    comment_kinds: &["comment"],
    string_kinds: &["string", "template_string"],
    separators: &[","],
    terminators: &[";"],
    qualified_name_kinds: &["nested_identifier", "nested_type_identifier"],
    path_separator: ".",
    write_targets: &[
        ("assignment_expression", "left"),
        ("augmented_assignment_expression", "left"),
        ("update_expression", "argument"),
    ],
    declarations: &[
        Declaration {
            kind: "variable_declarator",
            name_field: Some("name"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "required_parameter",
            name_field: Some("pattern"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "optional_parameter",
            name_field: Some("pattern"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "public_field_definition",
            name_field: Some("name"),
            type_field: Some("type"),
            value_field: Some("value"),
        },
        Declaration {
            kind: "function_declaration",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "class_declaration",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "interface_declaration",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
        Declaration {
            kind: "method_definition",
            name_field: Some("name"),
            type_field: None,
            value_field: None,
        },
    ],
    literal_types: &[
        ("number", "number"),
        ("string", "string"),
        ("template_string", "string"),
        ("true", "boolean"),
        ("false", "boolean"),
        ("null", "null"),
        ("undefined", "undefined"),
        ("regex", "RegExp"),
    ],
    constructors: &[("new_expression", "constructor")],
    call_kinds: &["call_expression"],
    scope_kinds: &[
        "program",
        "statement_block",
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
        "class_body",
        "for_statement",
        "for_in_statement",
    ],
    parenthesized_kinds: &["parenthesized_expression"],
    statement_wrapper: Wrapper {
        prefix: "function __stencil_wrapper__() {\n",
        suffix: "\n}\n",
        indent: "",
    },
    member_wrapper: Wrapper {
        prefix: "class __StencilWrapper {\n",
        suffix: "\n}\n",
        indent: "",
    },
    expression_wrapper: Wrapper {
        prefix: "__stencil_wrapper__ = (",
        suffix: ");\n",
        indent: "",
    },
};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&TYPESCRIPT, "lexical_declaration", "variable_declaration", true)]
    #[case(&TYPESCRIPT, "identifier", "property_identifier", true)]
    #[case(&TYPESCRIPT, "identifier", "number", false)]
    #[case(&RUST, "identifier", "field_identifier", true)]
    #[case(&PYTHON, "call", "call", true)]
    fn equivalent_slot_uses_the_class_table(
        #[case] profile: &LanguageProfile,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(profile.equivalent_slot(a, b), expected);
        assert_eq!(profile.equivalent_slot(b, a), expected);
    }

    #[test]
    fn file_context_needs_no_wrapper() {
        assert!(TYPESCRIPT.wrapper(PatternContext::File).is_none());
        assert!(TYPESCRIPT.wrapper(PatternContext::Statement).is_some());
    }
}
