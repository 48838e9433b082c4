//! Structural definitions extracted from tree-sitter syntax trees
//!
//! Each grammar is described by a small classification table mapping node
//! kinds to [`ChunkType`]s. Types (classes, traits, impl blocks) open a scope
//! so that functions inside them are reported as methods with a
//! `Type::method` breadcrumb.

use super::language::Language;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Kind of a structural unit or chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Interface,
    Module,
    Text,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Interface => "interface",
            Self::Module => "module",
            Self::Text => "text",
        }
    }
}

impl std::str::FromStr for ChunkType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "function" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "trait" => Self::Trait,
            "interface" => Self::Interface,
            "module" => Self::Module,
            "text" => Self::Text,
            other => {
                return Err(crate::error::Error::InvalidInput(format!(
                    "unknown chunk type: {}",
                    other
                )))
            }
        })
    }
}

/// A named structural unit of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub kind: ChunkType,
    pub name: Option<String>,
    /// Enclosing scopes and the name, joined with `::`
    pub breadcrumb: Option<String>,
    pub start_byte: usize,
    pub end_byte: usize,
    /// Start of the comment block directly above the definition, or `start_byte`
    pub doc_start_byte: usize,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
    /// Nesting depth among definitions; top level is 0
    pub depth: usize,
}

impl Definition {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start_byte..self.end_byte]
    }
}

enum Role<'t> {
    Definition {
        kind: ChunkType,
        name: Option<Node<'t>>,
        /// Node whose children are searched for nested definitions
        body: Option<Node<'t>>,
    },
    /// Not a unit itself, but names the scope of its children
    Scope { name: Option<Node<'t>>, body: Option<Node<'t>> },
    Other,
}

fn classify<'t>(language: Language, node: Node<'t>, in_type: bool) -> Role<'t> {
    let name = node.child_by_field_name("name");
    let body = node.child_by_field_name("body");
    let function = if in_type {
        ChunkType::Method
    } else {
        ChunkType::Function
    };

    let definition = |kind: ChunkType, body: Option<Node<'t>>| Role::Definition { kind, name, body };

    match language {
        Language::Rust => match node.kind() {
            "function_item" => definition(function, None),
            "struct_item" | "union_item" => definition(ChunkType::Struct, None),
            "enum_item" => definition(ChunkType::Enum, None),
            "trait_item" => definition(ChunkType::Trait, body),
            "mod_item" => definition(ChunkType::Module, body),
            "impl_item" => Role::Scope {
                name: node.child_by_field_name("type"),
                body,
            },
            _ => Role::Other,
        },
        Language::Python => match node.kind() {
            "function_definition" => definition(function, None),
            "class_definition" => definition(ChunkType::Class, body),
            "decorated_definition" => {
                let Some(inner) = node.child_by_field_name("definition") else {
                    return Role::Other;
                };
                match classify(language, inner, in_type) {
                    Role::Definition { kind, name, body } => Role::Definition { kind, name, body },
                    _ => Role::Other,
                }
            }
            _ => Role::Other,
        },
        Language::JavaScript | Language::TypeScript | Language::TypeScriptTsx => {
            match node.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    definition(ChunkType::Function, None)
                }
                "method_definition" => definition(ChunkType::Method, None),
                "class_declaration" | "abstract_class_declaration" => {
                    definition(ChunkType::Class, body)
                }
                "interface_declaration" => definition(ChunkType::Interface, None),
                "enum_declaration" => definition(ChunkType::Enum, None),
                "internal_module" | "module" => definition(ChunkType::Module, body),
                _ => Role::Other,
            }
        }
        Language::Go => match node.kind() {
            "function_declaration" => definition(ChunkType::Function, None),
            "method_declaration" => definition(ChunkType::Method, None),
            "type_declaration" => {
                let mut cursor = node.walk();
                let specs: Vec<Node<'t>> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "type_spec")
                    .collect();
                match specs.as_slice() {
                    [type_spec] => match go_type_kind(*type_spec) {
                        Some(kind) => Role::Definition {
                            kind,
                            name: type_spec.child_by_field_name("name"),
                            body: None,
                        },
                        None => Role::Other,
                    },
                    _ => Role::Other,
                }
            }
            "type_spec" => match go_type_kind(node) {
                Some(kind) => definition(kind, None),
                None => Role::Other,
            },
            _ => Role::Other,
        },
    }
}

fn go_type_kind(type_spec: Node) -> Option<ChunkType> {
    match type_spec.child_by_field_name("type")?.kind() {
        "struct_type" => Some(ChunkType::Struct),
        "interface_type" => Some(ChunkType::Interface),
        _ => None,
    }
}

struct Walker<'s> {
    source: &'s str,
    language: Language,
    scope: Vec<String>,
    out: Vec<Definition>,
}

impl<'s> Walker<'s> {
    fn node_text(&self, node: Node) -> &'s str {
        &self.source[node.start_byte()..node.end_byte()]
    }

    fn breadcrumb(&self, name: Option<&str>) -> Option<String> {
        let mut parts: Vec<&str> = self.scope.iter().map(String::as_str).collect();
        parts.extend(name);
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("::"))
        }
    }

    fn visit(&mut self, node: Node, in_type: bool, depth: usize) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();

        for child in children {
            match classify(self.language, child, in_type) {
                Role::Definition { kind, name, body } => {
                    let name = name.map(|n| self.node_text(n).to_string());
                    let start = child.start_byte();
                    let definition = Definition {
                        kind,
                        breadcrumb: self.breadcrumb(name.as_deref()),
                        start_byte: start,
                        end_byte: child.end_byte(),
                        doc_start_byte: leading_comment_start(self.source, start),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        depth,
                        name: name.clone(),
                    };
                    self.out.push(definition);

                    if let Some(body) = body {
                        let opens_type = kind != ChunkType::Module;
                        self.scope.push(name.unwrap_or_else(|| "_".to_string()));
                        self.visit(body, opens_type, depth + 1);
                        self.scope.pop();
                    }
                }
                Role::Scope { name, body } => {
                    let name = name.map(|n| self.node_text(n).to_string());
                    self.scope.push(name.unwrap_or_else(|| "_".to_string()));
                    self.visit(body.unwrap_or(child), true, depth);
                    self.scope.pop();
                }
                Role::Other => self.visit(child, in_type, depth),
            }
        }
    }
}

/// Extract definitions in source order
pub fn extract_definitions(source: &str, language: Language) -> Result<Vec<Definition>> {
    let tree = language.parse(source)?;
    let mut walker = Walker {
        source,
        language,
        scope: Vec::new(),
        out: Vec::new(),
    };
    walker.visit(tree.root_node(), false, 0);
    Ok(walker.out)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//")
        || line.starts_with('#')
        || line.starts_with("/*")
        || line.starts_with('*')
        || line.starts_with("--")
}

/// Byte offset where the contiguous comment block above `start` begins
fn leading_comment_start(source: &str, start: usize) -> usize {
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if !source[line_start..start].trim().is_empty() {
        return start;
    }

    let mut doc_start = line_start;
    let mut cursor = line_start;
    while cursor > 0 {
        let prev_start = source[..cursor - 1].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = source[prev_start..cursor - 1].trim();
        if line.is_empty() || !is_comment_line(line) {
            break;
        }
        doc_start = prev_start;
        cursor = prev_start;
    }

    if doc_start == line_start {
        start
    } else {
        doc_start
    }
}
