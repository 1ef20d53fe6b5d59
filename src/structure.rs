use std::path::Path;
use tree_sitter::{Language, Node, Parser};

/// Names pulled out of a source file's syntax tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StructuralSummary {
    pub imports: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
}

impl StructuralSummary {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.functions.is_empty() && self.classes.is_empty()
    }

    /// Three labelled lines, appended to the text that gets embedded.
    pub fn render(&self) -> String {
        format!(
            "Imports: {}\nFunctions: {}\nClasses: {}",
            self.imports.join(", "),
            self.functions.join(", "),
            self.classes.join(", ")
        )
    }
}

#[derive(Default)]
pub struct StructureExtractor {}

impl StructureExtractor {
    pub fn new() -> Self {
        Self {}
    }

    pub fn get_language(extension: &str) -> Option<Language> {
        match extension {
            "py" => Some(tree_sitter_python::LANGUAGE.into()),
            "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
            "go" => Some(tree_sitter_go::LANGUAGE.into()),
            "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
            "ts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            "java" => Some(tree_sitter_java::LANGUAGE.into()),
            "c" | "h" => Some(tree_sitter_c::LANGUAGE.into()),
            "cpp" | "hpp" | "cc" | "cxx" => Some(tree_sitter_cpp::LANGUAGE.into()),
            "cs" => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            "rb" => Some(tree_sitter_ruby::LANGUAGE.into()),
            "php" => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            "sh" | "bash" => Some(tree_sitter_bash::LANGUAGE.into()),
            _ => None,
        }
    }

    /// `None` when the extension has no grammar or the parse fails.
    pub fn summarize(&self, path: &Path, code: &str) -> Option<StructuralSummary> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let language = Self::get_language(ext)?;

        let mut parser = Parser::new();
        if parser.set_language(&language).is_err() {
            tracing::warn!("Could not set tree-sitter language for extension: {}", ext);
            return None;
        }
        let tree = parser.parse(code, None)?;

        let mut summary = StructuralSummary::default();
        self.traverse(tree.root_node(), code, &mut summary);

        dedup_in_order(&mut summary.imports);
        dedup_in_order(&mut summary.functions);
        dedup_in_order(&mut summary.classes);
        Some(summary)
    }

    /// Pre-order walk with a cursor; stack use stays flat however deep the tree nests.
    fn traverse(&self, root: Node, code: &str, summary: &mut StructuralSummary) {
        let mut cursor = root.walk();
        loop {
            self.visit(&cursor.node(), code, summary);
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    fn visit(&self, node: &Node, code: &str, summary: &mut StructuralSummary) {
        match node.kind() {
            // Python
            "import_statement" if node.child_by_field_name("source").is_none() => {
                let mut cursor = node.walk();
                for child in node.children_by_field_name("name", &mut cursor) {
                    let target = child.child_by_field_name("name").unwrap_or(child);
                    summary.imports.push(text_of(&target, code));
                }
            }
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    summary.imports.push(text_of(&module, code));
                }
            }
            // JS / TS: import x from "source"
            "import_statement" => {
                if let Some(source) = node.child_by_field_name("source") {
                    summary.imports.push(strip_quotes(&text_of(&source, code)));
                }
            }
            // Rust
            "use_declaration" => {
                if let Some(arg) = node.child_by_field_name("argument") {
                    summary.imports.push(text_of(&arg, code));
                }
            }
            // Go
            "import_spec" => {
                if let Some(path) = node.child_by_field_name("path") {
                    summary.imports.push(strip_quotes(&text_of(&path, code)));
                }
            }
            // Java / C# / PHP
            "import_declaration" | "using_directive" | "namespace_use_declaration" => {
                summary.imports.push(import_line(node, code));
            }
            // C / C++
            "preproc_include" => {
                if let Some(path) = node.child_by_field_name("path") {
                    summary.imports.push(strip_include(&text_of(&path, code)));
                }
            }

            "function_definition" | "function_item" | "function_declaration"
            | "method_declaration" | "method_definition" | "method" | "singleton_method"
            | "generator_function_declaration" | "constructor_declaration" => {
                if let Some(name) = function_name(node, code) {
                    summary.functions.push(name);
                }
            }

            "class_definition" | "class_declaration" | "class_specifier" | "struct_item"
            | "enum_item" | "trait_item" | "struct_specifier" | "interface_declaration"
            | "type_spec" | "class" | "module" | "record_declaration" | "enum_declaration"
            | "struct_declaration" | "trait_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    summary.classes.push(text_of(&name, code));
                }
            }
            _ => {}
        }
    }
}

fn text_of(node: &Node, code: &str) -> String {
    code[node.start_byte()..node.end_byte()].trim().to_string()
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn strip_include(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string()
}

fn import_line(node: &Node, code: &str) -> String {
    let raw = text_of(node, code);
    raw.trim_end_matches(';')
        .split_whitespace()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ")
}

/// C-family definitions keep the name inside nested declarators.
fn function_name(node: &Node, code: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(text_of(&name, code));
    }
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "operator_name" => return Some(text_of(&current, code)),
            _ => current = current.child_by_field_name("declarator")?,
        }
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| !item.is_empty() && seen.insert(item.clone()));
}
