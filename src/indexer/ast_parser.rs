use anyhow::{Context, Result};
use tree_sitter::{Language, Parser, Query, QueryCursor, StreamingIterator};

/// Span of a captured declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSpan {
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 0-based row, as reported by tree-sitter
    pub start_row: usize,
    /// 0-based row, inclusive
    pub end_row: usize,
}

/// A loaded grammar together with the declaration kinds worth capturing
struct Grammar {
    language: Language,
    name: &'static str,
    kinds: &'static [&'static str],
}

fn grammar_for_extension(extension: &str) -> Option<Grammar> {
    let (language, name, kinds): (Language, &'static str, &'static [&'static str]) =
        match extension.to_lowercase().as_str() {
            "rs" => (
                tree_sitter_rust::LANGUAGE.into(),
                "Rust",
                &[
                    "function_item",
                    "impl_item",
                    "trait_item",
                    "struct_item",
                    "enum_item",
                ],
            ),
            "py" => (
                tree_sitter_python::LANGUAGE.into(),
                "Python",
                &[
                    "function_definition",
                    "class_definition",
                    "decorated_definition",
                ],
            ),
            "js" | "mjs" | "cjs" | "jsx" => (
                tree_sitter_javascript::LANGUAGE.into(),
                "JavaScript",
                &[
                    "function_declaration",
                    "generator_function_declaration",
                    "class_declaration",
                    "method_definition",
                    "arrow_function",
                ],
            ),
            "ts" => (
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                "TypeScript",
                TYPESCRIPT_KINDS,
            ),
            "tsx" => (
                tree_sitter_typescript::LANGUAGE_TSX.into(),
                "TypeScript",
                TYPESCRIPT_KINDS,
            ),
            "go" => (
                tree_sitter_go::LANGUAGE.into(),
                "Go",
                &[
                    "function_declaration",
                    "method_declaration",
                    "type_declaration",
                ],
            ),
            "java" => (
                tree_sitter_java::LANGUAGE.into(),
                "Java",
                &[
                    "class_declaration",
                    "interface_declaration",
                    "enum_declaration",
                    "method_declaration",
                    "constructor_declaration",
                ],
            ),
            "c" | "h" => (
                tree_sitter_c::LANGUAGE.into(),
                "C",
                &["function_definition", "struct_specifier", "enum_specifier"],
            ),
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => (
                tree_sitter_cpp::LANGUAGE.into(),
                "C++",
                &[
                    "function_definition",
                    "class_specifier",
                    "struct_specifier",
                    "namespace_definition",
                ],
            ),
            _ => return None,
        };

    Some(Grammar {
        language,
        name,
        kinds,
    })
}

const TYPESCRIPT_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "method_definition",
    "arrow_function",
];

/// Structural parser: runs a declaration query over a single grammar
pub struct AstParser {
    parser: Parser,
    query: Query,
    language_name: &'static str,
}

impl AstParser {
    /// Create a parser for the given file extension
    pub fn new(extension: &str) -> Result<Self> {
        let grammar = grammar_for_extension(extension)
            .with_context(|| format!("Unsupported language for AST parsing: {}", extension))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar.language)
            .context("Failed to set parser language")?;

        // Kinds unknown to this grammar version would make the whole query fail to compile
        let alternatives: Vec<String> = grammar
            .kinds
            .iter()
            .filter(|kind| grammar.language.id_for_node_kind(kind, true) != 0)
            .map(|kind| format!("({})", kind))
            .collect();
        if alternatives.is_empty() {
            anyhow::bail!("No declaration kinds available for {}", grammar.name);
        }
        let source = format!("[{}] @declaration", alternatives.join(" "));
        let query = Query::new(&grammar.language, &source)
            .with_context(|| format!("Failed to compile declaration query for {}", grammar.name))?;

        Ok(Self {
            parser,
            query,
            language_name: grammar.name,
        })
    }

    /// Parse source code and capture declarations, ordered by position (outermost first)
    ///
    /// Sources with syntax errors are rejected so the caller can fall back for the whole file.
    pub fn declarations(&mut self, source_code: &str) -> Result<Vec<DeclarationSpan>> {
        let tree = self
            .parser
            .parse(source_code, None)
            .context("Failed to parse source code")?;

        let root = tree.root_node();
        if root.has_error() {
            anyhow::bail!("{} source contains syntax errors", self.language_name);
        }

        let mut spans = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, root, source_code.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                spans.push(DeclarationSpan {
                    kind: node.kind().to_string(),
                    start_byte: node.start_byte(),
                    end_byte: node.end_byte(),
                    start_row: node.start_position().row,
                    end_row: node.end_position().row,
                });
            }
        }

        spans.sort_by(|a, b| {
            a.start_byte
                .cmp(&b.start_byte)
                .then(b.end_byte.cmp(&a.end_byte))
        });
        spans.dedup_by(|a, b| a.start_byte == b.start_byte && a.end_byte == b.end_byte);
        Ok(spans)
    }

    /// Get the language name
    pub fn language_name(&self) -> &str {
        self.language_name
    }
}
