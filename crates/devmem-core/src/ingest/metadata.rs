//! Line-based regex metadata extraction, one family per language.
//!
//! Arrays are truncated per the external contract: functions ≤ 50,
//! classes ≤ 20, imports ≤ 50, exports ≤ 50.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{Language, Symbol};

const MAX_FUNCTIONS: usize = 50;
const MAX_CLASSES: usize = 20;
const MAX_IMPORTS: usize = 50;
const MAX_EXPORTS: usize = 50;

struct Patterns {
    ts_function: Regex,
    ts_arrow_const: Regex,
    ts_export: Regex,
    ts_class: Regex,
    ts_import: Regex,
    py_def: Regex,
    py_class: Regex,
    py_import: Regex,
    go_func: Regex,
    go_import: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    ts_function: Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
    ts_arrow_const: Regex::new(r"^\s*(?:export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s*)?\(").unwrap(),
    ts_export: Regex::new(r"^\s*export\s+(?:const|let|var|type|interface)\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
    ts_class: Regex::new(r"^\s*(?:export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
    ts_import: Regex::new(r#"^\s*import\s+.*\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
    py_def: Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
    py_class: Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
    py_import: Regex::new(r"^\s*from\s+([A-Za-z0-9_.]+)\s+import").unwrap(),
    go_func: Regex::new(r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
    go_import: Regex::new(r#"^\s*import\s+"([^"]+)""#).unwrap(),
});

#[derive(Debug, Default)]
pub struct ExtractedSymbols {
    pub functions: Vec<(String, usize)>,
    pub classes: Vec<(String, usize)>,
    pub imports: Vec<(String, usize)>,
    pub exports: Vec<(String, usize)>,
}

impl ExtractedSymbols {
    pub fn into_symbols(self, code_file_id: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let mut push = |name: String, kind: &str, line: usize| {
            symbols.push(Symbol {
                id: uuid::Uuid::new_v4().to_string(),
                code_file_id: code_file_id.to_string(),
                name,
                kind: kind.to_string(),
                signature: None,
                line_start: line as i64,
            });
        };
        for (name, line) in self.functions {
            push(name, "function", line);
        }
        for (name, line) in self.classes {
            push(name, "class", line);
        }
        for (name, line) in self.imports {
            push(name, "import", line);
        }
        for (name, line) in self.exports {
            push(name, "export", line);
        }
        symbols
    }
}

pub fn extract(language: Language, content: &str) -> ExtractedSymbols {
    let p = &*PATTERNS;
    let mut out = ExtractedSymbols::default();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        match language {
            Language::TypeScript | Language::JavaScript => {
                if out.functions.len() < MAX_FUNCTIONS {
                    if let Some(c) = p.ts_function.captures(line).or_else(|| p.ts_arrow_const.captures(line)) {
                        out.functions.push((c[1].to_string(), line_no));
                    }
                }
                if out.classes.len() < MAX_CLASSES {
                    if let Some(c) = p.ts_class.captures(line) {
                        out.classes.push((c[1].to_string(), line_no));
                    }
                }
                if out.exports.len() < MAX_EXPORTS {
                    if let Some(c) = p.ts_export.captures(line) {
                        out.exports.push((c[1].to_string(), line_no));
                    }
                }
                if out.imports.len() < MAX_IMPORTS {
                    if let Some(c) = p.ts_import.captures(line) {
                        out.imports.push((c[1].to_string(), line_no));
                    }
                }
            }
            Language::Python => {
                if out.functions.len() < MAX_FUNCTIONS {
                    if let Some(c) = p.py_def.captures(line) {
                        out.functions.push((c[1].to_string(), line_no));
                    }
                }
                if out.classes.len() < MAX_CLASSES {
                    if let Some(c) = p.py_class.captures(line) {
                        out.classes.push((c[1].to_string(), line_no));
                    }
                }
                if out.imports.len() < MAX_IMPORTS {
                    if let Some(c) = p.py_import.captures(line) {
                        out.imports.push((c[1].to_string(), line_no));
                    }
                }
            }
            Language::Go => {
                if out.functions.len() < MAX_FUNCTIONS {
                    if let Some(c) = p.go_func.captures(line) {
                        out.functions.push((c[1].to_string(), line_no));
                    }
                }
                if out.imports.len() < MAX_IMPORTS {
                    if let Some(c) = p.go_import.captures(line) {
                        out.imports.push((c[1].to_string(), line_no));
                    }
                }
            }
            _ => {
                // Best-effort only; other languages may yield empty arrays.
            }
        }
    }

    out
}
