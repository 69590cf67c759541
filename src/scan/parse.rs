//! Templ source parsing.
//!
//! Extracts the declared package, imports, `templ Name(params)`
//! component declarations and `@Component` references. This is a
//! line-oriented scan, not a full grammar: it recovers everything the
//! registry needs and reports structural problems as [`ParsedError`]s
//! with real line/column positions.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::component::{ComponentInfo, Parameter, validate_name};
use crate::errors::{ParsedError, Severity};

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*import\s+(?:[A-Za-z_][A-Za-z0-9_]*\s+)?"([^"]+)""#).unwrap());

static IMPORT_BLOCK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:[A-Za-z_][A-Za-z0-9_]*\s+)?"([^"]+)""#).unwrap());

static TEMPL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*templ\s+([A-Za-z0-9_.]+)\s*\(").unwrap());

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
});

/// Result of parsing one source file.
#[derive(Debug, Default)]
pub struct ParsedSource {
    pub package: String,
    pub imports: FxHashSet<String>,
    pub components: Vec<ParsedComponent>,
    pub errors: Vec<ParsedError>,
}

/// One `templ` declaration.
#[derive(Debug)]
pub struct ParsedComponent {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub dependencies: FxHashSet<String>,
    pub line: u32,
}

impl ParsedSource {
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Error)
    }
}

/// Parse templ source text.
pub fn parse_source(file: &Path, content: &str) -> ParsedSource {
    let mut out = ParsedSource::default();
    let mut in_import_block = false;
    let mut seen_names: FxHashSet<String> = FxHashSet::default();

    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let trimmed = line.trim();

        if in_import_block {
            if trimmed.starts_with(')') {
                in_import_block = false;
            } else if let Some(cap) = IMPORT_BLOCK_LINE_RE.captures(trimmed) {
                out.imports.insert(cap[1].to_string());
            }
            continue;
        }

        if let Some(cap) = PACKAGE_RE.captures(line) {
            out.package = cap[1].to_string();
            continue;
        }

        if trimmed.starts_with("import (") || trimmed == "import(" {
            in_import_block = true;
            continue;
        }

        if let Some(cap) = IMPORT_RE.captures(line) {
            out.imports.insert(cap[1].to_string());
            continue;
        }

        if let Some(cap) = TEMPL_RE.captures(line) {
            let name = cap[1].to_string();
            let col = (line.find("templ").unwrap_or(0) + 1) as u32;

            if !validate_name(&name) {
                out.errors.push(
                    ParsedError::new(file, line_no, col, format!("invalid component name `{name}`"))
                        .with_rule("component-name"),
                );
                continue;
            }
            if !seen_names.insert(name.clone()) {
                out.errors.push(
                    ParsedError::new(
                        file,
                        line_no,
                        col,
                        format!("duplicate component `{name}` in this file"),
                    )
                    .with_rule("duplicate-component"),
                );
                continue;
            }

            let open = line.find('(').map(|i| i + 1).unwrap_or(line.len());
            match collect_signature(content, idx, open) {
                Ok(signature) => match parse_parameters(&signature) {
                    Ok(parameters) => out.components.push(ParsedComponent {
                        name,
                        parameters,
                        dependencies: FxHashSet::default(),
                        line: line_no,
                    }),
                    Err(message) => {
                        out.errors.push(
                            ParsedError::new(file, line_no, open as u32, message)
                                .with_rule("parameter-list"),
                        );
                    }
                },
                Err(message) => {
                    out.errors.push(
                        ParsedError::new(file, line_no, open as u32, message)
                            .with_rule("parameter-list"),
                    );
                }
            }
        }
    }

    if out.package.is_empty() && !out.components.is_empty() {
        out.errors.push(
            ParsedError::new(file, 1, 1, "missing package declaration")
                .with_severity(Severity::Warning)
                .with_rule("package-decl"),
        );
    }

    attach_dependencies(content, &mut out);
    out
}

/// Gather the parameter list text, spanning lines until the paren closes.
fn collect_signature(content: &str, start_line: usize, start_col: usize) -> Result<String, String> {
    let mut depth = 1usize;
    let mut signature = String::new();

    for (idx, line) in content.lines().enumerate().skip(start_line) {
        let slice = if idx == start_line {
            line.get(start_col..).unwrap_or("")
        } else {
            line
        };
        for c in slice.chars() {
            match c {
                '(' => {
                    depth += 1;
                    signature.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(signature);
                    }
                    signature.push(c);
                }
                _ => signature.push(c),
            }
        }
        signature.push(' ');
    }

    Err("unclosed parameter list".to_string())
}

/// Parse a comma separated parameter list.
///
/// Supports go-style grouped names (`a, b string`) and trailing
/// defaults (`variant string = "primary"`).
fn parse_parameters(signature: &str) -> Result<Vec<Parameter>, String> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Ok(Vec::new());
    }

    let mut parameters = Vec::new();
    let mut untyped: Vec<String> = Vec::new();

    for segment in split_top_level(signature) {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err("empty parameter".to_string());
        }

        let (decl, default) = match segment.split_once('=') {
            Some((decl, default)) => (decl.trim(), Some(default.trim().to_string())),
            None => (segment, None),
        };

        let mut tokens = decl.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_string();
        if !validate_name(&name) {
            return Err(format!("invalid parameter name `{name}`"));
        }
        let type_name: String = tokens.collect::<Vec<_>>().join(" ");

        if type_name.is_empty() {
            if default.is_some() {
                return Err(format!("parameter `{name}` has a default but no type"));
            }
            // Grouped name: the type arrives with a later segment.
            untyped.push(name);
            continue;
        }

        for pending in untyped.drain(..) {
            parameters.push(Parameter::required(pending, type_name.clone()));
        }

        let mut parameter = Parameter::required(name, type_name);
        if let Some(default) = default {
            parameter = parameter.with_default(default);
        }
        parameters.push(parameter);
    }

    if let Some(name) = untyped.first() {
        return Err(format!("parameter `{name}` is missing a type"));
    }

    Ok(parameters)
}

/// Split on commas outside brackets, parens and string literals.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' | '[' | '{' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' if !in_string => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 && !in_string => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Attribute `@Component(...)` references to the declaration whose body
/// contains them.
fn attach_dependencies(content: &str, out: &mut ParsedSource) {
    if out.components.is_empty() {
        return;
    }

    // Component spans: from each declaration line to the next one.
    let mut spans: Vec<(usize, u32)> = out
        .components
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.line))
        .collect();
    spans.sort_by_key(|(_, line)| *line);

    for (line_idx, line) in content.lines().enumerate() {
        let line_no = (line_idx + 1) as u32;
        for cap in REFERENCE_RE.captures_iter(line) {
            let reference = cap[1].to_string();
            // Owner = last declaration at or before this line.
            let owner = spans
                .iter()
                .rev()
                .find(|(_, decl_line)| *decl_line <= line_no)
                .map(|(i, _)| *i);
            if let Some(owner) = owner {
                if out.components[owner].name != reference {
                    out.components[owner].dependencies.insert(reference);
                }
            }
        }
    }
}

/// Build [`ComponentInfo`]s from a parsed source file.
pub fn to_component_infos(
    parsed: &ParsedSource,
    file: &Path,
    content_hash: &str,
    last_modified: std::time::SystemTime,
) -> Vec<ComponentInfo> {
    parsed
        .components
        .iter()
        .map(|c| {
            let mut info = ComponentInfo::new(c.name.clone(), file);
            info.package = parsed.package.clone();
            info.parameters = c.parameters.clone();
            info.imports = parsed.imports.clone();
            info.dependencies = c.dependencies.clone();
            info.last_modified = last_modified;
            info.content_hash = content_hash.to_string();
            info
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParsedSource {
        parse_source(Path::new("/proj/components/test.templ"), content)
    }

    const BUTTON: &str = r#"package components

import "fmt"

templ Button(text string) {
	<button>{ text }</button>
}
"#;

    #[test]
    fn test_parse_simple_component() {
        let parsed = parse(BUTTON);
        assert_eq!(parsed.package, "components");
        assert!(parsed.imports.contains("fmt"));
        assert_eq!(parsed.components.len(), 1);

        let button = &parsed.components[0];
        assert_eq!(button.name, "Button");
        assert_eq!(button.parameters.len(), 1);
        assert_eq!(button.parameters[0].name, "text");
        assert_eq!(button.parameters[0].type_name, "string");
        assert!(!parsed.has_errors());
    }

    #[test]
    fn test_parse_import_block() {
        let parsed = parse(
            "package ui\n\nimport (\n\t\"fmt\"\n\t\"strings\"\n)\n\ntempl X() {}\n",
        );
        assert!(parsed.imports.contains("fmt"));
        assert!(parsed.imports.contains("strings"));
    }

    #[test]
    fn test_parse_grouped_parameters() {
        let parsed = parse("package ui\ntempl Row(a, b string, n int) {}\n");
        let params = &parsed.components[0].parameters;
        assert_eq!(params.len(), 3);
        assert_eq!((params[0].name.as_str(), params[0].type_name.as_str()), ("a", "string"));
        assert_eq!((params[1].name.as_str(), params[1].type_name.as_str()), ("b", "string"));
        assert_eq!((params[2].name.as_str(), params[2].type_name.as_str()), ("n", "int"));
    }

    #[test]
    fn test_parse_default_parameter() {
        let parsed = parse("package ui\ntempl Button(text string, variant string = \"primary\") {}\n");
        let params = &parsed.components[0].parameters;
        assert!(params[1].optional);
        assert_eq!(params[1].default.as_deref(), Some("\"primary\""));
        assert!(!params[0].optional);
    }

    #[test]
    fn test_parse_multiline_signature() {
        let parsed = parse(
            "package ui\ntempl Card(\n\ttitle string,\n\tbody string,\n) {}\n",
        );
        assert_eq!(parsed.components[0].parameters.len(), 2);
    }

    #[test]
    fn test_parse_complex_types() {
        let parsed = parse("package ui\ntempl List(items []string, attrs map[string]string) {}\n");
        let params = &parsed.components[0].parameters;
        assert_eq!(params[0].type_name, "[]string");
        assert_eq!(params[1].type_name, "map[string]string");
    }

    #[test]
    fn test_references_become_dependencies() {
        let parsed = parse(
            "package ui\n\ntempl Page(title string) {\n\t@Nav(title)\n\t@widgets.Footer()\n}\n\ntempl Nav(t string) {}\n",
        );
        let page = &parsed.components[0];
        assert!(page.dependencies.contains("Nav"));
        assert!(page.dependencies.contains("Footer"));
        // Self references are not edges.
        assert!(!page.dependencies.contains("Page"));
    }

    #[test]
    fn test_reference_attributed_to_enclosing_component() {
        let parsed = parse(
            "package ui\ntempl A() {\n\t@Shared()\n}\ntempl B() {\n\t@Other()\n}\n",
        );
        assert!(parsed.components[0].dependencies.contains("Shared"));
        assert!(!parsed.components[0].dependencies.contains("Other"));
        assert!(parsed.components[1].dependencies.contains("Other"));
    }

    #[test]
    fn test_duplicate_component_reported() {
        let parsed = parse("package ui\ntempl X() {}\ntempl X() {}\n");
        assert_eq!(parsed.components.len(), 1);
        assert!(parsed.has_errors());
        assert!(parsed.errors[0].message.contains("duplicate"));
        assert_eq!(parsed.errors[0].line, 3);
    }

    #[test]
    fn test_unclosed_parameter_list_reported() {
        let parsed = parse("package ui\ntempl Broken(text string {\n}\n");
        assert!(parsed.has_errors());
        assert!(parsed.errors[0].message.contains("unclosed") || parsed.errors[0].message.contains("invalid"));
    }

    #[test]
    fn test_missing_type_reported() {
        let parsed = parse("package ui\ntempl Bad(text) {}\n");
        assert!(parsed.has_errors());
        assert!(parsed.errors[0].message.contains("missing a type"));
    }

    #[test]
    fn test_missing_package_is_warning_only() {
        let parsed = parse("templ X() {}\n");
        assert!(!parsed.has_errors());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].severity, Severity::Warning);
    }

    #[test]
    fn test_to_component_infos_carries_metadata() {
        let parsed = parse(BUTTON);
        let now = std::time::SystemTime::now();
        let infos = to_component_infos(&parsed, Path::new("/p/button.templ"), "abc123", now);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].content_hash, "abc123");
        assert_eq!(infos[0].package, "components");
        assert_eq!(infos[0].last_modified, now);
    }
}
