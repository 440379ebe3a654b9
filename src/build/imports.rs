// src/build/imports.rs

//! Lexing of import specifiers in generated JavaScript.
//!
//! This is a scanner, not a parser: it recognizes
//!
//! - `import x from "a"`, `import { x } from 'a'`, `import "a"`
//! - `export * from "a"`, `export { x } from "a"`
//! - `import("a")` with a plain string literal as first argument
//!
//! Template-literal and computed dynamic imports are left alone, as is
//! `import.meta`.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \b(?:import|export)\s*
            (?:[\w$*{}\s,]*?\bfrom\s*)?
            (?:"(?P<s1>[^"\n]+)"|'(?P<s2>[^'\n]+)')
        |
        \bimport\s*\(\s*
            (?:"(?P<d1>[^"\n]+)"|'(?P<d2>[^'\n]+)')
            \s*[,)]
        "#,
    )
    .expect("import regex must compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub specifier: String,
    /// Byte range of the specifier text, without quotes.
    pub range: Range<usize>,
    pub dynamic: bool,
}

/// Every import specifier in `code`, in source order.
pub fn parse_imports(code: &str) -> Vec<ImportSpecifier> {
    let masked = non_code_ranges(code);
    IMPORT_RE
        .captures_iter(code)
        .filter(|caps| caps.get(0).is_some_and(|m| !is_masked(code, &masked, m.start())))
        .filter_map(|caps| to_specifier(&caps))
        .collect()
}

fn to_specifier(caps: &Captures<'_>) -> Option<ImportSpecifier> {
    let (m, dynamic) = caps
        .name("s1")
        .or_else(|| caps.name("s2"))
        .map(|m| (m, false))
        .or_else(|| caps.name("d1").or_else(|| caps.name("d2")).map(|m| (m, true)))?;

    Some(ImportSpecifier {
        specifier: m.as_str().to_string(),
        range: m.range(),
        dynamic,
    })
}

/// Matches that are member accesses or start inside a string, template or
/// comment are not imports.
fn is_masked(code: &str, masked: &[Range<usize>], start: usize) -> bool {
    if code[..start].ends_with(['.', '$']) {
        return true;
    }
    let idx = masked.partition_point(|r| r.end <= start);
    masked.get(idx).is_some_and(|r| r.start <= start)
}

/// Byte ranges of string literals, template literals and comments, in order.
///
/// Regex literals are not recognized.
fn non_code_ranges(code: &str) -> Vec<Range<usize>> {
    let bytes = code.as_bytes();
    let len = bytes.len();
    let mut ranges = Vec::new();
    let mut i = 0;

    while i < len {
        let start = i;
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = code[i..].find('\n').map_or(len, |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = code[i + 2..].find("*/").map_or(len, |n| i + 2 + n + 2);
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < len {
                    match bytes[i] {
                        b'\\' => i += 2,
                        b if b == quote => {
                            i += 1;
                            break;
                        }
                        // Unterminated string literal.
                        b'\n' if quote != b'`' => break,
                        _ => i += 1,
                    }
                }
            }
            _ => {
                i += 1;
                continue;
            }
        }
        ranges.push(start..i.min(len));
    }

    ranges
}
