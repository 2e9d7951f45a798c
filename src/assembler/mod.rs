//! Snippet assembly for sandboxed execution.
//!
//! Turns a candidate payload into a self-contained `solution.py`. The
//! payload is either a bare function body, which gets wrapped under a
//! function header, or a full module, which is passed through untouched
//! apart from a compatibility header and import preamble.
//!
//! Assembly never fails. A body that is not valid Python still produces a
//! program; the sandbox reports the resulting error as transcript data.
//!
//! # Example
//!
//! ```
//! use fix_forge::assembler::assemble;
//!
//! let program = assemble("return a + b", None, Some("add(a, b)"), None);
//! assert!(program.ends_with("def add(a, b):\n    return a + b\n"));
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::{dedent, strip_newlines};

/// First line of every assembled program.
pub const COMPAT_HEADER: &str = "from __future__ import annotations";

/// Import appended when typing names are used without a typing import.
pub const TYPING_IMPORT: &str = "from typing import *";

/// Function name used when neither a signature nor an entry point is known.
pub const DEFAULT_FUNCTION_NAME: &str = "main_func";

/// Indentation applied to each line of a wrapped body.
const BODY_INDENT: &str = "    ";

static TOP_LEVEL_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(def|class|import|from)\b").expect("top-level declaration regex is valid")
});

static TYPING_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(List|Tuple|Dict|Set|Optional)\b").expect("typing names regex is valid")
});

/// Returns true when `code` opens with a module-level `def`, `class`,
/// `import` or `from` statement, i.e. it is a full module rather than a body.
pub fn is_full_module(code: &str) -> bool {
    TOP_LEVEL_DECL.is_match(code)
}

/// Builds an executable program from a candidate payload and task metadata.
///
/// * `body` - bare function body or full module text
/// * `imports` - optional import preamble placed before the function header
/// * `signature` - optional header such as `add(a, b)` or `def add(a, b):`
/// * `entry_point` - function name used to synthesize a variadic header when
///   no signature is known
pub fn assemble(
    body: &str,
    imports: Option<&str>,
    signature: Option<&str>,
    entry_point: Option<&str>,
) -> String {
    let dedented = dedent(body);
    let body = strip_newlines(&dedented);
    let imports = dedent(non_blank(imports).unwrap_or("")).trim().to_string();

    if is_full_module(body) {
        let imports = with_typing_import(imports, body);
        return if imports.is_empty() {
            format!("{COMPAT_HEADER}\n{body}")
        } else {
            format!("{COMPAT_HEADER}\n\n{imports}\n{body}")
        };
    }

    let header = function_header(signature, entry_point);
    let typing_scope = format!("{imports}{header}{body}");
    let imports = with_typing_import(imports, &typing_scope);

    let mut parts = vec![COMPAT_HEADER.to_string()];
    if !imports.is_empty() {
        parts.push(imports);
    }
    parts.push(header);
    parts.push(indent_body(body));
    parts.join("\n")
}

/// Normalizes the function header to `def <...>:`.
fn function_header(signature: Option<&str>, entry_point: Option<&str>) -> String {
    let raw = match (non_blank(signature), non_blank(entry_point)) {
        (Some(sig), _) => sig.trim().to_string(),
        (None, Some(name)) => format!("{}(*args, **kwargs):", name.trim()),
        (None, None) => format!("{DEFAULT_FUNCTION_NAME}(*args, **kwargs):"),
    };

    let mut header = if raw.starts_with("def ") {
        raw
    } else {
        format!("def {raw}")
    };
    if !header.ends_with(':') {
        header.push(':');
    }
    header
}

/// Indents every non-blank line by one level; blank lines stay empty.
fn indent_body(body: &str) -> String {
    let mut out = String::new();
    for line in body.lines() {
        if !line.trim().is_empty() {
            out.push_str(BODY_INDENT);
            out.push_str(line);
        }
        out.push('\n');
    }
    if out.is_empty() {
        out.push('\n');
    }
    out
}

fn with_typing_import(imports: String, scope: &str) -> String {
    if !TYPING_NAMES.is_match(scope) || imports.contains("from typing import") {
        return imports;
    }
    if imports.is_empty() {
        TYPING_IMPORT.to_string()
    } else {
        format!("{imports}\n{TYPING_IMPORT}")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
