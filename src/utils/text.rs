//! Whitespace normalization and truncation for code snippets and logs.

/// Default character budget for transcripts and candidates echoed to the console.
pub const DEFAULT_TRUNCATE_CHARS: usize = 1200;

/// Removes the longest leading whitespace prefix shared by every non-blank line.
///
/// Whitespace-only lines are normalized to empty lines and do not take part
/// in computing the common prefix. Line structure (including a trailing
/// newline) is otherwise preserved.
///
/// # Example
///
/// ```
/// use fix_forge::utils::dedent;
///
/// assert_eq!(dedent("    a\n      b\n"), "a\n  b\n");
/// ```
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;

    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let indent = &line[..indent_len];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }

    let margin = margin.unwrap_or("");
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

/// Trims leading and trailing newline characters only, leaving indentation intact.
pub fn strip_newlines(text: &str) -> &str {
    text.trim_matches('\n')
}

/// Truncates `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((end, _)) => format!("{}...[truncated]", &text[..end]),
    }
}
