//! Parsing of make-style dependency info emitted by C compilers.
//!
//! The probe command passes `-MT 'x '` so the emitted rule always reads
//! `x : header...`; everything after the stand-in target is a header path.

use crate::error::BuildError;

/// Splits dep-file text into tokens.  Space, tab, and newline separate
/// tokens; `$$` decodes to `$`; a backslash before a newline is a line
/// continuation (both characters are discarded); a backslash before any
/// other character escapes it, which is how compilers spell spaces inside
/// paths.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                if !token.is_empty() {
                    tokens.push(std::mem::take(&mut token));
                }
            }
            '$' if chars.peek() == Some(&'$') => {
                chars.next();
                token.push('$');
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(escaped) => token.push(escaped),
                None => token.push('\\'),
            },
            c => token.push(c),
        }
    }
    if !token.is_empty() {
        tokens.push(token);
    }
    tokens
}

/// Parses the probe output at `path` into the list of discovered
/// dependencies: asserts the `x :` stand-in prefix, sorts the remaining
/// paths lexically, and drops those already listed in `known`.
pub fn parse(path: &str, text: &str, known: &[String]) -> Result<Vec<String>, BuildError> {
    let mut tokens = tokenize(text);
    if tokens.len() < 2 || tokens[0] != "x" || tokens[1] != ":" {
        return Err(BuildError::new(format!(
            "dependency file {} does not start with 'x :'",
            path
        )));
    }
    let mut deps = tokens.split_off(2);
    deps.sort();
    deps.retain(|dep| !known.iter().any(|k| k == dep));
    Ok(deps)
}
