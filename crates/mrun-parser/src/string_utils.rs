//! String processing utilities for the Runfile parser
//!
//! Quote removal, escape handling, comment stripping, and name validation
//! shared by the Runfile parser and the command-line splitter.

/// Remove quotes from a quoted token while preserving the content
///
/// Single quotes are literal; inside double quotes a backslash only escapes
/// `$`, `` ` ``, `"`, `\` and newline.
pub fn remove_quotes(text: &str) -> String {
    if text.len() < 2 {
        return text.to_string();
    }

    let inner = &text[1..text.len() - 1];
    if text.starts_with('\'') && text.ends_with('\'') {
        return inner.to_string();
    }
    if !(text.starts_with('"') && text.ends_with('"')) {
        return text.to_string();
    }

    let mut output = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&next @ ('$' | '`' | '"' | '\\' | '\n')) => {
                    output.push(next);
                    chars.next();
                }
                _ => output.push(ch),
            }
        } else {
            output.push(ch);
        }
    }
    output
}

/// Remove backslash escapes from an unquoted word
pub fn unescape_word(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                output.push(next);
            }
        } else {
            output.push(ch);
        }
    }
    output
}

/// Characters that give an unquoted word meaning only a shell understands
///
/// Globs, expansions, comments, brace groups, history and tilde syntax.
/// Operators and quotes are separate tokens and handled by the splitter.
pub const SHELL_METACHARS: &[char] = &['#', '*', '?', '[', ']', '{', '}', '$', '^', '~', '!'];

/// Whether an unquoted word contains an unescaped shell metacharacter
pub fn has_unescaped_metachar(text: &str) -> bool {
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            ch if SHELL_METACHARS.contains(&ch) => return true,
            _ => {}
        }
    }
    false
}

/// Whether a double-quoted token contains an unescaped `$` or `` ` ``
pub fn quoted_has_expansion(text: &str) -> bool {
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '$' | '`' => return true,
            _ => {}
        }
    }
    false
}

/// Cut a non-recipe line at its first unescaped `#`, unescaping `\#`
pub fn strip_comment(line: &str) -> String {
    let mut output = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'#') => {
                output.push('#');
                chars.next();
            }
            '#' => break,
            _ => output.push(ch),
        }
    }
    output
}

/// Parse an assignment word into name and value components
///
/// Returns None if the text doesn't contain a valid assignment pattern
pub fn parse_assignment(text: &str) -> Option<(String, String)> {
    let (name, value) = text.split_once('=')?;
    if is_valid_variable_name(name) {
        Some((name.to_string(), value.to_string()))
    } else {
        None
    }
}

/// Check if a string is a valid variable name
///
/// Variable names must start with letter or underscore, followed by
/// letters, digits, or underscores
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    // First character must be letter or underscore
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }

    // Remaining characters must be alphanumeric or underscore
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
