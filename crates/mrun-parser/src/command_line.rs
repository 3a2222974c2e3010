//! Splitting expanded recipe lines into invocations
//!
//! A line made only of words and quoted strings is spawned directly. Shell
//! operators or unescaped expansion characters hand the line to a shell
//! instead.

use mrun_lexer::{Lexer, Token};

use crate::string_utils::{
    has_unescaped_metachar, parse_assignment, quoted_has_expansion, remove_quotes, unescape_word,
};

/// Builtins and reserved words; a line starting with one runs in a shell
const SHELL_COMMANDS: &[&str] = &[
    ".", ":", "!", "{", "alias", "bg", "break", "case", "cd", "command", "continue", "eval",
    "exec", "exit", "export", "fc", "fg", "for", "getopts", "hash", "if", "jobs", "local",
    "login", "logout", "read", "readonly", "return", "select", "set", "shift", "source", "test",
    "times", "trap", "type", "ulimit", "umask", "unalias", "unset", "until", "wait", "while",
];

/// A tokenized recipe line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    /// Arguments with quotes and escapes removed; the first is the program
    pub words: Vec<String>,
    /// The line must be passed verbatim to a shell
    pub requires_shell: bool,
}

impl CommandLine {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Command line tokenization failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandLineError {
    #[error("unexpected character '{0}' (unterminated quote?)")]
    UnexpectedCharacter(String),
}

/// Split an expanded recipe line into words
///
/// # Errors
///
/// Returns `CommandLineError` on unterminated quotes or stray escapes
pub fn split_command(line: &str) -> Result<CommandLine, CommandLineError> {
    let mut command = CommandLine::default();
    let mut previous_end: Option<usize> = None;

    for token in Lexer::new(line).tokenize() {
        match token.token {
            Token::Eof => break,
            Token::Error => return Err(CommandLineError::UnexpectedCharacter(token.text)),
            kind if kind.is_operator() => {
                command.requires_shell = true;
                previous_end = None;
            }
            kind if kind.is_word_part() => {
                let piece = match kind {
                    Token::Word => {
                        if has_unescaped_metachar(&token.text) {
                            command.requires_shell = true;
                        }
                        unescape_word(&token.text)
                    }
                    Token::DoubleQuoted => {
                        if quoted_has_expansion(&token.text) {
                            command.requires_shell = true;
                        }
                        remove_quotes(&token.text)
                    }
                    _ => remove_quotes(&token.text),
                };

                let adjacent = previous_end == Some(token.span.start);
                match command.words.last_mut() {
                    Some(word) if adjacent => word.push_str(&piece),
                    _ => {
                        // FOO=1 cmd only means something to a shell
                        if command.words.is_empty()
                            && kind == Token::Word
                            && parse_assignment(&token.text).is_some()
                        {
                            command.requires_shell = true;
                        }
                        command.words.push(piece);
                    }
                }
                previous_end = Some(token.span.end);
            }
            _ => previous_end = None,
        }
    }

    // Quoting does not stop a shell from finding its builtins
    if command
        .words
        .first()
        .is_some_and(|program| SHELL_COMMANDS.contains(&program.as_str()))
    {
        command.requires_shell = true;
    }

    Ok(command)
}
