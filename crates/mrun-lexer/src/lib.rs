//! Lexical analysis for recipe command lines
//!
//! Splits an expanded recipe line into words, quoted strings, and the shell
//! operators that decide whether the line needs a shell, using logos.

use logos::Logos;
use mrun_ast::Span;

/// Command line tokens
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token {
    /// Unquoted word; backslash escapes any following character
    #[regex(r#"([^\s"'|&;<>()`\\]|\\[^\n])+"#)]
    Word,

    /// Double-quoted string with backslash escapes
    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleQuoted,

    /// Single-quoted string, taken literally
    #[regex(r"'[^']*'")]
    SingleQuoted,

    /// Logical AND operator (&&)
    #[token("&&")]
    AndIf,

    /// Logical OR operator (||)
    #[token("||")]
    OrIf,

    /// Pipe operator (|)
    #[token("|")]
    Pipe,

    /// Semicolon separator (;)
    #[token(";")]
    Semicolon,

    /// Background operator (&)
    #[token("&")]
    Ampersand,

    /// Input redirection (<)
    #[token("<")]
    Less,

    /// Output redirection (>)
    #[token(">")]
    Great,

    /// Append redirection (>>)
    #[token(">>")]
    Dgreat,

    /// Left parenthesis (()
    #[token("(")]
    Lparen,

    /// Right parenthesis ())
    #[token(")")]
    Rparen,

    /// Command substitution (`)
    #[token("`")]
    Backtick,

    /// Whitespace (ignored)
    #[regex(r"[ \t\f\r\n]+", logos::skip)]
    Whitespace,

    /// End of input
    Eof,

    /// Lexer error
    Error,
}

impl Token {
    /// Tokens that only a shell can interpret
    #[must_use]
    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Self::AndIf
                | Self::OrIf
                | Self::Pipe
                | Self::Semicolon
                | Self::Ampersand
                | Self::Less
                | Self::Great
                | Self::Dgreat
                | Self::Lparen
                | Self::Rparen
                | Self::Backtick
        )
    }

    /// Tokens that contribute text to an argument
    #[must_use]
    pub const fn is_word_part(self) -> bool {
        matches!(self, Self::Word | Self::DoubleQuoted | Self::SingleQuoted)
    }
}

/// Token with location information
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    pub text: String,
}

/// Lexer that produces tokens with spans
pub struct Lexer<'input> {
    lexer: logos::Lexer<'input, Token>,
    input: &'input str,
}

impl<'input> Lexer<'input> {
    #[must_use]
    pub fn new(input: &'input str) -> Self {
        Self {
            lexer: Token::lexer(input),
            input,
        }
    }

    /// Get the next token with span information
    pub fn next_token(&mut self) -> SpannedToken {
        match self.lexer.next() {
            Some(Ok(token)) => {
                let span = self.lexer.span();
                let text = self.input[span.clone()].to_string();
                SpannedToken {
                    token,
                    span: Span::new(span.start, span.end),
                    text,
                }
            }
            Some(Err(())) => {
                let span = self.lexer.span();
                let text = self.input[span.clone()].to_string();
                SpannedToken {
                    token: Token::Error,
                    span: Span::new(span.start, span.end),
                    text,
                }
            }
            None => SpannedToken {
                token: Token::Eof,
                span: Span::new(self.input.len(), self.input.len()),
                text: String::new(),
            },
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Vec<SpannedToken> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.token == Token::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
