//! Tokenizer: splits command input into commands, quoted text and script blocks.
//!
//! Tokens are produced lazily, one `command.pest` parse per [`Iterator::next`]
//! call. A tokenizer is `Clone`; cloning before iterating (or calling
//! [`Tokenizer::restart`]) replays the input from the start.

use miette::SourceSpan;
use pest::Parser;
use pest_derive::Parser;

use crate::errors::{Error, Result};

#[derive(Parser)]
#[grammar = "command.pest"]
struct CommandGrammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Command,
    Text,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Command word, unescaped text content or raw script body.
    pub text: String,
    pub span: SourceSpan,
    /// 1-based line the token starts on.
    pub line: usize,
}

impl Token {
    pub fn command(text: impl Into<String>) -> Self {
        Token::synthetic(TokenKind::Command, text)
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Token::synthetic(TokenKind::Text, text)
    }

    fn synthetic(kind: TokenKind, text: impl Into<String>) -> Self {
        let text = text.into();
        Token {
            kind,
            span: SourceSpan::from((0, text.len())),
            text,
            line: 1,
        }
    }

    pub fn is_command(&self) -> bool {
        self.kind == TokenKind::Command
    }

    pub fn is_text(&self) -> bool {
        self.kind == TokenKind::Text
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Tokenizer {
            src,
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    pub fn restart(&mut self) {
        *self = Tokenizer::new(self.src);
    }

    /// Advance `pos` to `to`, keeping the line count in step.
    fn advance(&mut self, to: usize) {
        self.line += self.src[self.pos..to].matches('\n').count();
        self.pos = to;
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        let to = self.pos + (rest.len() - trimmed.len());
        self.advance(to);
    }

    fn lex_one(&mut self) -> Result<Token> {
        let start = self.pos;
        let rest = &self.src[start..];
        let mut pairs = CommandGrammar::parse(Rule::token, rest)
            .map_err(|_| unterminated(rest, start))?;
        let token = pairs
            .next()
            .and_then(|pair| pair.into_inner().next())
            .ok_or_else(|| unterminated(rest, start))?;

        let len = token.as_str().len();
        let (kind, text) = match token.as_rule() {
            Rule::command => (TokenKind::Command, token.as_str().to_string()),
            Rule::script => (TokenKind::Script, inner_str(token)),
            Rule::triple_dq | Rule::dq => (TokenKind::Text, unescape(&inner_str(token), '"')),
            Rule::triple_sq | Rule::sq => (TokenKind::Text, unescape(&inner_str(token), '\'')),
            _ => return Err(unterminated(rest, start)),
        };

        let line = self.line;
        self.advance(start + len);
        Ok(Token {
            kind,
            text,
            span: SourceSpan::from((start, len)),
            line,
        })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.skip_whitespace();
        if self.pos >= self.src.len() {
            return None;
        }
        let token = self.lex_one();
        if token.is_err() {
            self.failed = true;
        }
        Some(token)
    }
}

fn inner_str(pair: pest::iterators::Pair<'_, Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|body| body.as_str().to_string())
        .unwrap_or_default()
}

/// Drop the backslash in front of the closing quote character.
/// Every other backslash is content (LaTeX).
fn unescape(body: &str, quote: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unterminated(rest: &str, start: usize) -> Error {
    let what = if rest.starts_with("<?") {
        "unterminated script block, expected `?>`"
    } else if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        "unterminated triple-quoted text"
    } else {
        "unterminated quoted text"
    };
    Error::syntax(what, Some(SourceSpan::from((start, rest.len()))))
}

/// Tokenize everything eagerly.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Tokenizer::new(src).collect()
}
