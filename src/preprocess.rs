//! Token preprocessing, applied to every token before dispatch:
//! macro expansion, then replace rules, then comment stripping.

use std::fmt;

use regex_lite::Regex;

use crate::errors::{Error, Result};
use crate::macros::MacroTable;
use crate::tokenizer::{Token, TokenKind};

/// Which tokens a replace rule touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    Commands,
    Text,
    #[default]
    Both,
}

impl Scope {
    pub fn parse(word: &str) -> Option<Scope> {
        Some(match word {
            "commands" | "command" => Scope::Commands,
            "text" | "texts" => Scope::Text,
            "everything" | "both" => Scope::Both,
            _ => return None,
        })
    }

    fn covers(self, kind: TokenKind) -> bool {
        match (self, kind) {
            (_, TokenKind::Script) => false,
            (Scope::Both, _) => true,
            (Scope::Commands, TokenKind::Command) => true,
            (Scope::Text, TokenKind::Text) => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "Literal({s:?})"),
            Pattern::Regex(re) => write!(f, "Regex({:?})", re.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pub pattern: Pattern,
    /// For regex rules `$1`-style group references are expanded.
    pub replacement: String,
    pub scope: Scope,
}

impl ReplaceRule {
    pub fn literal(find: impl Into<String>, replacement: impl Into<String>, scope: Scope) -> Self {
        ReplaceRule {
            pattern: Pattern::Literal(find.into()),
            replacement: replacement.into(),
            scope,
        }
    }

    pub fn regex(pattern: &str, replacement: impl Into<String>, scope: Scope) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::syntax(format!("invalid replace pattern `{pattern}`: {e}"), None))?;
        Ok(ReplaceRule {
            pattern: Pattern::Regex(re),
            replacement: replacement.into(),
            scope,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Pattern::Literal(find) if find.is_empty() => text.to_string(),
            Pattern::Literal(find) => text.replace(find.as_str(), &self.replacement),
            Pattern::Regex(re) => re.replace_all(text, self.replacement.as_str()).into_owned(),
        }
    }
}

/// `#` comments in commands, `%` comments in text.
#[derive(Debug, Clone, Default)]
struct CommentStripper {
    /// Source line of the last `#` comment; later tokens on it are dropped.
    comment_line: Option<usize>,
}

impl CommentStripper {
    fn process(&mut self, mut token: Token) -> Option<Token> {
        if self.comment_line == Some(token.line) {
            return None;
        }
        match token.kind {
            TokenKind::Command if token.text.starts_with('#') => {
                self.comment_line = Some(token.line);
                None
            }
            TokenKind::Text if token.text.contains('%') => {
                token.text = strip_percent_comments(&token.text);
                Some(token)
            }
            _ => Some(token),
        }
    }
}

/// Remove everything from an unescaped `%` to the end of its line.
fn strip_percent_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut prev_backslash = false;
        let mut cut = line.len();
        for (at, c) in line.char_indices() {
            if c == '%' && !prev_backslash {
                cut = at;
                break;
            }
            prev_backslash = c == '\\' && !prev_backslash;
        }
        out.push_str(&line[..cut]);
    }
    out
}

/// The fixed preprocessing pipeline.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    pub macros: MacroTable,
    rules: Vec<ReplaceRule>,
    comments: CommentStripper,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: ReplaceRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ReplaceRule] {
        &self.rules
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Forget comment state; called at the start of each input.
    pub fn reset(&mut self) {
        self.comments = CommentStripper::default();
    }

    /// Run one token through the pipeline. `None` means the token was dropped.
    pub fn process(&mut self, mut token: Token) -> Result<Option<Token>> {
        if token.kind != TokenKind::Script {
            token.text = self.macros.expand(&token.text).map_err(|e| e.at(token.span))?;
            for rule in &self.rules {
                if rule.scope.covers(token.kind) {
                    token.text = rule.apply(&token.text);
                }
            }
        }
        Ok(self.comments.process(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::Template;
    use crate::tokenizer::tokenize;

    fn run(pre: &mut Preprocessor, src: &str) -> Vec<String> {
        pre.reset();
        tokenize(src)
            .unwrap()
            .into_iter()
            .filter_map(|t| pre.process(t).unwrap())
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn hash_comment_swallows_rest_of_line() {
        let mut pre = Preprocessor::new();
        let out = run(&mut pre, "there.is.a.box # a box \"with text\"\nwith.color.red");
        assert_eq!(out, ["there.is.a.box", "with.color.red"]);
    }

    #[test]
    fn percent_comment_in_text() {
        let mut pre = Preprocessor::new();
        let out = run(&mut pre, "\"\"\"50\\% done % not this\nkept\"\"\"");
        assert_eq!(out, ["50\\% done \nkept"]);
    }

    #[test]
    fn replace_rules_respect_scope() {
        let mut pre = Preprocessor::new();
        pre.add_rule(ReplaceRule::literal("box", "circle", Scope::Commands));
        pre.add_rule(ReplaceRule::regex(r"(\d+)", "<$1>", Scope::Text).unwrap());
        let out = run(&mut pre, "there.is.a.box \"box 42\"");
        assert_eq!(out, ["there.is.a.circle", "box <42>"]);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(ReplaceRule::regex("(", "", Scope::Both).is_err());
    }

    #[test]
    fn macros_run_before_replace() {
        let mut pre = Preprocessor::new();
        pre.macros
            .define("mk", Template::Text("there.is.a.#1".to_string()));
        pre.add_rule(ReplaceRule::literal("ellipse", "an.ellipse", Scope::Commands));
        pre.add_rule(ReplaceRule::literal("a.an.", "an.", Scope::Commands));
        let out = run(&mut pre, r"\mk{ellipse}");
        assert_eq!(out, ["there.is.an.ellipse"]);
    }

    #[test]
    fn scripts_are_untouched() {
        let mut pre = Preprocessor::new();
        pre.add_rule(ReplaceRule::literal("x", "y", Scope::Both));
        let out = run(&mut pre, "<? x % 2 ?>");
        assert_eq!(out, [" x % 2 "]);
    }
}
