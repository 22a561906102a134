//! Macro expansion: `\name{arg}{arg}` inside any token.
//!
//! The input is lexed with `macro.pest` into units (whitespace, escaped
//! characters, command names, braces, literal characters) which drive a small
//! state machine over an explicit frame stack:
//!
//! - **Scanning**: copy units into the innermost buffer; a command name
//!   pushes a call frame and switches to *expect-open-brace*.
//! - **ExpectOpenBrace**: `{` opens the first argument; anything else
//!   finishes a call with no arguments and is rescanned.
//! - **JustClosed**: an argument was just closed; `{` opens another one,
//!   anything else finishes the call.
//!
//! Finished calls resolve against a [`MacroTable`]. Unknown names are
//! written back verbatim so ordinary LaTeX (`\textbf{x}`) passes through.
//! Expansions are expanded again, at most [`MAX_EXPANSION_DEPTH`] levels deep.

use std::collections::HashMap;

use pest::Parser;
use pest_derive::Parser;

use crate::errors::{Error, Result};

#[derive(Parser)]
#[grammar = "macro.pest"]
struct MacroGrammar;

pub const MAX_EXPANSION_DEPTH: usize = 10;

/// Macro body.
#[derive(Debug, Clone)]
pub enum Template {
    /// Text with `#1`..`#9` placeholders; `##` is a literal `#`.
    Text(String),
    /// Pure function of the arguments.
    Function(fn(&[String]) -> String),
}

impl Template {
    fn instantiate(&self, args: &[String]) -> String {
        match self {
            Template::Function(f) => f(args),
            Template::Text(body) => substitute(body, args),
        }
    }
}

fn substitute(body: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('#') => {
                chars.next();
                out.push('#');
            }
            Some(d @ '1'..='9') => {
                chars.next();
                let index = d as usize - '1' as usize;
                if let Some(arg) = args.get(index) {
                    out.push_str(arg);
                }
            }
            _ => out.push('#'),
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Template>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace a macro. `name` is given without the backslash.
    pub fn define(&mut self, name: impl Into<String>, template: Template) {
        self.macros.insert(name.into(), template);
    }

    pub fn remove(&mut self, name: &str) -> Option<Template> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.macros.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Expand every known macro in `text`.
    pub fn expand(&self, text: &str) -> Result<String> {
        if self.macros.is_empty() || !text.contains('\\') {
            return Ok(text.to_string());
        }
        expand_at_depth(self, text, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit<'a> {
    Space(&'a str),
    Escaped(&'a str),
    Name(&'a str),
    Open,
    Close,
    Literal(&'a str),
}

fn lex(text: &str) -> Result<Vec<Unit<'_>>> {
    let units = MacroGrammar::parse(Rule::units, text)
        .map_err(|e| Error::syntax(format!("cannot lex macro input: {e}"), None))?;
    let mut out = Vec::new();
    for pair in units.flat_map(|p| p.into_inner()) {
        let unit = match pair.as_rule() {
            Rule::space => Unit::Space(pair.as_str()),
            Rule::escaped => Unit::Escaped(pair.as_str()),
            // strip the backslash
            Rule::command_name => Unit::Name(&pair.as_str()[1..]),
            Rule::open => Unit::Open,
            Rule::close => Unit::Close,
            Rule::literal => Unit::Literal(pair.as_str()),
            _ => continue,
        };
        out.push(unit);
    }
    Ok(out)
}

fn expand_at_depth(table: &MacroTable, text: &str, depth: usize) -> Result<String> {
    let expander = Expander {
        table,
        depth,
        stack: vec![Frame::Text(String::new())],
        mode: Mode::Scanning,
    };
    expander.run(&lex(text)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Scanning,
    ExpectOpenBrace,
    JustClosed,
}

#[derive(Debug)]
enum Frame {
    Text(String),
    Call { name: String, args: Vec<String> },
    Arg { buf: String, nesting: usize },
}

struct Expander<'t> {
    table: &'t MacroTable,
    depth: usize,
    stack: Vec<Frame>,
    mode: Mode,
}

impl Expander<'_> {
    fn run(mut self, units: &[Unit<'_>]) -> Result<String> {
        for &unit in units {
            self.feed(unit)?;
        }
        self.finish()
    }

    fn feed(&mut self, unit: Unit<'_>) -> Result<()> {
        match self.mode {
            Mode::Scanning => self.scan(unit),
            Mode::ExpectOpenBrace | Mode::JustClosed => {
                if unit == Unit::Open {
                    self.stack.push(Frame::Arg {
                        buf: String::new(),
                        nesting: 0,
                    });
                    self.mode = Mode::Scanning;
                    Ok(())
                } else {
                    self.close_call()?;
                    self.scan(unit)
                }
            }
        }
    }

    fn scan(&mut self, unit: Unit<'_>) -> Result<()> {
        match unit {
            Unit::Name(name) => {
                self.stack.push(Frame::Call {
                    name: name.to_string(),
                    args: Vec::new(),
                });
                self.mode = Mode::ExpectOpenBrace;
            }
            Unit::Open => {
                if let Some(Frame::Arg { nesting, .. }) = self.stack.last_mut() {
                    *nesting += 1;
                }
                self.emit("{");
            }
            Unit::Close => {
                if matches!(self.stack.last(), Some(Frame::Arg { nesting: 0, .. })) {
                    if let Some(Frame::Arg { buf, .. }) = self.stack.pop() {
                        if let Some(Frame::Call { args, .. }) = self.stack.last_mut() {
                            args.push(buf);
                        }
                    }
                    self.mode = Mode::JustClosed;
                } else {
                    if let Some(Frame::Arg { nesting, .. }) = self.stack.last_mut() {
                        *nesting -= 1;
                    }
                    self.emit("}");
                }
            }
            Unit::Space(s) | Unit::Escaped(s) | Unit::Literal(s) => self.emit(s),
        }
        Ok(())
    }

    /// Append to the innermost text or argument buffer.
    fn emit(&mut self, s: &str) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Text(buf) | Frame::Arg { buf, .. } => {
                    buf.push_str(s);
                    return;
                }
                Frame::Call { .. } => {}
            }
        }
    }

    fn close_call(&mut self) -> Result<()> {
        self.mode = Mode::Scanning;
        let Some(Frame::Call { name, args }) = self.stack.pop() else {
            return Ok(());
        };
        let text = match self.table.get(&name) {
            Some(template) => {
                if self.depth + 1 > MAX_EXPANSION_DEPTH {
                    return Err(Error::syntax(
                        format!(
                            "macro expansion depth exceeded (max {MAX_EXPANSION_DEPTH}), \
                             possible infinite recursion in `\\{name}`"
                        ),
                        None,
                    ));
                }
                crate::log::trace!(name = %name, args = args.len(), "expanding macro");
                expand_at_depth(self.table, &template.instantiate(&args), self.depth + 1)?
            }
            None => {
                let mut verbatim = format!("\\{name}");
                for arg in &args {
                    verbatim.push('{');
                    verbatim.push_str(arg);
                    verbatim.push('}');
                }
                verbatim
            }
        };
        self.emit(&text);
        Ok(())
    }

    fn finish(mut self) -> Result<String> {
        if self.mode != Mode::Scanning {
            self.close_call()?;
        }
        if self.stack.iter().any(|f| matches!(f, Frame::Arg { .. })) {
            let name = self
                .stack
                .iter()
                .rev()
                .find_map(|f| match f {
                    Frame::Call { name, .. } => Some(name.as_str()),
                    _ => None,
                })
                .unwrap_or_default();
            return Err(Error::syntax(
                format!("unterminated argument to `\\{name}`, expected `}}`"),
                None,
            ));
        }
        match self.stack.pop() {
            Some(Frame::Text(buf)) => Ok(buf),
            _ => Err(Error::syntax("unbalanced macro input", None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MacroTable {
        let mut t = MacroTable::new();
        t.define("greet", Template::Text("Hello, #1!".to_string()));
        t.define("pair", Template::Text("(#1,#2)".to_string()));
        t.define("who", Template::Text("Bob".to_string()));
        t.define("shout", Template::Function(|args| args.concat().to_uppercase()));
        t
    }

    #[test]
    fn expands_template() {
        assert_eq!(table().expand(r"\greet{World}").unwrap(), "Hello, World!");
    }

    #[test]
    fn unknown_macros_pass_through() {
        let src = r"\textbf{x} and \alpha \\ done";
        assert_eq!(table().expand(src).unwrap(), src);
    }

    #[test]
    fn arguments_expand_first() {
        assert_eq!(table().expand(r"\pair{\greet{A}}{B}").unwrap(), "(Hello, A!,B)");
    }

    #[test]
    fn function_template() {
        assert_eq!(table().expand(r"\shout{hey}{you}").unwrap(), "HEYYOU");
    }

    #[test]
    fn zero_argument_macro() {
        assert_eq!(table().expand(r"\who is here").unwrap(), "Bob is here");
        assert_eq!(table().expand(r"\who").unwrap(), "Bob");
    }

    #[test]
    fn escaped_and_nested_braces_stay_in_argument() {
        assert_eq!(table().expand(r"\greet{a\}b}").unwrap(), r"Hello, a\}b!");
        assert_eq!(table().expand(r"\greet{{x}}").unwrap(), "Hello, {x}!");
    }

    #[test]
    fn literal_braces_outside_calls() {
        assert_eq!(table().expand("{a} }").unwrap(), "{a} }");
    }

    #[test]
    fn missing_argument_is_empty() {
        assert_eq!(table().expand(r"\pair{x}").unwrap(), "(x,)");
    }

    #[test]
    fn unterminated_argument_is_syntax_error() {
        let err = table().expand(r"\greet{oops").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert!(err.to_string().contains("greet"));
    }

    #[test]
    fn runaway_recursion_is_caught() {
        let mut t = table();
        t.define("again", Template::Text(r"x\again".to_string()));
        let err = t.expand(r"\again").unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn double_hash_is_literal() {
        let mut t = MacroTable::new();
        t.define("num", Template::Text("##1 is #1".to_string()));
        assert_eq!(t.expand(r"\num{7}").unwrap(), "#1 is 7");
    }
}
