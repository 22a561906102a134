//! Handler registry: an ordered list tested newest first.

use std::fmt;

use regex_lite::{Captures, Regex};

use crate::errors::{Error, Result};

use super::CommandContext;

/// Receives the next quoted text instead of the registry.
pub struct TextContinuation {
    label: String,
    apply: Box<dyn FnOnce(&mut CommandContext, &str) -> Result<Option<TextContinuation>>>,
}

impl TextContinuation {
    pub fn new(
        label: impl Into<String>,
        apply: impl FnOnce(&mut CommandContext, &str) -> Result<Option<TextContinuation>> + 'static,
    ) -> Self {
        TextContinuation {
            label: label.into(),
            apply: Box::new(apply),
        }
    }

    /// What the continuation is waiting for, for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(self, ctx: &mut CommandContext, text: &str) -> Result<Option<TextContinuation>> {
        (self.apply)(ctx, text)
    }
}

impl fmt::Debug for TextContinuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextContinuation").field(&self.label).finish()
    }
}

pub trait Handler {
    fn name(&self) -> &str;

    fn matches(&self, token: &str) -> bool;

    fn apply(&self, ctx: &mut CommandContext, token: &str) -> Result<Option<TextContinuation>>;

    /// Modifier clauses keep an earlier continuation alive when they don't
    /// start one of their own, so texts can follow `there.is.a.box with.…`.
    fn retains_continuation(&self) -> bool {
        false
    }
}

pub type ApplyFn = fn(&mut CommandContext, &Captures<'_>) -> Result<Option<TextContinuation>>;

/// A handler matching a whole token against a regex.
pub struct PatternHandler {
    name: &'static str,
    regex: Regex,
    apply: ApplyFn,
    retains: bool,
}

impl PatternHandler {
    /// `pattern` is anchored on both ends.
    pub fn new(name: &'static str, pattern: &str, apply: ApplyFn) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            Error::configuration(format!("handler `{name}` has a bad pattern: {e}"))
        })?;
        Ok(PatternHandler {
            name,
            regex,
            apply,
            retains: false,
        })
    }

    pub fn modifier(mut self) -> Self {
        self.retains = true;
        self
    }
}

impl Handler for PatternHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, token: &str) -> bool {
        self.regex.is_match(token)
    }

    fn apply(&self, ctx: &mut CommandContext, token: &str) -> Result<Option<TextContinuation>> {
        let caps = self
            .regex
            .captures(token)
            .ok_or_else(|| Error::unsupported(token, format!("`{}` does not match", self.name)))?;
        (self.apply)(ctx, &caps)
    }

    fn retains_continuation(&self) -> bool {
        self.retains
    }
}

#[derive(Default)]
pub struct Registry {
    handlers: Vec<Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations shadow earlier ones.
    pub fn register(&mut self, handler: impl Handler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn find(&self, token: &str) -> Option<&dyn Handler> {
        self.handlers
            .iter()
            .rev()
            .find(|h| h.matches(token))
            .map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CommandContext, _: &Captures<'_>) -> Result<Option<TextContinuation>> {
        Ok(None)
    }

    #[test]
    fn newest_registration_wins() {
        let mut registry = Registry::new();
        registry.register(PatternHandler::new("general", r"box\..*", noop).unwrap());
        registry.register(PatternHandler::new("specific", r"box\.red", noop).unwrap());
        assert_eq!(registry.find("box.red").map(|h| h.name()), Some("specific"));
        assert_eq!(registry.find("box.blue").map(|h| h.name()), Some("general"));
        assert!(registry.find("circle").is_none());
    }

    #[test]
    fn patterns_are_anchored() {
        let h = PatternHandler::new("box", "box", noop).unwrap();
        assert!(h.matches("box"));
        assert!(!h.matches("boxes"));
        assert!(!h.matches("a.box"));
    }

    #[test]
    fn bad_pattern_is_a_configuration_error() {
        let err = PatternHandler::new("broken", "(", noop).err();
        assert!(matches!(err, Some(Error::Configuration { .. })));
    }
}
