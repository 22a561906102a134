//! Error types with rich diagnostics using miette
//!
//! Every failure the interpreter, resolver or drawer can report is one of the
//! five [`Error`] variants. Token-level errors carry a source span; turn one into
//! a report with [`Error::into_report`] to get a labelled snippet.

use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

use crate::types::NumericError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Source context for error reporting
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (filename or "<input>")
    pub name: String,
    /// The full source text
    pub source: String,
}

impl SourceContext {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Malformed input: unterminated quote, script block or macro argument.
    #[error("syntax error: {message}")]
    #[diagnostic(code(diagrammar::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    /// No handler accepted the token, or the token's arguments are invalid.
    #[error("unsupported command `{token}`: {message}")]
    #[diagnostic(code(diagrammar::unsupported_command))]
    UnsupportedCommand {
        token: String,
        message: String,
        #[label("not understood")]
        span: Option<SourceSpan>,
    },

    #[error("unresolved reference `{name}`: {message}")]
    #[diagnostic(
        code(diagrammar::reference),
        help("objects can only refer to objects created before them")
    )]
    Reference {
        name: String,
        message: String,
        #[label("referenced here")]
        span: Option<SourceSpan>,
    },

    #[error("malformed path: {message}")]
    #[diagnostic(code(diagrammar::structural))]
    Structural {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("configuration error: {message}")]
    #[diagnostic(code(diagrammar::configuration))]
    Configuration { message: String },
}

impl Error {
    pub fn syntax(message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        Error::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn unsupported(token: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UnsupportedCommand {
            token: token.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn reference(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Reference {
            name: name.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Error::Structural {
            message: message.into(),
            span: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Attach a span to errors that don't have one yet.
    pub fn at(mut self, at: SourceSpan) -> Self {
        match &mut self {
            Error::Syntax { span, .. }
            | Error::UnsupportedCommand { span, .. }
            | Error::Reference { span, .. }
            | Error::Structural { span, .. } => {
                span.get_or_insert(at);
            }
            Error::Configuration { .. } => {}
        }
        self
    }

    /// Wrap into a `miette::Report` showing a labelled snippet of `ctx`.
    pub fn into_report(self, ctx: &SourceContext) -> Report {
        Report::new(self).with_source_code(ctx.named_source())
    }

    /// The span this error points at, if any.
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Error::Syntax { span, .. }
            | Error::UnsupportedCommand { span, .. }
            | Error::Reference { span, .. }
            | Error::Structural { span, .. } => *span,
            Error::Configuration { .. } => None,
        }
    }
}

impl From<std::fmt::Error> for Error {
    fn from(_: std::fmt::Error) -> Self {
        Error::configuration("could not write markup")
    }
}

/// Invalid numeric argument inside a command token.
pub(crate) fn invalid_number(token: &str, value: f64, err: NumericError) -> Error {
    Error::unsupported(token, format!("invalid number {value}: {err}"))
}
