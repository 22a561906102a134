//! diagrammar: an English-like command language for diagrams.
//!
//! Commands such as `there.is.a.box "hello" there.is.a.circle right.of.id0`
//! build a scene graph of boxes, texts, braces and paths. The scene renders
//! symbolically to TikZ ([`render`]) or resolves to concrete geometry and
//! device-space drawing commands ([`geometry`], [`draw`]).

pub mod draw;
pub mod errors;
pub mod geometry;
pub mod interpret;
pub mod log;
pub mod macros;
pub mod model;
pub mod preprocess;
pub mod render;
pub mod scene;
pub mod settings;
pub mod tokenizer;
pub mod types;

pub use draw::{DrawCommand, Drawer};
pub use errors::{Error, Result, SourceContext};
pub use geometry::{BoundingBox, ResolvedMap, resolve_all};
pub use interpret::{CommandContext, Handler, PatternHandler, ScriptHost, Session, TextContinuation};
pub use model::{Object, ObjectId, ObjectKind};
pub use scene::{SceneGraph, Snapshot};
pub use settings::Settings;

/// Run commands in a fresh session and render the scene to TikZ.
///
/// Returns the `tikzpicture` on success, or a report pointing at the
/// offending token.
pub fn tikz(source: &str) -> Result<String, miette::Report> {
    let ctx = SourceContext::new("<input>", source);
    let report = |e: Error| e.into_report(&ctx);
    let mut session = Session::new().map_err(report)?;
    session.parse(source).map_err(report)?;
    session.render().map_err(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_picture() {
        let out = tikz(r#"there.is.a.box "Hello""#).unwrap();
        assert!(out.starts_with("\\begin{tikzpicture}"));
        assert!(out.contains("(id0) {Hello};"));
    }

    #[test]
    fn empty_input_is_an_empty_picture() {
        assert_eq!(tikz("").unwrap(), "\\begin{tikzpicture}\n\\end{tikzpicture}\n");
        assert_eq!(
            tikz("  # nothing but a comment\n").unwrap(),
            "\\begin{tikzpicture}\n\\end{tikzpicture}\n"
        );
    }

    #[test]
    fn failures_become_reports() {
        let report = tikz("there.is.a.box \"unterminated").unwrap_err();
        assert!(report.to_string().contains("syntax error"));
    }
}
