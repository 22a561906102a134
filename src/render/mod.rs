//! Renderer: scene graph → TikZ markup.
//!
//! Rendering is symbolic: relationships become TikZ positioning options and
//! node references, so no geometry is resolved. Each object kind is emitted
//! by a registered [`ObjectRenderer`].

pub mod tikz;

use std::collections::HashMap;
use std::fmt::Write;

use crate::errors::{Error, Result};
use crate::model::{Body, BoxShape, Object, ObjectKind, Relationship};
use crate::scene::SceneGraph;
use crate::settings::Settings;
use crate::types::fmt_num;

pub trait ObjectRenderer {
    /// Append one complete statement (with its trailing newline) to `out`.
    fn render(&self, obj: &Object, settings: &Settings, out: &mut String) -> Result<()>;
}

/// Options and `at` clause for a node's placement.
fn placement(rel: Option<&Relationship>, opts: &mut Vec<String>) -> String {
    match rel {
        None => String::new(),
        Some(Relationship::AbsoluteCoordinate { x, y }) => {
            format!(" at {}", tikz::coordinate(*x, *y))
        }
        Some(Relationship::NamedReference { name, anchor }) => {
            format!(" at {}", tikz::node_ref(name, Some(*anchor), None, None))
        }
        Some(Relationship::Intersection { first, second }) => {
            format!(" at {}", tikz::intersection(first, second))
        }
        Some(Relationship::DirectionalOffset {
            direction,
            distance,
            from,
        }) => {
            let gap = distance.map(|d| format!("{}cm ", fmt_num(d))).unwrap_or_default();
            opts.push(format!("{}={gap}of {from}", direction.tikz_name()));
            String::new()
        }
    }
}

fn node_statement(obj: &Object, mut opts: Vec<String>, out: &mut String) -> Result<()> {
    let at = placement(obj.placement(), &mut opts);
    opts.extend(tikz::style_options(&obj.style));
    let text = obj.text.as_deref().unwrap_or("");
    if text.contains('\n') {
        opts.push("align=center".to_string());
    }
    writeln!(
        out,
        "  \\node{} ({}){at} {{{}}};",
        tikz::bracket(&opts),
        obj.id,
        tikz::node_text(text)
    )?;
    Ok(())
}

struct BoxRenderer;

impl ObjectRenderer for BoxRenderer {
    fn render(&self, obj: &Object, _settings: &Settings, out: &mut String) -> Result<()> {
        let Body::Box { shape, .. } = &obj.body else {
            return Err(Error::configuration(format!("{} is not a box", obj.id)));
        };
        let shape = match shape {
            BoxShape::Rectangle => "rectangle",
            BoxShape::Circle => "circle",
            BoxShape::Ellipse => "ellipse",
        };
        node_statement(obj, vec!["draw".to_string(), shape.to_string()], out)
    }
}

struct TextRenderer;

impl ObjectRenderer for TextRenderer {
    fn render(&self, obj: &Object, _settings: &Settings, out: &mut String) -> Result<()> {
        node_statement(obj, Vec::new(), out)
    }
}

struct PathRenderer;

impl ObjectRenderer for PathRenderer {
    fn render(&self, obj: &Object, settings: &Settings, out: &mut String) -> Result<()> {
        let items = obj
            .path_items()
            .ok_or_else(|| Error::configuration(format!("{} is not a path", obj.id)))?;
        if items.is_empty() {
            // an empty \draw is a TikZ error
            return Ok(());
        }
        let parts: Vec<String> = items.iter().map(|i| tikz::path_item(i, settings)).collect();
        let opts = tikz::style_options(&obj.style);
        writeln!(out, "  \\draw{} {};", tikz::bracket(&opts), parts.join(" "))?;
        Ok(())
    }
}

struct BraceRenderer;

impl ObjectRenderer for BraceRenderer {
    fn render(&self, obj: &Object, settings: &Settings, out: &mut String) -> Result<()> {
        let Body::Brace { from, to } = &obj.body else {
            return Err(Error::configuration(format!("{} is not a brace", obj.id)));
        };
        let mut opts = vec!["decorate".to_string(), "decoration={brace}".to_string()];
        opts.extend(tikz::style_options(&obj.style));
        let label = match obj.text.as_deref() {
            Some(text) if !text.is_empty() => {
                format!(" node[midway, above] {{{}}}", tikz::node_text(text))
            }
            _ => String::new(),
        };
        writeln!(
            out,
            "  \\draw{} {} -- {}{label};",
            tikz::bracket(&opts),
            tikz::relationship_point(from, settings),
            tikz::relationship_point(to, settings),
        )?;
        Ok(())
    }
}

/// Registry of per-kind renderers.
pub struct Renderer {
    settings: Settings,
    renderers: HashMap<ObjectKind, Box<dyn ObjectRenderer>>,
}

impl Renderer {
    pub fn empty(settings: &Settings) -> Self {
        Renderer {
            settings: settings.clone(),
            renderers: HashMap::new(),
        }
    }

    pub fn new(settings: &Settings) -> Self {
        let mut renderer = Self::empty(settings);
        renderer.register(ObjectKind::Box, BoxRenderer);
        renderer.register(ObjectKind::Text, TextRenderer);
        renderer.register(ObjectKind::Path, PathRenderer);
        renderer.register(ObjectKind::Brace, BraceRenderer);
        renderer
    }

    pub fn register(&mut self, kind: ObjectKind, renderer: impl ObjectRenderer + 'static) {
        self.renderers.insert(kind, Box::new(renderer));
    }

    pub fn render(&self, scene: &SceneGraph) -> Result<String> {
        let mut out = String::from("\\begin{tikzpicture}\n");
        for obj in scene.iter() {
            let renderer = self.renderers.get(&obj.kind()).ok_or_else(|| {
                Error::configuration(format!("no renderer registered for {}", obj.kind().name()))
            })?;
            renderer.render(obj, &self.settings, &mut out)?;
        }
        out.push_str("\\end{tikzpicture}\n");
        Ok(out)
    }
}

/// Render a scene with the built-in renderers.
pub fn render(scene: &SceneGraph, settings: &Settings) -> Result<String> {
    Renderer::new(settings).render(scene)
}
