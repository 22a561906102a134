//! TikZ syntax helpers: numbers, node references, options and text.

use crate::model::{Anchor, AnchorRef, Dash, ObjectId, PathItem, Relationship, Style};
use crate::settings::Settings;
use crate::types::fmt_num;

/// `(x,y)`
pub fn coordinate(x: f64, y: f64) -> String {
    format!("({},{})", fmt_num(x), fmt_num(y))
}

/// `id0` or `id0.north east`
pub fn anchored(name: &ObjectId, anchor: Option<Anchor>) -> String {
    match anchor {
        Some(a) if a != Anchor::Center => format!("{name}.{}", a.tikz_name()),
        _ => name.to_string(),
    }
}

/// `(a.north |- b.east)`: x of the first, y of the second.
pub fn intersection(first: &AnchorRef, second: &AnchorRef) -> String {
    format!(
        "({} |- {})",
        anchored(&first.name, Some(first.anchor)),
        anchored(&second.name, Some(second.anchor))
    )
}

/// `(id0)`, `(id0.north)` or `([xshift=1cm,yshift=2cm]id0.north)`
pub fn node_ref(name: &ObjectId, anchor: Option<Anchor>, xshift: Option<f64>, yshift: Option<f64>) -> String {
    let mut shifts = Vec::new();
    if let Some(x) = xshift {
        shifts.push(format!("xshift={}cm", fmt_num(x)));
    }
    if let Some(y) = yshift {
        shifts.push(format!("yshift={}cm", fmt_num(y)));
    }
    let target = anchored(name, anchor);
    if shifts.is_empty() {
        format!("({target})")
    } else {
        format!("([{}]{target})", shifts.join(","))
    }
}

/// A relationship as a point, for brace endpoints.
pub fn relationship_point(rel: &Relationship, settings: &Settings) -> String {
    match rel {
        Relationship::AbsoluteCoordinate { x, y } => coordinate(*x, *y),
        Relationship::NamedReference { name, anchor } => node_ref(name, Some(*anchor), None, None),
        Relationship::Intersection { first, second } => intersection(first, second),
        Relationship::DirectionalOffset {
            direction,
            distance,
            from,
        } => {
            let d = distance.unwrap_or(settings.node_distance.raw());
            let shift = direction.unit() * d;
            let nonzero = |v: f64| (v != 0.0).then_some(v);
            node_ref(
                from,
                Some(direction.anchor()),
                nonzero(shift.x),
                nonzero(shift.y),
            )
        }
    }
}

/// Style options in a fixed order.
pub fn style_options(style: &Style) -> Vec<String> {
    let mut opts = Vec::new();
    if let Some(color) = &style.color {
        opts.push(format!("color={color}"));
    }
    if let Some(fill) = &style.fill {
        opts.push(format!("fill={fill}"));
    }
    if let Some(width) = style.line_width {
        opts.push(format!("line width={}pt", fmt_num(width)));
    }
    if style.dash != Dash::Solid {
        opts.push(style.dash.name().to_string());
    }
    if let Some(r) = style.rounded_corners {
        opts.push(format!("rounded corners={}cm", fmt_num(r)));
    }
    if style.rotate != 0.0 {
        opts.push(format!("rotate={}", fmt_num(style.rotate)));
    }
    if style.scale != 1.0 {
        opts.push(format!("scale={}", fmt_num(style.scale)));
        opts.push("transform shape".to_string());
    }
    opts
}

/// `[a, b, c]`, or nothing at all.
pub fn bracket(opts: &[String]) -> String {
    if opts.is_empty() {
        String::new()
    } else {
        format!("[{}]", opts.join(", "))
    }
}

/// Node text that can't break the surrounding markup.
///
/// Unbalanced braces are escaped; balanced ones are left for TeX. Line breaks
/// become `\\`.
pub fn node_text(text: &str) -> String {
    let mut depth = 0i32;
    let mut balanced = true;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    balanced = false;
                }
            }
            _ => {}
        }
    }
    balanced &= depth == 0;

    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => {
                escaped = false;
                out.push(c);
            }
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '{' | '}' if !balanced => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str(" \\\\ "),
            _ => out.push(c),
        }
    }
    out
}

/// One path item in `\draw` syntax.
pub fn path_item(item: &PathItem, settings: &Settings) -> String {
    match item {
        PathItem::NodeName {
            name,
            anchor,
            xshift,
            yshift,
        } => node_ref(name, *anchor, *xshift, *yshift),
        PathItem::Coordinate { x, y, relative } => {
            let c = coordinate(*x, *y);
            if *relative { format!("++{c}") } else { c }
        }
        PathItem::Intersection { first, second } => intersection(first, second),
        PathItem::Point { id } => format!("coordinate ({id})"),
        PathItem::Line {
            in_angle,
            out_angle,
            annotates,
        } => {
            let mut s = match (in_angle, out_angle) {
                (None, None) => "--".to_string(),
                _ => format!(
                    "to[out={},in={}]",
                    fmt_num(out_angle.unwrap_or(settings.curve_out.0)),
                    fmt_num(in_angle.unwrap_or(settings.curve_in.0))
                ),
            };
            for note in annotates {
                let mut opts = vec![note.position.tikz_name().to_string()];
                if note.sloped {
                    opts.push("sloped".to_string());
                }
                s.push_str(&format!(" node{} {{{}}}", bracket(&opts), node_text(&note.text)));
            }
            s
        }
        PathItem::Rectangle => "rectangle".to_string(),
        PathItem::Arc { start, end, radius } => format!(
            "arc ({}:{}:{}cm)",
            fmt_num(*start),
            fmt_num(*end),
            fmt_num(*radius)
        ),
        PathItem::Cycle => "cycle".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotate, AnnotatePosition, Direction};

    #[test]
    fn node_references() {
        let id = ObjectId::new("id0");
        assert_eq!(node_ref(&id, None, None, None), "(id0)");
        assert_eq!(node_ref(&id, Some(Anchor::Center), None, None), "(id0)");
        assert_eq!(
            node_ref(&id, Some(Anchor::NorthEast), Some(0.5), None),
            "([xshift=0.5cm]id0.north east)"
        );
    }

    #[test]
    fn directional_brace_end() {
        let rel = Relationship::DirectionalOffset {
            direction: Direction::Above,
            distance: Some(2.0),
            from: ObjectId::new("id3"),
        };
        assert_eq!(
            relationship_point(&rel, &Settings::default()),
            "([yshift=2cm]id3.north)"
        );
    }

    #[test]
    fn unbalanced_text_is_escaped() {
        assert_eq!(node_text("$\\frac{a}{b}$"), "$\\frac{a}{b}$");
        assert_eq!(node_text("a } b"), "a \\} b");
        assert_eq!(node_text("{open"), "\\{open");
        assert_eq!(node_text("one\ntwo"), "one \\\\ two");
    }

    #[test]
    fn lines_and_curves() {
        let settings = Settings::default();
        let line = PathItem::Line {
            in_angle: None,
            out_angle: None,
            annotates: vec![Annotate {
                text: "yes".to_string(),
                position: AnnotatePosition::Midway,
                sloped: true,
            }],
        };
        assert_eq!(path_item(&line, &settings), "-- node[midway, sloped] {yes}");
        let curve = PathItem::Line {
            in_angle: Some(120.0),
            out_angle: None,
            annotates: vec![],
        };
        assert_eq!(path_item(&curve, &settings), "to[out=30,in=120]");
    }

    #[test]
    fn style_order_is_stable() {
        let style = Style {
            color: Some("red".to_string()),
            line_width: Some(0.8),
            dash: Dash::Dashed,
            ..Style::default()
        };
        assert_eq!(
            style_options(&style),
            ["color=red", "line width=0.8pt", "dashed"]
        );
    }
}
