//! The built-in command vocabulary.
//!
//! Every command is a [`PatternHandler`]: an anchored regex plus a plain
//! function over its captures. [`register_defaults`] adds them from the most
//! general to the most specific, so `with.at.(1,2)` reaches the placement
//! handler rather than the generic `with.ATTR.VALUE` one.

use regex_lite::Captures;

use crate::errors::{Error, Result, invalid_number};
use crate::log::debug;
use crate::macros::Template;
use crate::model::{
    ATTRIBUTES, Anchor, AnchorRef, Annotate, AnnotatePosition, AttrError, Body, BoxShape, Dash,
    Direction, Object, ObjectId, ObjectKind, PathItem, Relationship,
};
use crate::preprocess::{ReplaceRule, Scope};
use crate::settings::{SettingError, defaults};
use crate::types::Length;

use super::registry::{PatternHandler, Registry, TextContinuation};
use super::state::{FilterMode, Phase, Target};
use super::CommandContext;

const NUM: &str = r"-?\d+(?:\.\d+)?";
const NAME: &str = r"[A-Za-z_]\w*";
const DIRECTION: &str =
    r"above\.left|above\.right|below\.left|below\.right|right|left|above|below";

type Outcome = Result<Option<TextContinuation>>;

/// Add the built-in handlers to `registry`.
pub fn register_defaults(registry: &mut Registry) -> Result<()> {
    let handlers = [
        // attribute clauses
        PatternHandler::new(
            "with",
            r"(?:with|set|let)\.(?P<attr>[a-z_]+)(?:\.(?P<value>.+))?",
            with_attr,
        )?
        .modifier(),
        PatternHandler::new("and", r"and\.(?P<attr>[a-z_]+)\.(?P<value>.+)", and_attr)?.modifier(),
        PatternHandler::new(
            "where",
            r"where\.(?P<attr>[a-z_]+)\.(?P<op>is\.not|is|contains)(?:\.(?P<value>.+))?",
            where_attr,
        )?
        .modifier(),
        PatternHandler::new(
            "without",
            r"without\.(?P<attr>[a-z_]+)(?:\.(?P<value>.+))?",
            without_attr,
        )?
        .modifier(),
        PatternHandler::new(
            "style",
            r"(?P<flag>dashed|dotted|solid|rounded\.corners|sharp\.corners|thin|thick|very\.thick)",
            style_flag,
        )?
        .modifier(),
        PatternHandler::new(
            "transform",
            &format!(r"(?P<op>rotated|scaled)\.by\.(?P<value>{NUM})"),
            transform,
        )?
        .modifier(),
        // placement
        PatternHandler::new(
            "placement",
            &format!(
                r"(?:with\.)?(?P<dir>{DIRECTION})\.of\.(?P<name>{NAME})(?:\.by\.(?P<dist>{NUM}))?"
            ),
            placement,
        )?
        .modifier(),
        PatternHandler::new("at", r"(?:with\.)?at\.(?P<pos>.+)", at)?.modifier(),
        // selection
        PatternHandler::new("select kind", r"(?:all|every)\.(?P<kind>[a-z]+)", select_kind)?,
        PatternHandler::new(
            "select names",
            &format!(r"select\.(?P<names>{NAME}(?:\.and\.{NAME})*)"),
            select_names,
        )?,
        // creation
        PatternHandler::new(
            "create",
            r"there\.is\.an?\.(?P<shape>box|rectangle|circle|ellipse|node|text)",
            create_shape,
        )?,
        PatternHandler::new(
            "create many",
            r"there\.are\.(?P<n>\d+)\.(?P<kind>boxes|rectangles|circles|ellipses|nodes|texts)",
            create_many,
        )?,
        PatternHandler::new("path", r"there\.is\.a\.path", create_path)?,
        PatternHandler::new(
            "brace",
            r"there\.is\.a\.brace\.from\.(?P<from>.+?)\.to\.(?P<to>.+)",
            create_brace,
        )?,
        PatternHandler::new(
            "generate",
            r"there\.is\.an?\.(?P<name>[a-z]+)\.of\.(?P<size>\d+(?:\.by\.\d+)*)",
            generate,
        )?,
        // path items
        PatternHandler::new("position", r"(?:from|to)\.(?P<pos>.+)", path_position)?,
        PatternHandler::new(
            "line",
            &format!(
                r"(?P<kind>line|curve)(?:\.out\.(?P<out>{NUM}))?(?:\.in\.(?P<in>{NUM}))?(?:\.to\.(?P<to>.+))?"
            ),
            line,
        )?,
        PatternHandler::new("rectangle", r"rectangle(?:\.to\.(?P<to>.+))?", rectangle)?,
        PatternHandler::new(
            "arc",
            &format!(r"arc\.from\.(?P<start>{NUM})\.to\.(?P<end>{NUM})\.radius\.(?P<radius>{NUM})"),
            arc,
        )?,
        PatternHandler::new("mark", &format!(r"mark\.(?P<name>{NAME})"), mark)?,
        PatternHandler::new(
            "label",
            r"label(?:\.(?P<pos>at\.start|near\.start|midway|near\.end|at\.end))?(?P<sloped>\.sloped)?",
            label,
        )?,
        PatternHandler::new("end path", r"end\.path|done", end_path)?,
        // everything else
        PatternHandler::new("delete", &format!(r"delete\.(?P<name>{NAME})"), delete)?,
        PatternHandler::new("define", &format!(r"define\.(?P<name>{NAME})"), define)?,
        PatternHandler::new(
            "replace",
            r"replace(?:\.(?P<kind>literal|regex))?(?:\.in\.(?P<scope>commands|text|everything))?",
            replace,
        )?,
        PatternHandler::new(
            "default",
            &format!(r"default\.(?P<name>[a-z_]+)\.(?P<value>{NUM})"),
            set_default,
        )?,
    ];
    for handler in handlers {
        registry.register(handler);
    }
    Ok(())
}

// ============================================================================
// Argument parsing
// ============================================================================

fn whole<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(0).map_or("", |m| m.as_str())
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str())
}

/// A group the pattern guarantees to be present.
fn required<'t>(caps: &Captures<'t>, name: &str) -> Result<&'t str> {
    group(caps, name)
        .ok_or_else(|| Error::unsupported(whole(caps), format!("missing `{name}`")))
}

fn number(token: &str, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::unsupported(token, format!("`{text}` is not a number")))
}

fn attr_error(token: &str, err: AttrError) -> Error {
    Error::unsupported(token, err.to_string())
}

fn check_attribute(token: &str, attr: &str) -> Result<()> {
    if ATTRIBUTES.contains(&attr) || matches!(attr, "id" | "kind") {
        Ok(())
    } else {
        Err(attr_error(token, AttrError::Unknown(attr.to_string())))
    }
}

fn anchor(token: &str, words: &str) -> Result<Anchor> {
    Anchor::parse(words).ok_or_else(|| Error::unsupported(token, format!("`{words}` is not an anchor")))
}

/// `(x,y)`
fn coordinate(token: &str, text: &str) -> Result<Option<(f64, f64)>> {
    let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return Ok(None);
    };
    let (x, y) = inner
        .split_once(',')
        .ok_or_else(|| Error::unsupported(token, format!("`{text}` is not a coordinate")))?;
    Ok(Some((number(token, x.trim())?, number(token, y.trim())?)))
}

/// `NAME[.ANCHOR]` naming an existing object.
fn anchored_name(ctx: &CommandContext, token: &str, text: &str) -> Result<(ObjectId, Option<Anchor>)> {
    let (name, rest) = match text.split_once('.') {
        Some((name, rest)) => (name, Some(rest)),
        None => (text, None),
    };
    let anchor = rest.map(|words| anchor(token, words)).transpose()?;
    Ok((ctx.require(name)?, anchor))
}

/// `intersection.of.NAME[.ANCHOR].and.NAME[.ANCHOR]`
fn intersection(ctx: &CommandContext, token: &str, text: &str) -> Result<Option<(AnchorRef, AnchorRef)>> {
    let Some(rest) = text.strip_prefix("intersection.of.") else {
        return Ok(None);
    };
    let (first, second) = rest
        .split_once(".and.")
        .ok_or_else(|| Error::unsupported(token, "an intersection needs two references"))?;
    let anchor_ref = |text: &str| -> Result<AnchorRef> {
        let (name, anchor) = anchored_name(ctx, token, text)?;
        Ok(AnchorRef::new(name, anchor.unwrap_or_default()))
    };
    Ok(Some((anchor_ref(first)?, anchor_ref(second)?)))
}

/// Where `at.…` and brace endpoints put things.
fn position(ctx: &CommandContext, token: &str, text: &str) -> Result<Relationship> {
    if let Some((x, y)) = coordinate(token, text)? {
        return Ok(Relationship::AbsoluteCoordinate { x, y });
    }
    if let Some((first, second)) = intersection(ctx, token, text)? {
        return Ok(Relationship::Intersection { first, second });
    }
    let (name, anchor) = anchored_name(ctx, token, text)?;
    Ok(Relationship::NamedReference {
        name,
        anchor: anchor.unwrap_or_default(),
    })
}

/// A path position: `cycle`, `(x,y)`, `+(dx,dy)`, an intersection or
/// `NAME[.ANCHOR][.shifted.(dx,dy)]`. Names may be marks of the current path.
fn path_item_at(ctx: &CommandContext, token: &str, text: &str) -> Result<PathItem> {
    if text == "cycle" {
        return Ok(PathItem::Cycle);
    }
    if let Some(offset) = text.strip_prefix('+') {
        let (x, y) = coordinate(token, offset)?
            .ok_or_else(|| Error::unsupported(token, format!("`{text}` is not a relative coordinate")))?;
        return Ok(PathItem::Coordinate { x, y, relative: true });
    }
    if let Some((x, y)) = coordinate(token, text)? {
        return Ok(PathItem::Coordinate { x, y, relative: false });
    }
    if let Some((first, second)) = intersection(ctx, token, text)? {
        return Ok(PathItem::Intersection { first, second });
    }
    let (base, shift) = match text.split_once(".shifted.") {
        Some((base, shift)) => {
            let shift = coordinate(token, shift)?
                .ok_or_else(|| Error::unsupported(token, format!("`{shift}` is not a shift")))?;
            (base, Some(shift))
        }
        None => (text, None),
    };
    let (name, anchor) = match base.split_once('.') {
        Some((name, words)) => (name, Some(anchor(token, words)?)),
        None => (base, None),
    };
    let name = if ctx.is_mark(name) {
        ObjectId::new(name)
    } else {
        ctx.require(name)?
    };
    Ok(PathItem::NodeName {
        name,
        anchor,
        xshift: shift.map(|(x, _)| x),
        yshift: shift.map(|(_, y)| y),
    })
}

fn path_items_mut<'c>(ctx: &'c mut CommandContext, path: &ObjectId) -> Result<&'c mut Vec<PathItem>> {
    match &mut ctx.object_mut(path)?.body {
        Body::Path { items } => Ok(items),
        _ => Err(Error::reference(path.as_str(), "is not a path")),
    }
}

/// Texts set `attr` on successive targets.
pub(crate) fn respectively(attr: String) -> TextContinuation {
    TextContinuation::new(format!("{attr} of the next target"), move |ctx, text| {
        let Some((id, more)) = ctx.phase.next_in_turn() else {
            return Err(Error::unsupported(
                format!("\"{text}\""),
                "every target already has its text",
            ));
        };
        ctx.object_mut(&id)?
            .set_attr(&attr, text)
            .map_err(|e| attr_error(text, e))?;
        Ok(more.then(|| respectively(attr)))
    })
}

// ============================================================================
// Creation and selection
// ============================================================================

fn create_shape(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let body = match required(caps, "shape")? {
        "text" => Body::Text { placement: None },
        word => Body::Box {
            shape: BoxShape::parse(word).unwrap_or_default(),
            placement: None,
        },
    };
    let id = ctx.create(body)?;
    ctx.phase = Phase::targeting(Target::Single(id));
    Ok(Some(respectively("text".to_string())))
}

fn too_many(token: &str) -> Error {
    Error::unsupported(
        token,
        format!("one command creates at most {} objects", defaults::MAX_OBJECTS),
    )
}

fn create_many(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let n: usize = required(caps, "n")?
        .parse()
        .map_err(|_| Error::unsupported(token, "too many objects"))?;
    if n == 0 {
        return Err(Error::unsupported(token, "nothing to create"));
    }
    if n > defaults::MAX_OBJECTS {
        return Err(too_many(token));
    }
    let shape = match required(caps, "kind")? {
        "texts" => None,
        "circles" => Some(BoxShape::Circle),
        "ellipses" => Some(BoxShape::Ellipse),
        _ => Some(BoxShape::Rectangle),
    };
    ctx.finish_path()?;
    let mut created = Vec::with_capacity(n);
    for _ in 0..n {
        let body = match shape {
            None => Body::Text { placement: None },
            Some(shape) => Body::Box {
                shape,
                placement: None,
            },
        };
        created.push(ctx.create(body)?);
    }
    ctx.phase = Phase::targeting(Target::Batch(created));
    Ok(Some(respectively("text".to_string())))
}

fn create_path(ctx: &mut CommandContext, _caps: &Captures<'_>) -> Outcome {
    let path = ctx.create(Body::Path { items: Vec::new() })?;
    ctx.phase = Phase::BuildingPath { path, line: None };
    Ok(None)
}

fn create_brace(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let from = position(ctx, token, required(caps, "from")?)?;
    let to = position(ctx, token, required(caps, "to")?)?;
    let id = ctx.create(Body::Brace { from, to })?;
    ctx.phase = Phase::targeting(Target::Single(id));
    Ok(Some(respectively("text".to_string())))
}

fn generate(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let name = required(caps, "name")?;
    let size = required(caps, "size")?
        .split(".by.")
        .map(|n| n.parse::<usize>().map_err(|_| Error::unsupported(token, format!("`{n}` is too large"))))
        .collect::<Result<Vec<_>>>()?;
    ctx.finish_path()?;
    let generator = ctx
        .generators
        .get(name)
        .ok_or_else(|| Error::unsupported(token, format!("there is no `{name}` primitive")))?;
    if generator.arity() != size.len() {
        return Err(Error::unsupported(
            token,
            format!("a {name} takes {} size number(s)", generator.arity()),
        ));
    }
    let total = size.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
    if total.is_none_or(|total| total > defaults::MAX_OBJECTS) {
        return Err(too_many(token));
    }
    let generated = generator
        .generate(&size, &mut ctx.ids, &ctx.settings)
        .map_err(|e| match e {
            Error::UnsupportedCommand { message, .. } => Error::unsupported(token, message),
            other => other,
        })?;
    debug!(generator = name, objects = generated.objects.len(), "generated");
    for obj in generated.objects {
        ctx.scene.push(obj);
    }
    ctx.phase = Phase::targeting(Target::Batch(generated.targets));
    Ok(Some(respectively("text".to_string())))
}

fn select_kind(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let word = required(caps, "kind")?;
    let kind = match word {
        "objects" | "object" | "things" => None,
        _ => Some(
            ObjectKind::parse(word)
                .ok_or_else(|| Error::unsupported(token, format!("there is no kind `{word}`")))?,
        ),
    };
    let shape = match word {
        "circle" | "circles" => Some(BoxShape::Circle),
        "ellipse" | "ellipses" => Some(BoxShape::Ellipse),
        "rectangle" | "rectangles" => Some(BoxShape::Rectangle),
        _ => None,
    };
    ctx.finish_path()?;
    let ids = ctx
        .scene
        .iter()
        .filter(|o| kind.is_none_or(|k| o.kind() == k))
        .filter(|o| match (shape, &o.body) {
            (None, _) => true,
            (Some(want), Body::Box { shape, .. }) => *shape == want,
            _ => false,
        })
        .map(|o| o.id.clone())
        .collect();
    ctx.phase = Phase::targeting(Target::Batch(ids));
    Ok(None)
}

fn select_names(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let mut ids = required(caps, "names")?
        .split(".and.")
        .map(|name| ctx.require(name))
        .collect::<Result<Vec<_>>>()?;
    ctx.finish_path()?;
    let target = if ids.len() == 1 {
        Target::Single(ids.remove(0))
    } else {
        Target::Batch(ids)
    };
    ctx.phase = Phase::targeting(target);
    Ok(None)
}

// ============================================================================
// Attribute clauses
// ============================================================================

fn set_on_targets(ctx: &mut CommandContext, token: &str, attr: &str, value: &str) -> Result<()> {
    for id in ctx.targets(token)? {
        ctx.object_mut(&id)?
            .set_attr(attr, value)
            .map_err(|e| attr_error(token, e))?;
    }
    Ok(())
}

fn with_attr(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let attr = required(caps, "attr")?;
    ctx.targets(token)?;
    ctx.phase.set_mode(FilterMode::Mutate);
    match group(caps, "value") {
        Some(value) => {
            set_on_targets(ctx, token, attr, value)?;
            Ok(None)
        }
        None => {
            if !ATTRIBUTES.contains(&attr) {
                return Err(attr_error(token, AttrError::Unknown(attr.to_string())));
            }
            ctx.phase.rewind();
            Ok(Some(respectively(attr.to_string())))
        }
    }
}

fn and_attr(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let attr = required(caps, "attr")?;
    let value = required(caps, "value")?;
    match ctx.phase.mode() {
        FilterMode::Filter => {
            check_attribute(token, attr)?;
            ctx.narrow(token, |o| o.attr(attr).as_deref() == Some(value))?;
        }
        FilterMode::Mutate => set_on_targets(ctx, token, attr, value)?,
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Is,
    IsNot,
    Contains,
}

impl Comparison {
    fn holds(self, obj: &Object, attr: &str, operand: &str) -> bool {
        let value = obj.attr(attr);
        match self {
            Comparison::Is => value.as_deref() == Some(operand),
            Comparison::IsNot => value.as_deref() != Some(operand),
            Comparison::Contains => value.is_some_and(|v| v.contains(operand)),
        }
    }
}

fn where_attr(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let attr = required(caps, "attr")?;
    check_attribute(token, attr)?;
    let op = match required(caps, "op")? {
        "is" => Comparison::Is,
        "is.not" => Comparison::IsNot,
        _ => Comparison::Contains,
    };
    ctx.targets(token)?;
    ctx.phase.set_mode(FilterMode::Filter);
    match group(caps, "value") {
        Some(value) => {
            ctx.narrow(token, |o| op.holds(o, attr, value))?;
            Ok(None)
        }
        None => {
            let (token, attr) = (token.to_string(), attr.to_string());
            Ok(Some(TextContinuation::new("filter operand", move |ctx, text| {
                ctx.narrow(&token, |o| op.holds(o, &attr, text))?;
                Ok(None)
            })))
        }
    }
}

fn without_attr(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let attr = required(caps, "attr")?;
    check_attribute(token, attr)?;
    let value = group(caps, "value");
    ctx.targets(token)?;
    ctx.phase.set_mode(FilterMode::Filter);
    ctx.narrow(token, |o| match (o.attr(attr), value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(have), Some(value)) => have != value,
    })?;
    Ok(None)
}

// ============================================================================
// Placement and style
// ============================================================================

fn place_targets(ctx: &mut CommandContext, token: &str, rel: Relationship) -> Result<()> {
    for id in ctx.targets(token)? {
        if rel.references().contains(&&id) {
            return Err(Error::reference(id.as_str(), "cannot be placed relative to itself"));
        }
        ctx.object_mut(&id)?
            .place(rel.clone())
            .map_err(|e| attr_error(token, e))?;
    }
    Ok(())
}

fn placement(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let words = required(caps, "dir")?;
    let direction = Direction::parse(words)
        .ok_or_else(|| Error::unsupported(token, format!("`{words}` is not a direction")))?;
    let from = ctx.require(required(caps, "name")?)?;
    let distance = group(caps, "dist")
        .map(|d| {
            let d = number(token, d)?;
            Length::try_non_negative(d)
                .map(Length::raw)
                .map_err(|e| invalid_number(token, d, e))
        })
        .transpose()?;
    let rel = Relationship::DirectionalOffset {
        direction,
        distance,
        from,
    };
    place_targets(ctx, token, rel)?;
    Ok(None)
}

fn at(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let rel = position(ctx, token, required(caps, "pos")?)?;
    place_targets(ctx, token, rel)?;
    Ok(None)
}

fn style_flag(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let flag = required(caps, "flag")?;
    for id in ctx.targets(token)? {
        let style = &mut ctx.object_mut(&id)?.style;
        match flag {
            "dashed" => style.dash = Dash::Dashed,
            "dotted" => style.dash = Dash::Dotted,
            "solid" => style.dash = Dash::Solid,
            "rounded.corners" => style.rounded_corners = Some(defaults::ROUNDED_CORNERS),
            "sharp.corners" => style.rounded_corners = None,
            "thin" => style.line_width = Some(defaults::LINE_WIDTH),
            "thick" => style.line_width = Some(defaults::THICK),
            _ => style.line_width = Some(defaults::VERY_THICK),
        }
    }
    Ok(None)
}

fn transform(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let value = number(token, required(caps, "value")?)?;
    let rotate = required(caps, "op")? == "rotated";
    if !rotate {
        Length::try_positive(value).map_err(|e| invalid_number(token, value, e))?;
    }
    for id in ctx.targets(token)? {
        let style = &mut ctx.object_mut(&id)?.style;
        if rotate {
            style.rotate = value;
        } else {
            style.scale = value;
        }
    }
    Ok(None)
}

// ============================================================================
// Path items
// ============================================================================

fn path_position(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let item = path_item_at(ctx, token, required(caps, "pos")?)?;
    ctx.push_path_item(token, item)?;
    Ok(None)
}

/// Push `segment`, then the optional `to` position after it.
fn segment_to(ctx: &mut CommandContext, caps: &Captures<'_>, segment: PathItem) -> Outcome {
    let token = whole(caps);
    let to = group(caps, "to")
        .map(|to| path_item_at(ctx, token, to))
        .transpose()?;
    ctx.push_path_item(token, segment)?;
    if let Some(to) = to {
        ctx.push_path_item(token, to)?;
    }
    Ok(None)
}

fn line(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let out_angle = group(caps, "out").map(|a| number(token, a)).transpose()?;
    let in_angle = group(caps, "in").map(|a| number(token, a)).transpose()?;
    let (out_angle, in_angle) = match required(caps, "kind")? {
        "curve" => (
            Some(out_angle.unwrap_or(ctx.settings.curve_out.0)),
            Some(in_angle.unwrap_or(ctx.settings.curve_in.0)),
        ),
        _ => (out_angle, in_angle),
    };
    let segment = PathItem::Line {
        in_angle,
        out_angle,
        annotates: Vec::new(),
    };
    segment_to(ctx, caps, segment)
}

fn rectangle(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    segment_to(ctx, caps, PathItem::Rectangle)
}

fn arc(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let start = number(token, required(caps, "start")?)?;
    let end = number(token, required(caps, "end")?)?;
    let radius = number(token, required(caps, "radius")?)?;
    let radius = Length::try_positive(radius)
        .map_err(|e| invalid_number(token, radius, e))?
        .raw();
    ctx.push_path_item(token, PathItem::Arc { start, end, radius })?;
    Ok(None)
}

fn mark(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let name = required(caps, "name")?;
    let id = ObjectId::new(name);
    if ctx.scene.contains(&id) {
        return Err(Error::unsupported(token, format!("`{name}` already names an object")));
    }
    if id.number().is_some() {
        return Err(Error::unsupported(token, format!("`{name}` is reserved for object ids")));
    }
    ctx.push_path_item(token, PathItem::Point { id })?;
    Ok(None)
}

fn label(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let position = group(caps, "pos")
        .and_then(AnnotatePosition::parse)
        .unwrap_or_default();
    let sloped = group(caps, "sloped").is_some();
    let Phase::BuildingPath { path, line } = &ctx.phase else {
        return Err(Error::unsupported(token, "labels belong to a path"));
    };
    let Some(line) = *line else {
        return Err(Error::structural(format!("`{token}` has no line to label")));
    };
    let path = path.clone();
    Ok(Some(TextContinuation::new("line label", move |ctx, text| {
        match path_items_mut(ctx, &path)?.get_mut(line) {
            Some(PathItem::Line { annotates, .. }) => annotates.push(Annotate {
                text: text.to_string(),
                position,
                sloped,
            }),
            _ => return Err(Error::structural(format!("path {path} lost its line"))),
        }
        Ok(None)
    })))
}

fn end_path(ctx: &mut CommandContext, _caps: &Captures<'_>) -> Outcome {
    ctx.finish_path()?;
    ctx.phase = Phase::Idle;
    Ok(None)
}

// ============================================================================
// Scene, macros, settings
// ============================================================================

fn delete(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let id = ctx.require(required(caps, "name")?)?;
    let removed = ctx.scene.delete_cascade(&id)?;
    if removed.iter().any(|r| ctx.phase.mentions(r)) {
        ctx.phase = Phase::Idle;
    }
    Ok(None)
}

fn define(_ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let name = required(caps, "name")?.to_string();
    Ok(Some(TextContinuation::new("macro body", move |ctx, text| {
        ctx.preprocessor
            .macros
            .define(name, Template::Text(text.to_string()));
        Ok(None)
    })))
}

fn replace(_ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let regex = group(caps, "kind") == Some("regex");
    let scope = group(caps, "scope")
        .and_then(Scope::parse)
        .unwrap_or_default();
    Ok(Some(TextContinuation::new("replace pattern", move |_ctx, pattern| {
        let pattern = pattern.to_string();
        Ok(Some(TextContinuation::new("replacement", move |ctx, replacement| {
            let rule = if regex {
                ReplaceRule::regex(&pattern, replacement, scope)?
            } else {
                ReplaceRule::literal(pattern, replacement, scope)
            };
            ctx.preprocessor.add_rule(rule);
            Ok(None)
        })))
    })))
}

fn set_default(ctx: &mut CommandContext, caps: &Captures<'_>) -> Outcome {
    let token = whole(caps);
    let name = required(caps, "name")?;
    let value = number(token, required(caps, "value")?)?;
    ctx.settings.set(name, value).map_err(|e| match e {
        SettingError::Unknown(name) => {
            Error::unsupported(token, format!("there is no setting `{name}`"))
        }
        SettingError::Invalid(err) => invalid_number(token, value, err),
        SettingError::TooLarge { max } => {
            Error::unsupported(token, format!("`{name}` is at most {max}"))
        }
    })?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::Session;

    fn run(src: &str) -> Session {
        let mut s = Session::new().unwrap();
        s.parse(src).unwrap();
        s
    }

    fn fails(src: &str) -> Error {
        let mut s = Session::new().unwrap();
        s.parse(src).unwrap_err()
    }

    fn text_of(s: &Session, id: &str) -> Option<String> {
        s.find_by_id(id).and_then(|o| o.text.clone())
    }

    fn items(s: &Session, id: &str) -> Vec<PathItem> {
        s.find_by_id(id).and_then(Object::path_items).unwrap().to_vec()
    }

    #[test]
    fn many_objects_take_texts_in_turn() {
        let s = run(r#"there.are.3.circles "a" "b" "c""#);
        assert_eq!(s.scene().len(), 3);
        assert_eq!(text_of(&s, "id0").as_deref(), Some("a"));
        assert_eq!(text_of(&s, "id2").as_deref(), Some("c"));
        assert!(s.pending_label().is_none());
        let mut s = s;
        assert!(s.parse(r#""d""#).is_err());
    }

    #[test]
    fn zero_objects_is_an_error() {
        assert!(matches!(fails("there.are.0.boxes"), Error::UnsupportedCommand { .. }));
    }

    #[test]
    fn batch_text_restarts_at_the_first_target() {
        let s = run(r#"there.are.2.boxes "a" with.color "red" "blue""#);
        let color = |id| s.find_by_id(id).unwrap().style.color.clone();
        assert_eq!(color("id0").as_deref(), Some("red"));
        assert_eq!(color("id1").as_deref(), Some("blue"));
        assert_eq!(text_of(&s, "id1"), None);
    }

    #[test]
    fn filters_narrow_the_batch() {
        let s = run(
            r#"there.are.3.boxes "x1" "y" "x2"
               all.boxes where.text.contains.x and.color.red"#,
        );
        let color = |id| s.find_by_id(id).unwrap().style.color.clone();
        // still filtering: `and` narrowed instead of writing
        assert_eq!(color("id0"), None);
        assert!(matches!(
            s.phase(),
            Phase::Targeting { target, .. } if target.ids().is_empty()
        ));

        let s = run(
            r#"there.are.3.boxes "x1" "y" "x2"
               all.boxes where.text.contains "x" with.color.red"#,
        );
        let color = |id| s.find_by_id(id).unwrap().style.color.clone();
        assert_eq!(color("id0").as_deref(), Some("red"));
        assert_eq!(color("id1"), None);
        assert_eq!(color("id2").as_deref(), Some("red"));
    }

    #[test]
    fn without_drops_matching_targets() {
        let s = run(
            r#"there.are.2.boxes with.color.red there.is.a.box
               all.boxes without.color with.fill.blue"#,
        );
        assert_eq!(s.find_by_id("id0").unwrap().style.fill, None);
        assert_eq!(s.find_by_id("id2").unwrap().style.fill.as_deref(), Some("blue"));
    }

    #[test]
    fn select_by_shape() {
        let s = run("there.is.a.box there.is.a.circle there.is.a.text all.circles dashed");
        assert_eq!(s.find_by_id("id0").unwrap().style.dash, Dash::Solid);
        assert_eq!(s.find_by_id("id1").unwrap().style.dash, Dash::Dashed);
        let s = run("there.is.a.box there.is.a.text select.id0.and.id1 thick");
        assert_eq!(s.find_by_id("id1").unwrap().style.line_width, Some(defaults::THICK));
    }

    #[test]
    fn unknown_attribute_is_unsupported() {
        assert!(matches!(
            fails("there.is.a.box with.sparkle.yes"),
            Error::UnsupportedCommand { .. }
        ));
        assert!(matches!(
            fails("there.is.a.box with.scale.big"),
            Error::UnsupportedCommand { .. }
        ));
    }

    #[test]
    fn placement_clauses() {
        let s = run("there.is.a.box there.is.a.box below.left.of.id0.by.2 there.is.a.text at.id1.south");
        assert_eq!(
            s.find_by_id("id1").unwrap().placement(),
            Some(&Relationship::DirectionalOffset {
                direction: Direction::BelowLeft,
                distance: Some(2.0),
                from: ObjectId::new("id0"),
            })
        );
        assert_eq!(
            s.find_by_id("id2").unwrap().placement(),
            Some(&Relationship::NamedReference {
                name: ObjectId::new("id1"),
                anchor: Anchor::South,
            })
        );
    }

    #[test]
    fn placement_needs_an_existing_other_object() {
        assert!(matches!(fails("there.is.a.box right.of.id7"), Error::Reference { .. }));
        assert!(matches!(fails("there.is.a.box right.of.id0"), Error::Reference { .. }));
        assert!(matches!(fails("right.of.id0"), Error::Reference { .. }));
    }

    #[test]
    fn intersection_placement() {
        let s = run("there.is.a.box there.is.a.box at.(2,3) there.is.a.box at.intersection.of.id0.north.and.id1");
        assert_eq!(
            s.find_by_id("id2").unwrap().placement(),
            Some(&Relationship::Intersection {
                first: AnchorRef::new("id0", Anchor::North),
                second: AnchorRef::new("id1", Anchor::Center),
            })
        );
    }

    #[test]
    fn building_a_path() {
        let s = run(
            r#"there.is.a.box there.is.a.box right.of.id0
               there.is.a.path from.id0 line.to.id1 label.near.end.sloped "yes"
               curve.to.id0.north.shifted.(0,1) mark.top rectangle.to.+(1,1) done"#,
        );
        let items = items(&s, "id2");
        assert_eq!(items.len(), 8);
        assert_eq!(items[0], PathItem::node("id0"));
        match &items[1] {
            PathItem::Line { annotates, in_angle: None, .. } => {
                assert_eq!(annotates[0].text, "yes");
                assert_eq!(annotates[0].position, AnnotatePosition::NearEnd);
                assert!(annotates[0].sloped);
            }
            other => panic!("expected a straight line, got {other:?}"),
        }
        assert_eq!(
            items[3],
            PathItem::Line {
                in_angle: Some(150.0),
                out_angle: Some(30.0),
                annotates: vec![],
            }
        );
        assert_eq!(
            items[4],
            PathItem::NodeName {
                name: ObjectId::new("id0"),
                anchor: Some(Anchor::North),
                xshift: Some(0.0),
                yshift: Some(1.0),
            }
        );
        assert_eq!(items[5], PathItem::Point { id: ObjectId::new("top") });
        assert_eq!(*s.phase(), Phase::Idle);
    }

    #[test]
    fn marks_can_be_revisited() {
        let s = run("there.is.a.path from.(0,0) mark.start line.to.(1,0) line.to.start end.path");
        assert_eq!(items(&s, "id0").last(), Some(&PathItem::node("start")));
    }

    #[test]
    fn segment_without_position_is_structural() {
        assert!(matches!(fails("there.is.a.path line"), Error::Structural { .. }));
        assert!(matches!(
            fails("there.is.a.path from.(0,0) line line"),
            Error::Structural { .. }
        ));
    }

    #[test]
    fn dangling_segment_fails_when_the_path_ends() {
        assert!(matches!(
            fails("there.is.a.path from.(0,0) line done"),
            Error::Structural { .. }
        ));
        assert!(matches!(
            fails("there.is.a.path from.(0,0) line there.is.a.box"),
            Error::Structural { .. }
        ));
    }

    #[test]
    fn oversized_counts_are_rejected() {
        for src in [
            "there.are.1000000000000000000.boxes",
            "there.are.10001.boxes",
            "there.is.a.grid.of.1000.by.1000",
            "there.is.a.grid.of.100000000000.by.100000000000",
            "there.is.a.tree.of.10001",
            "default.min_curve_steps.1000000",
        ] {
            assert!(matches!(fails(src), Error::UnsupportedCommand { .. }), "{src}");
        }
    }

    #[test]
    fn and_after_without_keeps_narrowing() {
        let s = run(
            r#"there.are.2.boxes with.color.red there.is.a.box with.fill.blue there.is.a.box
               all.boxes without.color and.fill.blue with.dash.dotted"#,
        );
        let style = |id| s.find_by_id(id).unwrap().style.clone();
        assert_eq!(style("id2").dash, Dash::Dotted);
        assert_eq!(style("id3").dash, Dash::Solid);
        assert_eq!(style("id3").fill, None);
        assert_eq!(style("id0").dash, Dash::Solid);
    }

    #[test]
    fn marks_cannot_take_object_id_names() {
        assert!(matches!(
            fails("there.is.a.path from.(0,0) mark.id9"),
            Error::UnsupportedCommand { .. }
        ));
    }

    #[test]
    fn mark_needs_a_position() {
        assert!(matches!(fails("there.is.a.path mark.a"), Error::Structural { .. }));
        assert!(matches!(
            fails("there.is.a.path from.(0,0) line mark.a"),
            Error::Structural { .. }
        ));
    }

    #[test]
    fn label_needs_a_line() {
        assert!(matches!(
            fails("there.is.a.path from.(0,0) label"),
            Error::Structural { .. }
        ));
        assert!(matches!(fails("there.is.a.box label"), Error::UnsupportedCommand { .. }));
    }

    #[test]
    fn path_items_outside_a_path_are_unsupported() {
        assert!(matches!(fails("to.(1,1)"), Error::UnsupportedCommand { .. }));
        assert!(matches!(
            fails("there.is.a.path arc.from.0.to.90.radius.0"),
            Error::UnsupportedCommand { .. }
        ));
    }

    #[test]
    fn braces_take_a_label() {
        let s = run(r#"there.is.a.box there.is.a.brace.from.id0.west.to.(3,0) "width""#);
        let brace = s.find_by_id("id1").unwrap();
        assert_eq!(brace.kind(), ObjectKind::Brace);
        assert_eq!(brace.text.as_deref(), Some("width"));
    }

    #[test]
    fn generators_target_their_nodes() {
        let s = run(r#"there.is.a.grid.of.2.by.2 "a" "b" "c" "d""#);
        assert_eq!(s.scene().len(), 4);
        assert_eq!(text_of(&s, "id3").as_deref(), Some("d"));
        assert!(matches!(fails("there.is.a.grid.of.2"), Error::UnsupportedCommand { .. }));
        assert!(matches!(fails("there.is.a.blob.of.2"), Error::UnsupportedCommand { .. }));
    }

    #[test]
    fn delete_cascades_and_goes_idle() {
        let mut s = run("there.is.a.box there.is.a.box right.of.id0 there.is.a.text at.id1.north");
        s.parse("delete.id0").unwrap();
        assert!(s.scene().is_empty());
        assert_eq!(*s.phase(), Phase::Idle);
    }

    #[test]
    fn define_and_replace() {
        let s = run(
            r#"define.hello "there.is.a.box" \hello
               replace.in.text "colour" "color" there.is.a.text "colour me""#,
        );
        assert_eq!(s.scene().len(), 2);
        assert_eq!(text_of(&s, "id1").as_deref(), Some("color me"));
    }

    #[test]
    fn regex_replace_rewrites_commands() {
        let s = run(r#"replace.regex.in.commands "^box$" "there.is.a.box" box box"#);
        assert_eq!(s.scene().len(), 2);
        assert!(matches!(
            fails(r#"replace.regex "(" "x""#),
            Error::Syntax { .. }
        ));
    }

    #[test]
    fn defaults_change_settings() {
        let s = run("default.node_distance.2.5");
        assert_eq!(s.settings().node_distance, Length(2.5));
        assert!(matches!(fails("default.colour.1"), Error::UnsupportedCommand { .. }));
        assert!(matches!(fails("default.node_distance.-1"), Error::UnsupportedCommand { .. }));
    }

    #[test]
    fn transforms() {
        let s = run("there.is.a.box rotated.by.45 scaled.by.2");
        let style = &s.find_by_id("id0").unwrap().style;
        assert_eq!((style.rotate, style.scale), (45.0, 2.0));
        assert!(fails("there.is.a.box scaled.by.0").to_string().contains("invalid number"));
    }
}
