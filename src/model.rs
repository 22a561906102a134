//! Scene-graph data model: objects, relationships, path items.
//!
//! Everything here is symbolic. Positions are expressed as relationships to
//! other objects and only become numbers in [`crate::geometry`].

use std::fmt;

use glam::{DVec2, dvec2};
use serde::{Deserialize, Serialize};

use crate::types::fmt_num;

/// Object identifier, `id<N>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectId(name.into())
    }

    pub fn numbered(n: u64) -> Self {
        ObjectId(format!("id{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The counter value for generated ids.
    pub fn number(&self) -> Option<u64> {
        self.0.strip_prefix("id")?.parse().ok()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

// ============================================================================
// Anchors and directions
// ============================================================================

/// Named point on a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    #[default]
    Center,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::North,
        Anchor::NorthEast,
        Anchor::East,
        Anchor::SouthEast,
        Anchor::South,
        Anchor::SouthWest,
        Anchor::West,
        Anchor::NorthWest,
        Anchor::Center,
    ];

    /// Parse `north.east`, `north east` or `northeast`.
    pub fn parse(words: &str) -> Option<Anchor> {
        let joined: String = words
            .chars()
            .filter(|c| !matches!(c, '.' | ' ' | '_'))
            .collect();
        Some(match joined.as_str() {
            "north" => Anchor::North,
            "northeast" => Anchor::NorthEast,
            "east" => Anchor::East,
            "southeast" => Anchor::SouthEast,
            "south" => Anchor::South,
            "southwest" => Anchor::SouthWest,
            "west" => Anchor::West,
            "northwest" => Anchor::NorthWest,
            "center" | "centre" => Anchor::Center,
            _ => return None,
        })
    }

    pub fn tikz_name(self) -> &'static str {
        match self {
            Anchor::North => "north",
            Anchor::NorthEast => "north east",
            Anchor::East => "east",
            Anchor::SouthEast => "south east",
            Anchor::South => "south",
            Anchor::SouthWest => "south west",
            Anchor::West => "west",
            Anchor::NorthWest => "north west",
            Anchor::Center => "center",
        }
    }

    /// Compass offset with components in {-1, 0, 1} (y up).
    pub fn unit(self) -> DVec2 {
        match self {
            Anchor::North => dvec2(0.0, 1.0),
            Anchor::NorthEast => dvec2(1.0, 1.0),
            Anchor::East => dvec2(1.0, 0.0),
            Anchor::SouthEast => dvec2(1.0, -1.0),
            Anchor::South => dvec2(0.0, -1.0),
            Anchor::SouthWest => dvec2(-1.0, -1.0),
            Anchor::West => dvec2(-1.0, 0.0),
            Anchor::NorthWest => dvec2(-1.0, 1.0),
            Anchor::Center => DVec2::ZERO,
        }
    }

    pub fn opposite(self) -> Anchor {
        match self {
            Anchor::North => Anchor::South,
            Anchor::NorthEast => Anchor::SouthWest,
            Anchor::East => Anchor::West,
            Anchor::SouthEast => Anchor::NorthWest,
            Anchor::South => Anchor::North,
            Anchor::SouthWest => Anchor::NorthEast,
            Anchor::West => Anchor::East,
            Anchor::NorthWest => Anchor::SouthEast,
            Anchor::Center => Anchor::Center,
        }
    }

    pub fn is_diagonal(self) -> bool {
        let u = self.unit();
        u.x != 0.0 && u.y != 0.0
    }
}

/// Positioning direction for `right=of` style placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Right,
    Left,
    Above,
    Below,
    AboveLeft,
    AboveRight,
    BelowLeft,
    BelowRight,
}

impl Direction {
    pub fn parse(words: &str) -> Option<Direction> {
        let words = words.replace(['.', '_'], " ");
        Some(match words.as_str() {
            "right" => Direction::Right,
            "left" => Direction::Left,
            "above" => Direction::Above,
            "below" => Direction::Below,
            "above left" => Direction::AboveLeft,
            "above right" => Direction::AboveRight,
            "below left" => Direction::BelowLeft,
            "below right" => Direction::BelowRight,
            _ => return None,
        })
    }

    pub fn tikz_name(self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Left => "left",
            Direction::Above => "above",
            Direction::Below => "below",
            Direction::AboveLeft => "above left",
            Direction::AboveRight => "above right",
            Direction::BelowLeft => "below left",
            Direction::BelowRight => "below right",
        }
    }

    /// The anchor of the reference object facing this direction.
    pub fn anchor(self) -> Anchor {
        match self {
            Direction::Right => Anchor::East,
            Direction::Left => Anchor::West,
            Direction::Above => Anchor::North,
            Direction::Below => Anchor::South,
            Direction::AboveLeft => Anchor::NorthWest,
            Direction::AboveRight => Anchor::NorthEast,
            Direction::BelowLeft => Anchor::SouthWest,
            Direction::BelowRight => Anchor::SouthEast,
        }
    }

    pub fn unit(self) -> DVec2 {
        self.anchor().unit()
    }
}

// ============================================================================
// Relationships
// ============================================================================

/// `name.anchor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub name: ObjectId,
    pub anchor: Anchor,
}

impl AnchorRef {
    pub fn new(name: impl Into<ObjectId>, anchor: Anchor) -> Self {
        AnchorRef {
            name: name.into(),
            anchor,
        }
    }
}

/// How a box, text or brace endpoint is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum Relationship {
    AbsoluteCoordinate {
        x: f64,
        y: f64,
    },
    NamedReference {
        name: ObjectId,
        anchor: Anchor,
    },
    /// x of `first`, y of `second`.
    Intersection {
        first: AnchorRef,
        second: AnchorRef,
    },
    DirectionalOffset {
        direction: Direction,
        /// `None` uses the session's node distance.
        distance: Option<f64>,
        from: ObjectId,
    },
}

impl Relationship {
    pub fn references(&self) -> Vec<&ObjectId> {
        match self {
            Relationship::AbsoluteCoordinate { .. } => vec![],
            Relationship::NamedReference { name, .. } => vec![name],
            Relationship::Intersection { first, second } => vec![&first.name, &second.name],
            Relationship::DirectionalOffset { from, .. } => vec![from],
        }
    }

    pub fn rename(&mut self, rename: &impl Fn(&ObjectId) -> Option<ObjectId>) {
        let apply = |id: &mut ObjectId| {
            if let Some(new) = rename(id) {
                *id = new;
            }
        };
        match self {
            Relationship::AbsoluteCoordinate { .. } => {}
            Relationship::NamedReference { name, .. } => apply(name),
            Relationship::Intersection { first, second } => {
                apply(&mut first.name);
                apply(&mut second.name);
            }
            Relationship::DirectionalOffset { from, .. } => apply(from),
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Where along a line an annotation sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotatePosition {
    AtStart,
    NearStart,
    #[default]
    Midway,
    NearEnd,
    AtEnd,
}

impl AnnotatePosition {
    pub fn parse(words: &str) -> Option<Self> {
        Some(match words.replace('.', " ").as_str() {
            "at start" => AnnotatePosition::AtStart,
            "near start" => AnnotatePosition::NearStart,
            "midway" => AnnotatePosition::Midway,
            "near end" => AnnotatePosition::NearEnd,
            "at end" => AnnotatePosition::AtEnd,
            _ => return None,
        })
    }

    /// Blend factor of the start point: 1.0 is the start, 0.0 the end.
    pub fn fraction(self) -> f64 {
        match self {
            AnnotatePosition::AtStart => 1.0,
            AnnotatePosition::NearStart => 0.8,
            AnnotatePosition::Midway => 0.5,
            AnnotatePosition::NearEnd => 0.2,
            AnnotatePosition::AtEnd => 0.0,
        }
    }

    pub fn tikz_name(self) -> &'static str {
        match self {
            AnnotatePosition::AtStart => "at start",
            AnnotatePosition::NearStart => "near start",
            AnnotatePosition::Midway => "midway",
            AnnotatePosition::NearEnd => "near end",
            AnnotatePosition::AtEnd => "at end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotate {
    pub text: String,
    pub position: AnnotatePosition,
    pub sloped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum PathItem {
    NodeName {
        name: ObjectId,
        anchor: Option<Anchor>,
        xshift: Option<f64>,
        yshift: Option<f64>,
    },
    Coordinate {
        x: f64,
        y: f64,
        relative: bool,
    },
    Intersection {
        first: AnchorRef,
        second: AnchorRef,
    },
    /// Names the current position.
    Point {
        id: ObjectId,
    },
    Line {
        in_angle: Option<f64>,
        out_angle: Option<f64>,
        annotates: Vec<Annotate>,
    },
    Rectangle,
    Arc {
        start: f64,
        end: f64,
        radius: f64,
    },
    Cycle,
}

impl PathItem {
    pub fn node(name: impl Into<ObjectId>) -> Self {
        PathItem::NodeName {
            name: name.into(),
            anchor: None,
            xshift: None,
            yshift: None,
        }
    }

    pub fn straight_line() -> Self {
        PathItem::Line {
            in_angle: None,
            out_angle: None,
            annotates: Vec::new(),
        }
    }

    /// Items that establish a current position.
    pub fn is_position(&self) -> bool {
        matches!(
            self,
            PathItem::NodeName { .. }
                | PathItem::Coordinate { .. }
                | PathItem::Intersection { .. }
                | PathItem::Point { .. }
                | PathItem::Cycle
        )
    }

    /// Items that draw from the current position to the next one.
    pub fn is_segment(&self) -> bool {
        matches!(
            self,
            PathItem::Line { .. } | PathItem::Rectangle | PathItem::Arc { .. }
        )
    }

    /// Names declared by `Point` items; they stay local to their path.
    pub fn marks(items: &[PathItem]) -> Vec<ObjectId> {
        items
            .iter()
            .filter_map(|item| match item {
                PathItem::Point { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn references(&self) -> Vec<&ObjectId> {
        match self {
            PathItem::NodeName { name, .. } => vec![name],
            PathItem::Intersection { first, second } => vec![&first.name, &second.name],
            _ => vec![],
        }
    }
}

// ============================================================================
// Style
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dash {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl Dash {
    pub fn parse(s: &str) -> Option<Dash> {
        Some(match s {
            "solid" => Dash::Solid,
            "dashed" => Dash::Dashed,
            "dotted" => Dash::Dotted,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Dash::Solid => "solid",
            Dash::Dashed => "dashed",
            Dash::Dotted => "dotted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub color: Option<String>,
    pub fill: Option<String>,
    /// Stroke width in points.
    pub line_width: Option<f64>,
    pub dash: Dash,
    /// Corner radius in world units.
    pub rounded_corners: Option<f64>,
    pub scale: f64,
    /// Degrees, counter-clockwise.
    pub rotate: f64,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            color: None,
            fill: None,
            line_width: None,
            dash: Dash::Solid,
            rounded_corners: None,
            scale: 1.0,
            rotate: 0.0,
        }
    }
}

/// Box silhouette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxShape {
    #[default]
    Rectangle,
    Circle,
    Ellipse,
}

impl BoxShape {
    pub fn parse(s: &str) -> Option<BoxShape> {
        Some(match s {
            "rectangle" | "box" | "node" => BoxShape::Rectangle,
            "circle" => BoxShape::Circle,
            "ellipse" => BoxShape::Ellipse,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BoxShape::Rectangle => "rectangle",
            BoxShape::Circle => "circle",
            BoxShape::Ellipse => "ellipse",
        }
    }
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Box,
    Text,
    Path,
    Brace,
}

impl ObjectKind {
    pub fn parse(word: &str) -> Option<ObjectKind> {
        Some(match word {
            "box" | "boxes" | "rectangle" | "rectangles" | "circle" | "circles" | "ellipse"
            | "ellipses" | "node" | "nodes" => ObjectKind::Box,
            "text" | "texts" => ObjectKind::Text,
            "path" | "paths" | "line" | "lines" => ObjectKind::Path,
            "brace" | "braces" => ObjectKind::Brace,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Box => "box",
            ObjectKind::Text => "text",
            ObjectKind::Path => "path",
            ObjectKind::Brace => "brace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
    Box {
        shape: BoxShape,
        placement: Option<Relationship>,
    },
    Text {
        placement: Option<Relationship>,
    },
    Path {
        items: Vec<PathItem>,
    },
    Brace {
        from: Relationship,
        to: Relationship,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    #[serde(flatten)]
    pub body: Body,
    pub text: Option<String>,
    pub style: Style,
}

/// Why an attribute write was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrError {
    Unknown(String),
    Invalid { attr: String, value: String },
    NotApplicable { attr: String, kind: ObjectKind },
}

impl fmt::Display for AttrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrError::Unknown(attr) => write!(f, "unknown attribute `{attr}`"),
            AttrError::Invalid { attr, value } => {
                write!(f, "`{value}` is not a valid value for `{attr}`")
            }
            AttrError::NotApplicable { attr, kind } => {
                write!(f, "a {} has no `{attr}`", kind.name())
            }
        }
    }
}

impl Object {
    pub fn new(id: ObjectId, body: Body) -> Self {
        Object {
            id,
            body,
            text: None,
            style: Style::default(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self.body {
            Body::Box { .. } => ObjectKind::Box,
            Body::Text { .. } => ObjectKind::Text,
            Body::Path { .. } => ObjectKind::Path,
            Body::Brace { .. } => ObjectKind::Brace,
        }
    }

    pub fn placement(&self) -> Option<&Relationship> {
        match &self.body {
            Body::Box { placement, .. } | Body::Text { placement } => placement.as_ref(),
            _ => None,
        }
    }

    /// Set the placement of a box or text.
    pub fn place(&mut self, relationship: Relationship) -> Result<(), AttrError> {
        match &mut self.body {
            Body::Box { placement, .. } | Body::Text { placement } => {
                *placement = Some(relationship);
                Ok(())
            }
            _ => Err(AttrError::NotApplicable {
                attr: "placement".to_string(),
                kind: self.kind(),
            }),
        }
    }

    pub fn path_items(&self) -> Option<&[PathItem]> {
        match &self.body {
            Body::Path { items } => Some(items),
            _ => None,
        }
    }

    /// Every id this object depends on.
    pub fn references(&self) -> Vec<&ObjectId> {
        match &self.body {
            Body::Box { placement, .. } | Body::Text { placement } => placement
                .as_ref()
                .map(Relationship::references)
                .unwrap_or_default(),
            Body::Path { items } => {
                let marks = PathItem::marks(items);
                items
                    .iter()
                    .flat_map(PathItem::references)
                    .filter(|r| !marks.contains(*r))
                    .collect()
            }
            Body::Brace { from, to } => {
                let mut refs = from.references();
                refs.extend(to.references());
                refs
            }
        }
    }

    /// Rewrite referenced ids; `rename` returns `None` to keep an id.
    pub fn rename_references(&mut self, rename: &impl Fn(&ObjectId) -> Option<ObjectId>) {
        match &mut self.body {
            Body::Box { placement, .. } | Body::Text { placement } => {
                if let Some(rel) = placement {
                    rel.rename(rename);
                }
            }
            Body::Path { items } => {
                let marks = PathItem::marks(items);
                for item in items {
                    match item {
                        PathItem::NodeName { name, .. } => {
                            if marks.contains(name) {
                                continue;
                            }
                            if let Some(new) = rename(name) {
                                *name = new;
                            }
                        }
                        PathItem::Intersection { first, second } => {
                            for r in [first, second] {
                                if let Some(new) = rename(&r.name) {
                                    r.name = new;
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Body::Brace { from, to } => {
                from.rename(rename);
                to.rename(rename);
            }
        }
    }

    /// Read an attribute as text, for filters.
    pub fn attr(&self, name: &str) -> Option<String> {
        let style = &self.style;
        match name {
            "id" => Some(self.id.to_string()),
            "kind" => Some(self.kind().name().to_string()),
            "text" => self.text.clone(),
            "color" => style.color.clone(),
            "fill" => style.fill.clone(),
            "line_width" => style.line_width.map(fmt_num),
            "dash" => Some(style.dash.name().to_string()),
            "rounded_corners" => style.rounded_corners.map(fmt_num),
            "scale" => Some(fmt_num(style.scale)),
            "rotate" => Some(fmt_num(style.rotate)),
            "shape" => match &self.body {
                Body::Box { shape, .. } => Some(shape.name().to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Write an attribute from text, for `with`/`set`/`let`.
    pub fn set_attr(&mut self, name: &str, value: &str) -> Result<(), AttrError> {
        let invalid = || AttrError::Invalid {
            attr: name.to_string(),
            value: value.to_string(),
        };
        let number = || -> Result<f64, AttrError> {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(invalid)
        };
        let style = &mut self.style;
        match name {
            "text" => self.text = Some(value.to_string()),
            "color" => style.color = Some(value.to_string()),
            "fill" => style.fill = Some(value.to_string()),
            "line_width" => style.line_width = Some(number()?.abs()),
            "dash" => style.dash = Dash::parse(value).ok_or_else(invalid)?,
            "rounded_corners" => style.rounded_corners = Some(number()?.abs()),
            "scale" => {
                let scale = number()?;
                if scale <= 0.0 {
                    return Err(invalid());
                }
                style.scale = scale;
            }
            "rotate" => style.rotate = number()?,
            "shape" => {
                let kind = self.kind();
                match &mut self.body {
                    Body::Box { shape, .. } => *shape = BoxShape::parse(value).ok_or_else(invalid)?,
                    _ => {
                        return Err(AttrError::NotApplicable {
                            attr: name.to_string(),
                            kind,
                        });
                    }
                }
            }
            "id" | "kind" => {
                return Err(AttrError::NotApplicable {
                    attr: name.to_string(),
                    kind: self.kind(),
                });
            }
            other => return Err(AttrError::Unknown(other.to_string())),
        }
        Ok(())
    }
}

/// Attribute names accepted by [`Object::set_attr`].
pub const ATTRIBUTES: &[&str] = &[
    "text",
    "color",
    "fill",
    "line_width",
    "dash",
    "rounded_corners",
    "scale",
    "rotate",
    "shape",
];
