use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, BitOr, Sub};
use thiserror::Error;

/// Minimum width of a routing box.
pub const MINW: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Equal within a thousandth of a point.
    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() < 0.001 && (self.y - other.y).abs() < 0.001
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Swap width and height, for drawings rotated by 90 degrees.
    pub fn transposed(self) -> Size {
        Size::new(self.height, self.width)
    }
}

/// Axis-aligned box given by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub ll: Point,
    pub ur: Point,
}

impl Rect {
    pub const fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self {
            ll: Point::new(llx, lly),
            ur: Point::new(urx, ury),
        }
    }

    pub fn around(center: Point, size: Size) -> Self {
        Rect::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            center.x + size.width / 2.0,
            center.y + size.height / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.ur.x - self.ll.x
    }

    pub fn height(&self) -> f64 {
        self.ur.y - self.ll.y
    }

    pub fn center(&self) -> Point {
        Point::new((self.ll.x + self.ur.x) / 2.0, (self.ll.y + self.ur.y) / 2.0)
    }

    /// Corners are ordered. Zero-width or zero-height boxes are valid.
    pub fn is_valid(&self) -> bool {
        self.ll.x <= self.ur.x && self.ll.y <= self.ur.y
    }

    /// Strictly positive width and height.
    pub fn is_proper(&self) -> bool {
        self.ll.x < self.ur.x && self.ll.y < self.ur.y
    }

    /// Interiors overlap. Boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.ll.x < other.ur.x
            && other.ll.x < self.ur.x
            && self.ll.y < other.ur.y
            && other.ll.y < self.ur.y
    }

    /// Closed intersection, `None` when the boxes neither overlap nor touch.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.ll.x.max(other.ll.x),
            self.ll.y.max(other.ll.y),
            self.ur.x.min(other.ur.x),
            self.ur.y.min(other.ur.y),
        );
        r.is_valid().then_some(r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.ll.x.min(other.ll.x),
            self.ll.y.min(other.ll.y),
            self.ur.x.max(other.ur.x),
            self.ur.y.max(other.ur.y),
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        self.ll.x <= p.x && p.x <= self.ur.x && self.ll.y <= p.y && p.y <= self.ur.y
    }

    /// Re-center a box narrower than `min_width` so it is exactly that wide.
    pub fn enforce_min_width(&mut self, min_width: f64) {
        if self.ll.x + min_width > self.ur.x {
            let x = ((self.ll.x + self.ur.x) / 2.0).trunc();
            self.ll.x = x - min_width / 2.0;
            self.ur.x = x + min_width / 2.0;
        }
    }
}

/// Node sides a port may face, as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Side(u8);

impl Side {
    pub const NONE: Side = Side(0);
    pub const BOTTOM: Side = Side(1);
    pub const RIGHT: Side = Side(2);
    pub const TOP: Side = Side(4);
    pub const LEFT: Side = Side(8);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Shares at least one side with `other`.
    pub const fn intersects(self, other: Side) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Side {
    type Output = Side;

    fn bitor(self, rhs: Side) -> Side {
        Side(self.0 | rhs.0)
    }
}

/// Attachment point of an edge on a node, relative to the node center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub p: Point,
    pub side: Side,
    pub theta: f64,
    pub constrained: bool,
    /// Clip the curve at the node boundary.
    pub clip: bool,
    pub defined: bool,
}

impl Default for Port {
    fn default() -> Self {
        Self {
            p: Point::default(),
            side: Side::NONE,
            theta: 0.0,
            constrained: false,
            clip: true,
            defined: false,
        }
    }
}

impl Port {
    pub fn at(p: Point, side: Side) -> Self {
        Self {
            p,
            side,
            defined: true,
            ..Default::default()
        }
    }

    /// Undefined ports first, then by integer x offset, then integer y offset.
    pub fn compare(&self, other: &Port) -> Ordering {
        match (self.defined, other.defined) {
            (_, false) => {
                if self.defined {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            }
            (false, true) => Ordering::Less,
            (true, true) => {
                let dx = (self.p.x - other.p.x) as i64;
                if dx != 0 {
                    return dx.cmp(&0);
                }
                ((self.p.y - other.p.y) as i64).cmp(&0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Label {
    pub size: Size,
    pub pos: Option<Point>,
}

impl Label {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Size::new(width, height),
            pos: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub usize);

/// One end of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    pub p: Point,
    pub theta: f64,
    pub constrained: bool,
}

/// Boxes next to a node where a channel starts or ends.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathEnd {
    /// Maximal usable rectangle of the node.
    pub nb: Rect,
    pub np: Point,
    pub sidemask: Side,
    pub boxes: Vec<Rect>,
}

impl PathEnd {
    pub fn new(nb: Rect) -> Self {
        Self {
            nb,
            ..Default::default()
        }
    }

    pub fn last_box(&self) -> Rect {
        self.boxes.last().copied().unwrap_or(self.nb)
    }

    pub fn push_proper(&mut self, b: Rect) {
        if b.is_proper() {
            self.boxes.push(b);
        }
    }
}

/// Ordered corridor of boxes from the tail end to the head end.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Channel {
    pub start: Endpoint,
    pub end: Endpoint,
    pub boxes: Vec<Rect>,
}

impl Channel {
    /// Boxes without positive area are dropped.
    pub fn add_box(&mut self, b: Rect) {
        if b.is_proper() {
            self.boxes.push(b);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Spline,
    Polyline,
    Line,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub style: EdgeStyle,
    /// Minimum width of a channel box.
    pub min_width: f64,
    /// Virtual nodes in a vertical run before it is drawn as a straight segment.
    pub straight_run_min: usize,
    /// Same, when the graph carries edge labels.
    pub straight_run_min_labeled: usize,
    /// Gap between stacked labels of adjacent flat edges.
    pub label_space: f64,
    /// Margin added around a node before its neighbors are considered.
    pub box_fudge: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            style: EdgeStyle::Spline,
            min_width: MINW,
            straight_run_min: 3,
            straight_run_min_labeled: 5,
            label_space: 6.0,
            box_fudge: 4.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("rank {rank} has no nodes")]
    EmptyRank { rank: usize },
    #[error("node {node:?} is on rank {rank}, outside the graph's ranks")]
    RankOutOfRange { node: NodeId, rank: usize },
    #[error("edge {edge:?} has a broken virtual chain")]
    BrokenChain { edge: EdgeId },
    #[error("virtual node {node:?} has no outgoing edge")]
    DeadEnd { node: NodeId },
    #[error("edge {edge:?} needs a label rank above rank 0")]
    NoLabelRank { edge: EdgeId },
    #[error("auxiliary layout failed: {0}")]
    Pipeline(String),
}
