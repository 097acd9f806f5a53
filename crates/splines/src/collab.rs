//! Seams between edge routing and the stages around it: curve fitting,
//! clipping and installation, and the layout of auxiliary graphs.

use crate::classify::EdgeView;
use crate::graph::Graph;
use crate::types::*;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

/// Fits a curve through a corridor.
pub trait CurveFitter {
    /// Bezier control points (`3n + 1`) from `channel.start.p` to
    /// `channel.end.p` staying inside the boxes, or nothing when the boxes do
    /// not form a connected corridor. `spline` asks for a smooth curve
    /// instead of straight pieces.
    fn fit_channel(&mut self, channel: &Channel, spline: bool) -> Vec<Point>;

    /// Same inside a simple polygon that has `tail` and `head` among its vertices.
    fn fit_polygon(
        &mut self,
        tail: Point,
        head: Point,
        polygon: &[Point],
        polyline: bool,
    ) -> Vec<Point>;
}

/// Trims a fitted curve to its end nodes and stores it on the user edge.
pub trait CurveInstaller {
    fn clip_and_install(
        &mut self,
        graph: &mut Graph,
        view: &EdgeView,
        head: NodeId,
        points: &[Point],
    );
}

/// Ranks and positions a graph whose edges have only been pushed.
pub trait LayoutPipeline {
    fn layout(&mut self, graph: &mut Graph) -> Result<(), RouteError>;
}

/// The stages a routing pass calls out to.
pub struct Collaborators<'a> {
    pub fitter: &'a mut dyn CurveFitter,
    pub installer: &'a mut dyn CurveInstaller,
    pub pipeline: &'a mut dyn LayoutPipeline,
}

/// Straight pieces written as cubic segments.
pub fn polyline_to_bezier(points: &[Point]) -> Vec<Point> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut out = vec![first];
    for w in points.windows(2) {
        out.push(w[0].lerp(w[1], 1.0 / 3.0));
        out.push(w[0].lerp(w[1], 2.0 / 3.0));
        out.push(w[1]);
    }
    if out.len() == 1 {
        out.extend([first; 3]);
    }
    out
}

fn clamp_into(b: &Rect, p: Point) -> Point {
    Point::new(p.x.clamp(b.ll.x, b.ur.x), p.y.clamp(b.ll.y, b.ur.y))
}

/// Walks the corridor through the middle of each pair of touching boxes.
///
/// Every piece lies in one box, so the polyline never leaves the channel.
/// Smooth curves keep their control points in that same box.
#[derive(Debug, Clone, Default)]
pub struct BoxFitter;

impl BoxFitter {
    /// Waypoints with the box each piece leading to them lies in.
    fn waypoints(channel: &Channel) -> Option<Vec<(Point, Rect)>> {
        let first = *channel.boxes.first()?;
        let last = *channel.boxes.last()?;
        let mut way = vec![(channel.start.p, first)];
        let entry = clamp_into(&first, channel.start.p);
        if !entry.approx_eq(channel.start.p) {
            way.push((entry, first));
        }
        for pair in channel.boxes.windows(2) {
            let door = pair[0].intersection(&pair[1])?;
            way.push((door.center(), pair[0]));
        }
        let exit = clamp_into(&last, channel.end.p);
        way.push((exit, last));
        if !exit.approx_eq(channel.end.p) {
            way.push((channel.end.p, last));
        }
        way.dedup_by(|b, a| a.0.approx_eq(b.0));
        Some(way)
    }

    fn smooth(channel: &Channel, way: &[(Point, Rect)]) -> Vec<Point> {
        let n = way.len();
        let tangent = |i: usize| -> Point {
            let dir = |theta: f64| Point::new(theta.cos(), theta.sin());
            if i == 0 && channel.start.constrained {
                return dir(channel.start.theta);
            }
            if i == n - 1 && channel.end.constrained {
                return dir(channel.end.theta + std::f64::consts::PI);
            }
            let (a, b) = (way[i.saturating_sub(1)].0, way[(i + 1).min(n - 1)].0);
            let d = b - a;
            let len = a.distance(b);
            if len == 0.0 {
                Point::default()
            } else {
                Point::new(d.x / len, d.y / len)
            }
        };
        let mut out = vec![way[0].0];
        for i in 1..n {
            let (a, b, within) = (way[i - 1].0, way[i].0, way[i].1);
            let reach = a.distance(b) / 3.0;
            let (ta, tb) = (tangent(i - 1), tangent(i));
            let c1 = clamp_into(&within, Point::new(a.x + ta.x * reach, a.y + ta.y * reach));
            let c2 = clamp_into(&within, Point::new(b.x - tb.x * reach, b.y - tb.y * reach));
            // Pieces joining an end point to its box start outside the box.
            let (c1, c2) = if within.contains(a) && within.contains(b) {
                (c1, c2)
            } else {
                (a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0))
            };
            out.extend([c1, c2, b]);
        }
        out
    }
}

impl CurveFitter for BoxFitter {
    fn fit_channel(&mut self, channel: &Channel, spline: bool) -> Vec<Point> {
        let Some(way) = Self::waypoints(channel) else {
            return Vec::new();
        };
        if way.len() < 2 {
            return polyline_to_bezier(&[channel.start.p, channel.end.p]);
        }
        if spline {
            Self::smooth(channel, &way)
        } else {
            let points: Vec<Point> = way.iter().map(|w| w.0).collect();
            polyline_to_bezier(&points)
        }
    }

    fn fit_polygon(
        &mut self,
        tail: Point,
        head: Point,
        polygon: &[Point],
        polyline: bool,
    ) -> Vec<Point> {
        PolygonFitter.fit_polygon(tail, head, polygon, polyline)
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    const EPS: f64 = 1e-9;
    cross(a, b, p).abs() <= EPS
        && p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}

/// The segments cross at a point interior to both.
fn crosses(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (d1, d2) = (cross(c, d, a), cross(c, d, b));
    let (d3, d4) = (cross(a, b, c), cross(a, b, d));
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn inside_or_on(polygon: &[Point], p: Point) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        if on_segment(p, a, b) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
    }
    inside
}

/// Shortest path through a simple polygon along its visibility graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolygonFitter;

impl PolygonFitter {
    /// The segment stays inside or on the polygon. It is cut at every vertex
    /// it touches, and each piece between cuts has to lie inside.
    fn visible(polygon: &[Point], a: Point, b: Point) -> bool {
        let n = polygon.len();
        if (0..n).any(|i| crosses(a, b, polygon[i], polygon[(i + 1) % n])) {
            return false;
        }
        let d = b - a;
        let len2 = d.x * d.x + d.y * d.y;
        if len2 == 0.0 {
            return true;
        }
        let mut cuts = vec![0.0, 1.0];
        cuts.extend(
            polygon
                .iter()
                .filter(|&&v| on_segment(v, a, b))
                .map(|&v| ((v.x - a.x) * d.x + (v.y - a.y) * d.y) / len2),
        );
        cuts.sort_by(f64::total_cmp);
        cuts.windows(2)
            .filter(|w| w[1] - w[0] > 1e-9)
            .all(|w| inside_or_on(polygon, a.lerp(b, (w[0] + w[1]) / 2.0)))
    }

    /// Polygon vertices from `tail` to `head`, empty when either end is not
    /// a vertex.
    pub fn shortest_path(tail: Point, head: Point, polygon: &[Point]) -> Vec<Point> {
        let mut g = UnGraph::<Point, f64>::new_undirected();
        let ids: Vec<NodeIndex> = polygon.iter().map(|&p| g.add_node(p)).collect();
        let find = |p: Point| polygon.iter().position(|q| q.approx_eq(p)).map(|i| ids[i]);
        let (Some(start), Some(goal)) = (find(tail), find(head)) else {
            return Vec::new();
        };
        for i in 0..polygon.len() {
            for j in i + 1..polygon.len() {
                if Self::visible(polygon, polygon[i], polygon[j]) {
                    g.add_edge(ids[i], ids[j], polygon[i].distance(polygon[j]));
                }
            }
        }
        let target = g[goal];
        match astar(&g, start, |n| n == goal, |e| *e.weight(), |n| g[n].distance(target)) {
            Some((_, path)) => path.into_iter().map(|n| g[n]).collect(),
            None => Vec::new(),
        }
    }
}

impl CurveFitter for PolygonFitter {
    fn fit_channel(&mut self, channel: &Channel, spline: bool) -> Vec<Point> {
        BoxFitter.fit_channel(channel, spline)
    }

    fn fit_polygon(
        &mut self,
        tail: Point,
        head: Point,
        polygon: &[Point],
        _polyline: bool,
    ) -> Vec<Point> {
        polyline_to_bezier(&Self::shortest_path(tail, head, polygon))
    }
}

/// Keeps every corridor handed to the wrapped fitter.
#[derive(Debug, Clone, Default)]
pub struct RecordingFitter<F> {
    pub inner: F,
    pub channels: Vec<Channel>,
    pub polygons: Vec<Vec<Point>>,
}

impl<F: CurveFitter> RecordingFitter<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            channels: Vec::new(),
            polygons: Vec::new(),
        }
    }
}

impl<F: CurveFitter> CurveFitter for RecordingFitter<F> {
    fn fit_channel(&mut self, channel: &Channel, spline: bool) -> Vec<Point> {
        self.channels.push(channel.clone());
        self.inner.fit_channel(channel, spline)
    }

    fn fit_polygon(
        &mut self,
        tail: Point,
        head: Point,
        polygon: &[Point],
        polyline: bool,
    ) -> Vec<Point> {
        self.polygons.push(polygon.to_vec());
        self.inner.fit_polygon(tail, head, polygon, polyline)
    }
}
