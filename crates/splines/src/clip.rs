use crate::classify::EdgeView;
use crate::collab::CurveInstaller;
use crate::graph::Graph;
use crate::types::*;

const BISECT_STEPS: usize = 24;

fn bezier_at(seg: &[Point], t: f64) -> Point {
    let a = seg[0].lerp(seg[1], t);
    let b = seg[1].lerp(seg[2], t);
    let c = seg[2].lerp(seg[3], t);
    a.lerp(b, t).lerp(b.lerp(c, t), t)
}

/// Split a cubic segment at `t`.
fn split(seg: &[Point], t: f64) -> ([Point; 4], [Point; 4]) {
    let (p01, p12, p23) = (seg[0].lerp(seg[1], t), seg[1].lerp(seg[2], t), seg[2].lerp(seg[3], t));
    let (p012, p123) = (p01.lerp(p12, t), p12.lerp(p23, t));
    let mid = p012.lerp(p123, t);
    ([seg[0], p01, p012, mid], [mid, p123, p23, seg[3]])
}

/// Parameter where a segment leaves `inside`, given it starts inside and ends outside.
fn boundary(seg: &[Point], inside: impl Fn(Point) -> bool) -> f64 {
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..BISECT_STEPS {
        let mid = (lo + hi) / 2.0;
        if inside(bezier_at(seg, mid)) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// Does the curve get cut back at node `n`?
fn clips_at(graph: &Graph, orig: EdgeId, n: NodeId, start: bool) -> bool {
    if graph.node(n).is_virtual() {
        return false;
    }
    let e = graph.edge(orig);
    if e.tail == e.head {
        return if start { e.tail_port.clip } else { e.head_port.clip };
    }
    if n == e.tail {
        e.tail_port.clip
    } else if n == e.head {
        e.head_port.clip
    } else {
        false
    }
}

/// Cuts a curve back to the rectangles of its end nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RectClipper;

impl RectClipper {
    pub fn clip(graph: &Graph, view: &EdgeView, head: NodeId, points: &[Point]) -> Vec<Point> {
        let mut ps = points.to_vec();
        if ps.len() < 4 || ps.len() % 3 != 1 {
            return ps;
        }

        if clips_at(graph, view.orig, view.tail, true) {
            let tb = graph.node(view.tail).bounds();
            if tb.contains(ps[0]) {
                let segs = (ps.len() - 1) / 3;
                if let Some(i) = (0..segs).find(|&i| !tb.contains(ps[3 * i + 3])) {
                    let t = boundary(&ps[3 * i..3 * i + 4], |p| tb.contains(p));
                    let (_, right) = split(&ps[3 * i..3 * i + 4], t);
                    let mut clipped = right.to_vec();
                    clipped.extend_from_slice(&ps[3 * i + 4..]);
                    ps = clipped;
                }
            }
        }

        if clips_at(graph, view.orig, head, false) {
            let hb = graph.node(head).bounds();
            if hb.contains(ps[ps.len() - 1]) {
                let segs = (ps.len() - 1) / 3;
                if let Some(i) = (0..segs).rev().find(|&i| !hb.contains(ps[3 * i])) {
                    let seg = &ps[3 * i..3 * i + 4];
                    let rev = [seg[3], seg[2], seg[1], seg[0]];
                    let t = boundary(&rev, |p| hb.contains(p));
                    let (_, right) = split(&rev, t);
                    let mut clipped = ps[..3 * i].to_vec();
                    clipped.extend(right.iter().rev());
                    ps = clipped;
                }
            }
        }
        ps
    }
}

impl CurveInstaller for RectClipper {
    fn clip_and_install(
        &mut self,
        graph: &mut Graph,
        view: &EdgeView,
        head: NodeId,
        points: &[Point],
    ) {
        let ps = Self::clip(graph, view, head, points);
        for &p in &ps {
            graph.grow_bb(Rect::new(p.x, p.y, p.x, p.y));
        }
        graph.edge_mut(view.orig).spline = Some(ps);
    }
}
