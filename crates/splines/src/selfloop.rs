use crate::classify::{EdgeClass, EdgeView};
use crate::graph::Node;
use crate::route::RoutePass;
use crate::types::*;

/// Side values of the eight compass points of a node, clockwise from the
/// top left corner.
const COMPASS: [u8; 8] = [12, 4, 6, 2, 3, 1, 9, 8];

/// Two digit code of the compass points a loop joins, tail first; 0 when a
/// side is not one of the eight points.
fn side_pair(tail: Side, head: Side) -> u8 {
    let index = |s: Side| COMPASS.iter().position(|&v| v == s.bits());
    match (index(tail), index(head)) {
        (Some(t), Some(h)) => (t as u8 + 1) * 10 + h as u8 + 1,
        _ => 0,
    }
}

enum LoopSide {
    Right,
    Left,
    Top,
    Bottom,
}

fn loop_side(tp: &Port, hp: &Port) -> LoopSide {
    let (ts, hs) = (tp.side, hp.side);
    let right = (!tp.defined && !hp.defined)
        || (!ts.intersects(Side::LEFT)
            && !hs.intersects(Side::LEFT)
            && (ts != hs || !ts.intersects(Side::TOP | Side::BOTTOM)));
    if right {
        LoopSide::Right
    } else if ts.intersects(Side::LEFT) || hs.intersects(Side::LEFT) {
        if ts.intersects(Side::RIGHT) || hs.intersects(Side::RIGHT) {
            LoopSide::Top
        } else {
            LoopSide::Left
        }
    } else if ts.intersects(Side::TOP) {
        LoopSide::Top
    } else {
        LoopSide::Bottom
    }
}

/// Geometry shared by every loop of one class.
struct LoopFrame {
    np: Point,
    tp: Point,
    hp: Point,
    pair: u8,
}

impl LoopFrame {
    fn new(node: &Node, e0: &EdgeView) -> Self {
        let np = node.coord;
        Self {
            np,
            tp: np + e0.tail_port.p,
            hp: np + e0.head_port.p,
            pair: side_pair(e0.tail_port.side, e0.head_port.side),
        }
    }
}

impl RoutePass<'_, '_> {
    /// Route a class of loops on one node.
    pub fn make_self_edges(&mut self, class: &[EdgeClass]) -> Result<(), RouteError> {
        let e0 = EdgeView::of(self.graph, class[0].edge);
        let n = e0.tail;
        let sizey = (self.loop_room(n)? / 2) as f64;
        let sizex = self.info.multisep;
        match loop_side(&e0.tail_port, &e0.head_port) {
            LoopSide::Right => self.self_right(class, &e0, sizex, sizey),
            LoopSide::Left => self.self_left(class, &e0, sizex, sizey),
            LoopSide::Top => self.self_top(class, &e0, sizex, sizey),
            LoopSide::Bottom => self.self_bottom(class, &e0, sizex, sizey),
        }
        Ok(())
    }

    /// Vertical room around a node for its loops, in whole points.
    fn loop_room(&self, n: NodeId) -> Result<i64, RouteError> {
        let node = self.graph.node(n);
        let (r, y, ht) = (node.rank, node.coord.y, node.ht as i64);
        let up = if r > 0 {
            Some((self.graph.node(self.graph.rank_leader(r - 1)?).coord.y - y) as i64)
        } else {
            None
        };
        let down = if r < self.graph.max_rank() {
            Some((y - self.graph.node(self.graph.rank_leader(r + 1)?).coord.y) as i64)
        } else {
            None
        };
        Ok(match (up, down) {
            (Some(up), Some(down)) => up.min(down),
            (Some(side), None) | (None, Some(side)) => side.min(ht),
            (None, None) => ht,
        })
    }

    fn label_dims_of(&self, view: &EdgeView) -> Option<Size> {
        self.graph
            .edge(view.orig)
            .label
            .map(|l| self.graph.label_dims(&l))
    }

    fn self_right(&mut self, class: &[EdgeClass], e0: &EdgeView, stepx: f64, sizey: f64) {
        let node = self.graph.node(e0.tail);
        let f = LoopFrame::new(node, e0);
        let (tp, hp, np) = (f.tp, f.hp, f.np);
        let stepy = (sizey / 2.0 / class.len() as f64).max(2.0);
        let mut sgn = if tp.y >= hp.y { 1.0 } else { -1.0 };
        if matches!(f.pair, 32 | 65) && tp.y == hp.y {
            sgn = -sgn;
        }
        let mut dx = node.rw;
        let mut dy = 0.0;
        let mut tx = dx.min(3.0 * (np.x + dx - tp.x));
        let mut hx = dx.min(3.0 * (np.x + dx - hp.x));

        for c in class {
            dx += stepx;
            tx += stepx;
            hx += stepx;
            dy += sgn * stepy;
            let points = [
                tp,
                Point::new(tp.x + tx / 3.0, tp.y + dy),
                Point::new(np.x + dx, tp.y + dy),
                Point::new(np.x + dx, (tp.y + hp.y) / 2.0),
                Point::new(np.x + dx, hp.y - dy),
                Point::new(hp.x + hx / 3.0, hp.y - dy),
                hp,
            ];
            let view = EdgeView::of(self.graph, c.edge);
            if let Some(size) = self.label_dims_of(&view) {
                self.set_label_pos(view.orig, Point::new(np.x + dx + size.width / 2.0, np.y));
                if size.width > stepx {
                    dx += size.width - stepx;
                }
            }
            self.install(&view, view.head, &points);
        }
    }

    fn self_left(&mut self, class: &[EdgeClass], e0: &EdgeView, stepx: f64, sizey: f64) {
        let node = self.graph.node(e0.tail);
        let f = LoopFrame::new(node, e0);
        let (tp, hp, np) = (f.tp, f.hp, f.np);
        let stepy = (sizey / 2.0 / class.len() as f64).max(2.0);
        let mut sgn = if tp.y >= hp.y { 1.0 } else { -1.0 };
        if matches!(f.pair, 12 | 67) && tp.y == hp.y {
            sgn = -sgn;
        }
        let mut dx = node.lw;
        let mut dy = 0.0;
        let mut tx = dx.min(3.0 * (tp.x + dx - np.x));
        let mut hx = dx.min(3.0 * (hp.x + dx - np.x));

        for c in class {
            dx += stepx;
            tx += stepx;
            hx += stepx;
            dy += sgn * stepy;
            let points = [
                tp,
                Point::new(tp.x - tx / 3.0, tp.y + dy),
                Point::new(np.x - dx, tp.y + dy),
                Point::new(np.x - dx, (tp.y + hp.y) / 2.0),
                Point::new(np.x - dx, hp.y - dy),
                Point::new(hp.x - hx / 3.0, hp.y - dy),
                hp,
            ];
            let view = EdgeView::of(self.graph, c.edge);
            if let Some(size) = self.label_dims_of(&view) {
                self.set_label_pos(view.orig, Point::new(np.x - dx - size.width / 2.0, np.y));
                if size.width > stepx {
                    dx += size.width - stepx;
                }
            }
            self.install(&view, view.head, &points);
        }
    }

    fn self_top(&mut self, class: &[EdgeClass], e0: &EdgeView, sizex: f64, stepy: f64) {
        let node = self.graph.node(e0.tail);
        let f = LoopFrame::new(node, e0);
        let (tp, hp, np) = (f.tp, f.hp, f.np);
        let (lw, rw) = (node.lw, node.rw);
        let stepx = (sizex / 2.0 / class.len() as f64).max(2.0);
        let sgn = if tp.x >= hp.x { 1.0 } else { -1.0 };
        let mut dy = node.ht / 2.0;
        let spread = (lw - (np.x - tp.x)) + (rw - (hp.x - np.x));
        let mut dx = match f.pair {
            15 => sgn * (rw - (hp.x - np.x) + stepx),
            38 => sgn * (lw - (np.x - hp.x) + stepx),
            41 | 48 => sgn * (rw - (tp.x - np.x) + stepx),
            14 | 37 | 47 | 51 | 57 | 58 => sgn * (spread / 3.0),
            73 => sgn * (lw - (np.x - tp.x) + stepx),
            83 => sgn * (lw - (np.x - tp.x)),
            84 => sgn * (spread / 2.0 + stepx),
            74 | 75 | 85 => sgn * (spread / 2.0 + 2.0 * stepx),
            _ => 0.0,
        };
        let mut ty = dy.min(3.0 * (np.y + dy - tp.y));
        let mut hy = dy.min(3.0 * (np.y + dy - hp.y));

        for c in class {
            dy += stepy;
            ty += stepy;
            hy += stepy;
            dx += sgn * stepx;
            let points = [
                tp,
                Point::new(tp.x + dx, tp.y + ty / 3.0),
                Point::new(tp.x + dx, np.y + dy),
                Point::new((tp.x + hp.x) / 2.0, np.y + dy),
                Point::new(hp.x - dx, np.y + dy),
                Point::new(hp.x - dx, hp.y + hy / 3.0),
                hp,
            ];
            let view = EdgeView::of(self.graph, c.edge);
            if let Some(size) = self.label_dims_of(&view) {
                self.set_label_pos(view.orig, Point::new(np.x, np.y + dy + size.height / 2.0));
                if size.height > stepy {
                    dy += size.height - stepy;
                }
            }
            self.install(&view, view.head, &points);
        }
    }

    fn self_bottom(&mut self, class: &[EdgeClass], e0: &EdgeView, sizex: f64, stepy: f64) {
        let node = self.graph.node(e0.tail);
        let f = LoopFrame::new(node, e0);
        let (tp, hp, np) = (f.tp, f.hp, f.np);
        let stepx = (sizex / 2.0 / class.len() as f64).max(2.0);
        let mut sgn = if tp.x >= hp.x { 1.0 } else { -1.0 };
        if f.pair == 67 {
            sgn = -sgn;
        }
        let mut dy = node.ht / 2.0;
        let mut dx = 0.0;
        let mut ty = dy.min(3.0 * (tp.y + dy - np.y));
        let mut hy = dy.min(3.0 * (hp.y + dy - np.y));

        for c in class {
            dy += stepy;
            ty += stepy;
            hy += stepy;
            dx += sgn * stepx;
            let points = [
                tp,
                Point::new(tp.x + dx, tp.y - ty / 3.0),
                Point::new(tp.x + dx, np.y - dy),
                Point::new((tp.x + hp.x) / 2.0, np.y - dy),
                Point::new(hp.x - dx, np.y - dy),
                Point::new(hp.x - dx, hp.y - hy / 3.0),
                hp,
            ];
            let view = EdgeView::of(self.graph, c.edge);
            if let Some(size) = self.label_dims_of(&view) {
                self.set_label_pos(view.orig, Point::new(np.x, np.y - dy - size.height / 2.0));
                if size.height > stepy {
                    dy += size.height - stepy;
                }
            }
            self.install(&view, view.head, &points);
        }
    }
}
