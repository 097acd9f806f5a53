use crate::classify::EdgeView;
use crate::graph::Graph;
use crate::route::RoutePass;
use crate::types::*;
use std::f64::consts::PI;

/// Rank boxes, computed once per pass on first use.
#[derive(Debug, Clone, Default)]
pub(crate) struct RankCache {
    boxes: Vec<Option<Rect>>,
}

impl RankCache {
    pub fn new(ranks: usize) -> Self {
        Self {
            boxes: vec![None; ranks],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    Regular,
    Flat,
}

impl RoutePass<'_, '_> {
    /// The inter-rank space below rank `r`, spanning the whole drawing.
    pub fn rank_box(&mut self, r: usize) -> Result<Rect, RouteError> {
        if let Some(Some(b)) = self.info.ranks.boxes.get(r) {
            return Ok(*b);
        }
        let left0 = self.graph.rank_leader(r)?;
        let left1 = self.graph.rank_leader(r + 1)?;
        let b = Rect::new(
            self.info.left_bound,
            self.graph.node(left1).coord.y + self.graph.ranks[r + 1].ht2,
            self.info.right_bound,
            self.graph.node(left0).coord.y - self.graph.ranks[r].ht1,
        );
        if let Some(slot) = self.info.ranks.boxes.get_mut(r) {
            *slot = Some(b);
        }
        Ok(b)
    }

    /// All the space on `vn`'s rank up to its nearest blocking neighbors.
    ///
    /// `ie_tail` and `oe_head` are the far ends of the chain segments into
    /// and out of `vn`; virtual neighbors whose chains do not cross ours are
    /// treated as obstacles.
    pub fn maximal_bbox(
        &self,
        vn: NodeId,
        ie_tail: Option<NodeId>,
        oe_head: Option<NodeId>,
    ) -> Result<Rect, RouteError> {
        let graph = &*self.graph;
        let fudge = self.config.box_fudge;
        let splinesep = self.info.splinesep;
        let node = graph.node(vn);
        let labeled = node.is_virtual() && node.label_owner.is_some();
        let mut rv = Rect::default();

        let mut b = node.coord.x - node.lw - fudge;
        match neighbor(graph, vn, ie_tail, oe_head, -1) {
            Some(left) => {
                let nb = match cl_bound(graph, vn, left)? {
                    Some(cl) => graph.clusters[cl.0].bb.ur.x + splinesep,
                    None => {
                        let l = graph.node(left);
                        let gap = if l.is_virtual() {
                            splinesep
                        } else {
                            graph.nodesep / 2.0
                        };
                        l.coord.x + l.rw + l.loop_rw + gap
                    }
                };
                b = b.min(nb);
                rv.ll.x = b.round();
            }
            None => rv.ll.x = b.round().min(self.info.left_bound),
        }

        // A labeled virtual node keeps its label side for the label.
        let mut b = if labeled {
            node.coord.x + 10.0
        } else {
            node.coord.x + node.rw + fudge
        };
        match neighbor(graph, vn, ie_tail, oe_head, 1) {
            Some(right) => {
                let nb = match cl_bound(graph, vn, right)? {
                    Some(cl) => graph.clusters[cl.0].bb.ll.x - splinesep,
                    None => {
                        let r = graph.node(right);
                        let gap = if r.is_virtual() {
                            splinesep
                        } else {
                            graph.nodesep / 2.0
                        };
                        r.coord.x - r.lw - gap
                    }
                };
                b = b.max(nb);
                rv.ur.x = b.round();
            }
            None => rv.ur.x = b.round().max(self.info.right_bound),
        }

        if labeled {
            rv.ur.x -= node.rw;
            if rv.ur.x < rv.ll.x {
                rv.ur.x = node.coord.x;
            }
        }

        let rank = &graph.ranks[node.rank];
        rv.ll.y = node.coord.y - rank.ht1;
        rv.ur.y = node.coord.y + rank.ht2;
        Ok(rv)
    }
}

/// First node in direction `dir` that an edge through `vn` may not pass.
pub(crate) fn neighbor(
    graph: &Graph,
    vn: NodeId,
    ie_tail: Option<NodeId>,
    oe_head: Option<NodeId>,
    dir: isize,
) -> Option<NodeId> {
    let node = graph.node(vn);
    let rank = &graph.ranks[node.rank];
    let mut i = node.order as isize + dir;
    while i >= 0 && (i as usize) < rank.nodes.len() {
        let n = rank.nodes[i as usize];
        let other = graph.node(n);
        if !other.is_virtual() || other.label_owner.is_some() {
            return Some(n);
        }
        if !paths_cross(graph, n, vn, ie_tail, oe_head) {
            return Some(n);
        }
        i += dir;
    }
    None
}

/// Whether the chain through `n0` swaps order with the chain through `n1`
/// within two ranks above or below.
pub(crate) fn paths_cross(
    graph: &Graph,
    n0: NodeId,
    n1: NodeId,
    ie_tail: Option<NodeId>,
    oe_head: Option<NodeId>,
) -> bool {
    let node0 = graph.node(n0);
    let order = node0.order > graph.node(n1).order;
    if node0.out_edges.len() != 1 && node0.in_edges.len() != 1 {
        return false;
    }

    if let (1, Some(mut nb)) = (node0.out_edges.len(), oe_head) {
        let mut na = graph.edge(node0.out_edges[0]).head;
        for _ in 0..2 {
            if na == nb {
                break;
            }
            let (a, b) = (graph.node(na), graph.node(nb));
            if order != (a.order > b.order) {
                return true;
            }
            if a.out_edges.len() != 1 || !a.is_virtual() {
                break;
            }
            if b.out_edges.len() != 1 || !b.is_virtual() {
                break;
            }
            na = graph.edge(a.out_edges[0]).head;
            nb = graph.edge(b.out_edges[0]).head;
        }
    }

    if let (1, Some(mut nb)) = (node0.in_edges.len(), ie_tail) {
        let mut na = graph.edge(node0.in_edges[0]).tail;
        for _ in 0..2 {
            if na == nb {
                break;
            }
            let (a, b) = (graph.node(na), graph.node(nb));
            if order != (a.order > b.order) {
                return true;
            }
            if a.in_edges.len() != 1 || !a.is_virtual() {
                break;
            }
            if b.in_edges.len() != 1 || !b.is_virtual() {
                break;
            }
            na = graph.edge(a.in_edges[0]).tail;
            nb = graph.edge(b.in_edges[0]).tail;
        }
    }
    false
}

/// Clusters at both ends of the user edge a virtual node belongs to.
fn end_clusters(
    graph: &Graph,
    n: NodeId,
) -> Result<(Option<ClusterId>, Option<ClusterId>), RouteError> {
    let out = graph
        .node(n)
        .out_edges
        .first()
        .copied()
        .ok_or(RouteError::DeadEnd { node: n })?;
    let orig = graph.edge(graph.orig_edge(out));
    Ok((graph.node(orig.tail).cluster, graph.node(orig.head).cluster))
}

fn inside_cluster(graph: &Graph, cl: ClusterId, n: NodeId) -> bool {
    graph.clusters[cl.0].bb.contains(graph.node(n).coord)
}

/// The cluster of `adj` that `n`'s edge must stay out of, if any.
pub(crate) fn cl_bound(
    graph: &Graph,
    n: NodeId,
    adj: NodeId,
) -> Result<Option<ClusterId>, RouteError> {
    let (tcl, hcl) = if graph.node(n).is_virtual() {
        end_clusters(graph, n)?
    } else {
        let cl = graph.node(n).cluster;
        (cl, cl)
    };
    let foreign = |cl: Option<ClusterId>| cl.filter(|&c| Some(c) != tcl && Some(c) != hcl);

    if !graph.node(adj).is_virtual() {
        return Ok(foreign(graph.node(adj).cluster));
    }
    let (atcl, ahcl) = end_clusters(graph, adj)?;
    Ok(foreign(atcl)
        .filter(|&c| inside_cluster(graph, c, adj))
        .or_else(|| foreign(ahcl).filter(|&c| inside_cluster(graph, c, adj))))
}

/// Mean slope of the edges meeting at a merge node.
pub(crate) fn conc_slope(graph: &Graph, n: NodeId) -> f64 {
    let node = graph.node(n);
    let (ins, outs) = (&node.in_edges, &node.out_edges);
    if ins.is_empty() || outs.is_empty() {
        return -PI / 2.0;
    }
    let s_in: f64 = ins.iter().map(|&e| graph.node(graph.edge(e).tail).coord.x).sum();
    let s_out: f64 = outs.iter().map(|&e| graph.node(graph.edge(e).head).coord.x).sum();
    let first_in = graph.node(graph.edge(ins[0]).tail).coord;
    let first_out = graph.node(graph.edge(outs[0]).head).coord;
    let m_in = (node.coord.y - first_in.y).atan2(node.coord.x - s_in / ins.len() as f64);
    let m_out = (first_out.y - node.coord.y).atan2(s_out / outs.len() as f64 - node.coord.x);
    (m_in + m_out) / 2.0
}

/// Filler between a node's box and the inter-rank space.
pub(crate) fn make_regular_end(b: Rect, side: Side, y: f64) -> Rect {
    if side == Side::BOTTOM {
        Rect::new(b.ll.x, y, b.ur.x, b.ll.y)
    } else {
        Rect::new(b.ll.x, b.ur.y, b.ur.x, y)
    }
}

/// Stop clipping the user edge at the end attached to `n`.
fn unclip(graph: &mut Graph, orig: EdgeId, n: NodeId, from_tail: bool) {
    let e = graph.edge_mut(orig);
    let at_tail = if from_tail { n == e.tail } else { n != e.head };
    if at_tail {
        e.tail_port.clip = false;
    } else {
        e.head_port.clip = false;
    }
}

/// Start a channel at the tail of `view` and build the tail end boxes.
///
/// A port on a real node makes the boxes hug the named side and leaves the
/// curve unclipped there.
pub(crate) fn begin_path(
    graph: &mut Graph,
    channel: &mut Channel,
    view: &EdgeView,
    kind: PathKind,
    end: &mut PathEnd,
    merge: bool,
) {
    let n = view.tail;
    let port = view.tail_port;
    let node = graph.node(n);
    let (c, lw, rw, ht2) = (node.coord, node.lw, node.rw, node.ht2());
    let real = !node.is_virtual();
    let half_ranksep = graph.ranksep / 2.0;

    channel.boxes.clear();
    let mut p = c + port.p;
    if merge {
        channel.start.theta = conc_slope(graph, n);
        channel.start.constrained = true;
    } else {
        channel.start.constrained = port.constrained;
        if port.constrained {
            channel.start.theta = port.theta;
        }
    }
    end.np = p;
    end.boxes.clear();
    let side = port.side;
    let mut b = end.nb;

    if kind == PathKind::Regular && real && !side.is_empty() {
        if side.intersects(Side::TOP) {
            end.sidemask = Side::TOP;
            let b0;
            if p.x < c.x {
                b0 = Rect::new(b.ll.x - 1.0, p.y, b.ur.x, c.y + ht2 + half_ranksep);
                b.ur.x = c.x - lw;
                b.ur.y = b0.ll.y;
                b.ll.y = c.y - ht2;
                b.ll.x -= 1.0;
            } else {
                b0 = Rect::new(b.ll.x, p.y, b.ur.x + 1.0, c.y + ht2 + half_ranksep);
                b.ll.x = c.x + rw;
                b.ur.y = b0.ll.y;
                b.ll.y = c.y - ht2;
                b.ur.x += 1.0;
            }
            end.boxes.extend([b0, b]);
            p.y += 1.0;
        } else if side.intersects(Side::BOTTOM) {
            end.sidemask = Side::BOTTOM;
            b.ur.y = b.ur.y.max(p.y);
            end.boxes.push(b);
            p.y -= 1.0;
        } else if side.intersects(Side::LEFT) {
            end.sidemask = Side::LEFT;
            b.ur.x = p.x;
            b.ll.y = c.y - ht2;
            b.ur.y = p.y;
            end.boxes.push(b);
            p.x -= 1.0;
        } else {
            end.sidemask = Side::RIGHT;
            b.ll.x = p.x;
            b.ll.y = c.y - ht2;
            b.ur.y = p.y;
            end.boxes.push(b);
            p.x += 1.0;
        }
        channel.start.p = p;
        unclip(graph, view.orig, n, true);
        return;
    }

    if kind == PathKind::Flat && !side.is_empty() {
        if side.intersects(Side::TOP) {
            b.ll.y = b.ll.y.min(p.y);
            end.boxes.push(b);
            p.y += 1.0;
        } else if side.intersects(Side::BOTTOM) {
            if end.sidemask == Side::TOP {
                let top = c.y - ht2;
                let b0 = Rect::new(p.x, top - half_ranksep, b.ur.x + 1.0, top);
                b.ll.x = c.x + rw;
                b.ll.y = top;
                b.ur.y = c.y + ht2;
                b.ur.x += 1.0;
                end.boxes.extend([b0, b]);
            } else {
                b.ur.y = b.ur.y.max(p.y);
                end.boxes.push(b);
            }
            p.y -= 1.0;
        } else if side.intersects(Side::LEFT) {
            b.ur.x = p.x + 1.0;
            if end.sidemask == Side::TOP {
                b.ur.y = c.y + ht2;
                b.ll.y = p.y - 1.0;
            } else {
                b.ll.y = c.y - ht2;
                b.ur.y = p.y + 1.0;
            }
            end.boxes.push(b);
            p.x -= 1.0;
        } else {
            b.ll.x = p.x;
            if end.sidemask == Side::TOP {
                b.ur.y = c.y + ht2;
                b.ll.y = p.y;
            } else {
                b.ll.y = c.y - ht2;
                b.ur.y = p.y + 1.0;
            }
            end.boxes.push(b);
            p.x += 1.0;
        }
        channel.start.p = p;
        unclip(graph, view.orig, n, true);
        end.sidemask = side;
        return;
    }

    match kind {
        PathKind::Flat => {
            if end.sidemask == Side::TOP {
                b.ll.y = p.y;
            } else {
                b.ur.y = p.y;
            }
        }
        PathKind::Regular => {
            b.ur.y = p.y;
            end.sidemask = Side::BOTTOM;
            p.y -= 1.0;
        }
    }
    end.boxes.push(b);
    channel.start.p = p;
}

/// Mirror of [`begin_path`] for the head of `view`.
pub(crate) fn end_path(
    graph: &mut Graph,
    channel: &mut Channel,
    view: &EdgeView,
    kind: PathKind,
    end: &mut PathEnd,
    merge: bool,
) {
    let n = view.head;
    let port = view.head_port;
    let node = graph.node(n);
    let (c, lw, rw, ht2) = (node.coord, node.lw, node.rw, node.ht2());
    let real = !node.is_virtual();
    let half_ranksep = graph.ranksep / 2.0;

    let mut p = c + port.p;
    if merge {
        channel.end.theta = conc_slope(graph, n) + PI;
        channel.end.constrained = true;
    } else {
        channel.end.constrained = port.constrained;
        if port.constrained {
            channel.end.theta = port.theta;
        }
    }
    end.np = p;
    end.boxes.clear();
    let side = port.side;
    let mut b = end.nb;

    if kind == PathKind::Regular && real && !side.is_empty() {
        if side.intersects(Side::TOP) {
            b.ll.y = b.ll.y.min(p.y);
            end.boxes.push(b);
            p.y += 1.0;
        } else if side.intersects(Side::BOTTOM) {
            let b0;
            if p.x < c.x {
                b0 = Rect::new(b.ll.x - 1.0, c.y - ht2 - half_ranksep, b.ur.x, p.y);
                b.ur.x = c.x - lw;
                b.ll.y = b0.ur.y;
                b.ur.y = c.y + ht2;
                b.ll.x -= 1.0;
            } else {
                b0 = Rect::new(b.ll.x, c.y - ht2 - half_ranksep, b.ur.x + 1.0, p.y);
                b.ll.x = c.x + rw;
                b.ll.y = b0.ur.y;
                b.ur.y = c.y + ht2;
                b.ur.x += 1.0;
            }
            end.boxes.extend([b0, b]);
            p.y -= 1.0;
        } else if side.intersects(Side::LEFT) {
            b.ur.x = p.x;
            b.ur.y = c.y + ht2;
            b.ll.y = p.y;
            end.boxes.push(b);
            p.x -= 1.0;
        } else {
            b.ll.x = p.x;
            b.ur.y = c.y + ht2;
            b.ll.y = p.y;
            end.boxes.push(b);
            p.x += 1.0;
        }
        channel.end.p = p;
        unclip(graph, view.orig, n, false);
        end.sidemask = side;
        return;
    }

    if kind == PathKind::Flat && !side.is_empty() {
        if side.intersects(Side::TOP) {
            b.ll.y = b.ll.y.min(p.y);
            end.boxes.push(b);
            p.y += 1.0;
        } else if side.intersects(Side::BOTTOM) {
            if end.sidemask == Side::TOP {
                let top = c.y - ht2;
                let b0 = Rect::new(b.ll.x - 1.0, top - half_ranksep, p.x, top);
                b.ur.x = c.x - lw - 2.0;
                b.ll.y = top;
                b.ur.y = c.y + ht2;
                b.ll.x -= 1.0;
                end.boxes.extend([b0, b]);
            } else {
                b.ur.y = b.ur.y.max(p.y);
                end.boxes.push(b);
            }
            p.y -= 1.0;
        } else if side.intersects(Side::LEFT) {
            b.ur.x = p.x + 1.0;
            if end.sidemask == Side::TOP {
                b.ur.y = c.y + ht2;
                b.ll.y = p.y - 1.0;
            } else {
                b.ll.y = c.y - ht2;
                b.ur.y = p.y + 1.0;
            }
            end.boxes.push(b);
            p.x -= 1.0;
        } else {
            b.ll.x = p.x - 1.0;
            if end.sidemask == Side::TOP {
                b.ur.y = c.y + ht2;
                b.ll.y = p.y - 1.0;
            } else {
                b.ll.y = c.y - ht2;
                b.ur.y = p.y;
            }
            end.boxes.push(b);
            p.x += 1.0;
        }
        channel.end.p = p;
        unclip(graph, view.orig, n, false);
        end.sidemask = side;
        return;
    }

    match kind {
        PathKind::Flat => {
            if end.sidemask == Side::TOP {
                b.ll.y = p.y;
            } else {
                b.ur.y = p.y;
            }
        }
        PathKind::Regular => {
            b.ll.y = p.y;
            end.sidemask = Side::TOP;
            p.y += 1.0;
        }
    }
    end.boxes.push(b);
    channel.end.p = p;
}

/// Assemble tail boxes, the inter-rank boxes and the head boxes into the
/// channel, then widen the rank boxes so consecutive boxes overlap.
pub(crate) fn complete_regular_path(
    channel: &mut Channel,
    tend: &PathEnd,
    hend: &PathEnd,
    boxes: &[Rect],
    min_width: f64,
) {
    for &b in &tend.boxes {
        channel.add_box(b);
    }
    let fb = channel.boxes.len() as isize + 1;
    let lb = fb + boxes.len() as isize - 3;
    for &b in boxes {
        channel.add_box(b);
    }
    for &b in hend.boxes.iter().rev() {
        channel.add_box(b);
    }
    adjust_regular_path(&mut channel.boxes, fb, lb, min_width);
}

/// Give every box between `fb - 1` and `lb` at least `min_width`, and make
/// each node box overlap its neighbors by that much.
pub(crate) fn adjust_regular_path(boxes: &mut [Rect], fb: isize, lb: isize, min_width: f64) {
    let half = min_width / 2.0;
    let len = boxes.len() as isize;
    for i in (fb - 1).max(0)..(lb + 1).min(len) {
        let b = &mut boxes[i as usize];
        let narrow = if (i - fb) % 2 == 0 {
            b.ll.x >= b.ur.x
        } else {
            b.ll.x + min_width > b.ur.x
        };
        if narrow {
            let x = ((b.ll.x + b.ur.x) / 2.0).trunc();
            b.ll.x = x - half;
            b.ur.x = x + half;
        }
    }
    for i in 0..len - 1 {
        let (b1, b2) = (boxes[i as usize], boxes[i as usize + 1]);
        if i >= fb && i <= lb && (i - fb) % 2 == 0 {
            let b2 = &mut boxes[i as usize + 1];
            if b1.ll.x + min_width > b2.ur.x {
                b2.ur.x = b1.ll.x + min_width;
            }
            if b1.ur.x - min_width < b2.ll.x {
                b2.ll.x = b1.ur.x - min_width;
            }
        } else if i + 1 >= fb && i < lb && (i + 1 - fb) % 2 == 0 {
            let b1 = &mut boxes[i as usize];
            if b1.ll.x + min_width > b2.ur.x {
                b1.ll.x = b2.ur.x - min_width;
            }
            if b1.ur.x - min_width < b2.ll.x {
                b1.ur.x = b2.ll.x + min_width;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::spline_merge;
    use crate::graph::{EdgeOptions, Node};

    fn column() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 72.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        (graph, a, b)
    }

    #[test]
    fn test_regular_end_fills_toward_the_rank_gap() {
        let b = Rect::new(0.0, 10.0, 20.0, 30.0);
        assert_eq!(make_regular_end(b, Side::BOTTOM, 4.0), Rect::new(0.0, 4.0, 20.0, 10.0));
        assert_eq!(make_regular_end(b, Side::TOP, 40.0), Rect::new(0.0, 30.0, 20.0, 40.0));
    }

    #[test]
    fn test_adjust_widens_narrow_rank_boxes() {
        // tail box, rank box, virtual node box, rank box, head box
        let mut boxes = vec![
            Rect::new(-30.0, 54.0, 30.0, 90.0),
            Rect::new(0.0, 18.0, 4.0, 54.0),
            Rect::new(100.0, -18.0, 110.0, 18.0),
            Rect::new(-40.0, -54.0, 40.0, -18.0),
            Rect::new(-30.0, -90.0, 30.0, -54.0),
        ];
        adjust_regular_path(&mut boxes, 2, 2, MINW);
        // Recentered to the minimum width, then stretched to reach the node box.
        assert_eq!((boxes[1].ll.x, boxes[1].ur.x), (-6.0, 116.0));
        // The node box now overlaps both rank boxes by the minimum width.
        assert!(boxes[2].ll.x <= boxes[1].ur.x - MINW);
        assert!(boxes[2].ll.x <= boxes[3].ur.x - MINW);
        assert!(boxes.iter().all(Rect::is_valid));
    }

    #[test]
    fn test_regular_begin_without_port_opens_downward() {
        let (mut graph, a, b) = column();
        let e = graph.add_edge(a, b).unwrap();
        let view = EdgeView::of(&graph, e);
        let mut channel = Channel::default();
        let mut tend = PathEnd::new(Rect::new(-40.0, 54.0, 40.0, 90.0));
        begin_path(&mut graph, &mut channel, &view, PathKind::Regular, &mut tend, false);

        assert_eq!(tend.sidemask, Side::BOTTOM);
        assert_eq!(tend.boxes, vec![Rect::new(-40.0, 54.0, 40.0, 72.0)]);
        assert_eq!(channel.start.p, Point::new(0.0, 71.0));
        assert!(graph.edge(e).tail_port.clip);
    }

    #[test]
    fn test_regular_end_with_side_port_stops_clipping() {
        let (mut graph, a, b) = column();
        let options = EdgeOptions {
            head_port: Port::at(Point::new(27.0, 0.0), Side::RIGHT),
            ..Default::default()
        };
        let e = graph.add_edge_with(a, b, options).unwrap();
        let view = EdgeView::of(&graph, e);
        let mut channel = Channel::default();
        let mut hend = PathEnd::new(Rect::new(-40.0, -18.0, 40.0, 18.0));
        end_path(&mut graph, &mut channel, &view, PathKind::Regular, &mut hend, false);

        assert_eq!(hend.sidemask, Side::RIGHT);
        assert_eq!(hend.boxes, vec![Rect::new(27.0, 0.0, 40.0, 18.0)]);
        assert_eq!(channel.end.p, Point::new(28.0, 0.0));
        assert!(!graph.edge(e).head_port.clip);
        assert!(graph.edge(e).tail_port.clip);
    }

    #[test]
    fn test_neighbor_skips_crossing_chains() {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 144.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 0, Point::new(200.0, 144.0), Size::new(54.0, 36.0));
        let c = graph.add_node("c", 2, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        let d = graph.add_node("d", 2, Point::new(200.0, 0.0), Size::new(54.0, 36.0));
        // a-d and b-c cross between ranks 1 and 2.
        let via = |x: f64| EdgeOptions {
            via: vec![x],
            ..Default::default()
        };
        let ad = graph.add_edge_with(a, d, via(90.0)).unwrap();
        let bc = graph.add_edge_with(b, c, via(110.0)).unwrap();
        let vad = graph.edge(graph.edge(ad).to_virt.unwrap()).head;
        let vbc = graph.edge(graph.edge(bc).to_virt.unwrap()).head;

        assert!(paths_cross(&graph, vbc, vad, Some(a), Some(d)));
        assert_eq!(neighbor(&graph, vad, Some(a), Some(d), 1), None);

        let real = graph.push_node(Node::real("r", Size::new(20.0, 20.0)));
        graph.place(real, 1, Point::new(160.0, 72.0));
        assert_eq!(neighbor(&graph, vad, Some(a), Some(d), 1), Some(real));
    }

    #[test]
    fn test_cluster_bound_ignores_own_cluster() {
        let mut graph = Graph::new(18.0, 36.0);
        let cl = graph.add_cluster("cluster_x", Rect::new(60.0, -30.0, 140.0, 30.0));
        let a = graph.add_node("a", 0, Point::new(0.0, 0.0), Size::new(20.0, 20.0));
        let b = graph.add_node("b", 0, Point::new(100.0, 0.0), Size::new(20.0, 20.0));
        graph.node_mut(b).cluster = Some(cl);
        assert_eq!(cl_bound(&graph, a, b).unwrap(), Some(cl));
        graph.node_mut(a).cluster = Some(cl);
        assert_eq!(cl_bound(&graph, a, b).unwrap(), None);
    }

    #[test]
    fn test_conc_slope_of_symmetric_merge_points_down() {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(-50.0, 100.0), Size::new(20.0, 20.0));
        let b = graph.add_node("b", 0, Point::new(50.0, 100.0), Size::new(20.0, 20.0));
        let c = graph.add_node("c", 2, Point::new(0.0, 0.0), Size::new(20.0, 20.0));
        let vn = graph.push_node(Node::virtual_node());
        graph.place(vn, 1, Point::new(0.0, 50.0));
        for t in [a, b] {
            let e = graph.add_edge(t, vn).unwrap();
            assert!(graph.edge(e).to_virt.is_none());
        }
        graph.add_edge(vn, c).unwrap();
        assert!(spline_merge(&graph, vn));
        let theta = conc_slope(&graph, vn);
        assert!((theta + std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }
}
