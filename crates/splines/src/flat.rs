use crate::boxes::{begin_path, end_path, make_regular_end, PathKind};
use crate::classify::{forward_view, EdgeClass, EdgeView};
use crate::graph::{Edge, Graph, Node};
use crate::route::{route_graph, RoutePass};
use crate::types::*;
use std::cmp::Ordering;
use std::f64::consts::PI;
use tracing::debug;

/// Weight of the edge that keeps the two nodes of a transposed layout apart.
const SPACER_WEIGHT: f64 = 10000.0;

/// Port of the parent graph as seen in the graph rotated by 90 degrees.
fn transpose_port(port: Port) -> Port {
    if !port.defined {
        return port;
    }
    let mut side = Side::NONE;
    for (from, to) in [
        (Side::LEFT, Side::TOP),
        (Side::RIGHT, Side::BOTTOM),
        (Side::TOP, Side::RIGHT),
        (Side::BOTTOM, Side::LEFT),
    ] {
        if port.side.intersects(from) {
            side = side | to;
        }
    }
    Port {
        p: Point::new(port.p.y, -port.p.x),
        side,
        theta: port.theta - PI / 2.0,
        ..port
    }
}

/// Rotation taking the transposed graph back to the parent frame.
fn untranspose(p: Point) -> Point {
    Point::new(-p.y, p.x)
}

/// Labeled edges first, then wider labels, then taller ones.
fn label_order(graph: &Graph, a: &EdgeClass, b: &EdgeClass) -> Ordering {
    let dims = |c: &EdgeClass| graph.edge(c.edge).label.map(|l| graph.label_dims(&l));
    match (dims(a), dims(b)) {
        (Some(sa), Some(sb)) => sb
            .width
            .partial_cmp(&sa.width)
            .unwrap_or(Ordering::Equal)
            .then(sb.height.partial_cmp(&sa.height).unwrap_or(Ordering::Equal)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl RoutePass<'_, '_> {
    /// Route a class of edges between two nodes of one rank.
    pub fn make_flat_edges(&mut self, class: &[EdgeClass]) -> Result<(), RouteError> {
        let e0 = forward_view(self.graph, &class[0]);
        if class.iter().any(|c| self.graph.edge(c.edge).adjacent) {
            return self.make_flat_adj_edges(class, &e0);
        }
        if self.graph.edge(e0.edge).label.is_some() {
            return self.make_flat_labeled_edge(&e0);
        }
        if self.config.style == EdgeStyle::Line {
            self.make_simple_flat(class, &e0);
            return Ok(());
        }
        let (ts, hs) = (e0.tail_port.side, e0.head_port.side);
        let bottom =
            (ts == Side::BOTTOM && hs != Side::TOP) || (hs == Side::BOTTOM && ts != Side::TOP);
        self.make_flat_arches(class, &e0, bottom)
    }

    /// End boxes above (or below) a node for a channel leaving its rank.
    fn make_flat_end(
        &mut self,
        channel: &mut Channel,
        view: &EdgeView,
        begin: bool,
        bottom: bool,
    ) -> Result<PathEnd, RouteError> {
        let n = if begin { view.tail } else { view.head };
        let mut end = PathEnd::new(self.maximal_bbox(n, None, Some(view.head))?);
        end.sidemask = if bottom { Side::BOTTOM } else { Side::TOP };
        if begin {
            begin_path(self.graph, channel, view, PathKind::Flat, &mut end, false);
        } else {
            end_path(self.graph, channel, view, PathKind::Flat, &mut end, false);
        }
        let mut b = end.nb;
        let last = end.last_box();
        b.ll.y = last.ll.y;
        b.ur.y = last.ur.y;
        let node = self.graph.node(n);
        let rank = &self.graph.ranks[node.rank];
        let b = if bottom {
            make_regular_end(b, Side::BOTTOM, node.coord.y - rank.ht1)
        } else {
            make_regular_end(b, Side::TOP, node.coord.y + rank.ht2)
        };
        end.push_proper(b);
        Ok(end)
    }

    fn fit_flat(
        &mut self,
        channel: &mut Channel,
        tend: &PathEnd,
        boxes: &[Rect],
        hend: &PathEnd,
    ) -> Vec<Point> {
        channel.boxes.clear();
        for &b in tend.boxes.iter().chain(boxes) {
            channel.add_box(b);
        }
        for &b in hend.boxes.iter().rev() {
            channel.add_box(b);
        }
        self.fit(channel)
    }

    /// Non-adjacent flat edges arched over the nodes between them, or under
    /// them when the ports face down. Each edge of the class gets its own,
    /// progressively larger arch.
    fn make_flat_arches(
        &mut self,
        class: &[EdgeClass],
        e0: &EdgeView,
        bottom: bool,
    ) -> Result<(), RouteError> {
        let tn = e0.tail;
        let r = self.graph.node(tn).rank;
        let ty = self.graph.node(tn).coord.y;
        let ranks = &self.graph.ranks;
        let vspace = if bottom {
            if r < self.graph.max_rank() {
                let next = self.graph.node(self.graph.rank_leader(r + 1)?).coord.y;
                ty - ranks[r].ht1 - (next + ranks[r + 1].ht2)
            } else {
                self.graph.ranksep
            }
        } else if r > 0 {
            let prev = self.graph.node(self.graph.rank_leader(r - 1)?).coord.y;
            prev - ranks[r - 1].ht1 - ty - ranks[r].ht2
        } else {
            self.graph.ranksep
        };
        let cnt = class.len() as f64;
        let stepx = self.info.multisep / (cnt + 1.0);
        let stepy = vspace / (cnt + 1.0);

        let mut channel = Channel::default();
        let tend = self.make_flat_end(&mut channel, e0, true, bottom)?;
        let hend = self.make_flat_end(&mut channel, e0, false, bottom)?;
        let (tb, hb) = (tend.last_box(), hend.last_box());

        for (i, c) in class.iter().enumerate() {
            let k = (i + 1) as f64;
            let boxes = if bottom {
                let b0 = Rect::new(tb.ll.x, tb.ll.y - k * stepy, tb.ur.x + k * stepx, tb.ll.y);
                let b1 = Rect::new(tb.ll.x, b0.ll.y - stepy, hb.ur.x, b0.ll.y);
                let b2 = Rect::new(hb.ll.x - k * stepx, b1.ur.y, hb.ur.x, hb.ll.y);
                [b0, b1, b2]
            } else {
                let b0 = Rect::new(tb.ll.x, tb.ur.y, tb.ur.x + k * stepx, tb.ur.y + k * stepy);
                let b1 = Rect::new(tb.ll.x, b0.ur.y, hb.ur.x, b0.ur.y + stepy);
                let b2 = Rect::new(hb.ll.x - k * stepx, hb.ur.y, hb.ur.x, b1.ll.y);
                [b0, b1, b2]
            };
            let ps = self.fit_flat(&mut channel, &tend, &boxes, &hend);
            if ps.is_empty() {
                self.fail_edge(c.edge);
                continue;
            }
            let view = forward_view(self.graph, c);
            self.install(&view, view.head, &ps);
        }
        Ok(())
    }

    /// A labeled flat edge routed over the label node reserved on the rank
    /// above. The label itself is positioned once the pass is done.
    fn make_flat_labeled_edge(&mut self, e0: &EdgeView) -> Result<(), RouteError> {
        let (tn, hn) = (e0.tail, e0.head);
        let edge = self.graph.edge(e0.edge);
        let label = edge.label.ok_or(RouteError::BrokenChain { edge: e0.edge })?;
        let mut f = edge.to_virt.ok_or(RouteError::BrokenChain { edge: e0.edge })?;
        while let Some(next) = self.graph.edge(f).to_virt {
            f = next;
        }
        let ln = self.graph.edge(f).tail;
        let lnode = self.graph.node(ln);
        let lc = lnode.coord;

        if self.config.style == EdgeStyle::Line {
            let startp = self.graph.node(tn).coord + e0.tail_port.p;
            let endp = self.graph.node(hn).coord + e0.head_port.p;
            let mut lp = lc;
            lp.y -= self.graph.label_dims(&label).height / 2.0;
            let points = [startp, startp, lp, lp, lp, endp, endp];
            self.install(e0, hn, &points);
            return Ok(());
        }

        let r = self.graph.node(tn).rank;
        let rank = &self.graph.ranks[r];
        let ydelta = (lc.y - rank.ht1 - self.graph.node(tn).coord.y + rank.ht2).trunc();
        let ydelta = (ydelta / 6.0).trunc();
        let top = lc.y + lnode.ht / 2.0;
        let lb = Rect::new(lc.x - lnode.lw, top - ydelta.max(5.0), lc.x + lnode.rw, top);

        let mut channel = Channel::default();
        let tend = self.make_flat_end(&mut channel, e0, true, false)?;
        let hend = self.make_flat_end(&mut channel, e0, false, false)?;
        let (tl, hl) = (tend.last_box(), hend.last_box());
        let boxes = [
            Rect::new(tl.ll.x, tl.ur.y, lb.ll.x, lb.ll.y),
            Rect::new(tl.ll.x, lb.ll.y, hl.ur.x, lb.ur.y),
            Rect::new(lb.ur.x, hl.ur.y, hl.ur.x, lb.ll.y),
        ];
        let ps = self.fit_flat(&mut channel, &tend, &boxes, &hend);
        if ps.is_empty() {
            self.fail_edge(e0.edge);
            return Ok(());
        }
        self.install(e0, hn, &ps);
        Ok(())
    }

    /// Flat edges between neighbors in a rank.
    fn make_flat_adj_edges(
        &mut self,
        class: &[EdgeClass],
        e0: &EdgeView,
    ) -> Result<(), RouteError> {
        let graph = &*self.graph;
        let ports = class.iter().any(|c| {
            let e = graph.edge(c.edge);
            e.tail_port.defined || e.head_port.defined
        });
        if ports {
            return self.route_transposed(class, e0);
        }
        if class.iter().any(|c| graph.edge(c.edge).label.is_some()) {
            self.make_simple_flat_labels(class, e0);
        } else {
            self.make_simple_flat(class, e0);
        }
        Ok(())
    }

    /// A fan of curves straight from one node to the other, spread over the
    /// tail's height.
    pub(crate) fn make_simple_flat(&mut self, class: &[EdgeClass], e0: &EdgeView) {
        let (tn, hn) = (e0.tail, e0.head);
        let tp = self.graph.node(tn).coord + e0.tail_port.p;
        let hp = self.graph.node(hn).coord + e0.head_port.p;
        let ht = self.graph.node(tn).ht;
        let cnt = class.len();
        let (stepy, mut dy) = if cnt > 1 {
            (ht / (cnt - 1) as f64, tp.y - ht / 2.0)
        } else {
            (0.0, tp.y)
        };
        let (x1, x2) = ((2.0 * tp.x + hp.x) / 3.0, (2.0 * hp.x + tp.x) / 3.0);

        for c in class {
            let (p1, p2) = (Point::new(x1, dy), Point::new(x2, dy));
            let points = if self.config.style == EdgeStyle::Polyline {
                vec![tp, tp, p1, p1, p1, p2, p2, p2, hp, hp]
            } else {
                vec![tp, p1, p2, hp]
            };
            dy += stepy;
            let view = forward_view(self.graph, c);
            self.install(&view, view.head, &points);
        }
    }

    /// Neighbors joined by labeled edges: the first edge runs straight with
    /// its label above it, the others alternate below and above, each one
    /// routed around the labels already stacked on its side.
    fn make_simple_flat_labels(&mut self, class: &[EdgeClass], e0: &EdgeView) {
        let lbl = self.config.label_space;
        let graph = &*self.graph;
        let mut earray = class.to_vec();
        earray.sort_by(|a, b| label_order(graph, a, b));
        let dims: Vec<Option<Size>> = earray
            .iter()
            .map(|c| graph.edge(c.edge).label.map(|l| graph.label_dims(&l)))
            .collect();

        let (tn, hn) = (e0.tail, e0.head);
        let tp = self.graph.node(tn).coord + e0.tail_port.p;
        let hp = self.graph.node(hn).coord + e0.head_port.p;
        let leftend = tp.x + self.graph.node(tn).rw;
        let rightend = hp.x - self.graph.node(hn).lw;
        let ctrx = (leftend + rightend) / 2.0;

        let first = forward_view(self.graph, &earray[0]);
        self.install(&first, first.head, &[tp, tp, hp, hp]);
        let d0 = dims[0].unwrap_or_default();
        self.set_label_pos(first.orig, Point::new(ctrx, tp.y + (d0.height + lbl) / 2.0));

        let mut miny = tp.y + lbl / 2.0;
        let mut maxy = miny + d0.height;
        let (uminx, umaxx) = (ctrx - d0.width / 2.0, ctrx + d0.width / 2.0);
        let (mut lminx, mut lmaxx) = (0.0, 0.0);

        for (i, c) in earray.iter().enumerate().skip(1) {
            let size = dims[i];
            let (w, h) = size.map_or((0.0, 0.0), |s| (s.width, s.height));
            let (poly, ctry) = if i % 2 == 1 {
                if i == 1 {
                    (lminx, lmaxx) = match size {
                        Some(_) => (ctrx - w / 2.0, ctrx + w / 2.0),
                        None => (
                            (2.0 * leftend + rightend) / 3.0,
                            (leftend + 2.0 * rightend) / 3.0,
                        ),
                    };
                }
                miny -= lbl + h;
                let poly = [
                    tp,
                    Point::new(tp.x, miny - lbl),
                    Point::new(hp.x, miny - lbl),
                    hp,
                    Point::new(lmaxx, hp.y),
                    Point::new(lmaxx, miny),
                    Point::new(lminx, miny),
                    Point::new(lminx, tp.y),
                ];
                (poly, miny + h / 2.0)
            } else {
                let poly = [
                    tp,
                    Point::new(uminx, tp.y),
                    Point::new(uminx, maxy),
                    Point::new(umaxx, maxy),
                    Point::new(umaxx, hp.y),
                    hp,
                    Point::new(hp.x, maxy + lbl),
                    Point::new(tp.x, maxy + lbl),
                ];
                let ctry = maxy + h / 2.0 + lbl;
                maxy += h + lbl;
                (poly, ctry)
            };

            let polyline = self.config.style == EdgeStyle::Polyline;
            let ps = self.collab.fitter.fit_polygon(tp, hp, &poly, polyline);
            if ps.is_empty() {
                self.fail_edge(c.edge);
                continue;
            }
            let view = forward_view(self.graph, c);
            if size.is_some() {
                self.set_label_pos(view.orig, Point::new(ctrx, ctry));
            }
            self.install(&view, view.head, &ps);
        }
    }

    /// Neighbors joined by edges with ports: lay the pair out again as a
    /// two-rank graph rotated by 90 degrees and route that, so the ports
    /// become ordinary top and bottom attachments.
    fn route_transposed(&mut self, class: &[EdgeClass], e0: &EdgeView) -> Result<(), RouteError> {
        let (tn, hn) = (e0.tail, e0.head);
        let parent = &*self.graph;
        let mut aux = Graph::new(parent.nodesep, parent.ranksep);
        aux.flip = !parent.flip;
        let rotated = |n: &Node| Node::real(n.name.clone(), Size::new(n.ht, n.lw + n.rw));
        let auxt = aux.push_node(rotated(parent.node(tn)));
        let auxh = aux.push_node(rotated(parent.node(hn)));

        let mut pairs = Vec::with_capacity(class.len());
        let mut spacer = None;
        for c in class {
            let orig_id = parent.orig_edge(c.edge);
            let orig = parent.edge(orig_id);
            let (t, h) = if orig.tail == tn { (auxt, auxh) } else { (auxh, auxt) };
            let mut edge = Edge::new(t, h);
            edge.tail_port = transpose_port(orig.tail_port);
            edge.head_port = transpose_port(orig.head_port);
            edge.label = orig.label.map(|l| Label { pos: None, ..l });
            let id = aux.push_edge(edge);
            if spacer.is_none() && !orig.tail_port.defined && !orig.head_port.defined {
                spacer = Some(id);
            }
            pairs.push((orig_id, id));
        }
        let spacer = spacer.unwrap_or_else(|| aux.push_edge(Edge::new(auxt, auxh)));
        aux.edge_mut(spacer).weight = SPACER_WEIGHT;

        debug!(
            tail = %parent.node(tn).name,
            head = %parent.node(hn).name,
            edges = pairs.len(),
            "routing ported flat edges in a transposed layout"
        );
        self.collab.pipeline.layout(&mut aux)?;

        let (tc, hc) = (parent.node(tn).coord, parent.node(hn).coord);
        let midx = (tc.x + parent.node(tn).rw + hc.x - parent.node(hn).lw) / 2.0;
        let midy = (aux.node(auxt).coord.x + aux.node(auxh).coord.x) / 2.0;
        for id in aux.node_ids() {
            let node = aux.node_mut(id);
            if id == auxt {
                node.coord = Point::new(tc.y, -tc.x);
            } else if id == auxh {
                node.coord = Point::new(tc.y, -hc.x);
            } else {
                node.coord = Point::new(node.coord.x + tc.y - midy, -midx);
            }
        }

        route_graph(&mut aux, self.config, &mut *self.collab, false)?;

        for (orig, aux_id) in pairs {
            let aux_edge = aux.edge(aux_id);
            let Some(spline) = &aux_edge.spline else {
                self.failed.insert(orig);
                continue;
            };
            let points: Vec<Point> = spline.iter().copied().map(untranspose).collect();
            for &p in &points {
                self.graph.grow_bb(Rect::new(p.x, p.y, p.x, p.y));
            }
            self.graph.edge_mut(orig).spline = Some(points);
            self.installed.insert(orig);
            if let Some(pos) = aux_edge.label.and_then(|l| l.pos) {
                self.set_label_pos(orig, untranspose(pos));
            }
        }
        Ok(())
    }
}
