use crate::boxes::{begin_path, complete_regular_path, end_path, make_regular_end, PathKind};
use crate::classify::{forward_view, main_edge, spline_merge, EdgeClass, EdgeView};
use crate::graph::Graph;
use crate::route::RoutePass;
use crate::types::*;
use std::f64::consts::PI;
use tracing::trace;

/// The chain segment leaving a virtual node.
fn out0(graph: &Graph, n: NodeId) -> Result<EdgeView, RouteError> {
    graph
        .node(n)
        .out_edges
        .first()
        .map(|&e| EdgeView::of(graph, e))
        .ok_or(RouteError::DeadEnd { node: n })
}

/// Number of vertically aligned virtual nodes below `n`.
pub(crate) fn straight_len(graph: &Graph, n: NodeId) -> Result<usize, RouteError> {
    let x = graph.node(n).coord.x;
    let mut cnt = 0;
    let mut v = n;
    loop {
        v = out0(graph, v)?.head;
        let node = graph.node(v);
        if !node.is_virtual() || node.out_edges.len() != 1 || node.in_edges.len() != 1 {
            break;
        }
        if node.coord.x != x {
            break;
        }
        cnt += 1;
    }
    Ok(cnt)
}

/// `p3` lies left of the ray from `p1` through `p2`.
fn left_of(p1: Point, p2: Point, p3: Point) -> bool {
    let d = (p1.y - p2.y) * (p3.x - p2.x) - (p3.y - p2.y) * (p1.x - p2.x);
    d as i64 > 0
}

impl RoutePass<'_, '_> {
    /// Route a class of edges between ranks along the chain of its first edge.
    pub fn make_regular_edges(&mut self, class: &[EdgeClass]) -> Result<(), RouteError> {
        let e0 = forward_view(self.graph, &class[0]);
        let span = self.graph.node(e0.tail).rank.abs_diff(self.graph.node(e0.head).rank);

        // An edge spanning several ranks is walked along its main chain.
        let chain_walk = span > 1;
        let fwdb = e0;
        let mut e = e0;
        if chain_walk {
            let main = main_edge(self.graph, e0.edge);
            let le = self.graph.edge(main).to_virt.unwrap_or(main);
            e = EdgeView {
                edge: le,
                head: self.graph.edge(le).head,
                head_port: Port::default(),
                ..fwdb
            };
        }
        let fe = e;

        let line = if self.config.style == EdgeStyle::Line {
            self.make_line_edge(&fe)
        } else {
            None
        };
        let (mut points, hn) = match line {
            Some(found) => found,
            None => match self.walk_chain(e, fwdb, chain_walk)? {
                Some(found) => found,
                None => {
                    self.fail_class(class);
                    return Ok(());
                }
            },
        };

        if class.len() == 1 {
            self.install(&fe, hn, &points);
            return Ok(());
        }

        let multisep = self.info.multisep;
        let dx = multisep * (class.len() - 1) as f64 / 2.0;
        let last = points.len().saturating_sub(1);
        for p in points.iter_mut().take(last).skip(1) {
            p.x -= dx;
        }
        self.install(&fe, hn, &points);
        for c in &class[1..] {
            let view = forward_view(self.graph, c);
            for p in points.iter_mut().take(last).skip(1) {
                p.x += multisep;
            }
            self.install(&view, view.head, &points);
        }
        Ok(())
    }

    /// Fit the chain starting at `e`, cutting it into separately fitted
    /// pieces around long vertical runs. `None` when a piece cannot be fitted.
    fn walk_chain(
        &mut self,
        mut e: EdgeView,
        fwdb: EdgeView,
        chain_walk: bool,
    ) -> Result<Option<(Vec<Point>, NodeId)>, RouteError> {
        let min_width = self.config.min_width;
        let threshold = if self.info.has_labels {
            self.config.straight_run_min_labeled
        } else {
            self.config.straight_run_min
        };

        let mut points = Vec::new();
        let mut channel = Channel::default();
        let mut boxes = Vec::new();
        let mut segfirst = e;
        let (mut tn, mut hn) = (e.tail, e.head);

        let mut tend = PathEnd::new(self.maximal_bbox(tn, None, Some(e.head))?);
        let merge = spline_merge(self.graph, tn);
        begin_path(self.graph, &mut channel, &e, PathKind::Regular, &mut tend, merge);
        let mut b = tend.nb;
        let last = tend.last_box();
        b.ll.y = last.ll.y;
        b.ur.y = last.ur.y;
        let b = make_regular_end(b, Side::BOTTOM, self.bottom_of_rank(tn));
        tend.push_proper(b);

        let (mut smode, mut si, mut sl) = (false, -1i64, 0usize);
        while self.graph.node(hn).is_virtual() && !spline_merge(self.graph, hn) {
            boxes.push(self.rank_box(self.graph.node(tn).rank)?);
            if !smode {
                sl = straight_len(self.graph, hn)?;
                if sl >= threshold {
                    smode = true;
                    si = 1;
                    sl -= 2;
                }
            }
            let next = out0(self.graph, hn)?;
            if !smode || si > 0 {
                si -= 1;
                boxes.push(self.maximal_bbox(hn, Some(e.tail), Some(next.head))?);
                e = next;
                (tn, hn) = (e.tail, e.head);
                continue;
            }

            let mut hend = PathEnd::new(self.maximal_bbox(hn, Some(e.tail), Some(next.head))?);
            let merge = spline_merge(self.graph, e.head);
            end_path(self.graph, &mut channel, &e, PathKind::Regular, &mut hend, merge);
            let b = make_regular_end(hend.last_box(), Side::TOP, self.top_of_rank(hn));
            hend.push_proper(b);
            channel.end.theta = PI / 2.0;
            channel.end.constrained = true;
            complete_regular_path(&mut channel, &tend, &hend, &boxes, min_width);
            let ps = self.fit_regular(&channel);
            if ps.is_empty() {
                return Ok(None);
            }
            points.extend(ps);

            trace!(run = sl, "straight vertical run");
            e = self.straight_path(next, sl, &mut points)?;
            self.recover_slack(segfirst.edge, &channel)?;
            segfirst = e;
            (tn, hn) = (e.tail, e.head);
            boxes.clear();
            let in_tail = self
                .graph
                .node(tn)
                .in_edges
                .first()
                .map(|&ie| self.graph.edge(ie).tail);
            tend = PathEnd::new(self.maximal_bbox(tn, in_tail, Some(e.head))?);
            let merge = spline_merge(self.graph, tn);
            begin_path(self.graph, &mut channel, &e, PathKind::Regular, &mut tend, merge);
            let b = make_regular_end(tend.last_box(), Side::BOTTOM, self.bottom_of_rank(tn));
            tend.push_proper(b);
            channel.start.theta = -PI / 2.0;
            channel.start.constrained = true;
            smode = false;
        }

        boxes.push(self.rank_box(self.graph.node(tn).rank)?);
        let mut hend = PathEnd::new(self.maximal_bbox(hn, Some(e.tail), None)?);
        let end_view = if chain_walk { fwdb } else { e };
        let merge = spline_merge(self.graph, e.head);
        end_path(self.graph, &mut channel, &end_view, PathKind::Regular, &mut hend, merge);
        let mut b = hend.nb;
        let last = hend.last_box();
        b.ll.y = last.ll.y;
        b.ur.y = last.ur.y;
        let b = make_regular_end(b, Side::TOP, self.top_of_rank(hn));
        hend.push_proper(b);
        complete_regular_path(&mut channel, &tend, &hend, &boxes, min_width);
        let ps = self.fit_regular(&channel);
        if ps.is_empty() {
            return Ok(None);
        }
        points.extend(ps);
        self.recover_slack(segfirst.edge, &channel)?;

        let hn = if chain_walk { fwdb.head } else { e.head };
        Ok(Some((points, hn)))
    }

    fn bottom_of_rank(&self, n: NodeId) -> f64 {
        let node = self.graph.node(n);
        node.coord.y - self.graph.ranks[node.rank].ht1
    }

    fn top_of_rank(&self, n: NodeId) -> f64 {
        let node = self.graph.node(n);
        node.coord.y + self.graph.ranks[node.rank].ht2
    }

    /// Fit a regular channel; straight styles keep only the end points.
    fn fit_regular(&mut self, channel: &Channel) -> Vec<Point> {
        let mut ps = self.fit(channel);
        if self.config.style == EdgeStyle::Line && ps.len() > 4 {
            let (first, last) = (ps[0], ps[ps.len() - 1]);
            ps = vec![first, first, last, last];
        }
        ps
    }

    /// Skip `cnt` segments below the head of `e` and draw them as one line.
    fn straight_path(
        &self,
        e: EdgeView,
        cnt: usize,
        points: &mut Vec<Point>,
    ) -> Result<EdgeView, RouteError> {
        let mut f = e;
        for _ in 0..cnt {
            f = out0(self.graph, f.head)?;
        }
        if let Some(&last) = points.last() {
            points.extend([last, last]);
        }
        Ok(f)
    }

    /// Move the chain's virtual nodes into the boxes the curve went through,
    /// so later edges see the room this one left.
    fn recover_slack(&mut self, segfirst: EdgeId, channel: &Channel) -> Result<(), RouteError> {
        let mut b = 0;
        let mut vn = self.graph.edge(segfirst).head;
        while self.graph.node(vn).is_virtual() && !spline_merge(self.graph, vn) {
            let y = self.graph.node(vn).coord.y;
            while b < channel.boxes.len() && channel.boxes[b].ll.y > y {
                b += 1;
            }
            if b >= channel.boxes.len() {
                break;
            }
            let r = channel.boxes[b];
            if r.ur.y >= y {
                let node = self.graph.node_mut(vn);
                let (lx, ux) = (r.ll.x.trunc(), r.ur.x.trunc());
                let (cx, rx) = if node.label_owner.is_some() {
                    (ux, (r.ur.x + node.rw).trunc())
                } else {
                    (((r.ll.x + r.ur.x) / 2.0).trunc(), ux)
                };
                node.coord.x = cx;
                node.lw = cx - lx;
                node.rw = rx - cx;
            }
            vn = out0(self.graph, vn)?.head;
        }
        Ok(())
    }

    /// A straight line for `Line` style edges spanning several ranks, bent at
    /// the label if there is one. Adjacent ranks use the boxed path.
    fn make_line_edge(&self, fe: &EdgeView) -> Option<(Vec<Point>, NodeId)> {
        let orig = self.graph.edge(fe.orig);
        let (tn, hn) = (orig.tail, orig.head);
        let delr = self.graph.node(tn).rank.abs_diff(self.graph.node(hn).rank);
        if delr == 1 || (delr == 2 && self.info.has_labels) {
            return None;
        }
        let (tc, hc) = (self.graph.node(tn).coord, self.graph.node(hn).coord);
        let (end, startp, endp) = if fe.tail == tn {
            (hn, tc + orig.tail_port.p, hc + orig.head_port.p)
        } else {
            (tn, hc + orig.head_port.p, tc + orig.tail_port.p)
        };

        let points = match orig.label {
            Some(label) => {
                let size = self.graph.label_dims(&label);
                let mut lp = label.pos.unwrap_or_else(|| startp.lerp(endp, 0.5));
                if left_of(endp, startp, lp) {
                    lp.x += size.width / 2.0;
                    lp.y -= size.height / 2.0;
                } else {
                    lp.x -= size.width / 2.0;
                    lp.y += size.height / 2.0;
                }
                vec![startp, startp, lp, lp, lp, endp, endp]
            }
            None => vec![startp, startp, endp, endp],
        };
        Some((points, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeOptions;
    use crate::route::route_with_defaults;

    fn column(ranks: usize) -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new(18.0, 36.0);
        let top = (ranks as f64 - 1.0) * 72.0;
        let a = graph.add_node("a", 0, Point::new(0.0, top), Size::new(54.0, 36.0));
        let b = graph.add_node("b", ranks - 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        (graph, a, b)
    }

    #[test]
    fn test_straight_len_counts_aligned_virtual_nodes() {
        let (mut graph, a, b) = column(6);
        let e = graph.add_edge(a, b).unwrap();
        let v1 = graph.edge(graph.edge(e).to_virt.unwrap()).head;
        assert_eq!(straight_len(&graph, v1).unwrap(), 3);

        let (mut graph, a, b) = column(6);
        let options = EdgeOptions {
            via: vec![0.0, 0.0, 30.0, 0.0],
            ..Default::default()
        };
        let e = graph.add_edge_with(a, b, options).unwrap();
        let v1 = graph.edge(graph.edge(e).to_virt.unwrap()).head;
        assert_eq!(straight_len(&graph, v1).unwrap(), 1);
    }

    #[test]
    fn test_left_of() {
        let (p1, p2) = (Point::new(0.0, 0.0), Point::new(0.0, 10.0));
        assert!(!left_of(p1, p2, Point::new(5.0, 5.0)));
        assert!(left_of(p1, p2, Point::new(-5.0, 5.0)));
    }

    #[test]
    fn test_long_vertical_edge_stays_in_its_column() {
        let (mut graph, a, b) = column(6);
        let e = graph.add_edge(a, b).unwrap();
        route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();

        let spline = graph.edge(e).spline.clone().unwrap();
        assert_eq!(spline.len() % 3, 1);
        assert!(spline.iter().all(|p| p.x.abs() < 1e-6));
        let (first, last) = (spline[0], spline[spline.len() - 1]);
        assert!((first.y - (graph.node(a).coord.y - 18.0)).abs() < 0.5);
        assert!((last.y - 18.0).abs() < 0.5);
    }

    #[test]
    fn test_line_style_draws_long_edges_straight() {
        let (mut graph, a, b) = column(4);
        let options = EdgeOptions {
            via: vec![40.0, 40.0],
            ..Default::default()
        };
        let e = graph.add_edge_with(a, b, options).unwrap();
        let config = RouteConfig {
            style: EdgeStyle::Line,
            ..Default::default()
        };
        route_with_defaults(&mut graph, &config).unwrap();
        let spline = graph.edge(e).spline.clone().unwrap();
        assert_eq!(spline.len(), 4);
        assert!(spline.iter().all(|p| p.x.abs() < 1e-6));
    }
}
