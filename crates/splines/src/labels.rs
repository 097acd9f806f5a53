use crate::route::RoutePass;
use crate::types::*;

impl RoutePass<'_, '_> {
    /// Set the position of a user edge's label and grow the bounding box to
    /// cover it.
    pub(crate) fn set_label_pos(&mut self, e: EdgeId, pos: Point) {
        let Some(label) = self.graph.edge_mut(e).label.as_mut() else {
            return;
        };
        label.pos = Some(pos);
        let label = *label;
        self.graph.grow_bb_label(&label);
    }

    /// Labels of multi-rank edges go next to the virtual node reserved for
    /// them.
    pub(crate) fn place_vnode_labels(&mut self) {
        for n in self.graph.node_ids() {
            let node = self.graph.node(n);
            if !node.is_virtual() || node.label_owner.is_none() {
                continue;
            }
            let Some(&first) = node.in_edges.first() else {
                continue;
            };
            let orig = self.graph.orig_edge(first);
            if self.failed.contains(&orig) {
                continue;
            }
            let coord = node.coord;
            let Some(label) = self.graph.edge(orig).label else {
                continue;
            };
            let width = self.graph.label_dims(&label).width;
            self.set_label_pos(orig, Point::new(coord.x + width / 2.0, coord.y));
        }
    }

    /// Flat edge labels take the place of the node that reserved their room.
    pub(crate) fn copy_flat_labels(&mut self) {
        for n in self.graph.node_ids() {
            let node = self.graph.node(n);
            let Some(owner) = node.flat_label_owner else {
                continue;
            };
            if self.failed.contains(&owner) {
                continue;
            }
            let coord = node.coord;
            let unset = self
                .graph
                .edge(owner)
                .label
                .is_some_and(|l| l.pos.is_none());
            if unset {
                self.set_label_pos(owner, coord);
            }
        }
    }

    /// Does a curve stored from the lower or left end need reversing to run
    /// from tail to head?
    fn swap_ends(&self, e: EdgeId) -> bool {
        let edge = self.graph.edge(e);
        let (t, h) = (self.graph.node(edge.tail), self.graph.node(edge.head));
        if h.rank != t.rank {
            return h.rank < t.rank;
        }
        h.order < t.order
    }

    /// Make every curve installed by this pass run from its edge's tail to
    /// its head.
    pub(crate) fn normalize_edges(&mut self) {
        let installed: Vec<EdgeId> = self.installed.iter().copied().collect();
        for e in installed {
            if !self.swap_ends(e) {
                continue;
            }
            if let Some(spline) = self.graph.edge_mut(e).spline.as_mut() {
                spline.reverse();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{EdgeOptions, Graph};
    use crate::route::route_with_defaults;
    use crate::types::*;

    #[test]
    fn test_chain_label_right_of_label_node() {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 144.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 2, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        let options = EdgeOptions {
            label: Some(Size::new(40.0, 14.0)),
            ..Default::default()
        };
        let e = graph.add_edge_with(a, b, options).unwrap();
        route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();
        let pos = graph.edge(e).label.unwrap().pos.unwrap();
        // The label node was pushed to the right edge of its box.
        assert_eq!(pos, Point::new(54.0, 72.0));
        let left = pos.x - 20.0;
        let spline = graph.edge(e).spline.clone().unwrap();
        let beside: Vec<&Point> = spline.iter().filter(|p| (p.y - 72.0).abs() < 7.0).collect();
        assert!(!beside.is_empty());
        assert!(beside.iter().all(|p| p.x <= left + 1e-6), "{spline:?}");
    }

    #[test]
    fn test_backward_edge_runs_tail_to_head() {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 72.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        let up = graph.add_edge(b, a).unwrap();
        route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();
        let spline = graph.edge(up).spline.clone().unwrap();
        assert!(spline[0].y < spline[spline.len() - 1].y);
    }

    #[test]
    fn test_flat_edge_right_to_left_is_reversed() {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 0, Point::new(100.0, 0.0), Size::new(54.0, 36.0));
        let back = graph.add_edge(b, a).unwrap();
        route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();
        let spline = graph.edge(back).spline.clone().unwrap();
        assert!(spline[0].x > spline[spline.len() - 1].x);
    }
}
