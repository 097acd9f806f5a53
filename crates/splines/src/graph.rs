use crate::types::*;
use serde::{Deserialize, Serialize};

/// Extra room reserved to the right of a node for each self loop.
pub const SELF_EDGE_SIZE: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Real,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// An edge of the user's graph.
    Normal,
    /// One segment of the chain carrying a user edge across ranks.
    Virtual,
    /// Keeps a flat label node above its edge; never drawn.
    FlatOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub rank: usize,
    pub order: usize,
    pub coord: Point,
    pub lw: f64,
    pub rw: f64,
    pub ht: f64,
    /// Room to the right of `rw` reserved for self loops.
    pub loop_rw: f64,
    /// The edge whose label this virtual node carries.
    pub label_owner: Option<EdgeId>,
    /// The flat edge whose label this virtual node reserves.
    pub flat_label_owner: Option<EdgeId>,
    pub cluster: Option<ClusterId>,
    pub out_edges: Vec<EdgeId>,
    pub in_edges: Vec<EdgeId>,
    pub flat_out: Vec<EdgeId>,
    pub flat_in: Vec<EdgeId>,
    /// Merged multi-edges and self loops.
    pub other: Vec<EdgeId>,
}

impl Node {
    pub fn real(name: impl Into<String>, size: Size) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Real,
            rank: 0,
            order: 0,
            coord: Point::default(),
            lw: size.width / 2.0,
            rw: size.width / 2.0,
            ht: size.height,
            loop_rw: 0.0,
            label_owner: None,
            flat_label_owner: None,
            cluster: None,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            flat_out: Vec::new(),
            flat_in: Vec::new(),
            other: Vec::new(),
        }
    }

    pub fn virtual_node() -> Self {
        Self {
            name: String::new(),
            kind: NodeKind::Virtual,
            ..Node::real("", Size::new(2.0, 1.0))
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == NodeKind::Virtual
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.coord.x - self.lw,
            self.coord.y - self.ht / 2.0,
            self.coord.x + self.rw,
            self.coord.y + self.ht / 2.0,
        )
    }

    /// Half height rounded up to whole points.
    pub fn ht2(&self) -> f64 {
        ((self.ht.round() as i64 + 1) / 2) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub tail: NodeId,
    pub head: NodeId,
    pub kind: EdgeKind,
    pub tail_port: Port,
    pub head_port: Port,
    pub label: Option<Label>,
    pub to_virt: Option<EdgeId>,
    pub to_orig: Option<EdgeId>,
    /// A flat edge whose endpoints have no real node between them.
    pub adjacent: bool,
    pub weight: f64,
    /// Bezier control points, `3n + 1` of them, installed by routing.
    pub spline: Option<Vec<Point>>,
}

impl Edge {
    pub fn new(tail: NodeId, head: NodeId) -> Self {
        Self {
            tail,
            head,
            kind: EdgeKind::Normal,
            tail_port: Port::default(),
            head_port: Port::default(),
            label: None,
            to_virt: None,
            to_orig: None,
            adjacent: false,
            weight: 1.0,
            spline: None,
        }
    }

    fn segment(tail: NodeId, head: NodeId, orig: EdgeId, kind: EdgeKind) -> Self {
        Self {
            kind,
            to_orig: Some(orig),
            ..Edge::new(tail, head)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rank {
    pub nodes: Vec<NodeId>,
    /// Extent below the rank's center line.
    pub ht1: f64,
    /// Extent above the rank's center line.
    pub ht2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub bb: Rect,
}

/// Extra attributes for [`Graph::add_edge_with`].
#[derive(Debug, Clone, Default)]
pub struct EdgeOptions {
    pub tail_port: Port,
    pub head_port: Port,
    pub label: Option<Size>,
    /// x coordinates of the chain's virtual nodes, one per intermediate rank.
    pub via: Vec<f64>,
    pub weight: Option<f64>,
}

/// A ranked and positioned graph, y growing upward with rank 0 on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub ranks: Vec<Rank>,
    pub clusters: Vec<Cluster>,
    pub nodesep: f64,
    pub ranksep: f64,
    /// The drawing is rotated by 90 degrees after layout.
    pub flip: bool,
    pub bb: Option<Rect>,
}

impl Graph {
    pub fn new(nodesep: f64, ranksep: f64) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            ranks: Vec::new(),
            clusters: Vec::new(),
            nodesep,
            ranksep,
            flip: false,
            bb: None,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + use<> {
        (0..self.edges.len()).map(EdgeId)
    }

    pub fn max_rank(&self) -> usize {
        self.ranks.len().saturating_sub(1)
    }

    /// Leftmost node of a rank.
    pub fn rank_leader(&self, rank: usize) -> Result<NodeId, RouteError> {
        self.ranks
            .get(rank)
            .and_then(|r| r.nodes.first().copied())
            .ok_or(RouteError::EmptyRank { rank })
    }

    pub fn add_cluster(&mut self, name: impl Into<String>, bb: Rect) -> ClusterId {
        self.clusters.push(Cluster {
            name: name.into(),
            bb,
        });
        ClusterId(self.clusters.len() - 1)
    }

    pub fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn push_edge(&mut self, edge: Edge) -> EdgeId {
        self.edges.push(edge);
        EdgeId(self.edges.len() - 1)
    }

    /// Put a node on a rank, keeping the rank ordered by x.
    pub fn place(&mut self, id: NodeId, rank: usize, coord: Point) {
        if self.ranks.len() <= rank {
            self.ranks.resize_with(rank + 1, Rank::default);
        }
        let at = self.ranks[rank]
            .nodes
            .iter()
            .position(|&n| self.nodes[n.0].coord.x > coord.x)
            .unwrap_or(self.ranks[rank].nodes.len());
        self.ranks[rank].nodes.insert(at, id);
        for (order, &n) in self.ranks[rank].nodes.iter().enumerate() {
            self.nodes[n.0].order = order;
        }

        let node = &mut self.nodes[id.0];
        node.rank = rank;
        node.coord = coord;
        let half = node.ht / 2.0;
        let bounds = node.bounds();
        let r = &mut self.ranks[rank];
        r.ht1 = r.ht1.max(half);
        r.ht2 = r.ht2.max(half);
        self.grow_bb(bounds);
    }

    pub fn add_node(&mut self, name: &str, rank: usize, coord: Point, size: Size) -> NodeId {
        let id = self.push_node(Node::real(name, size));
        self.place(id, rank, coord);
        id
    }

    pub fn add_edge(&mut self, tail: NodeId, head: NodeId) -> Result<EdgeId, RouteError> {
        self.add_edge_with(tail, head, EdgeOptions::default())
    }

    /// Add a user edge and build the structure routing expects for it: the
    /// virtual chain across intermediate ranks, flat edge bookkeeping, or the
    /// merge onto an equivalent edge's chain.
    pub fn add_edge_with(
        &mut self,
        tail: NodeId,
        head: NodeId,
        options: EdgeOptions,
    ) -> Result<EdgeId, RouteError> {
        let mut edge = Edge::new(tail, head);
        edge.tail_port = options.tail_port;
        edge.head_port = options.head_port;
        edge.label = options.label.map(|s| Label::new(s.width, s.height));
        if let Some(weight) = options.weight {
            edge.weight = weight;
        }
        let id = self.push_edge(edge);
        self.connect(id, &options.via)?;
        Ok(id)
    }

    /// Register an already pushed user edge with the ranked structure.
    pub fn connect(&mut self, id: EdgeId, via: &[f64]) -> Result<(), RouteError> {
        let (tail, head) = (self.edge(id).tail, self.edge(id).head);
        let (rt, rh) = (self.node(tail).rank, self.node(head).rank);

        if tail == head {
            // Loops with the same ports share the first one as their class witness.
            let rep = self.node(tail).other.iter().copied().find(|&f| {
                let fe = self.edge(f);
                fe.tail == fe.head
                    && fe.to_virt.is_none()
                    && fe.tail_port.compare(&self.edge(id).tail_port).is_eq()
                    && fe.head_port.compare(&self.edge(id).head_port).is_eq()
            });
            self.edge_mut(id).to_virt = rep;
            let reserve = self.self_right_space(id);
            let node = self.node_mut(tail);
            node.other.push(id);
            node.loop_rw += reserve;
            return Ok(());
        }

        if rt == rh {
            return self.connect_flat(id);
        }

        let (upper, lower) = if rt < rh { (tail, head) } else { (head, tail) };
        if let Some(rep) = self.mergeable_with(id, upper) {
            self.edge_mut(id).to_virt = Some(rep);
            self.node_mut(tail).other.push(id);
            return Ok(());
        }

        if rt + 1 == rh {
            self.node_mut(tail).out_edges.push(id);
            self.node_mut(head).in_edges.push(id);
            return Ok(());
        }

        let (upper_port, lower_port) = if rt < rh {
            (self.edge(id).tail_port, self.edge(id).head_port)
        } else {
            (self.edge(id).head_port, self.edge(id).tail_port)
        };
        let (top, bottom) = (self.node(upper).rank, self.node(lower).rank);
        let label_rank = (top + bottom) / 2;
        let label_size = self.edge(id).label.map(|l| self.label_dims(&l));
        let (p0, p1) = (self.node(upper).coord, self.node(lower).coord);

        let mut prev = upper;
        let mut first = None;
        for (i, rank) in (top + 1..bottom).enumerate() {
            let t = (rank - top) as f64 / (bottom - top) as f64;
            let x = via.get(i).copied().unwrap_or(p0.x + (p1.x - p0.x) * t);
            let y = match self.ranks.get(rank).and_then(|r| r.nodes.first()) {
                Some(&n) => self.node(n).coord.y,
                None => p0.y + (p1.y - p0.y) * t,
            };
            let mut vn = Node::virtual_node();
            if let (Some(size), true) = (label_size, rank == label_rank) {
                vn.rw += size.width;
                vn.ht = vn.ht.max(size.height);
                vn.label_owner = Some(id);
            }
            let vn = self.push_node(vn);
            self.place(vn, rank, Point::new(x, y));
            let seg = self.push_segment(prev, vn, id, EdgeKind::Virtual);
            if prev == upper {
                self.edge_mut(seg).tail_port = upper_port;
            }
            first.get_or_insert(seg);
            prev = vn;
        }
        let seg = self.push_segment(prev, lower, id, EdgeKind::Virtual);
        self.edge_mut(seg).head_port = lower_port;
        if prev == upper {
            self.edge_mut(seg).tail_port = upper_port;
        }
        self.edge_mut(id).to_virt = Some(first.unwrap_or(seg));
        Ok(())
    }

    fn connect_flat(&mut self, id: EdgeId) -> Result<(), RouteError> {
        let (tail, head) = (self.edge(id).tail, self.edge(id).head);
        let adjacent = self.flat_adjacent(tail, head);
        // Neighbors share one class whatever their labels and ports.
        let same_way = self.node(tail).flat_out.iter().copied().find(|&f| {
            let fe = self.edge(f);
            fe.kind == EdgeKind::Normal && fe.head == head && (adjacent || self.mergeable(f, id))
        });
        let rep = same_way.or_else(|| {
            self.node(head).flat_out.iter().copied().find(|&f| {
                let (fe, e) = (self.edge(f), self.edge(id));
                fe.kind == EdgeKind::Normal
                    && fe.head == tail
                    && (adjacent
                        || (fe.label.is_none()
                            && e.label.is_none()
                            && fe.tail_port.compare(&e.head_port).is_eq()
                            && fe.head_port.compare(&e.tail_port).is_eq()))
            })
        });
        if let Some(rep) = rep {
            let edge = self.edge_mut(id);
            edge.to_virt = Some(rep);
            edge.adjacent = adjacent;
            self.node_mut(tail).other.push(id);
            return Ok(());
        }

        self.edge_mut(id).adjacent = adjacent;
        self.node_mut(tail).flat_out.push(id);
        self.node_mut(head).flat_in.push(id);

        if let (Some(label), false) = (self.edge(id).label, adjacent) {
            self.add_flat_label_node(id, label)?;
        }
        Ok(())
    }

    /// Reserve room for a flat edge's label on the rank above it.
    fn add_flat_label_node(&mut self, id: EdgeId, label: Label) -> Result<(), RouteError> {
        let (tail, head) = (self.edge(id).tail, self.edge(id).head);
        let rank = self.node(tail).rank;
        if rank == 0 {
            return Err(RouteError::NoLabelRank { edge: id });
        }
        let size = self.label_dims(&label);
        let (t, h) = (self.node(tail).coord, self.node(head).coord);
        let y = match self.ranks[rank - 1].nodes.first() {
            Some(&n) => self.node(n).coord.y,
            None => t.y + self.ranksep + self.ranks[rank].ht2 + size.height / 2.0,
        };

        let mut vn = Node::virtual_node();
        vn.lw = size.width / 2.0;
        vn.rw = size.width / 2.0;
        vn.ht = size.height;
        vn.label_owner = Some(id);
        vn.flat_label_owner = Some(id);
        let vn = self.push_node(vn);
        self.place(vn, rank - 1, Point::new((t.x + h.x) / 2.0, y));

        self.push_segment(vn, tail, id, EdgeKind::FlatOrder);
        let to_head = self.push_segment(vn, head, id, EdgeKind::FlatOrder);
        self.edge_mut(id).to_virt = Some(to_head);
        Ok(())
    }

    fn push_segment(&mut self, tail: NodeId, head: NodeId, orig: EdgeId, kind: EdgeKind) -> EdgeId {
        let seg = self.push_edge(Edge::segment(tail, head, orig, kind));
        self.node_mut(tail).out_edges.push(seg);
        self.node_mut(head).in_edges.push(seg);
        seg
    }

    /// The first fast edge of an equivalent edge leaving `upper`, if any.
    fn mergeable_with(&self, id: EdgeId, upper: NodeId) -> Option<EdgeId> {
        let (tail, head) = (self.edge(id).tail, self.edge(id).head);
        self.node(upper).out_edges.iter().copied().find(|&f| {
            let orig = self.edge(f).to_orig.unwrap_or(f);
            let o = self.edge(orig);
            orig != id
                && o.kind == EdgeKind::Normal
                && o.tail == tail
                && o.head == head
                && self.mergeable(orig, id)
        })
    }

    fn mergeable(&self, a: EdgeId, b: EdgeId) -> bool {
        let (a, b) = (self.edge(a), self.edge(b));
        a.label.is_none()
            && b.label.is_none()
            && a.tail_port.compare(&b.tail_port).is_eq()
            && a.head_port.compare(&b.head_port).is_eq()
    }

    /// No real node or label node sits between the two nodes of a rank.
    pub fn flat_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        let (a, b) = (self.node(a), self.node(b));
        let (lo, hi) = (a.order.min(b.order), a.order.max(b.order));
        self.ranks[a.rank].nodes[lo + 1..hi].iter().all(|&n| {
            let n = self.node(n);
            n.is_virtual() && n.label_owner.is_none()
        })
    }

    /// Room a self loop needs on the right of its node, zero if it goes elsewhere.
    pub fn self_right_space(&self, id: EdgeId) -> f64 {
        let e = self.edge(id);
        let (tp, hp) = (e.tail_port, e.head_port);
        let goes_right = (!tp.defined && !hp.defined)
            || (!tp.side.intersects(Side::LEFT)
                && !hp.side.intersects(Side::LEFT)
                && (tp.side != hp.side || !tp.side.intersects(Side::TOP | Side::BOTTOM)));
        if !goes_right {
            return 0.0;
        }
        SELF_EDGE_SIZE + e.label.map_or(0.0, |l| self.label_dims(&l).width)
    }

    /// Label size in layout coordinates.
    pub fn label_dims(&self, label: &Label) -> Size {
        if self.flip {
            label.size.transposed()
        } else {
            label.size
        }
    }

    pub fn has_edge_labels(&self) -> bool {
        self.edges
            .iter()
            .any(|e| e.kind == EdgeKind::Normal && e.label.is_some())
    }

    /// Walk chain segments back to the user edge.
    pub fn orig_edge(&self, mut id: EdgeId) -> EdgeId {
        while self.edge(id).kind != EdgeKind::Normal {
            match self.edge(id).to_orig {
                Some(o) => id = o,
                None => break,
            }
        }
        id
    }

    pub fn grow_bb(&mut self, r: Rect) {
        self.bb = Some(match self.bb {
            Some(bb) => bb.union(&r),
            None => r,
        });
    }

    pub fn grow_bb_label(&mut self, label: &Label) {
        if let Some(pos) = label.pos {
            let size = self.label_dims(label);
            self.grow_bb(Rect::around(pos, size));
        }
    }

    /// Every node sits on an existing rank at its recorded order.
    pub fn validate(&self) -> Result<(), RouteError> {
        for id in self.node_ids() {
            let node = self.node(id);
            let placed = self
                .ranks
                .get(node.rank)
                .is_some_and(|r| r.nodes.get(node.order) == Some(&id));
            if !placed {
                return Err(RouteError::RankOutOfRange {
                    node: id,
                    rank: node.rank,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rank_graph() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 3, Point::new(0.0, -116.0), Size::new(54.0, 36.0));
        (graph, a, b)
    }

    #[test]
    fn test_chain_through_intermediate_ranks() {
        let (mut graph, a, b) = two_rank_graph();
        graph.add_node("x", 1, Point::new(-80.0, 28.0), Size::new(54.0, 36.0));
        let e = graph.add_edge(a, b).unwrap();

        let first = graph.edge(e).to_virt.unwrap();
        let mut seg = first;
        let mut hops = 1;
        while graph.node(graph.edge(seg).head).is_virtual() {
            let vn = graph.edge(seg).head;
            assert_eq!(graph.node(vn).out_edges.len(), 1);
            seg = graph.node(vn).out_edges[0];
            hops += 1;
        }
        assert_eq!(hops, 3);
        assert_eq!(graph.edge(seg).head, b);
        assert_eq!(graph.orig_edge(seg), e);
        // Virtual nodes take the rank's y and keep the rank ordered by x.
        let vn = graph.edge(first).head;
        assert_eq!(graph.node(vn).coord.y, 28.0);
        assert_eq!(graph.node(vn).order, 1);
    }

    #[test]
    fn test_parallel_edges_merge_onto_one_chain() {
        let (mut graph, a, b) = two_rank_graph();
        let e0 = graph.add_edge(a, b).unwrap();
        let e1 = graph.add_edge(a, b).unwrap();
        assert_eq!(graph.node(a).out_edges.len(), 1);
        assert_eq!(graph.node(a).other, vec![e1]);
        assert_eq!(graph.edge(e1).to_virt, graph.edge(e0).to_virt);
    }

    #[test]
    fn test_flat_label_node_sits_on_rank_above() {
        let mut graph = Graph::new(18.0, 36.0);
        graph.add_node("top", 0, Point::new(0.0, 80.0), Size::new(54.0, 36.0));
        let a = graph.add_node("a", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
        graph.add_node("m", 1, Point::new(80.0, 0.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 1, Point::new(160.0, 0.0), Size::new(54.0, 36.0));
        let options = EdgeOptions {
            label: Some(Size::new(30.0, 12.0)),
            ..Default::default()
        };
        let e = graph.add_edge_with(a, b, options).unwrap();

        assert!(!graph.edge(e).adjacent);
        let to_head = graph.edge(e).to_virt.unwrap();
        let ln = graph.edge(to_head).tail;
        assert_eq!(graph.node(ln).rank, 0);
        assert_eq!(graph.node(ln).flat_label_owner, Some(e));
        assert_eq!(graph.node(ln).coord, Point::new(80.0, 80.0));
        assert_eq!(graph.edge(to_head).kind, EdgeKind::FlatOrder);
        assert!(graph.node(ln).in_edges.is_empty());
    }

    #[test]
    fn test_self_loop_reserves_right_space() {
        let (mut graph, a, _) = two_rank_graph();
        let options = EdgeOptions {
            label: Some(Size::new(20.0, 10.0)),
            ..Default::default()
        };
        let first = graph.add_edge_with(a, a, options).unwrap();
        assert_eq!(graph.node(a).loop_rw, SELF_EDGE_SIZE + 20.0);
        assert_eq!(graph.node(a).other.len(), 1);

        let second = graph.add_edge(a, a).unwrap();
        assert_eq!(graph.edge(second).to_virt, Some(first));
        assert_eq!(graph.node(a).loop_rw, 2.0 * SELF_EDGE_SIZE + 20.0);
    }

    #[test]
    fn test_validate_rejects_unplaced_node() {
        let (mut graph, _, _) = two_rank_graph();
        graph.push_node(Node::real("loose", Size::new(10.0, 10.0)));
        assert!(matches!(
            graph.validate(),
            Err(RouteError::RankOutOfRange { .. })
        ));
    }
}
