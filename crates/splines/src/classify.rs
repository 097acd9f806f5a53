use crate::graph::{EdgeKind, Graph};
use crate::types::*;
use std::cmp::Ordering;
use std::ops::Range;

/// Self loops sort first, then flat edges, then edges across ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeShape {
    SelfLoop,
    Flat,
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Which edge list an edge was collected from. `Main` edges own a chain;
/// flat edges, loops and merged multi-edges are `Aux`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tag {
    Main,
    Aux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeClass {
    pub edge: EdgeId,
    pub shape: EdgeShape,
    pub direction: Direction,
    pub tag: Tag,
}

/// An edge read in a chosen orientation, without touching the stored edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView {
    pub edge: EdgeId,
    /// The user edge behind `edge`.
    pub orig: EdgeId,
    pub tail: NodeId,
    pub head: NodeId,
    pub tail_port: Port,
    pub head_port: Port,
    pub reversed: bool,
}

impl EdgeView {
    pub fn of(graph: &Graph, edge: EdgeId) -> Self {
        let e = graph.edge(edge);
        Self {
            edge,
            orig: graph.orig_edge(edge),
            tail: e.tail,
            head: e.head,
            tail_port: e.tail_port,
            head_port: e.head_port,
            reversed: false,
        }
    }

    pub fn flipped(self) -> Self {
        Self {
            tail: self.head,
            head: self.tail,
            tail_port: self.head_port,
            head_port: self.tail_port,
            reversed: !self.reversed,
            ..self
        }
    }
}

/// Tail-to-head reading of a classified edge; backward edges are flipped.
pub fn forward_view(graph: &Graph, class: &EdgeClass) -> EdgeView {
    let view = EdgeView::of(graph, class.edge);
    match class.direction {
        Direction::Forward => view,
        Direction::Backward => view.flipped(),
    }
}

/// Follow merges to the representative, then chain segments to the user edge.
pub fn main_edge(graph: &Graph, mut e: EdgeId) -> EdgeId {
    while let Some(v) = graph.edge(e).to_virt {
        e = v;
    }
    while let Some(o) = graph.edge(e).to_orig {
        e = o;
    }
    e
}

pub fn shape_of(graph: &Graph, e: EdgeId) -> EdgeShape {
    let edge = graph.edge(e);
    if edge.tail == edge.head {
        EdgeShape::SelfLoop
    } else if graph.node(edge.tail).rank == graph.node(edge.head).rank {
        EdgeShape::Flat
    } else {
        EdgeShape::Regular
    }
}

pub fn direction_of(graph: &Graph, e: EdgeId, shape: EdgeShape) -> Direction {
    let edge = graph.edge(e);
    let (t, h) = (graph.node(edge.tail), graph.node(edge.head));
    let forward = match shape {
        EdgeShape::Regular => t.rank < h.rank,
        EdgeShape::Flat => t.order < h.order,
        EdgeShape::SelfLoop => true,
    };
    if forward {
        Direction::Forward
    } else {
        Direction::Backward
    }
}

pub fn classify(
    graph: &Graph,
    e: EdgeId,
    shape: Option<EdgeShape>,
    direction: Option<Direction>,
    tag: Tag,
) -> EdgeClass {
    let shape = shape.unwrap_or_else(|| shape_of(graph, e));
    let direction = direction.unwrap_or_else(|| direction_of(graph, e, shape));
    EdgeClass {
        edge: e,
        shape,
        direction,
        tag,
    }
}

/// Virtual node where several chains meet.
pub fn spline_merge(graph: &Graph, n: NodeId) -> bool {
    let node = graph.node(n);
    node.is_virtual() && (node.in_edges.len() > 1 || node.out_edges.len() > 1)
}

/// Gather every edge to route, rank by rank and node by node.
pub fn collect_edges(graph: &Graph) -> Vec<EdgeClass> {
    let mut classes = Vec::new();
    for rank in &graph.ranks {
        for &n in &rank.nodes {
            let node = graph.node(n);
            if node.is_virtual() && !spline_merge(graph, n) {
                continue;
            }
            for &e in &node.out_edges {
                if graph.edge(e).kind == EdgeKind::FlatOrder {
                    continue;
                }
                classes.push(classify(
                    graph,
                    e,
                    Some(EdgeShape::Regular),
                    Some(Direction::Forward),
                    Tag::Main,
                ));
            }
            for &e in &node.flat_out {
                classes.push(classify(graph, e, Some(EdgeShape::Flat), None, Tag::Aux));
            }
            for &e in &node.other {
                classes.push(classify(graph, e, None, None, Tag::Aux));
            }
        }
    }
    classes
}

/// The edge whose ports decide the class: the edge itself when it has a
/// port, else its main edge, read forward.
fn port_view(graph: &Graph, class: &EdgeClass) -> EdgeView {
    let edge = graph.edge(class.edge);
    let ea = if edge.tail_port.defined || edge.head_port.defined {
        class.edge
    } else {
        main_edge(graph, class.edge)
    };
    let view = EdgeView::of(graph, ea);
    let shape = shape_of(graph, ea);
    match direction_of(graph, ea, shape) {
        Direction::Forward => view,
        Direction::Backward => view.flipped(),
    }
}

fn label_key(graph: &Graph, class: &EdgeClass) -> Option<EdgeId> {
    (class.shape == EdgeShape::Flat && graph.edge(class.edge).label.is_some()).then_some(class.edge)
}

fn span_of(graph: &Graph, le: EdgeId) -> (i64, i64) {
    let edge = graph.edge(le);
    let (t, h) = (graph.node(edge.tail), graph.node(edge.head));
    let ranks = (t.rank as i64 - h.rank as i64).abs();
    let dx = ((t.coord.x - h.coord.x) as i64).abs();
    (ranks, dx)
}

pub fn compare_classes(graph: &Graph, a: &EdgeClass, b: &EdgeClass) -> Ordering {
    let (la, lb) = (main_edge(graph, a.edge), main_edge(graph, b.edge));
    let (va, vb) = (port_view(graph, a), port_view(graph, b));
    a.shape
        .cmp(&b.shape)
        .then_with(|| span_of(graph, la).cmp(&span_of(graph, lb)))
        .then_with(|| la.cmp(&lb))
        .then_with(|| va.tail_port.compare(&vb.tail_port))
        .then_with(|| va.head_port.compare(&vb.head_port))
        .then_with(|| a.tag.cmp(&b.tag))
        .then_with(|| label_key(graph, a).cmp(&label_key(graph, b)))
        .then_with(|| a.edge.cmp(&b.edge))
}

pub fn sort_edges(graph: &Graph, classes: &mut [EdgeClass]) {
    classes.sort_by(|a, b| compare_classes(graph, a, b));
}

/// Split sorted edges into runs routed together.
pub fn group_classes(graph: &Graph, classes: &[EdgeClass]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < classes.len() {
        let start = i;
        let e0 = &classes[i];
        let le0 = main_edge(graph, e0.edge);
        let ea = port_view(graph, e0);
        let adjacent = graph.edge(e0.edge).adjacent;
        i += 1;
        while i < classes.len() {
            let e1 = &classes[i];
            if main_edge(graph, e1.edge) != le0 {
                break;
            }
            if adjacent {
                // The adjacent flat builder takes every edge between the pair.
                i += 1;
                continue;
            }
            let eb = port_view(graph, e1);
            if !ea.tail_port.compare(&eb.tail_port).is_eq()
                || !ea.head_port.compare(&eb.head_port).is_eq()
            {
                break;
            }
            if e0.shape == EdgeShape::Flat && label_key(graph, e0) != label_key(graph, e1) {
                break;
            }
            if e1.tag == Tag::Main {
                break;
            }
            i += 1;
        }
        groups.push(start..i);
    }
    groups
}
