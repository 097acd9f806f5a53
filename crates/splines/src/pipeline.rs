use crate::collab::LayoutPipeline;
use crate::graph::{EdgeKind, Graph};
use crate::types::*;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, DfsEvent};
use std::collections::BTreeSet;
use tracing::debug;

/// A small layered layout for graphs routing builds on its own.
///
/// Ranks by longest path after reversing the back edges a depth first
/// search meets, packs each rank left to right in insertion order, then
/// builds the virtual chains. Ranks holding virtual nodes are re-packed
/// around the heaviest chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairLayout;

impl PairLayout {
    fn ranks(graph: &Graph) -> Result<Vec<usize>, RouteError> {
        let mut g = DiGraph::<(), ()>::new();
        let ids: Vec<NodeIndex> = graph.node_ids().map(|_| g.add_node(())).collect();
        let user: Vec<(usize, usize)> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Normal && e.tail != e.head)
            .map(|e| (e.tail.0, e.head.0))
            .collect();
        for &(t, h) in &user {
            g.add_edge(ids[t], ids[h], ());
        }
        let mut back = BTreeSet::new();
        depth_first_search(&g, g.node_indices(), |event| {
            if let DfsEvent::BackEdge(u, v) = event {
                back.insert((u.index(), v.index()));
            }
        });

        let mut dag = DiGraph::<(), ()>::new();
        let dids: Vec<NodeIndex> = ids.iter().map(|_| dag.add_node(())).collect();
        for &(t, h) in &user {
            let (t, h) = if back.contains(&(t, h)) { (h, t) } else { (t, h) };
            dag.add_edge(dids[t], dids[h], ());
        }
        let order = toposort(&dag, None).map_err(|cycle| {
            RouteError::Pipeline(format!("cycle through node {}", cycle.node_id().index()))
        })?;

        let minlen = if graph.has_edge_labels() { 2 } else { 1 };
        let mut rank = vec![0usize; ids.len()];
        for n in order {
            for m in dag.neighbors(n) {
                rank[m.index()] = rank[m.index()].max(rank[n.index()] + minlen);
            }
        }
        Ok(rank)
    }

    /// Pack a rank left to right keeping the heaviest chain's node where it was.
    fn pack(graph: &mut Graph, r: usize) {
        let nodes = graph.ranks[r].nodes.clone();
        if nodes.iter().all(|&n| !graph.node(n).is_virtual()) {
            return;
        }
        let weight = |graph: &Graph, n: NodeId| {
            graph
                .node(n)
                .in_edges
                .first()
                .map_or(0.0, |&e| graph.edge(graph.orig_edge(e)).weight)
        };
        let anchor = nodes
            .iter()
            .copied()
            .max_by(|&a, &b| weight(graph, a).total_cmp(&weight(graph, b)).then(b.0.cmp(&a.0)));
        let Some(anchor) = anchor else {
            return;
        };
        let before = graph.node(anchor).coord.x;

        let mut x = 0.0;
        let mut placed = Vec::with_capacity(nodes.len());
        for (i, &n) in nodes.iter().enumerate() {
            let node = graph.node(n);
            if i > 0 {
                x += node.lw;
            }
            placed.push(x);
            x += node.rw + graph.nodesep;
        }
        let at = nodes.iter().position(|&n| n == anchor).unwrap_or(0);
        let shift = before - placed[at];
        for (&n, px) in nodes.iter().zip(placed) {
            graph.node_mut(n).coord.x = px + shift;
        }
    }
}

impl LayoutPipeline for PairLayout {
    fn layout(&mut self, graph: &mut Graph) -> Result<(), RouteError> {
        if !graph.ranks.is_empty() {
            return Err(RouteError::Pipeline("graph is already ranked".into()));
        }
        let rank = Self::ranks(graph)?;
        let max_rank = rank.iter().copied().max().unwrap_or(0);

        let mut half = vec![0.0f64; max_rank + 1];
        for id in graph.node_ids() {
            half[rank[id.0]] = half[rank[id.0]].max(graph.node(id).ht / 2.0);
        }
        let label_half = graph
            .edges
            .iter()
            .filter_map(|e| e.label)
            .map(|l| graph.label_dims(&l).height / 2.0)
            .fold(0.0, f64::max);
        for h in half.iter_mut() {
            if *h == 0.0 {
                *h = label_half;
            }
        }
        let mut y = vec![0.0; max_rank + 1];
        for r in (0..max_rank).rev() {
            y[r] = y[r + 1] + half[r + 1] + graph.ranksep + half[r];
        }

        let mut next_x = vec![None::<f64>; max_rank + 1];
        for id in graph.node_ids() {
            let r = rank[id.0];
            let node = graph.node(id);
            let x = next_x[r].map_or(0.0, |x| x + node.lw);
            next_x[r] = Some(x + node.rw + graph.nodesep);
            graph.place(id, r, Point::new(x, y[r]));
        }

        let user: Vec<EdgeId> = graph
            .edge_ids()
            .filter(|&e| graph.edge(e).kind == EdgeKind::Normal)
            .collect();
        for e in user {
            graph.connect(e, &[])?;
        }
        for r in 0..graph.ranks.len() {
            Self::pack(graph, r);
        }
        debug!(nodes = graph.nodes.len(), ranks = graph.ranks.len(), "laid out auxiliary graph");
        Ok(())
    }
}
