use crate::boxes::RankCache;
use crate::classify::{self, EdgeClass, EdgeShape, EdgeView};
use crate::clip::RectClipper;
use crate::collab::{BoxFitter, Collaborators};
use crate::graph::Graph;
use crate::pipeline::PairLayout;
use crate::types::*;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Spacing shared by every builder of one pass.
#[derive(Debug, Clone)]
pub(crate) struct SplineInfo {
    pub left_bound: f64,
    pub right_bound: f64,
    pub splinesep: f64,
    pub multisep: f64,
    pub has_labels: bool,
    pub ranks: RankCache,
}

impl SplineInfo {
    fn new(graph: &Graph, min_width: f64) -> Self {
        let (mut left_bound, mut right_bound) = (0.0f64, 0.0f64);
        for rank in &graph.ranks {
            if let Some(&n) = rank.nodes.first() {
                let node = graph.node(n);
                left_bound = left_bound.min(node.coord.x - node.lw);
            }
            if let Some(&n) = rank.nodes.last() {
                let node = graph.node(n);
                right_bound = right_bound.max(node.coord.x + node.rw);
            }
            left_bound -= min_width;
            right_bound += min_width;
        }
        Self {
            left_bound,
            right_bound,
            splinesep: graph.nodesep / 4.0,
            multisep: graph.nodesep,
            has_labels: graph.has_edge_labels(),
            ranks: RankCache::new(graph.ranks.len()),
        }
    }
}

/// State of one routing pass over a graph.
pub(crate) struct RoutePass<'a, 'c> {
    pub graph: &'a mut Graph,
    pub config: &'a RouteConfig,
    pub collab: &'a mut Collaborators<'c>,
    pub info: SplineInfo,
    /// User edges whose channel could not be fitted.
    pub failed: BTreeSet<EdgeId>,
    /// User edges that received a curve in this pass.
    pub installed: BTreeSet<EdgeId>,
}

/// Route every edge of a ranked and positioned graph.
///
/// Each user edge gets its bezier control points in `Edge::spline` and each
/// label its position. An edge whose channel cannot be fitted is skipped
/// with a warning; the pass still returns `Ok`. Structural problems in the
/// graph come back as a [`RouteError`].
pub fn route_edges(
    graph: &mut Graph,
    config: &RouteConfig,
    collab: &mut Collaborators<'_>,
) -> Result<(), RouteError> {
    route_graph(graph, config, collab, true)
}

/// [`route_edges`] with [`BoxFitter`], [`RectClipper`] and [`PairLayout`].
pub fn route_with_defaults(graph: &mut Graph, config: &RouteConfig) -> Result<(), RouteError> {
    let mut fitter = BoxFitter::default();
    let mut installer = RectClipper;
    let mut pipeline = PairLayout;
    let mut collab = Collaborators {
        fitter: &mut fitter,
        installer: &mut installer,
        pipeline: &mut pipeline,
    };
    route_edges(graph, config, &mut collab)
}

pub(crate) fn route_graph(
    graph: &mut Graph,
    config: &RouteConfig,
    collab: &mut Collaborators<'_>,
    normalize: bool,
) -> Result<(), RouteError> {
    if config.style == EdgeStyle::None || graph.ranks.is_empty() {
        return Ok(());
    }
    graph.validate()?;

    let mut classes = classify::collect_edges(graph);
    classify::sort_edges(graph, &mut classes);
    let groups = classify::group_classes(graph, &classes);
    debug!(
        edges = classes.len(),
        classes = groups.len(),
        "routing edges"
    );

    let mut pass = RoutePass::new(graph, config, collab);

    if config.style == EdgeStyle::Line {
        pass.place_vnode_labels();
    }
    for range in groups {
        let class = &classes[range];
        match class[0].shape {
            EdgeShape::SelfLoop => pass.make_self_edges(class)?,
            EdgeShape::Flat => pass.make_flat_edges(class)?,
            EdgeShape::Regular => pass.make_regular_edges(class)?,
        }
    }
    pass.place_vnode_labels();
    pass.copy_flat_labels();
    if normalize {
        pass.normalize_edges();
    }
    Ok(())
}

impl<'a, 'c> RoutePass<'a, 'c> {
    pub fn new(
        graph: &'a mut Graph,
        config: &'a RouteConfig,
        collab: &'a mut Collaborators<'c>,
    ) -> Self {
        let info = SplineInfo::new(graph, config.min_width);
        Self {
            graph,
            config,
            collab,
            info,
            failed: BTreeSet::new(),
            installed: BTreeSet::new(),
        }
    }

    pub fn spline(&self) -> bool {
        self.config.style == EdgeStyle::Spline
    }

    pub fn fit(&mut self, channel: &Channel) -> Vec<Point> {
        tracing::trace!(boxes = channel.boxes.len(), "fitting channel");
        self.collab.fitter.fit_channel(channel, self.spline())
    }

    pub fn install(&mut self, view: &EdgeView, head: NodeId, points: &[Point]) {
        self.collab
            .installer
            .clip_and_install(self.graph, view, head, points);
        self.installed.insert(view.orig);
    }

    /// Record an infeasible channel for every user edge of `class`.
    pub fn fail_class(&mut self, class: &[EdgeClass]) {
        for c in class {
            self.fail_edge(c.edge);
        }
    }

    pub fn fail_edge(&mut self, e: EdgeId) {
        let orig = self.graph.orig_edge(e);
        let edge = self.graph.edge(orig);
        warn!(
            tail = %self.graph.node(edge.tail).name,
            head = %self.graph.node(edge.head).name,
            "unable to fit a curve through the edge channel"
        );
        self.failed.insert(orig);
    }
}
