use archviz_splines::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use svg::parser::Event;
use tracing_test::traced_test;

/// Keeps every curve before clipping, then installs it like the default installer.
#[derive(Default)]
struct RecordingInstaller {
    curves: Vec<(EdgeId, Vec<Point>)>,
}

impl CurveInstaller for RecordingInstaller {
    fn clip_and_install(
        &mut self,
        graph: &mut Graph,
        view: &EdgeView,
        head: NodeId,
        points: &[Point],
    ) {
        self.curves.push((view.orig, points.to_vec()));
        RectClipper.clip_and_install(graph, view, head, points);
    }
}

/// Gives up on every channel starting in `tail`.
struct FailingFitter {
    tail: Rect,
}

impl CurveFitter for FailingFitter {
    fn fit_channel(&mut self, channel: &Channel, spline: bool) -> Vec<Point> {
        if self.tail.contains(channel.start.p) {
            return Vec::new();
        }
        BoxFitter.fit_channel(channel, spline)
    }

    fn fit_polygon(
        &mut self,
        tail: Point,
        head: Point,
        polygon: &[Point],
        polyline: bool,
    ) -> Vec<Point> {
        BoxFitter.fit_polygon(tail, head, polygon, polyline)
    }
}

fn route_recorded(graph: &mut Graph) -> (RecordingFitter<BoxFitter>, RecordingInstaller) {
    let mut fitter = RecordingFitter::new(BoxFitter);
    let mut installer = RecordingInstaller::default();
    let mut pipeline = PairLayout;
    let mut collab = Collaborators {
        fitter: &mut fitter,
        installer: &mut installer,
        pipeline: &mut pipeline,
    };
    route_edges(graph, &RouteConfig::default(), &mut collab).unwrap();
    (fitter, installer)
}

fn spline(graph: &Graph, e: EdgeId) -> Vec<Point> {
    graph.edge(e).spline.clone().unwrap()
}

fn assert_bezier(points: &[Point]) {
    assert!(points.len() >= 4, "too few control points: {points:?}");
    assert_eq!(points.len() % 3, 1, "not a piecewise cubic: {points:?}");
}

fn on_boundary(r: Rect, p: Point) -> bool {
    let d = (p.x - r.ll.x)
        .abs()
        .min((p.x - r.ur.x).abs())
        .min((p.y - r.ll.y).abs())
        .min((p.y - r.ur.y).abs());
    d < 1e-3
}

#[test]
fn test_direct_edge_between_adjacent_ranks() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    let e = graph.add_edge(a, b).unwrap();
    let (fitter, _) = route_recorded(&mut graph);

    assert_eq!(fitter.channels.len(), 1);
    let boxes = &fitter.channels[0].boxes;
    // One box per end node and the gap between the ranks.
    assert_eq!(boxes.len(), 3);
    assert_eq!((boxes[1].ll.y, boxes[1].ur.y), (18.0, 82.0));
    for w in boxes.windows(2) {
        assert_eq!(w[0].ll.y, w[1].ur.y);
    }

    let s = spline(&graph, e);
    assert_bezier(&s);
    assert!(s.iter().all(|p| p.x == 0.0));
    assert!((s[0].y - 82.0).abs() < 1e-3);
    assert!((s[s.len() - 1].y - 18.0).abs() < 1e-3);
}

#[test]
fn test_parallel_edges_are_offset_symmetrically() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    let edges: Vec<EdgeId> = (0..3).map(|_| graph.add_edge(a, b).unwrap()).collect();
    let (fitter, installer) = route_recorded(&mut graph);

    // The class is fitted once and copied.
    assert_eq!(fitter.channels.len(), 1);
    assert_eq!(installer.curves.len(), 3);
    let mut owners: Vec<EdgeId> = installer.curves.iter().map(|(e, _)| *e).collect();
    owners.sort();
    assert_eq!(owners, edges);

    let curves: Vec<&Vec<Point>> = installer.curves.iter().map(|(_, c)| c).collect();
    let n = curves[0].len();
    assert!(curves.iter().all(|c| c.len() == n));
    for c in &curves {
        assert_eq!(c[0], curves[0][0]);
        assert_eq!(c[n - 1], curves[0][n - 1]);
    }
    for i in 1..n - 1 {
        let mut xs: Vec<f64> = curves.iter().map(|c| c[i].x).collect();
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs[1] - xs[0], graph.nodesep);
        assert_eq!(xs[2] - xs[1], graph.nodesep);
        assert_eq!((xs[0] - xs[1]) + (xs[2] - xs[1]), 0.0);
    }

    let (ta, tb) = (graph.node(a).bounds(), graph.node(b).bounds());
    for &e in &edges {
        let s = spline(&graph, e);
        assert_bezier(&s);
        assert!(on_boundary(ta, s[0]), "{:?} not on the tail", s[0]);
        assert!(on_boundary(tb, s[s.len() - 1]), "{:?} not on the head", s[s.len() - 1]);
    }
}

#[test]
fn test_flat_edge_arches_over_the_rank() {
    let mut graph = Graph::new(18.0, 36.0);
    graph.add_node("up", 0, Point::new(200.0, 90.0), Size::new(54.0, 36.0));
    let nodes: Vec<NodeId> = (0..5)
        .map(|i| {
            let x = 100.0 * i as f64;
            graph.add_node(&format!("n{i}"), 1, Point::new(x, 0.0), Size::new(54.0, 36.0))
        })
        .collect();
    let e = graph.add_edge(nodes[0], nodes[4]).unwrap();
    let (fitter, _) = route_recorded(&mut graph);

    assert_eq!(fitter.channels.len(), 1);
    let boxes = &fitter.channels[0].boxes;
    // Gap to the rank above is 54, split in thirds for a single edge.
    let b0 = boxes
        .iter()
        .position(|b| b.ll.y == 18.0 && b.ur.y == 45.0)
        .unwrap();
    assert!(b0 > 0);
    assert_eq!(boxes[b0].ur.x - boxes[b0 - 1].ur.x, graph.nodesep / 2.0);
    let over = boxes[b0 + 1];
    assert_eq!((over.ll.y, over.ur.y), (45.0, 72.0));
    assert!(over.ll.x <= -27.0 && over.ur.x >= 427.0);

    let s = spline(&graph, e);
    assert_bezier(&s);
    let top = s.iter().map(|p| p.y).fold(f64::MIN, f64::max);
    assert!(top > 18.0 && top <= 72.0, "arch top at {top}");
    // Nothing dips into the three nodes in between.
    for n in &nodes[1..4] {
        let body = graph.node(*n).bounds();
        assert!(s.iter().all(|p| !body.contains(*p)));
    }
}

#[test]
fn test_loop_on_bottom_rank_stays_within_node_height() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    graph.add_edge(a, b).unwrap();
    let e = graph.add_edge(b, b).unwrap();
    route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();

    let s = spline(&graph, e);
    assert_bezier(&s);
    let half = graph.node(b).ht / 2.0;
    assert!(s.iter().all(|p| p.y.abs() <= half), "{s:?}");
    assert!(s.iter().any(|p| p.x > graph.node(b).rw));
}

#[test]
#[traced_test]
fn test_one_failed_channel_leaves_the_batch_routed() {
    let mut graph = Graph::new(18.0, 36.0);
    let mut edges = Vec::new();
    for i in 0..5 {
        let x = 100.0 * i as f64;
        let t = graph.add_node(&format!("t{i}"), 0, Point::new(x, 200.0), Size::new(54.0, 36.0));
        let h = graph.add_node(&format!("h{i}"), 2, Point::new(x, 0.0), Size::new(54.0, 36.0));
        let label = (i == 2).then(|| Size::new(20.0, 10.0));
        let options = EdgeOptions { label, ..Default::default() };
        edges.push(graph.add_edge_with(t, h, options).unwrap());
    }

    let mut fitter = FailingFitter {
        tail: Rect::around(Point::new(200.0, 200.0), Size::new(54.0, 36.0)),
    };
    let mut installer = RectClipper;
    let mut pipeline = PairLayout;
    let mut collab = Collaborators {
        fitter: &mut fitter,
        installer: &mut installer,
        pipeline: &mut pipeline,
    };
    route_edges(&mut graph, &RouteConfig::default(), &mut collab).unwrap();

    for (i, &e) in edges.iter().enumerate() {
        if i == 2 {
            assert!(graph.edge(e).spline.is_none());
            assert!(graph.edge(e).label.unwrap().pos.is_none());
        } else {
            assert_bezier(&spline(&graph, e));
        }
    }
    assert!(logs_contain("unable to fit"));
}

#[test]
fn test_backward_edge_matches_forward_edge() {
    let build = |backward: bool| {
        let mut graph = Graph::new(18.0, 36.0);
        let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
        let b = graph.add_node("b", 1, Point::new(60.0, 0.0), Size::new(54.0, 36.0));
        let e = if backward { graph.add_edge(b, a) } else { graph.add_edge(a, b) }.unwrap();
        route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();
        spline(&graph, e)
    };
    let forward = build(false);
    let mut backward = build(true);
    backward.reverse();
    assert_eq!(forward, backward);
}

/// Layered graph with edges only between neighboring ranks, an occasional
/// backward edge, flat edges both ways and an occasional loop.
fn random_graph(rng: &mut StdRng) -> Graph {
    let mut graph = Graph::new(18.0, 36.0);
    let ranks = rng.random_range(2..=4);
    let mut layers: Vec<Vec<NodeId>> = Vec::new();
    for r in 0..ranks {
        let mut x = 0.0;
        let mut layer = Vec::new();
        for i in 0..rng.random_range(1..=3) {
            let width: f64 = rng.random_range(30.0..70.0);
            x += width / 2.0;
            let y = 100.0 * (ranks - 1 - r) as f64;
            let size = Size::new(width.round(), 36.0);
            layer.push(graph.add_node(&format!("n{r}_{i}"), r, Point::new(x.round(), y), size));
            x += width / 2.0 + graph.nodesep + rng.random_range(0.0..60.0);
        }
        layers.push(layer);
    }
    for r in 0..ranks - 1 {
        for _ in 0..rng.random_range(1..=4) {
            let t = layers[r][rng.random_range(0..layers[r].len())];
            let h = layers[r + 1][rng.random_range(0..layers[r + 1].len())];
            if rng.random_bool(0.2) {
                graph.add_edge(h, t).unwrap();
            } else {
                graph.add_edge(t, h).unwrap();
            }
        }
    }
    for layer in &layers {
        if layer.len() < 2 || !rng.random_bool(0.5) {
            continue;
        }
        let i = rng.random_range(0..layer.len() - 1);
        let j = rng.random_range(i + 1..layer.len());
        if rng.random_bool(0.5) {
            graph.add_edge(layer[j], layer[i]).unwrap();
        } else {
            graph.add_edge(layer[i], layer[j]).unwrap();
        }
    }
    if rng.random_bool(0.3) {
        let n = layers[0][0];
        graph.add_edge(n, n).unwrap();
    }
    graph
}

#[test]
fn test_random_graphs_give_valid_channels_and_stable_curves() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..25 {
        let base = random_graph(&mut rng);
        let mut graph = base.clone();
        let (fitter, _) = route_recorded(&mut graph);

        for channel in &fitter.channels {
            let start = channel.start.p;
            let end = channel.end.p;
            for b in &channel.boxes {
                assert!(b.is_valid(), "degenerate box {b:?}");
                // No box cuts into a node other than the channel's own ends.
                for node in graph.nodes.iter().filter(|n| !n.is_virtual()) {
                    let body = node.bounds();
                    if body.contains(start) || body.contains(end) {
                        continue;
                    }
                    assert!(!b.intersects(&body), "{b:?} overlaps {}", node.name);
                }
            }
        }
        for e in graph.edge_ids() {
            if graph.edge(e).kind == EdgeKind::Normal {
                assert_bezier(&spline(&graph, e));
            }
        }

        let mut again = base.clone();
        route_with_defaults(&mut again, &RouteConfig::default()).unwrap();
        for e in graph.edge_ids() {
            assert_eq!(graph.edge(e).spline, again.edge(e).spline);
        }
    }
}

#[test]
fn test_channels_stay_clear_of_nodes_along_a_chain() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 200.0), Size::new(54.0, 36.0));
    graph.add_node("x", 1, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    graph.add_node("y", 1, Point::new(200.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 2, Point::new(100.0, 0.0), Size::new(54.0, 36.0));
    let options = EdgeOptions { via: vec![100.0], ..Default::default() };
    let e = graph.add_edge_with(a, b, options).unwrap();
    let (fitter, _) = route_recorded(&mut graph);

    let bodies: Vec<Rect> = ["x", "y"]
        .iter()
        .filter_map(|name| graph.nodes.iter().find(|n| n.name == *name))
        .map(|n| n.bounds())
        .collect();
    assert_eq!(bodies.len(), 2);
    for b in fitter.channels.iter().flat_map(|c| &c.boxes) {
        for body in &bodies {
            assert!(!b.intersects(body), "{b:?} overlaps {body:?}");
        }
    }
    assert_bezier(&spline(&graph, e));
}

#[test]
fn test_ported_neighbors_route_through_transposed_layout() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 0, Point::new(100.0, 0.0), Size::new(54.0, 36.0));
    let options = EdgeOptions {
        tail_port: Port::at(Point::new(27.0, 0.0), Side::RIGHT),
        head_port: Port::at(Point::new(-27.0, 0.0), Side::LEFT),
        ..Default::default()
    };
    let e = graph.add_edge_with(a, b, options).unwrap();
    route_with_defaults(&mut graph, &RouteConfig::default()).unwrap();

    let s = spline(&graph, e);
    assert_bezier(&s);
    let (first, last) = (s[0], s[s.len() - 1]);
    assert!(first.x > 20.0 && first.x < last.x && last.x < 80.0, "{s:?}");
    assert!(s.iter().all(|p| p.y.abs() <= 18.0 + 1e-6));
    let bb = graph.bb.unwrap();
    assert!(bb.contains(first) && bb.contains(last));
}

#[test]
fn test_config_from_partial_json() {
    let json = r#"{ "style": "line", "min_width": 20.0 }"#;
    let config: RouteConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.style, EdgeStyle::Line);
    assert_eq!(config.min_width, 20.0);
    assert_eq!(config.straight_run_min, RouteConfig::default().straight_run_min);

    let json = serde_json::to_string(&config).unwrap();
    let back: RouteConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_style_none_leaves_edges_alone() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    let e = graph.add_edge(a, b).unwrap();
    let config = RouteConfig { style: EdgeStyle::None, ..Default::default() };
    route_with_defaults(&mut graph, &config).unwrap();
    assert!(graph.edge(e).spline.is_none());
}

#[test]
fn test_svg_shows_channels_nodes_and_curves() {
    let mut graph = Graph::new(18.0, 36.0);
    let a = graph.add_node("a", 0, Point::new(0.0, 100.0), Size::new(54.0, 36.0));
    let b = graph.add_node("b", 1, Point::new(0.0, 0.0), Size::new(54.0, 36.0));
    let c = graph.add_node("c", 1, Point::new(100.0, 0.0), Size::new(54.0, 36.0));
    graph.add_edge(a, b).unwrap();
    graph.add_edge(a, c).unwrap();
    let (fitter, _) = route_recorded(&mut graph);

    let content = render_svg(&graph, &fitter.channels);
    let (mut rects, mut paths) = (0, 0);
    for event in svg::read(&content).unwrap() {
        if let Event::Tag(name, _, _) = event {
            match name {
                "rect" => rects += 1,
                "path" => paths += 1,
                _ => {}
            }
        }
    }
    let boxes: usize = fitter.channels.iter().map(|c| c.boxes.len()).sum();
    // Background, channel boxes and the three nodes.
    assert_eq!(rects, 1 + boxes + 3);
    assert_eq!(paths, 2);

    let path = std::env::temp_dir().join("archviz_splines_routing.svg");
    write_svg(&graph, &fitter.channels, &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}
