use crate::graph::Graph;
use crate::types::*;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const MARGIN: f64 = 10.0;

/// Draw nodes, routed curves, placed labels and optionally the channels the
/// curves were fitted in. The y axis is flipped so rank 0 ends up on top.
pub fn render_svg(graph: &Graph, channels: &[Channel]) -> String {
    let mut bb = graph.bb.unwrap_or_default();
    for b in channels.iter().flat_map(|c| &c.boxes) {
        bb = bb.union(b);
    }
    let (width, height) = (bb.width() + 2.0 * MARGIN, bb.height() + 2.0 * MARGIN);
    let x = |x: f64| x - bb.ll.x + MARGIN;
    let y = |y: f64| bb.ur.y - y + MARGIN;

    let mut svg = format!(
        r#"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg">
<rect width="100%" height="100%" fill="white"/>
"#
    );

    for b in channels.iter().flat_map(|c| &c.boxes) {
        let _ = writeln!(
            svg,
            concat!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" "#,
                r#"fill="none" stroke="lightgray" stroke-width="0.5"/>"#
            ),
            x(b.ll.x),
            y(b.ur.y),
            b.width(),
            b.height()
        );
    }

    for node in graph.nodes.iter().filter(|n| !n.is_virtual()) {
        let b = node.bounds();
        let _ = writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="lightblue" stroke="black"/>
<text x="{}" y="{}" font-family="Arial" font-size="12" text-anchor="middle">{}</text>"#,
            x(b.ll.x),
            y(b.ur.y),
            b.width(),
            b.height(),
            x(node.coord.x),
            y(node.coord.y) + 4.0,
            node.name
        );
    }

    for edge in &graph.edges {
        let Some(spline) = edge.spline.as_ref().filter(|s| s.len() >= 4) else {
            continue;
        };
        let mut d = format!("M {} {}", x(spline[0].x), y(spline[0].y));
        for seg in spline[1..].chunks_exact(3) {
            let _ = write!(
                d,
                " C {} {} {} {} {} {}",
                x(seg[0].x),
                y(seg[0].y),
                x(seg[1].x),
                y(seg[1].y),
                x(seg[2].x),
                y(seg[2].y)
            );
        }
        let _ = writeln!(svg, r#"<path d="{d}" stroke="black" stroke-width="1" fill="none"/>"#);
        if let Some(pos) = edge.label.and_then(|l| l.pos) {
            let _ = writeln!(
                svg,
                r#"<circle cx="{}" cy="{}" r="2" fill="red"/>"#,
                x(pos.x),
                y(pos.y)
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

pub fn write_svg(
    graph: &Graph,
    channels: &[Channel],
    path: impl AsRef<Path>,
) -> std::io::Result<()> {
    fs::write(path, render_svg(graph, channels))
}
