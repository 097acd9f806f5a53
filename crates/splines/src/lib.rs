//! Edge routing for ranked graph layouts.
//!
//! Takes a graph whose nodes already have ranks, orders and coordinates, and
//! gives every edge a bezier curve that stays clear of the nodes. Corridors
//! of boxes are built between the ranks and handed to a [`CurveFitter`];
//! the fitted curves are clipped and stored by a [`CurveInstaller`].

mod boxes;
pub mod classify;
pub mod clip;
pub mod collab;
mod flat;
pub mod graph;
mod labels;
pub mod pipeline;
mod regular;
pub mod render;
mod route;
mod selfloop;
pub mod types;

pub use classify::{EdgeClass, EdgeShape, EdgeView};
pub use clip::RectClipper;
pub use collab::{
    BoxFitter, Collaborators, CurveFitter, CurveInstaller, LayoutPipeline, PolygonFitter,
    RecordingFitter,
};
pub use graph::{Edge, EdgeKind, EdgeOptions, Graph, Node, NodeKind, SELF_EDGE_SIZE};
pub use pipeline::PairLayout;
pub use render::{render_svg, write_svg};
pub use route::{route_edges, route_with_defaults};
pub use types::*;
