//! Live agent-network topology engine.
//!
//! Builds a department/agent graph from live traffic, lays it out with a force
//! simulation around pinned department anchors, and derives per-frame animation
//! parameters and summary statistics. Painting is left to the caller.

/// Per-frame visual parameters.
pub mod animation;
/// Graph construction from the hierarchy and live traffic.
pub mod builder;
/// Tunables and their validation.
pub mod config;
/// Error types.
pub mod error;
/// Domain inputs and the graph they become.
pub mod model;
/// Refresh cycle bookkeeping.
pub mod refresh;
/// The session owning graph, layout, animation and refresh.
pub mod session;
/// Force-directed layout.
pub mod simulation;
/// Where live traffic comes from.
pub mod source;
/// Summary statistics.
pub mod stats;

pub use animation::{AnimationScheduler, FlowVisual, FrameParams, LinkVisual, NodeVisual};
pub use builder::GraphModelBuilder;
pub use config::TopologyConfig;
pub use error::{FetchError, TopologyError};
pub use model::{
	AgentNode, DepartmentNode, DomainModel, EdgeStrength, Graph, HierarchyEdge, LiveMessage,
	LiveWorkflow, Node, NodeDetails, NodeId, Point, TrafficSnapshot, WorkflowFlowEdge,
	WorkflowStatus,
};
pub use refresh::{RefreshController, RefreshTicket};
pub use session::{SessionState, TopologySession};
pub use simulation::ForceSimulation;
pub use source::{HttpTrafficSource, SampleTraffic, TrafficSource};
pub use stats::{NetworkStatistics, summarize};
