use serde::Serialize;

use super::config::AnimationConfig;
use super::model::{Graph, Node, NodeId, Point};

const IDLE_AGENT_COLOR: [u8; 3] = [96, 125, 139];
const IDLE_DEPARTMENT_COLOR: [u8; 3] = [120, 144, 156];

/// How one node is drawn this frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeVisual {
	/// Node this visual belongs to.
	pub id: NodeId,
	/// Text drawn beside departments and the selected node.
	pub label: String,
	/// Centre in graph coordinates.
	pub position: Point,
	/// Drawn radius, including the current pulse.
	pub radius: f64,
	/// Fill opacity; idle nodes are dimmed.
	pub opacity: f64,
	/// Fill colour, before `opacity` is applied.
	pub color: [u8; 3],
	/// Departments are labelled and drawn larger.
	pub is_department: bool,
}

impl NodeVisual {
	/// Fill colour as a CSS `rgba()` string.
	pub fn css_color(&self) -> String {
		let [r, g, b] = self.color;
		format!("rgba({r}, {g}, {b}, {})", self.opacity)
	}
}

/// A department to agent line; `opacity` follows the edge strength.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkVisual {
	/// Department end.
	pub from: Point,
	/// Agent end.
	pub to: Point,
	/// Stroke opacity.
	pub opacity: f64,
}

/// A workflow path drawn as a quadratic curve through `control`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowVisual {
	/// Start of the curve.
	pub source: Point,
	/// Quadratic control point.
	pub control: Point,
	/// End of the curve, where the arrowhead sits.
	pub target: Point,
	/// Current offset of the moving dash pattern.
	pub dash_offset: f64,
	/// Stroke opacity, shimmering with the flow phase.
	pub opacity: f64,
	/// Stroke width, scaled by the workflow intensity.
	pub width: f64,
}

/// Render-ready parameters for one display frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameParams {
	/// Frame timestamp the wave phases were sampled at.
	pub time_ms: f64,
	/// Departments first, then agents.
	pub nodes: Vec<NodeVisual>,
	/// Hierarchy edges.
	pub links: Vec<LinkVisual>,
	/// Workflow edges.
	pub flows: Vec<FlowVisual>,
}

/// Frame clock for the single long-lived animation loop.
///
/// It never holds a graph: each frame is derived from whatever graph the caller
/// passes in, so a rebuild between frames is picked up on the next one.
pub struct AnimationScheduler {
	config: AnimationConfig,
	running: bool,
	last_frame_ms: Option<f64>,
	frames: u64,
}

impl AnimationScheduler {
	/// A stopped scheduler.
	pub fn new(config: AnimationConfig) -> Self {
		Self {
			config,
			running: false,
			last_frame_ms: None,
			frames: 0,
		}
	}

	/// Starts the clock; the next frame gets a nominal step.
	pub fn start(&mut self) {
		self.running = true;
		self.last_frame_ms = None;
	}

	/// Stops the clock. [`advance`](Self::advance) yields nothing until restarted.
	pub fn stop(&mut self) {
		self.running = false;
		self.last_frame_ms = None;
	}

	/// Whether frames are being produced.
	pub fn is_running(&self) -> bool {
		self.running
	}

	/// Frames advanced since construction.
	pub fn frames(&self) -> u64 {
		self.frames
	}

	/// Registers a frame at `now_ms` and returns the clamped step in seconds,
	/// or `None` when the loop is stopped.
	pub fn advance(&mut self, now_ms: f64) -> Option<f64> {
		if !self.running {
			return None;
		}
		let dt = match self.last_frame_ms {
			Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, self.config.max_frame_dt),
			None => (1.0_f64 / 60.0).min(self.config.max_frame_dt),
		};
		self.last_frame_ms = Some(now_ms);
		self.frames += 1;
		Some(dt)
	}

	/// Derives what to draw for `graph` at `now_ms`.
	pub fn frame(&self, graph: &Graph, now_ms: f64) -> FrameParams {
		let nodes = graph
			.nodes()
			.iter()
			.map(|node| self.node_visual(node, now_ms))
			.collect();

		let links = graph
			.hierarchy_edges()
			.iter()
			.filter_map(|edge| {
				Some(LinkVisual {
					from: graph.position(&edge.department)?,
					to: graph.position(&edge.agent)?,
					opacity: edge.strength.opacity(),
				})
			})
			.collect();

		let flows = graph
			.flow_edges()
			.iter()
			.filter_map(|edge| {
				let (source, target) = (graph.position(&edge.source)?, graph.position(&edge.target)?);
				let shimmer = 0.75 + 0.25 * (now_ms * self.config.pulse_speed + edge.flow_phase).sin();
				Some(FlowVisual {
					source,
					control: control_point(source, target, self.config.flow_curvature),
					target,
					dash_offset: self.dash_offset(now_ms),
					opacity: edge.intensity * shimmer,
					width: 1.0 + 2.0 * edge.intensity,
				})
			})
			.collect();

		FrameParams {
			time_ms: now_ms,
			nodes,
			links,
			flows,
		}
	}

	fn node_visual(&self, node: &Node, now_ms: f64) -> NodeVisual {
		let c = &self.config;
		let wave = self.wave(node.pulse_phase(), now_ms);
		let (radius, opacity, color) = match (node, node.is_active()) {
			(Node::Department(_), true) => (
				c.department_radius + wave * c.pulse_amplitude,
				1.0,
				lerp_rgb(c.hue_from, c.hue_to, (wave + 1.0) / 2.0),
			),
			(Node::Department(_), false) => (c.department_radius, 0.8, IDLE_DEPARTMENT_COLOR),
			(Node::Agent(_), true) => (
				c.agent_radius + wave * c.pulse_amplitude,
				1.0,
				lerp_rgb(c.hue_from, c.hue_to, (wave + 1.0) / 2.0),
			),
			(Node::Agent(_), false) => (c.inactive_radius, c.inactive_opacity, IDLE_AGENT_COLOR),
		};
		NodeVisual {
			id: node.id().clone(),
			label: node.name().to_owned(),
			position: node.position(),
			radius,
			opacity,
			color,
			is_department: node.is_pinned(),
		}
	}

	fn wave(&self, phase: f64, now_ms: f64) -> f64 {
		(now_ms * self.config.pulse_speed + phase).sin()
	}

	/// Dash offset shared by all flows, wrapped to the dash period.
	pub fn dash_offset(&self, now_ms: f64) -> f64 {
		(now_ms * self.config.dash_speed).rem_euclid(self.config.dash_period)
	}
}

/// Control point of the quadratic curve: the midpoint pushed sideways by
/// `curvature` times the endpoint distance.
pub fn control_point(from: Point, to: Point, curvature: f64) -> Point {
	let (dx, dy) = (to.x - from.x, to.y - from.y);
	let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
	let d = (dx * dx + dy * dy).sqrt();
	if d < 1e-9 {
		return mid;
	}
	let (nx, ny) = (-dy / d, dx / d);
	Point::new(mid.x + nx * d * curvature, mid.y + ny * d * curvature)
}

fn lerp_rgb(from: [u8; 3], to: [u8; 3], t: f64) -> [u8; 3] {
	let t = t.clamp(0.0, 1.0);
	let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
	[mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2])]
}
