use std::collections::HashMap;
use std::f64::consts::TAU;

use force_graph::{DefaultNodeIdx, ForceGraph, NodeData, SimulationParameters};

use super::config::{SimulationConfig, TopologyConfig};
use super::model::{Graph, Node, NodeId, Point};

const EPSILON: f64 = 1e-6;
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Target length and stiffness of the spring tying an agent to its department anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Link {
	pub anchor: Point,
	pub distance: f64,
	pub strength: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct BodyInfo {
	pub id: NodeId,
	pub link: Option<Link>,
}

/// Snapshot of one simulated node between the integrator and the constraint passes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Body {
	pub position: Point,
	pub pinned: bool,
	pub link: Option<Link>,
}

/// Iterative layout solver. Charge repulsion and velocity integration come from
/// `force_graph`; link, centering and collision constraints are applied on top each tick.
///
/// Department anchors are added as anchor nodes and never move. There is no
/// convergence signal: `alpha` cools toward `alpha_min` and the solver keeps ticking.
pub struct ForceSimulation {
	graph: ForceGraph<BodyInfo, ()>,
	order: Vec<DefaultNodeIdx>,
	slot: HashMap<DefaultNodeIdx, usize>,
	ids: HashMap<NodeId, usize>,
	flows: Vec<(usize, usize)>,
	last: Vec<Point>,
	config: SimulationConfig,
	center: Point,
	alpha: f64,
	ticks: u64,
}

impl ForceSimulation {
	/// Seeds the solver with every node of `graph`, alpha at 1.
	pub fn new(graph: &Graph, config: &TopologyConfig) -> Self {
		let (cx, cy) = config.center();
		let mut sim = Self {
			graph: ForceGraph::new(parameters(&config.simulation)),
			order: Vec::new(),
			slot: HashMap::new(),
			ids: HashMap::new(),
			flows: Vec::new(),
			last: Vec::new(),
			config: config.simulation.clone(),
			center: Point::new(cx, cy),
			alpha: 1.0,
			ticks: 0,
		};
		sim.load(graph, &HashMap::new());
		sim
	}

	/// Points the solver at a freshly built graph and reheats it.
	pub fn reset(&mut self, graph: &Graph) {
		let carried = if self.config.carry_positions {
			self.positions().into_iter().collect()
		} else {
			HashMap::new()
		};
		self.graph = ForceGraph::new(parameters(&self.config));
		self.order.clear();
		self.slot.clear();
		self.ids.clear();
		self.flows.clear();
		self.last.clear();
		self.alpha = 1.0;
		self.load(graph, &carried);
	}

	fn load(&mut self, graph: &Graph, carried: &HashMap<NodeId, Point>) {
		for node in graph.nodes() {
			let (position, link) = match node {
				Node::Department(d) => (d.anchor, None),
				Node::Agent(a) => {
					let anchor = graph.position(&a.department).unwrap_or(a.position);
					let idle = if a.is_active() { 1.0 } else { self.config.idle_link_factor };
					let link = Link {
						anchor,
						distance: self.config.hierarchy_distance * idle,
						strength: self.config.link_strength / idle,
					};
					(carried.get(&a.id).copied().unwrap_or(a.position), Some(link))
				}
			};
			let idx = self.graph.add_node(NodeData {
				x: position.x as f32,
				y: position.y as f32,
				mass: self.config.node_mass as f32,
				is_anchor: node.is_pinned(),
				user_data: BodyInfo {
					id: node.id().clone(),
					link,
				},
			});
			self.slot.insert(idx, self.order.len());
			self.ids.insert(node.id().clone(), self.order.len());
			self.order.push(idx);
			self.last.push(position);
		}

		for edge in graph.flow_edges() {
			if let (Some(&a), Some(&b)) = (self.ids.get(&edge.source), self.ids.get(&edge.target)) {
				self.flows.push((a, b));
			}
		}
	}

	/// Advances the layout by `dt` seconds.
	pub fn tick(&mut self, dt: f64) {
		if self.order.is_empty() {
			return;
		}
		self.graph.update(dt as f32);

		let mut bodies = vec![Body::default(); self.order.len()];
		let slot = &self.slot;
		self.graph.visit_nodes(|node| {
			if let Some(&i) = slot.get(&node.index()) {
				bodies[i] = Body {
					position: Point::new(node.x() as f64, node.y() as f64),
					pinned: node.data.is_anchor,
					link: node.data.user_data.link,
				};
			}
		});

		for (body, last) in bodies.iter_mut().zip(&self.last) {
			if !(body.position.x.is_finite() && body.position.y.is_finite()) {
				body.position = *last;
			}
		}

		let alpha = self.alpha;
		apply_links(&mut bodies, alpha);
		apply_flow_links(
			&mut bodies,
			&self.flows,
			self.config.flow_distance,
			self.config.flow_strength,
			alpha,
		);
		apply_centering(&mut bodies, self.center, self.config.centering_strength);
		resolve_collisions(&mut bodies, self.config.collision_radius);

		self.graph.visit_nodes_mut(|node| {
			if node.data.is_anchor {
				return;
			}
			if let Some(&i) = slot.get(&node.index()) {
				node.data.x = bodies[i].position.x as f32;
				node.data.y = bodies[i].position.y as f32;
			}
		});
		self.last = bodies.into_iter().map(|b| b.position).collect();

		self.alpha += (self.config.alpha_min - self.alpha) * self.config.alpha_decay;
		self.ticks += 1;
	}

	/// Current best estimate for every node, in graph order.
	pub fn positions(&self) -> Vec<(NodeId, Point)> {
		let mut out = Vec::with_capacity(self.order.len());
		self.graph.visit_nodes(|node| {
			let p = Point::new(node.x() as f64, node.y() as f64);
			if p.x.is_finite() && p.y.is_finite() {
				out.push((node.data.user_data.id.clone(), p));
			}
		});
		out
	}

	/// Copies agent positions into `graph`. Anchors are left untouched.
	pub fn write_positions(&self, graph: &mut Graph) {
		for (id, position) in self.positions() {
			graph.set_agent_position(&id, position);
		}
	}

	/// Current cooling factor applied to the constraint passes.
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Ticks run since construction.
	pub fn ticks(&self) -> u64 {
		self.ticks
	}
}

fn parameters(config: &SimulationConfig) -> SimulationParameters {
	SimulationParameters {
		force_charge: (-config.charge).max(0.0) as f32,
		force_spring: 0.0,
		force_max: config.force_max as f32,
		node_speed: config.node_speed as f32,
		damping_factor: config.damping as f32,
	}
}

/// Pulls each linked body toward its target distance from its anchor.
pub(crate) fn apply_links(bodies: &mut [Body], alpha: f64) {
	for body in bodies.iter_mut().filter(|b| !b.pinned) {
		let Some(link) = body.link else {
			continue;
		};
		let (dx, dy) = (body.position.x - link.anchor.x, body.position.y - link.anchor.y);
		let d = (dx * dx + dy * dy).sqrt();
		if d < EPSILON {
			continue;
		}
		let k = (d - link.distance) / d * link.strength * alpha;
		body.position.x -= dx * k;
		body.position.y -= dy * k;
	}
}

/// Soft springs between workflow endpoints. Both ends move unless pinned.
pub(crate) fn apply_flow_links(
	bodies: &mut [Body],
	flows: &[(usize, usize)],
	distance: f64,
	strength: f64,
	alpha: f64,
) {
	for &(a, b) in flows {
		if a == b || a >= bodies.len() || b >= bodies.len() {
			continue;
		}
		let (pa, pb) = (bodies[a].position, bodies[b].position);
		let (dx, dy) = (pb.x - pa.x, pb.y - pa.y);
		let d = (dx * dx + dy * dy).sqrt();
		if d < EPSILON {
			continue;
		}
		let k = (d - distance) / d * strength * alpha * 0.5;
		if !bodies[a].pinned {
			bodies[a].position.x += dx * k;
			bodies[a].position.y += dy * k;
		}
		if !bodies[b].pinned {
			bodies[b].position.x -= dx * k;
			bodies[b].position.y -= dy * k;
		}
	}
}

/// Shifts free bodies so the system's centroid drifts toward `center`.
pub(crate) fn apply_centering(bodies: &mut [Body], center: Point, strength: f64) {
	if bodies.is_empty() {
		return;
	}
	let n = bodies.len() as f64;
	let (sx, sy) = bodies
		.iter()
		.fold((0.0, 0.0), |(sx, sy), b| (sx + b.position.x, sy + b.position.y));
	let (shift_x, shift_y) = ((center.x - sx / n) * strength, (center.y - sy / n) * strength);
	for body in bodies.iter_mut().filter(|b| !b.pinned) {
		body.position.x += shift_x;
		body.position.y += shift_y;
	}
}

/// Pushes apart every pair closer than `min_distance`. Coincident pairs separate
/// along a deterministic direction.
pub(crate) fn resolve_collisions(bodies: &mut [Body], min_distance: f64) {
	for i in 0..bodies.len() {
		for j in (i + 1)..bodies.len() {
			let (pi, pj) = (bodies[i].pinned, bodies[j].pinned);
			if pi && pj {
				continue;
			}
			let (a, b) = (bodies[i].position, bodies[j].position);
			let (dx, dy) = (b.x - a.x, b.y - a.y);
			let d = (dx * dx + dy * dy).sqrt();
			if d >= min_distance {
				continue;
			}
			let (ux, uy, overlap) = if d < EPSILON {
				let angle = (i + j) as f64 * GOLDEN_ANGLE % TAU;
				(angle.cos(), angle.sin(), min_distance)
			} else {
				(dx / d, dy / d, min_distance - d)
			};
			push_apart(bodies, i, j, ux, uy, overlap);
		}
	}
}

fn push_apart(bodies: &mut [Body], i: usize, j: usize, ux: f64, uy: f64, overlap: f64) {
	let (share_i, share_j) = match (bodies[i].pinned, bodies[j].pinned) {
		(true, _) => (0.0, overlap),
		(_, true) => (overlap, 0.0),
		_ => (overlap / 2.0, overlap / 2.0),
	};
	bodies[i].position.x -= ux * share_i;
	bodies[i].position.y -= uy * share_i;
	bodies[j].position.x += ux * share_j;
	bodies[j].position.y += uy * share_j;
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;
	use crate::topology::builder::GraphModelBuilder;
	use crate::topology::model::DomainModel;

	fn free(x: f64, y: f64) -> Body {
		Body {
			position: Point::new(x, y),
			pinned: false,
			link: None,
		}
	}

	fn pinned(x: f64, y: f64) -> Body {
		Body {
			pinned: true,
			..free(x, y)
		}
	}

	#[test]
	fn link_moves_body_toward_target_distance() {
		let anchor = Point::new(0.0, 0.0);
		let mut bodies = [Body {
			link: Some(Link {
				anchor,
				distance: 60.0,
				strength: 0.5,
			}),
			..free(100.0, 0.0)
		}];
		apply_links(&mut bodies, 1.0);
		// 100 - (100 - 60) * 0.5
		assert_relative_eq!(bodies[0].position.x, 80.0, epsilon = 1e-9);
		for _ in 0..200 {
			apply_links(&mut bodies, 1.0);
		}
		assert_relative_eq!(bodies[0].position.distance(&anchor), 60.0, epsilon = 1e-6);
	}

	#[test]
	fn flow_link_is_symmetric_between_free_bodies() {
		let mut bodies = [free(0.0, 0.0), free(200.0, 0.0)];
		apply_flow_links(&mut bodies, &[(0, 1)], 100.0, 0.5, 1.0);
		assert_relative_eq!(bodies[0].position.x, 25.0, epsilon = 1e-9);
		assert_relative_eq!(bodies[1].position.x, 175.0, epsilon = 1e-9);
	}

	#[test]
	fn centering_only_moves_free_bodies() {
		let mut bodies = [pinned(0.0, 0.0), free(100.0, 100.0)];
		apply_centering(&mut bodies, Point::new(0.0, 0.0), 1.0);
		assert_eq!(bodies[0].position, Point::new(0.0, 0.0));
		assert_relative_eq!(bodies[1].position.x, 50.0, epsilon = 1e-9);
		assert_relative_eq!(bodies[1].position.y, 50.0, epsilon = 1e-9);
	}

	#[test]
	fn collisions_enforce_minimum_separation() {
		let mut bodies = [free(0.0, 0.0), free(5.0, 0.0), pinned(10.0, 10.0)];
		for _ in 0..50 {
			resolve_collisions(&mut bodies, 20.0);
		}
		assert_eq!(bodies[2].position, Point::new(10.0, 10.0));
		for i in 0..bodies.len() {
			for j in (i + 1)..bodies.len() {
				let d = bodies[i].position.distance(&bodies[j].position);
				assert!(d >= 20.0 - 1e-6, "bodies {i} and {j} only {d} apart");
			}
		}
	}

	#[test]
	fn coincident_bodies_separate_deterministically() {
		let mut a = [free(3.0, 3.0), free(3.0, 3.0)];
		let mut b = a;
		resolve_collisions(&mut a, 20.0);
		resolve_collisions(&mut b, 20.0);
		assert_eq!(a, b);
		assert_relative_eq!(a[0].position.distance(&a[1].position), 20.0, epsilon = 1e-9);
	}

	fn sample_graph() -> (Graph, TopologyConfig) {
		let config = TopologyConfig::default();
		let domain = DomainModel::new([
			("finance", vec!["A", "B", "C"]),
			("marketing", vec!["D"]),
			("ops", vec!["E", "F"]),
		]);
		let graph = GraphModelBuilder::new(&config).build(&domain, &[], &[], 0.0);
		(graph, config)
	}

	#[test]
	fn anchors_stay_pinned_while_ticking() {
		let (mut graph, config) = sample_graph();
		let anchors: Vec<_> = graph.departments().map(|d| (d.id.clone(), d.anchor)).collect();
		let mut sim = ForceSimulation::new(&graph, &config);
		for _ in 0..120 {
			sim.tick(0.016);
		}
		sim.write_positions(&mut graph);
		let positions: HashMap<_, _> = sim.positions().into_iter().collect();
		for (id, anchor) in anchors {
			assert_eq!(graph.position(&id), Some(anchor));
			let simulated = positions[&id];
			assert_relative_eq!(simulated.x, anchor.x, epsilon = 1e-3);
			assert_relative_eq!(simulated.y, anchor.y, epsilon = 1e-3);
		}
		assert!(
			graph
				.agents()
				.all(|a| a.position.x.is_finite() && a.position.y.is_finite())
		);
		assert_eq!(sim.ticks(), 120);
	}

	#[test]
	fn alpha_cools_but_never_stops() {
		let (graph, config) = sample_graph();
		let mut sim = ForceSimulation::new(&graph, &config);
		for _ in 0..2000 {
			sim.tick(0.016);
		}
		assert!(sim.alpha() >= config.simulation.alpha_min);
		assert!(sim.alpha() < 0.1);
		sim.reset(&graph);
		assert_relative_eq!(sim.alpha(), 1.0);
	}

	#[test]
	fn reset_carries_agent_positions_by_id() {
		let (graph, config) = sample_graph();
		let mut sim = ForceSimulation::new(&graph, &config);
		for _ in 0..30 {
			sim.tick(0.016);
		}
		let before: HashMap<_, _> = sim.positions().into_iter().collect();
		sim.reset(&graph);
		let after: HashMap<_, _> = sim.positions().into_iter().collect();
		for a in graph.agents() {
			assert_relative_eq!(before[&a.id].x, after[&a.id].x, epsilon = 1e-3);
			assert_relative_eq!(before[&a.id].y, after[&a.id].y, epsilon = 1e-3);
		}
	}

	#[test]
	fn empty_graph_ticks_without_panicking() {
		let config = TopologyConfig::default();
		let mut sim = ForceSimulation::new(&Graph::default(), &config);
		sim.tick(0.016);
		assert!(sim.positions().is_empty());
	}
}
