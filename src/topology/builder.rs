use std::collections::HashMap;
use std::f64::consts::TAU;

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::config::{LayoutConfig, TopologyConfig};
use super::model::{
	AgentNode, DepartmentNode, DomainModel, EdgeStrength, Graph, HierarchyEdge, LiveMessage,
	LiveWorkflow, Node, NodeId, Point, WorkflowFlowEdge,
};

/// Turns the static hierarchy plus one traffic snapshot into a fresh [`Graph`].
///
/// Lives as long as the view session: department anchors and pulse phases are
/// assigned the first time an id is seen and reused on every later build.
pub struct GraphModelBuilder {
	layout: LayoutConfig,
	center: Point,
	anchors: HashMap<NodeId, Point>,
	phases: HashMap<NodeId, f64>,
	rng: SmallRng,
}

impl GraphModelBuilder {
	/// A builder with empty anchor and phase caches, seeded from `config.seed`.
	pub fn new(config: &TopologyConfig) -> Self {
		let (cx, cy) = config.center();
		Self {
			layout: config.layout.clone(),
			center: Point::new(cx, cy),
			anchors: HashMap::new(),
			phases: HashMap::new(),
			rng: SmallRng::seed_from_u64(config.seed),
		}
	}

	/// Builds the graph for `now_ms`. Workflows whose endpoints do not resolve to an agent are dropped.
	pub fn build(
		&mut self,
		domain: &DomainModel,
		messages: &[LiveMessage],
		workflows: &[LiveWorkflow],
		now_ms: f64,
	) -> Graph {
		let dept_count = domain.departments.len();
		let mut departments = Vec::with_capacity(dept_count);
		let mut agents = Vec::with_capacity(domain.agent_count());
		let mut hierarchy_edges = Vec::with_capacity(domain.agent_count());

		for (i, dept) in domain.departments.iter().enumerate() {
			let dept_id = NodeId::department(&dept.name);
			let anchor = self.anchor(&dept_id, i, dept_count);
			let members_lower: Vec<String> = dept.agents.iter().map(|a| a.to_lowercase()).collect();

			let mut dept_activity = 0;
			let mut dept_last = None;
			for msg in messages {
				if members_lower.iter().any(|m| msg.mentions(m)) {
					dept_activity += 1;
					dept_last = dept_last.max(msg.created_at);
				}
			}

			let mut members = Vec::with_capacity(dept.agents.len());
			for (j, (name, name_lower)) in dept.agents.iter().zip(&members_lower).enumerate() {
				let id = NodeId::agent(&dept.name, name);
				let (activity, last_activity) = messages
					.iter()
					.filter(|m| m.mentions(name_lower))
					.fold((0, None), |(n, last), m| (n + 1, last.max(m.created_at)));

				hierarchy_edges.push(HierarchyEdge {
					department: dept_id.clone(),
					agent: id.clone(),
					strength: EdgeStrength::for_activity(activity),
				});
				members.push(id.clone());
				agents.push(AgentNode {
					position: self.orbit_position(anchor, j, dept.agents.len(), now_ms),
					pulse_phase: self.pulse_phase(&id),
					id,
					name: name.clone(),
					department: dept_id.clone(),
					activity,
					last_activity,
				});
			}

			departments.push(DepartmentNode {
				pulse_phase: self.pulse_phase(&dept_id),
				id: dept_id,
				name: dept.name.clone(),
				anchor,
				members,
				activity: dept_activity,
				last_activity: dept_last,
			});
		}

		let mut active_workflows = 0;
		let mut flow_edges = Vec::new();
		for wf in workflows {
			let Some(intensity) = wf.status.intensity() else {
				continue;
			};
			active_workflows += 1;
			let source = wf.source_agent.as_deref().and_then(|s| resolve(&agents, s));
			let target = wf.target_agent.as_deref().and_then(|t| resolve(&agents, t));
			match (source, target) {
				(Some(source), Some(target)) => flow_edges.push(WorkflowFlowEdge {
					workflow: wf.workflow_name.clone(),
					source,
					target,
					intensity,
					flow_phase: self.rng.gen_range(0.0..TAU),
				}),
				_ => debug!("dropping flow edge for unresolved workflow {}", wf.workflow_name),
			}
		}

		let nodes: Vec<Node> = departments
			.into_iter()
			.map(Node::Department)
			.chain(agents.into_iter().map(Node::Agent))
			.collect();
		Graph::new(nodes, hierarchy_edges, flow_edges, active_workflows)
	}

	/// Anchor for department `i` of `count`, evenly spaced on the department ring.
	fn anchor(&mut self, id: &NodeId, i: usize, count: usize) -> Point {
		let (center, radius) = (self.center, self.layout.department_radius);
		*self.anchors.entry(id.clone()).or_insert_with(|| {
			let angle = TAU * i as f64 / count as f64;
			Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
		})
	}

	/// Initial agent position: slowly rotating orbit with time-based radial jitter.
	fn orbit_position(&self, anchor: Point, j: usize, count: usize, now_ms: f64) -> Point {
		let angle = TAU * j as f64 / count as f64 + now_ms * self.layout.rotation_speed;
		let radius =
			self.layout.agent_radius + self.layout.agent_jitter * (now_ms * 0.001 + j as f64).sin();
		Point::new(anchor.x + radius * angle.cos(), anchor.y + radius * angle.sin())
	}

	fn pulse_phase(&mut self, id: &NodeId) -> f64 {
		if let Some(&phase) = self.phases.get(id) {
			return phase;
		}
		let phase = self.rng.gen_range(0.0..TAU);
		self.phases.insert(id.clone(), phase);
		phase
	}
}

/// Exact case-insensitive name match first, then the first agent whose name contains `needle`.
fn resolve(agents: &[AgentNode], needle: &str) -> Option<NodeId> {
	let needle = needle.trim().to_lowercase();
	if needle.is_empty() {
		return None;
	}
	agents
		.iter()
		.find(|a| a.name.to_lowercase() == needle)
		.or_else(|| agents.iter().find(|a| a.name.to_lowercase().contains(&needle)))
		.map(|a| a.id.clone())
}
