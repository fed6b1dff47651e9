use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::error::{Result, TopologyError};

/// Stable node identity. Departments are keyed `dept:<name>`, agents
/// `agent:<department>:<agent>`, so the same agent keeps its id across rebuilds.
/// Names are escaped, so an id always maps back to exactly one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

fn escape_segment(out: &mut String, segment: &str) {
	for c in segment.chars() {
		if matches!(c, ':' | '\\') {
			out.push('\\');
		}
		out.push(c);
	}
}

impl NodeId {
	/// Id of the department called `name`.
	pub fn department(name: &str) -> Self {
		let mut id = String::from("dept:");
		escape_segment(&mut id, name);
		Self(id)
	}

	/// Id of `agent` within `department`.
	pub fn agent(department: &str, agent: &str) -> Self {
		let mut id = String::from("agent:");
		escape_segment(&mut id, department);
		id.push(':');
		escape_segment(&mut id, agent);
		Self(id)
	}

	/// The encoded id, as used in logs and serialized output.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Position in graph coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate.
	pub y: f64,
}

impl Point {
	/// Point at `(x, y)`.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Euclidean distance to `other`.
	pub fn distance(&self, other: &Point) -> f64 {
		((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
	}
}

/// One department and the agents it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Department {
	/// Display name; also the department's id key.
	pub name: String,
	/// Agent names, unique across the whole domain.
	pub agents: Vec<String>,
}

/// Static department -> agent hierarchy. Order is significant: it drives anchor placement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainModel {
	/// Departments in display order.
	pub departments: Vec<Department>,
}

impl DomainModel {
	/// Builds the hierarchy, keeping only the first department an agent name appears in.
	pub fn new<I, D, A, S>(departments: I) -> Self
	where
		I: IntoIterator<Item = (D, A)>,
		D: Into<String>,
		A: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut seen = HashSet::new();
		let departments = departments
			.into_iter()
			.map(|(name, agents)| {
				let name = name.into();
				let agents = agents
					.into_iter()
					.map(Into::into)
					.filter(|agent: &String| {
						let fresh = seen.insert(agent.to_lowercase());
						if !fresh {
							warn!("agent {agent} already belongs to another department, ignoring it in {name}");
						}
						fresh
					})
					.collect();
				Department { name, agents }
			})
			.collect();
		Self { departments }
	}

	/// Parses a JSON object of `department -> [agent, ...]`, preserving key order.
	pub fn from_json(json: &str) -> Result<Self> {
		let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
		let mut departments = Vec::with_capacity(map.len());
		for (name, agents) in map {
			let agents: Vec<String> = serde_json::from_value(agents).map_err(|e| {
				TopologyError::InvalidDomain(format!("department {name}: {e}"))
			})?;
			departments.push((name, agents));
		}
		Ok(Self::new(departments))
	}

	/// Agents across all departments.
	pub fn agent_count(&self) -> usize {
		self.departments.iter().map(|d| d.agents.len()).sum()
	}

	/// Whether there are no departments.
	pub fn is_empty(&self) -> bool {
		self.departments.is_empty()
	}
}

/// A message observed between two agents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveMessage {
	/// Sender name, matched loosely against agent names.
	pub source_agent: String,
	/// Receiver name, matched loosely against agent names.
	pub target_agent: String,
	/// Free-form kind, not interpreted.
	pub message_type: String,
	/// When the message was sent, if known.
	pub created_at: Option<DateTime<Utc>>,
}

impl LiveMessage {
	/// Case-insensitive substring match of `name_lower` against either endpoint.
	pub fn mentions(&self, name_lower: &str) -> bool {
		if name_lower.is_empty() {
			return false;
		}
		self.source_agent.to_lowercase().contains(name_lower)
			|| self.target_agent.to_lowercase().contains(name_lower)
	}
}

/// Lifecycle state of a workflow. Unknown strings map to [`Other`](Self::Other).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowStatus {
	/// Executing; drawn at full intensity.
	Running,
	/// Started but not busy; drawn dimmer.
	Active,
	/// Queued.
	Pending,
	/// Finished successfully.
	Completed,
	/// Finished with an error.
	Failed,
	/// Anything else.
	#[default]
	Other,
}

impl WorkflowStatus {
	/// Canonical lowercase name.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Running => "running",
			Self::Active => "active",
			Self::Pending => "pending",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Other => "other",
		}
	}

	/// Flow intensity for statuses that produce a flow edge; `None` for everything else.
	pub fn intensity(&self) -> Option<f64> {
		match self {
			Self::Running => Some(1.0),
			Self::Active => Some(0.7),
			_ => None,
		}
	}

	/// Whether this status produces a flow edge.
	pub fn is_in_flight(&self) -> bool {
		self.intensity().is_some()
	}
}

impl From<String> for WorkflowStatus {
	fn from(s: String) -> Self {
		match s.trim().to_lowercase().as_str() {
			"running" => Self::Running,
			"active" => Self::Active,
			"pending" | "queued" => Self::Pending,
			"completed" | "done" => Self::Completed,
			"failed" | "error" => Self::Failed,
			_ => Self::Other,
		}
	}
}

impl From<WorkflowStatus> for String {
	fn from(s: WorkflowStatus) -> Self {
		s.as_str().to_owned()
	}
}

/// A workflow run between two agents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveWorkflow {
	/// Name shown on the flow edge.
	pub workflow_name: String,
	/// Current state.
	pub status: WorkflowStatus,
	/// Initiating agent, if reported.
	pub source_agent: Option<String>,
	/// Receiving agent, if reported.
	pub target_agent: Option<String>,
	/// Start time, if known.
	pub started_at: Option<DateTime<Utc>>,
}

/// One poll's worth of live traffic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSnapshot {
	/// Recent messages.
	pub messages: Vec<LiveMessage>,
	/// Known workflows in any state.
	pub workflows: Vec<LiveWorkflow>,
}

/// A department vertex, pinned at its anchor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepartmentNode {
	/// Stable id.
	pub id: NodeId,
	/// Department name.
	pub name: String,
	/// Fixed position on the department ring.
	pub anchor: Point,
	/// Ids of the agents it owns.
	pub members: Vec<NodeId>,
	/// Messages involving any member.
	pub activity: usize,
	/// Phase offset of its pulse, stable across rebuilds.
	pub pulse_phase: f64,
	/// Newest message involving any member.
	pub last_activity: Option<DateTime<Utc>>,
}

/// An agent vertex, free to move.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentNode {
	/// Stable id.
	pub id: NodeId,
	/// Agent name.
	pub name: String,
	/// Id of the owning department.
	pub department: NodeId,
	/// Current position.
	pub position: Point,
	/// Messages the agent took part in.
	pub activity: usize,
	/// Phase offset of its pulse, stable across rebuilds.
	pub pulse_phase: f64,
	/// Newest message it took part in.
	pub last_activity: Option<DateTime<Utc>>,
}

impl AgentNode {
	/// Whether it took part in any message.
	pub fn is_active(&self) -> bool {
		self.activity > 0
	}
}

/// A graph vertex. Departments are pinned anchors; agents move under the simulation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
	/// A department.
	Department(DepartmentNode),
	/// An agent.
	Agent(AgentNode),
}

impl Node {
	/// Stable id.
	pub fn id(&self) -> &NodeId {
		match self {
			Node::Department(d) => &d.id,
			Node::Agent(a) => &a.id,
		}
	}

	/// Display name.
	pub fn name(&self) -> &str {
		match self {
			Node::Department(d) => &d.name,
			Node::Agent(a) => &a.name,
		}
	}

	/// Anchor for departments, current position for agents.
	pub fn position(&self) -> Point {
		match self {
			Node::Department(d) => d.anchor,
			Node::Agent(a) => a.position,
		}
	}

	/// Message count.
	pub fn activity(&self) -> usize {
		match self {
			Node::Department(d) => d.activity,
			Node::Agent(a) => a.activity,
		}
	}

	/// Whether the message count is non-zero.
	pub fn is_active(&self) -> bool {
		self.activity() > 0
	}

	/// Pulse phase offset.
	pub fn pulse_phase(&self) -> f64 {
		match self {
			Node::Department(d) => d.pulse_phase,
			Node::Agent(a) => a.pulse_phase,
		}
	}

	/// Departments never move.
	pub fn is_pinned(&self) -> bool {
		matches!(self, Node::Department(_))
	}
}

/// Visual weight of a hierarchy edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStrength {
	/// Idle agent.
	Low,
	/// Active agent.
	High,
}

impl EdgeStrength {
	/// Strength for an agent with `activity` messages.
	pub fn for_activity(activity: usize) -> Self {
		if activity > 0 { Self::High } else { Self::Low }
	}

	/// Stroke opacity for this strength.
	pub fn opacity(&self) -> f64 {
		match self {
			Self::Low => 0.25,
			Self::High => 0.7,
		}
	}
}

/// Department to agent membership.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HierarchyEdge {
	/// Owning department.
	pub department: NodeId,
	/// Member agent.
	pub agent: NodeId,
	/// Follows the agent's activity.
	pub strength: EdgeStrength,
}

/// Transient edge for an in-flight workflow. Recomputed wholesale on every rebuild.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkflowFlowEdge {
	/// Workflow name.
	pub workflow: String,
	/// Resolved source agent.
	pub source: NodeId,
	/// Resolved target agent.
	pub target: NodeId,
	/// From the workflow status; scales width and pull.
	pub intensity: f64,
	/// Random phase for the shimmer.
	pub flow_phase: f64,
}

/// Attributes returned to the render adapter for a selected node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeDetails {
	/// Selected node.
	pub id: NodeId,
	/// Its name.
	pub name: String,
	/// Owning department name, or its own name for a department.
	pub department: String,
	/// Whether it is a department.
	pub is_department: bool,
	/// Message count.
	pub activity: usize,
	/// Whether the message count is non-zero.
	pub is_active: bool,
	/// Newest message involving it.
	pub last_activity: Option<DateTime<Utc>>,
}

/// One immutable snapshot of the topology. Only agent positions change after build.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Graph {
	nodes: Vec<Node>,
	hierarchy_edges: Vec<HierarchyEdge>,
	flow_edges: Vec<WorkflowFlowEdge>,
	active_workflows: usize,
	#[serde(skip)]
	index: HashMap<NodeId, usize>,
}

impl Graph {
	/// Indexes `nodes` by id.
	pub fn new(
		nodes: Vec<Node>,
		hierarchy_edges: Vec<HierarchyEdge>,
		flow_edges: Vec<WorkflowFlowEdge>,
		active_workflows: usize,
	) -> Self {
		let index = nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id().clone(), i))
			.collect();
		Self {
			nodes,
			hierarchy_edges,
			flow_edges,
			active_workflows,
			index,
		}
	}

	/// All nodes, departments first.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// One edge per agent.
	pub fn hierarchy_edges(&self) -> &[HierarchyEdge] {
		&self.hierarchy_edges
	}

	/// Edges of resolved in-flight workflows.
	pub fn flow_edges(&self) -> &[WorkflowFlowEdge] {
		&self.flow_edges
	}

	/// Workflows that were running or active at build time, resolved or not.
	pub fn active_workflows(&self) -> usize {
		self.active_workflows
	}

	/// Department nodes in domain order.
	pub fn departments(&self) -> impl Iterator<Item = &DepartmentNode> {
		self.nodes.iter().filter_map(|n| match n {
			Node::Department(d) => Some(d),
			Node::Agent(_) => None,
		})
	}

	/// Agent nodes in domain order.
	pub fn agents(&self) -> impl Iterator<Item = &AgentNode> {
		self.nodes.iter().filter_map(|n| match n {
			Node::Agent(a) => Some(a),
			Node::Department(_) => None,
		})
	}

	/// Looks a node up by id.
	pub fn node(&self, id: &NodeId) -> Option<&Node> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}

	/// Current position of a node.
	pub fn position(&self, id: &NodeId) -> Option<Point> {
		self.node(id).map(Node::position)
	}

	/// Moves an agent. Department anchors are immutable, so this is a no-op for them.
	pub fn set_agent_position(&mut self, id: &NodeId, position: Point) -> bool {
		match self.index.get(id).map(|&i| &mut self.nodes[i]) {
			Some(Node::Agent(agent)) => {
				agent.position = position;
				true
			}
			_ => false,
		}
	}

	/// Whether the graph has no nodes.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Number of nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Hierarchy plus flow edges.
	pub fn edge_count(&self) -> usize {
		self.hierarchy_edges.len() + self.flow_edges.len()
	}

	/// Attributes of `id` for display, if it is in the graph.
	pub fn details(&self, id: &NodeId) -> Option<NodeDetails> {
		let details = match self.node(id)? {
			Node::Department(d) => NodeDetails {
				id: d.id.clone(),
				name: d.name.clone(),
				department: d.name.clone(),
				is_department: true,
				activity: d.activity,
				is_active: d.activity > 0,
				last_activity: d.last_activity,
			},
			Node::Agent(a) => NodeDetails {
				id: a.id.clone(),
				name: a.name.clone(),
				department: self
					.node(&a.department)
					.map(|d| d.name().to_owned())
					.unwrap_or_default(),
				is_department: false,
				activity: a.activity,
				is_active: a.is_active(),
				last_activity: a.last_activity,
			},
		};
		Some(details)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn node_ids_never_collide_across_kinds_or_separators() {
		assert_ne!(NodeId::department("X"), NodeId::agent("dept", "X"));
		assert_ne!(NodeId::agent("a:b", "c"), NodeId::agent("a", "b:c"));
		assert_ne!(NodeId::agent("a\\", "b"), NodeId::agent("a", "\\b"));
		assert_eq!(NodeId::agent("ops", "A"), NodeId::agent("ops", "A"));
	}

	#[test]
	fn domain_from_json_preserves_order() {
		let domain =
			DomainModel::from_json(r#"{"zeta": ["Z1"], "alpha": ["A1", "A2"], "mid": []}"#)
				.unwrap();
		let names: Vec<_> = domain.departments.iter().map(|d| d.name.as_str()).collect();
		assert_eq!(names, ["zeta", "alpha", "mid"]);
		assert_eq!(domain.agent_count(), 3);
	}

	#[test]
	fn domain_from_json_rejects_non_list_members() {
		let err = DomainModel::from_json(r#"{"finance": "A"}"#).unwrap_err();
		assert!(matches!(err, TopologyError::InvalidDomain(_)));
	}

	#[test]
	fn duplicate_agents_keep_first_department() {
		let domain = DomainModel::new([("finance", vec!["A", "B"]), ("ops", vec!["a", "C"])]);
		assert_eq!(domain.departments[0].agents, ["A", "B"]);
		assert_eq!(domain.departments[1].agents, ["C"]);
	}

	#[test]
	fn workflow_status_parses_case_insensitively() {
		let wf: LiveWorkflow =
			serde_json::from_str(r#"{"workflow_name": "w", "status": "RUNNING"}"#).unwrap();
		assert_eq!(wf.status, WorkflowStatus::Running);
		assert_eq!(WorkflowStatus::from("Active".to_string()), WorkflowStatus::Active);
		assert_eq!(WorkflowStatus::from("paused".to_string()), WorkflowStatus::Other);
		assert_eq!(WorkflowStatus::Running.intensity(), Some(1.0));
		assert!(WorkflowStatus::Completed.intensity().is_none());
	}

	#[test]
	fn message_mentions_is_case_insensitive_substring() {
		let msg = LiveMessage {
			source_agent: "Risk-Analyst".into(),
			target_agent: "ops bot".into(),
			..Default::default()
		};
		assert!(msg.mentions("analyst"));
		assert!(msg.mentions("ops"));
		assert!(!msg.mentions("finance"));
		assert!(!msg.mentions(""));
	}

	#[test]
	fn anchors_cannot_be_moved() {
		let dept = NodeId::department("finance");
		let graph_nodes = vec![Node::Department(DepartmentNode {
			id: dept.clone(),
			name: "finance".into(),
			anchor: Point::new(10.0, 10.0),
			members: vec![],
			activity: 0,
			pulse_phase: 0.0,
			last_activity: None,
		})];
		let mut graph = Graph::new(graph_nodes, vec![], vec![], 0);
		assert!(!graph.set_agent_position(&dept, Point::new(0.0, 0.0)));
		assert_eq!(graph.position(&dept), Some(Point::new(10.0, 10.0)));
	}
}
