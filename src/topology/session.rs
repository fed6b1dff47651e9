use log::{debug, info};

use super::animation::{AnimationScheduler, FrameParams};
use super::builder::GraphModelBuilder;
use super::config::TopologyConfig;
use super::error::FetchError;
use super::model::{DomainModel, Graph, NodeDetails, NodeId, Point, TrafficSnapshot};
use super::refresh::{RefreshController, RefreshTicket};
use super::simulation::ForceSimulation;
use super::stats::{NetworkStatistics, summarize};

/// Lifecycle of a [`TopologySession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// Built but never activated.
	Idle,
	/// Frame loop and refresh running.
	Active,
	/// Deactivated; nothing runs until activated again.
	Stopped,
}

/// Session-lifetime owner of the topology view.
///
/// Holds the one current [`Graph`] and everything that reads it. The frame loop and
/// the refresh timer both go through this value, so a rebuild swaps the graph for
/// the simulation and the animation at once.
pub struct TopologySession {
	config: TopologyConfig,
	domain: DomainModel,
	builder: GraphModelBuilder,
	graph: Graph,
	simulation: ForceSimulation,
	animation: AnimationScheduler,
	refresh: RefreshController,
	stats: NetworkStatistics,
	frame: FrameParams,
	traffic: TrafficSnapshot,
	selected: Option<NodeId>,
	state: SessionState,
	rebuilds: u64,
}

impl TopologySession {
	/// An idle session showing the bare hierarchy.
	pub fn new(domain: DomainModel, config: TopologyConfig) -> Self {
		let mut builder = GraphModelBuilder::new(&config);
		let graph = builder.build(&domain, &[], &[], 0.0);
		let simulation = ForceSimulation::new(&graph, &config);
		let animation = AnimationScheduler::new(config.animation.clone());
		let frame = animation.frame(&graph, 0.0);
		Self {
			stats: summarize(&graph),
			refresh: RefreshController::new(config.refresh.interval_ms),
			config,
			domain,
			builder,
			graph,
			simulation,
			animation,
			frame,
			traffic: TrafficSnapshot::default(),
			selected: None,
			state: SessionState::Idle,
			rebuilds: 0,
		}
	}

	/// Builds the graph from the last known traffic and starts both loops.
	pub fn activate(&mut self, now_ms: f64) {
		if self.state == SessionState::Active {
			return;
		}
		info!(
			"topology view active: {} departments, {} agents",
			self.domain.departments.len(),
			self.domain.agent_count()
		);
		self.state = SessionState::Active;
		self.rebuild(self.traffic.clone(), now_ms);
		self.animation.start();
		self.refresh.start(self.config.refresh.interval_ms);
	}

	/// Halts the simulation, cancels the frame loop and the refresh timer together.
	pub fn deactivate(&mut self) {
		if self.state != SessionState::Active {
			return;
		}
		self.animation.stop();
		self.refresh.stop();
		self.state = SessionState::Stopped;
		info!("topology view deactivated after {} rebuilds", self.rebuilds);
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Whether the loops are running.
	pub fn is_active(&self) -> bool {
		self.state == SessionState::Active
	}

	/// One display frame: advance the layout and derive fresh animation parameters.
	pub fn on_frame(&mut self, now_ms: f64) -> Option<&FrameParams> {
		let dt = self.animation.advance(now_ms)?;
		self.simulation.tick(dt);
		self.simulation.write_positions(&mut self.graph);
		self.frame = self.animation.frame(&self.graph, now_ms);
		Some(&self.frame)
	}

	/// Starts a refresh cycle if one is due. See [`RefreshController::begin_cycle`].
	pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
		self.refresh.begin_cycle()
	}

	/// Applies a fetch result. Returns whether the graph was rebuilt; on failure or
	/// for a stale ticket the current graph stays as it is.
	pub fn finish_refresh(
		&mut self,
		ticket: RefreshTicket,
		result: Result<TrafficSnapshot, FetchError>,
		now_ms: f64,
	) -> bool {
		match self.refresh.complete(ticket, result) {
			Some(snapshot) if self.is_active() => {
				self.rebuild(snapshot, now_ms);
				true
			}
			_ => false,
		}
	}

	/// Pushes traffic in directly. Rebuilds only when it differs from what is shown.
	pub fn ingest(&mut self, snapshot: TrafficSnapshot, now_ms: f64) -> bool {
		if !self.is_active() || snapshot == self.traffic {
			return false;
		}
		self.rebuild(snapshot, now_ms);
		true
	}

	fn rebuild(&mut self, snapshot: TrafficSnapshot, now_ms: f64) {
		let mut graph =
			self.builder
				.build(&self.domain, &snapshot.messages, &snapshot.workflows, now_ms);
		self.simulation.reset(&graph);
		self.simulation.write_positions(&mut graph);
		self.stats = summarize(&graph);
		self.frame = self.animation.frame(&graph, now_ms);
		self.graph = graph;
		self.traffic = snapshot;
		self.rebuilds += 1;
		debug!(
			"topology rebuilt: {} nodes, {} edges, {} flows",
			self.stats.total_nodes,
			self.stats.total_edges,
			self.graph.flow_edges().len()
		);
	}

	/// The graph currently shown.
	pub fn graph(&self) -> &Graph {
		&self.graph
	}

	/// Statistics of the current graph.
	pub fn statistics(&self) -> NetworkStatistics {
		self.stats
	}

	/// Parameters of the last frame.
	pub fn frame(&self) -> &FrameParams {
		&self.frame
	}

	/// Configuration the session was built with.
	pub fn config(&self) -> &TopologyConfig {
		&self.config
	}

	/// Graph rebuilds so far.
	pub fn rebuilds(&self) -> u64 {
		self.rebuilds
	}

	/// Refresh timer period.
	pub fn refresh_interval_ms(&self) -> u32 {
		self.refresh.interval_ms()
	}

	/// Node-focused query from the render adapter.
	pub fn select(&mut self, id: Option<&NodeId>) -> Option<NodeDetails> {
		self.selected = id.cloned();
		self.selected_details()
	}

	/// Details of the focused node in the current graph, if it still exists.
	pub fn selected_details(&self) -> Option<NodeDetails> {
		self.selected.as_ref().and_then(|id| self.graph.details(id))
	}

	/// Currently selected node.
	pub fn selected(&self) -> Option<&NodeId> {
		self.selected.as_ref()
	}

	/// Topmost node whose drawn disc (plus `slack`) contains `point`.
	pub fn node_at(&self, point: Point, slack: f64) -> Option<NodeId> {
		self.frame
			.nodes
			.iter()
			.rev()
			.find(|n| n.position.distance(&point) <= n.radius + slack)
			.map(|n| n.id.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topology::model::{LiveMessage, LiveWorkflow, WorkflowStatus};

	fn session() -> TopologySession {
		let domain = DomainModel::new([("finance", vec!["A", "B"]), ("marketing", vec!["C"])]);
		TopologySession::new(domain, TopologyConfig::default())
	}

	fn traffic() -> TrafficSnapshot {
		TrafficSnapshot {
			messages: vec![LiveMessage {
				source_agent: "A".into(),
				target_agent: "C".into(),
				..Default::default()
			}],
			workflows: vec![LiveWorkflow {
				workflow_name: "launch".into(),
				status: WorkflowStatus::Running,
				source_agent: Some("A".into()),
				target_agent: Some("C".into()),
				started_at: None,
			}],
		}
	}

	#[test]
	fn frames_run_only_while_active() {
		let mut s = session();
		assert!(s.on_frame(0.0).is_none());
		s.activate(0.0);
		assert_eq!(s.on_frame(16.0).map(|f| f.nodes.len()), Some(5));
		s.deactivate();
		assert_eq!(s.state(), SessionState::Stopped);
		assert!(s.on_frame(32.0).is_none());
		assert!(s.begin_refresh().is_none());
	}

	#[test]
	fn successful_refresh_replaces_the_graph() {
		let mut s = session();
		s.activate(0.0);
		let ticket = s.begin_refresh().unwrap();
		assert!(s.finish_refresh(ticket, Ok(traffic()), 5000.0));
		assert_eq!(s.graph().flow_edges().len(), 1);
		assert_eq!(s.statistics().total_edges, 4);
		assert_eq!(s.statistics().active_workflow_count, 1);
		assert_eq!(s.frame().flows.len(), 1);
	}

	#[test]
	fn failed_refresh_keeps_previous_graph() {
		let mut s = session();
		s.activate(0.0);
		let ticket = s.begin_refresh().unwrap();
		s.finish_refresh(ticket, Ok(traffic()), 5000.0);
		let before = s.statistics();
		let rebuilds = s.rebuilds();

		let ticket = s.begin_refresh().unwrap();
		let rebuilt = s.finish_refresh(
			ticket,
			Err(FetchError::Unavailable("down".into())),
			10_000.0,
		);
		assert!(!rebuilt);
		assert_eq!(s.statistics(), before);
		assert_eq!(s.rebuilds(), rebuilds);
		assert_eq!(s.graph().flow_edges().len(), 1);
		assert!(s.on_frame(10_016.0).is_some());
	}

	#[test]
	fn hung_fetch_does_not_freeze_refresh() {
		let mut s = session();
		s.activate(0.0);
		let hung = s.begin_refresh().unwrap();
		let fresh = (0..10).find_map(|_| s.begin_refresh()).unwrap();
		assert!(!s.finish_refresh(hung, Ok(traffic()), 5000.0));
		assert!(s.graph().flow_edges().is_empty());
		assert!(s.finish_refresh(fresh, Ok(traffic()), 5000.0));
		assert_eq!(s.graph().flow_edges().len(), 1);
	}

	#[test]
	fn late_results_after_deactivation_are_ignored() {
		let mut s = session();
		s.activate(0.0);
		let ticket = s.begin_refresh().unwrap();
		s.deactivate();
		assert!(!s.finish_refresh(ticket, Ok(traffic()), 5000.0));
		assert!(s.graph().flow_edges().is_empty());
	}

	#[test]
	fn anchors_survive_rebuilds_and_ticks() {
		let mut s = session();
		s.activate(0.0);
		let anchors: Vec<_> = s.graph().departments().map(|d| d.anchor).collect();
		for cycle in 1..=3 {
			for f in 0..20 {
				s.on_frame(cycle as f64 * 5000.0 + f as f64 * 16.0);
			}
			let ticket = s.begin_refresh().unwrap();
			s.finish_refresh(ticket, Ok(traffic()), cycle as f64 * 5000.0 + 400.0);
			let now: Vec<_> = s.graph().departments().map(|d| d.anchor).collect();
			assert_eq!(now, anchors);
		}
	}

	#[test]
	fn ingest_rebuilds_only_on_change() {
		let mut s = session();
		s.activate(0.0);
		let base = s.rebuilds();
		assert!(s.ingest(traffic(), 100.0));
		assert!(!s.ingest(traffic(), 200.0));
		assert_eq!(s.rebuilds(), base + 1);
	}

	#[test]
	fn selection_follows_the_current_graph() {
		let mut s = session();
		s.activate(0.0);
		let a = NodeId::agent("finance", "A");
		let details = s.select(Some(&a)).unwrap();
		assert_eq!(details.name, "A");
		assert_eq!(details.department, "finance");
		assert!(!details.is_active);

		let ticket = s.begin_refresh().unwrap();
		s.finish_refresh(ticket, Ok(traffic()), 5000.0);
		let details = s.selected_details().unwrap();
		assert!(details.is_active);
		assert_eq!(details.activity, 1);

		assert!(s.select(Some(&NodeId::agent("finance", "ghost"))).is_none());
		assert!(s.select(None).is_none());
	}

	#[test]
	fn department_and_agent_sharing_a_name_stay_distinct() {
		let domain = DomainModel::new([("X", vec![]), ("dept", vec!["X"])]);
		let mut s = TopologySession::new(domain, TopologyConfig::default());
		s.activate(0.0);
		assert_eq!(s.graph().node_count(), 3);

		let dept = s.select(Some(&NodeId::department("X"))).unwrap();
		assert!(dept.is_department);
		assert_eq!(dept.name, "X");

		let agent = s.select(Some(&NodeId::agent("dept", "X"))).unwrap();
		assert!(!agent.is_department);
		assert_eq!(agent.department, "dept");
	}

	#[test]
	fn hit_testing_finds_nodes_by_drawn_radius() {
		let mut s = session();
		s.activate(0.0);
		let anchor = s.graph().departments().next().unwrap().anchor;
		let id = s.node_at(anchor, 0.0).unwrap();
		assert_eq!(id, NodeId::department("finance"));
		assert!(s.node_at(Point::new(-1000.0, -1000.0), 5.0).is_none());
	}

	#[test]
	fn empty_domain_session_is_valid() {
		let mut s = TopologySession::new(DomainModel::default(), TopologyConfig::default());
		s.activate(0.0);
		let frame = s.on_frame(16.0).unwrap();
		assert!(frame.nodes.is_empty());
		assert_eq!(s.statistics().density, 0.0);
		let ticket = s.begin_refresh().unwrap();
		assert!(s.finish_refresh(ticket, Ok(traffic()), 5000.0));
		assert!(s.graph().is_empty());
	}
}
