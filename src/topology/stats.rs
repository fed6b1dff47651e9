use serde::Serialize;

use super::model::Graph;

/// Summary metrics shown next to the visualization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct NetworkStatistics {
	/// Departments plus agents.
	pub total_nodes: usize,
	/// Hierarchy plus flow edges.
	pub total_edges: usize,
	/// `2E / N`; 0 for an empty graph.
	pub average_degree: f64,
	/// Edges over the maximum possible undirected edge count; 0 for fewer than two nodes.
	pub density: f64,
	/// Running or active workflows, resolved or not.
	pub active_workflow_count: usize,
}

/// Computes the statistics of `graph`.
pub fn summarize(graph: &Graph) -> NetworkStatistics {
	let nodes = graph.node_count();
	let edges = graph.edge_count();
	let (n, e) = (nodes as f64, edges as f64);
	NetworkStatistics {
		total_nodes: nodes,
		total_edges: edges,
		average_degree: if nodes == 0 { 0.0 } else { 2.0 * e / n },
		density: if nodes < 2 { 0.0 } else { e / (n * (n - 1.0) / 2.0) },
		active_workflow_count: graph.active_workflows(),
	}
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;
	use proptest::prelude::*;

	use super::*;
	use crate::topology::builder::GraphModelBuilder;
	use crate::topology::config::TopologyConfig;
	use crate::topology::model::{DomainModel, LiveWorkflow, WorkflowStatus};

	fn build(domain: &DomainModel, workflows: &[LiveWorkflow]) -> Graph {
		GraphModelBuilder::new(&TopologyConfig::default()).build(domain, &[], workflows, 0.0)
	}

	#[test]
	fn scenario_counts() {
		let domain = DomainModel::new([("finance", vec!["A", "B"]), ("marketing", vec!["C"])]);
		let workflows = [
			LiveWorkflow {
				workflow_name: "w1".into(),
				status: WorkflowStatus::Running,
				source_agent: Some("A".into()),
				target_agent: Some("C".into()),
				started_at: None,
			},
			LiveWorkflow {
				workflow_name: "w2".into(),
				status: WorkflowStatus::Active,
				source_agent: Some("ghost".into()),
				target_agent: Some("C".into()),
				started_at: None,
			},
		];
		let stats = summarize(&build(&domain, &workflows));
		assert_eq!(stats.total_nodes, 5);
		assert_eq!(stats.total_edges, 4);
		assert_relative_eq!(stats.average_degree, 8.0 / 5.0);
		assert_relative_eq!(stats.density, 4.0 / 10.0);
		assert_eq!(stats.active_workflow_count, 2);
	}

	#[test]
	fn empty_graph_has_zero_density_not_nan() {
		let stats = summarize(&Graph::default());
		assert_eq!(stats, NetworkStatistics::default());
		assert_eq!(stats.density, 0.0);
		assert_eq!(stats.average_degree, 0.0);
	}

	#[test]
	fn single_node_has_zero_density() {
		let domain = DomainModel::new([("solo", Vec::<String>::new())]);
		let stats = summarize(&build(&domain, &[]));
		assert_eq!(stats.total_nodes, 1);
		assert_eq!(stats.density, 0.0);
	}

	proptest! {
		#[test]
		fn totals_match_graph_and_are_idempotent(sizes in prop::collection::vec(0usize..8, 0..8)) {
			let domain = DomainModel::new(sizes.iter().enumerate().map(|(i, &n)| {
				(format!("d{i}"), (0..n).map(|j| format!("agent-{i}-{j}")).collect::<Vec<_>>())
			}));
			let graph = build(&domain, &[]);
			let stats = summarize(&graph);
			prop_assert_eq!(stats.total_nodes, graph.departments().count() + graph.agents().count());
			prop_assert_eq!(stats.total_edges, graph.hierarchy_edges().len() + graph.flow_edges().len());
			if stats.total_nodes > 0 {
				let expected = 2.0 * stats.total_edges as f64 / stats.total_nodes as f64;
				prop_assert!((stats.average_degree - expected).abs() < 1e-12);
			}
			prop_assert!(stats.density.is_finite());
			prop_assert_eq!(stats, summarize(&graph));
		}
	}
}
