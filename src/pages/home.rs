use leptos::prelude::*;

use crate::components::topology_canvas::TopologyCanvas;
use crate::topology::{
	DomainModel, HttpTrafficSource, NetworkStatistics, NodeDetails, SampleTraffic,
};

/// Live endpoints baked in at build time; without them the page runs on sample traffic.
const MESSAGES_URL: Option<&str> = option_env!("TOPOLOGY_MESSAGES_URL");
const WORKFLOWS_URL: Option<&str> = option_env!("TOPOLOGY_WORKFLOWS_URL");

/// Demo organisation used until a real hierarchy is wired in.
fn sample_domain() -> DomainModel {
	DomainModel::new([
		("finance", vec!["Ledger", "Forecaster", "Auditor"]),
		("marketing", vec!["Copywriter", "Campaigner"]),
		("engineering", vec!["Planner", "Reviewer", "Deployer", "Tester"]),
		("operations", vec!["Scheduler", "Dispatcher"]),
		("security", vec!["Sentinel", "Responder"]),
	])
}

#[component]
fn StatsPanel(stats: ReadSignal<NetworkStatistics>) -> impl IntoView {
	view! {
		<dl class="graph-stats">
			<dt>"Nodes"</dt>
			<dd>{move || stats.get().total_nodes}</dd>
			<dt>"Edges"</dt>
			<dd>{move || stats.get().total_edges}</dd>
			<dt>"Avg degree"</dt>
			<dd>{move || format!("{:.2}", stats.get().average_degree)}</dd>
			<dt>"Density"</dt>
			<dd>{move || format!("{:.3}", stats.get().density)}</dd>
			<dt>"Active workflows"</dt>
			<dd>{move || stats.get().active_workflow_count}</dd>
		</dl>
	}
}

#[component]
fn NodeCard(details: NodeDetails) -> impl IntoView {
	let last_seen = details
		.last_activity
		.map(|t| t.format("%H:%M:%S UTC").to_string())
		.unwrap_or_else(|| "never".into());
	let kind = if details.is_department { "Department" } else { "Agent" };
	let status = if details.is_active { "active" } else { "idle" };

	view! {
		<div class="node-details">
			<h2>{details.name}</h2>
			<p class="kind">{kind} " in " {details.department}</p>
			<p>"Activity: " {details.activity} " (" {status} ")"</p>
			<p>"Last activity: " {last_seen}</p>
		</div>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let domain = sample_domain();
	let (stats, set_stats) = signal(NetworkStatistics::default());
	let (selected, set_selected) = signal(None::<NodeDetails>);

	let canvas = match (MESSAGES_URL, WORKFLOWS_URL) {
		(Some(messages), Some(workflows)) => view! {
			<TopologyCanvas
				domain=domain
				source=HttpTrafficSource::new(messages, workflows)
				fullscreen=true
				on_stats=set_stats
				on_select=set_selected
			/>
		}
		.into_any(),
		_ => {
			let source = SampleTraffic::new(&domain, 42);
			view! {
				<TopologyCanvas
					domain=domain
					source=source
					fullscreen=true
					on_stats=set_stats
					on_select=set_selected
				/>
			}
			.into_any()
		}
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				{canvas}
				<div class="graph-overlay">
					<h1>"Agent Network Topology"</h1>
					<p class="subtitle">"Click a node for details. Scroll to zoom. Drag background to pan."</p>
					<StatsPanel stats=stats />
					{move || selected.get().map(|details| view! { <NodeCard details=details /> })}
				</div>
			</div>
		</ErrorBoundary>
	}
}
