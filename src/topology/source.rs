use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use chrono::{Duration, Utc};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::FetchError;
use super::model::{DomainModel, LiveMessage, LiveWorkflow, TrafficSnapshot, WorkflowStatus};

/// Where live messages and workflows come from.
pub trait TrafficSource {
	/// Pulls the latest messages and workflows.
	fn fetch(&self) -> impl Future<Output = Result<TrafficSnapshot, FetchError>>;
}

/// Polls two JSON endpoints, one for messages and one for workflows.
#[derive(Clone, Debug)]
pub struct HttpTrafficSource {
	client: reqwest::Client,
	messages_url: String,
	workflows_url: String,
}

impl HttpTrafficSource {
	/// Source polling the two given URLs.
	pub fn new(messages_url: impl Into<String>, workflows_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			messages_url: messages_url.into(),
			workflows_url: workflows_url.into(),
		}
	}

	async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, FetchError> {
		let response = self.client.get(url).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(FetchError::Status {
				url: url.to_owned(),
				status: status.as_u16(),
			});
		}
		decode_list(&response.text().await?)
	}
}

impl TrafficSource for HttpTrafficSource {
	fn fetch(&self) -> impl Future<Output = Result<TrafficSnapshot, FetchError>> {
		async move {
			let messages = self.get_list(&self.messages_url).await?;
			let workflows = self.get_list(&self.workflows_url).await?;
			Ok(TrafficSnapshot {
				messages,
				workflows,
			})
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
	List(Vec<T>),
	Wrapped {
		#[serde(alias = "messages", alias = "workflows", alias = "data")]
		items: Vec<T>,
	},
}

/// Accepts either a bare array or an object wrapping it under
/// `messages`, `workflows`, `data` or `items`.
pub fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, FetchError> {
	Ok(match serde_json::from_str::<Envelope<T>>(body)? {
		Envelope::List(items) | Envelope::Wrapped { items } => items,
	})
}

const MESSAGE_TYPES: &[&str] = &["request", "response", "handoff", "alert"];
const WORKFLOW_NAMES: &[&str] = &[
	"quarterly-close",
	"campaign-launch",
	"incident-triage",
	"vendor-review",
	"hiring-loop",
];
const STATUSES: &[WorkflowStatus] = &[
	WorkflowStatus::Running,
	WorkflowStatus::Active,
	WorkflowStatus::Pending,
	WorkflowStatus::Completed,
];

/// Deterministic pseudo-random traffic over a domain's agents, one snapshot per fetch.
#[derive(Clone, Debug)]
pub struct SampleTraffic {
	agents: Rc<[String]>,
	seed: u64,
	calls: Rc<Cell<u64>>,
	fail_every: Option<u64>,
}

impl SampleTraffic {
	/// Sample traffic over every agent of `domain`.
	pub fn new(domain: &DomainModel, seed: u64) -> Self {
		let agents: Vec<String> = domain
			.departments
			.iter()
			.flat_map(|d| d.agents.iter().cloned())
			.collect();
		Self {
			agents: agents.into(),
			seed,
			calls: Rc::new(Cell::new(0)),
			fail_every: None,
		}
	}

	/// Makes every `n`th fetch fail, to exercise the degrade path.
	pub fn failing_every(mut self, n: u64) -> Self {
		self.fail_every = (n > 0).then_some(n);
		self
	}

	/// The snapshot for `cycle`; the same seed and cycle always give the same traffic.
	pub fn snapshot(&self, cycle: u64) -> TrafficSnapshot {
		if self.agents.is_empty() {
			return TrafficSnapshot::default();
		}
		let mut rng = SmallRng::seed_from_u64(self.seed.wrapping_mul(31).wrapping_add(cycle));
		let now = Utc::now();
		let pick = |rng: &mut SmallRng| self.agents.choose(rng).cloned().unwrap_or_default();

		let messages = (0..rng.gen_range(0..=self.agents.len().min(8)))
			.map(|_| LiveMessage {
				source_agent: pick(&mut rng),
				target_agent: pick(&mut rng),
				message_type: MESSAGE_TYPES[rng.gen_range(0..MESSAGE_TYPES.len())].to_owned(),
				created_at: Some(now - Duration::seconds(rng.gen_range(0..300))),
			})
			.collect();

		let workflows = (0..rng.gen_range(0..=3))
			.map(|_| LiveWorkflow {
				workflow_name: WORKFLOW_NAMES[rng.gen_range(0..WORKFLOW_NAMES.len())].to_owned(),
				status: STATUSES[rng.gen_range(0..STATUSES.len())].clone(),
				source_agent: Some(pick(&mut rng)),
				target_agent: Some(pick(&mut rng)),
				started_at: Some(now - Duration::seconds(rng.gen_range(0..3600))),
			})
			.collect();

		TrafficSnapshot {
			messages,
			workflows,
		}
	}
}

impl TrafficSource for SampleTraffic {
	fn fetch(&self) -> impl Future<Output = Result<TrafficSnapshot, FetchError>> {
		let cycle = self.calls.get() + 1;
		self.calls.set(cycle);
		let result = match self.fail_every {
			Some(n) if cycle % n == 0 => {
				Err(FetchError::Unavailable(format!("sample outage on cycle {cycle}")))
			}
			_ => Ok(self.snapshot(cycle)),
		};
		std::future::ready(result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_bare_and_wrapped_lists() {
		let bare: Vec<LiveMessage> =
			decode_list(r#"[{"source_agent": "A", "target_agent": "B"}]"#).unwrap();
		assert_eq!(bare.len(), 1);
		assert_eq!(bare[0].source_agent, "A");

		let wrapped: Vec<LiveWorkflow> = decode_list(
			r#"{"workflows": [{"workflow_name": "w", "status": "active", "source_agent": "A"}]}"#,
		)
		.unwrap();
		assert_eq!(wrapped[0].status, WorkflowStatus::Active);
		assert_eq!(wrapped[0].target_agent, None);

		let data: Vec<LiveMessage> = decode_list(r#"{"data": []}"#).unwrap();
		assert!(data.is_empty());
	}

	#[test]
	fn decode_errors_are_fetch_errors() {
		let err = decode_list::<LiveMessage>("not json").unwrap_err();
		assert!(matches!(err, FetchError::Decode(_)));
	}

	#[test]
	fn sample_traffic_only_names_domain_agents() {
		let domain = DomainModel::new([("finance", vec!["A", "B"]), ("marketing", vec!["C"])]);
		let source = SampleTraffic::new(&domain, 9);
		for cycle in 0..20 {
			let snap = source.snapshot(cycle);
			for m in &snap.messages {
				assert!(["A", "B", "C"].contains(&m.source_agent.as_str()));
				assert!(["A", "B", "C"].contains(&m.target_agent.as_str()));
			}
			assert!(snap.workflows.len() <= 3);
		}
	}

	#[test]
	fn sample_traffic_is_deterministic_per_cycle() {
		let domain = DomainModel::new([("ops", vec!["X", "Y", "Z"])]);
		let a = SampleTraffic::new(&domain, 3).snapshot(4);
		let b = SampleTraffic::new(&domain, 3).snapshot(4);
		let names = |s: &TrafficSnapshot| {
			s.messages
				.iter()
				.map(|m| (m.source_agent.clone(), m.target_agent.clone()))
				.collect::<Vec<_>>()
		};
		assert_eq!(names(&a), names(&b));
		assert_eq!(a.workflows.len(), b.workflows.len());
	}

	#[test]
	fn empty_domain_yields_empty_traffic() {
		let snap = SampleTraffic::new(&DomainModel::default(), 1).snapshot(1);
		assert_eq!(snap, TrafficSnapshot::default());
	}
}
