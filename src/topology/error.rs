use thiserror::Error;

/// Failure while pulling live traffic. Never fatal: the session keeps its previous graph.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The request never produced a response.
	#[error("transport error: {0}")]
	Transport(#[from] reqwest::Error),

	/// The endpoint answered with a non-success status.
	#[error("endpoint {url} answered with status {status}")]
	Status { url: String, status: u16 },

	/// The body was not a message or workflow list.
	#[error("malformed payload: {0}")]
	Decode(#[from] serde_json::Error),

	/// The source could not serve a snapshot.
	#[error("source unavailable: {0}")]
	Unavailable(String),
}

/// Errors surfaced while setting up a topology view.
#[derive(Debug, Error)]
pub enum TopologyError {
	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The department hierarchy could not be read.
	#[error("invalid domain model: {0}")]
	InvalidDomain(String),

	/// Input was not valid JSON.
	#[error("decode error: {0}")]
	Decode(#[from] serde_json::Error),

	/// A traffic fetch failed.
	#[error(transparent)]
	Fetch(#[from] FetchError),
}

/// Result alias for topology setup.
pub type Result<T> = std::result::Result<T, TopologyError>;
