use log::{debug, warn};

use super::error::FetchError;
use super::model::TrafficSnapshot;

/// Ticks a fetch may absorb before it is written off as hung.
pub const MAX_COALESCED_TICKS: u32 = 2;

/// Handed out when a refresh cycle begins; must be returned with the fetch result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshTicket {
	generation: u64,
	cycle: u64,
}

impl RefreshTicket {
	/// Sequence number of the cycle this ticket was issued for.
	pub fn cycle(&self) -> u64 {
		self.cycle
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RefreshState {
	Stopped,
	Idle,
	InFlight { ticket: RefreshTicket, absorbed: u32 },
}

/// Bookkeeping for the coarse refresh timer.
///
/// Ticks that arrive while a fetch is still in flight are coalesced into it,
/// up to [`MAX_COALESCED_TICKS`]; the next tick abandons that fetch and starts a
/// new cycle, and the abandoned result is discarded if it ever arrives. Stopping or restarting bumps the generation so results of fetches started
/// earlier are discarded instead of overwriting the newer session's graph.
#[derive(Debug)]
pub struct RefreshController {
	interval_ms: u32,
	state: RefreshState,
	generation: u64,
	cycles: u64,
	coalesced: u64,
	abandoned: u64,
	failures: u64,
}

impl RefreshController {
	/// A stopped controller; nothing is fetched until [`start`](Self::start).
	pub fn new(interval_ms: u32) -> Self {
		Self {
			interval_ms,
			state: RefreshState::Stopped,
			generation: 0,
			cycles: 0,
			coalesced: 0,
			abandoned: 0,
			failures: 0,
		}
	}

	/// Begins a new generation of cycles at `interval_ms`.
	pub fn start(&mut self, interval_ms: u32) {
		self.generation += 1;
		self.interval_ms = interval_ms;
		self.state = RefreshState::Idle;
	}

	/// Stops issuing tickets and invalidates every outstanding one.
	pub fn stop(&mut self) {
		self.generation += 1;
		self.state = RefreshState::Stopped;
	}

	/// Whether the controller has been started and not stopped since.
	pub fn is_running(&self) -> bool {
		self.state != RefreshState::Stopped
	}

	/// Whether a fetch has been started and not yet resolved.
	pub fn is_in_flight(&self) -> bool {
		matches!(self.state, RefreshState::InFlight { .. })
	}

	/// Timer period in milliseconds.
	pub fn interval_ms(&self) -> u32 {
		self.interval_ms
	}

	/// Called on every timer tick. Returns `None` when stopped or when the tick
	/// is folded into a fetch that has not completed yet.
	pub fn begin_cycle(&mut self) -> Option<RefreshTicket> {
		match self.state {
			RefreshState::Stopped => None,
			RefreshState::InFlight { ticket, absorbed } if absorbed < MAX_COALESCED_TICKS => {
				self.coalesced += 1;
				self.state = RefreshState::InFlight {
					ticket,
					absorbed: absorbed + 1,
				};
				debug!("refresh tick coalesced into cycle {}", ticket.cycle);
				None
			}
			RefreshState::InFlight { ticket, .. } => {
				self.abandoned += 1;
				warn!("refresh cycle {} never completed, starting a new one", ticket.cycle);
				Some(self.issue())
			}
			RefreshState::Idle => Some(self.issue()),
		}
	}

	fn issue(&mut self) -> RefreshTicket {
		self.cycles += 1;
		let ticket = RefreshTicket {
			generation: self.generation,
			cycle: self.cycles,
		};
		self.state = RefreshState::InFlight {
			ticket,
			absorbed: 0,
		};
		ticket
	}

	/// Resolves a cycle. Yields the snapshot only for a current, successful fetch;
	/// failures are logged and swallowed.
	pub fn complete(
		&mut self,
		ticket: RefreshTicket,
		result: Result<TrafficSnapshot, FetchError>,
	) -> Option<TrafficSnapshot> {
		let current = matches!(
			self.state,
			RefreshState::InFlight { ticket: t, .. } if t == ticket
		);
		if ticket.generation != self.generation || !current {
			debug!("discarding stale refresh result from cycle {}", ticket.cycle);
			return None;
		}
		self.state = RefreshState::Idle;
		match result {
			Ok(snapshot) => Some(snapshot),
			Err(e) => {
				self.failures += 1;
				warn!("traffic refresh failed, keeping previous graph: {e}");
				None
			}
		}
	}

	/// Tickets issued so far.
	pub fn cycles(&self) -> u64 {
		self.cycles
	}

	/// Ticks folded into a fetch still in flight.
	pub fn coalesced(&self) -> u64 {
		self.coalesced
	}

	/// Fetches written off after absorbing too many ticks.
	pub fn abandoned(&self) -> u64 {
		self.abandoned
	}

	/// Fetches that completed with an error.
	pub fn failures(&self) -> u64 {
		self.failures
	}
}
