use crate::topology::{NodeId, Point, TopologySession};

/// Screen-space slack around a node disc that still counts as a hit.
pub const HIT_SLACK: f64 = 4.0;
/// Pointer travel (px) after which a press is a pan rather than a click.
const CLICK_TOLERANCE: f64 = 3.0;

#[derive(Clone, Debug)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

pub struct CanvasState {
	pub session: TopologySession,
	pub transform: ViewTransform,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
}

impl CanvasState {
	pub fn new(session: TopologySession, width: f64, height: f64) -> Self {
		Self {
			session,
			transform: ViewTransform::default(),
			pan: PanState::default(),
			width,
			height,
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Point {
		Point::new(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_screen(&self, sx: f64, sy: f64) -> Option<NodeId> {
		self.session
			.node_at(self.screen_to_graph(sx, sy), HIT_SLACK / self.transform.k)
	}

	pub fn begin_pan(&mut self, sx: f64, sy: f64) {
		self.pan = PanState {
			active: true,
			moved: false,
			start_x: sx,
			start_y: sy,
			transform_start_x: self.transform.x,
			transform_start_y: self.transform.y,
		};
	}

	pub fn pan_to(&mut self, sx: f64, sy: f64) {
		if !self.pan.active {
			return;
		}
		let (dx, dy) = (sx - self.pan.start_x, sy - self.pan.start_y);
		if dx.hypot(dy) > CLICK_TOLERANCE {
			self.pan.moved = true;
		}
		// A press stays a click, and leaves the view alone, until it travels.
		if !self.pan.moved {
			return;
		}
		self.transform.x = self.pan.transform_start_x + dx;
		self.transform.y = self.pan.transform_start_y + dy;
	}

	/// Ends a press. Returns `true` when it never moved far enough to be a pan.
	pub fn end_pan(&mut self) -> bool {
		let click = self.pan.active && !self.pan.moved;
		self.pan.active = false;
		self.pan.moved = false;
		click
	}

	/// Zooms around the pointer so the graph point under it stays fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;
	use crate::topology::{DomainModel, TopologyConfig};

	fn state() -> CanvasState {
		let domain = DomainModel::new([("finance", vec!["A", "B"]), ("marketing", vec!["C"])]);
		let mut session = TopologySession::new(domain, TopologyConfig::default());
		session.activate(0.0);
		CanvasState::new(session, 800.0, 600.0)
	}

	#[test]
	fn zoom_keeps_the_pointer_anchored() {
		let mut s = state();
		let before = s.screen_to_graph(320.0, 240.0);
		s.zoom_at(320.0, 240.0, -1.0);
		s.zoom_at(320.0, 240.0, -1.0);
		let after = s.screen_to_graph(320.0, 240.0);
		assert_relative_eq!(before.x, after.x, epsilon = 1e-9);
		assert_relative_eq!(before.y, after.y, epsilon = 1e-9);
		assert_relative_eq!(s.transform.k, 1.21, epsilon = 1e-9);
	}

	#[test]
	fn zoom_is_clamped() {
		let mut s = state();
		for _ in 0..100 {
			s.zoom_at(0.0, 0.0, 1.0);
		}
		assert_relative_eq!(s.transform.k, 0.1, epsilon = 1e-9);
	}

	#[test]
	fn short_press_is_a_click_long_drag_is_a_pan() {
		let mut s = state();
		s.begin_pan(100.0, 100.0);
		s.pan_to(101.0, 101.0);
		assert!(s.end_pan());
		assert_relative_eq!(s.transform.x, 0.0);
		assert_relative_eq!(s.transform.y, 0.0);

		s.begin_pan(100.0, 100.0);
		s.pan_to(150.0, 120.0);
		assert!(!s.end_pan());
		assert_relative_eq!(s.transform.x, 50.0);
		assert_relative_eq!(s.transform.y, 20.0);
	}

	#[test]
	fn drag_keeps_following_after_returning_near_the_start() {
		let mut s = state();
		s.begin_pan(100.0, 100.0);
		s.pan_to(110.0, 100.0);
		s.pan_to(101.0, 100.0);
		assert_relative_eq!(s.transform.x, 1.0);
		assert!(!s.end_pan());
	}

	#[test]
	fn clicking_an_anchor_hits_its_department() {
		let mut s = state();
		s.begin_pan(0.0, 0.0);
		s.pan_to(40.0, -10.0);
		s.end_pan();
		let anchor = s.session.graph().departments().next().unwrap().anchor;
		let (sx, sy) = (
			anchor.x * s.transform.k + s.transform.x,
			anchor.y * s.transform.k + s.transform.y,
		);
		assert_eq!(s.node_at_screen(sx, sy), Some(NodeId::department("finance")));
	}
}
