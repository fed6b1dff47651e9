use serde::{Deserialize, Serialize};

use super::error::{Result, TopologyError};

/// Shortest refresh period accepted by [`TopologyConfig::validate`].
pub const MIN_REFRESH_INTERVAL_MS: u32 = 250;

/// Every tunable of the topology view, grouped by the part that reads it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
	/// Canvas size; the layout is centred in it.
	pub viewport: ViewportConfig,
	/// Initial placement.
	pub layout: LayoutConfig,
	/// Force layout.
	pub simulation: SimulationConfig,
	/// Per-frame visuals.
	pub animation: AnimationConfig,
	/// Traffic polling.
	pub refresh: RefreshConfig,
	/// Seed for pulse and flow phases.
	pub seed: u64,
}

/// Size of the drawing surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
	/// Canvas width in pixels.
	pub width: f64,
	/// Canvas height in pixels.
	pub height: f64,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			width: 800.0,
			height: 600.0,
		}
	}
}

/// Where nodes start before the simulation moves them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Radius of the ring that department anchors sit on.
	pub department_radius: f64,
	/// Base orbit radius of agents around their department.
	pub agent_radius: f64,
	/// Amplitude of the slow breathing of each orbit radius.
	pub agent_jitter: f64,
	/// Radians per millisecond of slow orbit rotation applied at build time.
	pub rotation_speed: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			department_radius: 200.0,
			agent_radius: 60.0,
			agent_jitter: 10.0,
			rotation_speed: 0.000_05,
		}
	}
}

/// Force strengths and integrator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
	/// Rest length of department to agent links.
	pub hierarchy_distance: f64,
	/// Rest length of workflow links.
	pub flow_distance: f64,
	/// Negative values repel.
	pub charge: f64,
	/// Pull of every free node toward the viewport centre.
	pub centering_strength: f64,
	/// Minimum distance kept between node centres.
	pub collision_radius: f64,
	/// Fraction of a hierarchy link's error corrected per tick.
	pub link_strength: f64,
	/// Hierarchy links of idle agents are this much longer and this much weaker.
	pub idle_link_factor: f64,
	/// Fraction of a workflow link's error corrected per tick.
	pub flow_strength: f64,
	/// How fast alpha cools toward `alpha_min` each tick.
	pub alpha_decay: f64,
	/// Floor alpha settles at; the layout never fully freezes.
	pub alpha_min: f64,
	/// Velocity damping passed to the integrator.
	pub damping: f64,
	/// Integrator speed factor.
	pub node_speed: f64,
	/// Cap on the per-tick charge force.
	pub force_max: f64,
	/// Mass of every body.
	pub node_mass: f64,
	/// Seed agent positions from the previous layout on rebuild.
	pub carry_positions: bool,
}

impl Default for SimulationConfig {
	fn default() -> Self {
		Self {
			hierarchy_distance: 60.0,
			flow_distance: 100.0,
			charge: -200.0,
			centering_strength: 0.02,
			collision_radius: 20.0,
			link_strength: 0.3,
			idle_link_factor: 1.2,
			flow_strength: 0.05,
			alpha_decay: 0.0228,
			alpha_min: 0.05,
			damping: 0.9,
			node_speed: 3000.0,
			force_max: 100.0,
			node_mass: 10.0,
			carry_positions: true,
		}
	}
}

/// Pulse, colour and dash parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
	/// Radians per millisecond of the pulse sine.
	pub pulse_speed: f64,
	/// Radius swing of a pulsing node.
	pub pulse_amplitude: f64,
	/// Base drawn radius of departments.
	pub department_radius: f64,
	/// Base drawn radius of active agents.
	pub agent_radius: f64,
	/// Drawn radius of idle agents.
	pub inactive_radius: f64,
	/// Opacity of idle agents.
	pub inactive_opacity: f64,
	/// Colour of an active node at the pulse trough.
	pub hue_from: [u8; 3],
	/// Colour at the pulse peak.
	pub hue_to: [u8; 3],
	/// Dash units per millisecond.
	pub dash_speed: f64,
	/// Dash pattern length the offset wraps at.
	pub dash_period: f64,
	/// Control point offset as a fraction of endpoint distance.
	pub flow_curvature: f64,
	/// Upper bound for the simulation step in seconds.
	pub max_frame_dt: f64,
}

impl Default for AnimationConfig {
	fn default() -> Self {
		Self {
			pulse_speed: 0.004,
			pulse_amplitude: 3.0,
			department_radius: 14.0,
			agent_radius: 7.0,
			inactive_radius: 5.0,
			inactive_opacity: 0.45,
			hue_from: [79, 195, 247],
			hue_to: [171, 71, 188],
			dash_speed: 0.03,
			dash_period: 12.0,
			flow_curvature: 0.25,
			max_frame_dt: 0.05,
		}
	}
}

/// Traffic polling period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
	/// Milliseconds between traffic polls.
	pub interval_ms: u32,
}

impl Default for RefreshConfig {
	fn default() -> Self {
		Self { interval_ms: 5000 }
	}
}

impl TopologyConfig {
	/// Parses and validates a config; missing fields take their defaults.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects any value that could drive the layout or the animation non-finite.
	pub fn validate(&self) -> Result<()> {
		let sim = &self.simulation;
		let anim = &self.animation;
		let finite = [
			("layout.agent_jitter", self.layout.agent_jitter),
			("layout.rotation_speed", self.layout.rotation_speed),
			("simulation.charge", sim.charge),
			("animation.pulse_speed", anim.pulse_speed),
			("animation.pulse_amplitude", anim.pulse_amplitude),
			("animation.dash_speed", anim.dash_speed),
			("animation.flow_curvature", anim.flow_curvature),
		];
		for (name, value) in finite {
			if !value.is_finite() {
				return Err(invalid(name, "finite", value));
			}
		}
		let positive = [
			("viewport.width", self.viewport.width),
			("viewport.height", self.viewport.height),
			("layout.department_radius", self.layout.department_radius),
			("layout.agent_radius", self.layout.agent_radius),
			("simulation.hierarchy_distance", sim.hierarchy_distance),
			("simulation.flow_distance", sim.flow_distance),
			("simulation.collision_radius", sim.collision_radius),
			("simulation.idle_link_factor", sim.idle_link_factor),
			("simulation.node_mass", sim.node_mass),
			("simulation.node_speed", sim.node_speed),
			("simulation.force_max", sim.force_max),
			("animation.department_radius", anim.department_radius),
			("animation.agent_radius", anim.agent_radius),
			("animation.inactive_radius", anim.inactive_radius),
			("animation.dash_period", anim.dash_period),
			("animation.max_frame_dt", anim.max_frame_dt),
		];
		for (name, value) in positive {
			if !(value.is_finite() && value > 0.0) {
				return Err(invalid(name, "positive", value));
			}
		}
		let unit = [
			("simulation.link_strength", sim.link_strength),
			("simulation.flow_strength", sim.flow_strength),
			("simulation.centering_strength", sim.centering_strength),
			("simulation.alpha_min", sim.alpha_min),
			("simulation.damping", sim.damping),
			("animation.inactive_opacity", anim.inactive_opacity),
		];
		for (name, value) in unit {
			if !(0.0..=1.0).contains(&value) {
				return Err(invalid(name, "in [0, 1]", value));
			}
		}
		if !(0.0..1.0).contains(&sim.alpha_decay) {
			return Err(invalid("simulation.alpha_decay", "in [0, 1)", sim.alpha_decay));
		}
		if self.refresh.interval_ms < MIN_REFRESH_INTERVAL_MS {
			return Err(TopologyError::InvalidConfig(format!(
				"refresh.interval_ms must be at least {MIN_REFRESH_INTERVAL_MS}, got {}",
				self.refresh.interval_ms
			)));
		}
		Ok(())
	}

	/// Point the layout is centred on.
	pub fn center(&self) -> (f64, f64) {
		(self.viewport.width / 2.0, self.viewport.height / 2.0)
	}
}

fn invalid(name: &str, expected: &str, value: f64) -> TopologyError {
	TopologyError::InvalidConfig(format!("{name} must be {expected}, got {value}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		TopologyConfig::default().validate().unwrap();
	}

	#[test]
	fn partial_json_fills_defaults() {
		let config =
			TopologyConfig::from_json(r#"{"refresh": {"interval_ms": 1000}, "seed": 7}"#).unwrap();
		assert_eq!(config.refresh.interval_ms, 1000);
		assert_eq!(config.seed, 7);
		assert_eq!(config.simulation.hierarchy_distance, 60.0);
		assert_eq!(config.simulation.charge, -200.0);
	}

	#[test]
	fn rejects_short_interval() {
		let err = TopologyConfig::from_json(r#"{"refresh": {"interval_ms": 10}}"#).unwrap_err();
		assert!(matches!(err, TopologyError::InvalidConfig(_)));
	}

	#[test]
	fn rejects_values_that_would_poison_the_layout() {
		let cases: [fn(&mut TopologyConfig); 6] = [
			|c| c.simulation.idle_link_factor = 0.0,
			|c| c.simulation.link_strength = 1.5,
			|c| c.simulation.flow_strength = f64::NAN,
			|c| c.simulation.centering_strength = -0.1,
			|c| c.animation.pulse_speed = f64::INFINITY,
			|c| c.animation.dash_speed = f64::NAN,
		];
		for break_it in cases {
			let mut config = TopologyConfig::default();
			break_it(&mut config);
			assert!(matches!(config.validate(), Err(TopologyError::InvalidConfig(_))));
		}
	}

	#[test]
	fn zero_idle_factor_from_json_is_rejected() {
		let err = TopologyConfig::from_json(r#"{"simulation": {"idle_link_factor": 0}}"#)
			.unwrap_err();
		assert!(err.to_string().contains("idle_link_factor"));
	}

	#[test]
	fn rejects_non_positive_collision_radius() {
		let mut config = TopologyConfig::default();
		config.simulation.collision_radius = 0.0;
		assert!(config.validate().is_err());
	}
}
