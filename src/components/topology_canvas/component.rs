use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::view::CanvasState;
use crate::topology::{
	DomainModel, NetworkStatistics, NodeDetails, TopologyConfig, TopologySession, TrafficSource,
};

type SharedState = Rc<RefCell<Option<CanvasState>>>;
type SharedClosure<F> = Rc<RefCell<Option<Closure<F>>>>;

fn now_ms(window: &Window) -> f64 {
	window.performance().map(|p| p.now()).unwrap_or(0.0)
}

fn local_point(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// Handles that must be released together when the view goes away.
#[derive(Clone)]
struct Teardown {
	state: SharedState,
	animate: SharedClosure<dyn FnMut(f64)>,
	tick: SharedClosure<dyn FnMut()>,
	resize: SharedClosure<dyn FnMut()>,
	frame_id: Rc<Cell<Option<i32>>>,
	interval_id: Rc<Cell<Option<i32>>>,
}

impl Teardown {
	/// Stops the session and cancels both timers. Closures are kept alive.
	fn cancel(&self) {
		if let Some(ref mut s) = *self.state.borrow_mut() {
			s.session.deactivate();
		}
		if let Some(window) = web_sys::window() {
			if let Some(id) = self.interval_id.take() {
				window.clear_interval_with_handle(id);
			}
			if let Some(id) = self.frame_id.take() {
				let _ = window.cancel_animation_frame(id);
			}
			if let Some(ref cb) = *self.resize.borrow() {
				let _ = window
					.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}
	}

	fn run(&self) {
		self.cancel();
		self.animate.borrow_mut().take();
		self.tick.borrow_mut().take();
		self.resize.borrow_mut().take();
	}
}

/// Starts one refresh cycle unless one is already in flight.
fn refresh_once<S>(
	state: &SharedState,
	source: &S,
	on_stats: Option<WriteSignal<NetworkStatistics>>,
	on_select: Option<WriteSignal<Option<NodeDetails>>>,
) where
	S: TrafficSource + Clone + 'static,
{
	let ticket = match *state.borrow_mut() {
		Some(ref mut s) => s.session.begin_refresh(),
		None => None,
	};
	let Some(ticket) = ticket else {
		return;
	};
	let (state, source) = (state.clone(), source.clone());
	spawn_local(async move {
		let result = source.fetch().await;
		let now = web_sys::window().map(|w| now_ms(&w)).unwrap_or(0.0);
		if let Some(ref mut s) = *state.borrow_mut() {
			if s.session.finish_refresh(ticket, result, now) {
				if let Some(set) = on_stats {
					set.set(s.session.statistics());
				}
				if let Some(set) = on_select {
					set.set(s.session.selected_details());
				}
			}
		}
	});
}

#[component]
pub fn TopologyCanvas<S>(
	domain: DomainModel,
	source: S,
	#[prop(optional)] config: Option<TopologyConfig>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(optional)] on_stats: Option<WriteSignal<NetworkStatistics>>,
	#[prop(optional)] on_select: Option<WriteSignal<Option<NodeDetails>>>,
) -> impl IntoView
where
	S: TrafficSource + Clone + 'static,
{
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let teardown = Teardown {
		state: Rc::new(RefCell::new(None)),
		animate: Rc::new(RefCell::new(None)),
		tick: Rc::new(RefCell::new(None)),
		resize: Rc::new(RefCell::new(None)),
		frame_id: Rc::new(Cell::new(None)),
		interval_id: Rc::new(Cell::new(None)),
	};
	let state = teardown.state.clone();
	let init = teardown.clone();

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		// One session and one loop per mounted canvas.
		if init.state.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			(
				window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0),
				window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0),
			)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = match canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		{
			Some(ctx) => ctx,
			None => {
				warn!("2d canvas context unavailable, topology view not started");
				return;
			}
		};

		let mut config = config.clone().unwrap_or_default();
		config.viewport.width = w;
		config.viewport.height = h;
		if let Err(e) = config.validate() {
			warn!("{e}; falling back to default topology configuration");
			config = TopologyConfig {
				viewport: config.viewport.clone(),
				..TopologyConfig::default()
			};
		}
		let interval_ms = config.refresh.interval_ms;
		let mut session = TopologySession::new(domain.clone(), config);
		session.activate(now_ms(&window));
		if let Some(set) = on_stats {
			set.set(session.statistics());
		}
		*init.state.borrow_mut() = Some(CanvasState::new(session, w, h));

		if fullscreen {
			let (state_resize, canvas_resize) = (init.state.clone(), canvas.clone());
			*init.resize.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = (
					win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0),
					win.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0),
				);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *init.resize.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner, frame_id, stop) = (
			init.state.clone(),
			init.animate.clone(),
			init.frame_id.clone(),
			init.clone(),
		);
		*init.animate.borrow_mut() = Some(Closure::new(move |ts: f64| {
			if !canvas.is_connected() {
				stop.cancel();
				return;
			}
			let mut running = false;
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				running = s.session.on_frame(ts).is_some();
				render::render(s, &ctx);
			}
			if !running {
				return;
			}
			if let (Some(cb), Some(win)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
				frame_id.set(win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
			}
		}));
		if let Some(ref cb) = *init.animate.borrow() {
			init.frame_id
				.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		}

		let (state_tick, source_tick) = (init.state.clone(), source.clone());
		*init.tick.borrow_mut() = Some(Closure::new(move || {
			refresh_once(&state_tick, &source_tick, on_stats, on_select);
		}));
		if let Some(ref cb) = *init.tick.borrow() {
			init.interval_id.set(
				window
					.set_interval_with_callback_and_timeout_and_arguments_0(
						cb.as_ref().unchecked_ref(),
						interval_ms as i32,
					)
					.ok(),
			);
		}
		refresh_once(&init.state, &source, on_stats, on_select);
	});

	let cleanup = StoredValue::new_local(teardown);
	on_cleanup(move || {
		cleanup.try_with_value(Teardown::run);
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = local_point(&canvas, &ev);
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.begin_pan(x, y);
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = local_point(&canvas, &ev);
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			s.pan_to(x, y);
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = local_point(&canvas, &ev);
		if let Some(ref mut s) = *state_mu.borrow_mut() {
			if s.end_pan() {
				let hit = s.node_at_screen(x, y);
				let details = s.session.select(hit.as_ref());
				if let Some(set) = on_select {
					set.set(details);
				}
			}
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.end_pan();
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = local_point(&canvas, &ev);
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.zoom_at(x, y, ev.delta_y());
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="topology-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
