use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::view::CanvasState;
use crate::topology::{FlowVisual, FrameParams, NodeId};

pub fn render(state: &CanvasState, ctx: &CanvasRenderingContext2d) {
	let frame = state.session.frame();
	let k = state.transform.k;
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(k, k);
	draw_links(frame, k, ctx);
	for flow in &frame.flows {
		draw_flow(flow, k, ctx);
	}
	draw_nodes(frame, state.session.selected(), k, ctx);
	ctx.restore();
}

fn draw_links(frame: &FrameParams, k: f64, ctx: &CanvasRenderingContext2d) {
	ctx.set_line_width(1.0 / k);
	for link in &frame.links {
		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", link.opacity));
		ctx.begin_path();
		ctx.move_to(link.from.x, link.from.y);
		ctx.line_to(link.to.x, link.to.y);
		ctx.stroke();
	}
}

fn draw_flow(flow: &FlowVisual, k: f64, ctx: &CanvasRenderingContext2d) {
	let (dash, gap, arrow_size) = (8.0 / k, 4.0 / k, 8.0 / k);
	let color = format!("rgba(255, 183, 77, {})", flow.opacity);

	ctx.set_stroke_style_str(&color);
	ctx.set_line_width(flow.width / k);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.set_line_dash_offset(-flow.dash_offset / k);
	ctx.begin_path();
	ctx.move_to(flow.source.x, flow.source.y);
	ctx.quadratic_curve_to(flow.control.x, flow.control.y, flow.target.x, flow.target.y);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());

	// Arrowhead along the curve's end tangent (control -> target).
	let (dx, dy) = (flow.target.x - flow.control.x, flow.target.y - flow.control.y);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	let (tip_x, tip_y) = (flow.target.x, flow.target.y);
	let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
	let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
	ctx.set_fill_style_str(&color);
	ctx.begin_path();
	ctx.move_to(tip_x, tip_y);
	ctx.line_to(back_x + px, back_y + py);
	ctx.line_to(back_x - px, back_y - py);
	ctx.close_path();
	ctx.fill();
}

fn draw_nodes(
	frame: &FrameParams,
	selected: Option<&NodeId>,
	k: f64,
	ctx: &CanvasRenderingContext2d,
) {
	for node in &frame.nodes {
		let (x, y) = (node.position.x, node.position.y);
		ctx.begin_path();
		let _ = ctx.arc(x, y, node.radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&node.css_color());
		ctx.fill();

		if selected == Some(&node.id) {
			ctx.begin_path();
			let _ = ctx.arc(x, y, node.radius + 3.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("rgba(255, 255, 255, 0.8)");
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}

		if node.is_department || selected == Some(&node.id) {
			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", node.opacity.max(0.6)));
			ctx.set_font(&format!("{}px sans-serif", 11.0 / k.max(0.5)));
			let _ = ctx.fill_text(&node.label, x + node.radius + 3.0, y + 3.0);
		}
	}
}
