mod component;
mod render;
mod view;

pub use component::TopologyCanvas;
