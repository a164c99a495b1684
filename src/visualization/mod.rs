//! Rendering of analysis results.

pub mod scatter;

pub use scatter::{ScatterPlot, SvgScatterPlotter};
