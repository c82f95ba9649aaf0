pub mod chart;
pub mod style;

pub use chart::{BarChartRenderer, ChartLayout};
pub use style::{BarFill, PALETTE, gradient_color};
