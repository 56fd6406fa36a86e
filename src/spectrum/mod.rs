pub mod axis;
pub mod matrix;
pub mod mel;
pub mod mode;
pub mod transform;

pub use axis::{display_bounds, AxisTransform, DisplayBounds, Scale};
pub use matrix::{SpectrogramMatrix, DB_FLOOR};
pub use mode::{DynamicRange, Mode, ModeConfig};
pub use transform::TransformEngine;
