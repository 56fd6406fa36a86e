pub mod enhance;
pub mod figure;
pub mod palette;
pub mod text;

pub use enhance::{enhance, EnhanceSettings};
pub use figure::{FigureSpec, RenderProfile, Renderer};
pub use palette::Palette;
pub use text::TextOverlay;
