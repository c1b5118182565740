//! Template rendering seam and the default placeholder renderer.

pub mod placeholder;
pub mod renderer;


pub use placeholder::PlaceholderRenderer;
pub use renderer::{write_generated, RenderError, Renderer};
