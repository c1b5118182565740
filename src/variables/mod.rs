//! Layered variable resolution producing the substitution context for rendering.

pub mod context;
pub mod resolver;
pub mod unique_dir;


pub use context::{ServiceModel, Value, VariableContext};
pub use resolver::{resolve, ResolveError, ResolveInputs};
pub use unique_dir::create_unique_directory;
