//! PDF to image conversion

mod naming;
mod pipeline;
mod renderer;

pub use naming::*;
pub use pipeline::*;
pub use renderer::*;
