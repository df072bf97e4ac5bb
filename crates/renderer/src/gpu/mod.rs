//! wgpu side of the filter viewer.
//!
//! - `context` owns instance/adapter/device/surface wiring and reconfigures
//!   the swapchain on resize.
//! - `program` turns a linked [`crate::shader::LinkedProgram`] into a render
//!   pipeline and stages its uniform block per pass.
//! - `quad` holds the single textured quad every draw reuses.
//! - `texture` uploads decoded images with their mip chain.
//! - `offscreen` provides the filter cache target and the blur pass that
//!   renders into it.

mod context;
mod offscreen;
mod program;
mod quad;
mod texture;
mod uniforms;

pub(crate) use context::GpuContext;
pub use context::request_headless_device;
pub use offscreen::{
    BlurPass, OffscreenTarget, CACHE_FORMAT, MODE_BLUR, MODE_FLAT, MODE_PASS_THROUGH,
};
pub(crate) use offscreen::set_viewport;
pub use program::ShaderProgram;
pub use quad::{Quad, QuadVertex, QUAD_INDICES, QUAD_VERTICES};
pub use texture::{load_texture_2d, upload_texture, GpuTexture};
