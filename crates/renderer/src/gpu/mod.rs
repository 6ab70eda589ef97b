//! wgpu backend for the viewer.
//!
//! - `context` owns instance/device/surface wiring and reconfigures the
//!   swapchain on resize or vsync changes.
//! - `textures` implements the texture subsystem's device seam, emulating
//!   numbered texture units with a rebuildable bind group.
//! - `mipmaps` fills mip chains with render-pass blits.
//! - `program` compiles GLSL through naga, reflects the uniform block and
//!   links the render pipeline.
//! - `uniforms` is the CPU mirror of a reflected std140 block.
//! - `quad` holds the indexed full-viewport quad every frame draws.

mod context;
mod mipmaps;
mod program;
mod quad;
mod textures;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use program::ProgramTargets;
pub use program::ShaderProgram;
pub(crate) use quad::ScreenQuad;
pub(crate) use textures::WgpuTextureDevice;
pub use uniforms::{UniformBlock, UniformField, UniformKind, UniformLocation, UniformValue};
