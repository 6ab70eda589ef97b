//! Renderer crate for FraX, an interactive escape-time fractal viewer.
//!
//! The crate glues a `winit` window, a `wgpu` pipeline compiled from GLSL, and
//! a name-keyed texture cache together. The overall flow is:
//!
//! ```text
//!   CLI / config file
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ render()
//!                         │                                   │
//!                         ├─ TextureManager ─ bind_to_unit ───┤
//!                         └─ FractalView ─── view uniforms ───┴─▶ GPU UBO
//! ```
//!
//! The [`texture`] module is written against the [`texture::GraphicsDevice`]
//! seam and does not depend on wgpu; the `gpu` module provides the wgpu
//! implementation the window uses.

mod compile;
mod gpu;
mod types;
mod view;
mod window;

pub mod texture;

use anyhow::Result;

pub use compile::{ShaderError, DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};
pub use gpu::{
    ShaderProgram, UniformBlock, UniformField, UniformKind, UniformLocation, UniformValue,
};
pub use types::{FractalMode, RendererConfig, TextureBinding, ViewOptions};
pub use view::{DragButton, FractalUniforms, FractalView, SquareViewport};

/// Entry point that owns the configuration until the window opens.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the viewer window and blocks until it is closed.
    ///
    /// Returns an error when no window, GPU adapter or shader program can be
    /// created. Required textures that fail to load panic during start-up.
    pub fn run(self) -> Result<()> {
        window::run(self.config)
    }
}
