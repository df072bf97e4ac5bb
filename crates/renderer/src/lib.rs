//! Renderer crate for the shadefilter image viewer.
//!
//! Shows one PNG in a window with an optional box blur, a toggle button, and a
//! radius slider. The overall flow is:
//!
//! ```text
//!   CLI / shadefilter
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ App ──▶ winit event loop ──▶ frame()
//!                                                    │
//!          InteractionController::update ◀───────────┤
//!          frame::plan ──▶ FilterCache::ensure_fresh ┴─▶ quad + widgets ─▶ present
//! ```
//!
//! The CPU-only modules (`shader`, `texture`, `filter`, `interaction`,
//! `widgets`, `frame`) carry all the decisions and are testable without a GPU.
//! `gpu` and the private `app`/`window` modules execute those decisions with
//! `wgpu` and `winit`.

mod app;
pub mod filter;
pub mod frame;
pub mod gpu;
pub mod interaction;
pub mod shader;
pub mod texture;
mod types;
pub mod widgets;
mod window;

use anyhow::Result;

pub use types::RendererConfig;

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window and blocks until it closes.
    ///
    /// Returns an error if any startup step fails (window, GPU device, shader
    /// build, image load, cache allocation) or the surface runs out of memory.
    pub fn run(self) -> Result<()> {
        window::run(self.config)
    }
}
