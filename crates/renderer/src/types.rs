use std::path::PathBuf;

use crate::interaction::RadiusRange;

/// `RendererConfig` carries everything the viewer needs to open its window:
/// asset locations, the initial window size, and the blur radius bounds.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// PNG shown in the window and fed to the blur.
    pub image: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    pub title: String,
    pub radius_range: RadiusRange,
    /// Clamped into `radius_range` when the controller is created.
    pub initial_radius: i32,
    pub start_filtered: bool,
}

impl Default for RendererConfig {
    /// 1280x720 window titled "Image Filter", unfiltered, radius 1 of `[1, 5]`.
    fn default() -> Self {
        Self {
            image: PathBuf::new(),
            vertex_shader: PathBuf::new(),
            fragment_shader: PathBuf::new(),
            window_size: (1280, 720),
            title: "Image Filter".to_owned(),
            radius_range: RadiusRange::DEFAULT,
            initial_radius: 1,
            start_filtered: false,
        }
    }
}
