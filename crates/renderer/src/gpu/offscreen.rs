use crate::filter::{CacheSurface, FilterError, FilterPass, Viewport};
use crate::widgets::FULLSCREEN_NDC;

use super::program::ShaderProgram;
use super::quad::Quad;

/// Colour format of the filter cache. Blurred values are stored linear.
pub const CACHE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// `uMode` values understood by the filter fragment shader.
pub const MODE_PASS_THROUGH: i32 = 0;
pub const MODE_BLUR: i32 = 1;
pub const MODE_FLAT: i32 = 2;

/// Colour texture the filter cache renders into. Allocated once at the source
/// image's size.
pub struct OffscreenTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, FilterError> {
        let features = CACHE_FORMAT.guaranteed_format_features(device.features());
        let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if !features.allowed_usages.contains(required) {
            return Err(incomplete(format!(
                "{CACHE_FORMAT:?} cannot be both rendered to and sampled"
            )));
        }

        let max_dimension = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 {
            return Err(incomplete(format!("zero-sized target {width}x{height}")));
        }
        if width > max_dimension || height > max_dimension {
            return Err(incomplete(format!(
                "{width}x{height} exceeds the GPU texture limit of {max_dimension}"
            )));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filter cache"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CACHE_FORMAT,
            usage: required | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(incomplete(error.to_string()));
        }

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter cache sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        tracing::debug!(width, height, format = ?CACHE_FORMAT, "allocated filter cache target");

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
        })
    }
}

impl CacheSurface for OffscreenTarget {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn incomplete(reason: String) -> FilterError {
    FilterError::IncompleteTarget { reason }
}

/// Draws the source texture through the blur program into the cache target.
/// Each render is recorded and submitted on its own, ahead of the frame that
/// samples the result.
pub struct BlurPass<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub program: &'a mut ShaderProgram,
    pub quad: &'a Quad,
    pub source: &'a wgpu::BindGroup,
}

impl FilterPass<OffscreenTarget> for BlurPass<'_> {
    fn render(&mut self, target: &OffscreenTarget, viewport: Viewport, radius: i32) {
        self.program.set_vec4("uRect", FULLSCREEN_NDC);
        self.program.set_int("uMode", MODE_BLUR);
        self.program.set_int("uRadius", radius);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter cache encoder"),
            });
        self.program.encode_uniforms(self.device, &mut encoder);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("filter cache pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            set_viewport(&mut pass, viewport);
            self.program.bind(&mut pass, Some(self.source));
            self.quad.draw(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

pub(crate) fn set_viewport(pass: &mut wgpu::RenderPass<'_>, viewport: Viewport) {
    pass.set_viewport(
        viewport.x as f32,
        viewport.y as f32,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
}
