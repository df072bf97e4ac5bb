use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::filter::{FilterCache, Viewport};
use crate::frame::{self, DrawCommand, FramePlan, ImageSource};
use crate::gpu::{
    self, BlurPass, GpuContext, GpuTexture, OffscreenTarget, Quad, ShaderProgram, CACHE_FORMAT,
    MODE_FLAT, MODE_PASS_THROUGH,
};
use crate::interaction::{FrameInput, FrameOutcome, InteractionController};
use crate::shader;
use crate::types::RendererConfig;
use crate::widgets::{self, FULLSCREEN_NDC};

/// All GPU state for the viewer window.
///
/// Two pipelines are built from the same linked program: one targeting the
/// swapchain format and one targeting the cache format.
pub(crate) struct App {
    context: GpuContext,
    program: ShaderProgram,
    blur_program: ShaderProgram,
    quad: Quad,
    _source: GpuTexture,
    source_bind_group: wgpu::BindGroup,
    blur_source_bind_group: wgpu::BindGroup,
    cache: FilterCache<OffscreenTarget>,
    cache_bind_group: wgpu::BindGroup,
    controller: InteractionController,
    viewport: Viewport,
}

impl App {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let context = GpuContext::new(window)?;
        let device = &context.device;

        let sources = shader::load_sources(&config.vertex_shader, &config.fragment_shader)?;
        let linked = shader::build_program(&sources)?;
        let vertex_layouts = [Quad::vertex_layout()];
        let program = ShaderProgram::build(
            device,
            &linked,
            &vertex_layouts,
            context.surface_format,
            "filter program",
        )?;
        let blur_program =
            ShaderProgram::build(device, &linked, &vertex_layouts, CACHE_FORMAT, "blur program")?;
        let quad = Quad::new(device);

        let source = gpu::load_texture_2d(device, &context.queue, &config.image)?;
        let (width, height) = source.size;
        tracing::info!(
            image = %config.image.display(),
            width,
            height,
            mip_levels = source.mip_levels,
            "loaded source image"
        );

        let target = OffscreenTarget::new(device, width, height)?;

        let source_bind_group = program
            .texture_bind_group(device, &source.view, &source.sampler, "source bind group")
            .context("filter program samples no textures")?;
        let blur_source_bind_group = blur_program
            .texture_bind_group(device, &source.view, &source.sampler, "blur source bind group")
            .context("filter program samples no textures")?;
        let cache_bind_group = program
            .texture_bind_group(device, &target.view, &target.sampler, "cache bind group")
            .context("filter program samples no textures")?;

        let controller = InteractionController::new(
            config.radius_range,
            config.initial_radius,
            config.start_filtered,
        );
        let viewport = Viewport::full(context.size.width, context.size.height);

        Ok(Self {
            context,
            program,
            blur_program,
            quad,
            _source: source,
            source_bind_group,
            blur_source_bind_group,
            cache: FilterCache::new(target),
            cache_bind_group,
            controller,
            viewport,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Reconfigures the swapchain and viewport. The cache target keeps the
    /// source image's size.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
        self.viewport = Viewport::full(self.context.size.width, self.context.size.height);
    }

    /// Runs interaction for this frame, then plans and renders it.
    pub(crate) fn frame(&mut self, input: &FrameInput) -> Result<FrameOutcome, wgpu::SurfaceError> {
        let outcome = self.controller.update(input, &mut self.cache);
        let framebuffer = (self.context.size.width, self.context.size.height);
        let layout = widgets::layout(framebuffer);
        let plan = frame::plan(
            self.controller.state(),
            &layout,
            self.controller.range(),
            framebuffer,
        );
        self.render(&plan)?;
        Ok(outcome)
    }

    fn render(&mut self, plan: &FramePlan) -> Result<(), wgpu::SurfaceError> {
        // Cache refreshes are submitted before the frame that samples them.
        for command in plan.iter() {
            if let DrawCommand::RefreshCache { radius } = *command {
                let mut pass = BlurPass {
                    device: &self.context.device,
                    queue: &self.context.queue,
                    program: &mut self.blur_program,
                    quad: &self.quad,
                    source: &self.blur_source_bind_group,
                };
                self.cache.ensure_fresh(&mut pass, radius, &mut self.viewport);
            }
        }

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        let mut pending_clear = None;
        for command in plan.iter() {
            match *command {
                DrawCommand::Clear { color } => {
                    pending_clear = Some(wgpu::Color {
                        r: color[0],
                        g: color[1],
                        b: color[2],
                        a: color[3],
                    });
                }
                DrawCommand::RefreshCache { .. } | DrawCommand::Present => {}
                DrawCommand::Quad { source } => {
                    self.program.set_vec4("uRect", FULLSCREEN_NDC);
                    self.program.set_int("uMode", MODE_PASS_THROUGH);
                    let textures = match source {
                        ImageSource::Original => &self.source_bind_group,
                        ImageSource::Filtered => &self.cache_bind_group,
                    };
                    self.encode_draw(&mut encoder, &view, pending_clear.take(), Some(textures));
                }
                DrawCommand::Rect(widget) => {
                    self.program
                        .set_vec4("uRect", widget.rect.to_ndc(plan.framebuffer));
                    self.program.set_vec4("uColor", widget.color);
                    self.program.set_int("uMode", MODE_FLAT);
                    self.encode_draw(
                        &mut encoder,
                        &view,
                        pending_clear.take(),
                        Some(&self.source_bind_group),
                    );
                }
            }
        }
        if let Some(color) = pending_clear {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// One pass per draw so each sees its own staged uniforms. The first pass
    /// of the frame carries the clear.
    fn encode_draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        clear: Option<wgpu::Color>,
        textures: Option<&wgpu::BindGroup>,
    ) {
        self.program.encode_uniforms(&self.context.device, encoder);
        let load = clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        gpu::set_viewport(&mut pass, self.viewport);
        self.program.bind(&mut pass, textures);
        self.quad.draw(&mut pass);
    }
}
