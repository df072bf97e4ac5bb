use std::borrow::Cow;
use std::num::NonZeroU64;
use std::path::Path;

use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::shader::{
    self, LinkedProgram, ShaderError, TextureSlot, TextureSlotKind, UniformLocation, TEXTURE_GROUP,
    UNIFORM_GROUP,
};

use super::uniforms::UniformStaging;

/// A linked program turned into a render pipeline for one colour format.
///
/// Uniform values are staged on the CPU and copied into the GPU block by
/// [`ShaderProgram::encode_uniforms`] right before each pass, so every pass in
/// an encoder sees the values that were current when it was recorded.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformStaging,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: Option<wgpu::BindGroupLayout>,
    texture_slots: Vec<TextureSlot>,
}

impl ShaderProgram {
    /// Reads, compiles, and links both stages, then builds the pipeline.
    pub fn load_from_files(
        device: &wgpu::Device,
        vertex_path: &Path,
        fragment_path: &Path,
        vertex_buffers: &[wgpu::VertexBufferLayout<'_>],
        color_format: wgpu::TextureFormat,
        label: &str,
    ) -> Result<Self, ShaderError> {
        let sources = shader::load_sources(vertex_path, fragment_path)?;
        let linked = shader::build_program(&sources)?;
        Self::build(device, &linked, vertex_buffers, color_format, label)
    }

    pub fn build(
        device: &wgpu::Device,
        program: &LinkedProgram,
        vertex_buffers: &[wgpu::VertexBufferLayout<'_>],
        color_format: wgpu::TextureFormat,
        label: &str,
    ) -> Result<Self, ShaderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex")),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(program.vertex_source.as_str()),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment")),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(program.fragment_source.as_str()),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
        });

        let interface = program.interface();
        let block = interface.uniform_block.clone();

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = block
            .iter()
            .map(|block| wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(block.size as u64),
                },
                count: None,
            })
            .collect();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} uniform layout")),
            entries: &uniform_entries,
        });

        let texture_layout = if interface.texture_slots.is_empty() {
            None
        } else {
            Some(
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} texture layout")),
                    entries: &texture_layout_entries(&interface.texture_slots),
                }),
            )
        };

        // Group order matches UNIFORM_GROUP then TEXTURE_GROUP.
        let mut bind_group_layouts = vec![&uniform_layout];
        if let Some(layout) = texture_layout.as_ref() {
            bind_group_layouts.push(layout);
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = block.as_ref().map(|block| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} uniforms")),
                size: block.size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let uniform_entries: Vec<wgpu::BindGroupEntry<'_>> = block
            .iter()
            .zip(uniform_buffer.iter())
            .map(|(block, buffer)| wgpu::BindGroupEntry {
                binding: block.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} uniform bind group")),
            layout: &uniform_layout,
            entries: &uniform_entries,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link {
                log: error.to_string(),
            });
        }

        tracing::debug!(
            label,
            ?color_format,
            uniform_bytes = block.as_ref().map_or(0, |block| block.size),
            texture_slots = interface.texture_slots.len(),
            "built shader pipeline"
        );

        Ok(Self {
            pipeline,
            uniforms: UniformStaging::new(block),
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            texture_slots: interface.texture_slots.clone(),
        })
    }

    /// Looks the name up in the reflected block. Not cached.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.uniform_location(name)
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.uniforms.set_int(name, value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.uniforms.set_float(name, value);
    }

    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        self.uniforms.set_vec3(name, value);
    }

    pub fn set_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.uniforms.set_vec4(name, value);
    }

    pub fn set_mat3(&mut self, name: &str, columns: &[[f32; 3]; 3]) {
        self.uniforms.set_mat3(name, columns);
    }

    pub fn set_mat4(&mut self, name: &str, columns: &[[f32; 4]; 4]) {
        self.uniforms.set_mat4(name, columns);
    }

    /// Records a copy of the staged uniform values into the GPU block.
    pub fn encode_uniforms(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let Some(buffer) = self.uniform_buffer.as_ref() else {
            return;
        };
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform staging"),
            contents: self.uniforms.bytes(),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(&staging, 0, buffer, 0, self.uniforms.bytes().len() as u64);
    }

    /// Makes this program current for the pass.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, textures: Option<&wgpu::BindGroup>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(UNIFORM_GROUP, &self.uniform_bind_group, &[]);
        if let Some(textures) = textures {
            pass.set_bind_group(TEXTURE_GROUP, textures, &[]);
        }
    }

    /// Binds `view` to every texture slot and `sampler` to every sampler slot.
    /// Returns `None` when the program samples nothing.
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> Option<wgpu::BindGroup> {
        let layout = self.texture_layout.as_ref()?;
        let entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .texture_slots
            .iter()
            .map(|slot| wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: match slot.kind {
                    TextureSlotKind::Texture => wgpu::BindingResource::TextureView(view),
                    TextureSlotKind::Sampler => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }
}

fn texture_layout_entries(slots: &[TextureSlot]) -> Vec<wgpu::BindGroupLayoutEntry> {
    slots
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: match slot.kind {
                TextureSlotKind::Texture => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                TextureSlotKind::Sampler => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                }
            },
            count: None,
        })
        .collect()
}
