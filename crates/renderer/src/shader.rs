//! CPU half of the shader loader: reads GLSL stage sources, compiles each
//! stage through naga, and links the pair by checking the stage interface.
//!
//! Linking produces a [`LinkedProgram`] that carries everything the GPU half
//! ([`crate::gpu::ShaderProgram`]) needs: the validated sources, the reflected
//! uniform block, and the texture/sampler slots declared by the stages.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use wgpu::naga;

/// Bind group reserved for the uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Bind group reserved for textures and samplers.
pub const TEXTURE_GROUP: u32 = 1;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to open shader file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader error: {log}")]
    Compile { stage: Stage, log: String },
    #[error("program link error: {log}")]
    Link { log: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Raw text of both stages, read in full from disk.
#[derive(Clone, Debug)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

pub fn load_sources(vertex_path: &Path, fragment_path: &Path) -> Result<StageSources, ShaderError> {
    Ok(StageSources {
        vertex: read_source(vertex_path)?,
        fragment: read_source(fragment_path)?,
    })
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One stage that parsed and validated on its own.
#[derive(Debug)]
pub struct CompiledStage {
    stage: Stage,
    source: String,
    module: naga::Module,
}

impl CompiledStage {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

/// Parses and validates a single stage. The diagnostic is rendered against
/// the source so line numbers point at the user's file.
pub fn compile_stage(stage: Stage, source: &str) -> Result<CompiledStage, ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| ShaderError::Compile {
            stage,
            log: errors.emit_to_string(source),
        })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| ShaderError::Compile {
        stage,
        log: error.emit_to_string(source),
    })?;

    tracing::debug!(%stage, "compiled shader stage");
    Ok(CompiledStage {
        stage,
        source: source.to_owned(),
        module,
    })
}

/// Compiles both stages then links them. The fragment stage is never
/// compiled if the vertex stage fails, and linking is never attempted unless
/// both stages compiled.
pub fn build_program(sources: &StageSources) -> Result<LinkedProgram, ShaderError> {
    let vertex = compile_stage(Stage::Vertex, &sources.vertex)?;
    let fragment = compile_stage(Stage::Fragment, &sources.fragment)?;
    link(vertex, fragment)
}

/// Result of a successful link. The per-stage naga modules are consumed here;
/// only the sources and the reflected interface survive.
#[derive(Clone, Debug)]
pub struct LinkedProgram {
    pub(crate) vertex_source: String,
    pub(crate) fragment_source: String,
    pub(crate) interface: ProgramInterface,
}

impl LinkedProgram {
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramInterface {
    pub uniform_block: Option<UniformBlock>,
    pub texture_slots: Vec<TextureSlot>,
}

/// Reflected std140 uniform block.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlock {
    pub binding: u32,
    pub size: u32,
    pub fields: Vec<UniformField>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Other,
}

/// Where a uniform lives inside the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

impl UniformBlock {
    /// Linear scan by name; nothing is cached between lookups.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| UniformLocation {
                offset: field.offset,
                kind: field.kind,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlotKind {
    Texture,
    Sampler,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub kind: TextureSlotKind,
}

pub fn link(vertex: CompiledStage, fragment: CompiledStage) -> Result<LinkedProgram, ShaderError> {
    if vertex.stage != Stage::Vertex || fragment.stage != Stage::Fragment {
        return Err(link_error(format!(
            "expected a vertex and a fragment stage, got {} and {}",
            vertex.stage, fragment.stage
        )));
    }

    let vertex_entry = entry_point(&vertex)?;
    let fragment_entry = entry_point(&fragment)?;

    let outputs = vertex_outputs(&vertex.module, vertex_entry);
    for (location, inner) in fragment_inputs(&fragment.module, fragment_entry) {
        match outputs.iter().find(|(candidate, _)| *candidate == location) {
            None => {
                return Err(link_error(format!(
                    "fragment input at location {location} is not written by the vertex stage"
                )))
            }
            Some((_, produced)) if *produced != inner => {
                return Err(link_error(format!(
                    "type mismatch at location {location}: vertex writes {produced:?}, fragment reads {inner:?}"
                )))
            }
            Some(_) => {}
        }
    }

    let vertex_reflection = reflect_resources(&vertex.module)?;
    let fragment_reflection = reflect_resources(&fragment.module)?;

    let uniform_block = match (vertex_reflection.uniform_block, fragment_reflection.uniform_block)
    {
        (Some(a), Some(b)) if a != b => {
            return Err(link_error(
                "uniform block layout differs between the vertex and fragment stages".into(),
            ))
        }
        (Some(block), _) | (None, Some(block)) => Some(block),
        (None, None) => None,
    };

    let mut texture_slots = vertex_reflection.texture_slots;
    for slot in fragment_reflection.texture_slots {
        match texture_slots
            .iter()
            .find(|existing| existing.binding == slot.binding)
        {
            Some(existing) if existing.kind != slot.kind => {
                return Err(link_error(format!(
                    "binding {} is declared as both {:?} and {:?}",
                    slot.binding, existing.kind, slot.kind
                )))
            }
            Some(_) => {}
            None => texture_slots.push(slot),
        }
    }
    texture_slots.sort_by_key(|slot| slot.binding);

    tracing::debug!(
        uniforms = uniform_block.as_ref().map_or(0, |block| block.fields.len()),
        textures = texture_slots.len(),
        "linked shader program"
    );

    Ok(LinkedProgram {
        vertex_source: vertex.source,
        fragment_source: fragment.source,
        interface: ProgramInterface {
            uniform_block,
            texture_slots,
        },
    })
}

fn link_error(log: String) -> ShaderError {
    ShaderError::Link { log }
}

fn entry_point(stage: &CompiledStage) -> Result<&naga::EntryPoint, ShaderError> {
    let wanted = stage.stage.to_naga();
    stage
        .module
        .entry_points
        .iter()
        .find(|entry| entry.stage == wanted && entry.name == "main")
        .ok_or_else(|| link_error(format!("{} stage has no `main` entry point", stage.stage)))
}

fn vertex_outputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<(u32, naga::TypeInner)> {
    let Some(result) = entry.function.result.as_ref() else {
        return Vec::new();
    };
    if let Some(naga::Binding::Location { location, .. }) = result.binding {
        return vec![(location, module.types[result.ty].inner.clone())];
    }
    match &module.types[result.ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| match member.binding {
                Some(naga::Binding::Location { location, .. }) => {
                    Some((location, module.types[member.ty].inner.clone()))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn fragment_inputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<(u32, naga::TypeInner)> {
    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), inner) => {
                inputs.push((*location, inner.clone()));
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = member.binding {
                        inputs.push((location, module.types[member.ty].inner.clone()));
                    }
                }
            }
            _ => {}
        }
    }
    inputs
}

#[derive(Default)]
struct StageResources {
    uniform_block: Option<UniformBlock>,
    texture_slots: Vec<TextureSlot>,
}

fn reflect_resources(module: &naga::Module) -> Result<StageResources, ShaderError> {
    let mut resources = StageResources::default();
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = global.binding.as_ref() else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;

        match (global.space, inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                if binding.group != UNIFORM_GROUP {
                    return Err(link_error(format!(
                        "uniform block `{name}` must live in group {UNIFORM_GROUP}, found group {}",
                        binding.group
                    )));
                }
                if resources.uniform_block.is_some() {
                    return Err(link_error(
                        "only one uniform block per stage is supported".into(),
                    ));
                }
                resources.uniform_block = Some(reflect_block(module, binding.binding, members, *span));
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                resources
                    .texture_slots
                    .push(texture_slot(name, binding, TextureSlotKind::Texture)?);
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                resources
                    .texture_slots
                    .push(texture_slot(name, binding, TextureSlotKind::Sampler)?);
            }
            _ => {
                return Err(link_error(format!(
                    "unsupported resource `{name}` at group {} binding {}",
                    binding.group, binding.binding
                )))
            }
        }
    }
    Ok(resources)
}

fn texture_slot(
    name: String,
    binding: &naga::ResourceBinding,
    kind: TextureSlotKind,
) -> Result<TextureSlot, ShaderError> {
    if binding.group != TEXTURE_GROUP {
        return Err(link_error(format!(
            "texture resource `{name}` must live in group {TEXTURE_GROUP}, found group {}",
            binding.group
        )));
    }
    Ok(TextureSlot {
        name,
        binding: binding.binding,
        kind,
    })
}

fn reflect_block(
    module: &naga::Module,
    binding: u32,
    members: &[naga::StructMember],
    span: u32,
) -> UniformBlock {
    let fields: Vec<UniformField> = members
        .iter()
        .map(|member| UniformField {
            name: member.name.clone().unwrap_or_default(),
            offset: member.offset,
            kind: uniform_kind(&module.types[member.ty].inner),
        })
        .collect();
    UniformBlock {
        binding,
        size: span.max(16).next_multiple_of(16),
        fields,
    }
}

fn uniform_kind(inner: &naga::TypeInner) -> UniformKind {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match *inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Float => UniformKind::Float,
            _ => UniformKind::Other,
        },
        TypeInner::Vector { size, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            match size {
                VectorSize::Bi => UniformKind::Vec2,
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
            }
        }
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar,
        } if scalar.width == 4 => UniformKind::Mat3,
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.width == 4 => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}
