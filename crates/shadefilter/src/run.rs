//! Turns CLI input and the optional config file into a `RendererConfig`, then
//! either opens the viewer or runs the offline `check`.
//!
//! Precedence for every setting: command-line flag, then config file, then the
//! built-in default. Shader paths default to the bundled `assets/shaders`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::interaction::RadiusRange;
use renderer::shader::{self, UniformKind};
use renderer::texture;
use renderer::{Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;
use viewconfig::ViewConfig;

use crate::cli::{AssetArgs, RunArgs};

const BUNDLED_SHADERS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/shaders");

pub fn initialise_tracing() {
    let default_filter = "warn,shadefilter=info,renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let file = load_config(args.assets.config.as_deref())?;
    let config = renderer_config(&args, &file)?;
    tracing::info!(
        image = %config.image.display(),
        vertex = %config.vertex_shader.display(),
        fragment = %config.fragment_shader.display(),
        "starting viewer"
    );
    Renderer::new(config).run()
}

/// Validates everything the viewer would load, on the CPU only.
pub fn check(args: AssetArgs) -> Result<()> {
    let file = load_config(args.config.as_deref())?;
    let paths = resolve_assets(&args, &file)?;

    let sources = shader::load_sources(&paths.vertex_shader, &paths.fragment_shader)?;
    let program = shader::build_program(&sources)?;
    let image = texture::decode_png(&paths.image)?;
    let mip_levels = texture::mip_level_count(image.width, image.height);

    println!("Shaders:");
    println!("  vertex:    {}", paths.vertex_shader.display());
    println!("  fragment:  {}", paths.fragment_shader.display());
    let interface = program.interface();
    if let Some(block) = interface.uniform_block.as_ref() {
        println!("Uniform block ({} bytes):", block.size);
        for field in &block.fields {
            println!("  {:<10} {:>4}  {}", field.name, field.offset, kind_name(field.kind));
        }
    }
    for slot in &interface.texture_slots {
        println!("  binding {} -> {} ({:?})", slot.binding, slot.name, slot.kind);
    }
    println!("Image:");
    println!("  path:      {}", paths.image.display());
    println!("  size:      {}x{}", image.width, image.height);
    println!("  mip levels {mip_levels}");
    Ok(())
}

fn kind_name(kind: UniformKind) -> &'static str {
    match kind {
        UniformKind::Int => "int",
        UniformKind::Float => "float",
        UniformKind::Vec2 => "vec2",
        UniformKind::Vec3 => "vec3",
        UniformKind::Vec4 => "vec4",
        UniformKind::Mat3 => "mat3",
        UniformKind::Mat4 => "mat4",
        UniformKind::Other => "other",
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewConfig> {
    match path {
        Some(path) => {
            let config = ViewConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config file");
            Ok(config)
        }
        None => Ok(ViewConfig::default()),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AssetSelection {
    image: PathBuf,
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
}

fn resolve_assets(args: &AssetArgs, file: &ViewConfig) -> Result<AssetSelection> {
    let image = args
        .image
        .clone()
        .or_else(|| file.assets.image.clone())
        .context("no image given; pass IMAGE or set assets.image in the config file")?;
    let vertex_shader = args
        .vertex
        .clone()
        .or_else(|| file.assets.vertex_shader.clone())
        .unwrap_or_else(|| Path::new(BUNDLED_SHADERS).join("filter.vert"));
    let fragment_shader = args
        .fragment
        .clone()
        .or_else(|| file.assets.fragment_shader.clone())
        .unwrap_or_else(|| Path::new(BUNDLED_SHADERS).join("filter.frag"));
    Ok(AssetSelection {
        image,
        vertex_shader,
        fragment_shader,
    })
}

fn renderer_config(args: &RunArgs, file: &ViewConfig) -> Result<RendererConfig> {
    let assets = resolve_assets(&args.assets, file)?;

    let filter = &file.filter;
    let radius_range = RadiusRange::new(filter.min_radius, filter.max_radius).with_context(|| {
        format!(
            "invalid radius bounds [{}, {}]",
            filter.min_radius, filter.max_radius
        )
    })?;
    let initial_radius = args.radius.unwrap_or(filter.initial_radius);
    if radius_range.clamp(initial_radius) != initial_radius {
        anyhow::bail!(
            "radius {initial_radius} is outside [{}, {}]",
            radius_range.min(),
            radius_range.max()
        );
    }

    Ok(RendererConfig {
        image: assets.image,
        vertex_shader: assets.vertex_shader,
        fragment_shader: assets.fragment_shader,
        window_size: args
            .size
            .unwrap_or((file.window.width, file.window.height)),
        title: file.window.title.clone(),
        radius_range,
        initial_radius,
        start_filtered: args.filtered || filter.start_filtered,
    })
}
