use std::path::Path;

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::texture::{self, DecodedImage, TextureError};

/// Source image texture with its full mip chain and a repeating trilinear
/// sampler.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
    pub mip_levels: u32,
}

/// Decodes `path` and uploads it, checking the extent against device limits.
pub fn load_texture_2d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
) -> Result<GpuTexture, TextureError> {
    let image = texture::decode_png(path)?;
    let max_dimension = device.limits().max_texture_dimension_2d;
    if image.width > max_dimension || image.height > max_dimension {
        return Err(TextureError::Unsupported {
            path: path.to_path_buf(),
            reason: format!(
                "{}x{} exceeds the GPU texture limit of {max_dimension}",
                image.width, image.height
            ),
        });
    }
    Ok(upload_texture(device, queue, &image, &path.display().to_string()))
}

pub fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &DecodedImage,
    label: &str,
) -> GpuTexture {
    let chain = texture::mip_chain(image);
    let mip_levels = chain.len() as u32;
    let data: Vec<u8> = chain
        .iter()
        .flat_map(|level| level.pixels.iter().copied())
        .collect();

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        &data,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("source sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    tracing::debug!(
        width = image.width,
        height = image.height,
        mip_levels,
        "uploaded source texture"
    );

    GpuTexture {
        texture,
        view,
        sampler,
        size: (image.width, image.height),
        mip_levels,
    }
}
