//! Offscreen blur on a real adapter, compared against the CPU reference.
//!
//! Needs a GPU (or a software adapter such as lavapipe), so it is ignored by
//! default: `cargo test -p renderer -- --ignored`.

use renderer::filter::{reference_box_blur, FilterCache, Viewport};
use renderer::gpu::{
    request_headless_device, upload_texture, BlurPass, OffscreenTarget, Quad, ShaderProgram,
    CACHE_FORMAT,
};
use renderer::shader::{build_program, StageSources};
use renderer::texture::DecodedImage;

const SIZE: u32 = 4;
const PADDED_ROW: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

fn checker_image() -> DecodedImage {
    let mut pixels = Vec::new();
    for y in 0..SIZE {
        for x in 0..SIZE {
            let v = ((x * 53 + y * 97) % 256) as u8;
            pixels.extend_from_slice(&[v, 255 - v, (x * 60) as u8, 255]);
        }
    }
    DecodedImage {
        width: SIZE,
        height: SIZE,
        pixels,
    }
}

fn read_back(device: &wgpu::Device, queue: &wgpu::Queue, target: &OffscreenTarget) -> Vec<u8> {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: (PADDED_ROW * SIZE) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(PADDED_ROW),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| {
        result.expect("readback buffer maps");
    });
    device
        .poll(wgpu::PollType::Wait)
        .expect("device poll completes");

    let mapped = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for row in mapped.chunks_exact(PADDED_ROW as usize) {
        pixels.extend_from_slice(&row[..(SIZE * 4) as usize]);
    }
    pixels
}

#[test]
#[ignore = "requires a GPU adapter"]
fn blurred_cache_matches_cpu_reference() {
    let (device, queue) = request_headless_device().expect("headless device");

    let sources = StageSources {
        vertex: include_str!("../../../assets/shaders/filter.vert").to_owned(),
        fragment: include_str!("../../../assets/shaders/filter.frag").to_owned(),
    };
    let linked = build_program(&sources).expect("bundled shaders link");
    let mut program = ShaderProgram::build(
        &device,
        &linked,
        &[Quad::vertex_layout()],
        CACHE_FORMAT,
        "blur test program",
    )
    .expect("pipeline builds");
    let quad = Quad::new(&device);

    let image = checker_image();
    let source = upload_texture(&device, &queue, &image, "checker");
    let bind_group = program
        .texture_bind_group(&device, &source.view, &source.sampler, "checker bind group")
        .expect("program samples the source");

    let target = OffscreenTarget::new(&device, SIZE, SIZE).expect("target is complete");
    let mut cache = FilterCache::new(target);
    let mut viewport = Viewport::full(640, 480);
    {
        let mut pass = BlurPass {
            device: &device,
            queue: &queue,
            program: &mut program,
            quad: &quad,
            source: &bind_group,
        };
        assert!(cache.ensure_fresh(&mut pass, 1, &mut viewport));
        assert!(!cache.ensure_fresh(&mut pass, 1, &mut viewport));
    }
    assert_eq!(viewport, Viewport::full(640, 480));

    let actual = read_back(&device, &queue, cache.target());
    let expected = reference_box_blur(&image, 1);
    for (index, (texel, want)) in actual.chunks_exact(4).zip(&expected).enumerate() {
        for channel in 0..4 {
            let got = texel[channel] as f32 / 255.0;
            assert!(
                (got - want[channel]).abs() <= 2.0 / 255.0,
                "texel {index} channel {channel}: got {got}, want {}",
                want[channel]
            );
        }
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_sized_target_is_rejected() {
    let (device, _queue) = request_headless_device().expect("headless device");
    let err = OffscreenTarget::new(&device, 0, 16)
        .err()
        .expect("zero width is incomplete");
    assert!(err.to_string().contains("incomplete"));
}
