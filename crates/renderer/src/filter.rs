//! Memoised offscreen filter pass.
//!
//! A [`FilterCache`] owns one target sized to the source image and a validity
//! flag. Rendering into the target goes through the [`FilterPass`] seam so the
//! invalidation rules can be exercised without a GPU; the wgpu implementation
//! lives in [`crate::gpu::BlurPass`].

use thiserror::Error;

use crate::texture::DecodedImage;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("offscreen filter target is incomplete: {reason}")]
    IncompleteTarget { reason: String },
}

/// Pixel rectangle that draws are mapped into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Anything with fixed pixel dimensions that a filter pass can draw into.
pub trait CacheSurface {
    fn dimensions(&self) -> (u32, u32);
}

/// One render of the blur shader into a cache surface.
pub trait FilterPass<T: CacheSurface> {
    fn render(&mut self, target: &T, viewport: Viewport, radius: i32);
}

/// Hook the interaction layer uses to mark the cached image stale.
pub trait CacheInvalidation {
    fn invalidate(&mut self);
}

pub struct FilterCache<T> {
    target: T,
    valid: bool,
    renders: u64,
}

impl<T: CacheSurface> FilterCache<T> {
    /// Wraps a target that was allocated once at the source dimensions.
    pub fn new(target: T) -> Self {
        Self {
            target,
            valid: false,
            renders: 0,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of offscreen renders performed so far.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Re-renders the target if it is stale. The caller's viewport is swapped
    /// for the target's extent during the pass and restored afterwards.
    /// Returns whether any rendering happened.
    pub fn ensure_fresh<P>(&mut self, pass: &mut P, radius: i32, viewport: &mut Viewport) -> bool
    where
        P: FilterPass<T>,
    {
        if self.valid {
            return false;
        }

        let (width, height) = self.target.dimensions();
        let previous = std::mem::replace(viewport, Viewport::full(width, height));
        pass.render(&self.target, *viewport, radius);
        *viewport = previous;

        self.valid = true;
        self.renders += 1;
        tracing::debug!(radius, renders = self.renders, "refreshed filter cache");
        true
    }
}

impl<T> CacheInvalidation for FilterCache<T> {
    fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// sRGB-encoded byte to linear intensity.
pub fn srgb_to_linear(value: u8) -> f32 {
    let c = value as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// CPU model of the blur shader: unweighted mean over the `(2r+1)^2`
/// neighbourhood with repeat wrapping, computed on linear RGB and returned as
/// linear RGBA floats in the same bottom-up row order as the input.
pub fn reference_box_blur(image: &DecodedImage, radius: i32) -> Vec<[f32; 4]> {
    let width = image.width as i32;
    let height = image.height as i32;
    let radius = radius.max(0);
    let taps = ((2 * radius + 1) * (2 * radius + 1)) as f32;

    let linear: Vec<[f32; 4]> = image
        .pixels
        .chunks_exact(4)
        .map(|p| {
            [
                srgb_to_linear(p[0]),
                srgb_to_linear(p[1]),
                srgb_to_linear(p[2]),
                p[3] as f32 / 255.0,
            ]
        })
        .collect();

    let mut output = Vec::with_capacity(linear.len());
    for y in 0..height {
        for x in 0..width {
            let mut sum = [0.0f32; 4];
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let sx = (x + dx).rem_euclid(width);
                    let sy = (y + dy).rem_euclid(height);
                    let texel = linear[(sy * width + sx) as usize];
                    for (acc, value) in sum.iter_mut().zip(texel) {
                        *acc += value;
                    }
                }
            }
            output.push(sum.map(|value| value / taps));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTarget;

    impl CacheSurface for FakeTarget {
        fn dimensions(&self) -> (u32, u32) {
            (64, 32)
        }
    }

    #[derive(Default)]
    struct CountingPass {
        calls: Vec<(i32, Viewport)>,
    }

    impl FilterPass<FakeTarget> for CountingPass {
        fn render(&mut self, _target: &FakeTarget, viewport: Viewport, radius: i32) {
            self.calls.push((radius, viewport));
        }
    }

    #[test]
    fn second_refresh_at_same_radius_is_a_no_op() {
        let mut cache = FilterCache::new(FakeTarget);
        let mut pass = CountingPass::default();
        let mut viewport = Viewport::full(800, 600);

        assert!(cache.ensure_fresh(&mut pass, 2, &mut viewport));
        assert!(!cache.ensure_fresh(&mut pass, 2, &mut viewport));
        assert_eq!(pass.calls.len(), 1);
        assert_eq!(cache.render_count(), 1);

        cache.invalidate();
        assert!(cache.ensure_fresh(&mut pass, 3, &mut viewport));
        assert_eq!(pass.calls.len(), 2);
        assert_eq!(pass.calls[1].0, 3);
    }

    #[test]
    fn viewport_is_swapped_for_the_pass_then_restored() {
        let mut cache = FilterCache::new(FakeTarget);
        let mut pass = CountingPass::default();
        let mut viewport = Viewport::full(800, 600);

        cache.ensure_fresh(&mut pass, 1, &mut viewport);
        assert_eq!(pass.calls[0].1, Viewport::full(64, 32));
        assert_eq!(viewport, Viewport::full(800, 600));
    }

    #[test]
    fn new_cache_starts_stale() {
        let cache = FilterCache::new(FakeTarget);
        assert!(!cache.is_valid());
    }

    fn test_image() -> DecodedImage {
        let mut pixels = Vec::new();
        for index in 0..16u8 {
            let v = index * 15;
            pixels.extend_from_slice(&[v, 255 - v, v / 2, 255]);
        }
        DecodedImage {
            width: 4,
            height: 4,
            pixels,
        }
    }

    #[test]
    fn interior_pixel_is_mean_of_three_by_three() {
        let image = test_image();
        let blurred = reference_box_blur(&image, 1);

        let (x, y) = (1usize, 2usize);
        let mut expected = [0.0f32; 3];
        for sy in y - 1..=y + 1 {
            for sx in x - 1..=x + 1 {
                let p = image.pixel(sx as u32, sy as u32);
                for channel in 0..3 {
                    expected[channel] += srgb_to_linear(p[channel]) / 9.0;
                }
            }
        }
        let actual = blurred[y * 4 + x];
        for channel in 0..3 {
            assert!((actual[channel] - expected[channel]).abs() < 1e-5);
        }
        assert!((actual[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn border_pixels_wrap_around() {
        let image = test_image();
        let blurred = reference_box_blur(&image, 1);

        let mut expected = 0.0f32;
        for sy in [3u32, 0, 1] {
            for sx in [3u32, 0, 1] {
                expected += srgb_to_linear(image.pixel(sx, sy)[0]) / 9.0;
            }
        }
        assert!((blurred[0][0] - expected).abs() < 1e-5);
    }

    #[test]
    fn radius_zero_is_identity_in_linear_space() {
        let image = test_image();
        let blurred = reference_box_blur(&image, 0);
        for (texel, pixel) in blurred.iter().zip(image.pixels.chunks_exact(4)) {
            assert!((texel[1] - srgb_to_linear(pixel[1])).abs() < 1e-6);
        }
    }
}
