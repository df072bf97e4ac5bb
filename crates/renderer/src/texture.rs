//! PNG decoding into bottom-up RGBA8 buffers ready for upload.
//!
//! Every decoded image is normalised to four bytes per pixel and stored with
//! row 0 at the bottom of the picture, matching the lower-left texture origin
//! used by the quad's UVs. Upload lives in [`crate::gpu::upload_texture`].

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("unable to open texture file {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file is not a valid PNG: {}", path.display())]
    InvalidFormat { path: PathBuf },
    #[error("error while reading PNG file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },
    #[error("unsupported PNG layout in {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },
}

/// RGBA8 pixels, `width * height * 4` bytes, first row = bottom of the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Pixel at `(x, y)` with `y = 0` being the bottom row.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.row_bytes() + x as usize * BYTES_PER_PIXEL;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + BYTES_PER_PIXEL]);
        rgba
    }
}

/// Decodes a PNG file. The file and decoder are owned by this call and are
/// dropped on every exit path, including errors raised mid-stream.
pub fn decode_png(path: &Path) -> Result<DecodedImage, TextureError> {
    let file = File::open(path).map_err(|source| TextureError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut signature = [0u8; 8];
    if reader.read_exact(&mut signature).is_err() || signature != PNG_SIGNATURE {
        return Err(TextureError::InvalidFormat {
            path: path.to_path_buf(),
        });
    }

    // The decoder wants to see the signature itself, so splice it back in.
    let stream = Cursor::new(signature).chain(reader);
    decode_stream(stream).map_err(|failure| failure.with_path(path))
}

enum Failure {
    Decode(png::DecodingError),
    Unsupported(String),
}

impl Failure {
    fn with_path(self, path: &Path) -> TextureError {
        match self {
            Failure::Decode(source) => TextureError::Decode {
                path: path.to_path_buf(),
                source,
            },
            Failure::Unsupported(reason) => TextureError::Unsupported {
                path: path.to_path_buf(),
                reason,
            },
        }
    }
}

impl From<png::DecodingError> for Failure {
    fn from(error: png::DecodingError) -> Self {
        Failure::Decode(error)
    }
}

fn decode_stream<R: Read>(stream: R) -> Result<DecodedImage, Failure> {
    let mut decoder = png::Decoder::new(stream);
    // EXPAND covers palette -> RGB, 1/2/4-bit gray -> 8-bit and tRNS -> alpha.
    decoder.set_transformations(png::Transformations::STRIP_16 | png::Transformations::EXPAND);
    let mut reader = decoder.read_info()?;

    let (width, height, interlaced) = {
        let info = reader.info();
        (info.width, info.height, info.interlaced)
    };
    if width == 0 || height == 0 {
        return Err(Failure::Unsupported(format!(
            "image has zero extent ({width}x{height})"
        )));
    }

    let (color_type, bit_depth) = reader.output_color_type();
    if bit_depth != png::BitDepth::Eight {
        return Err(Failure::Unsupported(format!(
            "unexpected bit depth {bit_depth:?} after normalisation"
        )));
    }
    let channels = match color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => {
            return Err(Failure::Unsupported(
                "palette was not expanded to RGB".into(),
            ))
        }
    };

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let mut pixels = vec![0u8; row_bytes * height as usize];
    let destination = |y: u32| {
        let start = (height - 1 - y) as usize * row_bytes;
        start..start + row_bytes
    };

    if interlaced {
        // Passes arrive out of order; let the decoder assemble the frame first.
        let mut frame = vec![0u8; reader.output_buffer_size()];
        let output = reader.next_frame(&mut frame)?;
        for (y, row) in frame
            .chunks_exact(output.line_size)
            .take(height as usize)
            .enumerate()
        {
            expand_row(row, channels, &mut pixels[destination(y as u32)]);
        }
    } else {
        for y in 0..height {
            let row = reader.next_row()?.ok_or_else(|| {
                Failure::Unsupported(format!("image data ended at row {y} of {height}"))
            })?;
            expand_row(row.data(), channels, &mut pixels[destination(y)]);
        }
    }

    tracing::debug!(width, height, ?color_type, interlaced, "decoded PNG");
    Ok(DecodedImage {
        width,
        height,
        pixels,
    })
}

/// Fills a missing alpha channel with opaque and promotes gray to RGB.
fn expand_row(source: &[u8], channels: usize, target: &mut [u8]) {
    for (pixel, out) in source
        .chunks_exact(channels)
        .zip(target.chunks_exact_mut(BYTES_PER_PIXEL))
    {
        let rgba = match *pixel {
            [gray] => [gray, gray, gray, 0xFF],
            [gray, alpha] => [gray, gray, gray, alpha],
            [r, g, b] => [r, g, b, 0xFF],
            [r, g, b, a] => [r, g, b, a],
            _ => unreachable!("chunks_exact yields 1..=4 channels"),
        };
        out.copy_from_slice(&rgba);
    }
}

/// Number of levels in a full mip chain for the given extent.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Builds every mip level with a 2x2 box filter; level 0 is the image itself.
pub fn mip_chain(image: &DecodedImage) -> Vec<DecodedImage> {
    let levels = mip_level_count(image.width, image.height);
    let mut chain = Vec::with_capacity(levels as usize);
    let mut current = image.clone();
    for _ in 1..levels {
        let next = downsample(&current);
        chain.push(std::mem::replace(&mut current, next));
    }
    chain.push(current);
    chain
}

fn downsample(level: &DecodedImage) -> DecodedImage {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
    for y in 0..height {
        for x in 0..width {
            let x0 = (x * 2).min(level.width - 1);
            let x1 = (x * 2 + 1).min(level.width - 1);
            let y0 = (y * 2).min(level.height - 1);
            let y1 = (y * 2 + 1).min(level.height - 1);
            let taps = [
                level.pixel(x0, y0),
                level.pixel(x1, y0),
                level.pixel(x0, y1),
                level.pixel(x1, y1),
            ];
            for channel in 0..BYTES_PER_PIXEL {
                let sum: u32 = taps.iter().map(|tap| tap[channel] as u32).sum();
                pixels.push(((sum + 2) / 4) as u8);
            }
        }
    }
    DecodedImage {
        width,
        height,
        pixels,
    }
}
