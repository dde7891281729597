// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::pixel_formats::sealed::PixelFormat;
use crate::pixel_formats::{R8UNorm, RGBA8UNorm};
use png::{BitDepth, ColorType};
use std::io::Write;

/// Formats whose pixels can be written directly as PNG samples.
///
/// # Safety
///
/// The pixel bytes must match the color type and bit depth reported here.
pub unsafe trait PngPixelFormat: PixelFormat {
    fn png_color_type() -> png::ColorType;
    fn png_bit_depth() -> png::BitDepth;
}

unsafe impl PngPixelFormat for RGBA8UNorm {
    fn png_color_type() -> ColorType {
        ColorType::Rgba
    }

    fn png_bit_depth() -> BitDepth {
        BitDepth::Eight
    }
}

unsafe impl PngPixelFormat for R8UNorm {
    fn png_color_type() -> ColorType {
        ColorType::Grayscale
    }

    fn png_bit_depth() -> BitDepth {
        BitDepth::Eight
    }
}

/// Encodes one tightly packed layer as a PNG stream.
pub(crate) fn encode<F: PngPixelFormat, W: Write>(
    writer: W,
    width: u32,
    height: u32,
    bytes: &[u8],
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(F::png_color_type());
    encoder.set_depth(F::png_bit_depth());
    let mut writer = encoder.write_header()?;
    writer.write_image_data(bytes)?;
    writer.finish()
}
