// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Regression scenarios.

Each scenario drives the harness through one resource-sharing path and reports what it
saw. Two values are reported:

* `sampled`: what the kernel read, stored by the kernel into a result buffer
* `readback`: what the host reads back from the same resource through the queue

A runtime that never runs the kernel leaves `sampled` at its initial NaN.
*/

use crate::error::Error;
use crate::graphics::GraphicsTexture;
use crate::harness::Harness;
use crate::pixel_formats::sealed::PixelFormat;
use crate::pixel_formats::{Float4, R32Float, Unorm4};
use crate::queue::NdRange;
use crate::resources::{Buffer, ImageArray, SharedTexture};

/// Name of the kernel in both scenario sources.
pub const KERNEL_NAME: &str = "test_image";

/// Samples texel (0.5, 0.5) of a 2D image, unnormalized and nearest.
pub const SHARED_TEXTURE_SOURCE: &str = r#"
#pragma OPENCL EXTENSION cl_khr_mipmap_image : enable

__kernel void test_image(__read_only image2d_t img, __global float* out)
{
    sampler_t sam = CLK_NORMALIZED_COORDS_FALSE |
                    CLK_ADDRESS_NONE |
                    CLK_FILTER_NEAREST;

    out[0] = read_imagef(img, sam, (float2)(0.5f, 0.5f)).x;
}
"#;

/// Samples texel (0.5, 0.5) of layer 1 of an image array.
pub const IMAGE_ARRAY_SOURCE: &str = r#"
__kernel void test_image(__read_only image2d_array_t img, __global float* out)
{
    sampler_t sam = CLK_NORMALIZED_COORDS_FALSE |
                    CLK_ADDRESS_NONE |
                    CLK_FILTER_NEAREST;

    out[0] = read_imagef(img, sam, (float4)(0.5f, 0.5f, 1.f, 0.f)).x;
}
"#;

/// Size of the texture the graphics side uploads for [`shared_texture`].
pub const SHARED_TEXTURE_SIZE: u32 = 1024;
/// Width and height of the image in [`image_array`].
pub const IMAGE_ARRAY_SIZE: u32 = 128;

/// Pixel types whose first channel can be compared with what `read_imagef(..).x` returns.
pub trait FirstChannel {
    fn first_channel(&self) -> f32;
}

impl FirstChannel for f32 {
    fn first_channel(&self) -> f32 {
        *self
    }
}

impl FirstChannel for Unorm4 {
    fn first_channel(&self) -> f32 {
        self.r as f32 / 255.0
    }
}

impl FirstChannel for Float4 {
    fn first_channel(&self) -> f32 {
        self.r
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioReport {
    pub expected: f32,
    /// Written by the kernel.
    pub sampled: f32,
    /// Read back by the host.
    pub readback: f32,
}

impl ScenarioReport {
    pub fn sampled_matches(&self) -> bool {
        self.sampled == self.expected
    }

    pub fn readback_matches(&self) -> bool {
        self.readback == self.expected
    }

    /// Both the kernel and the host saw the expected value.
    pub fn passed(&self) -> bool {
        self.sampled_matches() && self.readback_matches()
    }
}

/// A one-element result buffer holding NaN until a kernel overwrites it.
fn result_buffer(harness: &Harness) -> Result<Buffer<f32>, Error> {
    let mut result = Buffer::new(harness.context(), 1)?;
    result.write(harness.queue(), &[f32::NAN])?;
    Ok(result)
}

fn sampled(harness: &Harness, result: &Buffer<f32>) -> Result<f32, Error> {
    Ok(result
        .read(harness.queue())?
        .first()
        .copied()
        .unwrap_or(f32::NAN))
}

/// Samples a texture uploaded by the graphics side.
///
/// The harness must have been created with interop. The texture is expected to be
/// uniformly white; whether it has mipmaps is up to the caller.
pub fn shared_texture<Format, T>(harness: &Harness, texture: &T) -> Result<ScenarioReport, Error>
where
    Format: PixelFormat,
    Format::CPixel: FirstChannel,
    T: GraphicsTexture + ?Sized,
{
    let queue = harness.queue();
    let mut kernel = harness.build(SHARED_TEXTURE_SOURCE)?.into_kernel(KERNEL_NAME)?;
    let shared = SharedTexture::<Format>::wrap(harness.context(), texture)?;
    let result = result_buffer(harness)?;

    shared.acquire(queue)?;
    crate::bind_args!(kernel, shared, result)?;
    queue.dispatch(&kernel, &NdRange::one(1, 1))?;
    let readback = shared.read_texel(queue, 0, 0)?.first_channel();
    shared.release(queue)?;
    queue.finish()?;

    let report = ScenarioReport {
        expected: 1.0,
        sampled: sampled(harness, &result)?,
        readback,
    };
    logwise::info_sync!(
        "shared texture: {report}",
        report = logwise::privacy::LogIt(&report)
    );
    Ok(report)
}

/// Writes layer 0 = 1.0 and layer 1 = 2.0 with two region writes, then samples layer 1.
pub fn image_array(harness: &Harness) -> Result<ScenarioReport, Error> {
    let queue = harness.queue();
    let mut kernel = harness.build(IMAGE_ARRAY_SOURCE)?.into_kernel(KERNEL_NAME)?;
    let image = ImageArray::<R32Float>::create(
        harness.context(),
        IMAGE_ARRAY_SIZE,
        IMAGE_ARRAY_SIZE,
        2,
    )?;
    image.write_region(queue, 0, 1, 1.0, true)?;
    image.write_region(queue, 1, 1, 2.0, true)?;
    let result = result_buffer(harness)?;

    crate::bind_args!(kernel, image, result)?;
    queue.dispatch(&kernel, &NdRange::one(1, 1))?;
    queue.finish()?;

    let report = ScenarioReport {
        expected: 2.0,
        sampled: sampled(harness, &result)?,
        readback: image.read_texel(queue, 0, 0, 1)?,
    };
    logwise::info_sync!(
        "image array: {report}",
        report = logwise::privacy::LogIt(&report)
    );
    Ok(report)
}

/// Per-layer contents: `Some(v)` when every texel of the layer is `v`.
pub type LayerValues = Vec<Option<f32>>;

/// Result of writing the same values two ways.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceReport {
    pub expected: Vec<f32>,
    /// After one region write per layer.
    pub split: LayerValues,
    /// After a single write covering all layers.
    pub combined: LayerValues,
}

impl EquivalenceReport {
    /// Both ways produced the expected layers.
    ///
    /// `false` means the runtime mishandles region writes, most commonly by landing a
    /// write to a later layer on layer 0.
    pub fn is_consistent(&self) -> bool {
        let expected: LayerValues = self.expected.iter().copied().map(Some).collect();
        self.split == expected && self.combined == expected
    }

    /// Layer 0 of the split write holds the value meant for the last layer instead of
    /// its own.
    ///
    /// Only detectable when those two values differ.
    pub fn first_layer_aliased(&self) -> bool {
        let (Some(first), Some(last)) = (self.expected.first(), self.expected.last()) else {
            return false;
        };
        let layer0 = self.split.first().copied().flatten();
        self.expected.len() > 1 && layer0 == Some(*last) && layer0 != Some(*first)
    }
}

fn uniform_layers(
    harness: &Harness,
    image: &ImageArray<R32Float>,
) -> Result<LayerValues, Error> {
    (0..image.layers())
        .map(|layer| {
            let texels = image.read_layer(harness.queue(), layer)?;
            let first = texels.first().copied();
            Ok(first.filter(|v| texels.iter().all(|t| t == v)))
        })
        .collect()
}

/// Writes `values` into a `width` x `height` image array layer by layer, and into a
/// second one all at once, and compares both against `values`.
pub fn region_write_equivalence(
    harness: &Harness,
    width: u32,
    height: u32,
    values: &[f32],
) -> Result<EquivalenceReport, Error> {
    let queue = harness.queue();
    let layers = values.len() as u32;

    let split = ImageArray::<R32Float>::create(harness.context(), width, height, layers)?;
    for (layer, value) in values.iter().enumerate() {
        split.write_region(queue, layer as u32, 1, *value, true)?;
    }
    let combined = ImageArray::<R32Float>::create(harness.context(), width, height, layers)?;
    combined.write_layers(queue, 0, values, true)?;
    queue.finish()?;

    let report = EquivalenceReport {
        expected: values.to_vec(),
        split: uniform_layers(harness, &split)?,
        combined: uniform_layers(harness, &combined)?,
    };
    if !report.is_consistent() {
        logwise::warn_sync!(
            "region writes disagree: {report}",
            report = logwise::privacy::LogIt(&report)
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_verdicts() {
        let r = ScenarioReport {
            expected: 2.0,
            sampled: f32::NAN,
            readback: 2.0,
        };
        assert!(r.readback_matches());
        assert!(!r.sampled_matches());
        assert!(!r.passed());
    }

    #[test]
    fn aliasing_is_recognized() {
        let r = EquivalenceReport {
            expected: vec![1.0, 2.0],
            split: vec![Some(2.0), Some(0.0)],
            combined: vec![Some(1.0), Some(2.0)],
        };
        assert!(!r.is_consistent());
        assert!(r.first_layer_aliased());
    }

    #[test]
    fn repeated_values_are_not_aliasing() {
        let r = EquivalenceReport {
            expected: vec![2.0, 2.0],
            split: vec![Some(2.0), Some(2.0)],
            combined: vec![Some(2.0), Some(2.0)],
        };
        assert!(r.is_consistent());
        assert!(!r.first_layer_aliased());

        let single = EquivalenceReport {
            expected: vec![5.0],
            split: vec![Some(5.0)],
            combined: vec![Some(5.0)],
        };
        assert!(!single.first_layer_aliased());
    }

    #[test]
    fn first_channel_of_white() {
        let white = Unorm4 {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        };
        assert_eq!(white.first_channel(), 1.0);
        assert_eq!(Float4::splat(1.0).first_channel(), 1.0);
    }
}
