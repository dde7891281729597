// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Type-safe element layouts for compute images.
//!
//! Each format is a zero-sized type that encodes:
//!
//! - bytes per pixel
//! - the C-layout pixel type you read and write from the host
//! - the OpenCL channel order and channel data type used to create the image
//!
//! # Available Formats
//!
//! ## Single Channel
//! - [`R8UNorm`] - 8-bit normalized unsigned integer
//! - [`R16Float`] - 16-bit half-precision float
//! - [`R32Float`] - 32-bit single-precision float
//! - [`R32SInt`] - 32-bit signed integer
//!
//! ## Multi-Channel
//! - [`RGBA8UNorm`] - 4-channel 8-bit normalized
//! - [`RGBA32Float`] - 4-channel 32-bit float
//!
//! ```
//! use kernels_and_images::pixel_formats::{RGBA8UNorm, Unorm4};
//!
//! let red = Unorm4 { r: 255, g: 0, b: 0, a: 255 };
//! ```

/*
Formats are types rather than an enum value so that `ImageArray<R32Float>::write_region`
can demand an `f32` and refuse a `Unorm4` at compile time.  The runtime only ever sees
the (order, type) pair.
 */
pub(crate) mod png_support;

use crate::pixel_formats::sealed::{CPixelTrait, PixelFormat};
use std::fmt::{Debug, Display};

pub use half::f16;
pub use png_support::PngPixelFormat;

/// Sealed traits for pixel format type safety.
///
/// Only the formats defined in this crate can be used to create images.
pub(crate) mod sealed {
    use std::fmt::Debug;

    /// Core trait for pixel format types.
    pub trait PixelFormat: std::fmt::Debug + Send + Sync + 'static {
        /// Number of bytes per pixel for this format.
        const BYTES_PER_PIXEL: u8;
        const CHANNEL_ORDER: super::ChannelOrder;
        const CHANNEL_TYPE: super::ChannelType;

        /// The concrete pixel type with guaranteed C-compatible memory layout.
        type CPixel: Clone + Debug + Default + Send + super::ReprC + CPixelTrait;
    }

    /// Operations supported by pixel types.
    pub trait CPixelTrait {
        /// Compute the average of an array of pixels.
        ///
        /// Used for mipmap generation.
        #[allow(dead_code)] //opencl backend does not use
        fn avg<const C: usize>(arr: &[Self; C]) -> Self
        where
            Self: Sized;
    }
}

/// Marker trait indicating C-compatible memory layout.
///
/// Types implementing this trait have predictable memory layout with:
/// - No padding between fields
/// - No uninitialized bytes
/// - Stable field ordering
///
/// Any `ReprC` value can be bound as a kernel argument by value.
///
/// # Safety
///
/// Incorrect implementation could lead to undefined behavior when the value is viewed
/// as, or overwritten from, a byte slice.
pub unsafe trait ReprC {}

/// Views a slice of C-compatible values as raw bytes.
pub(crate) fn as_bytes<T: ReprC>(t: &[T]) -> &[u8] {
    //safe because we know that T is repr(C)
    //(we offloaded the safety check to the ReprC trait)
    unsafe { std::slice::from_raw_parts(t.as_ptr() as *const u8, std::mem::size_of_val(t)) }
}

/// Views a slice of C-compatible values as mutable raw bytes.
pub(crate) fn as_bytes_mut<T: ReprC>(t: &mut [T]) -> &mut [u8] {
    //ReprC guarantees every byte pattern we copy in came from a value of the same type
    unsafe {
        std::slice::from_raw_parts_mut(t.as_mut_ptr() as *mut u8, std::mem::size_of_val(t))
    }
}

/// Reads a vector of pixels back out of raw bytes.
///
/// Trailing bytes that do not make up a whole element are ignored.
pub(crate) fn from_bytes<T: ReprC + Default + Clone>(bytes: &[u8]) -> Vec<T> {
    let n = bytes.len() / std::mem::size_of::<T>().max(1);
    let mut out = vec![T::default(); n];
    let dst = as_bytes_mut(&mut out);
    let len = dst.len();
    dst.copy_from_slice(&bytes[..len]);
    out
}

unsafe impl ReprC for i8 {}
unsafe impl ReprC for i16 {}
unsafe impl ReprC for u16 {}
unsafe impl ReprC for u32 {}
unsafe impl ReprC for i64 {}
unsafe impl ReprC for u64 {}
unsafe impl ReprC for f64 {}
unsafe impl<T: ReprC, const N: usize> ReprC for [T; N] {}

/// `cl_channel_order` values used by the formats in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelOrder {
    R = 0x10B0,
    RGBA = 0x10B5,
}

impl ChannelOrder {
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelOrder::R => write!(f, "CL_R"),
            ChannelOrder::RGBA => write!(f, "CL_RGBA"),
        }
    }
}

/// `cl_channel_type` values used by the formats in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelType {
    UnormInt8 = 0x10D2,
    SignedInt32 = 0x10D9,
    HalfFloat = 0x10DD,
    Float = 0x10DE,
}

impl ChannelType {
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::UnormInt8 => write!(f, "CL_UNORM_INT8"),
            ChannelType::SignedInt32 => write!(f, "CL_SIGNED_INT32"),
            ChannelType::HalfFloat => write!(f, "CL_HALF_FLOAT"),
            ChannelType::Float => write!(f, "CL_FLOAT"),
        }
    }
}

/// The (order, type) pair a backend needs to allocate an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageFormat {
    pub(crate) order: ChannelOrder,
    pub(crate) data_type: ChannelType,
    pub(crate) bytes_per_pixel: u8,
}

impl ImageFormat {
    pub(crate) fn of<F: PixelFormat>() -> Self {
        ImageFormat {
            order: F::CHANNEL_ORDER,
            data_type: F::CHANNEL_TYPE,
            bytes_per_pixel: F::BYTES_PER_PIXEL,
        }
    }
}

/// 8-bit normalized unsigned integer format with a single red channel.
///
/// Values are stored as 0-255 and read as 0.0-1.0 by `read_imagef`.
#[derive(Debug, Clone)]
pub struct R8UNorm;
impl PixelFormat for R8UNorm {
    const BYTES_PER_PIXEL: u8 = 1;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::R;
    const CHANNEL_TYPE: ChannelType = ChannelType::UnormInt8;
    type CPixel = u8;
}

unsafe impl ReprC for u8 {}
impl CPixelTrait for u8 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum = 0;
        for i in arr {
            sum += *i as u32;
        }
        (sum / C as u32) as u8
    }
}

/// 32-bit signed integer format with a single red channel.
///
/// Read with `read_imagei`; values are not normalized.
#[derive(Debug, Clone)]
pub struct R32SInt;
impl PixelFormat for R32SInt {
    const BYTES_PER_PIXEL: u8 = 4;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::R;
    const CHANNEL_TYPE: ChannelType = ChannelType::SignedInt32;
    type CPixel = i32;
}
unsafe impl ReprC for i32 {}
impl CPixelTrait for i32 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum: i64 = 0;
        for i in arr {
            sum += *i as i64;
        }
        (sum / C as i64) as i32
    }
}

/// 32-bit single-precision float format with a single red channel.
///
/// This is the layout of the layered-image regression scenario.
#[derive(Debug, Clone)]
pub struct R32Float;
impl PixelFormat for R32Float {
    const BYTES_PER_PIXEL: u8 = 4;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::R;
    const CHANNEL_TYPE: ChannelType = ChannelType::Float;
    type CPixel = f32;
}

impl CPixelTrait for f32 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum = 0.0;
        for i in arr {
            sum += *i;
        }
        sum / C as f32
    }
}
/// 16-bit half-precision float format with a single red channel.
#[derive(Debug, Clone)]
pub struct R16Float;
impl PixelFormat for R16Float {
    const BYTES_PER_PIXEL: u8 = 2;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::R;
    const CHANNEL_TYPE: ChannelType = ChannelType::HalfFloat;
    type CPixel = half::f16;
}

impl CPixelTrait for half::f16 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum = 0.0f32;
        for i in arr {
            sum += i.to_f32();
        }
        half::f16::from_f32(sum / C as f32)
    }
}
unsafe impl ReprC for half::f16 {}
unsafe impl ReprC for f32 {}

/// C-compatible RGBA pixel with 8-bit normalized unsigned values.
///
/// This is the pixel type for [`RGBA8UNorm`].
///
/// ```
/// use kernels_and_images::pixel_formats::{Unorm4, Float4};
///
/// let float_color = Float4 { r: 1.0, g: 0.5, b: 0.0, a: 1.0 };
/// let unorm_color = Unorm4::from_floats(float_color);
/// assert_eq!(unorm_color.g, 128);
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unorm4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
unsafe impl ReprC for Unorm4 {}
impl Unorm4 {
    /// Convert from normalized float values (0.0-1.0) to 8-bit values (0-255).
    ///
    /// Values are clamped to the valid range and rounded to nearest integer.
    pub fn from_floats(float4: Float4) -> Self {
        Unorm4 {
            r: (float4.r * 255.0).round().clamp(0.0, 255.0) as u8,
            g: (float4.g * 255.0).round().clamp(0.0, 255.0) as u8,
            b: (float4.b * 255.0).round().clamp(0.0, 255.0) as u8,
            a: (float4.a * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }
}

/// 8-bit normalized unsigned integer format with RGBA channels.
#[derive(Debug, Clone)]
pub struct RGBA8UNorm;
impl PixelFormat for RGBA8UNorm {
    const BYTES_PER_PIXEL: u8 = 4;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::RGBA;
    const CHANNEL_TYPE: ChannelType = ChannelType::UnormInt8;
    type CPixel = Unorm4;
}

impl CPixelTrait for Unorm4 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum = (0, 0, 0, 0);
        for i in arr {
            sum.0 += i.r as u32;
            sum.1 += i.g as u32;
            sum.2 += i.b as u32;
            sum.3 += i.a as u32;
        }
        let c = C as u32;
        Unorm4 {
            r: (sum.0 / c) as u8,
            g: (sum.1 / c) as u8,
            b: (sum.2 / c) as u8,
            a: (sum.3 / c) as u8,
        }
    }
}

/// Four-channel floating point color.
///
/// This is the pixel type for [`RGBA32Float`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Float4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

unsafe impl ReprC for Float4 {}

impl Float4 {
    pub const fn splat(v: f32) -> Self {
        Float4 {
            r: v,
            g: v,
            b: v,
            a: v,
        }
    }
}

/// 32-bit floating point format with RGBA channels.
///
/// This is the layout of the shared-texture regression scenario (`GL_RGBA32F`).
#[derive(Debug, Clone)]
pub struct RGBA32Float;
impl PixelFormat for RGBA32Float {
    const BYTES_PER_PIXEL: u8 = 16;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::RGBA;
    const CHANNEL_TYPE: ChannelType = ChannelType::Float;
    type CPixel = Float4;
}

impl CPixelTrait for Float4 {
    fn avg<const C: usize>(arr: &[Self; C]) -> Self {
        let mut sum = (0.0, 0.0, 0.0, 0.0);
        for i in arr {
            sum.0 += i.r;
            sum.1 += i.g;
            sum.2 += i.b;
            sum.3 += i.a;
        }
        let c = C as f32;
        Float4 {
            r: sum.0 / c,
            g: sum.1 / c,
            b: sum.2 / c,
            a: sum.3 / c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_matches_pixel_size() {
        fn check<F: PixelFormat>() {
            assert_eq!(
                F::BYTES_PER_PIXEL as usize,
                std::mem::size_of::<F::CPixel>(),
                "{:?}",
                std::any::type_name::<F>()
            );
        }
        check::<R8UNorm>();
        check::<R16Float>();
        check::<R32Float>();
        check::<R32SInt>();
        check::<RGBA8UNorm>();
        check::<RGBA32Float>();
    }

    #[test]
    fn bytes_round_trip_through_pixels() {
        let pixels = [Float4::splat(1.0), Float4::splat(0.25)];
        let bytes = as_bytes(&pixels).to_vec();
        assert_eq!(bytes.len(), 32);
        let back: Vec<Float4> = from_bytes(&bytes);
        assert_eq!(back, pixels);
    }

    #[test]
    fn avg_of_constant_is_constant() {
        assert_eq!(f32::avg(&[2.0, 2.0, 2.0, 2.0]), 2.0);
        assert_eq!(i32::avg(&[i32::MAX, i32::MAX]), i32::MAX);
        let white = Unorm4 {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        };
        assert_eq!(Unorm4::avg(&[white; 4]), white);
    }

    #[test]
    fn channel_names() {
        assert_eq!(ChannelOrder::R.to_string(), "CL_R");
        assert_eq!(ChannelType::Float.as_raw(), 0x10DE);
        assert_eq!(ImageFormat::of::<R32Float>().bytes_per_pixel, 4);
    }
}
