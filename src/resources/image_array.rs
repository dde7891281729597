// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Layered 2D images, written by region.
//!
//! A region write covers whole layers: origin `(0, 0, layer_start)`, region
//! `(width, height, layer_count)`. Each call goes to the runtime exactly as issued.
//! Some drivers land a write to a later layer on layer 0; that is for the caller to
//! detect (see [`crate::scenarios::region_write_equivalence`]), not for this type to
//! paper over.

use crate::context::Context;
use crate::error::Error;
use crate::imp;
use crate::kernel::{ArgValue, KernelArg};
use crate::pixel_formats::sealed::PixelFormat;
use crate::pixel_formats::{ImageFormat, PngPixelFormat, as_bytes, from_bytes, png_support};
use crate::queue::CommandQueue;
use crate::status;
use std::fs::File;
use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct ImageArray<Format: PixelFormat> {
    imp: imp::Image,
    width: u32,
    height: u32,
    layers: u32,
    populated: AtomicBool,
    format: PhantomData<Format>,
}

impl<Format: PixelFormat> ImageArray<Format> {
    /// Creates a read-write image of `layers` layers of `width` x `height`.
    pub fn create(context: &Context, width: u32, height: u32, layers: u32) -> Result<Self, Error> {
        let imp = imp::Image::new_2d_array(
            &context.imp,
            ImageFormat::of::<Format>(),
            width as usize,
            height as usize,
            layers as usize,
            status::CL_MEM_READ_WRITE,
        )
        .map_err(|e| Error::ResourceCreation {
            resource: "image array",
            code: e.code(),
        })?;
        Ok(ImageArray {
            imp,
            width,
            height,
            layers,
            populated: AtomicBool::new(false),
            format: PhantomData,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// True once any write has succeeded.
    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::Relaxed)
    }

    fn check_layers(&self, layer_start: u32, layer_count: u32) -> Result<(), Error> {
        let end = layer_start as u64 + layer_count as u64;
        if layer_count == 0 || end > self.layers as u64 {
            return Err(Error::InvalidRegion {
                layer_start,
                layer_count,
                layers: self.layers,
            });
        }
        Ok(())
    }

    fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Texel count of a whole-layer region, checked before anything is allocated.
    fn region_len(&self, layer_start: u32, layer_count: u32) -> Result<usize, Error> {
        self.check_layers(layer_start, layer_count)?;
        self.layer_len()
            .checked_mul(layer_count as usize)
            .ok_or(Error::InvalidRegion {
                layer_start,
                layer_count,
                layers: self.layers,
            })
    }

    fn write(
        &self,
        queue: &CommandQueue,
        layer_start: u32,
        layer_count: u32,
        pixels: Vec<Format::CPixel>,
        blocking: bool,
    ) -> Result<(), Error> {
        self.check_layers(layer_start, layer_count)?;
        let origin = [0, 0, layer_start as usize];
        let region = [
            self.width as usize,
            self.height as usize,
            layer_count as usize,
        ];
        queue.write_image(
            &self.imp,
            origin,
            region,
            as_bytes(&pixels).to_vec(),
            blocking,
        )?;
        self.populated.store(true, Ordering::Relaxed);
        logwise::trace_sync!(
            "wrote layers {start}..{end} (blocking: {blocking})",
            start = layer_start,
            end = layer_start + layer_count,
            blocking = logwise::privacy::LogIt(&blocking)
        );
        Ok(())
    }

    /// Fills layers `layer_start..layer_start + layer_count` with `value` in one write.
    pub fn write_region(
        &self,
        queue: &CommandQueue,
        layer_start: u32,
        layer_count: u32,
        value: Format::CPixel,
        blocking: bool,
    ) -> Result<(), Error> {
        let pixels = vec![value; self.region_len(layer_start, layer_count)?];
        self.write(queue, layer_start, layer_count, pixels, blocking)
    }

    /// Fills consecutive layers from `layer_start`, layer `layer_start + i` with
    /// `values[i]`, in one write.
    pub fn write_layers(
        &self,
        queue: &CommandQueue,
        layer_start: u32,
        values: &[Format::CPixel],
        blocking: bool,
    ) -> Result<(), Error> {
        let layer_count = u32::try_from(values.len()).map_err(|_| Error::InvalidRegion {
            layer_start,
            layer_count: u32::MAX,
            layers: self.layers,
        })?;
        let layer_len = self.layer_len();
        let mut pixels = Vec::with_capacity(self.region_len(layer_start, layer_count)?);
        for value in values {
            pixels.extend(std::iter::repeat_n(value.clone(), layer_len));
        }
        self.write(queue, layer_start, layer_count, pixels, blocking)
    }

    /// Reads one layer back, row-major. Blocks.
    pub fn read_layer(&self, queue: &CommandQueue, layer: u32) -> Result<Vec<Format::CPixel>, Error> {
        self.check_layers(layer, 1)?;
        let mut bytes = vec![0u8; self.layer_len() * Format::BYTES_PER_PIXEL as usize];
        queue.imp.read_image(
            &self.imp,
            [0, 0, layer as usize],
            [self.width as usize, self.height as usize, 1],
            &mut bytes,
        )?;
        Ok(from_bytes(&bytes))
    }

    /// Reads one texel back. Blocks.
    pub fn read_texel(
        &self,
        queue: &CommandQueue,
        x: u32,
        y: u32,
        layer: u32,
    ) -> Result<Format::CPixel, Error> {
        self.check_layers(layer, 1)?;
        let mut bytes = vec![0u8; Format::BYTES_PER_PIXEL as usize];
        queue.imp.read_image(
            &self.imp,
            [x as usize, y as usize, layer as usize],
            [1, 1, 1],
            &mut bytes,
        )?;
        Ok(from_bytes::<Format::CPixel>(&bytes)
            .pop()
            .unwrap_or_default())
    }
}

impl<Format: PngPixelFormat> ImageArray<Format> {
    /// Writes one layer to `path` as a PNG.
    pub fn write_layer_png(
        &self,
        queue: &CommandQueue,
        layer: u32,
        path: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let pixels = self.read_layer(queue, layer)?;
        let dump = |source| Error::Dump {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(|e| dump(png::EncodingError::from(e)))?;
        png_support::encode::<Format, _>(
            BufWriter::new(file),
            self.width,
            self.height,
            as_bytes(&pixels),
        )
        .map_err(dump)?;
        logwise::info_sync!(
            "dumped layer {layer} to {path}",
            layer = layer,
            path = logwise::privacy::LogIt(&path.display().to_string())
        );
        Ok(())
    }
}

impl<Format: PixelFormat> KernelArg for ImageArray<Format> {
    fn arg_value(&self) -> ArgValue {
        ArgValue::from_bytes(self.imp.arg_bytes())
    }
}
