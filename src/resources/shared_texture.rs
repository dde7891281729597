// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Textures shared with the graphics API.

use crate::context::Context;
use crate::error::{Error, Violation};
use crate::graphics::GraphicsTexture;
use crate::imp;
use crate::kernel::{ArgValue, KernelArg};
use crate::pixel_formats::from_bytes;
use crate::pixel_formats::sealed::PixelFormat;
use crate::queue::CommandQueue;
use crate::resources::ownership::{Access, Ownership};
use crate::status;
use std::marker::PhantomData;

const RESOURCE: &str = "shared texture";

/// One mip level of a graphics texture, seen from compute.
///
/// Starts [`Access::Unshared`]. Compute use (dispatch or readback) requires
/// [`SharedTexture::acquire`] first and [`SharedTexture::release`] after.
#[derive(Debug)]
pub struct SharedTexture<Format: PixelFormat> {
    imp: imp::Image,
    ownership: Ownership,
    width: u32,
    height: u32,
    level: u32,
    format: PhantomData<Format>,
}

impl<Format: PixelFormat> SharedTexture<Format> {
    /// Wraps mip level 0 of `texture`.
    pub fn wrap<T: GraphicsTexture + ?Sized>(context: &Context, texture: &T) -> Result<Self, Error> {
        Self::wrap_level(context, texture, 0)
    }

    /// Wraps one mip level of `texture`.
    ///
    /// `context` must have been created with graphics interop.
    pub fn wrap_level<T: GraphicsTexture + ?Sized>(
        context: &Context,
        texture: &T,
        level: u32,
    ) -> Result<Self, Error> {
        let creation = |code| Error::ResourceCreation {
            resource: RESOURCE,
            code,
        };
        if !context.is_interop() {
            return Err(creation(status::CL_INVALID_CONTEXT));
        }
        let imp = imp::Image::from_gl_texture(
            &context.imp,
            status::CL_MEM_READ_WRITE,
            texture.target().gl_enum(),
            level as i32,
            texture.name(),
        )
        .map_err(|e| creation(e.code()))?;
        logwise::trace_sync!(
            "wrapped texture {name} level {level}",
            name = texture.name(),
            level = level
        );
        Ok(SharedTexture {
            imp,
            ownership: Ownership::new(),
            width: (texture.width() >> level).max(1),
            height: (texture.height() >> level).max(1),
            level,
            format: PhantomData,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn state(&self) -> Access {
        self.ownership.access()
    }

    fn violation(violation: Violation) -> Error {
        Error::ProtocolViolation {
            resource: RESOURCE,
            violation,
        }
    }

    /// Takes ownership from the graphics API.
    ///
    /// The graphics side must have finished its work on the texture.
    pub fn acquire(&self, queue: &CommandQueue) -> Result<(), Error> {
        self.ownership
            .acquire(|| queue.imp.acquire_gl(&self.imp))
            .map_err(Self::violation)??;
        logwise::trace_sync!("acquired shared texture");
        Ok(())
    }

    /// Returns ownership to the graphics API.
    pub fn release(&self, queue: &CommandQueue) -> Result<(), Error> {
        self.ownership
            .release(|| queue.imp.release_gl(&self.imp))
            .map_err(Self::violation)??;
        logwise::trace_sync!("released shared texture");
        Ok(())
    }

    fn read_region(
        &self,
        queue: &CommandQueue,
        origin: [usize; 3],
        region: [usize; 3],
    ) -> Result<Vec<Format::CPixel>, Error> {
        if !self.ownership.is_acquired() {
            return Err(Self::violation(Violation::ReadWhileUnshared));
        }
        let mut bytes = vec![0u8; region.iter().product::<usize>() * Format::BYTES_PER_PIXEL as usize];
        queue.imp.read_image(&self.imp, origin, region, &mut bytes)?;
        Ok(from_bytes(&bytes))
    }

    /// Reads one texel through compute. Requires [`Access::Acquired`].
    pub fn read_texel(&self, queue: &CommandQueue, x: u32, y: u32) -> Result<Format::CPixel, Error> {
        let mut texels = self.read_region(queue, [x as usize, y as usize, 0], [1, 1, 1])?;
        Ok(texels.pop().unwrap_or_default())
    }

    /// Reads the whole level through compute, row-major. Requires [`Access::Acquired`].
    pub fn read_all(&self, queue: &CommandQueue) -> Result<Vec<Format::CPixel>, Error> {
        self.read_region(
            queue,
            [0, 0, 0],
            [self.width as usize, self.height as usize, 1],
        )
    }
}

impl<Format: PixelFormat> KernelArg for SharedTexture<Format> {
    fn arg_value(&self) -> ArgValue {
        ArgValue::shared(self.imp.arg_bytes(), self.ownership.clone())
    }
}

impl<Format: PixelFormat> Drop for SharedTexture<Format> {
    fn drop(&mut self) {
        if self.ownership.access() == Access::Acquired {
            logwise::warn_sync!(
                "shared texture level {level} dropped while acquired by compute",
                level = self.level
            );
        }
    }
}
