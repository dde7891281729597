// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Host-side storage behind software images, buffers and textures.

use crate::status;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for a memory object. This is what a kernel argument slot holds.
pub(crate) fn next_object_id() -> u64 {
    NEXT_OBJECT.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A tightly packed stack of 2D layers.
#[derive(Debug)]
pub(crate) struct Surface {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) layers: usize,
    pub(crate) bytes_per_pixel: usize,
    data: Vec<u8>,
}

pub(crate) type SharedSurface = Arc<Mutex<Surface>>;

impl Surface {
    pub(crate) fn new(width: usize, height: usize, layers: usize, bytes_per_pixel: usize) -> Self {
        Surface {
            width,
            height,
            layers,
            bytes_per_pixel,
            data: vec![0; width * height * layers * bytes_per_pixel],
        }
    }

    pub(crate) fn shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }

    /// Byte length of a region, or `CL_INVALID_VALUE` if it does not fit.
    fn region_len(&self, origin: [usize; 3], region: [usize; 3]) -> Result<usize, i32> {
        let extent = [self.width, self.height, self.layers];
        for axis in 0..3 {
            if region[axis] == 0 || origin[axis] + region[axis] > extent[axis] {
                return Err(status::CL_INVALID_VALUE);
            }
        }
        Ok(region[0] * region[1] * region[2] * self.bytes_per_pixel)
    }

    /// Visits each row of a region as (surface byte offset, region byte offset, row bytes).
    fn rows(&self, origin: [usize; 3], region: [usize; 3]) -> impl Iterator<Item = (usize, usize, usize)> {
        let bpp = self.bytes_per_pixel;
        let row_pitch = self.width * bpp;
        let slice_pitch = row_pitch * self.height;
        let row_bytes = region[0] * bpp;
        (0..region[2]).flat_map(move |z| {
            (0..region[1]).map(move |y| {
                let src = (origin[2] + z) * slice_pitch + (origin[1] + y) * row_pitch + origin[0] * bpp;
                let dst = (z * region[1] + y) * row_bytes;
                (src, dst, row_bytes)
            })
        })
    }

    pub(crate) fn write(&mut self, origin: [usize; 3], region: [usize; 3], data: &[u8]) -> Result<(), i32> {
        if self.region_len(origin, region)? != data.len() {
            return Err(status::CL_INVALID_VALUE);
        }
        let rows: Vec<_> = self.rows(origin, region).collect();
        for (surface, packed, len) in rows {
            self.data[surface..surface + len].copy_from_slice(&data[packed..packed + len]);
        }
        Ok(())
    }

    pub(crate) fn read(&self, origin: [usize; 3], region: [usize; 3], out: &mut [u8]) -> Result<(), i32> {
        if self.region_len(origin, region)? != out.len() {
            return Err(status::CL_INVALID_VALUE);
        }
        for (surface, packed, len) in self.rows(origin, region) {
            out[packed..packed + len].copy_from_slice(&self.data[surface..surface + len]);
        }
        Ok(())
    }

    /// Whole-surface bytes, for mip generation.
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }
}
