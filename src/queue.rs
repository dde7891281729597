// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The command queue and kernel launches.

use crate::context::Context;
use crate::entry_point::Device;
use crate::error::Error;
use crate::imp;
use crate::kernel::Kernel;
use std::sync::{Mutex, PoisonError};

/// Global and local work sizes of a launch, in 1 to 3 dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    dims: usize,
    global: [usize; 3],
    local: [usize; 3],
}

impl NdRange {
    pub const fn one(global: usize, local: usize) -> Self {
        NdRange {
            dims: 1,
            global: [global, 1, 1],
            local: [local, 1, 1],
        }
    }

    pub const fn two(global: [usize; 2], local: [usize; 2]) -> Self {
        NdRange {
            dims: 2,
            global: [global[0], global[1], 1],
            local: [local[0], local[1], 1],
        }
    }

    pub const fn three(global: [usize; 3], local: [usize; 3]) -> Self {
        NdRange {
            dims: 3,
            global,
            local,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn global(&self) -> &[usize] {
        &self.global[..self.dims]
    }

    pub fn local(&self) -> &[usize] {
        &self.local[..self.dims]
    }
}

///An in-order command queue.
#[derive(Debug)]
pub struct CommandQueue {
    pub(crate) imp: imp::Queue,
    /// Host copies of non-blocking writes, kept until [`CommandQueue::finish`].
    staging: Mutex<Vec<Vec<u8>>>,
}

impl CommandQueue {
    pub fn new(context: &Context, device: &Device) -> Result<Self, Error> {
        Ok(CommandQueue {
            imp: imp::Queue::new(&context.imp, &device.0)?,
            staging: Mutex::new(Vec::new()),
        })
    }

    /// Launches `kernel` over `range` with zero offsets.
    ///
    /// Every slot must be bound and every bound graphics-shared resource acquired;
    /// both are checked before the runtime sees the launch.
    pub fn dispatch(&self, kernel: &Kernel, range: &NdRange) -> Result<(), Error> {
        kernel.check_ready()?;
        self.imp
            .enqueue_nd_range(&kernel.imp, range.global(), range.local())
            .map_err(|e| Error::Dispatch {
                kernel: kernel.name().to_string(),
                code: e.code(),
            })?;
        logwise::trace_sync!(
            "dispatched {kernel} ({dims}D)",
            kernel = logwise::privacy::LogIt(kernel.name()),
            dims = range.dims()
        );
        Ok(())
    }

    /// Submits queued work without waiting.
    pub fn flush(&self) -> Result<(), Error> {
        Ok(self.imp.flush()?)
    }

    /// Blocks until all queued work completes, then drops staged host data.
    pub fn finish(&self) -> Result<(), Error> {
        self.imp.finish()?;
        self.staging
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Number of non-blocking writes whose host data is still retained.
    pub fn staged_writes(&self) -> usize {
        self.staging
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Writes `data` into a region of `image`.
    ///
    /// A non-blocking write keeps `data` alive in the queue until `finish`.
    pub(crate) fn write_image(
        &self,
        image: &imp::Image,
        origin: [usize; 3],
        region: [usize; 3],
        data: Vec<u8>,
        blocking: bool,
    ) -> Result<(), imp::Error> {
        if blocking {
            //safe: a blocking write is complete when it returns
            return unsafe { self.imp.write_image(image, origin, region, &data, true) };
        }
        let mut staging = self.staging.lock().unwrap_or_else(PoisonError::into_inner);
        staging.push(data);
        let staged = staging.last().map(Vec::as_slice).unwrap_or_default();
        //safe: the heap block stays put in `staging` until finish() clears it
        unsafe { self.imp.write_image(image, origin, region, staged, false) }
    }
}

impl Drop for CommandQueue {
    /// Waits for staged writes before their host data is freed.
    ///
    /// If that wait fails the staged buffers are leaked, since the runtime may still be
    /// reading them.
    fn drop(&mut self) {
        let staging = self
            .staging
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if staging.is_empty() {
            return;
        }
        if let Err(e) = self.imp.finish() {
            logwise::warn_sync!(
                "queue dropped with {count} staged write(s) and finish failed: {error}",
                count = staging.len(),
                error = logwise::privacy::LogIt(&e)
            );
            std::mem::forget(std::mem::take(staging));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
    use crate::{Harness, HarnessConfig, ImageArray, pixel_formats::R32Float};

    #[test]
    fn ranges_expose_only_used_dimensions() {
        let r = NdRange::two([8, 4], [2, 2]);
        assert_eq!(r.dims(), 2);
        assert_eq!(r.global(), &[8, 4]);
        assert_eq!(r.local(), &[2, 2]);
        assert_eq!(NdRange::one(1, 1).global(), &[1]);
        assert_eq!(NdRange::three([1, 2, 3], [1, 1, 1]).local().len(), 3);
    }

    #[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
    #[test]
    fn dropping_with_staged_writes_waits_for_them() {
        crate::imp::software::driver::install(Default::default());
        let harness = Harness::new(HarnessConfig::default()).unwrap();
        let image = ImageArray::<R32Float>::create(harness.context(), 2, 2, 1).unwrap();
        let queue = CommandQueue::new(harness.context(), harness.device()).unwrap();
        image.write_region(&queue, 0, 1, 3.0, false).unwrap();
        assert_eq!(queue.staged_writes(), 1);

        let before = harness.context().imp.finishes();
        drop(queue);
        assert_eq!(harness.context().imp.finishes(), before + 1);
        assert_eq!(image.read_texel(harness.queue(), 1, 1, 0).unwrap(), 3.0);
    }

    #[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
    #[test]
    fn dropping_an_idle_queue_does_not_wait() {
        crate::imp::software::driver::install(Default::default());
        let harness = Harness::new(HarnessConfig::default()).unwrap();
        let queue = CommandQueue::new(harness.context(), harness.device()).unwrap();
        let before = harness.context().imp.finishes();
        drop(queue);
        assert_eq!(harness.context().imp.finishes(), before);
    }
}
