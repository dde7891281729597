// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A small typed device buffer.

use crate::context::Context;
use crate::error::Error;
use crate::imp;
use crate::kernel::{ArgValue, KernelArg};
use crate::pixel_formats::{ReprC, as_bytes, as_bytes_mut};
use crate::queue::CommandQueue;
use crate::status;
use std::marker::PhantomData;

/// A device buffer of `len` elements of `T`, readable and writable by kernels.
#[derive(Debug)]
pub struct Buffer<T> {
    imp: imp::Buffer,
    len: usize,
    element: PhantomData<T>,
}

impl<T: ReprC + Default + Clone> Buffer<T> {
    pub fn new(context: &Context, len: usize) -> Result<Self, Error> {
        let imp = imp::Buffer::new(
            &context.imp,
            status::CL_MEM_READ_WRITE,
            len * std::mem::size_of::<T>(),
        )
        .map_err(|e| Error::ResourceCreation {
            resource: "buffer",
            code: e.code(),
        })?;
        Ok(Buffer {
            imp,
            len,
            element: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Blocking write from the start of the buffer.
    pub fn write(&mut self, queue: &CommandQueue, data: &[T]) -> Result<(), Error> {
        Ok(queue.imp.write_buffer(&mut self.imp, as_bytes(data))?)
    }

    /// Blocking read of the whole buffer.
    pub fn read(&self, queue: &CommandQueue) -> Result<Vec<T>, Error> {
        let mut out = vec![T::default(); self.len];
        queue.imp.read_buffer(&self.imp, as_bytes_mut(&mut out))?;
        Ok(out)
    }
}

impl<T> KernelArg for Buffer<T> {
    fn arg_value(&self) -> ArgValue {
        ArgValue::from_bytes(self.imp.arg_bytes())
    }
}
