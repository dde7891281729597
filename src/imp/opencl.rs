// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! OpenCL backend.
//!
//! Everything goes through `opencl3`, including images and `cl_khr_gl_sharing`. The
//! byte-valued info queries keep the count-then-fill shape of the portable layer: the
//! size call and the fill call each run the query, and the fill copies what the runtime
//! returned into the buffer sized by the first.

use crate::graphics::InteropHandles;
use crate::imp::{DeviceInfo, Error};
use crate::pixel_formats::ImageFormat;
use crate::sys;
use opencl3::command_queue::{CommandQueue, enqueue_write_image};
use opencl3::device::{
    CL_DEVICE_NAME, CL_DEVICE_OPENCL_C_VERSION, CL_DEVICE_TYPE_GPU, CL_DEVICE_VENDOR,
    get_device_data, get_device_ids,
};
use opencl3::error_codes::{ClError, CL_INVALID_WORK_DIMENSION};
use opencl3::event::Event;
use opencl3::kernel::{CL_KERNEL_FUNCTION_NAME, create_kernels_in_program, set_kernel_arg};
use opencl3::memory::{CL_MEM_OBJECT_IMAGE2D_ARRAY, ClMem, cl_image_desc, cl_image_format};
use opencl3::platform::platform::{CL_PLATFORM_NAME, get_platform_data, get_platform_ids};
use opencl3::program::{CL_PROGRAM_BUILD_LOG, get_program_build_data};
use opencl3::types::{
    CL_BLOCKING, CL_NON_BLOCKING, cl_context_properties, cl_device_id, cl_int, cl_kernel,
    cl_platform_id, cl_uint,
};
use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

fn cl_error(operation: &'static str) -> impl FnOnce(ClError) -> Error {
    move |e| Error::new(operation, e.0)
}

fn raw_error(operation: &'static str) -> impl FnOnce(cl_int) -> Error {
    move |code| Error::new(operation, code)
}

/// Copies a byte-valued answer into a buffer sized by an earlier run of the same query.
fn fill_from(out: &mut [u8], data: &[u8]) {
    let n = out.len().min(data.len());
    out[..n].copy_from_slice(&data[..n]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Platform(cl_platform_id);

impl Default for Platform {
    fn default() -> Self {
        Platform(ptr::null_mut())
    }
}

pub(crate) fn platform_count() -> Result<usize, Error> {
    Ok(get_platform_ids()
        .map_err(raw_error("clGetPlatformIDs"))?
        .len())
}

pub(crate) fn fill_platforms(out: &mut [Platform]) -> Result<(), Error> {
    let ids = get_platform_ids().map_err(raw_error("clGetPlatformIDs"))?;
    for (slot, id) in out.iter_mut().zip(ids) {
        *slot = Platform(id);
    }
    Ok(())
}

impl Platform {
    fn name(&self) -> Result<Vec<u8>, Error> {
        get_platform_data(self.0, CL_PLATFORM_NAME).map_err(raw_error("clGetPlatformInfo"))
    }

    pub(crate) fn name_size(&self) -> Result<usize, Error> {
        Ok(self.name()?.len())
    }

    pub(crate) fn name_fill(&self, out: &mut [u8]) -> Result<(), Error> {
        fill_from(out, &self.name()?);
        Ok(())
    }

    pub(crate) fn gpu_device_count(&self) -> Result<usize, Error> {
        Ok(get_device_ids(self.0, CL_DEVICE_TYPE_GPU)
            .map_err(raw_error("clGetDeviceIDs"))?
            .len())
    }

    pub(crate) fn fill_gpu_devices(&self, out: &mut [Device]) -> Result<(), Error> {
        let ids = get_device_ids(self.0, CL_DEVICE_TYPE_GPU).map_err(raw_error("clGetDeviceIDs"))?;
        for (slot, id) in out.iter_mut().zip(ids) {
            *slot = Device(id);
        }
        Ok(())
    }

    /// Value of `CL_CONTEXT_PLATFORM` for this platform.
    pub(crate) fn raw(&self) -> isize {
        self.0 as isize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Device(cl_device_id);

impl Default for Device {
    fn default() -> Self {
        Device(ptr::null_mut())
    }
}

impl Device {
    fn info(&self, info: DeviceInfo) -> Result<Vec<u8>, Error> {
        let param = match info {
            DeviceInfo::Name => CL_DEVICE_NAME,
            DeviceInfo::Vendor => CL_DEVICE_VENDOR,
            DeviceInfo::OpenClCVersion => CL_DEVICE_OPENCL_C_VERSION,
        };
        get_device_data(self.0, param).map_err(raw_error("clGetDeviceInfo"))
    }

    pub(crate) fn info_size(&self, info: DeviceInfo) -> Result<usize, Error> {
        Ok(self.info(info)?.len())
    }

    pub(crate) fn info_fill(&self, info: DeviceInfo, out: &mut [u8]) -> Result<(), Error> {
        fill_from(out, &self.info(info)?);
        Ok(())
    }
}

pub(crate) fn current_interop_handles() -> Option<InteropHandles> {
    sys::gl::current().map(|(gl_context, surface)| InteropHandles {
        gl_context,
        surface,
    })
}

#[derive(Clone)]
pub(crate) struct Context {
    inner: Arc<opencl3::context::Context>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("raw", &self.inner.get())
            .finish()
    }
}

impl Context {
    pub(crate) fn new(device: &Device, properties: &[isize]) -> Result<Self, Error> {
        let inner = if properties.is_empty() {
            opencl3::context::Context::from_device(&opencl3::device::Device::new(device.0))
        } else {
            let mut properties: Vec<cl_context_properties> = properties.to_vec();
            if properties.last() != Some(&0) {
                properties.push(0);
            }
            opencl3::context::Context::from_devices(
                &[device.0],
                &properties,
                None,
                ptr::null_mut(),
            )
        }
        .map_err(cl_error("clCreateContext"))?;
        Ok(Context {
            inner: Arc::new(inner),
        })
    }
}

pub(crate) struct Program {
    inner: opencl3::program::Program,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("raw", &self.inner.get())
            .finish()
    }
}

/// A kernel produced by `fill_kernels`, not yet owned by a [`Kernel`].
#[derive(Debug, Clone)]
pub(crate) struct KernelHandle(cl_kernel);

impl Default for KernelHandle {
    fn default() -> Self {
        KernelHandle(ptr::null_mut())
    }
}

impl Program {
    pub(crate) fn from_source(context: &Context, source: &str) -> Result<Self, Error> {
        let inner = opencl3::program::Program::create_from_source(&context.inner, source)
            .map_err(cl_error("clCreateProgramWithSource"))?;
        Ok(Program { inner })
    }

    pub(crate) fn build(&mut self, device: &Device, options: &str) -> Result<(), Error> {
        self.inner
            .build(&[device.0], options)
            .map_err(cl_error("clBuildProgram"))
    }

    pub(crate) fn build_status(&self, device: &Device) -> Result<i32, Error> {
        self.inner
            .get_build_status(device.0)
            .map_err(cl_error("clGetProgramBuildInfo"))
    }

    fn build_log(&self, device: &Device) -> Result<Vec<u8>, Error> {
        get_program_build_data(self.inner.get(), device.0, CL_PROGRAM_BUILD_LOG)
            .map_err(raw_error("clGetProgramBuildInfo"))
    }

    pub(crate) fn build_log_size(&self, device: &Device) -> Result<usize, Error> {
        Ok(self.build_log(device)?.len())
    }

    pub(crate) fn build_log_fill(&self, device: &Device, out: &mut [u8]) -> Result<(), Error> {
        fill_from(out, &self.build_log(device)?);
        Ok(())
    }

    pub(crate) fn kernel_count(&self) -> Result<usize, Error> {
        self.inner
            .get_num_kernels()
            .map_err(cl_error("clGetProgramInfo"))
    }

    /// Every handle written here must be adopted by a [`Kernel`] or it leaks.
    pub(crate) fn fill_kernels(&self, out: &mut [KernelHandle]) -> Result<(), Error> {
        let mut created = create_kernels_in_program(self.inner.get())
            .map_err(raw_error("clCreateKernelsInProgram"))?
            .into_iter();
        for (slot, kernel) in out.iter_mut().zip(created.by_ref()) {
            *slot = KernelHandle(kernel);
        }
        //more kernels than the count promised: release the ones with nowhere to go
        for extra in created {
            drop(opencl3::kernel::Kernel::new(extra));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Kernel {
    inner: opencl3::kernel::Kernel,
}

impl Kernel {
    pub(crate) fn adopt(handle: KernelHandle) -> Result<Self, Error> {
        if handle.0.is_null() {
            return Err(Error::new(
                "clCreateKernelsInProgram",
                opencl3::error_codes::CL_INVALID_KERNEL,
            ));
        }
        Ok(Kernel {
            inner: opencl3::kernel::Kernel::new(handle.0),
        })
    }

    fn name(&self) -> Result<Vec<u8>, Error> {
        self.inner
            .get_data(CL_KERNEL_FUNCTION_NAME)
            .map_err(cl_error("clGetKernelInfo"))
    }

    pub(crate) fn name_size(&self) -> Result<usize, Error> {
        Ok(self.name()?.len())
    }

    pub(crate) fn name_fill(&self, out: &mut [u8]) -> Result<(), Error> {
        fill_from(out, &self.name()?);
        Ok(())
    }

    pub(crate) fn num_args(&self) -> Result<u32, Error> {
        self.inner.num_args().map_err(cl_error("clGetKernelInfo"))
    }

    pub(crate) fn set_arg(&mut self, index: u32, bytes: &[u8]) -> Result<(), Error> {
        //safe: the runtime copies `bytes.len()` bytes before returning
        unsafe { set_kernel_arg(self.inner.get(), index, bytes.len(), bytes.as_ptr().cast()) }
            .map_err(raw_error("clSetKernelArg"))
    }
}

#[derive(Debug)]
pub(crate) struct Image {
    inner: opencl3::memory::Image,
}

impl Image {
    pub(crate) fn new_2d_array(
        context: &Context,
        format: ImageFormat,
        width: usize,
        height: usize,
        layers: usize,
        flags: u64,
    ) -> Result<Self, Error> {
        let cl_format = cl_image_format {
            image_channel_order: format.order.as_raw(),
            image_channel_data_type: format.data_type.as_raw(),
        };
        let desc = cl_image_desc {
            image_type: CL_MEM_OBJECT_IMAGE2D_ARRAY,
            image_width: width,
            image_height: height,
            image_depth: 1,
            image_array_size: layers,
            image_row_pitch: 0,
            image_slice_pitch: 0,
            num_mip_levels: 0,
            num_samples: 0,
            buffer: ptr::null_mut(),
        };
        //safe: format and desc outlive the call; no host pointer
        let inner = unsafe {
            opencl3::memory::Image::create(&context.inner, flags, &cl_format, &desc, ptr::null_mut())
        }
        .map_err(cl_error("clCreateImage"))?;
        Ok(Image { inner })
    }

    pub(crate) fn from_gl_texture(
        context: &Context,
        flags: u64,
        target: u32,
        mip_level: i32,
        texture: u32,
    ) -> Result<Self, Error> {
        //safe: the runtime validates the texture name against the shared GL context
        let inner = unsafe {
            opencl3::memory::Image::create_from_gl_texture(
                &context.inner,
                flags,
                target,
                mip_level,
                texture,
            )
        }
        .map_err(cl_error("clCreateFromGLTexture"))?;
        Ok(Image { inner })
    }

    pub(crate) fn arg_bytes(&self) -> Vec<u8> {
        (self.inner.get() as usize).to_ne_bytes().to_vec()
    }
}

pub(crate) struct Buffer {
    inner: opencl3::memory::Buffer<u8>,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("raw", &self.inner.get())
            .finish()
    }
}

impl Buffer {
    pub(crate) fn new(context: &Context, flags: u64, size: usize) -> Result<Self, Error> {
        //safe: no host pointer is supplied
        let inner = unsafe {
            opencl3::memory::Buffer::<u8>::create(&context.inner, flags, size, ptr::null_mut())
        }
        .map_err(cl_error("clCreateBuffer"))?;
        Ok(Buffer { inner })
    }

    pub(crate) fn arg_bytes(&self) -> Vec<u8> {
        (self.inner.get() as usize).to_ne_bytes().to_vec()
    }
}

pub(crate) struct Queue {
    inner: CommandQueue,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("raw", &self.inner.get())
            .finish()
    }
}

impl Queue {
    pub(crate) fn new(context: &Context, _device: &Device) -> Result<Self, Error> {
        let inner = CommandQueue::create_default_with_properties(&context.inner, 0, 0)
            .map_err(cl_error("clCreateCommandQueueWithProperties"))?;
        Ok(Queue { inner })
    }

    pub(crate) fn enqueue_nd_range(
        &self,
        kernel: &Kernel,
        global: &[usize],
        local: &[usize],
    ) -> Result<(), Error> {
        const OP: &str = "clEnqueueNDRangeKernel";
        if global.is_empty() || local.len() != global.len() {
            return Err(Error::new(OP, CL_INVALID_WORK_DIMENSION));
        }
        //safe: both size arrays hold work_dim entries and outlive the call
        let _event = unsafe {
            self.inner.enqueue_nd_range_kernel(
                kernel.inner.get(),
                global.len() as cl_uint,
                ptr::null(),
                global.as_ptr(),
                local.as_ptr(),
                &[],
            )
        }
        .map_err(cl_error(OP))?;
        Ok(())
    }

    pub(crate) fn finish(&self) -> Result<(), Error> {
        self.inner.finish().map_err(cl_error("clFinish"))
    }

    pub(crate) fn flush(&self) -> Result<(), Error> {
        self.inner.flush().map_err(cl_error("clFlush"))
    }

    pub(crate) fn acquire_gl(&self, image: &Image) -> Result<(), Error> {
        let objects = [image.inner.get() as *const c_void];
        //safe: one live image, no events
        let _event = unsafe { self.inner.enqueue_acquire_gl_objects(&objects, &[]) }
            .map_err(cl_error("clEnqueueAcquireGLObjects"))?;
        Ok(())
    }

    pub(crate) fn release_gl(&self, image: &Image) -> Result<(), Error> {
        let objects = [image.inner.get() as *const c_void];
        //safe: one live image, no events
        let _event = unsafe { self.inner.enqueue_release_gl_objects(&objects, &[]) }
            .map_err(cl_error("clEnqueueReleaseGLObjects"))?;
        Ok(())
    }

    /// # Safety
    ///
    /// For a non-blocking write, `data` must stay alive until the queue is finished.
    pub(crate) unsafe fn write_image(
        &self,
        image: &Image,
        origin: [usize; 3],
        region: [usize; 3],
        data: &[u8],
        blocking: bool,
    ) -> Result<(), Error> {
        let blocking = if blocking { CL_BLOCKING } else { CL_NON_BLOCKING };
        //safe: caller keeps data alive for non-blocking writes; the runtime only reads it
        let event = unsafe {
            enqueue_write_image(
                self.inner.get(),
                image.inner.get(),
                blocking,
                origin.as_ptr(),
                region.as_ptr(),
                0,
                0,
                data.as_ptr() as *mut c_void,
                0,
                ptr::null(),
            )
        }
        .map_err(raw_error("clEnqueueWriteImage"))?;
        drop(Event::new(event));
        Ok(())
    }

    pub(crate) fn read_image(
        &self,
        image: &Image,
        origin: [usize; 3],
        region: [usize; 3],
        out: &mut [u8],
    ) -> Result<(), Error> {
        //safe: blocking read into a buffer the caller sized for the region
        let _event = unsafe {
            self.inner.enqueue_read_image(
                &image.inner,
                CL_BLOCKING,
                origin.as_ptr(),
                region.as_ptr(),
                0,
                0,
                out.as_mut_ptr().cast(),
                &[],
            )
        }
        .map_err(cl_error("clEnqueueReadImage"))?;
        Ok(())
    }

    pub(crate) fn write_buffer(&self, buffer: &mut Buffer, data: &[u8]) -> Result<(), Error> {
        //safe: blocking write
        unsafe {
            self.inner
                .enqueue_write_buffer(&mut buffer.inner, CL_BLOCKING, 0, data, &[])
        }
        .map(|_| ())
        .map_err(cl_error("clEnqueueWriteBuffer"))
    }

    pub(crate) fn read_buffer(&self, buffer: &Buffer, out: &mut [u8]) -> Result<(), Error> {
        //safe: blocking read
        unsafe {
            self.inner
                .enqueue_read_buffer(&buffer.inner, CL_BLOCKING, 0, out, &[])
        }
        .map(|_| ())
        .map_err(cl_error("clEnqueueReadBuffer"))
    }
}
