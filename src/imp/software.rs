// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! In-process software driver.
//!
//! Mirrors the OpenCL backend's API and status codes without a GPU. It keeps real
//! memory for images and buffers, shares storage with [`gl::SoftwareGl`] textures, runs
//! the compiler front end in [`compiler`], and validates launches. It does not execute
//! kernel code: a dispatch is validated, logged and counted.

pub(crate) mod compiler;
pub(crate) mod driver;
pub(crate) mod gl;
pub(crate) mod memory;

use crate::graphics::{InteropHandles, SurfaceHandle};
use crate::imp::{DeviceInfo, Error};
use crate::pixel_formats::ImageFormat;
use crate::status::*;
use compiler::{BuildFailure, KernelDecl, ParamKind};
use driver::{DeviceConfig, DeviceKind, PlatformConfig, Quirks};
use memory::{SharedSurface, Surface, lock, next_object_id};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const MAX_IMAGE2D_DIMENSION: usize = 16384;
const MAX_IMAGE_ARRAY_LAYERS: usize = 2048;
/// Size of a memory object handle in an argument slot.
const HANDLE_SIZE: usize = 8;

fn fill_c_string(operation: &'static str, s: &str, out: &mut [u8]) -> Result<(), Error> {
    if out.len() < s.len() + 1 {
        return Err(Error::new(operation, CL_INVALID_VALUE));
    }
    out[..s.len()].copy_from_slice(s.as_bytes());
    out[s.len()..].fill(0);
    Ok(())
}

fn check_flags(operation: &'static str, flags: u64) -> Result<(), Error> {
    match flags {
        CL_MEM_READ_WRITE | CL_MEM_WRITE_ONLY | CL_MEM_READ_ONLY => Ok(()),
        _ => Err(Error::new(operation, CL_INVALID_VALUE)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Platform {
    index: usize,
}

pub(crate) fn platform_count() -> Result<usize, Error> {
    match driver::current().platforms.len() {
        0 => Err(Error::new("clGetPlatformIDs", CL_PLATFORM_NOT_FOUND_KHR)),
        n => Ok(n),
    }
}

pub(crate) fn fill_platforms(out: &mut [Platform]) -> Result<(), Error> {
    if out.len() > driver::current().platforms.len() {
        return Err(Error::new("clGetPlatformIDs", CL_INVALID_VALUE));
    }
    for (index, p) in out.iter_mut().enumerate() {
        *p = Platform { index };
    }
    Ok(())
}

impl Platform {
    fn config(&self) -> Result<PlatformConfig, Error> {
        driver::current()
            .platforms
            .get(self.index)
            .cloned()
            .ok_or(Error::new("clGetPlatformInfo", CL_INVALID_PLATFORM))
    }

    fn gpu_indices(&self) -> Result<Vec<usize>, Error> {
        Ok(self
            .config()?
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind == DeviceKind::Gpu)
            .map(|(i, _)| i)
            .collect())
    }

    pub(crate) fn name_size(&self) -> Result<usize, Error> {
        Ok(self.config()?.name.len() + 1)
    }

    pub(crate) fn name_fill(&self, out: &mut [u8]) -> Result<(), Error> {
        fill_c_string("clGetPlatformInfo", &self.config()?.name, out)
    }

    pub(crate) fn gpu_device_count(&self) -> Result<usize, Error> {
        match self.gpu_indices()?.len() {
            0 => Err(Error::new("clGetDeviceIDs", CL_DEVICE_NOT_FOUND)),
            n => Ok(n),
        }
    }

    pub(crate) fn fill_gpu_devices(&self, out: &mut [Device]) -> Result<(), Error> {
        let indices = self.gpu_indices()?;
        if out.len() > indices.len() {
            return Err(Error::new("clGetDeviceIDs", CL_INVALID_VALUE));
        }
        for (slot, index) in out.iter_mut().zip(indices) {
            *slot = Device {
                platform: self.index,
                index,
            };
        }
        Ok(())
    }

    /// Value of `CL_CONTEXT_PLATFORM` for this platform.
    pub(crate) fn raw(&self) -> isize {
        self.index as isize + 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Device {
    platform: usize,
    index: usize,
}

impl Device {
    fn config(&self) -> Result<DeviceConfig, Error> {
        driver::current()
            .platforms
            .get(self.platform)
            .and_then(|p| p.devices.get(self.index))
            .cloned()
            .ok_or(Error::new("clGetDeviceInfo", CL_INVALID_DEVICE))
    }

    fn info(&self, info: DeviceInfo) -> Result<String, Error> {
        let config = self.config()?;
        Ok(match info {
            DeviceInfo::Name => config.name,
            DeviceInfo::Vendor => config.vendor,
            DeviceInfo::OpenClCVersion => config.version_string(),
        })
    }

    pub(crate) fn info_size(&self, info: DeviceInfo) -> Result<usize, Error> {
        Ok(self.info(info)?.len() + 1)
    }

    pub(crate) fn info_fill(&self, info: DeviceInfo, out: &mut [u8]) -> Result<(), Error> {
        fill_c_string("clGetDeviceInfo", &self.info(info)?, out)
    }
}

pub(crate) fn current_interop_handles() -> Option<InteropHandles> {
    gl::current().map(|gl_context| InteropHandles {
        gl_context,
        surface: SurfaceHandle::Headless,
    })
}

#[derive(Debug)]
struct ContextInner {
    id: u64,
    device: DeviceConfig,
    quirks: Quirks,
    gl: Option<Arc<gl::GlShare>>,
    /// Completed `finish` calls across every queue of this context.
    finishes: AtomicU64,
}

#[derive(Debug, Clone)]
pub(crate) struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new(device: &Device, properties: &[isize]) -> Result<Self, Error> {
        const OP: &str = "clCreateContext";
        let config = device.config()?;
        let mut gl = None;
        for pair in properties.chunks(2) {
            let &[key, value] = pair else {
                return Err(Error::new(OP, CL_INVALID_PROPERTY));
            };
            match key {
                0 => break,
                CL_CONTEXT_PLATFORM => {
                    if value != device.platform as isize + 1 {
                        return Err(Error::new(OP, CL_INVALID_PLATFORM));
                    }
                }
                CL_GL_CONTEXT_KHR => {
                    gl = Some(
                        gl::share(value as usize)
                            .ok_or(Error::new(OP, CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR))?,
                    );
                }
                CL_WGL_HDC_KHR | CL_GLX_DISPLAY_KHR | CL_EGL_DISPLAY_KHR | CL_CGL_SHAREGROUP_KHR
                | CL_CGL_SHAREGROUP_APPLE => {}
                _ => return Err(Error::new(OP, CL_INVALID_PROPERTY)),
            }
        }
        Ok(Context {
            inner: Arc::new(ContextInner {
                id: next_object_id(),
                device: config,
                quirks: driver::current().quirks,
                gl,
                finishes: AtomicU64::new(0),
            }),
        })
    }

    #[cfg(test)]
    pub(crate) fn finishes(&self) -> u64 {
        self.inner.finishes.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
enum BuildState {
    None,
    Failed { status: i32, log: String },
    Built { kernels: Vec<Arc<KernelDecl>> },
}

#[derive(Debug)]
pub(crate) struct Program {
    context: Context,
    source: String,
    state: BuildState,
}

/// A kernel produced by `fill_kernels`, not yet owned by a [`Kernel`].
#[derive(Debug, Clone, Default)]
pub(crate) struct KernelHandle(Option<Arc<KernelDecl>>);

impl Program {
    pub(crate) fn from_source(context: &Context, source: &str) -> Result<Self, Error> {
        if source.is_empty() {
            return Err(Error::new("clCreateProgramWithSource", CL_INVALID_VALUE));
        }
        Ok(Program {
            context: context.clone(),
            source: source.to_string(),
            state: BuildState::None,
        })
    }

    pub(crate) fn build(&mut self, _device: &Device, options: &str) -> Result<(), Error> {
        const OP: &str = "clBuildProgram";
        let inner = &self.context.inner;
        match compiler::compile(&self.source, options, inner.device.opencl_c_version) {
            Ok(kernels) => {
                self.state = BuildState::Built {
                    kernels: kernels.into_iter().map(Arc::new).collect(),
                };
                Ok(())
            }
            Err(BuildFailure::InvalidOptions(log)) => {
                self.state = BuildState::Failed {
                    status: CL_BUILD_NONE,
                    log,
                };
                Err(Error::new(OP, CL_INVALID_BUILD_OPTIONS))
            }
            Err(BuildFailure::Diagnostics(log)) => {
                let status = if inner.quirks.failed_build_reports_none {
                    CL_BUILD_NONE
                } else {
                    CL_BUILD_ERROR
                };
                self.state = BuildState::Failed { status, log };
                Err(Error::new(OP, CL_BUILD_PROGRAM_FAILURE))
            }
        }
    }

    pub(crate) fn build_status(&self, _device: &Device) -> Result<i32, Error> {
        Ok(match &self.state {
            BuildState::None => CL_BUILD_NONE,
            BuildState::Failed { status, .. } => *status,
            BuildState::Built { .. } => CL_BUILD_SUCCESS,
        })
    }

    fn log(&self) -> &str {
        match &self.state {
            BuildState::Failed { log, .. } => log,
            _ => "",
        }
    }

    pub(crate) fn build_log_size(&self, _device: &Device) -> Result<usize, Error> {
        Ok(self.log().len() + 1)
    }

    pub(crate) fn build_log_fill(&self, _device: &Device, out: &mut [u8]) -> Result<(), Error> {
        fill_c_string("clGetProgramBuildInfo", self.log(), out)
    }

    fn kernels(&self) -> Result<&[Arc<KernelDecl>], Error> {
        match &self.state {
            BuildState::Built { kernels } => Ok(kernels),
            _ => Err(Error::new(
                "clCreateKernelsInProgram",
                CL_INVALID_PROGRAM_EXECUTABLE,
            )),
        }
    }

    pub(crate) fn kernel_count(&self) -> Result<usize, Error> {
        Ok(self.kernels()?.len())
    }

    pub(crate) fn fill_kernels(&self, out: &mut [KernelHandle]) -> Result<(), Error> {
        let kernels = self.kernels()?;
        if out.len() < kernels.len() {
            return Err(Error::new("clCreateKernelsInProgram", CL_INVALID_VALUE));
        }
        for (slot, decl) in out.iter_mut().zip(kernels) {
            *slot = KernelHandle(Some(decl.clone()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Kernel {
    decl: Arc<KernelDecl>,
    args: Vec<Option<Vec<u8>>>,
}

impl Kernel {
    pub(crate) fn adopt(handle: KernelHandle) -> Result<Self, Error> {
        let decl = handle
            .0
            .ok_or(Error::new("clCreateKernelsInProgram", CL_INVALID_KERNEL))?;
        Ok(Kernel {
            args: vec![None; decl.params.len()],
            decl,
        })
    }

    /// Drivers commonly report the name size rounded up to a word; so does this one.
    pub(crate) fn name_size(&self) -> Result<usize, Error> {
        Ok((self.decl.name.len() + 1).div_ceil(8) * 8)
    }

    pub(crate) fn name_fill(&self, out: &mut [u8]) -> Result<(), Error> {
        fill_c_string("clGetKernelInfo", &self.decl.name, out)
    }

    pub(crate) fn num_args(&self) -> Result<u32, Error> {
        Ok(self.decl.params.len() as u32)
    }

    pub(crate) fn set_arg(&mut self, index: u32, bytes: &[u8]) -> Result<(), Error> {
        const OP: &str = "clSetKernelArg";
        let param = self
            .decl
            .params
            .get(index as usize)
            .ok_or(Error::new(OP, CL_INVALID_ARG_INDEX))?;
        let size_ok = match *param {
            ParamKind::Memory => bytes.len() == HANDLE_SIZE,
            ParamKind::Scalar(size) => bytes.len() == size,
            ParamKind::Any => !bytes.is_empty(),
        };
        if !size_ok {
            return Err(Error::new(OP, CL_INVALID_ARG_SIZE));
        }
        self.args[index as usize] = Some(bytes.to_vec());
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Image {
    id: u64,
    context_id: u64,
    surface: SharedSurface,
    gl_shared: bool,
    acquired: AtomicBool,
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
        const OP: &str = "clCreateImage";
        check_flags(OP, flags)?;
        let dims_ok = (1..=MAX_IMAGE2D_DIMENSION).contains(&width)
            && (1..=MAX_IMAGE2D_DIMENSION).contains(&height)
            && (1..=MAX_IMAGE_ARRAY_LAYERS).contains(&layers);
        if !dims_ok {
            return Err(Error::new(OP, CL_INVALID_IMAGE_SIZE));
        }
        Ok(Image {
            id: next_object_id(),
            context_id: context.inner.id,
            surface: Surface::new(width, height, layers, format.bytes_per_pixel as usize).shared(),
            gl_shared: false,
            acquired: AtomicBool::new(false),
        })
    }

    pub(crate) fn from_gl_texture(
        context: &Context,
        flags: u64,
        target: u32,
        mip_level: i32,
        texture: u32,
    ) -> Result<Self, Error> {
        const OP: &str = "clCreateFromGLTexture";
        check_flags(OP, flags)?;
        let share = context
            .inner
            .gl
            .as_ref()
            .ok_or(Error::new(OP, CL_INVALID_CONTEXT))?;
        let surface = share
            .level(texture, target, mip_level)
            .map_err(|code| Error::new(OP, code))?;
        Ok(Image {
            id: next_object_id(),
            context_id: context.inner.id,
            surface,
            gl_shared: true,
            acquired: AtomicBool::new(false),
        })
    }

    pub(crate) fn arg_bytes(&self) -> Vec<u8> {
        self.id.to_ne_bytes().to_vec()
    }
}

#[derive(Debug)]
pub(crate) struct Buffer {
    id: u64,
    context_id: u64,
    data: Mutex<Vec<u8>>,
}

impl Buffer {
    pub(crate) fn new(context: &Context, flags: u64, size: usize) -> Result<Self, Error> {
        check_flags("clCreateBuffer", flags)?;
        if size == 0 {
            return Err(Error::new("clCreateBuffer", CL_INVALID_BUFFER_SIZE));
        }
        Ok(Buffer {
            id: next_object_id(),
            context_id: context.inner.id,
            data: Mutex::new(vec![0; size]),
        })
    }

    pub(crate) fn arg_bytes(&self) -> Vec<u8> {
        self.id.to_ne_bytes().to_vec()
    }
}

#[derive(Debug)]
pub(crate) struct Queue {
    context: Context,
    launches: AtomicU64,
}

impl Queue {
    pub(crate) fn new(context: &Context, _device: &Device) -> Result<Self, Error> {
        Ok(Queue {
            context: context.clone(),
            launches: AtomicU64::new(0),
        })
    }

    fn same_context(&self, operation: &'static str, context_id: u64) -> Result<(), Error> {
        if context_id == self.context.inner.id {
            Ok(())
        } else {
            Err(Error::new(operation, CL_INVALID_CONTEXT))
        }
    }

    pub(crate) fn enqueue_nd_range(
        &self,
        kernel: &Kernel,
        global: &[usize],
        local: &[usize],
    ) -> Result<(), Error> {
        const OP: &str = "clEnqueueNDRangeKernel";
        let dims = global.len();
        if !(1..=3).contains(&dims) || local.len() != dims {
            return Err(Error::new(OP, CL_INVALID_WORK_DIMENSION));
        }
        if kernel.args.iter().any(Option::is_none) {
            return Err(Error::new(OP, CL_INVALID_KERNEL_ARGS));
        }
        if global.contains(&0) {
            return Err(Error::new(OP, CL_INVALID_GLOBAL_WORK_SIZE));
        }
        let group: usize = local.iter().product();
        let divides = global.iter().zip(local).all(|(g, l)| *l != 0 && g % l == 0);
        if !divides || group > self.context.inner.device.max_work_group_size {
            return Err(Error::new(OP, CL_INVALID_WORK_GROUP_SIZE));
        }
        let n = self.launches.fetch_add(1, Ordering::Relaxed) + 1;
        logwise::trace_sync!(
            "software queue: launch {n} of {kernel} over {dims} dimension(s)",
            n = n,
            kernel = logwise::privacy::LogIt(&kernel.decl.name),
            dims = dims
        );
        Ok(())
    }

    pub(crate) fn finish(&self) -> Result<(), Error> {
        self.context.inner.finishes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    pub(crate) fn acquire_gl(&self, image: &Image) -> Result<(), Error> {
        const OP: &str = "clEnqueueAcquireGLObjects";
        self.same_context(OP, image.context_id)?;
        if !image.gl_shared {
            return Err(Error::new(OP, CL_INVALID_GL_OBJECT));
        }
        image
            .acquired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::new(OP, CL_INVALID_OPERATION))
    }

    pub(crate) fn release_gl(&self, image: &Image) -> Result<(), Error> {
        const OP: &str = "clEnqueueReleaseGLObjects";
        self.same_context(OP, image.context_id)?;
        if !image.gl_shared {
            return Err(Error::new(OP, CL_INVALID_GL_OBJECT));
        }
        image
            .acquired
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::new(OP, CL_INVALID_OPERATION))
    }

    /// GL-shared images may only be touched while acquired.
    fn check_access(&self, operation: &'static str, image: &Image) -> Result<(), Error> {
        self.same_context(operation, image.context_id)?;
        if image.gl_shared && !image.acquired.load(Ordering::Acquire) {
            return Err(Error::new(operation, CL_INVALID_OPERATION));
        }
        Ok(())
    }

    /// # Safety
    ///
    /// For a non-blocking write, `data` must stay alive until the queue is finished.
    /// (The software driver copies immediately; the contract matches the OpenCL backend.)
    pub(crate) unsafe fn write_image(
        &self,
        image: &Image,
        mut origin: [usize; 3],
        region: [usize; 3],
        data: &[u8],
        _blocking: bool,
    ) -> Result<(), Error> {
        const OP: &str = "clEnqueueWriteImage";
        self.check_access(OP, image)?;
        if self.context.inner.quirks.layer_writes_alias_first_layer && origin[2] > 0 {
            logwise::trace_sync!(
                "software queue: aliasing write at layer {layer} onto layer 0",
                layer = origin[2]
            );
            origin[2] = 0;
        }
        lock(&image.surface)
            .write(origin, region, data)
            .map_err(|code| Error::new(OP, code))
    }

    pub(crate) fn read_image(
        &self,
        image: &Image,
        origin: [usize; 3],
        region: [usize; 3],
        out: &mut [u8],
    ) -> Result<(), Error> {
        const OP: &str = "clEnqueueReadImage";
        self.check_access(OP, image)?;
        lock(&image.surface)
            .read(origin, region, out)
            .map_err(|code| Error::new(OP, code))
    }

    pub(crate) fn write_buffer(&self, buffer: &mut Buffer, data: &[u8]) -> Result<(), Error> {
        const OP: &str = "clEnqueueWriteBuffer";
        self.same_context(OP, buffer.context_id)?;
        let mut dst = lock(&buffer.data);
        if data.len() > dst.len() {
            return Err(Error::new(OP, CL_INVALID_VALUE));
        }
        dst[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn read_buffer(&self, buffer: &Buffer, out: &mut [u8]) -> Result<(), Error> {
        const OP: &str = "clEnqueueReadBuffer";
        self.same_context(OP, buffer.context_id)?;
        let src = lock(&buffer.data);
        if out.len() > src.len() {
            return Err(Error::new(OP, CL_INVALID_VALUE));
        }
        out.copy_from_slice(&src[..out.len()]);
        Ok(())
    }
}
