// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A stand-in for the graphics API.
//!
//! [`SoftwareGl`] plays the part of an OpenGL context: it can be made current on a
//! thread, owns a namespace of textures, uploads constant data and generates mipmaps.
//! Software compute contexts created with its handle share texture storage with it, the
//! same way `cl_khr_gl_sharing` shares storage with a real driver.

use crate::graphics::{GraphicsTexture, TextureTarget};
use crate::imp::software::memory::{SharedSurface, Surface, lock};
use crate::pixel_formats::sealed::{CPixelTrait, PixelFormat};
use crate::pixel_formats::{as_bytes, from_bytes};
use crate::status;
use std::cell::Cell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

#[derive(Debug)]
struct TextureRecord {
    target: u32,
    levels: Vec<SharedSurface>,
}

/// Texture namespace of one graphics context.
#[derive(Debug)]
pub(crate) struct GlShare {
    textures: Mutex<HashMap<u32, TextureRecord>>,
    next_name: AtomicU32,
}

impl GlShare {
    /// Storage of one mip level of a texture, as `clCreateFromGLTexture` sees it.
    pub(crate) fn level(&self, name: u32, target: u32, mip_level: i32) -> Result<SharedSurface, i32> {
        let textures = lock(&self.textures);
        let record = textures.get(&name).ok_or(status::CL_INVALID_GL_OBJECT)?;
        if record.target != target {
            return Err(status::CL_INVALID_VALUE);
        }
        usize::try_from(mip_level)
            .ok()
            .and_then(|level| record.levels.get(level))
            .cloned()
            .ok_or(status::CL_INVALID_MIP_LEVEL)
    }
}

static REGISTRY: LazyLock<Mutex<HashMap<usize, Arc<GlShare>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(0x1000);

thread_local! {
    static CURRENT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The context current on this thread, if any.
pub(crate) fn current() -> Option<usize> {
    CURRENT.with(|c| c.get())
}

/// Looks up a live context by handle.
pub(crate) fn share(handle: usize) -> Option<Arc<GlShare>> {
    lock(&REGISTRY).get(&handle).cloned()
}

/// A software graphics context.
#[derive(Debug)]
pub struct SoftwareGl {
    handle: usize,
    share: Arc<GlShare>,
}

impl SoftwareGl {
    /// Creates a context. It is not current until [`SoftwareGl::make_current`].
    pub fn new() -> Self {
        let handle = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        let share = Arc::new(GlShare {
            textures: Mutex::new(HashMap::new()),
            next_name: AtomicU32::new(1),
        });
        lock(&REGISTRY).insert(handle, share.clone());
        SoftwareGl { handle, share }
    }

    /// Makes this context current on the calling thread.
    pub fn make_current(&self) {
        CURRENT.with(|c| c.set(Some(self.handle)));
    }

    /// Leaves the calling thread with no current context.
    pub fn clear_current() {
        CURRENT.with(|c| c.set(None));
    }

    /// The native handle, as reported through [`crate::InteropHandles`].
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// Creates a 2D texture with one level, every texel set to `fill`.
    pub fn create_texture_2d<F: PixelFormat>(
        &self,
        width: u32,
        height: u32,
        fill: F::CPixel,
    ) -> SoftwareTexture<F> {
        let name = self.share.next_name.fetch_add(1, Ordering::Relaxed);
        let mut surface = Surface::new(width as usize, height as usize, 1, F::BYTES_PER_PIXEL as usize);
        let pixels = vec![fill; width as usize * height as usize];
        //dimensions come from the surface we just made
        let _ = surface.write([0, 0, 0], [width as usize, height as usize, 1], as_bytes(&pixels));
        lock(&self.share.textures).insert(
            name,
            TextureRecord {
                target: status::GL_TEXTURE_2D,
                levels: vec![surface.shared()],
            },
        );
        logwise::trace_sync!(
            "software gl: texture {name} {w}x{h}",
            name = name,
            w = width,
            h = height
        );
        SoftwareTexture {
            name,
            width,
            height,
            share: self.share.clone(),
            format: PhantomData,
        }
    }
}

impl Default for SoftwareGl {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SoftwareGl {
    fn drop(&mut self) {
        lock(&REGISTRY).remove(&self.handle);
        if current() == Some(self.handle) {
            Self::clear_current();
        }
    }
}

/// A texture owned by a [`SoftwareGl`] context.
#[derive(Debug)]
pub struct SoftwareTexture<F> {
    name: u32,
    width: u32,
    height: u32,
    share: Arc<GlShare>,
    format: PhantomData<F>,
}

impl<F: PixelFormat> SoftwareTexture<F> {
    fn levels(&self) -> Vec<SharedSurface> {
        lock(&self.share.textures)
            .get(&self.name)
            .map(|r| r.levels.clone())
            .unwrap_or_default()
    }

    /// Replaces the mip chain below level 0 with box-filtered reductions of level 0.
    pub fn generate_mipmaps(&self) {
        let levels = self.levels();
        let Some(base) = levels.first().cloned() else {
            return;
        };
        let mut chain = vec![base.clone()];
        let (mut w, mut h) = (self.width as usize, self.height as usize);
        let mut src: Vec<F::CPixel> = from_bytes(lock(&base).bytes());
        while w > 1 || h > 1 {
            let (nw, nh) = ((w / 2).max(1), (h / 2).max(1));
            let mut dst = Vec::with_capacity(nw * nh);
            for y in 0..nh {
                for x in 0..nw {
                    let at = |dx: usize, dy: usize| {
                        let sx = (x * 2 + dx).min(w - 1);
                        let sy = (y * 2 + dy).min(h - 1);
                        src[sy * w + sx].clone()
                    };
                    dst.push(<F::CPixel as CPixelTrait>::avg(&[at(0, 0), at(1, 0), at(0, 1), at(1, 1)]));
                }
            }
            let mut surface = Surface::new(nw, nh, 1, F::BYTES_PER_PIXEL as usize);
            let _ = surface.write([0, 0, 0], [nw, nh, 1], as_bytes(&dst));
            chain.push(surface.shared());
            src = dst;
            (w, h) = (nw, nh);
        }
        if let Some(record) = lock(&self.share.textures).get_mut(&self.name) {
            record.levels = chain;
        }
    }

    /// Sets every texel of a level to `value`.
    pub fn fill_level(&self, level: u32, value: F::CPixel) {
        if let Some(surface) = self.levels().get(level as usize) {
            let mut surface = lock(surface);
            let (w, h) = (surface.width, surface.height);
            let _ = surface.write([0, 0, 0], [w, h, 1], as_bytes(&vec![value; w * h]));
        }
    }

    /// Reads a level back from the graphics side.
    pub fn read_level(&self, level: u32) -> Vec<F::CPixel> {
        self.levels()
            .get(level as usize)
            .map(|s| from_bytes(lock(s).bytes()))
            .unwrap_or_default()
    }
}

impl<F: PixelFormat> GraphicsTexture for SoftwareTexture<F> {
    fn name(&self) -> u32 {
        self.name
    }
    fn target(&self) -> TextureTarget {
        TextureTarget::Texture2D
    }
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn mip_levels(&self) -> u32 {
        self.levels().len() as u32
    }
}

impl<F> Drop for SoftwareTexture<F> {
    fn drop(&mut self) {
        lock(&self.share.textures).remove(&self.name);
    }
}
