// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The graphics side of interop.
//!
//! This crate never creates a graphics context or uploads textures. The graphics
//! collaborator owns both; what crosses the boundary is described here: native handles
//! of the current context, and texture names.

use crate::status;
use raw_window_handle::RawDisplayHandle;

/// Texture binding points that can be shared with compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TextureTarget {
    Texture2D,
    Texture2DArray,
    Rectangle,
}

impl TextureTarget {
    /// The `GLenum` passed to `clCreateFromGLTexture`.
    pub const fn gl_enum(self) -> u32 {
        match self {
            TextureTarget::Texture2D => status::GL_TEXTURE_2D,
            TextureTarget::Texture2DArray => status::GL_TEXTURE_2D_ARRAY,
            TextureTarget::Rectangle => status::GL_TEXTURE_RECTANGLE,
        }
    }
}

/// A texture owned by the graphics API.
///
/// Implemented by whatever uploaded the texture. The texture must stay alive for as long
/// as any [`crate::SharedTexture`] wraps it.
pub trait GraphicsTexture {
    /// The native texture name (`GLuint`).
    fn name(&self) -> u32;
    fn target(&self) -> TextureTarget;
    /// Width of mip level 0.
    fn width(&self) -> u32;
    /// Height of mip level 0.
    fn height(&self) -> u32;
    /// Number of populated mip levels.
    fn mip_levels(&self) -> u32 {
        1
    }
}

//Apple's runtime only understands its own key
#[cfg(target_os = "macos")]
const CGL_SHAREGROUP_PROPERTY: isize = status::CL_CGL_SHAREGROUP_APPLE;
#[cfg(not(target_os = "macos"))]
const CGL_SHAREGROUP_PROPERTY: isize = status::CL_CGL_SHAREGROUP_KHR;

/// The window-system half of a graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceHandle {
    /// Windows device context (`HDC`).
    Wgl { hdc: usize },
    /// X11 `Display*` of a GLX context.
    Glx { display: usize },
    /// `EGLDisplay`.
    Egl { display: usize },
    /// macOS `CGLShareGroupObj`.
    CglShareGroup { share_group: usize },
    /// No surface handle is needed (software GL, or a runtime that ignores it).
    Headless,
}

impl SurfaceHandle {
    /// The context property key and value for this surface, if any.
    pub fn property(&self) -> Option<(isize, isize)> {
        match *self {
            SurfaceHandle::Wgl { hdc } => Some((status::CL_WGL_HDC_KHR, hdc as isize)),
            SurfaceHandle::Glx { display } => Some((status::CL_GLX_DISPLAY_KHR, display as isize)),
            SurfaceHandle::Egl { display } => Some((status::CL_EGL_DISPLAY_KHR, display as isize)),
            SurfaceHandle::CglShareGroup { share_group } => {
                Some((CGL_SHAREGROUP_PROPERTY, share_group as isize))
            }
            SurfaceHandle::Headless => None,
        }
    }
}

/// Error converting a display handle into a [`SurfaceHandle`].
#[derive(Debug, thiserror::Error)]
#[error("display handle {0:?} has no compute interop mapping")]
pub struct UnsupportedDisplay(pub RawDisplayHandle);

impl TryFrom<RawDisplayHandle> for SurfaceHandle {
    type Error = UnsupportedDisplay;

    fn try_from(handle: RawDisplayHandle) -> Result<Self, Self::Error> {
        match handle {
            RawDisplayHandle::Xlib(xlib) => match xlib.display {
                Some(display) => Ok(SurfaceHandle::Glx {
                    display: display.as_ptr() as usize,
                }),
                None => Err(UnsupportedDisplay(handle)),
            },
            RawDisplayHandle::AppKit(_) | RawDisplayHandle::UiKit(_) => {
                //CGL share groups come from the GL context, not the display
                Err(UnsupportedDisplay(handle))
            }
            _ => Err(UnsupportedDisplay(handle)),
        }
    }
}

/// Native handles of a graphics context.
///
/// Normally read from the calling thread's current context with
/// [`InteropHandles::current`]; a windowing layer that already holds them can build one
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteropHandles {
    /// The graphics context (`HGLRC`, `GLXContext`, `EGLContext`, `CGLContextObj`).
    pub gl_context: usize,
    pub surface: SurfaceHandle,
}

impl InteropHandles {
    /// Reads the graphics context that is current on the calling thread.
    ///
    /// Returns `None` when no context is current.
    pub fn current() -> Option<InteropHandles> {
        crate::imp::current_interop_handles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn xlib_maps_to_glx() {
        let mut marker = 0u8;
        let display = NonNull::from(&mut marker).cast();
        let raw = RawDisplayHandle::Xlib(XlibDisplayHandle::new(Some(display), 0));
        let surface = SurfaceHandle::try_from(raw).unwrap();
        assert_eq!(
            surface,
            SurfaceHandle::Glx {
                display: display.as_ptr() as usize
            }
        );
        assert_eq!(surface.property().unwrap().0, status::CL_GLX_DISPLAY_KHR);
    }

    #[test]
    fn wayland_is_unsupported() {
        let mut marker = 0u8;
        let raw = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(
            NonNull::from(&mut marker).cast(),
        ));
        assert!(SurfaceHandle::try_from(raw).is_err());
    }

    #[test]
    fn headless_has_no_property() {
        assert_eq!(SurfaceHandle::Headless.property(), None);
        assert_eq!(TextureTarget::Texture2D.gl_enum(), 0x0DE1);
    }
}
