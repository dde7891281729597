// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims that `opencl3` cannot provide.
//!
//! Interop contexts are created against whichever GL context is current on the calling
//! thread. Reading it takes the window system's own getters: WGL, GLX or CGL.

/// Current GL context and its surface handle, as raw pointers.
pub(crate) mod gl {
    use std::ffi::c_void;

    #[cfg(target_os = "windows")]
    #[link(name = "opengl32")]
    unsafe extern "system" {
        fn wglGetCurrentContext() -> *mut c_void;
        fn wglGetCurrentDC() -> *mut c_void;
    }

    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    #[link(name = "GL")]
    unsafe extern "C" {
        fn glXGetCurrentContext() -> *mut c_void;
        fn glXGetCurrentDisplay() -> *mut c_void;
    }

    #[cfg(target_os = "macos")]
    #[link(name = "OpenGL", kind = "framework")]
    unsafe extern "C" {
        fn CGLGetCurrentContext() -> *mut c_void;
        fn CGLGetShareGroup(ctx: *mut c_void) -> *mut c_void;
    }

    /// (context, surface) of the calling thread.
    #[cfg(target_os = "windows")]
    pub(crate) fn current() -> Option<(usize, crate::graphics::SurfaceHandle)> {
        //safe: both getters only read thread-local WGL state
        let (ctx, hdc) = unsafe { (wglGetCurrentContext(), wglGetCurrentDC()) };
        (!ctx.is_null()).then(|| {
            (
                ctx as usize,
                crate::graphics::SurfaceHandle::Wgl { hdc: hdc as usize },
            )
        })
    }

    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    pub(crate) fn current() -> Option<(usize, crate::graphics::SurfaceHandle)> {
        //safe: both getters only read thread-local GLX state
        let (ctx, display) = unsafe { (glXGetCurrentContext(), glXGetCurrentDisplay()) };
        (!ctx.is_null()).then(|| {
            (
                ctx as usize,
                crate::graphics::SurfaceHandle::Glx {
                    display: display as usize,
                },
            )
        })
    }

    #[cfg(target_os = "macos")]
    pub(crate) fn current() -> Option<(usize, crate::graphics::SurfaceHandle)> {
        //safe: CGLGetShareGroup accepts any context returned by CGLGetCurrentContext
        let ctx = unsafe { CGLGetCurrentContext() };
        if ctx.is_null() {
            return None;
        }
        let share_group = unsafe { CGLGetShareGroup(ctx) };
        Some((
            ctx as usize,
            crate::graphics::SurfaceHandle::CglShareGroup {
                share_group: share_group as usize,
            },
        ))
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        all(unix, not(target_os = "android"))
    )))]
    pub(crate) fn current() -> Option<(usize, crate::graphics::SurfaceHandle)> {
        None
    }
}
