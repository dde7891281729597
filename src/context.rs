// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compute context creation, with or without graphics interop.

use crate::entry_point::{Device, Platform};
use crate::error::Error;
use crate::graphics::InteropHandles;
use crate::imp;
use crate::status;

/// Whether, and with what, a context shares resources with a graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interop {
    #[default]
    Disabled,
    /// Read the handles of the graphics context current on the calling thread.
    CurrentContext,
    /// Use handles supplied by the caller.
    Explicit(InteropHandles),
}

/// The context property list for a graphics-shared context.
///
/// Graphics context first, then the surface, then the platform, zero-terminated.
pub(crate) fn interop_properties(platform: isize, handles: &InteropHandles) -> Vec<isize> {
    let mut properties = vec![status::CL_GL_CONTEXT_KHR, handles.gl_context as isize];
    if let Some((key, value)) = handles.surface.property() {
        properties.extend([key, value]);
    }
    properties.extend([status::CL_CONTEXT_PLATFORM, platform, 0]);
    properties
}

///A compute context for one device.
#[derive(Debug)]
pub struct Context {
    pub(crate) imp: imp::Context,
    platform: Platform,
    device: Device,
    interop: Option<InteropHandles>,
}

impl Context {
    /// Creates a context, sharing with the current graphics context when
    /// `use_graphics_interop` is set.
    pub fn create(
        platform: &Platform,
        device: &Device,
        use_graphics_interop: bool,
    ) -> Result<Self, Error> {
        let interop = if use_graphics_interop {
            Interop::CurrentContext
        } else {
            Interop::Disabled
        };
        Self::new(platform, device, interop)
    }

    pub fn new(platform: &Platform, device: &Device, interop: Interop) -> Result<Self, Error> {
        let handles = match interop {
            Interop::Disabled => None,
            Interop::Explicit(handles) => Some(handles),
            Interop::CurrentContext => {
                Some(InteropHandles::current().ok_or(Error::ContextCreation {
                    code: status::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR,
                })?)
            }
        };
        let properties = handles
            .as_ref()
            .map(|h| interop_properties(platform.0.raw(), h))
            .unwrap_or_default();
        let imp = imp::Context::new(&device.0, &properties)
            .map_err(|e| Error::ContextCreation { code: e.code() })?;
        logwise::info_sync!(
            "created compute context (interop: {interop})",
            interop = logwise::privacy::LogIt(&handles.is_some())
        );
        Ok(Context {
            imp,
            platform: *platform,
            device: *device,
            interop: handles,
        })
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// True when this context shares resources with a graphics context.
    pub fn is_interop(&self) -> bool {
        self.interop.is_some()
    }

    pub fn interop_handles(&self) -> Option<&InteropHandles> {
        self.interop.as_ref()
    }
}
