// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend selection.
//!
//! The portable types in this crate wrap `imp::*`. With `backend_opencl` (the default)
//! these talk to the system OpenCL runtime. With `backend_software`, or with no backend
//! feature at all, they talk to an in-process software driver.

/// A native failure reported by the backend.
///
/// Carries the name of the entry point that failed and its status code. The codes are
/// the ones listed in [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed with {} ({code})", crate::status::name(*.code))]
pub struct Error {
    operation: &'static str,
    code: i32,
}

impl Error {
    pub(crate) const fn new(operation: &'static str, code: i32) -> Self {
        Error { operation, code }
    }
    /// The native entry point that failed.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
    /// The native status code.
    pub fn code(&self) -> i32 {
        self.code
    }
}

/// String-valued device queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceInfo {
    Name,
    Vendor,
    OpenClCVersion,
}

#[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
pub(crate) mod software;
#[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
pub(crate) use software::*;

#[cfg(all(feature = "backend_opencl", not(feature = "backend_software")))]
mod opencl;

#[cfg(all(feature = "backend_opencl", not(feature = "backend_software")))]
pub(crate) use opencl::*;
