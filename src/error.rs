// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Portable error types.
//!
//! [`Error`] is what every harness operation returns. Native failures that do not have a
//! more specific variant arrive as [`Error::Runtime`], wrapping the backend's
//! [`crate::RuntimeError`].

use crate::imp;
use crate::status;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no compute platform is available")]
    NoPlatform,
    #[error("platform {platform:?} has no GPU device")]
    NoDevice { platform: String },
    #[error("can't create compute context: {} ({code})", status::name(*.code))]
    ContextCreation { code: i32 },
    /// `log` is the build log as text, with bytes that are not UTF-8 replaced.
    /// `raw_log` is the same log exactly as the runtime returned it.
    #[error("program failed to build:\n{log}")]
    Compile { log: String, raw_log: Vec<u8> },
    /// The build failed with `code`, but the runtime reported a build status other than
    /// `CL_BUILD_ERROR`, so the log can't be trusted.
    #[error(
        "build failed with {} but build status is {status}, expected CL_BUILD_ERROR",
        status::name(*.code)
    )]
    InconsistentBuildStatus { status: i32, code: i32 },
    #[error("no kernel named {name:?} (available: {available:?})")]
    KernelNotFound {
        name: String,
        available: Vec<String>,
    },
    #[error("can't bind arguments of {kernel}: {error}")]
    Argument {
        kernel: String,
        #[source]
        error: ArgumentError,
    },
    #[error("can't dispatch {kernel}: {} ({code})", status::name(*.code))]
    Dispatch { kernel: String, code: i32 },
    #[error("can't create {resource}: {} ({code})", status::name(*.code))]
    ResourceCreation { resource: &'static str, code: i32 },
    #[error("{resource}: {violation}")]
    ProtocolViolation {
        resource: &'static str,
        violation: Violation,
    },
    #[error(
        "layers {layer_start}..{} are outside an image array of {layers} layer(s)",
        *.layer_start as u64 + *.layer_count as u64
    )]
    InvalidRegion {
        layer_start: u32,
        layer_count: u32,
        layers: u32,
    },
    #[error("Implementation error {0}")]
    Runtime(#[from] imp::Error),
    #[error("can't write {}: {source}", .path.display())]
    Dump {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}

/// Why an argument could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ArgumentError {
    #[error("kernel takes {expected} argument(s), {supplied} supplied")]
    CountMismatch { expected: u32, supplied: usize },
    #[error("slot {slot} is out of range for {count} argument(s)")]
    SlotOutOfRange { slot: u32, count: u32 },
    #[error("slot {slot} is not bound")]
    Unbound { slot: u32 },
    /// The runtime refused the value, usually for its size.
    #[error("slot {slot} rejected: {error}")]
    Rejected { slot: u32, error: imp::Error },
}

/// A break in the acquire/release protocol of a graphics-shared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Violation {
    #[error("acquired while already acquired")]
    AlreadyAcquired,
    #[error("released while not acquired")]
    NotAcquired,
    #[error("bound to slot {slot} of a dispatch while not acquired")]
    DispatchWhileUnshared { slot: u32 },
    #[error("read while not acquired")]
    ReadWhileUnshared,
}

impl Error {
    /// The native status code behind this error, if there is one.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::ContextCreation { code }
            | Error::Dispatch { code, .. }
            | Error::ResourceCreation { code, .. }
            | Error::InconsistentBuildStatus { code, .. } => Some(*code),
            Error::Runtime(e) => Some(e.code()),
            Error::Argument {
                error: ArgumentError::Rejected { error, .. },
                ..
            } => Some(error.code()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_native_codes() {
        let e = Error::ContextCreation {
            code: status::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR,
        };
        assert!(e.to_string().contains("CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR"));
        assert_eq!(e.native_code(), Some(-1000));
    }

    #[test]
    fn region_message_does_not_overflow() {
        let e = Error::InvalidRegion {
            layer_start: u32::MAX,
            layer_count: 2,
            layers: 2,
        };
        assert!(e.to_string().contains("4294967297"));
        assert_eq!(e.native_code(), None);
    }
}
