// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Native status codes and enumerants.
//!
//! Both backends speak these values. The OpenCL backend passes the runtime's codes
//! through unchanged and the software driver returns the same codes for the same
//! failures, so callers can match on [`crate::RuntimeError::code`] regardless of backend.

pub const CL_SUCCESS: i32 = 0;
pub const CL_DEVICE_NOT_FOUND: i32 = -1;
pub const CL_BUILD_PROGRAM_FAILURE: i32 = -11;
pub const CL_INVALID_VALUE: i32 = -30;
pub const CL_INVALID_PLATFORM: i32 = -32;
pub const CL_INVALID_DEVICE: i32 = -33;
pub const CL_INVALID_CONTEXT: i32 = -34;
pub const CL_INVALID_IMAGE_FORMAT_DESCRIPTOR: i32 = -39;
pub const CL_INVALID_IMAGE_SIZE: i32 = -40;
pub const CL_INVALID_BUILD_OPTIONS: i32 = -43;
pub const CL_INVALID_PROGRAM_EXECUTABLE: i32 = -45;
pub const CL_INVALID_KERNEL: i32 = -48;
pub const CL_INVALID_ARG_INDEX: i32 = -49;
pub const CL_INVALID_ARG_SIZE: i32 = -51;
pub const CL_INVALID_KERNEL_ARGS: i32 = -52;
pub const CL_INVALID_WORK_DIMENSION: i32 = -53;
pub const CL_INVALID_WORK_GROUP_SIZE: i32 = -54;
pub const CL_INVALID_OPERATION: i32 = -59;
pub const CL_INVALID_GL_OBJECT: i32 = -60;
pub const CL_INVALID_BUFFER_SIZE: i32 = -61;
pub const CL_INVALID_MIP_LEVEL: i32 = -62;
pub const CL_INVALID_GLOBAL_WORK_SIZE: i32 = -63;
pub const CL_INVALID_PROPERTY: i32 = -64;
pub const CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR: i32 = -1000;
pub const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

// build status
pub const CL_BUILD_SUCCESS: i32 = 0;
pub const CL_BUILD_NONE: i32 = -1;
pub const CL_BUILD_ERROR: i32 = -2;
pub const CL_BUILD_IN_PROGRESS: i32 = -3;

// context properties
pub const CL_CONTEXT_PLATFORM: isize = 0x1084;
pub const CL_GL_CONTEXT_KHR: isize = 0x2008;
pub const CL_EGL_DISPLAY_KHR: isize = 0x2009;
pub const CL_GLX_DISPLAY_KHR: isize = 0x200A;
pub const CL_WGL_HDC_KHR: isize = 0x200B;
pub const CL_CGL_SHAREGROUP_KHR: isize = 0x200C;
/// `CL_CONTEXT_PROPERTY_USE_CGL_SHAREGROUP_APPLE`
pub const CL_CGL_SHAREGROUP_APPLE: isize = 0x1000_0000;

// memory flags
pub const CL_MEM_READ_WRITE: u64 = 1 << 0;
pub const CL_MEM_WRITE_ONLY: u64 = 1 << 1;
pub const CL_MEM_READ_ONLY: u64 = 1 << 2;

pub const CL_MEM_OBJECT_IMAGE2D: u32 = 0x10F1;
pub const CL_MEM_OBJECT_IMAGE2D_ARRAY: u32 = 0x10F3;

// GL texture targets
pub const GL_TEXTURE_2D: u32 = 0x0DE1;
pub const GL_TEXTURE_RECTANGLE: u32 = 0x84F5;
pub const GL_TEXTURE_2D_ARRAY: u32 = 0x8C1A;

/// Symbolic name for a status code, for diagnostics.
pub fn name(code: i32) -> &'static str {
    match code {
        CL_SUCCESS => "CL_SUCCESS",
        CL_DEVICE_NOT_FOUND => "CL_DEVICE_NOT_FOUND",
        CL_BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
        CL_INVALID_VALUE => "CL_INVALID_VALUE",
        CL_INVALID_PLATFORM => "CL_INVALID_PLATFORM",
        CL_INVALID_DEVICE => "CL_INVALID_DEVICE",
        CL_INVALID_CONTEXT => "CL_INVALID_CONTEXT",
        CL_INVALID_IMAGE_FORMAT_DESCRIPTOR => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
        CL_INVALID_IMAGE_SIZE => "CL_INVALID_IMAGE_SIZE",
        CL_INVALID_BUILD_OPTIONS => "CL_INVALID_BUILD_OPTIONS",
        CL_INVALID_PROGRAM_EXECUTABLE => "CL_INVALID_PROGRAM_EXECUTABLE",
        CL_INVALID_KERNEL => "CL_INVALID_KERNEL",
        CL_INVALID_ARG_INDEX => "CL_INVALID_ARG_INDEX",
        CL_INVALID_ARG_SIZE => "CL_INVALID_ARG_SIZE",
        CL_INVALID_KERNEL_ARGS => "CL_INVALID_KERNEL_ARGS",
        CL_INVALID_WORK_DIMENSION => "CL_INVALID_WORK_DIMENSION",
        CL_INVALID_WORK_GROUP_SIZE => "CL_INVALID_WORK_GROUP_SIZE",
        CL_INVALID_OPERATION => "CL_INVALID_OPERATION",
        CL_INVALID_GL_OBJECT => "CL_INVALID_GL_OBJECT",
        CL_INVALID_BUFFER_SIZE => "CL_INVALID_BUFFER_SIZE",
        CL_INVALID_MIP_LEVEL => "CL_INVALID_MIP_LEVEL",
        CL_INVALID_GLOBAL_WORK_SIZE => "CL_INVALID_GLOBAL_WORK_SIZE",
        CL_INVALID_PROPERTY => "CL_INVALID_PROPERTY",
        CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR => "CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR",
        CL_PLATFORM_NOT_FOUND_KHR => "CL_PLATFORM_NOT_FOUND_KHR",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn names_known_codes() {
        assert_eq!(super::name(-60), "CL_INVALID_GL_OBJECT");
        assert_eq!(super::name(12345), "UNKNOWN");
    }

    #[cfg(feature = "backend_opencl")]
    #[test]
    fn values_match_the_runtime_headers() {
        use opencl3::error_codes as codes;
        assert_eq!(super::CL_DEVICE_NOT_FOUND, codes::CL_DEVICE_NOT_FOUND);
        assert_eq!(super::CL_BUILD_PROGRAM_FAILURE, codes::CL_BUILD_PROGRAM_FAILURE);
        assert_eq!(super::CL_INVALID_CONTEXT, codes::CL_INVALID_CONTEXT);
        assert_eq!(super::CL_INVALID_ARG_INDEX, codes::CL_INVALID_ARG_INDEX);
        assert_eq!(super::CL_INVALID_GL_OBJECT, codes::CL_INVALID_GL_OBJECT);
        assert_eq!(super::CL_INVALID_MIP_LEVEL, codes::CL_INVALID_MIP_LEVEL);
        assert_eq!(super::CL_PLATFORM_NOT_FOUND_KHR, codes::CL_PLATFORM_NOT_FOUND_KHR);
        assert_eq!(
            super::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR,
            codes::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR
        );
        assert_eq!(super::CL_BUILD_ERROR, opencl3::program::CL_BUILD_ERROR);
        assert_eq!(super::CL_BUILD_NONE, opencl3::program::CL_BUILD_NONE);
        assert_eq!(super::CL_MEM_READ_WRITE, opencl3::memory::CL_MEM_READ_WRITE);
        assert_eq!(
            super::CL_MEM_OBJECT_IMAGE2D_ARRAY,
            opencl3::memory::CL_MEM_OBJECT_IMAGE2D_ARRAY
        );
        assert_eq!(
            super::CL_CONTEXT_PLATFORM,
            opencl3::context::context::CL_CONTEXT_PLATFORM
        );
    }
}
