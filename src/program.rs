// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Source compilation.

use crate::config::BuildOptions;
use crate::context::Context;
use crate::entry_point::Device;
use crate::enumerate::{enumerate_c_bytes, enumerate_string, enumerate_with};
use crate::error::Error;
use crate::imp;
use crate::kernel::{Kernel, KernelRegistry};
use crate::status;

/// Compiles `source` for `device` and enumerates its kernels.
///
/// The build blocks. On failure the full build log is logged and returned in
/// [`Error::Compile`], with only the C string terminator removed. The raw bytes are kept
/// alongside the text, since drivers are not obliged to emit UTF-8.
pub fn build(
    context: &Context,
    device: &Device,
    source: &str,
    options: &BuildOptions,
) -> Result<KernelRegistry, Error> {
    let options = options.render(&device.opencl_c_version()?);
    //the runtime takes a C string
    if options.contains('\0') {
        return Err(imp::Error::new("clBuildProgram", status::CL_INVALID_BUILD_OPTIONS).into());
    }
    logwise::info_sync!(
        "building program with options {options}",
        options = logwise::privacy::LogIt(&options)
    );
    let mut program = imp::Program::from_source(&context.imp, source)?;
    if let Err(e) = program.build(&device.0, &options) {
        return Err(build_failure(&program, device, e));
    }

    let handles = enumerate_with(
        imp::KernelHandle::default(),
        || program.kernel_count(),
        |buf| program.fill_kernels(buf),
    )?;
    let mut kernels = Vec::with_capacity(handles.len());
    for handle in handles {
        let kernel = imp::Kernel::adopt(handle)?;
        let name = enumerate_string(|| kernel.name_size(), |buf| kernel.name_fill(buf))?;
        kernels.push(Kernel::new(kernel, name)?);
    }
    let registry = KernelRegistry::new(kernels);
    logwise::info_sync!(
        "built {count} kernel(s)",
        count = registry.len()
    );
    Ok(registry)
}

fn build_failure(program: &imp::Program, device: &Device, build_error: imp::Error) -> Error {
    let status = match program.build_status(&device.0) {
        Ok(status) => status,
        Err(e) => return e.into(),
    };
    if status != status::CL_BUILD_ERROR {
        logwise::error_sync!(
            "build failed with {code} but build status is {status}",
            code = build_error.code(),
            status = status
        );
        return Error::InconsistentBuildStatus {
            status,
            code: build_error.code(),
        };
    }
    let raw_log = match enumerate_c_bytes(
        || program.build_log_size(&device.0),
        |buf| program.build_log_fill(&device.0, buf),
    ) {
        Ok(raw_log) => raw_log,
        Err(e) => return e.into(),
    };
    let log = String::from_utf8_lossy(&raw_log).into_owned();
    logwise::error_sync!("build failed:\n{log}", log = logwise::privacy::LogIt(&log));
    Error::Compile { log, raw_log }
}
