// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Runs the image-array scenario against the system OpenCL runtime.
//!
//! Exits 0 when the kernel samples 2.0 from layer 1, non-zero otherwise.

use kernels_and_images::{Harness, scenarios};
use std::process::ExitCode;

fn run() -> Result<bool, kernels_and_images::Error> {
    let harness = Harness::from_env_or_default()?;
    println!(
        "device: {} ({})",
        harness.device().name()?,
        harness.device().opencl_c_version()?
    );

    let report = scenarios::image_array(&harness)?;
    println!(
        "image array: expected {} sampled {} readback {}",
        report.expected, report.sampled, report.readback
    );

    let equivalence = scenarios::region_write_equivalence(
        &harness,
        scenarios::IMAGE_ARRAY_SIZE,
        scenarios::IMAGE_ARRAY_SIZE,
        &[1.0, 2.0],
    )?;
    println!(
        "region writes: split {:?} combined {:?}",
        equivalence.split, equivalence.combined
    );
    if equivalence.first_layer_aliased() {
        println!("driver defect: a write to layer 1 landed on layer 0");
    }
    Ok(report.passed() && equivalence.is_consistent())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            println!("{e}");
            ExitCode::FAILURE
        }
    }
}
