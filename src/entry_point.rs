// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Platform and device discovery.
//!
//! The harness is deliberately unadventurous here: first platform, first GPU device,
//! no scoring and no retry.
use crate::enumerate::{enumerate_string, enumerate_with};
use crate::error::Error;
use crate::imp::{self, DeviceInfo};
use crate::status;

/// Treats the runtime's "nothing found" status as an empty list.
fn empty_on(code: i32, result: Result<usize, imp::Error>) -> Result<usize, imp::Error> {
    match result {
        Err(e) if e.code() == code => Ok(0),
        other => other,
    }
}

///A compute platform (an installed runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform(pub(crate) imp::Platform);

impl Platform {
    /// Every platform, in runtime order.
    pub fn all() -> Result<Vec<Platform>, Error> {
        let platforms = enumerate_with(
            imp::Platform::default(),
            || empty_on(status::CL_PLATFORM_NOT_FOUND_KHR, imp::platform_count()),
            imp::fill_platforms,
        )?;
        Ok(platforms.into_iter().map(Platform).collect())
    }

    pub fn name(&self) -> Result<String, Error> {
        Ok(enumerate_string(
            || self.0.name_size(),
            |buf| self.0.name_fill(buf),
        )?)
    }

    /// GPU-class devices of this platform, in runtime order.
    pub fn gpu_devices(&self) -> Result<Vec<Device>, Error> {
        let devices = enumerate_with(
            imp::Device::default(),
            || empty_on(status::CL_DEVICE_NOT_FOUND, self.0.gpu_device_count()),
            |buf| self.0.fill_gpu_devices(buf),
        )?;
        Ok(devices.into_iter().map(Device).collect())
    }
}

///A GPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device(pub(crate) imp::Device);

impl Device {
    fn info(&self, info: DeviceInfo) -> Result<String, Error> {
        Ok(enumerate_string(
            || self.0.info_size(info),
            |buf| self.0.info_fill(info, buf),
        )?)
    }

    pub fn name(&self) -> Result<String, Error> {
        self.info(DeviceInfo::Name)
    }

    pub fn vendor(&self) -> Result<String, Error> {
        self.info(DeviceInfo::Vendor)
    }

    /// The raw `CL_DEVICE_OPENCL_C_VERSION` string, e.g. `OpenCL C 1.2 `.
    pub fn opencl_c_version(&self) -> Result<String, Error> {
        self.info(DeviceInfo::OpenClCVersion)
    }
}

/// Picks the first GPU device of the first platform.
pub fn select_device() -> Result<(Platform, Device), Error> {
    let platform = *Platform::all()?.first().ok_or(Error::NoPlatform)?;
    let platform_name = platform.name()?;
    let device = *platform
        .gpu_devices()?
        .first()
        .ok_or_else(|| Error::NoDevice {
            platform: platform_name.clone(),
        })?;
    logwise::info_sync!(
        "selected {device} on {platform}",
        device = logwise::privacy::LogIt(&device.name()?),
        platform = logwise::privacy::LogIt(&platform_name)
    );
    Ok((platform, device))
}
