// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Topology and behavior of the software driver.
//!
//! Each thread sees its own driver configuration. Tests install the platforms, devices
//! and quirks they need with [`install`] before bootstrapping a harness; everything
//! created afterwards snapshots the configuration that was current at creation.

use std::cell::RefCell;
use std::sync::Arc;

/// Device class reported by the software driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Accelerator,
}

/// One emulated device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub vendor: String,
    pub kind: DeviceKind,
    /// Highest `-cl-std` the compiler accepts, as (major, minor).
    pub opencl_c_version: (u8, u8),
    pub max_work_group_size: usize,
}

impl DeviceConfig {
    pub fn gpu(name: impl Into<String>) -> Self {
        DeviceConfig {
            name: name.into(),
            vendor: "kernels_and_images".to_string(),
            kind: DeviceKind::Gpu,
            opencl_c_version: (3, 0),
            max_work_group_size: 256,
        }
    }

    pub fn cpu(name: impl Into<String>) -> Self {
        DeviceConfig {
            kind: DeviceKind::Cpu,
            max_work_group_size: 1024,
            ..DeviceConfig::gpu(name)
        }
    }

    pub fn with_opencl_c_version(mut self, major: u8, minor: u8) -> Self {
        self.opencl_c_version = (major, minor);
        self
    }

    /// The `CL_DEVICE_OPENCL_C_VERSION` string.
    pub(crate) fn version_string(&self) -> String {
        format!(
            "OpenCL C {}.{} software",
            self.opencl_c_version.0, self.opencl_c_version.1
        )
    }
}

/// One emulated platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub name: String,
    pub devices: Vec<DeviceConfig>,
}

impl PlatformConfig {
    pub fn new(name: impl Into<String>, devices: Vec<DeviceConfig>) -> Self {
        PlatformConfig {
            name: name.into(),
            devices,
        }
    }
}

/// Driver defects the software driver can be asked to reproduce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// Image writes whose origin is on a layer other than 0 land on layer 0.
    pub layer_writes_alias_first_layer: bool,
    /// A failed build reports `CL_BUILD_NONE` instead of `CL_BUILD_ERROR`.
    pub failed_build_reports_none: bool,
}

/// Everything the software driver reports.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub platforms: Vec<PlatformConfig>,
    pub quirks: Quirks,
}

impl Default for DriverConfig {
    /// One platform with one GPU.
    fn default() -> Self {
        DriverConfig {
            platforms: vec![PlatformConfig::new(
                "Software Platform",
                vec![DeviceConfig::gpu("Software GPU")],
            )],
            quirks: Quirks::default(),
        }
    }
}

impl DriverConfig {
    /// A driver with no platforms at all.
    pub fn empty() -> Self {
        DriverConfig {
            platforms: Vec::new(),
            quirks: Quirks::default(),
        }
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }
}

thread_local! {
    static CONFIG: RefCell<Arc<DriverConfig>> = RefCell::new(Arc::new(DriverConfig::default()));
}

/// Replaces the calling thread's driver configuration.
pub fn install(config: DriverConfig) {
    logwise::trace_sync!(
        "software driver: installing {platforms} platform(s)",
        platforms = config.platforms.len()
    );
    CONFIG.with(|c| *c.borrow_mut() = Arc::new(config));
}

pub(crate) fn current() -> Arc<DriverConfig> {
    CONFIG.with(|c| c.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_per_thread() {
        install(DriverConfig::empty());
        assert!(current().platforms.is_empty());
        std::thread::spawn(|| assert_eq!(current().platforms.len(), 1))
            .join()
            .unwrap();
    }

    #[test]
    fn version_string_is_parseable() {
        let d = DeviceConfig::gpu("x").with_opencl_c_version(1, 2);
        assert_eq!(d.version_string(), "OpenCL C 1.2 software");
    }
}
