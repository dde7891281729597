// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The bootstrapped harness.

use crate::config::{BuildOptions, HarnessConfig};
use crate::context::{Context, Interop};
use crate::entry_point::{Device, Platform, select_device};
use crate::error::Error;
use crate::kernel::KernelRegistry;
use crate::queue::CommandQueue;

/// Platform, device, context and queue, created once and passed explicitly.
///
/// ```
/// # #[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
/// # {
/// use kernels_and_images::{Harness, HarnessConfig};
///
/// let harness = Harness::new(HarnessConfig::default()).unwrap();
/// let kernels = harness.build("__kernel void noop(int x) {}").unwrap();
/// assert_eq!(kernels.names().collect::<Vec<_>>(), vec!["noop"]);
/// # }
/// ```
#[derive(Debug)]
pub struct Harness {
    //drop order matters: the queue goes before its context
    queue: CommandQueue,
    context: Context,
    platform: Platform,
    device: Device,
    config: HarnessConfig,
}

impl Harness {
    /// Selects a device and creates the context and queue.
    ///
    /// With `config.interop` the context shares with the graphics context current on
    /// the calling thread.
    pub fn new(config: HarnessConfig) -> Result<Self, Error> {
        let interop = if config.interop {
            Interop::CurrentContext
        } else {
            Interop::Disabled
        };
        Self::with_interop(config, interop)
    }

    /// Like [`Harness::new`], with interop handles chosen by the caller.
    pub fn with_interop(config: HarnessConfig, interop: Interop) -> Result<Self, Error> {
        let (platform, device) = select_device()?;
        let context = Context::new(&platform, &device, interop)?;
        let queue = CommandQueue::new(&context, &device)?;
        Ok(Harness {
            queue,
            context,
            platform,
            device,
            config,
        })
    }

    /// [`Harness::new`] with [`HarnessConfig::from_env_or_default`].
    pub fn from_env_or_default() -> Result<Self, Error> {
        Self::new(HarnessConfig::from_env_or_default())
    }

    /// Compiles `source` with the configured build options.
    pub fn build(&self, source: &str) -> Result<KernelRegistry, Error> {
        self.build_with(source, &self.config.build)
    }

    pub fn build_with(&self, source: &str, options: &BuildOptions) -> Result<KernelRegistry, Error> {
        crate::program::build(&self.context, &self.device, source, options)
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }
}
