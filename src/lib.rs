// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! kernels_and_images is a bootstrap-and-dispatch harness for GPU compute.

It exists to exercise a compute runtime's resource-sharing paths repeatably, so that
driver defects show up as a failing scenario rather than as a mystery in a larger
application. It does very little, on purpose:

1. pick the first GPU device of the first platform ([`select_device`])
2. create a context, optionally sharing with the current OpenGL context ([`Context`])
3. compile kernel source and surface the whole build log on failure ([`build`])
4. look kernels up by name ([`KernelRegistry`]) and bind arguments by position
   ([`Kernel::set_args`], [`bind_args!`])
5. dispatch on a single in-order queue ([`CommandQueue`])

around two kinds of resource:

| Resource          | Owned by      | Protocol                                  |
|-------------------|---------------|-------------------------------------------|
| [`SharedTexture`] | graphics API  | acquire, use, release, on every use       |
| [`ImageArray`]    | compute       | whole-layer region writes, then sample    |

[`Harness`] bundles the bootstrapped objects, and [`scenarios`] holds the regression
scenarios built on them.

# Backends

With the default `backend_opencl` feature the harness talks to the system OpenCL
runtime. The `backend_software` feature swaps in an in-process software driver instead
(see `software`), which is also the fallback when no backend feature is enabled. It
emulates platforms, the compiler front end, image memory, graphics-shared textures and
selected driver quirks, but it does not execute kernels. Most of the test suite runs on
it, so the harness's own logic is tested without a GPU:

```text
cargo test --no-default-features --features backend_software
```

```
# #[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
# {
use kernels_and_images::{Harness, HarnessConfig, ImageArray, pixel_formats::R32Float};

let harness = Harness::new(HarnessConfig::default()).unwrap();
let image = ImageArray::<R32Float>::create(harness.context(), 4, 4, 2).unwrap();
image.write_region(harness.queue(), 1, 1, 2.0, true).unwrap();
assert_eq!(image.read_texel(harness.queue(), 0, 0, 1).unwrap(), 2.0);
# }
```
*/

mod config;
mod context;
mod entry_point;
mod enumerate;
mod error;
mod graphics;
mod harness;
mod imp;
mod kernel;
pub mod pixel_formats;
mod program;
mod queue;
pub mod resources;
pub mod scenarios;
pub mod status;
#[cfg(all(feature = "backend_opencl", not(feature = "backend_software")))]
mod sys;

pub use config::{
    BuildOptions, ENV_BUILD_OPTIONS, ENV_CL_STD, ENV_INTEROP, HarnessConfig, LanguageVersion,
    parse_opencl_c_version,
};
pub use context::{Context, Interop};
pub use entry_point::{Device, Platform, select_device};
pub use error::{ArgumentError, Error, Violation};
pub use graphics::{GraphicsTexture, InteropHandles, SurfaceHandle, TextureTarget, UnsupportedDisplay};
pub use harness::Harness;
pub use imp::Error as RuntimeError;
pub use kernel::{ArgValue, BoundArg, Kernel, KernelArg, KernelRegistry};
pub use program::build;
pub use queue::{CommandQueue, NdRange};
pub use resources::{Access, Buffer, ImageArray, SharedTexture};

/// The in-process software driver and its graphics stand-in.
#[cfg(any(feature = "backend_software", not(feature = "backend_opencl")))]
pub mod software {
    pub use crate::imp::software::driver::{
        DeviceConfig, DeviceKind, DriverConfig, PlatformConfig, Quirks, install,
    };
    pub use crate::imp::software::gl::{SoftwareGl, SoftwareTexture};
}
