#![cfg(feature = "backend_software")]
//! Platform selection and context creation against the software driver.

use kernels_and_images::software::{
    DeviceConfig, DriverConfig, PlatformConfig, Quirks, SoftwareGl, install,
};
use kernels_and_images::status;
use kernels_and_images::{
    Context, Error, Harness, HarnessConfig, Interop, InteropHandles, Platform, SurfaceHandle,
    select_device,
};

#[test]
fn selects_first_gpu_of_first_platform() {
    install(DriverConfig {
        platforms: vec![
            PlatformConfig::new(
                "First",
                vec![DeviceConfig::cpu("cpu0"), DeviceConfig::gpu("gpu0"), DeviceConfig::gpu("gpu1")],
            ),
            PlatformConfig::new("Second", vec![DeviceConfig::gpu("other")]),
        ],
        quirks: Quirks::default(),
    });
    let (platform, device) = select_device().unwrap();
    assert_eq!(platform.name().unwrap(), "First");
    assert_eq!(device.name().unwrap(), "gpu0");
    assert_eq!(Platform::all().unwrap().len(), 2);
    assert_eq!(platform.gpu_devices().unwrap().len(), 2);
}

#[test]
fn no_platform() {
    install(DriverConfig::empty());
    assert!(matches!(select_device(), Err(Error::NoPlatform)));
    assert!(Platform::all().unwrap().is_empty());
}

#[test]
fn no_gpu_device() {
    install(DriverConfig {
        platforms: vec![PlatformConfig::new("CPU only", vec![DeviceConfig::cpu("c")])],
        quirks: Quirks::default(),
    });
    match select_device() {
        Err(Error::NoDevice { platform }) => assert_eq!(platform, "CPU only"),
        other => panic!("expected NoDevice, got {other:?}"),
    }
}

#[test]
fn device_strings() {
    install(DriverConfig {
        platforms: vec![PlatformConfig::new(
            "P",
            vec![DeviceConfig::gpu("G").with_opencl_c_version(1, 2)],
        )],
        quirks: Quirks::default(),
    });
    let (_, device) = select_device().unwrap();
    assert_eq!(device.vendor().unwrap(), "kernels_and_images");
    assert_eq!(
        kernels_and_images::parse_opencl_c_version(&device.opencl_c_version().unwrap()),
        Some((1, 2))
    );
}

#[test]
fn plain_context_is_not_interop() {
    install(DriverConfig::default());
    let (platform, device) = select_device().unwrap();
    let context = Context::create(&platform, &device, false).unwrap();
    assert!(!context.is_interop());
    assert!(context.interop_handles().is_none());
}

#[test]
fn interop_without_current_graphics_context_fails() {
    install(DriverConfig::default());
    SoftwareGl::clear_current();
    let (platform, device) = select_device().unwrap();
    let err = Context::create(&platform, &device, true).unwrap_err();
    assert!(matches!(
        err,
        Error::ContextCreation {
            code: status::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR
        }
    ));
}

#[test]
fn interop_uses_current_graphics_context() {
    install(DriverConfig::default());
    let gl = SoftwareGl::new();
    gl.make_current();
    let (platform, device) = select_device().unwrap();
    let context = Context::create(&platform, &device, true).unwrap();
    assert!(context.is_interop());
    assert_eq!(context.interop_handles().unwrap().gl_context, gl.handle());
    assert_eq!(InteropHandles::current().unwrap().gl_context, gl.handle());
}

#[test]
fn explicit_handles_must_name_a_live_context() {
    install(DriverConfig::default());
    let (platform, device) = select_device().unwrap();
    let stale = InteropHandles {
        gl_context: 0xdead,
        surface: SurfaceHandle::Headless,
    };
    let err = Context::new(&platform, &device, Interop::Explicit(stale)).unwrap_err();
    assert_eq!(
        err.native_code(),
        Some(status::CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR)
    );

    let gl = SoftwareGl::new();
    let live = InteropHandles {
        gl_context: gl.handle(),
        surface: SurfaceHandle::Headless,
    };
    assert!(Context::new(&platform, &device, Interop::Explicit(live)).unwrap().is_interop());
}

#[test]
fn harness_bundles_everything() {
    install(DriverConfig::default());
    let harness = Harness::new(HarnessConfig::default()).unwrap();
    assert_eq!(harness.device().name().unwrap(), "Software GPU");
    assert_eq!(harness.context().device(), harness.device());
    assert!(!harness.context().is_interop());
    harness.queue().finish().unwrap();
}
