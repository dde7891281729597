#![cfg(feature = "backend_software")]
//! The acquire/use/release protocol for graphics-owned textures.

use kernels_and_images::pixel_formats::{RGBA8UNorm, Unorm4};
use kernels_and_images::scenarios::{self, KERNEL_NAME, SHARED_TEXTURE_SIZE, SHARED_TEXTURE_SOURCE};
use kernels_and_images::software::{DriverConfig, SoftwareGl, SoftwareTexture, install};
use kernels_and_images::{
    Access, ArgumentError, Buffer, Error, Harness, HarnessConfig, NdRange, SharedTexture,
    Violation, bind_args, status,
};

const WHITE: Unorm4 = Unorm4 {
    r: 255,
    g: 255,
    b: 255,
    a: 255,
};

fn interop_harness(gl: &SoftwareGl) -> Harness {
    install(DriverConfig::default());
    gl.make_current();
    Harness::new(HarnessConfig {
        interop: true,
        ..HarnessConfig::default()
    })
    .unwrap()
}

fn white_texture(gl: &SoftwareGl, size: u32) -> SoftwareTexture<RGBA8UNorm> {
    let texture = gl.create_texture_2d::<RGBA8UNorm>(size, size, WHITE);
    texture.generate_mipmaps();
    texture
}

#[test]
fn acquire_then_read() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, SHARED_TEXTURE_SIZE);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    assert_eq!(shared.state(), Access::Unshared);
    assert_eq!(shared.width(), SHARED_TEXTURE_SIZE);

    shared.acquire(harness.queue()).unwrap();
    assert_eq!(shared.state(), Access::Acquired);
    assert_eq!(shared.read_texel(harness.queue(), 0, 0).unwrap(), WHITE);
    shared.release(harness.queue()).unwrap();
    assert_eq!(shared.state(), Access::Unshared);
    harness.queue().finish().unwrap();
}

#[test]
fn mip_levels_are_reduced() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 8);
    let level = SharedTexture::<RGBA8UNorm>::wrap_level(harness.context(), &texture, 2).unwrap();
    assert_eq!((level.width(), level.height()), (2, 2));
    level.acquire(harness.queue()).unwrap();
    assert_eq!(level.read_all(harness.queue()).unwrap(), vec![WHITE; 4]);
    level.release(harness.queue()).unwrap();
}

#[test]
fn graphics_writes_are_visible_after_acquire() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    let black = Unorm4 {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };
    texture.fill_level(0, black);
    shared.acquire(harness.queue()).unwrap();
    assert_eq!(shared.read_texel(harness.queue(), 3, 3).unwrap(), black);
    shared.release(harness.queue()).unwrap();
    assert_eq!(texture.read_level(0), vec![black; 16]);
}

#[test]
fn double_acquire_is_a_violation() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    shared.acquire(harness.queue()).unwrap();
    let err = shared.acquire(harness.queue()).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation {
            violation: Violation::AlreadyAcquired,
            ..
        }
    ));
    //the failed acquire must not disturb the held one
    assert_eq!(shared.state(), Access::Acquired);
    shared.release(harness.queue()).unwrap();
}

#[test]
fn release_while_unshared_is_a_violation() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    let err = shared.release(harness.queue()).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation {
            violation: Violation::NotAcquired,
            ..
        }
    ));
}

#[test]
fn read_while_unshared_is_a_violation() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    let err = shared.read_texel(harness.queue(), 0, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation {
            violation: Violation::ReadWhileUnshared,
            ..
        }
    ));
}

#[test]
fn dispatch_while_unshared_is_a_violation() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    let out = Buffer::<f32>::new(harness.context(), 1).unwrap();
    let mut kernel = harness
        .build(SHARED_TEXTURE_SOURCE)
        .unwrap()
        .into_kernel(KERNEL_NAME)
        .unwrap();
    bind_args!(kernel, shared, out).unwrap();
    assert!(kernel.bound().next().unwrap().is_shared());

    let err = harness.queue().dispatch(&kernel, &NdRange::one(1, 1)).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation {
            violation: Violation::DispatchWhileUnshared { slot: 0 },
            ..
        }
    ));

    shared.acquire(harness.queue()).unwrap();
    harness.queue().dispatch(&kernel, &NdRange::one(1, 1)).unwrap();
    shared.release(harness.queue()).unwrap();
    harness.queue().finish().unwrap();
}

#[test]
fn wrapping_requires_interop_context() {
    let gl = SoftwareGl::new();
    install(DriverConfig::default());
    let harness = Harness::new(HarnessConfig::default()).unwrap();
    let texture = white_texture(&gl, 4);
    let err = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceCreation {
            resource: "shared texture",
            code: status::CL_INVALID_CONTEXT
        }
    ));
}

#[test]
fn wrapping_a_missing_level_fails() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = gl.create_texture_2d::<RGBA8UNorm>(4, 4, WHITE);
    let err = SharedTexture::<RGBA8UNorm>::wrap_level(harness.context(), &texture, 1).unwrap_err();
    assert_eq!(err.native_code(), Some(status::CL_INVALID_MIP_LEVEL));
}

#[test]
fn acquired_texture_does_not_excuse_unbound_slots() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, 4);
    let shared = SharedTexture::<RGBA8UNorm>::wrap(harness.context(), &texture).unwrap();
    let mut kernel = harness
        .build(SHARED_TEXTURE_SOURCE)
        .unwrap()
        .into_kernel(KERNEL_NAME)
        .unwrap();
    kernel.set_arg(0, &shared).unwrap();
    shared.acquire(harness.queue()).unwrap();
    let err = harness.queue().dispatch(&kernel, &NdRange::one(1, 1)).unwrap_err();
    assert!(matches!(
        err,
        Error::Argument {
            error: ArgumentError::Unbound { slot: 1 },
            ..
        }
    ));
    shared.release(harness.queue()).unwrap();
}

#[test]
fn scenario_reads_back_white() {
    let gl = SoftwareGl::new();
    let harness = interop_harness(&gl);
    let texture = white_texture(&gl, SHARED_TEXTURE_SIZE);
    let report = scenarios::shared_texture::<RGBA8UNorm, _>(&harness, &texture).unwrap();
    assert_eq!(report.expected, 1.0);
    assert!(report.readback_matches(), "{report:?}");
    //the software driver does not run kernels
    assert!(report.sampled.is_nan());
}
