#![cfg(feature = "backend_software")]
//! Whole-layer region writes into 2D image arrays.

use kernels_and_images::pixel_formats::{R8UNorm, R32Float};
use kernels_and_images::scenarios::{self, IMAGE_ARRAY_SIZE};
use kernels_and_images::software::{DriverConfig, Quirks, install};
use kernels_and_images::{Error, Harness, HarnessConfig, ImageArray, status};

fn harness_with(quirks: Quirks) -> Harness {
    install(DriverConfig::default().with_quirks(quirks));
    Harness::new(HarnessConfig::default()).unwrap()
}

fn harness() -> Harness {
    harness_with(Quirks::default())
}

fn aliasing() -> Quirks {
    Quirks {
        layer_writes_alias_first_layer: true,
        ..Quirks::default()
    }
}

#[test]
fn region_writes_fill_whole_layers() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R32Float>::create(harness.context(), 4, 3, 3).unwrap();
    assert!(!image.is_populated());
    image.write_region(queue, 0, 1, 1.0, true).unwrap();
    image.write_region(queue, 1, 2, 5.0, true).unwrap();
    assert!(image.is_populated());

    assert_eq!(image.read_layer(queue, 0).unwrap(), vec![1.0; 12]);
    assert_eq!(image.read_layer(queue, 1).unwrap(), vec![5.0; 12]);
    assert_eq!(image.read_texel(queue, 3, 2, 2).unwrap(), 5.0);
}

#[test]
fn one_write_many_values() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R32Float>::create(harness.context(), 2, 2, 4).unwrap();
    image.write_layers(queue, 1, &[7.0, 8.0], true).unwrap();
    let firsts: Vec<f32> = (0..4)
        .map(|layer| image.read_texel(queue, 1, 1, layer).unwrap())
        .collect();
    assert_eq!(firsts, vec![0.0, 7.0, 8.0, 0.0]);
}

#[test]
fn regions_must_fit() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R32Float>::create(harness.context(), 2, 2, 2).unwrap();
    let err = image.write_region(queue, 1, 2, 1.0, true).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidRegion {
            layer_start: 1,
            layer_count: 2,
            layers: 2
        }
    ));
    let err = image.write_region(queue, 0, 0, 1.0, true).unwrap_err();
    assert!(matches!(err, Error::InvalidRegion { layer_count: 0, .. }));
    assert!(matches!(
        image.read_layer(queue, 2),
        Err(Error::InvalidRegion { .. })
    ));
    assert!(!image.is_populated());
}

#[test]
fn oversized_regions_are_rejected_before_allocating() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R32Float>::create(harness.context(), 1024, 1024, 2).unwrap();
    let err = image.write_region(queue, 0, u32::MAX, 1.0, true).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidRegion {
            layer_start: 0,
            layer_count: u32::MAX,
            layers: 2
        }
    ));
    let err = image
        .write_layers(queue, 1, &[1.0, 2.0, 3.0], true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidRegion {
            layer_start: 1,
            layer_count: 3,
            layers: 2
        }
    ));
    assert!(!image.is_populated());
}

#[test]
fn zero_layers_is_a_creation_error() {
    let harness = harness();
    let err = ImageArray::<R32Float>::create(harness.context(), 4, 4, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceCreation {
            resource: "image array",
            code: status::CL_INVALID_IMAGE_SIZE
        }
    ));
}

#[test]
fn non_blocking_writes_are_staged_until_finish() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R32Float>::create(harness.context(), 2, 2, 2).unwrap();
    image.write_region(queue, 0, 1, 1.0, false).unwrap();
    image.write_region(queue, 1, 1, 2.0, false).unwrap();
    assert_eq!(queue.staged_writes(), 2);
    queue.finish().unwrap();
    assert_eq!(queue.staged_writes(), 0);
    assert_eq!(image.read_texel(queue, 0, 0, 1).unwrap(), 2.0);
}

#[test]
fn scenario_reads_back_second_layer() {
    let harness = harness();
    let report = scenarios::image_array(&harness).unwrap();
    assert_eq!(report.expected, 2.0);
    assert_eq!(report.readback, 2.0);
    assert!(report.readback_matches());
    //no kernel ran, so the result buffer still holds its initial value
    assert!(report.sampled.is_nan());
    assert!(!report.passed());
}

#[test]
fn scenario_exposes_aliasing() {
    let harness = harness_with(aliasing());
    let report = scenarios::image_array(&harness).unwrap();
    assert_eq!(report.readback, 0.0);
    assert!(!report.readback_matches());
}

#[test]
fn split_and_combined_writes_agree() {
    let harness = harness();
    let report =
        scenarios::region_write_equivalence(&harness, IMAGE_ARRAY_SIZE, IMAGE_ARRAY_SIZE, &[1.0, 2.0])
            .unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert!(!report.first_layer_aliased());
    assert_eq!(report.split, vec![Some(1.0), Some(2.0)]);
}

#[test]
fn aliased_writes_land_on_first_layer() {
    let harness = harness_with(aliasing());
    let report = scenarios::region_write_equivalence(&harness, 8, 8, &[1.0, 2.0]).unwrap();
    assert!(!report.is_consistent());
    assert!(report.first_layer_aliased());
    assert_eq!(report.split, vec![Some(2.0), Some(0.0)]);
    //a single write starting at layer 0 is unaffected
    assert_eq!(report.combined, vec![Some(1.0), Some(2.0)]);
}

#[test]
fn equal_layer_values_are_consistent() {
    let harness = harness();
    let report = scenarios::region_write_equivalence(&harness, 4, 4, &[2.0, 2.0]).unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert!(!report.first_layer_aliased());
}

#[test]
fn layer_dumps_as_png() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R8UNorm>::create(harness.context(), 4, 4, 2).unwrap();
    image.write_region(queue, 1, 1, 200, true).unwrap();

    let path = std::env::temp_dir().join(format!(
        "kernels_and_images_layer_dump_{}.png",
        std::process::id()
    ));
    image.write_layer_png(queue, 1, &path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn dump_to_missing_directory_fails() {
    let harness = harness();
    let queue = harness.queue();
    let image = ImageArray::<R8UNorm>::create(harness.context(), 2, 2, 1).unwrap();
    let path = std::env::temp_dir()
        .join("kernels_and_images_no_such_dir")
        .join("layer.png");
    let err = image.write_layer_png(queue, 0, &path).unwrap_err();
    match err {
        Error::Dump { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected Dump, got {other:?}"),
    }
}
