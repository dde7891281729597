// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! GPU-resident resources.

Two kinds of resource are exercised by the harness:

* [`SharedTexture`] wraps a texture owned by the graphics API. Compute may only touch it
  between [`SharedTexture::acquire`] and [`SharedTexture::release`].
* [`ImageArray`] is a compute-native 2D image with several layers, written one region
  of layers at a time.

[`Buffer`] is a plain device buffer, typically where a kernel stores what it observed.
*/

pub mod buffer;
pub mod image_array;
pub(crate) mod ownership;
pub mod shared_texture;

pub use buffer::Buffer;
pub use image_array::ImageArray;
pub use ownership::Access;
pub use shared_texture::SharedTexture;
