// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared GPU-resident storage for a 2D renderer.
//!
//! A renderer usually owns a handful of large GPU surfaces and needs to hand
//! out pieces of them to many clients. This crate manages that space:
//!
//! - [`RectBinPacker`] and its thread-safe wrapper [`RectAtlas`] pack
//!   arbitrarily sized rectangles into one canvas.
//! - [`TiledAtlas`] stores images as grids of fixed-size color tiles
//!   addressed through a short tree of index tiles, so an image can be far
//!   larger than one tile and still be found with a bounded number of
//!   lookups.
//! - [`ColorStopAtlas`] packs gradient color ramps into rows.
//!
//! The surfaces themselves are reached through the [`BackingStore`] trait,
//! implemented once per graphics backend. [`CpuBackingStore`] keeps the
//! data in memory.
//!
//! GPU work is asynchronous, so space freed by a client may still be read
//! by draw commands already submitted. Every atlas implements
//! [`DelayedReclaim`]: while it is locked, freed space is held back and
//! returned only when the last lock is released.
//!
//! ## Example
//!
//! ```
//! use gpu_atlas::{
//!     CpuBackingStore, DelayedReclaim, Extent, IndexEntry, Rgba8, RgbaSource,
//!     StoreDimensions, TiledAtlas, TiledAtlasConfig,
//! };
//!
//! let config = TiledAtlasConfig {
//!     color_tile_size: 16,
//!     index_tile_size: 8,
//!     max_index_lookups: 2,
//! };
//! let atlas = TiledAtlas::new(
//!     config,
//!     CpuBackingStore::<Rgba8>::new(StoreDimensions::new(128, 128, 1), false),
//!     CpuBackingStore::<IndexEntry>::new(StoreDimensions::new(64, 64, 1), false),
//! );
//!
//! let texels = vec![Rgba8::new(200, 30, 30, 255); 40 * 40];
//! let source = RgbaSource::new(&texels, Extent::new(40, 40)).unwrap();
//! let image = atlas.allocate_image(&source, 0).unwrap();
//! assert_eq!(image.number_index_lookups(), 1);
//!
//! {
//!     let _frame = atlas.lock();
//!     atlas.deallocate(image);
//!     // The tiles stay reserved while the frame is in flight.
//!     assert_eq!(atlas.pending_release_count(), 2);
//! }
//! assert_eq!(atlas.pending_release_count(), 0);
//! ```
//!
//! ## Features
//!
//! - `bytemuck` (enabled by default): Implement `Pod` for [`Rgba8`] and
//!   [`IndexEntry`], so tile payloads can be cast to bytes for upload.

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;
extern crate std;

mod backing_store;
mod color_stop;
mod error;
mod geometry;
#[cfg(feature = "bytemuck")]
mod impl_bytemuck;
mod reclaim;
mod rect_atlas;
mod rect_packer;
mod source;
mod tiled;

pub use backing_store::{BackingStore, CpuBackingStore};
pub use color_stop::{ColorRamp, ColorSpan, ColorStop, ColorStopAtlas, ColorStopSequence};
pub use error::{AllocError, AllocErrorKind};
pub use geometry::{
    Extent, IndexEntry, Padding, Point, Rgba8, StoreDimensions, StoreRegion, TileCoord,
};
pub use reclaim::{DelayedReclaim, OwnedResourceLock, ResourceLock, ResourceReleaseAction};
pub use rect_atlas::RectAtlas;
pub use rect_packer::{PackedRect, RectBinPacker};
pub use source::{ImageSource, RgbaSource};
pub use tiled::{Image, TiledAtlas, TiledAtlasConfig};
