// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiled images with index-tile indirection.
//!
//! A [`TiledAtlas`] stores an image as a grid of equally sized color tiles,
//! which need not be adjacent in the store. To find the color tile for an
//! image location, a shader walks down a small tree of index tiles: each
//! index tile is a square of [`IndexEntry`](crate::IndexEntry) records that
//! address the tiles one level below. With color tiles of side `C` and
//! index tiles of side `I`, an image reached through `L` lookups can be up
//! to `C * I^L` texels on a side.
//!
//! An image that fits in a single color tile needs no index tile at all;
//! its master tile is that color tile.

mod atlas;
mod image;
mod tile_allocator;

pub use atlas::{TiledAtlas, TiledAtlasConfig};
pub use image::Image;
