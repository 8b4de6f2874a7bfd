// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Various helper functions to assert truths during testing.

use std::collections::HashSet;

use gpu_atlas::{Extent, Image, PackedRect, TileCoord};

/// Assert that no tile is held by two of the images, and that no image
/// holds a tile twice.
pub(crate) fn assert_tiles_disjoint(images: &[&Image], case: &str) {
    let mut color: HashSet<TileCoord> = HashSet::new();
    let mut index: HashSet<TileCoord> = HashSet::new();
    for (i, image) in images.iter().enumerate() {
        for tile in image.color_tiles() {
            assert!(
                color.insert(*tile),
                "color tile {tile:?} of image {i} is shared with {case}"
            );
        }
        for tile in image.index_tiles() {
            assert!(
                index.insert(*tile),
                "index tile {tile:?} of image {i} is shared with {case}"
            );
        }
    }
}

/// Assert that the rectangles lie inside `canvas` and do not overlap.
pub(crate) fn assert_rects_disjoint(rects: &[PackedRect], canvas: Extent, case: &str) {
    for (i, a) in rects.iter().enumerate() {
        let right = u64::from(a.min().x) + u64::from(a.size().width);
        let bottom = u64::from(a.min().y) + u64::from(a.size().height);
        assert!(
            right <= u64::from(canvas.width) && bottom <= u64::from(canvas.height),
            "rect {i} {a:?} leaves the canvas with {case}"
        );
        for (j, b) in rects.iter().enumerate().skip(i + 1) {
            assert!(!a.intersects(b), "rects {i} and {j} overlap with {case}");
        }
    }
}
