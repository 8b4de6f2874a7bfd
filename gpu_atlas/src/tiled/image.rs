// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::error::{AllocError, AllocErrorKind};
use crate::geometry::{divide_up, Extent, TileCoord};

use super::TiledAtlasConfig;

/// An image living in a [`TiledAtlas`](super::TiledAtlas).
///
/// The image is split into a grid of color tiles. Unless the whole image
/// fits in one color tile, a tree of index tiles is built on top of the
/// grid, and a shader reaches the color data from
/// [`master_index_tile`](Self::master_index_tile) by performing
/// [`number_index_lookups`](Self::number_index_lookups) chained lookups.
///
/// Space is only returned by passing the image to
/// [`TiledAtlas::deallocate`](super::TiledAtlas::deallocate).
#[must_use = "an image holds atlas space until it is deallocated"]
#[derive(Debug)]
pub struct Image {
    pub(super) atlas_id: u64,
    pub(super) dimensions: Extent,
    pub(super) slack: u32,
    pub(super) color_grid: Extent,
    pub(super) master_index_tile: TileCoord,
    pub(super) number_index_lookups: u32,
    pub(super) master_index_tile_dims: (f32, f32),
    pub(super) dimensions_index_divisor: f32,
    /// Every distinct color tile, shared constant-color tiles included once.
    pub(super) color_tiles: Vec<TileCoord>,
    /// Index tiles, level by level from the one pointing at color tiles.
    pub(super) index_tiles: Vec<TileCoord>,
}

impl Image {
    /// Size of the image in texels.
    pub fn dimensions(&self) -> Extent {
        self.dimensions
    }

    /// Texels of border replicated around each color tile's interior.
    pub fn slack(&self) -> u32 {
        self.slack
    }

    /// Number of color tiles along each axis.
    pub fn color_tile_grid(&self) -> Extent {
        self.color_grid
    }

    /// Root of the indirection chain.
    ///
    /// This is a color tile if [`number_index_lookups`](Self::number_index_lookups)
    /// is zero and an index tile otherwise.
    pub fn master_index_tile(&self) -> TileCoord {
        self.master_index_tile
    }

    /// Number of index lookups needed to reach color data.
    pub fn number_index_lookups(&self) -> u32 {
        self.number_index_lookups
    }

    /// Size of the image in units of the region covered by the master tile.
    pub fn master_index_tile_dims(&self) -> (f32, f32) {
        self.master_index_tile_dims
    }

    /// Divisor taking an image coordinate to a master tile coordinate.
    pub fn dimensions_index_divisor(&self) -> f32 {
        self.dimensions_index_divisor
    }

    /// Distinct color tiles held by the image.
    pub fn color_tiles(&self) -> &[TileCoord] {
        &self.color_tiles
    }

    /// Index tiles held by the image, lowest level first.
    pub fn index_tiles(&self) -> &[TileCoord] {
        &self.index_tiles
    }
}

/// How an image of a given size is cut into tiles.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ImageLayout {
    /// Texels of image data per color tile side.
    pub(crate) interior: u32,
    pub(crate) color_grid: Extent,
    /// Grid of index tiles at each level, lowest level first.
    pub(crate) index_levels: SmallVec<[Extent; 4]>,
}

impl ImageLayout {
    pub(crate) fn new(
        dimensions: Extent,
        slack: u32,
        config: &TiledAtlasConfig,
    ) -> Result<Self, AllocError> {
        let (width, height) = (dimensions.width, dimensions.height);
        let interior = slack
            .checked_mul(2)
            .and_then(|border| config.color_tile_size.checked_sub(border))
            .filter(|&interior| interior > 0)
            .ok_or(AllocError::new(AllocErrorKind::TileSizeTooSmall, width, height))?;

        let color_grid = Extent::new(divide_up(width, interior), divide_up(height, interior));
        let mut index_levels = SmallVec::new();
        let mut grid = color_grid;
        while grid.width > 1 || grid.height > 1 {
            if index_levels.len() >= config.max_index_lookups as usize {
                log::warn!(
                    "{width}x{height} image needs more than {} index lookups",
                    config.max_index_lookups
                );
                return Err(AllocError::new(
                    AllocErrorKind::ExceedsAddressableExtent,
                    width,
                    height,
                ));
            }
            grid = Extent::new(
                divide_up(grid.width, config.index_tile_size),
                divide_up(grid.height, config.index_tile_size),
            );
            index_levels.push(grid);
        }

        Ok(Self {
            interior,
            color_grid,
            index_levels,
        })
    }

    pub(crate) fn number_index_lookups(&self) -> u32 {
        u32::try_from(self.index_levels.len()).unwrap_or(u32::MAX)
    }

    /// Color tiles needed if no tile turns out to be a shared constant color.
    pub(crate) fn color_tile_count(&self) -> u64 {
        self.color_grid.area()
    }

    pub(crate) fn index_tile_count(&self) -> u64 {
        self.index_levels.iter().map(|level| level.area()).sum()
    }
}

/// Fills an index tile of side `tile_size` from the `(x0, y0)` block of a
/// row-major `children` grid, clamping entries past the grid edge.
pub(crate) fn gather_index_block<T: Copy>(
    children: &[T],
    grid: Extent,
    x0: u32,
    y0: u32,
    tile_size: u32,
    out: &mut Vec<T>,
) {
    out.clear();
    for dy in 0..tile_size {
        let y = (y0 + dy).min(grid.height - 1);
        for dx in 0..tile_size {
            let x = (x0 + dx).min(grid.width - 1);
            out.push(children[(y * grid.width + x) as usize]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(color: u32, index: u32, lookups: u32) -> TiledAtlasConfig {
        TiledAtlasConfig {
            color_tile_size: color,
            index_tile_size: index,
            max_index_lookups: lookups,
        }
    }

    #[test]
    fn single_tile_needs_no_lookup() {
        let layout = ImageLayout::new(Extent::new(16, 10), 0, &config(16, 16, 4)).unwrap();
        assert_eq!(layout.color_grid, Extent::new(1, 1));
        assert_eq!(layout.number_index_lookups(), 0);
        assert_eq!(layout.index_tile_count(), 0);
    }

    #[test]
    fn levels_shrink_by_index_tile_size() {
        // 100 x 3 color tiles -> 25 x 1 -> 7 x 1 -> 2 x 1 -> 1 x 1.
        let layout = ImageLayout::new(Extent::new(800, 24), 0, &config(8, 4, 4)).unwrap();
        assert_eq!(layout.color_grid, Extent::new(100, 3));
        assert_eq!(layout.number_index_lookups(), 4);
        assert_eq!(layout.index_tile_count(), 25 + 7 + 2 + 1);
    }

    #[test]
    fn slack_shrinks_the_interior() {
        let layout = ImageLayout::new(Extent::new(30, 30), 1, &config(16, 16, 4)).unwrap();
        assert_eq!(layout.interior, 14);
        assert_eq!(layout.color_grid, Extent::new(3, 3));

        let err = ImageLayout::new(Extent::new(30, 30), 8, &config(16, 16, 4)).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::TileSizeTooSmall);
    }

    #[test]
    fn lookups_are_bounded() {
        // One lookup reaches 8 * 4 = 32 texels.
        assert!(ImageLayout::new(Extent::new(32, 32), 0, &config(8, 4, 1)).is_ok());
        let err = ImageLayout::new(Extent::new(33, 8), 0, &config(8, 4, 1)).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::ExceedsAddressableExtent);
    }

    #[test]
    fn index_blocks_clamp_to_the_edge() {
        let children = [1, 2, 3, 4, 5, 6];
        let mut out = Vec::new();
        gather_index_block(&children, Extent::new(3, 2), 2, 0, 2, &mut out);
        assert_eq!(out, [3, 3, 6, 6]);
    }
}
