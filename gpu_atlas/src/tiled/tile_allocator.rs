// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size tile allocation over a layered store.

use alloc::vec::Vec;

use crate::geometry::{StoreDimensions, TileCoord};

/// Hands out square tiles of one store.
///
/// Tiles that were never used are handed out in raster order (x, then y,
/// then layer). Freed tiles are reused most-recently-freed first.
#[derive(Debug)]
pub(crate) struct TileAllocator {
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
    layers: u32,
    next: TileCoord,
    free: Vec<TileCoord>,
    allocated: u64,
    #[cfg(debug_assertions)]
    in_use: Vec<bool>,
}

impl TileAllocator {
    pub(crate) fn new(tile_size: u32, dimensions: StoreDimensions) -> Self {
        debug_assert!(tile_size > 0, "tile size must be positive");
        debug_assert!(
            dimensions.width % tile_size == 0 && dimensions.height % tile_size == 0,
            "store {dimensions:?} is not a whole number of {tile_size}px tiles"
        );
        let tiles_x = dimensions.width / tile_size;
        let tiles_y = dimensions.height / tile_size;
        Self {
            tile_size,
            tiles_x,
            tiles_y,
            layers: dimensions.layers,
            next: TileCoord::new(0, 0, 0),
            free: Vec::new(),
            allocated: 0,
            #[cfg(debug_assertions)]
            in_use: alloc::vec![
                false;
                tiles_x as usize * tiles_y as usize * dimensions.layers as usize
            ],
        }
    }

    pub(crate) fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub(crate) fn layers(&self) -> u32 {
        self.layers
    }

    fn tiles_per_layer(&self) -> u64 {
        u64::from(self.tiles_x) * u64::from(self.tiles_y)
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.tiles_per_layer() * u64::from(self.layers)
    }

    pub(crate) fn number_free(&self) -> u64 {
        self.capacity() - self.allocated
    }

    pub(crate) fn allocate(&mut self) -> Option<TileCoord> {
        let tile = match self.free.pop() {
            Some(tile) => tile,
            None => {
                if self.next.layer >= self.layers || self.tiles_per_layer() == 0 {
                    return None;
                }
                let tile = self.next;
                self.next.x += 1;
                if self.next.x == self.tiles_x {
                    self.next.x = 0;
                    self.next.y += 1;
                    if self.next.y == self.tiles_y {
                        self.next.y = 0;
                        self.next.layer += 1;
                    }
                }
                tile
            }
        };

        #[cfg(debug_assertions)]
        {
            let slot = self.slot(tile);
            debug_assert!(!self.in_use[slot], "tile {tile:?} handed out twice");
            self.in_use[slot] = true;
        }

        self.allocated += 1;
        Some(tile)
    }

    pub(crate) fn free(&mut self, tile: TileCoord) {
        #[cfg(debug_assertions)]
        {
            let slot = self.slot(tile);
            debug_assert!(self.in_use[slot], "tile {tile:?} freed twice");
            self.in_use[slot] = false;
        }

        self.allocated = self.allocated.saturating_sub(1);
        self.free.push(tile);
    }

    /// Layer count needed for `count` tiles to be free, if more than now.
    ///
    /// Returns `None` when the current layers already suffice or when the
    /// store holds no whole tile at all.
    pub(crate) fn layers_to_fit(&self, count: u64) -> Option<u32> {
        let free = self.number_free();
        let per_layer = self.tiles_per_layer();
        if count <= free || per_layer == 0 {
            return None;
        }
        let extra = (count - free).div_ceil(per_layer);
        u32::try_from(u64::from(self.layers) + extra).ok()
    }

    /// Appends layers; addresses of existing tiles are unchanged.
    pub(crate) fn grow_to(&mut self, layers: u32) {
        debug_assert!(layers > self.layers, "tile allocator can only grow");
        if layers <= self.layers {
            return;
        }
        self.layers = layers;
        #[cfg(debug_assertions)]
        self.in_use.resize(
            self.tiles_x as usize * self.tiles_y as usize * layers as usize,
            false,
        );
    }

    #[cfg(debug_assertions)]
    fn slot(&self, tile: TileCoord) -> usize {
        let tiles_x = self.tiles_x as usize;
        (tile.layer as usize * self.tiles_y as usize + tile.y as usize) * tiles_x + tile.x as usize
    }
}
