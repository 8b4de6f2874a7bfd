// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use crate::backing_store::{can_grow_to, BackingStore};
use crate::error::{AllocError, AllocErrorKind};
use crate::geometry::{Extent, IndexEntry, Rgba8, StoreDimensions, TileCoord};
use crate::reclaim::{run_actions, DelayedReclaim, Reclamation, ResourceReleaseAction};
use crate::source::ImageSource;

use super::image::{gather_index_block, Image, ImageLayout};
use super::tile_allocator::TileAllocator;

static NEXT_ATLAS_ID: AtomicU64 = AtomicU64::new(0);

/// Tile geometry of a [`TiledAtlas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TiledAtlasConfig {
    /// Side of a color tile, in texels.
    pub color_tile_size: u32,
    /// Side of an index tile, in entries. Must be at least 2.
    pub index_tile_size: u32,
    /// Longest indirection chain an image may need.
    pub max_index_lookups: u32,
}

impl Default for TiledAtlasConfig {
    fn default() -> Self {
        Self {
            color_tile_size: 32,
            index_tile_size: 16,
            max_index_lookups: 4,
        }
    }
}

impl TiledAtlasConfig {
    /// Largest image side reachable through `lookups` index lookups with
    /// the given slack, saturating at `u32::MAX`.
    pub fn addressable_extent(&self, lookups: u32, slack: u32) -> u32 {
        let interior = self.color_tile_size.saturating_sub(slack.saturating_mul(2));
        let mut extent = u64::from(interior);
        for _ in 0..lookups {
            extent = extent.saturating_mul(u64::from(self.index_tile_size));
        }
        u32::try_from(extent).unwrap_or(u32::MAX)
    }
}

#[derive(Clone, Copy, Debug)]
enum PendingTile {
    Color(TileCoord),
    Index(TileCoord),
}

struct State<C, I> {
    color_store: C,
    index_store: I,
    color_tiles: TileAllocator,
    index_tiles: TileAllocator,
    reclaim: Reclamation<PendingTile>,
}

impl<C, I> State<C, I> {
    fn release(&mut self, tile: PendingTile) {
        match tile {
            PendingTile::Color(tile) => self.color_tiles.free(tile),
            PendingTile::Index(tile) => self.index_tiles.free(tile),
        }
    }

    fn free_now_or_later(&mut self, tile: PendingTile) {
        if let Some(tile) = self.reclaim.defer(tile) {
            self.release(tile);
        }
    }
}

/// Tiles collected while an image is being built, returned on failure.
#[derive(Default)]
struct Placement {
    grid: Vec<TileCoord>,
    color_tiles: Vec<TileCoord>,
    index_tiles: Vec<TileCoord>,
}

/// Images cut into fixed-size tiles spread over two backing stores.
///
/// The color store holds texel payloads in `color_tile_size` squares; the
/// index store holds [`IndexEntry`] records in `index_tile_size` squares.
/// Every public operation takes the atlas's internal mutex, so a
/// `TiledAtlas` can be shared between threads.
pub struct TiledAtlas<C, I> {
    id: u64,
    config: TiledAtlasConfig,
    state: Mutex<State<C, I>>,
}

impl<C, I> TiledAtlas<C, I>
where
    C: BackingStore<Element = Rgba8>,
    I: BackingStore<Element = IndexEntry>,
{
    /// Creates an atlas over the two stores.
    ///
    /// Each store's width and height must be a multiple of its tile size.
    pub fn new(config: TiledAtlasConfig, color_store: C, index_store: I) -> Self {
        assert!(config.color_tile_size > 0, "color tiles must be non-empty");
        assert!(
            config.index_tile_size >= 2,
            "index tiles must hold at least 2x2 entries"
        );
        let color_tiles = TileAllocator::new(config.color_tile_size, color_store.dimensions());
        let index_tiles = TileAllocator::new(config.index_tile_size, index_store.dimensions());
        Self {
            id: NEXT_ATLAS_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state: Mutex::new(State {
                color_store,
                index_store,
                color_tiles,
                index_tiles,
                reclaim: Reclamation::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<C, I>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tile geometry of the atlas.
    pub fn config(&self) -> TiledAtlasConfig {
        self.config
    }

    /// Places `source` in the atlas with `slack` texels of replicated
    /// border around every color tile.
    ///
    /// Fails if the source is empty, if the image needs more than
    /// `max_index_lookups` lookups, or if there is not enough free space
    /// and the stores cannot grow to make some.
    pub fn allocate_image<S: ImageSource + ?Sized>(
        &self,
        source: &S,
        slack: u32,
    ) -> Result<Image, AllocError> {
        let dimensions = source.dimensions();
        if dimensions.is_empty() {
            return Err(AllocError::new(
                AllocErrorKind::Empty,
                dimensions.width,
                dimensions.height,
            ));
        }
        let layout = ImageLayout::new(dimensions, slack, &self.config)?;

        let mut state = self.state();
        self.ensure_capacity(&mut state, &layout, dimensions)?;

        let mut placement = Placement::default();
        let master = match self.place(&mut state, source, slack, &layout, &mut placement) {
            Ok(master) => master,
            Err(err) => {
                for tile in placement.color_tiles {
                    state.color_tiles.free(tile);
                }
                for tile in placement.index_tiles {
                    state.index_tiles.free(tile);
                }
                return Err(err);
            }
        };
        drop(state);

        let lookups = layout.number_index_lookups();
        let index_size = self.config.index_tile_size as f32;
        let mut divisor = layout.interior as f32;
        let mut dims = (
            dimensions.width as f32 / divisor,
            dimensions.height as f32 / divisor,
        );
        for _ in 0..lookups.saturating_sub(1) {
            divisor *= index_size;
            dims = (dims.0 / index_size, dims.1 / index_size);
        }

        log::trace!(
            "placed {}x{} image in {} color and {} index tiles, {} lookups",
            dimensions.width,
            dimensions.height,
            placement.color_tiles.len(),
            placement.index_tiles.len(),
            lookups
        );

        Ok(Image {
            atlas_id: self.id,
            dimensions,
            slack,
            color_grid: layout.color_grid,
            master_index_tile: master,
            number_index_lookups: lookups,
            master_index_tile_dims: dims,
            dimensions_index_divisor: divisor,
            color_tiles: placement.color_tiles,
            index_tiles: placement.index_tiles,
        })
    }

    /// Makes sure enough tiles are free for the worst case of `layout`,
    /// growing both stores by whole layers if needed.
    fn ensure_capacity(
        &self,
        state: &mut State<C, I>,
        layout: &ImageLayout,
        dimensions: Extent,
    ) -> Result<(), AllocError> {
        let no_room = AllocError::out_of_space(dimensions.width, dimensions.height);
        let color_needed = layout.color_tile_count();
        let index_needed = layout.index_tile_count();

        let color_layers = if state.color_tiles.number_free() >= color_needed {
            None
        } else {
            let layers = state
                .color_tiles
                .layers_to_fit(color_needed)
                .filter(|&layers| can_grow_to(&state.color_store, layers))
                .ok_or(no_room)?;
            Some(layers)
        };
        let index_layers = if state.index_tiles.number_free() >= index_needed {
            None
        } else {
            let layers = state
                .index_tiles
                .layers_to_fit(index_needed)
                .filter(|&layers| can_grow_to(&state.index_store, layers))
                .ok_or(no_room)?;
            Some(layers)
        };

        if let Some(layers) = color_layers {
            log::debug!(
                "growing color store from {} to {layers} layers",
                state.color_tiles.layers()
            );
            state.color_store.resize(layers);
            state.color_tiles.grow_to(layers);
        }
        if let Some(layers) = index_layers {
            log::debug!(
                "growing index store from {} to {layers} layers",
                state.index_tiles.layers()
            );
            state.index_store.resize(layers);
            state.index_tiles.grow_to(layers);
        }
        Ok(())
    }

    /// Writes the color tiles and the index tree, returning the master tile.
    fn place<S: ImageSource + ?Sized>(
        &self,
        state: &mut State<C, I>,
        source: &S,
        slack: u32,
        layout: &ImageLayout,
        placement: &mut Placement,
    ) -> Result<TileCoord, AllocError> {
        let dims = source.dimensions();
        let no_room = AllocError::out_of_space(dims.width, dims.height);
        let color_size = state.color_tiles.tile_size();
        let tile_extent = Extent::new(color_size, color_size);
        let grid = layout.color_grid;

        let mut texels = vec![Rgba8::TRANSPARENT; color_size as usize * color_size as usize];
        let mut shared: HashMap<Rgba8, TileCoord> = HashMap::new();
        placement.grid.reserve(grid.width as usize * grid.height as usize);
        for ty in 0..grid.height {
            let y = i64::from(ty) * i64::from(layout.interior) - i64::from(slack);
            for tx in 0..grid.width {
                let x = i64::from(tx) * i64::from(layout.interior) - i64::from(slack);
                let tile = match source.all_same_color(x, y, tile_extent) {
                    Some(color) => match shared.entry(color) {
                        Entry::Occupied(entry) => *entry.get(),
                        Entry::Vacant(entry) => {
                            let tile = state.color_tiles.allocate().ok_or(no_room)?;
                            placement.color_tiles.push(tile);
                            state.color_store.fill(tile.region(color_size), color);
                            *entry.insert(tile)
                        }
                    },
                    None => {
                        let tile = state.color_tiles.allocate().ok_or(no_room)?;
                        placement.color_tiles.push(tile);
                        source.fetch_texels(x, y, tile_extent, &mut texels);
                        state.color_store.set_data(tile.region(color_size), &texels);
                        tile
                    }
                };
                placement.grid.push(tile);
            }
        }

        let index_size = self.config.index_tile_size;
        let mut children: Vec<IndexEntry> =
            placement.grid.iter().copied().map(IndexEntry::from).collect();
        let mut child_grid = grid;
        let mut block = Vec::with_capacity(index_size as usize * index_size as usize);
        for &level in &layout.index_levels {
            let mut parents = Vec::with_capacity(level.width as usize * level.height as usize);
            for by in 0..level.height {
                for bx in 0..level.width {
                    gather_index_block(
                        &children,
                        child_grid,
                        bx * index_size,
                        by * index_size,
                        index_size,
                        &mut block,
                    );
                    let tile = state.index_tiles.allocate().ok_or(no_room)?;
                    placement.index_tiles.push(tile);
                    state.index_store.set_data(tile.region(index_size), &block);
                    parents.push(IndexEntry::from(tile));
                }
            }
            children = parents;
            child_grid = level;
        }

        debug_assert_eq!(children.len(), 1, "index tree must end in one tile");
        children
            .first()
            .map(|&entry| TileCoord::from(entry))
            .ok_or(no_room)
    }

    /// Returns the image's tiles to the atlas.
    ///
    /// While the atlas is locked the tiles stay reserved until the last
    /// unlock.
    pub fn deallocate(&self, image: Image) {
        if image.atlas_id != self.id {
            debug_assert!(false, "image deallocated into a foreign atlas");
            return;
        }
        let mut state = self.state();
        for tile in image.color_tiles {
            state.free_now_or_later(PendingTile::Color(tile));
        }
        for tile in image.index_tiles {
            state.free_now_or_later(PendingTile::Index(tile));
        }
    }

    /// Pushes buffered writes into both stores.
    pub fn flush(&self) {
        let mut state = self.state();
        state.index_store.flush();
        state.color_store.flush();
    }

    /// Number of color tiles currently free.
    pub fn free_color_tiles(&self) -> u64 {
        self.state().color_tiles.number_free()
    }

    /// Number of index tiles currently free.
    pub fn free_index_tiles(&self) -> u64 {
        self.state().index_tiles.number_free()
    }

    /// Current dimensions of the color store.
    pub fn color_store_dimensions(&self) -> StoreDimensions {
        self.state().color_store.dimensions()
    }

    /// Current dimensions of the index store.
    pub fn index_store_dimensions(&self) -> StoreDimensions {
        self.state().index_store.dimensions()
    }

    /// Whether both stores may grow.
    pub fn is_resizable(&self) -> bool {
        let state = self.state();
        state.color_store.is_resizable() && state.index_store.is_resizable()
    }

    /// Runs `f` on the color store, e.g. to bind it for drawing.
    pub fn with_color_store<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state().color_store)
    }

    /// Runs `f` on the index store.
    pub fn with_index_store<R>(&self, f: impl FnOnce(&I) -> R) -> R {
        f(&self.state().index_store)
    }

    /// Number of tile frees and actions waiting for the last unlock.
    pub fn pending_release_count(&self) -> usize {
        self.state().reclaim.pending_len()
    }
}

impl<C, I> DelayedReclaim for TiledAtlas<C, I>
where
    C: BackingStore<Element = Rgba8>,
    I: BackingStore<Element = IndexEntry>,
{
    fn lock_resources(&self) {
        self.state().reclaim.lock();
    }

    fn unlock_resources(&self) {
        let actions = {
            let mut state = self.state();
            match state.reclaim.unlock() {
                Some(reclaimed) => {
                    for tile in reclaimed.items {
                        state.release(tile);
                    }
                    reclaimed.actions
                }
                None => Vec::new(),
            }
        };
        run_actions(actions);
    }

    fn queue_release_action(&self, action: Box<dyn ResourceReleaseAction>) {
        let ready = self.state().reclaim.defer_action(action);
        if let Some(action) = ready {
            action.release();
        }
    }
}

impl<C, I> Debug for TiledAtlas<C, I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TiledAtlas")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
