// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test setup: logging and in-memory atlases.

use gpu_atlas::{
    CpuBackingStore, IndexEntry, Rgba8, StoreDimensions, TiledAtlas, TiledAtlasConfig,
};

/// A tiled atlas over in-memory stores.
pub(crate) type CpuTiledAtlas = TiledAtlas<CpuBackingStore<Rgba8>, CpuBackingStore<IndexEntry>>;

/// Per-test environment. Creating one installs the test logger.
pub(crate) struct TestEnv {
    name: &'static str,
}

impl TestEnv {
    pub(crate) fn new(name: &'static str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        log::info!("running {name}");
        Self { name }
    }

    /// Name of the running test, used to label assertion failures.
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}

/// Builds a tiled atlas whose stores hold `color_tiles` and `index_tiles`
/// tiles per side on a single layer.
pub(crate) fn tiled_atlas(
    config: TiledAtlasConfig,
    color_tiles: u32,
    index_tiles: u32,
    resizable: bool,
) -> CpuTiledAtlas {
    let color_side = color_tiles * config.color_tile_size;
    let index_side = index_tiles * config.index_tile_size;
    TiledAtlas::new(
        config,
        CpuBackingStore::new(StoreDimensions::new(color_side, color_side, 1), resizable),
        CpuBackingStore::new(StoreDimensions::new(index_side, index_side, 1), resizable),
    )
}

/// Texels that never repeat within a small region, so no tile is constant.
pub(crate) fn noise(width: u32, height: u32, seed: u8) -> Vec<Rgba8> {
    (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                Rgba8::new(x as u8, y as u8, (x / 256 + y / 256) as u8 ^ seed, 255)
            })
        })
        .collect()
}

/// Texels of a single color.
pub(crate) fn solid(width: u32, height: u32, color: Rgba8) -> Vec<Rgba8> {
    vec![color; (width * height) as usize]
}
