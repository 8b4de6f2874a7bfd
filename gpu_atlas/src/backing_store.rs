// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layered storage that the atlases allocate from.
//!
//! A backing store is a stack of equally sized 2D layers of elements
//! (texels for color data, [`IndexEntry`](crate::IndexEntry) records for
//! index data). Stores only ever grow by appending layers, so an address
//! handed out before a resize stays valid afterwards.
//!
//! Implementations do not need to be thread safe: every atlas serializes
//! access to its stores behind its own mutex.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::geometry::{StoreDimensions, StoreRegion};

/// Capabilities a graphics backend provides for one atlas surface.
pub trait BackingStore {
    /// Element held in each cell of a layer.
    type Element: Copy;

    /// Current dimensions of the store.
    fn dimensions(&self) -> StoreDimensions;

    /// Whether [`resize`](Self::resize) may be called.
    fn is_resizable(&self) -> bool;

    /// Hard cap on the number of layers imposed by the underlying format.
    ///
    /// `None` means the store can grow without bound.
    fn max_layers(&self) -> Option<u32> {
        None
    }

    /// Write `data` (row-major, `region.len()` elements) into `region`.
    ///
    /// The write may be buffered; it only has to become visible to the GPU
    /// after [`flush`](Self::flush).
    fn set_data(&mut self, region: StoreRegion, data: &[Self::Element]);

    /// Write `value` into every cell of `region`.
    fn fill(&mut self, region: StoreRegion, value: Self::Element) {
        let data = vec![value; region.len()];
        self.set_data(region, &data);
    }

    /// Push buffered writes to the store.
    fn flush(&mut self);

    /// Grow the store to `new_layers` layers.
    ///
    /// Existing content keeps its `(x, y, layer)` address. Callers must only
    /// grow a resizable store, must strictly increase the layer count, and
    /// must stay under [`max_layers`](Self::max_layers).
    fn resize(&mut self, new_layers: u32);
}

/// Returns `true` if `store` may be grown to `layers` layers.
pub(crate) fn can_grow_to<S: BackingStore + ?Sized>(store: &S, layers: u32) -> bool {
    store.is_resizable() && store.max_layers().is_none_or(|cap| layers <= cap)
}

enum PendingWrite<T> {
    Data(Vec<T>),
    Fill(T),
}

/// A backing store that lives in CPU memory.
///
/// Writes are queued and only land in the readable contents on
/// [`flush`](BackingStore::flush), which mirrors how a GPU backend
/// batches uploads. Useful as a software backend and for tests.
pub struct CpuBackingStore<T> {
    dimensions: StoreDimensions,
    resizable: bool,
    max_layers: Option<u32>,
    contents: Vec<T>,
    pending: Vec<(StoreRegion, PendingWrite<T>)>,
    flush_count: u32,
    write_count: u64,
}

impl<T: Copy + Default> CpuBackingStore<T> {
    /// Creates a store of the given dimensions with every element defaulted.
    pub fn new(dimensions: StoreDimensions, resizable: bool) -> Self {
        let len = dimensions.layer_len() * dimensions.layers as usize;
        Self {
            dimensions,
            resizable,
            max_layers: None,
            contents: vec![T::default(); len],
            pending: Vec::new(),
            flush_count: 0,
            write_count: 0,
        }
    }

    /// Limits how far the store may grow.
    #[must_use]
    pub fn with_max_layers(mut self, max_layers: u32) -> Self {
        debug_assert!(
            max_layers >= self.dimensions.layers,
            "layer cap below the initial layer count"
        );
        self.max_layers = Some(max_layers);
        self
    }

    /// Returns the flushed element at `(x, y, layer)`.
    pub fn get(&self, x: u32, y: u32, layer: u32) -> Option<T> {
        let dims = self.dimensions;
        if x >= dims.width || y >= dims.height || layer >= dims.layers {
            return None;
        }
        self.contents.get(self.offset(x, y, layer)).copied()
    }

    /// Returns the flushed contents of `region` in row-major order.
    pub fn read_region(&self, region: StoreRegion) -> Vec<T> {
        assert!(
            self.dimensions.contains(region),
            "region {region:?} lies outside the store"
        );
        let mut out = Vec::with_capacity(region.len());
        for row in 0..region.size.height {
            let start = self.offset(region.x, region.y + row, region.layer);
            out.extend_from_slice(&self.contents[start..start + region.size.width as usize]);
        }
        out
    }

    /// Number of writes waiting for the next flush.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Number of times the store has been flushed.
    pub fn flush_count(&self) -> u32 {
        self.flush_count
    }

    /// Number of `set_data`/`fill` calls received.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    fn offset(&self, x: u32, y: u32, layer: u32) -> usize {
        layer as usize * self.dimensions.layer_len()
            + y as usize * self.dimensions.width as usize
            + x as usize
    }

    fn apply(&mut self, region: StoreRegion, write: &PendingWrite<T>) {
        let width = region.size.width as usize;
        for row in 0..region.size.height {
            let start = self.offset(region.x, region.y + row, region.layer);
            let dst = &mut self.contents[start..start + width];
            match write {
                PendingWrite::Data(data) => {
                    let src_start = row as usize * width;
                    dst.copy_from_slice(&data[src_start..src_start + width]);
                }
                PendingWrite::Fill(value) => dst.fill(*value),
            }
        }
    }
}

impl<T: Copy + Default> BackingStore for CpuBackingStore<T> {
    type Element = T;

    fn dimensions(&self) -> StoreDimensions {
        self.dimensions
    }

    fn is_resizable(&self) -> bool {
        self.resizable
    }

    fn max_layers(&self) -> Option<u32> {
        self.max_layers
    }

    fn set_data(&mut self, region: StoreRegion, data: &[T]) {
        assert!(
            self.dimensions.contains(region),
            "region {region:?} lies outside the store"
        );
        assert_eq!(data.len(), region.len(), "data does not cover the region");
        self.write_count += 1;
        self.pending.push((region, PendingWrite::Data(data.to_vec())));
    }

    fn fill(&mut self, region: StoreRegion, value: T) {
        assert!(
            self.dimensions.contains(region),
            "region {region:?} lies outside the store"
        );
        self.write_count += 1;
        self.pending.push((region, PendingWrite::Fill(value)));
    }

    fn flush(&mut self) {
        let pending = core::mem::take(&mut self.pending);
        for (region, write) in &pending {
            self.apply(*region, write);
        }
        self.flush_count += 1;
    }

    fn resize(&mut self, new_layers: u32) {
        assert!(self.resizable, "resize of a non-resizable store");
        assert!(
            new_layers > self.dimensions.layers,
            "resize must add layers ({} -> {new_layers})",
            self.dimensions.layers
        );
        assert!(
            self.max_layers.is_none_or(|cap| new_layers <= cap),
            "resize past the layer cap"
        );
        self.dimensions.layers = new_layers;
        let len = self.dimensions.layer_len() * new_layers as usize;
        self.contents.resize(len, T::default());
    }
}

impl<T> Debug for CpuBackingStore<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CpuBackingStore")
            .field("dimensions", &self.dimensions)
            .field("resizable", &self.resizable)
            .field("max_layers", &self.max_layers)
            .field("pending", &self.pending.len())
            .field("flush_count", &self.flush_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Extent;

    #[test]
    fn writes_become_visible_on_flush() {
        let mut store = CpuBackingStore::<u8>::new(StoreDimensions::new(4, 4, 1), false);
        store.fill(StoreRegion::new(1, 1, 0, Extent::new(2, 2)), 7);
        assert_eq!(store.get(1, 1, 0), Some(0));
        assert_eq!(store.pending_writes(), 1);

        store.flush();
        assert_eq!(store.get(1, 1, 0), Some(7));
        assert_eq!(store.get(2, 2, 0), Some(7));
        assert_eq!(store.get(3, 3, 0), Some(0));
        assert_eq!(store.pending_writes(), 0);
    }

    #[test]
    fn set_data_is_row_major() {
        let mut store = CpuBackingStore::<u8>::new(StoreDimensions::new(4, 4, 1), false);
        let region = StoreRegion::new(2, 0, 0, Extent::new(2, 2));
        store.set_data(region, &[1, 2, 3, 4]);
        store.flush();
        assert_eq!(store.read_region(region), [1, 2, 3, 4]);
        assert_eq!(store.get(3, 1, 0), Some(4));
    }

    #[test]
    fn resize_keeps_contents() {
        let mut store = CpuBackingStore::<u8>::new(StoreDimensions::new(2, 2, 1), true);
        store.fill(StoreRegion::new(0, 0, 0, Extent::new(2, 2)), 9);
        store.flush();
        store.resize(3);
        assert_eq!(store.dimensions().layers, 3);
        assert_eq!(store.get(1, 1, 0), Some(9));
        assert_eq!(store.get(1, 1, 2), Some(0));
    }

    #[test]
    #[should_panic(expected = "resize of a non-resizable store")]
    fn resize_of_fixed_store_panics() {
        let mut store = CpuBackingStore::<u8>::new(StoreDimensions::new(2, 2, 1), false);
        store.resize(2);
    }

    #[test]
    fn layer_cap_limits_growth() {
        let store = CpuBackingStore::<u8>::new(StoreDimensions::new(2, 2, 1), true)
            .with_max_layers(2);
        assert!(can_grow_to(&store, 2));
        assert!(!can_grow_to(&store, 3));
    }
}
