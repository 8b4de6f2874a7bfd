// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backing_store::{can_grow_to, BackingStore};
use crate::error::{AllocError, AllocErrorKind};
use crate::geometry::{Extent, Rgba8, StoreDimensions, StoreRegion};
use crate::reclaim::{run_actions, DelayedReclaim, Reclamation, ResourceReleaseAction};

use super::interval::IntervalAllocator;
use super::sequence::ColorStopSequence;

static NEXT_ATLAS_ID: AtomicU64 = AtomicU64::new(0);

/// A run of texels on one row of a [`ColorStopAtlas`].
#[must_use = "a span holds atlas space until it is deallocated"]
#[derive(Debug, PartialEq, Eq)]
pub struct ColorSpan {
    atlas_id: u64,
    x: u32,
    layer: u32,
    width: u32,
}

impl ColorSpan {
    /// First texel of the span.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Row (store layer) holding the span.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Number of texels in the span.
    pub fn width(&self) -> u32 {
        self.width
    }
}

/// A color stop sequence sampled onto a [`ColorStopAtlas`].
///
/// The span may carry a texel of slack at either end, repeating the end
/// colors so that filtering at the edges of the ramp stays clean.
#[must_use = "a ramp holds atlas space until it is deallocated"]
#[derive(Debug, PartialEq, Eq)]
pub struct ColorRamp {
    span: ColorSpan,
    start_slack: u32,
    width: u32,
}

impl ColorRamp {
    /// Location of the first texel of the ramp proper, as `(x, layer)`.
    pub fn texel_location(&self) -> (u32, u32) {
        (self.span.x + self.start_slack, self.span.layer)
    }

    /// Number of texels in the ramp, slack excluded.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The whole span, slack included.
    pub fn span(&self) -> &ColorSpan {
        &self.span
    }

    /// Gives up the ramp view, e.g. to deallocate the span.
    pub fn into_span(self) -> ColorSpan {
        self.span
    }
}

#[derive(Clone, Copy, Debug)]
struct FreedSpan {
    layer: u32,
    x: u32,
    width: u32,
}

struct State<S> {
    store: S,
    rows: Vec<IntervalAllocator>,
    /// Rows keyed by the length of their largest free interval.
    available: BTreeMap<u32, BTreeSet<u32>>,
    allocated: u64,
    reclaim: Reclamation<FreedSpan>,
}

impl<S: BackingStore> State<S> {
    fn add_rows(&mut self, layers: u32) {
        let width = self.store.dimensions().width;
        let first = u32::try_from(self.rows.len()).unwrap_or(u32::MAX);
        for layer in first..layers {
            self.rows.push(IntervalAllocator::new(width));
            if width > 0 {
                self.available.entry(width).or_default().insert(layer);
            }
        }
    }

    fn reindex(&mut self, layer: u32, old_largest: u32, new_largest: u32) {
        if old_largest == new_largest {
            return;
        }
        if let Some(layers) = self.available.get_mut(&old_largest) {
            layers.remove(&layer);
            if layers.is_empty() {
                self.available.remove(&old_largest);
            }
        }
        if new_largest > 0 {
            self.available.entry(new_largest).or_default().insert(layer);
        }
    }

    fn release(&mut self, span: FreedSpan) {
        let Some(row) = self.rows.get_mut(span.layer as usize) else {
            debug_assert!(false, "span on a row that does not exist");
            return;
        };
        let old = row.largest_free();
        row.free(span.x, span.width);
        let new = row.largest_free();
        self.reindex(span.layer, old, new);
        self.allocated = self.allocated.saturating_sub(u64::from(span.width));
    }
}

/// Color ramps packed into the rows of a backing store.
///
/// Every layer of the store is a single row of texels, so the store's
/// height must be 1. A ramp never straddles two rows; a resizable store is
/// grown by doubling its layer count when no row has room.
pub struct ColorStopAtlas<S> {
    id: u64,
    state: Mutex<State<S>>,
}

impl<S: BackingStore<Element = Rgba8>> ColorStopAtlas<S> {
    /// Creates an atlas over `store`.
    pub fn new(store: S) -> Self {
        let dims = store.dimensions();
        assert_eq!(dims.height, 1, "color stop stores hold one row per layer");
        let mut state = State {
            store,
            rows: Vec::new(),
            available: BTreeMap::new(),
            allocated: 0,
            reclaim: Reclamation::new(),
        };
        state.add_rows(dims.layers);
        Self {
            id: NEXT_ATLAS_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Widest span the atlas can hold.
    pub fn max_width(&self) -> u32 {
        self.state().store.dimensions().width
    }

    /// Copies `data` into a fresh span.
    pub fn allocate(&self, data: &[Rgba8]) -> Result<ColorSpan, AllocError> {
        let width = u32::try_from(data.len()).unwrap_or(u32::MAX);
        if width == 0 {
            return Err(AllocError::new(AllocErrorKind::Empty, 0, 1));
        }

        let mut state = self.state();
        let dims = state.store.dimensions();
        if width > dims.width {
            return Err(AllocError::new(AllocErrorKind::ExceedsMaxWidth, width, 1));
        }

        let layer = match Self::row_with_room(&state, width) {
            Some(layer) => layer,
            None => {
                let layers = dims.layers.saturating_mul(2).max(1);
                if layers == dims.layers || !can_grow_to(&state.store, layers) {
                    return Err(AllocError::out_of_space(width, 1));
                }
                log::debug!("growing color stop store from {} to {layers} rows", dims.layers);
                state.store.resize(layers);
                state.add_rows(layers);
                Self::row_with_room(&state, width).ok_or(AllocError::out_of_space(width, 1))?
            }
        };

        let row = &mut state.rows[layer as usize];
        let old = row.largest_free();
        let x = row
            .allocate(width)
            .ok_or(AllocError::out_of_space(width, 1))?;
        let new = row.largest_free();
        state.reindex(layer, old, new);
        state.allocated += u64::from(width);
        state
            .store
            .set_data(StoreRegion::new(x, 0, layer, Extent::new(width, 1)), data);
        log::trace!("color span of {width} texels at ({x}, {layer})");

        Ok(ColorSpan {
            atlas_id: self.id,
            x,
            layer,
            width,
        })
    }

    /// The row whose largest free interval is the tightest fit for `width`.
    fn row_with_room(state: &State<S>, width: u32) -> Option<u32> {
        state
            .available
            .range(width..)
            .next()
            .and_then(|(_, layers)| layers.first().copied())
    }

    /// Samples `sequence` into a ramp of `width` texels.
    ///
    /// A ramp at least as wide as the store is narrowed to the store width
    /// and carries no slack. Otherwise a texel of slack is added at each end
    /// that fits.
    pub fn allocate_sequence(
        &self,
        sequence: &ColorStopSequence,
        width: u32,
    ) -> Result<ColorRamp, AllocError> {
        if width == 0 {
            return Err(AllocError::new(AllocErrorKind::Empty, 0, 1));
        }
        let max_width = self.max_width();
        let (width, start_slack, end_slack) = if width >= max_width {
            (max_width, 0, 0)
        } else if width == max_width - 1 {
            (width, 0, 1)
        } else {
            (width, 1, 1)
        };
        let data = sequence.discretize(width, start_slack, end_slack);
        let span = self.allocate(&data)?;
        Ok(ColorRamp {
            span,
            start_slack,
            width,
        })
    }

    /// Returns `span` to the atlas, now or after the last unlock.
    pub fn deallocate(&self, span: ColorSpan) {
        if span.atlas_id != self.id {
            debug_assert!(false, "span deallocated into a foreign atlas");
            return;
        }
        let freed = FreedSpan {
            layer: span.layer,
            x: span.x,
            width: span.width,
        };
        let mut state = self.state();
        if let Some(freed) = state.reclaim.defer(freed) {
            state.release(freed);
        }
    }

    /// Pushes buffered writes into the store.
    pub fn flush(&self) {
        self.state().store.flush();
    }

    /// Number of texels not held by any span.
    pub fn total_available(&self) -> u64 {
        let state = self.state();
        let dims = state.store.dimensions();
        u64::from(dims.width) * u64::from(dims.layers) - state.allocated
    }

    /// Widest span that fits without growing the store.
    pub fn largest_allocation_possible(&self) -> u32 {
        self.state()
            .available
            .last_key_value()
            .map_or(0, |(&width, _)| width)
    }

    /// Current dimensions of the store.
    pub fn store_dimensions(&self) -> StoreDimensions {
        self.state().store.dimensions()
    }

    /// Whether the store may grow.
    pub fn is_resizable(&self) -> bool {
        self.state().store.is_resizable()
    }

    /// Runs `f` on the store, e.g. to bind it for drawing.
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state().store)
    }

    /// Number of span frees and actions waiting for the last unlock.
    pub fn pending_release_count(&self) -> usize {
        self.state().reclaim.pending_len()
    }
}

impl<S: BackingStore<Element = Rgba8>> DelayedReclaim for ColorStopAtlas<S> {
    fn lock_resources(&self) {
        self.state().reclaim.lock();
    }

    fn unlock_resources(&self) {
        let actions = {
            let mut state = self.state();
            match state.reclaim.unlock() {
                Some(reclaimed) => {
                    for span in reclaimed.items {
                        state.release(span);
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

impl<S> Debug for ColorStopAtlas<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ColorStopAtlas")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing_store::CpuBackingStore;
    use crate::color_stop::ColorStop;

    fn atlas(width: u32, layers: u32, resizable: bool) -> ColorStopAtlas<CpuBackingStore<Rgba8>> {
        ColorStopAtlas::new(CpuBackingStore::new(
            StoreDimensions::new(width, 1, layers),
            resizable,
        ))
    }

    #[test]
    fn spans_fill_rows_best_fit() {
        let atlas = atlas(8, 2, false);
        let a = atlas.allocate(&[Rgba8::TRANSPARENT; 5]).unwrap();
        assert_eq!((a.x(), a.layer()), (0, 0));
        // Row 0 has 3 texels left, the tightest fit for 3.
        let b = atlas.allocate(&[Rgba8::TRANSPARENT; 3]).unwrap();
        assert_eq!((b.x(), b.layer()), (5, 0));
        let c = atlas.allocate(&[Rgba8::TRANSPARENT; 4]).unwrap();
        assert_eq!(c.layer(), 1);
        assert_eq!(atlas.total_available(), 4);
        assert_eq!(atlas.largest_allocation_possible(), 4);
    }

    #[test]
    fn too_wide_and_full() {
        let atlas = atlas(4, 1, false);
        let err = atlas.allocate(&[Rgba8::TRANSPARENT; 5]).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::ExceedsMaxWidth);
        let _span = atlas.allocate(&[Rgba8::TRANSPARENT; 4]).unwrap();
        let err = atlas.allocate(&[Rgba8::TRANSPARENT; 1]).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::OutOfSpace);
    }

    #[test]
    fn growth_doubles_rows() {
        let atlas = atlas(4, 1, true);
        let _a = atlas.allocate(&[Rgba8::TRANSPARENT; 4]).unwrap();
        let b = atlas.allocate(&[Rgba8::TRANSPARENT; 2]).unwrap();
        assert_eq!(b.layer(), 1);
        assert_eq!(atlas.store_dimensions().layers, 2);
        assert_eq!(atlas.total_available(), 2);
    }

    #[test]
    fn freed_spans_coalesce() {
        let atlas = atlas(6, 1, false);
        let a = atlas.allocate(&[Rgba8::TRANSPARENT; 2]).unwrap();
        let b = atlas.allocate(&[Rgba8::TRANSPARENT; 2]).unwrap();
        let _c = atlas.allocate(&[Rgba8::TRANSPARENT; 2]).unwrap();
        atlas.deallocate(a);
        atlas.deallocate(b);
        assert_eq!(atlas.largest_allocation_possible(), 4);
    }

    #[test]
    fn ramp_slack_follows_store_width() {
        let atlas = atlas(16, 1, true);
        let sequence: ColorStopSequence = [
            ColorStop::new(0.0, Rgba8::new(255, 0, 0, 255)),
            ColorStop::new(1.0, Rgba8::new(0, 0, 255, 255)),
        ]
        .into_iter()
        .collect();

        let wide = atlas.allocate_sequence(&sequence, 40).unwrap();
        assert_eq!(wide.width(), 16);
        assert_eq!(wide.span().width(), 16);
        assert_eq!(wide.texel_location(), (0, 0));

        let almost = atlas.allocate_sequence(&sequence, 15).unwrap();
        assert_eq!(almost.span().width(), 16);
        assert_eq!(almost.texel_location(), (0, 1));

        let narrow = atlas.allocate_sequence(&sequence, 6).unwrap();
        assert_eq!(narrow.span().width(), 8);
        assert_eq!(narrow.texel_location(), (1, 2));

        atlas.flush();
        let texels = atlas.with_store(|store| {
            store.read_region(StoreRegion::new(0, 0, 2, Extent::new(8, 1)))
        });
        // The start slack repeats the first stop.
        assert_eq!(texels[0], Rgba8::new(255, 0, 0, 255));
        assert_eq!(texels[1], texels[0]);
        assert!(texels[4].b > texels[2].b);
        assert!(texels[7].b > 200);
    }
}
