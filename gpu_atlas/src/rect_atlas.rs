// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A thread-safe [`RectBinPacker`] with deferred frees and clears.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::AllocError;
use crate::geometry::{Extent, Padding};
use crate::reclaim::{run_actions, DelayedReclaim, Reclamation, ResourceReleaseAction};
use crate::rect_packer::{PackedRect, RectBinPacker};

/// Space held back while the atlas is locked.
#[derive(Clone, Copy, Debug)]
enum PendingRelease {
    Rect(PackedRect),
    Clear,
}

#[derive(Debug)]
struct State {
    packer: RectBinPacker,
    reclaim: Reclamation<PendingRelease>,
    times_cleared: u32,
}

impl State {
    fn release(&mut self, item: PendingRelease) {
        match item {
            PendingRelease::Rect(rect) => {
                self.packer.deallocate(&rect);
            }
            PendingRelease::Clear => {
                log::debug!(
                    "clearing rect atlas holding {} rectangles",
                    self.packer.rect_count()
                );
                self.packer.clear();
                self.times_cleared += 1;
            }
        }
    }
}

/// Rectangles packed into one canvas, shared between threads.
///
/// While the atlas is locked through [`DelayedReclaim`], freed space is
/// held back until the last unlock. A [`clear`](Self::clear) issued in that
/// window invalidates every existing rectangle at once, but their space only
/// comes back at the last unlock. Rectangles allocated after the clear are
/// unaffected by it.
pub struct RectAtlas {
    state: Mutex<State>,
}

impl RectAtlas {
    /// Creates an empty atlas over a `size` canvas.
    pub fn new(size: Extent) -> Self {
        Self {
            state: Mutex::new(State {
                packer: RectBinPacker::new(size),
                reclaim: Reclamation::new(),
                times_cleared: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates room for a `size` rectangle surrounded by `padding`.
    pub fn allocate(&self, size: Extent, padding: Padding) -> Result<PackedRect, AllocError> {
        self.state().packer.allocate(size, padding)
    }

    /// Gives the space of `rect` back, now or after the last unlock.
    ///
    /// Rectangles already invalidated by a clear are ignored.
    pub fn deallocate(&self, rect: PackedRect) {
        if rect.is_empty() {
            return;
        }
        let mut state = self.state();
        if let Some(item) = state.reclaim.defer(PendingRelease::Rect(rect)) {
            state.release(item);
        }
    }

    /// Invalidates every rectangle, freeing their space now or after the
    /// last unlock.
    pub fn clear(&self) {
        let mut state = self.state();
        match state.reclaim.defer(PendingRelease::Clear) {
            Some(item) => state.release(item),
            // Rectangles allocated from here on survive the postponed clear.
            None => state.packer.advance_generation(),
        }
    }

    /// Number of clears actually performed.
    pub fn times_cleared(&self) -> u32 {
        self.state().times_cleared
    }

    /// Whether `rect` still holds its space and has not been invalidated
    /// by a clear.
    pub fn is_current(&self, rect: &PackedRect) -> bool {
        self.state().packer.contains(rect)
    }

    /// Size of the canvas.
    pub fn size(&self) -> Extent {
        self.state().packer.size()
    }

    /// Number of nodes in the packer's split tree.
    pub fn node_count(&self) -> usize {
        self.state().packer.node_count()
    }

    /// Bytes reserved for the packer's split tree.
    pub fn bookkeeping_bytes(&self) -> usize {
        self.state().packer.bookkeeping_bytes()
    }

    /// Number of frees, clears and actions waiting for the last unlock.
    pub fn pending_release_count(&self) -> usize {
        self.state().reclaim.pending_len()
    }
}

impl DelayedReclaim for RectAtlas {
    fn lock_resources(&self) {
        self.state().reclaim.lock();
    }

    fn unlock_resources(&self) {
        let actions = {
            let mut state = self.state();
            match state.reclaim.unlock() {
                Some(reclaimed) => {
                    let mut cleared = false;
                    for item in reclaimed.items {
                        match item {
                            PendingRelease::Clear => cleared = true,
                            rect => state.release(rect),
                        }
                    }
                    // Any number of postponed clears collapse into one.
                    if cleared {
                        let retired = state.packer.retire_previous_generations();
                        log::debug!("postponed clear retired {retired} rectangles");
                        state.times_cleared += 1;
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

impl Debug for RectAtlas {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RectAtlas")
            .field("state", &*self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_while_locked_waits_for_unlock() {
        let atlas = RectAtlas::new(Extent::new(32, 32));
        let rect = atlas.allocate(Extent::new(32, 32), Padding::ZERO).unwrap();

        let guard = atlas.lock();
        atlas.clear();
        atlas.clear();
        assert_eq!(atlas.times_cleared(), 0);
        assert!(!atlas.is_current(&rect));
        assert!(atlas.allocate(Extent::new(1, 1), Padding::ZERO).is_err());
        drop(guard);

        assert_eq!(atlas.times_cleared(), 1);
        assert_eq!(atlas.node_count(), 1);
        assert!(atlas.allocate(Extent::new(32, 32), Padding::ZERO).is_ok());
    }

    #[test]
    fn rects_allocated_after_a_postponed_clear_survive_it() {
        let atlas = RectAtlas::new(Extent::new(32, 32));
        let old = atlas.allocate(Extent::new(16, 32), Padding::ZERO).unwrap();

        let guard = atlas.lock();
        atlas.clear();
        let a = atlas.allocate(Extent::new(16, 32), Padding::ZERO).unwrap();
        assert!(!a.intersects(&old));
        drop(guard);

        assert!(atlas.is_current(&a));
        assert!(!atlas.is_current(&old));
        assert!(atlas.allocate(Extent::new(32, 32), Padding::ZERO).is_err());
        let b = atlas.allocate(Extent::new(16, 32), Padding::ZERO).unwrap();
        assert!(!b.intersects(&a));
        assert_eq!(b.min(), old.min());

        atlas.deallocate(a);
        atlas.deallocate(b);
        assert!(atlas.allocate(Extent::new(32, 32), Padding::ZERO).is_ok());
    }

    #[test]
    fn deallocate_while_locked_waits_for_unlock() {
        let atlas = RectAtlas::new(Extent::new(16, 16));
        let rect = atlas.allocate(Extent::new(16, 16), Padding::ZERO).unwrap();

        let guard = atlas.lock();
        atlas.deallocate(rect);
        assert_eq!(atlas.pending_release_count(), 1);
        assert!(atlas.is_current(&rect));
        assert!(atlas.allocate(Extent::new(4, 4), Padding::ZERO).is_err());
        drop(guard);

        assert_eq!(atlas.pending_release_count(), 0);
        assert!(!atlas.is_current(&rect));
        assert!(atlas.allocate(Extent::new(16, 16), Padding::ZERO).is_ok());
        assert_eq!(atlas.times_cleared(), 0);
    }

    #[test]
    fn freeing_a_cleared_rect_is_ignored() {
        let atlas = RectAtlas::new(Extent::new(16, 16));
        let old = atlas.allocate(Extent::new(16, 16), Padding::ZERO).unwrap();
        atlas.clear();
        let new = atlas.allocate(Extent::new(16, 16), Padding::ZERO).unwrap();
        atlas.deallocate(old);
        assert!(atlas.is_current(&new));
    }

    #[test]
    fn unlocked_clear_is_immediate() {
        let atlas = RectAtlas::new(Extent::new(8, 8));
        atlas.allocate(Extent::new(4, 4), Padding::ZERO).unwrap();
        atlas.clear();
        assert_eq!(atlas.times_cleared(), 1);
        assert_eq!(atlas.node_count(), 1);
        assert_eq!(atlas.pending_release_count(), 0);
    }
}
