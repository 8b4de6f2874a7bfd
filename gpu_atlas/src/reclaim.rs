// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred reclamation of atlas space.
//!
//! Draw commands that read atlas contents are usually batched and reach
//! the GPU well after the client has dropped the image or rectangle they
//! came from. Returning that space to a free list right away would let a
//! later allocation overwrite texels the GPU has not read yet.
//!
//! Every atlas therefore carries a lock counter. While it is non-zero,
//! freed space and queued [`ResourceReleaseAction`]s pile up in a pending
//! list; when the counter drops back to zero they are all released at once.
//! Nested locks are additive, and no call ever blocks on the counter.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

/// A deferred cleanup for a resource that is not plain atlas space, such
/// as a texture owned by the backend.
pub trait ResourceReleaseAction: Send {
    /// Perform the cleanup.
    fn release(self: Box<Self>);
}

impl<F: FnOnce() + Send> ResourceReleaseAction for F {
    fn release(self: Box<Self>) {
        (*self)();
    }
}

/// An atlas whose frees can be held back while GPU work is in flight.
pub trait DelayedReclaim {
    /// Increment the lock counter.
    fn lock_resources(&self);

    /// Decrement the lock counter, releasing everything that was freed
    /// while it was non-zero once it reaches zero.
    ///
    /// Every call must be matched by an earlier
    /// [`lock_resources`](Self::lock_resources).
    fn unlock_resources(&self);

    /// Run `action` now if the atlas is unlocked, or once the lock counter
    /// next reaches zero.
    fn queue_release_action(&self, action: Box<dyn ResourceReleaseAction>);

    /// Lock the atlas for the lifetime of the returned guard.
    fn lock(&self) -> ResourceLock<'_, Self>
    where
        Self: Sized,
    {
        ResourceLock::new(self)
    }
}

/// Holds an atlas lock and releases it when dropped.
#[must_use = "the atlas is unlocked again as soon as the guard is dropped"]
pub struct ResourceLock<'a, A: DelayedReclaim + ?Sized> {
    atlas: &'a A,
}

impl<'a, A: DelayedReclaim + ?Sized> ResourceLock<'a, A> {
    /// Lock `atlas` until the guard is dropped.
    pub fn new(atlas: &'a A) -> Self {
        atlas.lock_resources();
        Self { atlas }
    }
}

impl<A: DelayedReclaim + ?Sized> Drop for ResourceLock<'_, A> {
    fn drop(&mut self) {
        self.atlas.unlock_resources();
    }
}

impl<A: DelayedReclaim + ?Sized> Debug for ResourceLock<'_, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceLock").finish_non_exhaustive()
    }
}

/// Like [`ResourceLock`], but keeps the atlas alive itself so the guard can
/// outlive any lexical scope, e.g. one guard per frame in flight.
#[must_use = "the atlas is unlocked again as soon as the guard is dropped"]
pub struct OwnedResourceLock<A: DelayedReclaim + ?Sized> {
    atlas: Arc<A>,
}

impl<A: DelayedReclaim + ?Sized> OwnedResourceLock<A> {
    /// Lock `atlas` until the guard is dropped.
    pub fn new(atlas: Arc<A>) -> Self {
        atlas.lock_resources();
        Self { atlas }
    }

    /// The locked atlas.
    pub fn atlas(&self) -> &Arc<A> {
        &self.atlas
    }
}

impl<A: DelayedReclaim + ?Sized> Drop for OwnedResourceLock<A> {
    fn drop(&mut self) {
        self.atlas.unlock_resources();
    }
}

impl<A: DelayedReclaim + ?Sized> Debug for OwnedResourceLock<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnedResourceLock").finish_non_exhaustive()
    }
}

/// Everything that became releasable when the counter reached zero.
pub(crate) struct Reclaimed<T> {
    pub(crate) items: Vec<T>,
    pub(crate) actions: Vec<Box<dyn ResourceReleaseAction>>,
}

/// Lock counter and pending list kept inside an atlas's mutex.
///
/// `T` is whatever the owning atlas needs to release a piece of space.
pub(crate) struct Reclamation<T> {
    counter: u32,
    pending: Vec<T>,
    actions: Vec<Box<dyn ResourceReleaseAction>>,
}

impl<T> Reclamation<T> {
    pub(crate) fn new() -> Self {
        Self {
            counter: 0,
            pending: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.counter > 0
    }

    /// Number of frees and actions waiting for the counter to reach zero.
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len() + self.actions.len()
    }

    pub(crate) fn lock(&mut self) {
        self.counter += 1;
    }

    /// Returns the pending work if this call brought the counter to zero.
    pub(crate) fn unlock(&mut self) -> Option<Reclaimed<T>> {
        debug_assert!(self.counter > 0, "unlock_resources without lock_resources");
        if self.counter == 0 {
            return None;
        }
        self.counter -= 1;
        if self.counter > 0 {
            return None;
        }
        if !self.pending.is_empty() || !self.actions.is_empty() {
            log::debug!(
                "reclaiming {} frees and {} release actions",
                self.pending.len(),
                self.actions.len()
            );
        }
        Some(Reclaimed {
            items: core::mem::take(&mut self.pending),
            actions: core::mem::take(&mut self.actions),
        })
    }

    /// Hold `item` back if locked; otherwise hand it back to be freed now.
    pub(crate) fn defer(&mut self, item: T) -> Option<T> {
        if self.is_locked() {
            self.pending.push(item);
            None
        } else {
            Some(item)
        }
    }

    /// Hold `action` back if locked; otherwise hand it back to be run now.
    pub(crate) fn defer_action(
        &mut self,
        action: Box<dyn ResourceReleaseAction>,
    ) -> Option<Box<dyn ResourceReleaseAction>> {
        if self.is_locked() {
            self.actions.push(action);
            None
        } else {
            Some(action)
        }
    }
}

/// Runs release actions in queue order.
///
/// Must be called with no atlas mutex held, since an action may call back
/// into the atlas.
pub(crate) fn run_actions(actions: Vec<Box<dyn ResourceReleaseAction>>) {
    for action in actions {
        action.release();
    }
}

impl<T> Debug for Reclamation<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reclamation")
            .field("counter", &self.counter)
            .field("pending", &self.pending.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}
