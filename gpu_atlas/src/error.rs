// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Allocation failure reporting.

use core::fmt;

/// Kinds of capacity failures an atlas can report.
///
/// These are expected outcomes of a full or undersized atlas, and callers
/// are expected to fall back to an un-atlased resource when they occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum AllocErrorKind {
    /// There is no free space left that can hold the request, and the
    /// backing store could not grow.
    OutOfSpace,
    /// The request is larger than the maximum extent reachable through the
    /// configured number of index lookups.
    ExceedsAddressableExtent,
    /// Slack leaves no interior texels in a color tile.
    TileSizeTooSmall,
    /// The request is wider than a single row of the backing store.
    ExceedsMaxWidth,
    /// The request covers no texels, and the atlas has no empty handle to
    /// return for it.
    Empty,
}

/// Error returned when an atlas cannot satisfy an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    kind: AllocErrorKind,
    requested: (u32, u32),
}

impl AllocError {
    pub(crate) const fn new(kind: AllocErrorKind, width: u32, height: u32) -> Self {
        Self {
            kind,
            requested: (width, height),
        }
    }

    pub(crate) const fn out_of_space(width: u32, height: u32) -> Self {
        Self::new(AllocErrorKind::OutOfSpace, width, height)
    }

    /// Returns the error kind.
    pub const fn kind(self) -> AllocErrorKind {
        self.kind
    }

    /// Returns the `(width, height)` of the request that failed.
    pub const fn requested(self) -> (u32, u32) {
        self.requested
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.kind {
            AllocErrorKind::OutOfSpace => "atlas has no room",
            AllocErrorKind::ExceedsAddressableExtent => "request exceeds the addressable extent",
            AllocErrorKind::TileSizeTooSmall => "slack leaves no interior in a color tile",
            AllocErrorKind::ExceedsMaxWidth => "request is wider than the backing store",
            AllocErrorKind::Empty => "nothing to allocate",
        };
        let (w, h) = self.requested;
        write!(f, "{msg} for a {w}x{h} request")
    }
}

impl core::error::Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn display_names_the_request() {
        let err = AllocError::out_of_space(300, 16);
        assert_eq!(err.to_string(), "atlas has no room for a 300x16 request");
        assert_eq!(err.kind(), AllocErrorKind::OutOfSpace);
    }
}
