// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small integer geometry types shared by every allocator.

/// Width and height of a region, in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Horizontal size.
    pub width: u32,
    /// Vertical size.
    pub height: u32,
}

impl Extent {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of texels covered, widened so it never overflows.
    #[inline]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if `other` fits inside `self` on both axes.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

/// A texel position inside a single 2D canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal position.
    pub x: u32,
    /// Vertical position.
    pub y: u32,
}

impl Point {
    /// Creates a new point.
    #[inline]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Per-side margin reserved around a packed rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Padding {
    /// Texels reserved before the left edge.
    pub left: u32,
    /// Texels reserved after the right edge.
    pub right: u32,
    /// Texels reserved above the top edge.
    pub top: u32,
    /// Texels reserved below the bottom edge.
    pub bottom: u32,
}

impl Padding {
    /// No padding at all.
    pub const ZERO: Self = Self::uniform(0);

    /// The same margin on every side.
    #[inline]
    pub const fn uniform(amount: u32) -> Self {
        Self {
            left: amount,
            right: amount,
            top: amount,
            bottom: amount,
        }
    }

    /// Total horizontal margin, saturating at `u32::MAX`.
    #[inline]
    pub const fn horizontal(self) -> u32 {
        self.left.saturating_add(self.right)
    }

    /// Total vertical margin, saturating at `u32::MAX`.
    #[inline]
    pub const fn vertical(self) -> u32 {
        self.top.saturating_add(self.bottom)
    }
}

/// Address of a tile inside a layered backing store, in units of tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column of the tile.
    pub x: u32,
    /// Row of the tile.
    pub y: u32,
    /// Layer of the tile.
    pub layer: u32,
}

impl TileCoord {
    /// Creates a new tile address.
    #[inline]
    pub const fn new(x: u32, y: u32, layer: u32) -> Self {
        Self { x, y, layer }
    }

    /// The texel region covered by this tile for the given tile size.
    #[inline]
    pub const fn region(self, tile_size: u32) -> StoreRegion {
        StoreRegion {
            x: self.x * tile_size,
            y: self.y * tile_size,
            layer: self.layer,
            size: Extent::new(tile_size, tile_size),
        }
    }
}

/// Dimensions of a layered backing store, in elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StoreDimensions {
    /// Width of every layer.
    pub width: u32,
    /// Height of every layer.
    pub height: u32,
    /// Number of layers.
    pub layers: u32,
}

impl StoreDimensions {
    /// Creates new store dimensions.
    #[inline]
    pub const fn new(width: u32, height: u32, layers: u32) -> Self {
        Self {
            width,
            height,
            layers,
        }
    }

    /// Number of elements in one layer.
    #[inline]
    pub const fn layer_len(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if `region` lies entirely inside the store.
    pub const fn contains(self, region: StoreRegion) -> bool {
        region.layer < self.layers
            && region.x as u64 + region.size.width as u64 <= self.width as u64
            && region.y as u64 + region.size.height as u64 <= self.height as u64
    }
}

/// A rectangle of elements on one layer of a backing store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StoreRegion {
    /// Left edge, in elements.
    pub x: u32,
    /// Top edge, in elements.
    pub y: u32,
    /// Target layer.
    pub layer: u32,
    /// Size of the region.
    pub size: Extent,
}

impl StoreRegion {
    /// Creates a new region.
    #[inline]
    pub const fn new(x: u32, y: u32, layer: u32, size: Extent) -> Self {
        Self { x, y, layer, size }
    }

    /// Number of elements covered by the region.
    #[inline]
    pub const fn len(self) -> usize {
        self.size.width as usize * self.size.height as usize
    }

    /// Returns `true` if the region covers nothing.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.size.is_empty()
    }
}

/// An 8-bit-per-channel RGBA texel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Creates a texel from its channels.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packs the texel into a `u32` in `0xRRGGBBAA` order.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }
}

/// A record stored in an index tile: the tile address of a child tile.
///
/// Whether the child is a color tile or another index tile depends on how
/// many lookups remain when the entry is read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct IndexEntry {
    /// Column of the child tile.
    pub x: u32,
    /// Row of the child tile.
    pub y: u32,
    /// Layer of the child tile.
    pub layer: u32,
}

impl From<TileCoord> for IndexEntry {
    #[inline]
    fn from(tile: TileCoord) -> Self {
        Self {
            x: tile.x,
            y: tile.y,
            layer: tile.layer,
        }
    }
}

impl From<IndexEntry> for TileCoord {
    #[inline]
    fn from(entry: IndexEntry) -> Self {
        Self::new(entry.x, entry.y, entry.layer)
    }
}

/// Integer division rounding towards positive infinity.
#[inline]
pub(crate) const fn divide_up(numerator: u32, denominator: u32) -> u32 {
    numerator.div_ceil(denominator)
}
