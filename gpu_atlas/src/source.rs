// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texel sources that tiled images are uploaded from.

use crate::geometry::{Extent, Rgba8};

/// Supplies texels for an image being placed on a [`TiledAtlas`].
///
/// Locations are signed because tiles with slack reach past the image
/// edges; texels outside the image are taken from the nearest edge texel.
///
/// [`TiledAtlas`]: crate::TiledAtlas
pub trait ImageSource {
    /// Size of the image, in texels.
    fn dimensions(&self) -> Extent;

    /// Whether `(x, y)` names a texel of the image itself.
    fn contains(&self, x: i64, y: i64) -> bool {
        let dims = self.dimensions();
        x >= 0 && y >= 0 && x < i64::from(dims.width) && y < i64::from(dims.height)
    }

    /// Fill `dst` (row-major, `size.width * size.height` texels) with the
    /// texels of the square starting at `(x, y)`, clamping to the edges.
    fn fetch_texels(&self, x: i64, y: i64, size: Extent, dst: &mut [Rgba8]);

    /// If every texel of the region (after clamping) has the same value,
    /// returns it.
    ///
    /// This is only a hint; the default never reports a constant region.
    fn all_same_color(&self, x: i64, y: i64, size: Extent) -> Option<Rgba8> {
        let _ = (x, y, size);
        None
    }
}

/// An [`ImageSource`] over a borrowed row-major slice of texels.
#[derive(Clone, Copy, Debug)]
pub struct RgbaSource<'a> {
    texels: &'a [Rgba8],
    dimensions: Extent,
}

impl<'a> RgbaSource<'a> {
    /// Wraps `texels` as an image of the given size.
    ///
    /// Returns `None` if the slice length does not match the size or the
    /// size is empty.
    pub fn new(texels: &'a [Rgba8], dimensions: Extent) -> Option<Self> {
        if dimensions.is_empty() || dimensions.area() != texels.len() as u64 {
            return None;
        }
        Some(Self {
            texels,
            dimensions,
        })
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the result is clamped to the image, whose sides fit in u32"
    )]
    fn clamp_x(&self, x: i64) -> usize {
        x.clamp(0, i64::from(self.dimensions.width) - 1) as usize
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the result is clamped to the image, whose sides fit in u32"
    )]
    fn clamp_y(&self, y: i64) -> usize {
        y.clamp(0, i64::from(self.dimensions.height) - 1) as usize
    }

    fn texel(&self, x: usize, y: usize) -> Rgba8 {
        self.texels[y * self.dimensions.width as usize + x]
    }
}

impl ImageSource for RgbaSource<'_> {
    fn dimensions(&self) -> Extent {
        self.dimensions
    }

    fn fetch_texels(&self, x: i64, y: i64, size: Extent, dst: &mut [Rgba8]) {
        assert_eq!(
            dst.len() as u64,
            size.area(),
            "destination does not cover the region"
        );
        let width = size.width as usize;
        for (row, line) in dst.chunks_exact_mut(width.max(1)).enumerate() {
            let sy = self.clamp_y(y + row as i64);
            for (col, out) in line.iter_mut().enumerate() {
                *out = self.texel(self.clamp_x(x + col as i64), sy);
            }
        }
    }

    fn all_same_color(&self, x: i64, y: i64, size: Extent) -> Option<Rgba8> {
        if size.is_empty() {
            return None;
        }
        // Clamping maps the region onto this range of real texels.
        let (x0, x1) = (self.clamp_x(x), self.clamp_x(x + i64::from(size.width) - 1));
        let (y0, y1) = (self.clamp_y(y), self.clamp_y(y + i64::from(size.height) - 1));
        let first = self.texel(x0, y0);
        for sy in y0..=y1 {
            for sx in x0..=x1 {
                if self.texel(sx, sy) != first {
                    return None;
                }
            }
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn gradient(width: u32, height: u32) -> Vec<Rgba8> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| Rgba8::new(x as u8, y as u8, 0, 255)))
            .collect()
    }

    #[test]
    fn rejects_mismatched_slice() {
        let texels = gradient(4, 4);
        assert!(RgbaSource::new(&texels, Extent::new(4, 3)).is_none());
        assert!(RgbaSource::new(&[], Extent::new(0, 0)).is_none());
    }

    #[test]
    fn fetch_clamps_outside_texels() {
        let texels = gradient(4, 4);
        let source = RgbaSource::new(&texels, Extent::new(4, 4)).unwrap();
        let mut dst = vec![Rgba8::TRANSPARENT; 9];
        source.fetch_texels(-1, 2, Extent::new(3, 3), &mut dst);
        // Row y=2, then y=3, then y=4 clamped to 3.
        assert_eq!(dst[0], Rgba8::new(0, 2, 0, 255));
        assert_eq!(dst[1], Rgba8::new(0, 2, 0, 255));
        assert_eq!(dst[2], Rgba8::new(1, 2, 0, 255));
        assert_eq!(dst[8], Rgba8::new(1, 3, 0, 255));
    }

    #[test]
    fn same_color_detection() {
        let mut texels = vec![Rgba8::new(9, 9, 9, 255); 16];
        texels[15] = Rgba8::TRANSPARENT;
        let source = RgbaSource::new(&texels, Extent::new(4, 4)).unwrap();
        assert_eq!(
            source.all_same_color(-2, -2, Extent::new(4, 4)),
            Some(Rgba8::new(9, 9, 9, 255))
        );
        assert_eq!(source.all_same_color(2, 2, Extent::new(4, 4)), None);
        assert!(source.contains(3, 3));
        assert!(!source.contains(-1, 0));
    }
}
