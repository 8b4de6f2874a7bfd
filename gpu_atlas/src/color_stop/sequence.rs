// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec;
use alloc::vec::Vec;

use crate::geometry::Rgba8;

/// A color at a place along a gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop {
    /// Position along the gradient, normally in `[0, 1]`.
    pub place: f32,
    /// Color at that position.
    pub color: Rgba8,
}

impl ColorStop {
    /// Creates a new color stop.
    pub const fn new(place: f32, color: Rgba8) -> Self {
        Self { place, color }
    }
}

/// Color stops sorted by place.
///
/// Stops sharing a place are kept in the order they were added, which
/// gives a hard color change at that place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorStopSequence {
    stops: Vec<ColorStop>,
}

impl ColorStopSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stop, keeping the sequence sorted.
    pub fn add(&mut self, stop: ColorStop) {
        debug_assert!(!stop.place.is_nan(), "color stop place is NaN");
        let at = self.stops.partition_point(|s| s.place <= stop.place);
        self.stops.insert(at, stop);
    }

    /// The stops, sorted by place.
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Number of stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Whether the sequence has no stops.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Removes every stop.
    pub fn clear(&mut self) {
        self.stops.clear();
    }

    /// Samples the gradient into `width` texels, with `start_slack` extra
    /// texels before and `end_slack` after.
    ///
    /// Texel `i` of the main run samples place `i / width`. Places before
    /// the first stop or after the last take the color of that stop.
    pub(crate) fn discretize(&self, width: u32, start_slack: u32, end_slack: u32) -> Vec<Rgba8> {
        let total = (width + start_slack + end_slack) as usize;
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return vec![Rgba8::TRANSPARENT; total];
        };

        let mut data = Vec::with_capacity(total);
        let dt = 1.0 / width as f32;
        let mut t = -(start_slack as f32) * dt;

        while data.len() < total && t <= first.place {
            data.push(first.color);
            t += dt;
        }
        for pair in self.stops.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            while data.len() < total && t < next.place {
                data.push(interpolate(prev, next, t));
                t += dt;
            }
        }
        data.resize(total, last.color);
        data
    }
}

impl Extend<ColorStop> for ColorStopSequence {
    fn extend<T: IntoIterator<Item = ColorStop>>(&mut self, iter: T) {
        for stop in iter {
            self.add(stop);
        }
    }
}

impl FromIterator<ColorStop> for ColorStopSequence {
    fn from_iter<T: IntoIterator<Item = ColorStop>>(iter: T) -> Self {
        let mut sequence = Self::new();
        sequence.extend(iter);
        sequence
    }
}

fn interpolate(from: ColorStop, to: ColorStop, t: f32) -> Rgba8 {
    let span = to.place - from.place;
    let s = if span > 0.0 {
        ((t - from.place) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let a = from.color;
    let b = to.color;
    Rgba8::new(
        lerp(a.r, b.r, s),
        lerp(a.g, b.g, s),
        lerp(a.b, b.b, s),
        lerp(a.a, b.a, s),
    )
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "s lies in [0, 1], so the result lies between a and b"
)]
fn lerp(a: u8, b: u8, s: f32) -> u8 {
    let (a, b) = (f32::from(a), f32::from(b));
    (a + s * (b - a)) as u8
}
