// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color ramps for gradients.
//!
//! A gradient is described by a [`ColorStopSequence`] and sampled into a
//! short run of texels on one row of a [`ColorStopAtlas`], which a shader
//! then reads with linear filtering.

mod atlas;
mod interval;
mod sequence;

pub use atlas::{ColorRamp, ColorSpan, ColorStopAtlas};
pub use sequence::{ColorStop, ColorStopSequence};
