// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate contains the integration test suite for `gpu_atlas`.
//!
//! - The `util` module contains shared helpers: store and atlas constructors, texel
//!   generators and assertions about disjointness.
//! - We do not use the default Rust test harness, but instead use this `mod.rs` file as the
//!   entry point to run all other tests, so that every topic module can share `util`.
//! - For test naming, put the "topic" of the test at the start of the name, e.g.
//!   `tiled_growth_preserves_addresses` rather than `growth_preserves_tiled_addresses`.

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(clippy::cast_possible_truncation, reason = "not critical for testing")]

mod color_stops;
#[macro_use]
mod util;
