// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Optional `bytemuck` trait impls.

#![allow(
    unsafe_code,
    reason = "The `bytemuck` marker traits are `unsafe` and require `unsafe impl`."
)]

use bytemuck::{Pod, Zeroable};

use crate::{IndexEntry, Rgba8};

// Safety: The struct is `repr(C)` with four `u8` fields and no padding.
unsafe impl Zeroable for Rgba8 {}

// Safety: The struct is `repr(C)` with four `u8` fields and no padding;
// every bit pattern is valid.
unsafe impl Pod for Rgba8 {}

// Safety: The struct is `repr(C)` with three `u32` fields and no padding.
unsafe impl Zeroable for IndexEntry {}

// Safety: The struct is `repr(C)` with three `u32` fields and no padding;
// every bit pattern is valid.
unsafe impl Pod for IndexEntry {}
