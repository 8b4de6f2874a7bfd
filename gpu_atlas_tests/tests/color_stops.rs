// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for color ramps.

use gpu_atlas::{
    AllocErrorKind, ColorRamp, ColorStop, ColorStopAtlas, ColorStopSequence, CpuBackingStore,
    Extent, Rgba8, StoreDimensions, StoreRegion,
};

use crate::test_name;
use crate::util::TestEnv;

const RED: Rgba8 = Rgba8::new(255, 0, 0, 255);
const BLUE: Rgba8 = Rgba8::new(0, 0, 255, 255);

type CpuColorStopAtlas = ColorStopAtlas<CpuBackingStore<Rgba8>>;

fn atlas(width: u32, layers: u32, resizable: bool) -> CpuColorStopAtlas {
    ColorStopAtlas::new(CpuBackingStore::new(
        StoreDimensions::new(width, 1, layers),
        resizable,
    ))
}

fn red_to_blue() -> ColorStopSequence {
    [ColorStop::new(0.0, RED), ColorStop::new(1.0, BLUE)]
        .into_iter()
        .collect()
}

/// Reads back the whole span of `ramp`, slack included.
fn read_span(atlas: &CpuColorStopAtlas, ramp: &ColorRamp) -> Vec<Rgba8> {
    let span = ramp.span();
    atlas.flush();
    atlas.with_store(|store| {
        store.read_region(StoreRegion::new(
            span.x(),
            0,
            span.layer(),
            Extent::new(span.width(), 1),
        ))
    })
}

#[test]
fn color_stops_ramp_has_slack_on_both_ends() {
    let _env = TestEnv::new(test_name!());
    let atlas = atlas(16, 1, false);
    let ramp = atlas.allocate_sequence(&red_to_blue(), 8).unwrap();

    assert_eq!(ramp.width(), 8);
    assert_eq!(ramp.span().width(), 10);
    assert_eq!(ramp.texel_location(), (ramp.span().x() + 1, ramp.span().layer()));

    let texels = read_span(&atlas, &ramp);
    assert_eq!(texels[0], RED);
    assert_eq!(texels[1], RED);
    assert_eq!(texels[9], BLUE);
    assert!(texels[5].b > texels[3].b);

    let bytes: &[u8] = bytemuck::cast_slice(&texels);
    assert_eq!(bytes.len(), 40);
    assert_eq!(&bytes[..4], &[255, 0, 0, 255]);
    assert_eq!(&bytes[36..], &[0, 0, 255, 255]);
}

#[test]
fn color_stops_wide_ramps_take_whole_rows() {
    let _env = TestEnv::new(test_name!());
    let atlas = atlas(16, 1, true);
    let small = atlas.allocate_sequence(&red_to_blue(), 8).unwrap();
    assert_eq!(small.span().layer(), 0);

    // Wider than the store: clamped to one row without slack.
    let full = atlas.allocate_sequence(&red_to_blue(), 40).unwrap();
    assert_eq!(full.width(), 16);
    assert_eq!(full.texel_location(), (0, 1));
    assert_eq!(atlas.store_dimensions().layers, 2);

    // One short of the store: slack at the end only.
    let almost = atlas.allocate_sequence(&red_to_blue(), 15).unwrap();
    assert_eq!(almost.span().width(), 16);
    assert_eq!(almost.texel_location(), (0, 2));
    assert_eq!(atlas.store_dimensions().layers, 4);

    let texels = read_span(&atlas, &almost);
    assert_eq!(texels[0], RED);
    assert_eq!(texels[15].r, 0);
    assert!(texels[15].b >= 254);

    assert_eq!(atlas.total_available(), 64 - 10 - 16 - 16);
    atlas.deallocate(small.into_span());
    assert_eq!(atlas.total_available(), 64 - 16 - 16);

    // The freed row is the first of the tightest fits again.
    let reused = atlas.allocate(&[RED; 10]).unwrap();
    assert_eq!((reused.x(), reused.layer()), (0, 0));

    atlas.deallocate(reused);
    atlas.deallocate(full.into_span());
    atlas.deallocate(almost.into_span());
    assert_eq!(atlas.total_available(), 64);
}

#[test]
fn color_stops_rejected_requests() {
    let _env = TestEnv::new(test_name!());
    let atlas = atlas(8, 1, false);

    let err = atlas.allocate(&[]).unwrap_err();
    assert_eq!(err.kind(), AllocErrorKind::Empty);
    let err = atlas.allocate_sequence(&red_to_blue(), 0).unwrap_err();
    assert_eq!(err.kind(), AllocErrorKind::Empty);
    let err = atlas.allocate(&[RED; 9]).unwrap_err();
    assert_eq!(err.kind(), AllocErrorKind::ExceedsMaxWidth);

    let span = atlas.allocate(&[BLUE; 6]).unwrap();
    let err = atlas.allocate(&[BLUE; 3]).unwrap_err();
    assert_eq!(err.kind(), AllocErrorKind::OutOfSpace);
    assert_eq!(atlas.largest_allocation_possible(), 2);
    assert_eq!(atlas.store_dimensions().layers, 1);
    atlas.deallocate(span);
    assert_eq!(atlas.largest_allocation_possible(), 8);
}

#[test]
fn color_stops_empty_sequence_is_transparent() {
    let _env = TestEnv::new(test_name!());
    let atlas = atlas(8, 1, false);
    let ramp = atlas
        .allocate_sequence(&ColorStopSequence::new(), 4)
        .unwrap();
    let texels = read_span(&atlas, &ramp);
    assert!(texels.iter().all(|&t| t == Rgba8::TRANSPARENT));
}
