//! Codec and overlay benchmark suite.
//!
//! Benchmarks the per-frame hot paths:
//! - Envelope encoding and decoding
//! - Mapping detection boxes onto the canvas
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use media_channel::overlay::{DisplayList, Surface};
use media_channel::protocol::{self, Envelope};
use media_channel::{Color, EventId, OverlayBox, SessionId, Size, Transform};
use serde_json::json;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BOX_COUNTS: &[usize] = &[1, 16, 128];

fn face_frame(boxes: usize) -> String {
    let layouts: Vec<_> = (0..boxes)
        .map(|i| json!({"id": i, "x0": 10 * i, "y0": 20, "x1": 10 * i + 64, "y1": 84}))
        .collect();
    json!({"id": "abc", "type": 1, "event": "data", "opts": {"type": "face"}, "data": layouts})
        .to_string()
}

// ============================================================================
// Benchmark: Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let call = Envelope::call("camera-move", EventId::new(42))
        .with_id(Some(SessionId::from("abc")))
        .with_data(Some(json!([{"x": 1.5, "y": -2.0}])));
    group.bench_function("encode_call", |b| {
        b.iter(|| protocol::encode(black_box(&call)));
    });

    let reply = json!({
        "id": "abc",
        "type": 3,
        "event": "camera-move",
        "eventId": 42,
        "data": [{"result": true, "msg": "ok"}],
    })
    .to_string();
    group.bench_function("decode_reply", |b| {
        b.iter(|| protocol::decode(black_box(&reply)));
    });

    for &count in BOX_COUNTS {
        let frame = face_frame(count);
        group.bench_with_input(BenchmarkId::new("parse_data", count), &frame, |b, frame| {
            b.iter(|| protocol::parse(black_box(frame)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Overlay
// ============================================================================

fn bench_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay");

    let Ok(mut transform) = Transform::new(Size::new(1920.0, 1080.0), Size::new(1280.0, 720.0))
    else {
        return;
    };

    for full_screen in [false, true] {
        if full_screen && transform.set_full_screen(1280.0, 720.0).is_err() {
            return;
        }
        for &count in BOX_COUNTS {
            let boxes: Vec<_> = (0..count)
                .map(|i| {
                    let x = (i * 10) as f64;
                    OverlayBox::new(i as i64, x, 20.0, x + 64.0, 84.0)
                })
                .collect();
            let name = if full_screen { "map_full_screen" } else { "map" };

            group.bench_with_input(BenchmarkId::new(name, count), &boxes, |b, boxes| {
                let mut list = DisplayList::new();
                b.iter(|| {
                    list.clear_rect(transform.clear_region());
                    for overlay_box in boxes {
                        list.stroke_rect(transform.map_box(black_box(overlay_box)), Color::RED);
                    }
                    list.take()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_overlay);
criterion_main!(benches);
