//! Benchmarks for request classification and notification rendering.
//!
//! Benchmark targets:
//! - Classification of a short request: <50us
//! - Rendering a critical notification across every channel: <100us

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use carewatch::delivery::{ChannelCatalog, format, render};
use carewatch::models::{Activity, Channel, Recipient, RequestContext, Urgency};
use carewatch::router::classify_text;

// ============================================================================
// Classification Benchmarks
// ============================================================================

const MEDICATION_TEXT: &str = "Did I take my aspirin this morning?";
const EMERGENCY_TEXT: &str = "There is a fire in the kitchen, please help!";
const COMMUNICATION_TEXT: &str = "Can you call my daughter and tell her I'm fine";
const UNMATCHED_TEXT: &str = "What a lovely afternoon it has been in the garden";

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    let inputs = [
        ("medication", MEDICATION_TEXT),
        ("emergency", EMERGENCY_TEXT),
        ("communication", COMMUNICATION_TEXT),
        ("unmatched", UNMATCHED_TEXT),
    ];

    for (name, text) in inputs {
        group.bench_with_input(BenchmarkId::new("classify_text", name), &text, |b, text| {
            b.iter(|| classify_text(black_box(text)));
        });
    }

    // Long requests exercise every pattern against more text.
    for repeat in [1usize, 8, 32] {
        let text = UNMATCHED_TEXT.repeat(repeat);
        group.bench_with_input(BenchmarkId::new("length", repeat), &text, |b, text| {
            b.iter(|| classify_text(black_box(text)));
        });
    }

    group.finish();
}

// ============================================================================
// Formatting Benchmarks
// ============================================================================

const MESSAGE: &str = "It is time for your aspirin 650. Please take it with a glass of water \
    and let me know once you have, so I don't have to remind you again.";

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    group.measurement_time(Duration::from_secs(5));

    let catalog = ChannelCatalog::default();
    for channel in Channel::ALL {
        let Some(spec) = catalog.spec(channel) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("format", channel), spec, |b, spec| {
            b.iter(|| format(black_box(MESSAGE), spec, Urgency::High));
        });
    }

    let ctx = RequestContext::default()
        .with_activity(Activity::WatchingTv)
        .with_active_device(Channel::Display);
    for urgency in Urgency::ALL {
        group.bench_with_input(BenchmarkId::new("render", urgency), &urgency, |b, urgency| {
            b.iter(|| {
                render(
                    &catalog,
                    black_box(MESSAGE),
                    Recipient::Subject,
                    *urgency,
                    &ctx,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classification, bench_formatting);
criterion_main!(benches);
