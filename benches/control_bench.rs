//! Benchmarks for the control path and the audio callback.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - control/*  Mapping and gesture handling on the UI thread
//!   - dsp/*      Filter and reverb blocks
//!   - engine/*   Full voice -> filter -> reverb -> analyser render

use std::{
    hint::black_box,
    time::{Duration, Instant},
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use retro_synth::{
    control::{mapping, Control, GestureSettings, PointerSample},
    dsp::{FilterType, Reverb, SVFilter},
    engine::{EngineConfig, NativeEngine},
    graph::AudioGraphManager,
    notes::{KeyInputMapper, NoteId},
    params::{ParamId, SynthParameters, Waveform},
    session::Session,
};

/// Common buffer sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn bench_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("control/mapping");
    let range = ParamId::FilterFrequency.range();

    group.bench_function("log_round_trip", |b| {
        b.iter(|| {
            let t = range.normalize(black_box(1234.5));
            black_box(range.denormalize(t))
        })
    });
    group.bench_function("db_to_ratio", |b| {
        b.iter(|| black_box(mapping::db_to_ratio(black_box(-12.0))))
    });
    group.finish();
}

fn bench_gesture(c: &mut Criterion) {
    let mut group = c.benchmark_group("control/gesture");
    let id = ParamId::FilterFrequency;

    group.bench_function("drag_1000_moves", |b| {
        b.iter(|| {
            let mut knob = Control::knob(id.range(), 1000.0, GestureSettings::default());
            let t0 = Instant::now();
            knob.on_drag_start(PointerSample::mouse(0.0, 500.0), t0);
            for i in 0..1000u32 {
                let now = t0 + Duration::from_micros(u64::from(i) * 100);
                black_box(knob.on_drag_move(PointerSample::mouse(0.0, 500.0 - f64::from(i) * 0.3), now));
            }
            black_box(knob.on_drag_end(t0 + Duration::from_millis(100)))
        })
    });
    group.finish();
}

fn bench_dsp(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let mut filter = SVFilter::new(48_000.0, FilterType::LowPass, 1000.0, 2.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("filter_lowpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.render(black_box(&mut buffer));
            })
        });

        let mut reverb = Reverb::new(48_000.0, 0.3, 20.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("reverb", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                reverb.render(black_box(&mut buffer));
            })
        });
    }
    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/render");

    for &size in BLOCK_SIZES {
        let (engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let (mut session, _) = Session::start(
            AudioGraphManager::new(engine),
            SynthParameters::default(),
            KeyInputMapper::new(),
        );
        let _ = session.set_waveform(Waveform::Sawtooth);
        // full polyphony is the worst case
        for midi in [48, 52, 55, 60, 64, 67, 71, 72] {
            let _ = session.note_on(NoteId::new(midi));
        }

        let mut buffer = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::new("eight_voices", size), &size, |b, _| {
            b.iter(|| renderer.render(black_box(&mut buffer)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mapping, bench_gesture, bench_dsp, bench_engine);
criterion_main!(benches);
