//! Benchmarks for the decode and encode legs of the pipeline.
//!
//! Run with: cargo bench
//!
//! Inputs are synthesized on the fly, so no fixtures are needed; all
//! benchmarks are skipped when the H.264 encoder is missing from the
//! local FFmpeg build.

use std::path::{Path, PathBuf};

use criterion::Criterion;
use ffmpeg_next::util::log::Level as LogLevel;
use rebundle::{FrameSink, FrameSource, SinkOptions, Transcoder};

fn gradient_frame(width: u32, height: u32, index: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push((index * 20 % 256) as u8);
        }
    }
    data
}

/// Write a small H.264 MP4 into `directory`, or return `None` (skipping the
/// benchmark) when the encoder is unavailable.
fn synthesize_input(directory: &Path, frames: u64) -> Option<PathBuf> {
    let path = directory.join("bench_input.mp4");
    let options = SinkOptions::new(64, 64, 24).bitrate_kbps(1000);
    let mut sink = match FrameSink::create(&path, options) {
        Ok(sink) => sink,
        Err(error) => {
            eprintln!("Skipping benchmark: cannot create sink ({error})");
            return None;
        }
    };
    for index in 0..frames {
        sink.add_frame(&gradient_frame(64, 64, index)).ok()?;
    }
    sink.finish().ok()?;
    Some(path)
}

fn benchmark_encoding(criterion: &mut Criterion) {
    ffmpeg_next::util::log::set_level(LogLevel::Error);

    let directory = tempfile::tempdir().unwrap();
    if synthesize_input(directory.path(), 1).is_none() {
        return;
    }

    let frames: Vec<Vec<u8>> = (0..10).map(|index| gradient_frame(64, 64, index)).collect();

    let mut group = criterion.benchmark_group("encode");
    group.sample_size(20);
    group.bench_function("encode 10 frames 64x64", |bencher| {
        let output = directory.path().join("encode_bench.mp4");
        bencher.iter(|| {
            let options = SinkOptions::new(64, 64, 24).bitrate_kbps(1000);
            let mut sink = FrameSink::create(&output, options).unwrap();
            for frame in &frames {
                sink.add_frame(frame).unwrap();
            }
            sink.finish().unwrap();
        });
        let _ = std::fs::remove_file(&output);
    });
    group.finish();
}

fn benchmark_decoding(criterion: &mut Criterion) {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = synthesize_input(directory.path(), 30) else {
        return;
    };

    criterion.bench_function("decode 30 frames to RGB", |bencher| {
        bencher.iter(|| {
            let mut source = FrameSource::open(&input).unwrap();
            let frames = source.for_each_frame(|_, _| Ok(())).unwrap();
            assert_eq!(frames, 30);
        });
    });
}

fn benchmark_probe(criterion: &mut Criterion) {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = synthesize_input(directory.path(), 10) else {
        return;
    };

    criterion.bench_function("open and probe", |bencher| {
        bencher.iter(|| {
            let source = FrameSource::open(&input).unwrap();
            let _info = source.info().clone();
        });
    });
}

fn benchmark_full_pipeline(criterion: &mut Criterion) {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = synthesize_input(directory.path(), 30) else {
        return;
    };

    let mut group = criterion.benchmark_group("transcode");
    group.sample_size(10);
    group.bench_function("30 frames mp4 to mp4", |bencher| {
        let output = directory.path().join("transcode_bench.mp4");
        bencher.iter(|| {
            Transcoder::new(&input, &output)
                .bitrate_kbps(1000)
                .run()
                .unwrap();
        });
        let _ = std::fs::remove_file(&output);
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_encoding,
    benchmark_decoding,
    benchmark_probe,
    benchmark_full_pipeline,
);
criterion::criterion_main!(benches);
