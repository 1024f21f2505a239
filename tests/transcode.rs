//! Transcoding integration tests.
//!
//! Input files are synthesized with a [`FrameSink`] so no fixtures are
//! needed; tests skip when the required encoders are missing from the
//! local FFmpeg build.

use std::{cell::Cell, path::Path, rc::Rc};

use rebundle::{FrameSink, FrameSource, RebundleError, SinkOptions, Transcoder, VideoCodec};

fn encoder_unavailable(error: &RebundleError) -> bool {
    let message = error.to_string();
    message.contains("encoder") || message.contains("Encoder")
}

/// Write a small H.264 MP4 to `path`, or return `false` to skip the test
/// when the encoder is missing.
fn synthesize_input(path: &Path, frames: u64) -> bool {
    let options = SinkOptions::new(64, 64, 24).bitrate_kbps(1000);
    let mut sink = match FrameSink::create(path, options) {
        Ok(sink) => sink,
        Err(error) if encoder_unavailable(&error) => {
            eprintln!("Skipping: encoder not available ({error})");
            return false;
        }
        Err(error) => panic!("Failed to create sink: {error}"),
    };

    let mut frame = vec![0u8; 64 * 64 * 3];
    for index in 0..frames {
        frame.fill((index * 16 % 256) as u8);
        sink.add_frame(&frame).expect("Failed to add frame");
    }
    sink.finish().expect("Failed to finish sink");
    true
}

#[test]
fn transcode_end_to_end() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("input.mp4");
    let output = directory.path().join("output.avi");

    if !synthesize_input(&input, 10) {
        return;
    }

    let result = Transcoder::new(&input, &output)
        .codec(VideoCodec::Mpeg4)
        .bitrate_kbps(800)
        .run();

    // Skip if the MPEG-4 encoder is not available on this platform.
    let report = match result {
        Ok(report) => report,
        Err(error) if encoder_unavailable(&error) => {
            eprintln!("Skipping: encoder not available ({error})");
            return;
        }
        Err(error) => panic!("Failed to transcode: {error}"),
    };

    assert_eq!(report.frames, 10);
    assert_eq!(report.width, 64);
    assert_eq!(report.height, 64);
    assert_eq!(report.fps, 24);
    assert_eq!(report.output, output);
    assert!(output.exists());

    let source = FrameSource::open(&output).expect("Failed to reopen output");
    assert_eq!(source.info().codec, "mpeg4");
}

#[test]
fn progress_callback_fires() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("input.mp4");
    let output = directory.path().join("output.mp4");

    if !synthesize_input(&input, 10) {
        return;
    }

    let calls = Rc::new(Cell::new(0u64));
    let last_done = Rc::new(Cell::new(0u64));

    let callback_calls = Rc::clone(&calls);
    let callback_done = Rc::clone(&last_done);
    let result = Transcoder::new(&input, &output)
        .bitrate_kbps(1000)
        .on_progress(move |done, _total| {
            callback_calls.set(callback_calls.get() + 1);
            callback_done.set(done);
        })
        .run();

    let report = match result {
        Ok(report) => report,
        Err(error) if encoder_unavailable(&error) => {
            eprintln!("Skipping: encoder not available ({error})");
            return;
        }
        Err(error) => panic!("Failed to transcode: {error}"),
    };

    assert_eq!(calls.get(), report.frames, "one callback per frame");
    assert_eq!(last_done.get(), report.frames);
    assert!(report.frames > 0);
}

#[test]
fn fps_override_changes_output_rate() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("input.mp4");
    let output = directory.path().join("output.mp4");

    if !synthesize_input(&input, 10) {
        return;
    }

    let result = Transcoder::new(&input, &output).fps(12).run();
    let report = match result {
        Ok(report) => report,
        Err(error) if encoder_unavailable(&error) => {
            eprintln!("Skipping: encoder not available ({error})");
            return;
        }
        Err(error) => panic!("Failed to transcode: {error}"),
    };

    assert_eq!(report.fps, 12);

    let source = FrameSource::open(&output).expect("Failed to reopen output");
    assert!(
        (source.fps() - 12.0).abs() < 0.01,
        "expected 12 fps, got {}",
        source.fps(),
    );
}

#[test]
fn transcode_missing_input_fails() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = directory.path().join("never_written.mp4");

    let result = Transcoder::new("no_such_input.mp4", &output).run();
    assert!(result.is_err());
    assert!(!output.exists(), "no output file on input failure");
}
