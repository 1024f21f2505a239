//! Transcode a video file end to end.
//!
//! Usage: `cargo run --example transcode -- path/to/video.mp4`

use rebundle::{RebundleError, Transcoder, VideoCodec};

fn main() -> Result<(), RebundleError> {
    let path = std::env::args()
        .nth(1)
        .expect("Usage: transcode <video_path>");

    // Re-encode to H.264 at 4 Mbit/s, keeping the source frame rate.
    let output = "transcoded.mp4";
    let report = Transcoder::new(&path, output)
        .codec(VideoCodec::H264)
        .bitrate_kbps(4000)
        .on_progress(|done, total| {
            if done % 50 == 0 {
                println!("  frame {done}/{total}");
            }
        })
        .run()?;

    let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    println!(
        "Wrote {} frame(s) to {output} ({}x{} @ {} fps, {size} bytes)",
        report.frames, report.width, report.height, report.fps,
    );
    std::fs::remove_file(output).ok();

    Ok(())
}
