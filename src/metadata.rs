//! Stream metadata types.
//!
//! [`StreamInfo`] describes the video stream a [`FrameSource`](crate::FrameSource)
//! has opened. It is computed once at open time and treated as immutable
//! configuration from then on — a sink created for this source should take
//! its dimensions and frame rate from here.

use std::time::Duration;

/// Read-only descriptor of an opened video stream.
///
/// # Example
///
/// ```no_run
/// use rebundle::FrameSource;
///
/// let source = FrameSource::open("input.mp4").unwrap();
/// let info = source.info();
/// println!("{}x{} @ {:.2} fps [{}]", info.width, info.height, info.fps, info.codec);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub fps: f64,
    /// Total duration of the media file.
    pub duration: Duration,
    /// Estimated total number of frames, computed from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Pixel format name of the decoded stream (e.g. `"YUV420P"`), if known.
    pub pixel_format: Option<String>,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska"`).
    pub format: String,
}
