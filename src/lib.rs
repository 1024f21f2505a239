//! # rebundle
//!
//! Rebundle media files: decode video frames, re-encode them with a chosen
//! codec, and rebundle the result into a correctly timed container.
//!
//! `rebundle` drives a single-pass transcoding pipeline powered by FFmpeg via
//! the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate: packets
//! are demuxed and decoded into packed RGB24 buffers, re-encoded as planar
//! YUV 4:2:0 with the configured codec into a temporary elementary stream,
//! and finally remuxed into the destination container with timestamps rebuilt
//! from accumulated packet durations.
//!
//! ## Quick Start
//!
//! ### Transcode a File
//!
//! ```no_run
//! use rebundle::Transcoder;
//!
//! let report = Transcoder::new("input.mkv", "output.mp4").run().unwrap();
//! println!("wrote {} frames", report.frames);
//! ```
//!
//! ### Drive the Pipeline by Hand
//!
//! ```no_run
//! use rebundle::{FrameSink, FrameSource, SinkOptions};
//!
//! let mut source = FrameSource::open("input.mp4").unwrap();
//! let options = SinkOptions::new(source.width(), source.height(), source.fps() as u32);
//! let mut sink = FrameSink::create("output.mp4", options).unwrap();
//!
//! while source.read_next().unwrap() {
//!     sink.add_frame(source.current_data()).unwrap();
//! }
//! sink.finish().unwrap();
//! ```
//!
//! ### Probe a File
//!
//! ```no_run
//! use rebundle::FrameSource;
//!
//! let source = FrameSource::open("input.mp4").unwrap();
//! let info = source.info();
//! println!("{}x{} @ {:.2} fps [{}]", info.width, info.height, info.fps, info.codec);
//! ```
//!
//! ## Features
//!
//! - **Single-pass pipeline**: demux, decode, RGB24 conversion, YUV 4:2:0
//!   re-encode, and mux in one linear pass without buffering the frame set
//! - **Two-phase output**: encode into a temporary elementary stream, then
//!   remux into the final container with rebuilt, monotonic timestamps
//! - **Codec selection**: H.264, H.265, or MPEG-4, with bitrate, GOP size,
//!   B-frame, and preset control
//! - **Stream probing**: dimensions, frame rate, duration, codec, pixel
//!   format, and a frame-count estimate, available right after open
//! - **Image interop**: decoded frames as packed RGB24 bytes or owned
//!   [`image::RgbImage`] values
//! - **Scoped temporaries**: the intermediate file is uniquely named and
//!   removed when the sink finishes or drops
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system. See the
//! [README](https://github.com/skanderjeddi/rebundle#installation) for
//! platform-specific instructions.

mod convert;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
mod remux;
pub mod sink;
pub mod source;
pub mod transcode;

pub use error::RebundleError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::StreamInfo;
pub use sink::{FrameSink, SinkOptions, VideoCodec};
pub use source::FrameSource;
pub use transcode::{TranscodeReport, Transcoder};
