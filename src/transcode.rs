//! End-to-end transcoding: [`Transcoder`].
//!
//! `Transcoder` wires a [`FrameSource`](crate::FrameSource) to a
//! [`FrameSink`](crate::FrameSink): it opens the input, creates a sink with
//! the source's dimensions and frame rate, pumps every decoded frame through,
//! and finalizes the output. Encoding parameters can be overridden before
//! running; anything left unset uses the sink defaults.
//!
//! # Example
//!
//! ```no_run
//! use rebundle::{Transcoder, VideoCodec};
//!
//! let report = Transcoder::new("input.mkv", "output.mp4")
//!     .codec(VideoCodec::H264)
//!     .bitrate_kbps(4000)
//!     .run()?;
//! println!("wrote {} frames to {}", report.frames, report.output.display());
//! # Ok::<(), rebundle::RebundleError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use crate::{
    error::RebundleError,
    sink::{FrameSink, SinkOptions, VideoCodec},
    source::FrameSource,
};

/// Callback invoked after each transcoded frame with the number of frames
/// done and the source's estimated total (0 when unknown).
type ProgressCallback = Box<dyn FnMut(u64, u64)>;

/// Summary of a completed transcode run.
#[derive(Debug, Clone)]
#[must_use]
pub struct TranscodeReport {
    /// Number of frames decoded and re-encoded.
    pub frames: u64,
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Path of the final container.
    pub output: PathBuf,
}

/// Builder for a full decode/re-encode run between two files.
///
/// Obtained via [`Transcoder::new`]. Configure the codec, bitrate, and other
/// encoder parameters, then call [`run`](Transcoder::run) to produce the
/// output file.
pub struct Transcoder {
    input: PathBuf,
    output: PathBuf,
    codec: Option<VideoCodec>,
    bitrate_kbps: Option<usize>,
    fps: Option<u32>,
    gop_size: Option<u32>,
    max_b_frames: Option<usize>,
    preset: Option<String>,
    temp_dir: Option<PathBuf>,
    progress: Option<ProgressCallback>,
}

impl Debug for Transcoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Transcoder")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("codec", &self.codec)
            .field("bitrate_kbps", &self.bitrate_kbps)
            .field("fps", &self.fps)
            .finish_non_exhaustive()
    }
}

impl Transcoder {
    /// Create a transcoder from an input file to an output file.
    ///
    /// The output container format is inferred from the file extension.
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(input: P1, output: P2) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            codec: None,
            bitrate_kbps: None,
            fps: None,
            gop_size: None,
            max_b_frames: None,
            preset: None,
            temp_dir: None,
            progress: None,
        }
    }

    /// Set the output codec.
    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Set the target bitrate in kilobits per second.
    #[must_use]
    pub fn bitrate_kbps(mut self, bitrate_kbps: usize) -> Self {
        self.bitrate_kbps = Some(bitrate_kbps);
        self
    }

    /// Override the output frame rate. If not set, the source's frame rate
    /// is used, truncated to an integer.
    #[must_use]
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Set the keyframe interval.
    #[must_use]
    pub fn gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = Some(gop_size);
        self
    }

    /// Set the maximum number of consecutive B-frames.
    #[must_use]
    pub fn max_b_frames(mut self, max_b_frames: usize) -> Self {
        self.max_b_frames = Some(max_b_frames);
        self
    }

    /// Set the H.264 encoder speed preset.
    #[must_use]
    pub fn preset<S: Into<String>>(mut self, preset: S) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Set the directory for the intermediate elementary-stream file.
    #[must_use]
    pub fn temp_dir<P: Into<PathBuf>>(mut self, temp_dir: P) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Register a progress callback.
    ///
    /// Called after each frame with the number of frames transcoded so far
    /// and the source's estimated frame count (0 when the source cannot
    /// estimate it).
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u64, u64) + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Run the transcode and write the final container.
    ///
    /// # Errors
    ///
    /// Propagates every failure from [`FrameSource::open`],
    /// [`FrameSink::create`], the per-frame read loop, and
    /// [`FrameSink::finish`]. The output file is not cleaned up on failure;
    /// the intermediate temporary file always is.
    pub fn run(mut self) -> Result<TranscodeReport, RebundleError> {
        log::info!(
            "Transcoding {} to {}",
            self.input.display(),
            self.output.display()
        );

        let mut source = FrameSource::open(&self.input)?;

        let fps = match self.fps {
            Some(fps) => fps,
            None => source.fps() as u32,
        };

        let mut options = SinkOptions::new(source.width(), source.height(), fps);
        if let Some(codec) = self.codec {
            options = options.codec(codec);
        }
        if let Some(bitrate_kbps) = self.bitrate_kbps {
            options = options.bitrate_kbps(bitrate_kbps);
        }
        if let Some(gop_size) = self.gop_size {
            options = options.gop_size(gop_size);
        }
        if let Some(max_b_frames) = self.max_b_frames {
            options = options.max_b_frames(max_b_frames);
        }
        if let Some(preset) = self.preset.take() {
            options = options.preset(preset);
        }
        if let Some(temp_dir) = self.temp_dir.take() {
            options = options.temp_dir(temp_dir);
        }

        let mut sink = FrameSink::create(&self.output, options)?;

        let estimated = source.info().frame_count;
        let mut frames: u64 = 0;
        while source.read_next()? {
            sink.add_frame(source.current_data())?;
            frames += 1;
            if let Some(callback) = self.progress.as_mut() {
                callback(frames, estimated);
            }
        }

        sink.finish()?;

        log::info!(
            "Transcoded {frames} frames to {}",
            self.output.display()
        );

        Ok(TranscodeReport {
            frames,
            width: source.width(),
            height: source.height(),
            fps,
            output: self.output,
        })
    }
}
