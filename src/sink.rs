//! Frame encoding and muxing: [`FrameSink`].
//!
//! `FrameSink` accepts packed RGB24 frames, converts them to planar YUV 4:2:0,
//! and encodes them with the configured codec. Encoding goes to a uniquely
//! named temporary elementary-stream file whose extension pins the codec
//! family; [`finish()`](FrameSink::finish) then remuxes that file into the
//! final container with rebuilt, duration-accumulated timestamps and deletes
//! the temporary file.
//!
//! # Example
//!
//! ```no_run
//! use rebundle::{FrameSink, SinkOptions};
//!
//! let options = SinkOptions::new(640, 480, 24).bitrate_kbps(2000);
//! let mut sink = FrameSink::create("output.mp4", options)?;
//!
//! let frame = vec![0u8; 640 * 480 * 3];
//! sink.add_frame(&frame)?;
//! sink.finish()?;
//! # Ok::<(), rebundle::RebundleError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Dictionary, Packet, Rational,
    codec::{Id, context::Context as CodecContext, encoder::Video as OpenedVideoEncoder},
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    packet::Flags as PacketFlags,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use tempfile::TempPath;

use crate::{convert, error::RebundleError, remux};

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2 (for AVI compatibility).
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }

    /// Filename extension that pins the elementary-stream container format
    /// for this codec family.
    pub(crate) fn elementary_extension(self) -> &'static str {
        match self {
            VideoCodec::H264 => ".h264",
            VideoCodec::H265 => ".hevc",
            VideoCodec::Mpeg4 => ".m4v",
        }
    }
}

/// Options for creating a [`FrameSink`].
///
/// Width, height, and frame rate are required; everything else has a default.
/// Setters are chainable.
///
/// # Example
///
/// ```
/// use rebundle::{SinkOptions, VideoCodec};
///
/// let options = SinkOptions::new(1280, 720, 30)
///     .bitrate_kbps(4000)
///     .codec(VideoCodec::H264)
///     .gop_size(12);
/// ```
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate; also the encoder time base denominator.
    pub fps: u32,
    /// Target bitrate in kilobits per second (default: 12000).
    pub bitrate_kbps: usize,
    /// Codec to encode with. Default is H.264.
    pub codec: VideoCodec,
    /// Keyframe interval in frames (default: 12).
    pub gop_size: u32,
    /// Maximum number of consecutive B-frames (default: 2).
    pub max_b_frames: usize,
    /// Encoder speed preset, applied to H.264 only (default: `"ultrafast"`).
    pub preset: String,
    /// Directory for the temporary elementary-stream file. If `None`, the
    /// final output's parent directory is used.
    pub temp_dir: Option<PathBuf>,
}

impl SinkOptions {
    /// Create options with the required stream geometry and defaults for
    /// everything else.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate_kbps: 12000,
            codec: VideoCodec::H264,
            gop_size: 12,
            max_b_frames: 2,
            preset: "ultrafast".to_string(),
            temp_dir: None,
        }
    }

    /// Set the target bitrate in kilobits per second.
    #[must_use]
    pub fn bitrate_kbps(mut self, bitrate_kbps: usize) -> Self {
        self.bitrate_kbps = bitrate_kbps;
        self
    }

    /// Set the codec.
    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the keyframe interval.
    #[must_use]
    pub fn gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = gop_size;
        self
    }

    /// Set the maximum number of consecutive B-frames.
    #[must_use]
    pub fn max_b_frames(mut self, max_b_frames: usize) -> Self {
        self.max_b_frames = max_b_frames;
        self
    }

    /// Set the H.264 encoder speed preset.
    #[must_use]
    pub fn preset<S: Into<String>>(mut self, preset: S) -> Self {
        self.preset = preset.into();
        self
    }

    /// Set the directory for the temporary elementary-stream file.
    #[must_use]
    pub fn temp_dir<P: Into<PathBuf>>(mut self, temp_dir: P) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), RebundleError> {
        if self.width == 0 || self.height == 0 {
            return Err(RebundleError::InvalidOptions(format!(
                "dimensions must be nonzero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(RebundleError::InvalidOptions(
                "frame rate must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Conversion state allocated on the first `add_frame` call, once the
/// encoder's dimensions are final.
struct Staging {
    /// RGB24 frame the caller's packed buffer is copied into.
    rgb: VideoFrame,
    /// YUV420P frame handed to the encoder.
    yuv: VideoFrame,
    /// RGB24 to YUV420P conversion context.
    scaler: ScalingContext,
}

/// Encodes RGB24 frames and produces a correctly timestamped container.
///
/// Created via [`FrameSink::create`]. Frames are pushed with
/// [`add_frame`](FrameSink::add_frame); [`finish`](FrameSink::finish) flushes
/// the encoder, remuxes the temporary elementary stream into the final
/// container, and removes the temporary file. Dropping an unfinished sink
/// also removes the temporary file.
pub struct FrameSink {
    /// Muxer writing the temporary elementary stream. Must be dropped before
    /// `temp_path` so the file handle is released before deletion.
    output: Output,
    /// The opened encoder.
    encoder: OpenedVideoEncoder,
    /// Index of the single video stream in the temporary container.
    stream_index: usize,
    /// Lazily allocated conversion state.
    staging: Option<Staging>,
    /// Presentation timestamp of the next frame, in encoder time-base units.
    frame_counter: i64,
    /// Validated creation options.
    options: SinkOptions,
    /// Final container path, written during `finish()`.
    final_path: PathBuf,
    /// Temporary elementary-stream path; the file is deleted when this drops.
    temp_path: TempPath,
}

impl Debug for FrameSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameSink")
            .field("options", &self.options)
            .field("final_path", &self.final_path)
            .field("temp_path", &self.temp_path)
            .field("frame_counter", &self.frame_counter)
            .finish_non_exhaustive()
    }
}

impl FrameSink {
    /// Create a sink that will write its final container to `path`.
    ///
    /// Sets up the whole encode leg: a temporary elementary-stream file next
    /// to the output (or in [`SinkOptions::temp_dir`]), an output context for
    /// it, and an encoder configured from `options` (YUV420P,
    /// `bitrate_kbps * 1000` bits per second, time base `1/fps`, frame rate
    /// `fps/1`). The global-header flag is propagated from the container
    /// format's requirements, and the preset is applied when the codec is
    /// H.264. The container header is written before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::InvalidOptions`] for zero dimensions or fps,
    /// and one of [`RebundleError::FormatGuess`],
    /// [`RebundleError::EncoderNotFound`], [`RebundleError::StreamAlloc`],
    /// [`RebundleError::ContextAlloc`], [`RebundleError::EncoderOpen`], or
    /// [`RebundleError::HeaderWrite`] for the corresponding setup step.
    /// Everything acquired before a failure is released on the error return.
    pub fn create<P: AsRef<Path>>(path: P, options: SinkOptions) -> Result<Self, RebundleError> {
        options.validate()?;
        let final_path = path.as_ref().to_path_buf();

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| RebundleError::FileOpen {
            path: final_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        // Unique temporary file; the extension selects the elementary-stream
        // muxer for the codec family.
        let temp_dir = match &options.temp_dir {
            Some(dir) => dir.clone(),
            None => {
                let parent = final_path.parent().unwrap_or_else(|| Path::new("."));
                if parent.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    parent.to_path_buf()
                }
            }
        };
        let temp_path = tempfile::Builder::new()
            .prefix("rebundle-")
            .suffix(options.codec.elementary_extension())
            .tempfile_in(&temp_dir)?
            .into_temp_path();
        let temp_path_buf = temp_path.to_path_buf();

        log::debug!(
            "Creating sink for {} via {}",
            final_path.display(),
            temp_path_buf.display()
        );

        let mut output = ffmpeg_next::format::output(&temp_path_buf).map_err(|error| {
            RebundleError::FormatGuess {
                path: temp_path_buf.clone(),
                reason: error.to_string(),
            }
        })?;

        // The format's flags must be read before `add_stream` borrows the
        // output context.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec_id = options.codec.to_codec_id();
        let encoder_codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| RebundleError::EncoderNotFound(format!("{codec_id:?}")))?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|error| RebundleError::StreamAlloc(error.to_string()))?;
        let stream_index = stream.index();

        let mut encoder = {
            let ctx = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| RebundleError::ContextAlloc(error.to_string()))?;
            ctx.encoder()
                .video()
                .map_err(|error| RebundleError::ContextAlloc(error.to_string()))?
        };

        encoder.set_width(options.width);
        encoder.set_height(options.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_bit_rate(options.bitrate_kbps * 1000);
        encoder.set_time_base(Rational::new(1, options.fps as i32));
        encoder.set_frame_rate(Some(Rational::new(options.fps as i32, 1)));
        encoder.set_gop(options.gop_size);
        encoder.set_max_b_frames(options.max_b_frames);

        // Set global header flag if the format requires it.
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let mut encoder_options = Dictionary::new();
        if options.codec == VideoCodec::H264 {
            encoder_options.set("preset", &options.preset);
        }

        let opened_encoder = encoder
            .open_as_with(encoder_codec, encoder_options)
            .map_err(|error| RebundleError::EncoderOpen(error.to_string()))?;

        // Copy encoder parameters back to the stream.
        stream.set_parameters(&opened_encoder);
        stream.set_time_base(Rational::new(1, options.fps as i32));

        output.write_header().map_err(|error| RebundleError::HeaderWrite {
            path: temp_path_buf.clone(),
            reason: error.to_string(),
        })?;

        log::info!(
            "FrameSink ready: {}x{} @ {} fps, {} kbps, codec={:?}, target={}",
            options.width,
            options.height,
            options.fps,
            options.bitrate_kbps,
            options.codec,
            final_path.display(),
        );

        Ok(Self {
            output,
            encoder: opened_encoder,
            stream_index,
            staging: None,
            frame_counter: 0,
            options,
            final_path,
            temp_path,
        })
    }

    /// Number of frames accepted so far.
    pub fn frames_added(&self) -> u64 {
        self.frame_counter as u64
    }

    /// The options this sink was created with.
    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    /// Encode one packed RGB24 frame.
    ///
    /// The buffer must hold exactly `width * height * 3` bytes. The frame's
    /// presentation timestamp is the number of frames added before it, in
    /// encoder time-base units, so a constant frame rate is assumed. Every
    /// packet the encoder returns here is flagged as a keyframe before being
    /// written; the elementary-stream muxer ignores packet flags, and the
    /// remux pass re-derives timing from packet durations.
    ///
    /// Encoder submission and packet-write failures are logged and swallowed
    /// so a single bad frame does not abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::InvalidFrameData`] for a wrongly sized buffer
    /// and [`RebundleError::BufferAlloc`] if the conversion context cannot be
    /// allocated on the first call.
    pub fn add_frame(&mut self, rgb: &[u8]) -> Result<(), RebundleError> {
        let width = self.options.width;
        let height = self.options.height;
        let expected = convert::packed_rgb_len(width, height);
        if rgb.len() != expected {
            return Err(RebundleError::InvalidFrameData {
                expected,
                actual: rgb.len(),
            });
        }

        // Staging buffers are sized to the encoder's dimensions, which are
        // final from here on.
        let staging = match &mut self.staging {
            Some(staging) => staging,
            None => {
                let scaler = ScalingContext::get(
                    Pixel::RGB24,
                    width,
                    height,
                    Pixel::YUV420P,
                    width,
                    height,
                    ScalingFlags::BICUBIC,
                )
                .map_err(|error| {
                    RebundleError::BufferAlloc(format!(
                        "cannot create YUV conversion context: {error}"
                    ))
                })?;
                self.staging.insert(Staging {
                    rgb: VideoFrame::new(Pixel::RGB24, width, height),
                    yuv: VideoFrame::new(Pixel::YUV420P, width, height),
                    scaler,
                })
            }
        };

        convert::rgb_buffer_to_frame(rgb, &mut staging.rgb, width, height);
        staging.scaler.run(&staging.rgb, &mut staging.yuv)?;

        staging.yuv.set_pts(Some(self.frame_counter));
        self.frame_counter += 1;

        if let Err(error) = self.encoder.send_frame(&staging.yuv) {
            log::warn!(
                "Failed to send frame {} to encoder: {error}",
                self.frame_counter - 1
            );
            return Ok(());
        }

        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.set_flags(packet.flags() | PacketFlags::KEY);
            packet.rescale_ts(
                Rational::new(1, self.options.fps as i32),
                self.output.stream(self.stream_index).unwrap().time_base(),
            );
            if let Err(error) = packet.write_interleaved(&mut self.output) {
                log::warn!("Failed to write encoded packet: {error}");
            }
        }

        Ok(())
    }

    /// Flush the encoder, write the final container, and clean up.
    ///
    /// Drains delayed frames out of the encoder (these keep the flags the
    /// encoder gave them), writes the temporary container's trailer, then
    /// remuxes the temporary elementary stream into the final container with
    /// presentation and decode timestamps rebuilt from accumulated packet
    /// durations. The temporary file is removed whether or not the remux
    /// succeeds.
    ///
    /// If no frame was ever added, the elementary stream is empty and cannot
    /// be reopened, so the final container is written directly from the
    /// encoder's parameters instead (header and trailer, zero packets).
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::EncodeSubmit`] if the encoder rejects the
    /// flush, and [`RebundleError::Remux`] or the remux pass's setup errors
    /// if the final container cannot be written.
    pub fn finish(mut self) -> Result<(), RebundleError> {
        log::debug!(
            "Finishing sink: draining encoder after {} frames",
            self.frame_counter
        );

        self.encoder
            .send_eof()
            .map_err(|error| RebundleError::EncodeSubmit(format!("cannot flush encoder: {error}")))?;

        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(
                Rational::new(1, self.options.fps as i32),
                self.output.stream(self.stream_index).unwrap().time_base(),
            );
            packet
                .write_interleaved(&mut self.output)
                .map_err(|error| {
                    RebundleError::Ffmpeg(format!("cannot write drained packet: {error}"))
                })?;
        }

        self.output
            .write_trailer()
            .map_err(|error| RebundleError::Ffmpeg(format!("cannot write trailer: {error}")))?;

        // The muxer must release the temporary file before the remux pass
        // reopens it (and before deletion, on Windows).
        drop(self.output);

        let frames = self.frame_counter;
        let result = if frames == 0 {
            log::warn!(
                "No frames were added; writing an empty container to {}",
                self.final_path.display()
            );
            Self::write_empty_container(
                &self.final_path,
                self.options.codec,
                &self.encoder,
                self.options.fps,
            )
        } else {
            remux::rebuild_timestamps(self.temp_path.as_ref(), &self.final_path, self.options.fps)
        };

        if let Err(error) = self.temp_path.close() {
            log::debug!("Failed to remove temporary file: {error}");
        }

        match &result {
            Ok(()) => log::info!("Wrote {} ({frames} frames)", self.final_path.display()),
            Err(error) => log::debug!("Failed to finalize {}: {error}", self.final_path.display()),
        }
        result
    }

    /// Write a header-and-trailer-only container carrying the encoder's
    /// stream parameters. Used when zero frames were added, where the empty
    /// elementary stream cannot be probed as remux input.
    fn write_empty_container(
        path: &Path,
        codec: VideoCodec,
        encoder: &OpenedVideoEncoder,
        fps: u32,
    ) -> Result<(), RebundleError> {
        let mut output =
            ffmpeg_next::format::output(&path).map_err(|error| RebundleError::FormatGuess {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        let codec_id = codec.to_codec_id();
        let encoder_codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| RebundleError::EncoderNotFound(format!("{codec_id:?}")))?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|error| RebundleError::StreamAlloc(error.to_string()))?;
        stream.set_parameters(encoder);
        stream.set_time_base(Rational::new(1, fps as i32));
        unsafe {
            (*stream.parameters().as_mut_ptr()).codec_tag = 0;
        }

        output.write_header().map_err(|error| RebundleError::HeaderWrite {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        output
            .write_trailer()
            .map_err(|error| RebundleError::Remux(format!("cannot write trailer: {error}")))?;
        Ok(())
    }
}
