//! Frame decoding: [`FrameSource`].
//!
//! `FrameSource` opens a media container, locates its best video stream, and
//! decodes it frame by frame into a packed RGB24 buffer. The buffer is owned
//! by the source and overwritten in place on every successful
//! [`read_next()`](FrameSource::read_next), so a caller that needs to keep a
//! frame must copy it out before pulling the next one.
//!
//! # Example
//!
//! ```no_run
//! use rebundle::FrameSource;
//!
//! let mut source = FrameSource::open("input.mp4")?;
//! println!("{}x{} @ {:.2} fps", source.width(), source.height(), source.fps());
//!
//! while source.read_next()? {
//!     let rgb = source.current_data();
//!     assert_eq!(rgb.len(), (source.width() * source.height() * 3) as usize);
//! }
//! # Ok::<(), rebundle::RebundleError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError,
    Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{convert, error::RebundleError, metadata::StreamInfo};

/// Decodes the best video stream of a media file into packed RGB24 frames.
///
/// Created via [`FrameSource::open`]. All stream metadata is probed once at
/// open time and available through [`info()`](FrameSource::info) before any
/// frame has been decoded. Resources (demuxer, decoder, conversion context,
/// frame buffers) are released when the source is dropped.
pub struct FrameSource {
    /// The opened FFmpeg input (demuxer) context.
    input: Input,
    /// Index of the selected video stream.
    stream_index: usize,
    /// Opened decoder for the selected stream.
    decoder: VideoDecoder,
    /// Conversion context from the decoder's pixel format to RGB24.
    scaler: ScalingContext,
    /// Reusable frame the decoder writes into, in its native pixel format.
    decoded_frame: VideoFrame,
    /// Reusable frame the conversion context writes RGB24 data into.
    rgb_frame: VideoFrame,
    /// Packed `width * height * 3` buffer exposed through `current_data()`.
    rgb_buffer: Vec<u8>,
    /// Whether EOF has been sent to the decoder (drain in progress).
    eof_sent: bool,
    /// Whether the stream is fully exhausted (drain complete or read error).
    exhausted: bool,
    /// Cached stream metadata.
    info: StreamInfo,
}

impl Debug for FrameSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameSource")
            .field("stream_index", &self.stream_index)
            .field("info", &self.info)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl FrameSource {
    /// Open a media file and prepare its best video stream for decoding.
    ///
    /// Initializes FFmpeg (idempotent), probes the container, opens a decoder
    /// for the best-scoring video stream, and allocates the RGB conversion
    /// context and frame buffers sized to the stream's dimensions. Everything
    /// acquired here is released on drop, including on every early error
    /// return.
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::FileOpen`] if the file cannot be opened or
    /// probed, [`RebundleError::NoVideoStream`] if the container holds no
    /// video, and [`RebundleError::DecoderOpen`] if the stream's codec cannot
    /// be opened.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rebundle::FrameSource;
    ///
    /// let source = FrameSource::open("video.mp4")?;
    /// # Ok::<(), rebundle::RebundleError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RebundleError> {
        let path = path.as_ref();
        let display_path = path.to_path_buf();

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| RebundleError::FileOpen {
            path: display_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        log::debug!("Opening media file: {}", display_path.display());

        let input = ffmpeg_next::format::input(&path).map_err(|error| RebundleError::FileOpen {
            path: display_path.clone(),
            reason: error.to_string(),
        })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(RebundleError::NoVideoStream)?;
        let stream_index = stream.index();

        // Compute frames per second from the stream's average frame rate.
        let frame_rate = stream.avg_frame_rate();
        let fps = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            // Fallback: try the stream's rate field.
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let codec_parameters = stream.parameters();
        let decoder_context = CodecContext::from_parameters(codec_parameters).map_err(|error| {
            RebundleError::DecoderOpen(format!("cannot read codec parameters: {error}"))
        })?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| RebundleError::DecoderOpen(error.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_count = if fps > 0.0 {
            (duration.as_secs_f64() * fps) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let pixel_format = match decoder.format() {
            Pixel::None => None,
            other => Some(format!("{other:?}")),
        };

        let info = StreamInfo {
            width,
            height,
            fps,
            duration,
            frame_count,
            codec,
            pixel_format,
            format: input.format().name().to_string(),
        };

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BICUBIC,
        )
        .map_err(|error| {
            RebundleError::BufferAlloc(format!("cannot create RGB conversion context: {error}"))
        })?;

        log::info!(
            "Opened {}: format={}, codec={}, {}x{}, {:.2} fps, {:.2}s, ~{} frames",
            display_path.display(),
            info.format,
            info.codec,
            info.width,
            info.height,
            info.fps,
            info.duration.as_secs_f64(),
            info.frame_count,
        );
        if let Some(pixel_format) = &info.pixel_format {
            log::debug!("Decoded pixel format: {pixel_format}");
        }

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            rgb_buffer: Vec::with_capacity(convert::packed_rgb_len(width, height)),
            eof_sent: false,
            exhausted: false,
            info,
        })
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Frames per second reported by the stream.
    pub fn fps(&self) -> f64 {
        self.info.fps
    }

    /// Metadata of the opened stream, probed once at open time.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// View into the most recently decoded frame as packed RGB24 bytes.
    ///
    /// Holds `width * height * 3` bytes after the first successful
    /// [`read_next()`](Self::read_next) and is empty before it. The contents
    /// are overwritten by the next `read_next()` call, which the borrow
    /// checker enforces by requiring this borrow to end first.
    pub fn current_data(&self) -> &[u8] {
        &self.rgb_buffer
    }

    /// Copy the most recently decoded frame into an owned [`RgbImage`].
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::InvalidFrameData`] if no frame has been
    /// decoded yet.
    pub fn current_image(&self) -> Result<RgbImage, RebundleError> {
        let expected = convert::packed_rgb_len(self.info.width, self.info.height);
        if self.rgb_buffer.len() != expected {
            return Err(RebundleError::InvalidFrameData {
                expected,
                actual: self.rgb_buffer.len(),
            });
        }
        RgbImage::from_raw(self.info.width, self.info.height, self.rgb_buffer.clone()).ok_or_else(
            || RebundleError::BufferAlloc("cannot construct RGB image from frame data".to_string()),
        )
    }

    /// Decode the next frame into the internal RGB buffer.
    ///
    /// Reads packets from the container until the decoder produces one frame,
    /// skipping packets that belong to other streams. At end of stream the
    /// decoder is drained of any buffered frames before this returns
    /// `Ok(false)`, so streams that use frame reordering do not lose their
    /// trailing frames.
    ///
    /// Returns `Ok(true)` when a fresh frame is available through
    /// [`current_data()`](Self::current_data), `Ok(false)` once the stream is
    /// exhausted (repeated calls keep returning `Ok(false)`).
    ///
    /// # Errors
    ///
    /// Returns [`RebundleError::PacketRead`] on a read failure other than end
    /// of stream, and the underlying FFmpeg error if the decoder rejects a
    /// packet or the pixel format conversion fails. Any error is terminal:
    /// the source yields no further frames.
    pub fn read_next(&mut self) -> Result<bool, RebundleError> {
        if self.exhausted {
            return Ok(false);
        }

        loop {
            // Frames the decoder has already produced come first.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                if let Err(error) = self.scaler.run(&self.decoded_frame, &mut self.rgb_frame) {
                    self.exhausted = true;
                    return Err(error.into());
                }
                convert::frame_to_rgb_buffer(
                    &self.rgb_frame,
                    self.info.width,
                    self.info.height,
                    &mut self.rgb_buffer,
                );
                return Ok(true);
            }

            // Decoder has no buffered frames. Feed it more packets.
            if self.eof_sent {
                // Already sent EOF and the decoder is drained.
                self.exhausted = true;
                return Ok(false);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            self.exhausted = true;
                            return Err(error.into());
                        }
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    // Drain buffered frames before reporting end of stream.
                    if let Err(error) = self.decoder.send_eof() {
                        self.exhausted = true;
                        return Err(error.into());
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    self.exhausted = true;
                    return Err(RebundleError::PacketRead(error.to_string()));
                }
            }
        }
    }

    /// Decode every remaining frame, handing each to `callback` in order.
    ///
    /// The callback receives the zero-based frame number and a view into the
    /// packed RGB24 buffer. Returning an error from the callback stops the
    /// loop and propagates that error. Returns the number of frames
    /// delivered.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rebundle::FrameSource;
    ///
    /// let mut source = FrameSource::open("input.mp4")?;
    /// let frames = source.for_each_frame(|number, rgb| {
    ///     println!("frame {number}: {} bytes", rgb.len());
    ///     Ok(())
    /// })?;
    /// println!("decoded {frames} frames");
    /// # Ok::<(), rebundle::RebundleError>(())
    /// ```
    pub fn for_each_frame<F>(&mut self, mut callback: F) -> Result<u64, RebundleError>
    where
        F: FnMut(u64, &[u8]) -> Result<(), RebundleError>,
    {
        let mut frame_number: u64 = 0;
        while self.read_next()? {
            callback(frame_number, &self.rgb_buffer)?;
            frame_number += 1;
        }
        Ok(frame_number)
    }
}
