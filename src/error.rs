//! Error types for the `rebundle` crate.
//!
//! This module defines [`RebundleError`], the unified error type returned by
//! all fallible operations in the crate. Variants carry enough context
//! (offending paths, upstream FFmpeg messages) to diagnose the problem
//! without extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `rebundle` operations.
///
/// Every public method that can fail returns `Result<T, RebundleError>`.
/// Initialization failures (source or sink) are fatal to the whole run;
/// per-frame encode failures are logged by the sink and never surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RebundleError {
    /// A media container could not be opened or probed.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was being opened (input or output).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The input file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The decoder for the selected video stream could not be opened.
    #[error("Failed to open video decoder: {0}")]
    DecoderOpen(String),

    /// No known container format matches the output path's extension, or
    /// the matched format could not be opened for writing.
    #[error("Failed to resolve output format for {path}: {reason}")]
    FormatGuess {
        /// Path whose extension could not be mapped to a usable format.
        path: PathBuf,
        /// Underlying reason from the muxer.
        reason: String,
    },

    /// A codec context could not be allocated from stream parameters.
    #[error("Failed to allocate codec context: {0}")]
    ContextAlloc(String),

    /// The requested encoder is not compiled into this FFmpeg build.
    #[error("Encoder {0} is not available in this FFmpeg build")]
    EncoderNotFound(String),

    /// An output stream could not be added to the muxer.
    #[error("Failed to create output stream: {0}")]
    StreamAlloc(String),

    /// The encoder could not be opened with the configured parameters.
    #[error("Failed to open encoder: {0}")]
    EncoderOpen(String),

    /// A frame buffer or conversion context could not be allocated.
    #[error("Failed to allocate frame buffer: {0}")]
    BufferAlloc(String),

    /// The container header could not be written.
    #[error("Failed to write container header to {path}: {reason}")]
    HeaderWrite {
        /// Output path the header was being written to.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// Reading a packet from the input failed with something other than
    /// end-of-stream. The source is unusable past this point.
    #[error("Failed to read packet from input: {0}")]
    PacketRead(String),

    /// A frame could not be submitted to or drained from the encoder.
    /// Non-fatal during [`add_frame`](crate::FrameSink::add_frame): the
    /// sink logs it and keeps going.
    #[error("Failed to submit frame to encoder: {0}")]
    EncodeSubmit(String),

    /// The final remux pass failed.
    #[error("Remux failed: {0}")]
    Remux(String),

    /// The sink options are unusable (zero dimensions, zero fps).
    #[error("Invalid sink options: {0}")]
    InvalidOptions(String),

    /// An RGB frame buffer with the wrong length was handed to the sink.
    #[error("Frame buffer has {actual} bytes (expected {expected})")]
    InvalidFrameData {
        /// Required length, `width * height * 3`.
        expected: usize,
        /// Length of the buffer that was passed in.
        actual: usize,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for RebundleError {
    fn from(error: FfmpegError) -> Self {
        RebundleError::Ffmpeg(error.to_string())
    }
}
