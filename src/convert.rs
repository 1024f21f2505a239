//! Pixel-buffer copying between FFmpeg frames and packed RGB24 buffers.
//!
//! FFmpeg frames frequently carry per-row padding (stride > width * 3), while
//! the rest of this crate works with tightly packed buffers that can be handed
//! to [`image::RgbImage::from_raw`] or filled from one. The helpers here strip
//! or reinsert that padding.

use ffmpeg_next::frame::Video as VideoFrame;

/// Number of bytes in a tightly packed RGB24 buffer for the given dimensions.
pub(crate) fn packed_rgb_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 3
}

/// Copy pixel data from an RGB24 video frame into a tightly packed buffer.
///
/// The buffer is cleared and refilled, so callers can reuse one allocation
/// across frames.
pub(crate) fn frame_to_rgb_buffer(
    frame: &VideoFrame,
    width: u32,
    height: u32,
    buffer: &mut Vec<u8>,
) {
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let data = frame.data(0);

    buffer.clear();
    if stride == row_len {
        // No padding: copy the entire plane at once.
        buffer.extend_from_slice(&data[..row_len * (height as usize)]);
    } else {
        // Stride includes padding bytes: copy row by row.
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_len]);
        }
    }
}

/// Copy a tightly packed RGB24 buffer into a video frame, honoring its stride.
///
/// The caller must have validated that `data` holds exactly
/// [`packed_rgb_len`] bytes for the frame's dimensions.
pub(crate) fn rgb_buffer_to_frame(
    data: &[u8],
    frame: &mut VideoFrame,
    width: u32,
    height: u32,
) {
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let plane = frame.data_mut(0);

    if stride == row_len {
        plane[..data.len()].copy_from_slice(data);
    } else {
        for row in 0..(height as usize) {
            let src_start = row * row_len;
            let dst_start = row * stride;
            plane[dst_start..dst_start + row_len]
                .copy_from_slice(&data[src_start..src_start + row_len]);
        }
    }
}
