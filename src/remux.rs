//! Final-pass remuxing with rebuilt timestamps.
//!
//! The encode leg writes an elementary stream whose timestamps are whatever
//! the encoder assigned. This pass rewrites that stream into the caller's
//! final container, replacing every packet's presentation and decode
//! timestamp with a running sum of packet durations rescaled into the output
//! stream's time base. The result is a monotonic, gap-free timeline at the
//! configured frame rate, independent of the intermediate timestamps.

use std::path::Path;

use ffmpeg_next::{Rational, codec::Id};

use crate::error::RebundleError;

/// Remux the elementary stream at `temp_path` into a container at
/// `final_path`, rebuilding packet timestamps from accumulated durations.
///
/// The output container format is inferred from `final_path`'s extension.
/// Codec parameters are copied verbatim from the input's single stream, with
/// the container-level codec tag cleared so the target muxer can pick its
/// own.
pub(crate) fn rebuild_timestamps(
    temp_path: &Path,
    final_path: &Path,
    fps: u32,
) -> Result<(), RebundleError> {
    log::debug!(
        "Remuxing {} into {}",
        temp_path.display(),
        final_path.display()
    );

    let mut input = ffmpeg_next::format::input(&temp_path).map_err(|error| {
        RebundleError::Remux(format!(
            "cannot open intermediate stream {}: {error}",
            temp_path.display()
        ))
    })?;

    let mut output =
        ffmpeg_next::format::output(&final_path).map_err(|error| RebundleError::FormatGuess {
            path: final_path.to_path_buf(),
            reason: error.to_string(),
        })?;

    let (in_time_base, in_parameters) = {
        let in_stream = input.stream(0).ok_or_else(|| {
            RebundleError::Remux("intermediate file holds no streams".to_string())
        })?;
        (in_stream.time_base(), in_stream.parameters())
    };

    let mut out_stream = output
        .add_stream(ffmpeg_next::encoder::find(Id::None))
        .map_err(|error| RebundleError::StreamAlloc(error.to_string()))?;
    let out_index = out_stream.index();
    out_stream.set_time_base(Rational::new(1, fps as i32));
    out_stream.set_parameters(in_parameters);
    // Reset codec tag to let the muxer choose.
    unsafe {
        (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
    }

    output
        .write_header()
        .map_err(|error| RebundleError::HeaderWrite {
            path: final_path.to_path_buf(),
            reason: error.to_string(),
        })?;

    // The muxer may have adjusted the stream's time base while writing the
    // header; timestamps must be expressed in the effective value.
    let out_time_base = output.stream(out_index).unwrap().time_base();

    let mut ts: i64 = 0;
    for (_, mut packet) in input.packets() {
        packet.set_stream(out_index);
        packet.rescale_ts(in_time_base, out_time_base);
        packet.set_pts(Some(ts));
        packet.set_dts(Some(ts));
        ts += packet.duration();
        packet.set_position(-1);
        packet
            .write_interleaved(&mut output)
            .map_err(|error| RebundleError::Remux(format!("cannot mux packet: {error}")))?;
    }

    output
        .write_trailer()
        .map_err(|error| RebundleError::Remux(format!("cannot write trailer: {error}")))?;

    log::debug!(
        "Remux complete: {} ({} time-base ticks)",
        final_path.display(),
        ts
    );
    Ok(())
}
