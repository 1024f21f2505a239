//! Display stream information for a media file.
//!
//! Usage:
//!   cargo run --example probe -- <input_file>

use std::error::Error;

use rebundle::FrameSource;

fn main() -> Result<(), Box<dyn Error>> {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.mp4".to_string());

    println!("Opening {input_path}...");
    let source = FrameSource::open(&input_path)?;
    let info = source.info();

    println!();
    println!("=== Stream Info ===");
    println!("Format:       {}", info.format);
    println!("Duration:     {:?}", info.duration);
    println!("Codec:        {}", info.codec);
    println!("Resolution:   {}x{}", info.width, info.height);
    println!("Frame rate:   {:.2} fps", info.fps);
    println!("Frame count:  ~{}", info.frame_count);
    if let Some(pixel_format) = &info.pixel_format {
        println!("Pixel format: {pixel_format}");
    }

    Ok(())
}
