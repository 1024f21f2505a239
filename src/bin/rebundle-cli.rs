use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rebundle::{FfmpegLogLevel, FrameSource, Transcoder, VideoCodec};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  rebundle transcode input.mkv output.mp4 --bitrate 4000 --progress\n  rebundle probe input.mp4 --json\n  rebundle dump-frame input.mp4 --frame 42 --out frame.png\n  rebundle completions zsh > _rebundle";

#[derive(Debug, Parser)]
#[command(
    name = "rebundle",
    version,
    about = "Decode, re-encode, and rebundle video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output while working.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decode, re-encode, and rebundle a video into a new container.
    #[command(
        about = "Transcode a video file",
        after_help = "Examples:\n  rebundle transcode input.mkv output.mp4\n  rebundle transcode input.mp4 output.avi --codec mpeg4 --bitrate 8000\n  rebundle transcode input.mp4 output.mp4 --fps 30 --progress"
    )]
    Transcode {
        /// Input media path.
        input: String,
        /// Output file path; the container format follows its extension.
        output: PathBuf,
        /// Output codec: h264 | h265 | mpeg4.
        #[arg(long, default_value = "h264")]
        codec: String,
        /// Target bitrate in kilobits per second.
        #[arg(long, default_value_t = 12000)]
        bitrate: usize,
        /// Override the output frame rate (defaults to the source's).
        #[arg(long)]
        fps: Option<u32>,
        /// Keyframe interval in frames.
        #[arg(long)]
        gop: Option<u32>,
        /// Maximum number of consecutive B-frames.
        #[arg(long)]
        max_b_frames: Option<usize>,
        /// H.264 encoder speed preset.
        #[arg(long)]
        preset: Option<String>,
        /// Directory for the intermediate elementary-stream file.
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Print stream information for a media file.
    #[command(
        about = "Print stream info",
        visible_alias = "info",
        after_help = "Examples:\n  rebundle probe input.mp4\n  rebundle probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: String,

        /// Output stream info as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode one frame and save it as an image.
    #[command(
        about = "Save a decoded frame as an image",
        after_help = "Examples:\n  rebundle dump-frame input.mp4 --out frame.png\n  rebundle dump-frame input.mp4 --frame 42 --out frame_42.jpg"
    )]
    DumpFrame {
        /// Input media path.
        input: String,
        /// Zero-based frame number to decode to.
        #[arg(long, default_value_t = 0)]
        frame: u64,
        /// Output image path (format follows the extension).
        #[arg(long)]
        out: PathBuf,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "x264" => Some(VideoCodec::H264),
        "h265" | "hevc" | "x265" => Some(VideoCodec::H265),
        "mpeg4" | "mp4v" | "xvid" => Some(VideoCodec::Mpeg4),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        rebundle::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Transcode {
            input,
            output,
            codec,
            bitrate,
            fps,
            gop,
            max_b_frames,
            preset,
            temp_dir,
        } => {
            let codec = parse_codec(&codec).ok_or(format!("unsupported --codec: {codec}"))?;
            ensure_writable_path(&output, cli.global.overwrite)?;

            let mut transcoder = Transcoder::new(&input, &output)
                .codec(codec)
                .bitrate_kbps(bitrate);
            if let Some(fps) = fps {
                transcoder = transcoder.fps(fps);
            }
            if let Some(gop) = gop {
                transcoder = transcoder.gop_size(gop);
            }
            if let Some(max_b_frames) = max_b_frames {
                transcoder = transcoder.max_b_frames(max_b_frames);
            }
            if let Some(preset) = preset {
                transcoder = transcoder.preset(preset);
            }
            if let Some(temp_dir) = temp_dir {
                transcoder = transcoder.temp_dir(temp_dir);
            }

            let progress_bar = if cli.global.progress {
                // The length is unknown until the source reports its
                // estimate through the first progress callback.
                let pb = ProgressBar::new(0);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            if progress_bar.is_some() || cli.global.verbose {
                let pb = progress_bar.clone();
                transcoder = transcoder.on_progress(move |done, total| {
                    if let Some(pb) = &pb {
                        if pb.length() == Some(0) && total > 0 {
                            pb.set_length(total);
                        }
                        pb.set_position(done);
                    } else if done % 100 == 0 {
                        eprintln!("transcoded {done} frames");
                    }
                });
            }

            let report = transcoder.run()?;

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Transcoded {} frame(s) to {} ({}x{} @ {} fps)",
                    report.frames,
                    report.output.display(),
                    report.width,
                    report.height,
                    report.fps
                )
                .green()
            );
        }
        Commands::Probe { input, json } => {
            let source = FrameSource::open(&input)?;
            let info = source.info();
            if json {
                let payload = json!({
                    "format": info.format,
                    "codec": info.codec,
                    "width": info.width,
                    "height": info.height,
                    "fps": info.fps,
                    "duration_seconds": info.duration.as_secs_f64(),
                    "frame_count": info.frame_count,
                    "pixel_format": info.pixel_format,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", info.format);
                println!("Duration: {:?}", info.duration);
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    info.width, info.height, info.fps, info.codec,
                );
                if let Some(pixel_format) = &info.pixel_format {
                    println!("Pixel format: {pixel_format}");
                }
                println!("Frames: ~{}", info.frame_count);
            }
        }
        Commands::DumpFrame { input, frame, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;

            let mut source = FrameSource::open(&input)?;
            let mut current: u64 = 0;
            loop {
                if !source.read_next()? {
                    return Err(format!(
                        "stream ended after {current} frame(s), before frame {frame}"
                    )
                    .into());
                }
                if current == frame {
                    break;
                }
                current += 1;
            }

            let image = source.current_image()?;
            image.save(&out)?;

            if cli.global.verbose {
                eprintln!("decoded frame {frame} -> {}", out.display());
            }
            println!("{} {}", "saved".green().bold(), out.display());
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "rebundle", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
