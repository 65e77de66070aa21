use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use frame_scale::plan::WidthPreset;
use live_annotate::capture::FfmpegInput;
use live_annotate::client::{PlaybackStream, ServiceClient, VideoId};
use live_annotate::confidence::ConfidenceChannel;
use live_annotate::config::{ClientConfig, DEFAULT_SERVER, QualityConfig};
use live_annotate::telemetry::init_tracing;
use live_annotate::{LiveOptions, SourceSpec, run_live};
use tracing::info;

/// Client for a remote object-detection service:
/// - live: stream a camera and watch the annotated result
/// - image / video: one-shot annotation of files
#[derive(Parser, Debug)]
#[command(name = "annotate")]
#[command(about = "🎯 Stream frames to an object-detection service and collect the annotated results")]
#[command(long_about = "Stream camera frames to an object-detection service over WebSocket and collect the annotated frames it returns.
Also annotates single images and uploaded videos through the service's HTTP endpoints.")]
struct Cli {
    /// Service base URL
    #[arg(long, global = true, env = "ANNOTATE_SERVER", default_value = DEFAULT_SERVER,
          help = "Base URL of the detection service (http or https)")]
    server: String,

    /// Verbose logging
    #[arg(short, long, global = true, help = "Log at debug level (RUST_LOG overrides)")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a camera (or test pattern) live
    Live(LiveArgs),

    /// Annotate a single image
    Image {
        #[arg(help = "Image to annotate")]
        input: PathBuf,

        #[arg(short, long, help = "Where to write the annotated JPEG (default: <input>_annotated.jpg)")]
        output: Option<PathBuf>,
    },

    /// Upload a video and save the annotated playback frames
    Video {
        #[arg(help = "Video file to upload")]
        input: PathBuf,

        #[arg(short, long, default_value = "annotated_frames",
              help = "Directory for the annotated frames")]
        output_dir: PathBuf,

        #[arg(long, help = "Stop after this many frames")]
        max_frames: Option<u64>,
    },

    /// Save frames from the service's own camera feed
    Feed {
        #[arg(short, long, default_value = "feed_frames", help = "Directory for the frames")]
        output_dir: PathBuf,

        #[arg(short, long, default_value = "10s",
              help = "How long to record: 30s (30 seconds), 2m (2 minutes), 1h (1 hour)")]
        duration: String,
    },

    /// Check whether the service is online
    Health,

    /// Set the service's detection confidence threshold
    Confidence {
        #[arg(help = "Threshold in [0, 1]")]
        value: f32,
    },
}

#[derive(Args, Debug)]
struct LiveArgs {
    /// Capture device
    #[arg(long, help = "Device passed to ffmpeg -i (default: platform camera)")]
    device: Option<String>,

    /// FFmpeg input format
    #[arg(long, help = "FFmpeg input format, e.g. v4l2, avfoundation, dshow")]
    format: Option<String>,

    /// Use a generated test pattern instead of a device
    #[arg(long, help = "Stream a moving test pattern instead of a camera")]
    synthetic: bool,

    #[arg(long, default_value_t = 640, help = "Capture width")]
    width: u32,

    #[arg(long, default_value_t = 480, help = "Capture height")]
    height: u32,

    #[arg(long, help = "Requested capture frame rate")]
    framerate: Option<u32>,

    /// Encode width preset
    #[arg(short, long, value_enum, default_value = "high",
          help = "Max encode width: low (320), medium (480), high (640), full (1280)")]
    preset: WidthPreset,

    #[arg(long, help = "Max encode width in pixels (overrides --preset)")]
    max_width: Option<u32>,

    #[arg(short, long, default_value_t = 0.7, help = "JPEG quality in [0, 1]")]
    quality: f32,

    #[arg(short, long, default_value_t = 1, help = "Send every Nth ready frame")]
    every: u32,

    #[arg(long, help = "Detection confidence threshold to set before streaming")]
    conf: Option<f32>,

    #[arg(long, help = "Do not read new confidence thresholds from stdin while streaming")]
    no_conf_input: bool,

    #[arg(short, long, help = "Keep the latest annotated frame in this file (.jpg or .png)")]
    output: Option<PathBuf>,

    #[arg(short, long, help = "How long to stream: 30s, 2m, 1h (default: until Ctrl-C)")]
    duration: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClientConfig::with_server(cli.server);
    config.validate().map_err(anyhow::Error::msg)?;

    match cli.command {
        Command::Live(args) => live(config, args).await,
        Command::Image { input, output } => image(config, &input, output).await,
        Command::Video {
            input,
            output_dir,
            max_frames,
        } => video(config, &input, &output_dir, max_frames).await,
        Command::Feed {
            output_dir,
            duration,
        } => feed(config, &output_dir, &duration).await,
        Command::Health => health(config).await,
        Command::Confidence { value } => confidence(config, value).await,
    }
}

async fn live(config: ClientConfig, args: LiveArgs) -> Result<()> {
    let mut quality = QualityConfig::from_preset(args.preset);
    if let Some(max_width) = args.max_width {
        quality.max_encode_width = max_width;
    }
    quality.encode_quality = args.quality;
    quality.send_every_n = args.every;
    quality.validate().map_err(anyhow::Error::msg)?;

    let source = if args.synthetic {
        SourceSpec::Synthetic {
            width: args.width,
            height: args.height,
        }
    } else {
        let defaults = FfmpegInput::default();
        SourceSpec::Device(FfmpegInput {
            format: args.format.unwrap_or(defaults.format),
            device: args.device.unwrap_or(defaults.device),
            width: args.width,
            height: args.height,
            framerate: args.framerate,
        })
    };

    let duration = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|secs| Duration::from_secs(u64::from(secs)));

    let stats = run_live(LiveOptions {
        client: config,
        quality,
        source,
        output: args.output,
        duration,
        confidence: args.conf,
        confidence_from_stdin: !args.no_conf_input,
    })
    .await?;

    println!(
        "Sent {} frames, received {} ({} decode failures)",
        stats.sent, stats.received, stats.decode_failures
    );
    Ok(())
}

async fn image(config: ClientConfig, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let client = ServiceClient::new(config)?;
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.jpg".to_string());

    let annotated = client.detect_image(bytes, &file_name).await?;
    let output = output.unwrap_or_else(|| annotated_path(input));
    tokio::fs::write(&output, &annotated)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Annotated image written to {}", output.display());
    Ok(())
}

async fn video(
    config: ClientConfig,
    input: &Path,
    output_dir: &Path,
    max_frames: Option<u64>,
) -> Result<()> {
    let client = ServiceClient::new(config)?;
    let id: VideoId = client.upload_video(input).await?;
    println!("Uploaded as {}", id);

    let stream = client.stream_video(&id).await?;
    let saved = save_frames(stream, output_dir, max_frames, None).await?;
    println!("Saved {} annotated frames to {}", saved, output_dir.display());
    Ok(())
}

async fn feed(config: ClientConfig, output_dir: &Path, duration: &str) -> Result<()> {
    let limit = Duration::from_secs(u64::from(parse_duration(duration)?));
    let client = ServiceClient::new(config)?;
    let stream = client.video_feed().await?;
    let saved = save_frames(stream, output_dir, None, Some(limit)).await?;
    println!("Saved {} feed frames to {}", saved, output_dir.display());
    Ok(())
}

async fn health(config: ClientConfig) -> Result<()> {
    let server = config.server.clone();
    let client = ServiceClient::new(config)?;
    if client.health().await {
        println!("{} is online", server);
        Ok(())
    } else {
        Err(anyhow!("{} is offline", server))
    }
}

async fn confidence(config: ClientConfig, value: f32) -> Result<()> {
    let delay = config.confidence_debounce;
    let client = Arc::new(ServiceClient::new(config)?);
    let channel = ConfidenceChannel::new(client, delay);
    channel.set_confidence(value)?;
    channel.flush().await;
    if channel.pushes() == 0 {
        return Err(anyhow!("service did not accept confidence {}", value));
    }
    println!("Confidence threshold set to {:.2}", value);
    Ok(())
}

/// Write each frame of a playback stream as `frame_00000.jpg`, ... until the
/// stream ends, `max_frames` is reached, or `limit` elapses.
async fn save_frames(
    mut stream: PlaybackStream,
    output_dir: &Path,
    max_frames: Option<u64>,
    limit: Option<Duration>,
) -> Result<u64> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let deadline = limit.map(|limit| tokio::time::Instant::now() + limit);
    let mut saved = 0u64;
    loop {
        if max_frames.is_some_and(|max| saved >= max) {
            break;
        }
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, stream.next_frame()).await {
                Ok(next) => next?,
                Err(_) => break,
            },
            None => stream.next_frame().await?,
        };
        let Some(frame) = next else { break };

        let path = output_dir.join(format!("frame_{saved:05}.jpg"));
        tokio::fs::write(&path, &frame)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        saved += 1;
        if saved % 100 == 0 {
            info!("{} frames saved", saved);
        }
    }
    Ok(saved)
}

fn annotated_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}_annotated.jpg"))
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u32> {
    if let Ok(seconds) = duration.parse::<u32>() {
        return Ok(seconds);
    }

    let Some(unit) = duration.chars().last() else {
        return Err(anyhow!("Invalid duration format: {}", duration));
    };
    let num_str = &duration[..duration.len() - unit.len_utf8()];
    if num_str.is_empty() {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => {
            return Err(anyhow!(
                "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
                unit
            ));
        }
    };
    let num: u32 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow!("Duration too long: {}", duration))
}
