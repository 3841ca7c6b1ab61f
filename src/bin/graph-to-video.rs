use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

use graph_to_video::{
    BackendKind, FailurePolicy, MagickOpts, RenderOpts, RenderThreading, TimelineConfig,
};

/// Draw a moving position marker onto a chart image, one PNG per output frame.
///
/// Encode the result with e.g. `ffmpeg -r 0.5 -i frames/%06d.png -vcodec h264 timer.mp4`.
#[derive(Parser, Debug)]
#[command(name = "graph-to-video", version)]
struct Cli {
    /// Base chart image. Never modified.
    graph: PathBuf,

    /// Timeline config JSON. Overrides `--preset`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in timeline to use when no `--config` is given.
    #[arg(long, value_enum, default_value_t = Preset::BroadcastB)]
    preset: Preset,

    /// Write frames here instead of the config's `output_dir`.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Renderer to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Magick)]
    backend: BackendChoice,

    /// ImageMagick executable (magick backend only).
    #[arg(long, default_value = "convert")]
    magick_program: String,

    /// Per-frame timeout for the external tool in seconds, 0 to wait forever.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Log failed frames and keep rendering instead of stopping at the first one.
    #[arg(long)]
    keep_going: bool,

    /// Render frames on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Frames per scheduling chunk (parallel mode only).
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Print marker positions without rendering or touching the output directory.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    BroadcastA,
    BroadcastB,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Magick,
    Raster,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_target(false).init();

    graph_to_video::validate_base_image(&cli.graph)?;

    let mut cfg = match &cli.config {
        Some(path) => TimelineConfig::from_path(path)?,
        None => match cli.preset {
            Preset::BroadcastA => TimelineConfig::broadcast_a(),
            Preset::BroadcastB => TimelineConfig::broadcast_b(),
        },
    };
    if let Some(dir) = cli.out_dir.clone() {
        cfg.output_dir = dir;
    }
    cfg.validate()?;

    if cli.dry_run {
        for b in graph_to_video::plan_frames(&cfg) {
            tracing::info!("{} [{} s]: {:.6} - {:.6}", b.frame.0, b.secs, b.x0, b.x1);
        }
        return Ok(());
    }

    let kind = match cli.backend {
        BackendChoice::Magick => BackendKind::Magick,
        BackendChoice::Raster => BackendKind::Raster,
    };
    let magick = MagickOpts {
        program: cli.magick_program.clone(),
        timeout: (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs)),
    };
    let renderer = graph_to_video::create_renderer(kind, &magick)?;

    let opts = RenderOpts {
        failure_policy: if cli.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        },
        threading: RenderThreading {
            parallel: cli.parallel,
            threads: cli.threads,
            chunk_size: cli.chunk_size,
        },
        cancel: None,
    };

    let stats = graph_to_video::render_sequence(&cfg, &cli.graph, renderer.as_ref(), &opts)
        .with_context(|| format!("render frames into '{}'", cfg.output_dir.display()))?;

    if stats.frames_failed > 0 {
        for f in &stats.failures {
            eprintln!("  frame {}: {}", f.frame.0, f.message);
        }
        anyhow::bail!(
            "{} of {} frame(s) failed",
            stats.frames_failed,
            stats.frames_total
        );
    }

    eprintln!(
        "wrote {} frame(s) to {}",
        stats.frames_rendered,
        cfg.output_dir.display()
    );
    Ok(())
}
