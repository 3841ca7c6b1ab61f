use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use rayon::prelude::*;

use crate::{
    config::timeline::TimelineConfig,
    foundation::core::{FrameIndex, FrameRange},
    foundation::error::{MarkerError, MarkerResult},
    output::{ensure_outside_output_dir, frame_path, prepare_output_dir},
    position::MarkerBounds,
    render::backend::{FrameRequest, MarkerRenderer},
};

/// What to do when a single frame fails to render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure and return it.
    #[default]
    Abort,
    /// Log the failure, record it in [`RenderStats::failures`] and keep going.
    Continue,
}

#[derive(Clone, Debug)]
/// Threading and chunking controls for multi-frame rendering.
pub struct RenderThreading {
    /// Enable parallel rendering when `true`.
    pub parallel: bool,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
    /// Chunk size in frames for batched scheduling.
    pub chunk_size: usize,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            chunk_size: 64,
        }
    }
}

/// Shared stop signal, checked before every frame (every chunk in parallel mode).
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RenderOpts {
    pub failure_policy: FailurePolicy,
    pub threading: RenderThreading,
    pub cancel: Option<CancelFlag>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFailure {
    pub frame: FrameIndex,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Aggregated rendering counters.
pub struct RenderStats {
    /// Total requested frames.
    pub frames_total: u64,
    /// Frames written successfully.
    pub frames_rendered: u64,
    /// Frames skipped under [`FailurePolicy::Continue`].
    pub frames_failed: u64,
    pub failures: Vec<FrameFailure>,
}

/// Fail unless `path` exists and is a regular file.
pub fn validate_base_image(path: &Path) -> MarkerResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| {
        MarkerError::validation(format!("base image '{}' not found: {e}", path.display()))
    })?;
    if !meta.is_file() {
        return Err(MarkerError::validation(format!(
            "base image '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(())
}

/// Bounds for every frame of the run, in frame order. Pure; touches nothing on disk.
pub fn plan_frames(cfg: &TimelineConfig) -> impl Iterator<Item = MarkerBounds> + '_ {
    cfg.frame_range().iter().map(|f| cfg.marker_bounds(f))
}

fn log_bounds(b: &MarkerBounds) {
    tracing::info!(
        frame = b.frame.0,
        "{} [{} s]: {:.6} - {:.6}",
        b.frame.0,
        b.secs,
        b.x0,
        b.x1
    );
}

/// Compute, log and render one frame into `cfg.output_dir`.
pub fn render_frame_at(
    cfg: &TimelineConfig,
    base_image: &Path,
    frame: FrameIndex,
    renderer: &dyn MarkerRenderer,
) -> MarkerResult<MarkerBounds> {
    let bounds = cfg.marker_bounds(frame);
    log_bounds(&bounds);

    let req = FrameRequest {
        base_image,
        bounds,
        color: cfg.color,
        out_path: frame_path(&cfg.output_dir, frame, &cfg.image_extension),
    };
    renderer.render_frame(&req).map_err(|e| match e {
        MarkerError::Render { .. } => e,
        other => MarkerError::render(frame.0, other.to_string()),
    })?;
    Ok(bounds)
}

/// Render every frame of `cfg` onto copies of `base_image`.
///
/// Validates the config and base image, refuses a base image inside the output directory,
/// prepares the output directory, then renders frames `0..=last_frame`. Returns only after every render call has completed.
#[tracing::instrument(skip_all, fields(base = %base_image.display(), backend = renderer.name()))]
pub fn render_sequence(
    cfg: &TimelineConfig,
    base_image: &Path,
    renderer: &dyn MarkerRenderer,
    opts: &RenderOpts,
) -> MarkerResult<RenderStats> {
    cfg.validate()?;
    validate_base_image(base_image)?;
    ensure_outside_output_dir(&cfg.output_dir, base_image)?;
    prepare_output_dir(&cfg.output_dir, &cfg.image_extension, cfg.clear_mode)?;

    let range = cfg.frame_range();
    tracing::info!(
        frames = range.len_frames(),
        out = %cfg.output_dir.display(),
        "rendering marker frames"
    );

    let stats = if opts.threading.parallel {
        render_parallel(cfg, base_image, renderer, opts, range)?
    } else {
        render_sequential(cfg, base_image, renderer, opts, range)?
    };

    tracing::info!(
        rendered = stats.frames_rendered,
        failed = stats.frames_failed,
        "done"
    );
    Ok(stats)
}

fn render_sequential(
    cfg: &TimelineConfig,
    base_image: &Path,
    renderer: &dyn MarkerRenderer,
    opts: &RenderOpts,
    range: FrameRange,
) -> MarkerResult<RenderStats> {
    let mut stats = RenderStats::default();
    for f in range.iter() {
        check_cancelled(opts, &stats)?;
        let res = render_frame_at(cfg, base_image, f, renderer).map(|_| ());
        record(opts.failure_policy, f, res, &mut stats)?;
    }
    Ok(stats)
}

fn render_parallel(
    cfg: &TimelineConfig,
    base_image: &Path,
    renderer: &dyn MarkerRenderer,
    opts: &RenderOpts,
    range: FrameRange,
) -> MarkerResult<RenderStats> {
    let pool = build_thread_pool(opts.threading.threads)?;
    let abort = opts.failure_policy == FailurePolicy::Abort;
    let mut stats = RenderStats::default();

    for chunk in range.chunks(normalized_chunk_size(opts.threading.chunk_size)) {
        check_cancelled(opts, &stats)?;

        // Lowest failed frame so far. Under Abort, frames above it are not started.
        let first_failed = AtomicU64::new(u64::MAX);
        let frames: Vec<FrameIndex> = chunk.iter().collect();
        let results: Vec<(FrameIndex, Option<MarkerResult<()>>)> = pool.install(|| {
            frames
                .par_iter()
                .map(|&f| {
                    if abort && f.0 > first_failed.load(Ordering::SeqCst) {
                        return (f, None);
                    }
                    let res = render_frame_at(cfg, base_image, f, renderer).map(|_| ());
                    if res.is_err() {
                        first_failed.fetch_min(f.0, Ordering::SeqCst);
                    }
                    (f, Some(res))
                })
                .collect()
        });

        if abort && let Some(failed) = first_failure(&results) {
            discard_frames_after(cfg, failed, &results);
        }

        // Results come back in frame order, so the policy sees failures in the same order as
        // the sequential path.
        for (f, res) in results {
            let Some(res) = res else { continue };
            record(opts.failure_policy, f, res, &mut stats)?;
        }
    }
    Ok(stats)
}

fn first_failure(results: &[(FrameIndex, Option<MarkerResult<()>>)]) -> Option<FrameIndex> {
    results
        .iter()
        .find(|(_, res)| matches!(res, Some(Err(_))))
        .map(|(f, _)| *f)
}

/// Delete frames of an aborted chunk written above `failed`, so an abort leaves frames
/// `0..failed` only, as in sequential mode.
fn discard_frames_after(
    cfg: &TimelineConfig,
    failed: FrameIndex,
    results: &[(FrameIndex, Option<MarkerResult<()>>)],
) {
    for (f, res) in results {
        if *f <= failed || !matches!(res, Some(Ok(()))) {
            continue;
        }
        let path = frame_path(&cfg.output_dir, *f, &cfg.image_extension);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(
                frame = f.0,
                path = %path.display(),
                error = %e,
                "failed to discard frame after abort"
            );
        }
    }
}

fn check_cancelled(opts: &RenderOpts, stats: &RenderStats) -> MarkerResult<()> {
    if opts.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
        let completed = stats.frames_rendered + stats.frames_failed;
        tracing::warn!(completed, "render cancelled");
        return Err(MarkerError::Cancelled { completed });
    }
    Ok(())
}

fn record(
    policy: FailurePolicy,
    frame: FrameIndex,
    res: MarkerResult<()>,
    stats: &mut RenderStats,
) -> MarkerResult<()> {
    stats.frames_total += 1;
    let err = match res {
        Ok(()) => {
            stats.frames_rendered += 1;
            return Ok(());
        }
        Err(e) => e,
    };

    match policy {
        FailurePolicy::Abort => {
            tracing::error!(frame = frame.0, error = %err, "frame failed, aborting");
            Err(err)
        }
        FailurePolicy::Continue => {
            tracing::warn!(frame = frame.0, error = %err, "frame failed, skipping");
            stats.frames_failed += 1;
            stats.failures.push(FrameFailure {
                frame,
                message: err.to_string(),
            });
            Ok(())
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> MarkerResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MarkerError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder.build().map_err(|e| {
        MarkerError::validation(format!("failed to build rayon thread pool: {e}"))
    })
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}
