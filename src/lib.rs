//! Marker frames for chart-tracking videos.
//!
//! Given a pre-rendered chart of some metric over time, this crate produces one image per output
//! frame with a thin vertical marker drawn at the chart position matching the frame's playback
//! time. The sequence is then encoded (e.g. `ffmpeg -r 0.5 -i frames/%06d.png ...`) and
//! overlaid on the source video.
//!
//! The marker's x position is linear in elapsed time, plus a permanent jump after each
//! [`Interruption`]: segments (ad breaks) cut out of the video but still present on the chart's
//! time axis.
//!
//! - [`TimelineConfig`] holds the per-chart constants.
//! - [`compute_marker_bounds`] is the pure position function.
//! - [`MarkerRenderer`] draws one frame, either through ImageMagick ([`MagickRenderer`]) or
//!   in-process ([`RasterRenderer`]).
//! - [`render_sequence`] drives the whole run.
#![forbid(unsafe_code)]

mod config;
mod foundation;
mod output;
mod pipeline;
mod position;
mod render;

pub use config::color::MarkerColor;
pub use config::timeline::{Interruption, TimelineConfig};
pub use foundation::core::{FrameIndex, FrameRange, FrameRate, Point, Rect};
pub use foundation::error::{MarkerError, MarkerResult};
pub use output::{
    ClearMode, FRAME_NAME_WIDTH, clear_output_dir, ensure_output_dir, ensure_outside_output_dir,
    frame_file_name, frame_path, list_frames, prepare_output_dir,
};
pub use pipeline::{
    CancelFlag, FailurePolicy, FrameFailure, RenderOpts, RenderStats, RenderThreading,
    plan_frames, render_frame_at, render_sequence, validate_base_image,
};
pub use position::{MarkerBounds, compute_marker_bounds, interruption_offset};
pub use render::backend::{BackendKind, FrameRequest, MarkerRenderer, create_renderer};
pub use render::magick::{MagickOpts, MagickRenderer, is_program_on_path};
pub use render::raster::{RasterRenderer, fill_marker};
