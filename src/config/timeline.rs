use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    config::color::MarkerColor,
    foundation::core::{FrameIndex, FrameRange, FrameRate},
    foundation::error::{MarkerError, MarkerResult},
    output::{ClearMode, FRAME_NAME_WIDTH},
};

/// A segment cut out of the output video that still occupies space on the chart's time axis.
///
/// Once elapsed playback time is strictly greater than `threshold_secs`, the marker is pushed
/// right by `excluded_secs * scale` pixels for every later frame. A zero `excluded_secs` is a
/// valid placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interruption {
    /// Elapsed video time (seconds) after which the correction applies.
    pub threshold_secs: f64,
    /// Length of the removed segment in seconds.
    pub excluded_secs: f64,
}

impl Interruption {
    pub const fn new(threshold_secs: f64, excluded_secs: f64) -> Self {
        Self {
            threshold_secs,
            excluded_secs,
        }
    }
}

/// Everything needed to place the marker on every frame of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineConfig {
    /// Pixel x-coordinate of elapsed time zero.
    pub origin_x: f64,
    /// Pixels per second of chart time.
    pub scale: f64,
    /// Top edge of the marker.
    pub top_y: f64,
    /// Bottom edge of the marker.
    pub bottom_y: f64,
    /// Length of the output video in seconds.
    pub duration_secs: f64,
    pub frame_rate: FrameRate,
    /// Marker stroke width in pixels.
    pub marker_width: f64,
    #[serde(default)]
    pub color: MarkerColor,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub interruptions: Vec<Interruption>,
    #[serde(default)]
    pub clear_mode: ClearMode,
    #[serde(default = "default_extension")]
    pub image_extension: String,
}

fn default_extension() -> String {
    "png".to_owned()
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::broadcast_b()
    }
}

impl TimelineConfig {
    /// Three-hour chart spanning pixels 151..1879, 8227 s of video, three ad breaks.
    pub fn broadcast_a() -> Self {
        Self {
            origin_x: 145.0,
            scale: (1879.0 - 151.0) / (3.0 * 3600.0),
            top_y: 83.0,
            bottom_y: 934.0,
            duration_secs: 8227.0,
            interruptions: vec![
                Interruption::new(112.0, 812.0),
                Interruption::new(4678.0, 860.0),
                Interruption::new(8132.0, 919.0),
                Interruption::new(9900.0, 0.0),
            ],
            ..Self::base()
        }
    }

    /// Three-hour chart spanning pixels 218..1886, 9085 s of video, three ad breaks.
    pub fn broadcast_b() -> Self {
        Self {
            origin_x: 110.0,
            scale: (1886.0 - 218.0) / (3.0 * 3600.0),
            top_y: 72.0,
            bottom_y: 948.0,
            duration_secs: 9085.0,
            interruptions: vec![
                Interruption::new(125.0, 803.0),
                Interruption::new(5390.0, 927.0),
                Interruption::new(8982.0, 768.0),
                Interruption::new(9100.0, 0.0),
            ],
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            origin_x: 0.0,
            scale: 1.0,
            top_y: 0.0,
            bottom_y: 1.0,
            duration_secs: 0.0,
            frame_rate: FrameRate::HALF,
            marker_width: 2.0,
            color: MarkerColor::RED,
            output_dir: PathBuf::from("frames"),
            interruptions: Vec::new(),
            clear_mode: ClearMode::MatchingFiles,
            image_extension: default_extension(),
        }
    }

    pub fn from_json_str(s: &str) -> MarkerResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| MarkerError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> MarkerResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read timeline config '{}'", path.display()))?;
        Self::from_json_str(&s).map_err(|e| match e {
            MarkerError::Serde(msg) => {
                MarkerError::serde(format!("'{}': {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> MarkerResult<()> {
        fn finite(name: &str, v: f64) -> MarkerResult<()> {
            if !v.is_finite() {
                return Err(MarkerError::validation(format!(
                    "{name} must be finite (got {v})"
                )));
            }
            Ok(())
        }

        finite("origin_x", self.origin_x)?;
        finite("scale", self.scale)?;
        finite("top_y", self.top_y)?;
        finite("bottom_y", self.bottom_y)?;
        finite("duration_secs", self.duration_secs)?;
        finite("marker_width", self.marker_width)?;
        FrameRate::new(self.frame_rate.as_f64())?;

        if self.scale <= 0.0 {
            return Err(MarkerError::validation("scale must be > 0"));
        }
        if self.bottom_y <= self.top_y {
            return Err(MarkerError::validation("bottom_y must be > top_y"));
        }
        if self.duration_secs < 0.0 {
            return Err(MarkerError::validation("duration_secs must be >= 0"));
        }
        if self.marker_width < 0.0 {
            return Err(MarkerError::validation("marker_width must be >= 0"));
        }

        for (i, it) in self.interruptions.iter().enumerate() {
            finite(&format!("interruptions[{i}].threshold_secs"), it.threshold_secs)?;
            finite(&format!("interruptions[{i}].excluded_secs"), it.excluded_secs)?;
            if it.excluded_secs < 0.0 {
                return Err(MarkerError::validation(format!(
                    "interruptions[{i}].excluded_secs must be >= 0"
                )));
            }
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(MarkerError::validation("output_dir must not be empty"));
        }
        if self.image_extension.is_empty()
            || !self
                .image_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(MarkerError::validation(format!(
                "image_extension must be a bare extension like \"png\" (got \"{}\")",
                self.image_extension
            )));
        }

        let max_frame = 10u64.pow(FRAME_NAME_WIDTH as u32) - 1;
        let last = self.last_frame();
        if last.0 > max_frame {
            return Err(MarkerError::validation(format!(
                "last frame index {} does not fit in {FRAME_NAME_WIDTH} digits (max {max_frame})",
                last.0
            )));
        }

        Ok(())
    }

    /// `floor(duration_secs * frame_rate)`.
    pub fn last_frame(&self) -> FrameIndex {
        self.frame_rate.last_frame_floor(self.duration_secs)
    }

    pub fn frame_count(&self) -> u64 {
        self.last_frame().0 + 1
    }

    pub fn frame_range(&self) -> FrameRange {
        FrameRange::through(self.last_frame())
    }
}
