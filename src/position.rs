use crate::{
    config::timeline::{Interruption, TimelineConfig},
    foundation::core::{FrameIndex, Rect},
};

/// Where the marker sits on one frame, in sub-pixel chart coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerBounds {
    pub frame: FrameIndex,
    /// Elapsed playback seconds in the output video.
    pub secs: f64,
    pub x0: f64,
    pub x1: f64,
    pub top_y: f64,
    pub bottom_y: f64,
}

impl MarkerBounds {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x0, self.top_y, self.x1, self.bottom_y)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }
}

/// Place the marker for `frame`.
///
/// `x0 = origin_x + scale * frame / fps`, plus `scale * excluded_secs` for every interruption
/// whose threshold is strictly below the frame's elapsed time. Each interruption is checked on its
/// own, so list order does not matter. Nothing is carried over between frames.
pub fn compute_marker_bounds(
    cfg: &TimelineConfig,
    interruptions: &[Interruption],
    frame: FrameIndex,
) -> MarkerBounds {
    let secs = cfg.frame_rate.frame_to_secs(frame);

    let x0 = cfg.origin_x
        + cfg.scale * (frame.0 as f64) / cfg.frame_rate.as_f64()
        + interruption_offset(cfg.scale, interruptions, secs);

    MarkerBounds {
        frame,
        secs,
        x0,
        x1: x0 + cfg.marker_width,
        top_y: cfg.top_y,
        bottom_y: cfg.bottom_y,
    }
}

/// Total pixel shift contributed by interruptions at `secs`.
pub fn interruption_offset(scale: f64, interruptions: &[Interruption], secs: f64) -> f64 {
    interruptions
        .iter()
        .filter(|it| secs > it.threshold_secs)
        .map(|it| scale * it.excluded_secs)
        .sum()
}

impl TimelineConfig {
    /// [`compute_marker_bounds`] with this config's own interruption list.
    pub fn marker_bounds(&self, frame: FrameIndex) -> MarkerBounds {
        compute_marker_bounds(self, &self.interruptions, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::FrameRate;

    const EPS: f64 = 1e-9;

    fn scenario() -> TimelineConfig {
        TimelineConfig {
            origin_x: 110.0,
            scale: 0.15542,
            top_y: 72.0,
            bottom_y: 948.0,
            duration_secs: 400.0,
            frame_rate: FrameRate::new(0.5).unwrap(),
            marker_width: 2.0,
            interruptions: vec![Interruption::new(125.0, 803.0)],
            ..TimelineConfig::default()
        }
    }

    #[test]
    fn first_frames_follow_linear_term() {
        let cfg = scenario();

        let b = cfg.marker_bounds(FrameIndex(0));
        assert_eq!(b.secs, 0.0);
        assert_eq!(b.x0, 110.0);
        assert_eq!(b.x1, 112.0);

        let b = cfg.marker_bounds(FrameIndex(1));
        assert_eq!(b.secs, 2.0);
        assert!((b.x0 - (110.0 + 0.15542 * 2.0)).abs() < EPS);
        assert!((b.x1 - (112.0 + 0.15542 * 2.0)).abs() < EPS);
    }

    #[test]
    fn interruption_applies_only_after_threshold() {
        let cfg = scenario();
        let jump = 0.15542 * 803.0;

        // sec = 124
        let before = cfg.marker_bounds(FrameIndex(62));
        assert!((before.x0 - (110.0 + 0.15542 * 124.0)).abs() < EPS);

        // sec = 126, first frame strictly past 125
        let after = cfg.marker_bounds(FrameIndex(63));
        assert_eq!(after.secs, 126.0);
        assert!((after.x0 - (110.0 + 0.15542 * 126.0 + jump)).abs() < EPS);
    }

    #[test]
    fn threshold_equal_to_elapsed_is_not_applied() {
        let cfg = TimelineConfig {
            interruptions: vec![Interruption::new(126.0, 100.0)],
            ..scenario()
        };
        let at = cfg.marker_bounds(FrameIndex(63));
        assert!((at.x0 - (110.0 + 0.15542 * 126.0)).abs() < EPS);

        let past = cfg.marker_bounds(FrameIndex(64));
        assert!((past.x0 - (110.0 + 0.15542 * 128.0 + 0.15542 * 100.0)).abs() < EPS);
    }

    #[test]
    fn interruptions_are_cumulative_and_order_independent() {
        let cfg = scenario();
        let a = Interruption::new(10.0, 30.0);
        let b = Interruption::new(20.0, 50.0);
        let base = |f: u64| cfg.origin_x + cfg.scale * (f as f64) * 2.0;

        // sec = 14: only the first
        let mid = compute_marker_bounds(&cfg, &[a, b], FrameIndex(7));
        assert!((mid.x0 - (base(7) + cfg.scale * 30.0)).abs() < EPS);

        // sec = 22: both
        let late = compute_marker_bounds(&cfg, &[a, b], FrameIndex(11));
        assert!((late.x0 - (base(11) + cfg.scale * 80.0)).abs() < EPS);

        let reversed = compute_marker_bounds(&cfg, &[b, a], FrameIndex(11));
        assert!((late.x0 - reversed.x0).abs() < EPS);
    }

    #[test]
    fn zero_length_interruption_is_a_no_op() {
        let cfg = scenario();
        let with = compute_marker_bounds(&cfg, &[Interruption::new(0.0, 0.0)], FrameIndex(5));
        let without = compute_marker_bounds(&cfg, &[], FrameIndex(5));
        assert_eq!(with.x0, without.x0);
    }

    #[test]
    fn offset_helper_matches_bounds() {
        let cfg = scenario();
        let its = [Interruption::new(10.0, 30.0), Interruption::new(20.0, 50.0)];
        for f in [0u64, 5, 6, 10, 11, 40] {
            let with = compute_marker_bounds(&cfg, &its, FrameIndex(f));
            let without = compute_marker_bounds(&cfg, &[], FrameIndex(f));
            let off = interruption_offset(cfg.scale, &its, with.secs);
            assert!((with.x0 - without.x0 - off).abs() < EPS);
        }
    }

    #[test]
    fn rect_view_spans_marker() {
        let b = scenario().marker_bounds(FrameIndex(0));
        let r = b.rect();
        assert_eq!(r.x0, 110.0);
        assert_eq!(r.x1, 112.0);
        assert_eq!(r.y0, 72.0);
        assert_eq!(r.y1, 948.0);
        assert_eq!(b.width(), 2.0);
    }
}
