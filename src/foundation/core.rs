use crate::foundation::error::{MarkerError, MarkerResult};

pub use kurbo::{Point, Rect};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> MarkerResult<Self> {
        if start.0 > end.0 {
            return Err(MarkerError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Range covering `0..=last`.
    pub fn through(last: FrameIndex) -> Self {
        Self {
            start: FrameIndex(0),
            end: FrameIndex(last.0.saturating_add(1)),
        }
    }

    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    pub fn iter(self) -> impl Iterator<Item = FrameIndex> {
        (self.start.0..self.end.0).map(FrameIndex)
    }

    /// Split into consecutive sub-ranges of at most `chunk` frames (`0` is treated as `1`).
    pub fn chunks(self, chunk: u64) -> impl Iterator<Item = FrameRange> {
        let chunk = chunk.max(1);
        let end = self.end.0;
        (self.start.0..end).step_by(chunk as usize).map(move |s| FrameRange {
            start: FrameIndex(s),
            end: FrameIndex(s.saturating_add(chunk).min(end)),
        })
    }
}

/// Output sampling rate in frames per second. Fractional rates (e.g. `0.5`, one frame every two
/// seconds) are the common case.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FrameRate(f64);

impl FrameRate {
    /// One frame every two seconds.
    pub const HALF: Self = Self(0.5);

    pub fn new(fps: f64) -> MarkerResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MarkerError::validation(format!(
                "frame rate must be finite and > 0 (got {fps})"
            )));
        }
        Ok(Self(fps))
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn frame_to_secs(self, frame: FrameIndex) -> f64 {
        (frame.0 as f64) / self.0
    }

    /// Index of the last frame for a clip of `secs` seconds: `floor(secs * fps)`.
    pub fn last_frame_floor(self, secs: f64) -> FrameIndex {
        FrameIndex((secs * self.0).floor().max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_range_contains_boundaries() {
        let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
        assert!(!r.contains(FrameIndex(1)));
        assert!(r.contains(FrameIndex(2)));
        assert!(r.contains(FrameIndex(4)));
        assert!(!r.contains(FrameIndex(5)));
        assert!(FrameRange::new(FrameIndex(5), FrameIndex(2)).is_err());
    }

    #[test]
    fn through_is_inclusive() {
        let r = FrameRange::through(FrameIndex(3));
        assert_eq!(r.len_frames(), 4);
        assert_eq!(r.iter().last(), Some(FrameIndex(3)));
    }

    #[test]
    fn chunks_cover_range_without_overlap() {
        let r = FrameRange::through(FrameIndex(9));
        let chunks: Vec<_> = r.chunks(4).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start, FrameIndex(0));
        assert_eq!(chunks[2].end, FrameIndex(10));
        let total: u64 = chunks.iter().map(|c| c.len_frames()).sum();
        assert_eq!(total, 10);

        assert_eq!(r.chunks(0).count(), 10);
    }

    #[test]
    fn frame_rate_rejects_non_positive() {
        assert!(FrameRate::new(0.0).is_err());
        assert!(FrameRate::new(-1.0).is_err());
        assert!(FrameRate::new(f64::NAN).is_err());
        assert!(FrameRate::new(f64::INFINITY).is_err());
    }

    #[test]
    fn half_fps_maps_frames_to_even_seconds() {
        let fps = FrameRate::new(0.5).unwrap();
        assert_eq!(fps.frame_to_secs(FrameIndex(0)), 0.0);
        assert_eq!(fps.frame_to_secs(FrameIndex(63)), 126.0);
        assert_eq!(fps.last_frame_floor(9085.0), FrameIndex(4542));
        assert_eq!(fps.last_frame_floor(0.0), FrameIndex(0));
    }
}
