//! Rate controller: maps a target (apparent) frame rate onto a playback speed.
//!
//! Lowering the target rate slows the underlying media down instead of
//! dropping frames, so every source frame is still shown.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};

/// Slowest playback rate the media pipeline can achieve.
pub const MIN_SPEED: f64 = 0.0625;
/// Fastest playback rate the media pipeline can achieve.
pub const MAX_SPEED: f64 = 16.0;
/// Target and source rate used for a fresh session and on reset.
pub const DEFAULT_FPS: Fps = Fps::from_raw(24);
/// Upper bound of the target-FPS slider when the source is slow.
const MIN_TARGET_CEILING: u32 = 60;

/// A strictly positive frame rate in frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Fps(NonZeroU32);

impl Fps {
    pub fn new(fps: u32) -> Result<Self> {
        NonZeroU32::new(fps)
            .map(Self)
            .ok_or(PlayerError::InvalidFrameRate(fps))
    }

    /// Build from a constant. Panics on zero.
    pub const fn from_raw(fps: u32) -> Self {
        match NonZeroU32::new(fps) {
            Some(v) => Self(v),
            None => panic!("frame rate must be non-zero"),
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Duration of one frame in seconds.
    pub fn frame_secs(self) -> f64 {
        1.0 / self.get() as f64
    }
}

impl TryFrom<u32> for Fps {
    type Error = PlayerError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Fps> for u32 {
    fn from(fps: Fps) -> u32 {
        fps.get()
    }
}

impl fmt::Display for Fps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} FPS", self.get())
    }
}

/// Playback speed multiplier for showing `source` footage at an apparent `target` rate.
///
/// Ratios outside [`MIN_SPEED`, `MAX_SPEED`] saturate silently.
pub fn compute_speed(target: Fps, source: Fps) -> f64 {
    let ratio = target.get() as f64 / source.get() as f64;
    ratio.clamp(MIN_SPEED, MAX_SPEED)
}

/// [`compute_speed`] over raw integers. Rejects a zero rate instead of dividing by it.
pub fn try_compute_speed(target: u32, source: u32) -> Result<f64> {
    Ok(compute_speed(Fps::new(target)?, Fps::new(source)?))
}

/// Valid target-FPS values for a given source: `1..=max(60, 2 * source)`.
pub fn target_fps_range(source: Fps) -> RangeInclusive<u32> {
    1..=MIN_TARGET_CEILING.max(source.get().saturating_mul(2))
}

/// Saturate host input (e.g. a slider value) into the target-FPS domain.
pub fn clamp_target_fps(requested: u32, source: Fps) -> Fps {
    let range = target_fps_range(source);
    Fps::from_raw(requested.clamp(*range.start(), *range.end()))
}

/// Quick-select target rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FpsPreset {
    Fps12,
    Fps24,
    Fps30,
    Fps60,
    /// Play at the source's own rate (speed 1.0).
    MatchSource,
}

impl FpsPreset {
    pub const ALL: [FpsPreset; 5] = [
        FpsPreset::Fps12,
        FpsPreset::Fps24,
        FpsPreset::Fps30,
        FpsPreset::Fps60,
        FpsPreset::MatchSource,
    ];

    /// Resolve the preset against the current source rate.
    pub fn target(self, source: Fps) -> Fps {
        match self {
            FpsPreset::Fps12 => Fps::from_raw(12),
            FpsPreset::Fps24 => Fps::from_raw(24),
            FpsPreset::Fps30 => Fps::from_raw(30),
            FpsPreset::Fps60 => Fps::from_raw(60),
            FpsPreset::MatchSource => source,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FpsPreset::Fps12 => "12 FPS",
            FpsPreset::Fps24 => "24 FPS",
            FpsPreset::Fps30 => "30 FPS",
            FpsPreset::Fps60 => "60 FPS",
            FpsPreset::MatchSource => "Match source",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(target: u32, source: u32) -> f64 {
        try_compute_speed(target, source).unwrap()
    }

    #[test]
    fn unity_when_rates_match() {
        assert!((speed(24, 24) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_passes_through_inside_bounds() {
        assert!((speed(60, 30) - 2.0).abs() < 1e-12);
        assert!((speed(12, 24) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn slow_ratio_saturates_at_min() {
        // 1/30 ≈ 0.033 is below the platform floor
        assert!((speed(1, 30) - MIN_SPEED).abs() < 1e-12);
        assert!((speed(1, 24) - MIN_SPEED).abs() < 1e-12);
    }

    #[test]
    fn upper_boundary_is_exact() {
        assert_eq!(speed(480, 30), 16.0);
        assert_eq!(speed(10_000, 30), MAX_SPEED);
    }

    #[test]
    fn output_always_in_bounds() {
        for target in [1, 2, 7, 24, 60, 119, 480, 1000] {
            for source in [1, 12, 24, 25, 30, 60, 240] {
                let s = speed(target, source);
                assert!((MIN_SPEED..=MAX_SPEED).contains(&s), "{target}/{source} -> {s}");
            }
        }
    }

    #[test]
    fn zero_source_is_rejected() {
        assert!(matches!(
            try_compute_speed(24, 0),
            Err(PlayerError::InvalidFrameRate(0))
        ));
        assert!(Fps::new(0).is_err());
    }

    #[test]
    #[should_panic]
    fn from_raw_zero_panics() {
        let _ = Fps::from_raw(0);
    }

    #[test]
    fn target_range_scales_with_source() {
        assert_eq!(target_fps_range(Fps::from_raw(24)), 1..=60);
        assert_eq!(target_fps_range(Fps::from_raw(30)), 1..=60);
        assert_eq!(target_fps_range(Fps::from_raw(50)), 1..=100);
    }

    #[test]
    fn clamp_target_saturates() {
        let source = Fps::from_raw(24);
        assert_eq!(clamp_target_fps(0, source).get(), 1);
        assert_eq!(clamp_target_fps(30, source).get(), 30);
        assert_eq!(clamp_target_fps(500, source).get(), 60);
    }

    #[test]
    fn presets_resolve() {
        let source = Fps::from_raw(25);
        assert_eq!(FpsPreset::Fps12.target(source).get(), 12);
        assert_eq!(FpsPreset::Fps60.target(source).get(), 60);
        assert_eq!(FpsPreset::MatchSource.target(source), source);
        assert_eq!(FpsPreset::ALL.len(), 5);
    }

    #[test]
    fn fps_serde_rejects_zero() {
        let ok: Fps = serde_json::from_str("30").unwrap();
        assert_eq!(ok.get(), 30);
        assert!(serde_json::from_str::<Fps>("0").is_err());
    }
}
