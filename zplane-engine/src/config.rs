//! Designer session configuration.

use num_complex::Complex64;
use zplane_core::design::BAND_SPREAD;
use zplane_core::error::{Result, ZplaneError};
use zplane_core::history::HISTORY_CAPACITY;
use zplane_core::model::{DEFAULT_POLE, DEFAULT_ZERO, HIT_TOLERANCE, PLOT_RADIUS};

use crate::sources::GESTURE_CAPACITY;
use crate::stream::{MAX_RATE, MIN_RATE};

/// Points on the response grid when the caller does not pick one.
pub const RESPONSE_POINTS: usize = 8000;

#[derive(Clone, Debug, PartialEq)]
pub struct DesignerConfig {
    pub history_capacity: usize,
    pub conjugate_mode: bool,
    /// Tick cadence for both streams, `1..=100`.
    pub points_per_second: u32,
    pub response_points: usize,
    pub gesture_capacity: usize,
    pub plot_radius: f64,
    pub hit_tolerance: f64,
    pub default_zero: Complex64,
    pub default_pole: Complex64,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            history_capacity: HISTORY_CAPACITY,
            conjugate_mode: true,
            points_per_second: 10,
            response_points: RESPONSE_POINTS,
            gesture_capacity: GESTURE_CAPACITY,
            plot_radius: PLOT_RADIUS,
            hit_tolerance: HIT_TOLERANCE,
            default_zero: DEFAULT_ZERO,
            default_pole: DEFAULT_POLE,
        }
    }
}

impl DesignerConfig {
    /// Band-pass spread around the cutoff; fixed by policy.
    #[inline] pub fn bandpass_spread(&self) -> f64 { BAND_SPREAD }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(ZplaneError::InvalidParameter(msg));
        if self.history_capacity == 0 {
            return bad("history capacity must be at least 1".into());
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.points_per_second) {
            return bad(format!(
                "points per second {} must lie in {MIN_RATE}..={MAX_RATE}",
                self.points_per_second
            ));
        }
        if self.response_points == 0 {
            return bad("response grid needs at least one point".into());
        }
        if self.gesture_capacity == 0 {
            return bad("gesture capacity must be at least 1".into());
        }
        if !(self.plot_radius.is_finite() && self.plot_radius > 0.0) {
            return bad(format!("plot radius {} must be positive", self.plot_radius));
        }
        if !(self.hit_tolerance.is_finite() && self.hit_tolerance > 0.0) {
            return bad(format!("hit tolerance {} must be positive", self.hit_tolerance));
        }
        for (what, z) in [("zero", self.default_zero), ("pole", self.default_pole)] {
            if !(z.re.is_finite() && z.im.is_finite()) || z.norm() > self.plot_radius {
                return bad(format!("default {what} {z} must be finite and inside the plot radius"));
            }
        }
        Ok(())
    }
}
