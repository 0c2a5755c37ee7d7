//! All-pass sections and the preset library.
//!
//! - [`make_section`]: the slider-driven real-axis section, zero at `a` and
//!   pole at `1/a`.
//! - [`AllPassPreset`]: classic first-order `(a + z⁻¹)/(1 + a z⁻¹)` sections
//!   and one second-order conjugate section.
//!
//! Merging only appends roots; recording the merge in history is up to the
//! owner of the model.

use core::f64::consts::FRAC_PI_4;
use core::fmt;

use num_complex::Complex64;

use crate::error::{Result, ZplaneError};
use crate::model::{PoleZeroModel, RootKind};
use crate::transfer::zpk_response;

/// One all-pass section: zero at `a`, pole at `1/a`.
///
/// `a` must lie in `(0, 1]`; `a = 0` would put the pole at infinity.
pub fn make_section(a: f64) -> Result<(Complex64, Complex64)> {
    if !a.is_finite() || !(0.0..=1.0).contains(&a) {
        return Err(ZplaneError::invalid(format!("all-pass coefficient {a} must lie in [0, 1]")));
    }
    if a == 0.0 {
        return Err(ZplaneError::invalid("all-pass coefficient 0 puts the pole at infinity"));
    }
    Ok((Complex64::new(a, 0.0), Complex64::new(1.0 / a, 0.0)))
}

/// Append one section to the model.
pub fn merge(model: &mut PoleZeroModel, zero: Complex64, pole: Complex64) -> Result<()> {
    let mut next = model.clone();
    next.add(RootKind::Zero, zero)?;
    next.add(RootKind::Pole, pole)?;
    *model = next;
    Ok(())
}

/// Built-in all-pass sections.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AllPassPreset {
    /// `(a + z⁻¹)/(1 + a z⁻¹)`: zero at `-1/a`, pole at `-a`.
    FirstOrder(f64),
    /// Conjugate pair at radius `r`, angle `theta`: zeros at `r·e^{±jθ}`,
    /// poles at `(1/r)·e^{±jθ}`.
    SecondOrder { r: f64, theta: f64 },
}

impl AllPassPreset {
    /// The four library entries, in menu order.
    pub fn library() -> [AllPassPreset; 4] {
        [
            AllPassPreset::FirstOrder(0.5),
            AllPassPreset::FirstOrder(0.7),
            AllPassPreset::SecondOrder { r: 0.9, theta: FRAC_PI_4 },
            AllPassPreset::FirstOrder(0.6),
        ]
    }

    pub fn zeros(&self) -> Vec<Complex64> {
        match *self {
            AllPassPreset::FirstOrder(a) => vec![Complex64::new(-1.0 / a, 0.0)],
            AllPassPreset::SecondOrder { r, theta } => {
                let z = Complex64::from_polar(r, theta);
                vec![z, z.conj()]
            }
        }
    }

    pub fn poles(&self) -> Vec<Complex64> {
        match *self {
            AllPassPreset::FirstOrder(a) => vec![Complex64::new(-a, 0.0)],
            AllPassPreset::SecondOrder { r, theta } => {
                let p = Complex64::from_polar(1.0 / r, theta);
                vec![p, p.conj()]
            }
        }
    }

    /// Unwrapped phase on the standard `n`-point grid, model untouched.
    pub fn preview_phase(&self, n: usize) -> Vec<f64> {
        zpk_response(&self.zeros(), &self.poles(), 1.0, n).unwrapped_phase()
    }

    /// Append this preset's roots to the model.
    pub fn merge_into(&self, model: &mut PoleZeroModel) -> Result<()> {
        let mut next = model.clone();
        for z in self.zeros() {
            next.add(RootKind::Zero, z)?;
        }
        for p in self.poles() {
            next.add(RootKind::Pole, p)?;
        }
        *model = next;
        Ok(())
    }
}

impl fmt::Display for AllPassPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllPassPreset::FirstOrder(a) => write!(f, "first-order all-pass, real pole at {a}"),
            AllPassPreset::SecondOrder { r, theta } => {
                write!(f, "second-order all-pass, conjugate pair r={r} theta={theta:.4}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{frequency_response, to_coefficients};

    #[test]
    fn section_example() {
        let (z, p) = make_section(0.5).unwrap();
        assert_eq!(z, Complex64::new(0.5, 0.0));
        assert_eq!(p, Complex64::new(2.0, 0.0));

        let err = make_section(0.0).unwrap_err();
        assert!(matches!(err, ZplaneError::InvalidParameter(_)), "{err}");
        assert!(make_section(-0.1).is_err());
        assert!(make_section(f64::NAN).is_err());
        assert!(make_section(1.0).is_ok());
    }

    #[test]
    fn merge_appends_both_roots() {
        let mut m = PoleZeroModel::new().with_conjugate_mode(true);
        m.add(RootKind::Pole, Complex64::new(0.1, 0.0)).unwrap();
        let (z, p) = make_section(0.25).unwrap();
        merge(&mut m, z, p).unwrap();
        assert_eq!(m.zeros(), &[z]);
        assert_eq!(m.poles(), &[Complex64::new(0.1, 0.0), p]);
    }

    #[test]
    fn presets_have_flat_magnitude() {
        for preset in AllPassPreset::library() {
            let co = to_coefficients(&preset.zeros(), &preset.poles(), 1.0);
            let r = frequency_response(&co, 64);
            let m0 = r.magnitude[0];
            for m in &r.magnitude {
                assert!((m / m0 - 1.0).abs() < 1e-9, "{preset}: {m} vs {m0}");
            }
        }
    }

    #[test]
    fn first_order_preset_phase_runs_to_minus_pi() {
        let phase = AllPassPreset::FirstOrder(0.5).preview_phase(256);
        assert!(phase[0].abs() < 1e-12);
        assert!(phase.windows(2).all(|w| w[1] <= w[0] + 1e-12), "phase must be non-increasing");
        assert!((phase[255] + core::f64::consts::PI).abs() < 0.1);
    }

    #[test]
    fn preset_merge_keeps_model_on_error_free_path() {
        let mut m = PoleZeroModel::new();
        AllPassPreset::library()[2].merge_into(&mut m).unwrap();
        assert_eq!(m.zeros().len(), 2);
        assert_eq!(m.poles().len(), 2);
        assert!((m.poles()[0].norm() - 1.0 / 0.9).abs() < 1e-12);
    }
}
