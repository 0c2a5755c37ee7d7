//! ZPK → transfer-function coefficients, frequency response and the
//! steady-state seed used by the streaming engines.
//!
//! Design
//! - Stateless free functions; callers re-derive after every mutation.
//! - Roots are completed to a realizable (conjugate-closed) set first, so
//!   the derived coefficients are real and agree with [`crate::sos`].
//! - A model with no roots at all is the fixed pass-through `[1.0] / [1.0]`,
//!   whatever its gain. One empty list alone gives a degree-0 polynomial.
//! - Displayed responses are evaluated from the roots, never from the
//!   expanded polynomials, which lose the passband of narrow designs.

use core::f64::consts::PI;

use num_complex::Complex64;
use tracing::{debug, warn};

use crate::dsp::{is_conjugate_of, is_real, lin_to_db, rel_err, unwrap_phase};
use crate::error::{Result, ZplaneError};
use crate::poly;

/// Imaginary residue above this (relative) is reported when coefficients are
/// projected onto the reals.
const RESIDUE_WARN: f64 = 1.0e-8;

/// Numerator and denominator in descending powers, read as `z^-k` taps.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCoefficients {
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

impl FilterCoefficients {
    /// Validating constructor: both arrays non-empty and finite,
    /// `denominator[0] != 0`.
    pub fn new(numerator: Vec<f64>, denominator: Vec<f64>) -> Result<Self> {
        if numerator.is_empty() || denominator.is_empty() {
            return Err(ZplaneError::invalid("coefficient arrays must not be empty"));
        }
        if numerator.iter().chain(denominator.iter()).any(|c| !c.is_finite()) {
            return Err(ZplaneError::invalid("coefficients must be finite"));
        }
        if denominator[0] == 0.0 {
            return Err(ZplaneError::invalid("leading denominator coefficient is zero"));
        }
        Ok(Self { numerator, denominator })
    }

    /// Pass-through `[1.0] / [1.0]`.
    pub fn unity() -> Self {
        Self { numerator: vec![1.0], denominator: vec![1.0] }
    }

    /// `max(len(b), len(a)) - 1`.
    #[inline]
    pub fn order(&self) -> usize {
        self.numerator.len().max(self.denominator.len()).saturating_sub(1)
    }

    /// Length of the recursive state vector.
    #[inline]
    pub fn state_len(&self) -> usize {
        self.order()
    }

    /// Copy with `a0 = 1` and both arrays zero-padded to `order + 1`.
    pub fn normalized(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.order() + 1;
        let a0 = self.denominator.first().copied().unwrap_or(1.0);
        let a0 = if a0 == 0.0 { 1.0 } else { a0 };
        let b = poly::pad_to(&self.numerator, n).into_iter().map(|x| x / a0).collect();
        let a = poly::pad_to(&self.denominator, n).into_iter().map(|x| x / a0).collect();
        (b, a)
    }

    /// Element-wise relative comparison with zero padding on the shorter side.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        fn same(x: &[f64], y: &[f64], tol: f64) -> bool {
            let n = x.len().max(y.len());
            (0..n).all(|i| {
                let a = x.get(i).copied().unwrap_or(0.0);
                let b = y.get(i).copied().unwrap_or(0.0);
                rel_err(a, b) <= tol
            })
        }
        same(&self.numerator, &other.numerator, tol)
            && same(&self.denominator, &other.denominator, tol)
    }

    /// Complex response at `normalized` frequency (1.0 = Nyquist).
    pub fn evaluate(&self, normalized: f64) -> Complex64 {
        let x = Complex64::from_polar(1.0, -PI * normalized);
        poly::eval_ascending(&self.numerator, x) / poly::eval_ascending(&self.denominator, x)
    }
}

/// Append a conjugate for every complex root that lacks one.
///
/// Matching is one-to-one (a conjugate already paired with another root is
/// not reused), so two copies of `p` without partners get two conjugates.
pub fn realizable_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut out = roots.to_vec();
    let mut used = vec![false; roots.len()];
    for i in 0..roots.len() {
        if used[i] || is_real(roots[i]) {
            continue;
        }
        used[i] = true;
        let partner =
            (i + 1..roots.len()).find(|&j| !used[j] && is_conjugate_of(roots[i], roots[j]));
        match partner {
            Some(j) => used[j] = true,
            None => out.push(roots[i].conj()),
        }
    }
    out
}

/// Real polynomial with the given roots scaled by `gain`.
fn real_poly(roots: &[Complex64], gain: f64, what: &str) -> Vec<f64> {
    let p = poly::from_roots(&realizable_roots(roots));
    let scale = p.iter().map(|c| c.norm()).fold(1.0_f64, f64::max);
    let residue = p.iter().map(|c| c.im.abs()).fold(0.0_f64, f64::max);
    if residue > RESIDUE_WARN * scale {
        warn!(what, residue, "discarding imaginary residue of coefficients");
    }
    p.into_iter().map(|c| gain * c.re).collect()
}

/// Gain actually applied: the root-less model is pinned to unity.
#[inline]
pub fn effective_gain(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> f64 {
    if zeros.is_empty() && poles.is_empty() { 1.0 } else { gain }
}

/// ZPK → `(numerator, denominator)`.
///
/// Numerator is `gain · Π(z - zᵢ)`, denominator `Π(z - pᵢ)`, each over the
/// realizable completion of its roots. No roots at all gives
/// [`FilterCoefficients::unity`].
pub fn to_coefficients(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> FilterCoefficients {
    if zeros.is_empty() && poles.is_empty() {
        return FilterCoefficients::unity();
    }
    let numerator = real_poly(zeros, gain, "numerator");
    let denominator = real_poly(poles, 1.0, "denominator");
    debug!(nb = numerator.len(), na = denominator.len(), "coefficients derived");
    FilterCoefficients { numerator, denominator }
}

// ------------------------------ Frequency response ------------------------------

/// Sampled response on `[0, π)` (endpoint excluded).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrequencyResponse {
    /// Normalized frequency, 1.0 = Nyquist.
    pub frequency: Vec<f64>,
    pub magnitude: Vec<f64>,
    pub magnitude_db: Vec<f64>,
    /// Wrapped phase in radians.
    pub phase: Vec<f64>,
}

impl FrequencyResponse {
    #[inline] pub fn len(&self) -> usize { self.frequency.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.frequency.is_empty() }

    pub fn unwrapped_phase(&self) -> Vec<f64> {
        unwrap_phase(&self.phase)
    }

    /// Index of the largest magnitude (first one on ties).
    pub fn peak_index(&self) -> Option<usize> {
        self.magnitude
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &m)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((i, m)),
            })
            .map(|(i, _)| i)
    }
}

/// `n` normalized frequencies `k/n`, `k = 0..n`.
pub fn frequency_grid(n: usize) -> Vec<f64> {
    (0..n).map(|k| k as f64 / n as f64).collect()
}

fn sample_response(n: usize, mut h_at: impl FnMut(f64) -> Complex64) -> FrequencyResponse {
    let frequency = frequency_grid(n);
    let mut magnitude = Vec::with_capacity(n);
    let mut magnitude_db = Vec::with_capacity(n);
    let mut phase = Vec::with_capacity(n);
    for &f in &frequency {
        let h = h_at(f);
        let m = h.norm();
        magnitude.push(m);
        magnitude_db.push(lin_to_db(m));
        phase.push(h.arg());
    }
    FrequencyResponse { frequency, magnitude, magnitude_db, phase }
}

/// Response of expanded coefficients. Fine for low orders and wide bands;
/// use [`zpk_response`] for display.
pub fn frequency_response(coeffs: &FilterCoefficients, n: usize) -> FrequencyResponse {
    sample_response(n, |f| coeffs.evaluate(f))
}

/// `gain · Π(e^{jω} - zᵢ) / Π(e^{jω} - pᵢ)` at `normalized` frequency, over
/// the realizable roots.
pub fn evaluate_zpk(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
    normalized: f64,
) -> Complex64 {
    let w = Complex64::from_polar(1.0, PI * normalized);
    let k = effective_gain(zeros, poles, gain);
    zpk_at(&realizable_roots(zeros), &realizable_roots(poles), k, w)
}

#[inline]
fn zpk_at(zeros: &[Complex64], poles: &[Complex64], gain: f64, w: Complex64) -> Complex64 {
    let one = Complex64::new(1.0, 0.0);
    let num = zeros.iter().fold(one, |acc, &z| acc * (w - z));
    let den = poles.iter().fold(one, |acc, &p| acc * (w - p));
    gain * num / den
}

/// Response sampled straight from the roots on the same grid as
/// [`frequency_response`].
pub fn zpk_response(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
    n: usize,
) -> FrequencyResponse {
    let z = realizable_roots(zeros);
    let p = realizable_roots(poles);
    let k = effective_gain(zeros, poles, gain);
    sample_response(n, |f| zpk_at(&z, &p, k, Complex64::from_polar(1.0, PI * f)))
}

// ------------------------------ Steady state ------------------------------------

/// Transposed Direct-Form-II state reached by a unit step input.
///
/// Scale by the first input sample to start a stream without a transient.
/// With `G = Σb / Σa`, the state is `zᵢ = Σ_{k>i} (b_k - a_k·G)`. A system
/// with `Σa = 0` (pole at z = 1) has no steady state; the zero state is
/// returned instead.
pub fn steady_state(coeffs: &FilterCoefficients) -> Vec<f64> {
    let (b, a) = coeffs.normalized();
    let n = b.len() - 1;
    if n == 0 {
        return Vec::new();
    }
    let asum: f64 = a.iter().sum();
    if asum.abs() < 1e-12 {
        warn!("singular steady state (pole at z = 1); seeding with zeros");
        return vec![0.0; n];
    }
    let g = b.iter().sum::<f64>() / asum;
    let mut zi = vec![0.0; n];
    let mut acc = 0.0;
    for i in (0..n).rev() {
        acc += b[i + 1] - a[i + 1] * g;
        zi[i] = acc;
    }
    zi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn single_pole_example() {
        let co = to_coefficients(&[], &[c(0.5, 0.0)], 1.0);
        assert_eq!(co.numerator, vec![1.0]);
        assert_eq!(co.denominator, vec![1.0, -0.5]);
        assert_eq!(co.order(), 1);
    }

    #[test]
    fn empty_model_is_unity() {
        let co = to_coefficients(&[], &[], 1.0);
        assert_eq!(co, FilterCoefficients::unity());
        let co = to_coefficients(&[], &[], 0.0675);
        assert_eq!(co, FilterCoefficients::unity(), "gain ignored without roots");
        assert_eq!(to_coefficients(&[], &[c(0.5, 0.0)], 0.5).numerator, vec![0.5]);
        let r = zpk_response(&[], &[], 3.0, 8);
        assert!(r.magnitude.iter().all(|m| (m - 1.0).abs() < 1e-15));
    }

    #[test]
    fn zpk_response_agrees_with_coefficients_for_low_order() {
        let zeros = [c(-1.0, 0.0), c(0.2, 0.7)];
        let poles = [c(0.6, 0.3), c(0.6, -0.3), c(-0.4, 0.0), c(0.1, 0.0)];
        let co = to_coefficients(&zeros, &poles, 0.2);
        let direct = frequency_response(&co, 64);
        let roots = zpk_response(&zeros, &poles, 0.2, 64);
        for i in 0..64 {
            assert!(
                (direct.magnitude[i] - roots.magnitude[i]).abs() < 1e-12,
                "i={} {} vs {}",
                i,
                direct.magnitude[i],
                roots.magnitude[i]
            );
        }
        let h = evaluate_zpk(&zeros, &poles, 0.2, roots.frequency[5]);
        assert!((h.norm() - roots.magnitude[5]).abs() < 1e-15);
        assert!((h.arg() - roots.phase[5]).abs() < 1e-15);
    }

    #[test]
    fn lone_complex_root_is_completed() {
        let co = to_coefficients(&[c(0.0, 1.0)], &[c(0.3, 0.4)], 2.0);
        // 2(z^2 + 1) / (z^2 - 0.6z + 0.25)
        let want = FilterCoefficients::new(vec![2.0, 0.0, 2.0], vec![1.0, -0.6, 0.25]).unwrap();
        assert!(co.approx_eq(&want, 1e-12), "{:?}", co);
    }

    #[test]
    fn realizable_matching_is_one_to_one() {
        let p = c(0.4, 0.4);
        let r = realizable_roots(&[p, p, p.conj()]);
        assert_eq!(r.len(), 4);
        assert_eq!(r[3], p.conj());
        assert_eq!(realizable_roots(&[c(0.2, 0.0), c(-0.1, 0.0)]).len(), 2);
    }

    #[test]
    fn constructor_rejects_bad_arrays() {
        assert!(FilterCoefficients::new(vec![], vec![1.0]).is_err());
        assert!(FilterCoefficients::new(vec![1.0], vec![0.0, 1.0]).is_err());
        assert!(FilterCoefficients::new(vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn response_grid_excludes_nyquist() {
        let co = to_coefficients(&[c(-1.0, 0.0)], &[c(0.0, 0.0)], 0.5);
        let r = frequency_response(&co, 4);
        assert_eq!(r.frequency, vec![0.0, 0.25, 0.5, 0.75]);
        // (1 + z^-1)/2 has unit DC gain and falls towards Nyquist.
        assert!((r.magnitude[0] - 1.0).abs() < 1e-12);
        assert!(r.magnitude.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(r.peak_index(), Some(0));
        assert!(frequency_response(&co, 0).is_empty());
    }

    #[test]
    fn steady_state_holds_step_output_constant() {
        let co = to_coefficients(&[c(-0.5, 0.0)], &[c(0.6, 0.3), c(0.6, -0.3)], 0.3);
        let (b, a) = co.normalized();
        let x0 = 2.5;
        let mut z: Vec<f64> = steady_state(&co).iter().map(|v| v * x0).collect();
        let dc = b.iter().sum::<f64>() / a.iter().sum::<f64>();
        for _ in 0..20 {
            let y = b[0] * x0 + z[0];
            for i in 0..z.len() {
                let next = z.get(i + 1).copied().unwrap_or(0.0);
                z[i] = b[i + 1] * x0 + next - a[i + 1] * y;
            }
            assert!((y - dc * x0).abs() < 1e-12, "y={} want={}", y, dc * x0);
        }
    }

    #[test]
    fn singular_steady_state_is_zero() {
        let co = to_coefficients(&[], &[c(1.0, 0.0)], 1.0);
        assert_eq!(steady_state(&co), vec![0.0]);
        assert!(steady_state(&FilterCoefficients::unity()).is_empty());
    }
}
