//! Polynomial helpers.
//!
//! Coefficient slices are ordered highest degree first, matching the
//! `numerator`/`denominator` convention of [`crate::transfer::FilterCoefficients`].

use num_complex::Complex64;
use num_traits::{One, Zero};

use crate::dsp::CONJ_TOL;

/// Monic polynomial whose roots are `roots` (empty input gives `[1]`).
pub fn from_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut p = Vec::with_capacity(roots.len() + 1);
    p.push(Complex64::one());
    for &r in roots {
        p.push(Complex64::zero());
        for k in (1..p.len()).rev() {
            let prev = p[k - 1];
            p[k] -= r * prev;
        }
    }
    p
}

/// Real polynomial product (full convolution).
pub fn mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Horner evaluation of a highest-first real polynomial at complex `z`.
pub fn eval(coeffs: &[f64], z: Complex64) -> Complex64 {
    coeffs
        .iter()
        .fold(Complex64::zero(), |acc, &c| acc * z + c)
}

/// Evaluate `c0 + c1 x + c2 x^2 + ...` at `x`, i.e. the coefficients read as
/// powers of `z^-1` with `x = z^-1`.
pub fn eval_ascending(coeffs: &[f64], x: Complex64) -> Complex64 {
    coeffs
        .iter()
        .rev()
        .fold(Complex64::zero(), |acc, &c| acc * x + c)
}

/// Pad `p` with trailing zeros to `len` entries.
pub fn pad_to(p: &[f64], len: usize) -> Vec<f64> {
    let mut out = p.to_vec();
    if out.len() < len {
        out.resize(len, 0.0);
    }
    out
}

const ROOT_MAX_ITER: usize = 2000;

/// All complex roots of a real polynomial (highest degree first) via
/// Durand–Kerner iteration, returned with exact conjugate symmetry.
///
/// Meant for the small, well-separated polynomials the synthesizer needs
/// (Bessel prototypes up to the design order limit).
pub fn roots(coeffs: &[f64]) -> Vec<Complex64> {
    let lead = match coeffs.iter().position(|c| *c != 0.0) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let c: Vec<f64> = coeffs[lead..].iter().map(|x| x / coeffs[lead]).collect();
    let n = c.len() - 1;
    if n == 0 {
        return Vec::new();
    }

    // Fujiwara bound keeps the initial circle around every root.
    let radius = (1..=n)
        .map(|k| {
            let v = c[k].abs();
            if k == n { (v / 2.0).powf(1.0 / k as f64) } else { v.powf(1.0 / k as f64) }
        })
        .fold(0.0_f64, f64::max)
        * 2.0;
    let radius = radius.max(1.0);

    let seed = Complex64::from_polar(1.0, 0.4);
    let mut z: Vec<Complex64> = (0..n)
        .map(|k| seed * Complex64::from_polar(radius, core::f64::consts::TAU * k as f64 / n as f64))
        .collect();

    for _ in 0..ROOT_MAX_ITER {
        let mut worst = 0.0_f64;
        for i in 0..n {
            let zi = z[i];
            let mut denom = Complex64::one();
            for (j, zj) in z.iter().enumerate() {
                if j != i {
                    denom *= zi - zj;
                }
            }
            if denom.norm() == 0.0 {
                denom = Complex64::new(1e-12, 0.0);
            }
            let step = eval(&c, zi) / denom;
            z[i] = zi - step;
            worst = worst.max(step.norm() / zi.norm().max(1.0));
        }
        if worst < 1e-15 {
            break;
        }
    }

    symmetrize(z)
}

/// Snap near-real roots onto the real axis and rebuild conjugate pairs from
/// the upper half plane. Falls back to the raw roots when the split is not
/// consistent with a real polynomial.
fn symmetrize(raw: Vec<Complex64>) -> Vec<Complex64> {
    let n = raw.len();
    let snap = |r: Complex64| {
        if r.im.abs() <= 1e3 * CONJ_TOL * r.norm().max(1.0) { Complex64::new(r.re, 0.0) } else { r }
    };
    let snapped: Vec<Complex64> = raw.iter().copied().map(snap).collect();
    let mut reals: Vec<Complex64> = snapped.iter().copied().filter(|r| r.im == 0.0).collect();
    let upper: Vec<Complex64> = snapped.iter().copied().filter(|r| r.im > 0.0).collect();
    if reals.len() + 2 * upper.len() != n {
        return raw;
    }
    reals.sort_by(|a, b| a.re.total_cmp(&b.re));
    let mut out = Vec::with_capacity(n);
    for u in upper {
        out.push(u);
        out.push(u.conj());
    }
    out.extend(reals);
    out
}
