//! Cascaded second-order sections.
//!
//! Pairing policy
//! - Roots are first completed with [`realizable_roots`].
//! - Complex roots are paired with their conjugate, in order of appearance.
//! - Remaining real roots are paired in order; an odd one out becomes a
//!   first-order factor `[1, -r, 0]`.
//! - The shorter factor list is padded with `[1, 0, 0]`.
//! - The overall gain multiplies the numerator of the first section; a model
//!   without roots is the unity section whatever its gain.
//!
//! Every section is stored as `[b0, b1, b2, a0, a1, a2]` with `a0 = 1`.

use num_complex::Complex64;

use crate::dsp::{is_conjugate_of, is_real};
use crate::poly;
use crate::transfer::{effective_gain, realizable_roots, FilterCoefficients};

/// One biquad `[b0, b1, b2, a0, a1, a2]`.
pub type SosBlock = [f64; 6];

const IDENTITY: [f64; 3] = [1.0, 0.0, 0.0];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SosDecomposition {
    sections: Vec<SosBlock>,
}

impl SosDecomposition {
    pub fn from_sections(sections: Vec<SosBlock>) -> Self {
        Self { sections }
    }

    #[inline] pub fn sections(&self) -> &[SosBlock] { &self.sections }
    #[inline] pub fn len(&self) -> usize { self.sections.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.sections.is_empty() }

    /// Multiply the cascade back into a single `(b, a)` pair.
    pub fn to_coefficients(&self) -> FilterCoefficients {
        let mut b = vec![1.0];
        let mut a = vec![1.0];
        for s in &self.sections {
            b = poly::mul(&b, &s[..3]);
            a = poly::mul(&a, &s[3..]);
        }
        FilterCoefficients { numerator: b, denominator: a }
    }

    /// Response of the cascade at `normalized` frequency (1.0 = Nyquist),
    /// section by section, in the `z^-1` tap convention.
    pub fn evaluate(&self, normalized: f64) -> Complex64 {
        let x = Complex64::from_polar(1.0, -core::f64::consts::PI * normalized);
        self.sections
            .iter()
            .map(|s| poly::eval_ascending(&s[..3], x) / poly::eval_ascending(&s[3..], x))
            .product()
    }
}

/// Group roots into real quadratic (or linear) factors in `z^-1` form.
fn quadratic_factors(roots: &[Complex64]) -> Vec<[f64; 3]> {
    let roots = realizable_roots(roots);
    let mut used = vec![false; roots.len()];
    let mut factors = Vec::new();

    for i in 0..roots.len() {
        if used[i] || is_real(roots[i]) {
            continue;
        }
        let r = roots[i];
        let partner =
            (0..roots.len()).find(|&j| j != i && !used[j] && is_conjugate_of(r, roots[j]));
        if let Some(j) = partner {
            used[i] = true;
            used[j] = true;
            factors.push([1.0, -2.0 * r.re, r.norm_sqr()]);
        }
    }

    let reals: Vec<f64> = (0..roots.len()).filter(|&i| !used[i]).map(|i| roots[i].re).collect();
    for pair in reals.chunks(2) {
        match *pair {
            [r1, r2] => factors.push([1.0, -(r1 + r2), r1 * r2]),
            [r] => factors.push([1.0, -r, 0.0]),
            _ => {}
        }
    }
    factors
}

/// ZPK → cascade whose product reproduces [`crate::transfer::to_coefficients`].
pub fn to_second_order_sections(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
) -> SosDecomposition {
    let gain = effective_gain(zeros, poles, gain);
    let num = quadratic_factors(zeros);
    let den = quadratic_factors(poles);
    let n = num.len().max(den.len()).max(1);

    let sections = (0..n)
        .map(|i| {
            let mut b = num.get(i).copied().unwrap_or(IDENTITY);
            let a = den.get(i).copied().unwrap_or(IDENTITY);
            if i == 0 {
                for v in &mut b {
                    *v *= gain;
                }
            }
            [b[0], b[1], b[2], a[0], a[1], a[2]]
        })
        .collect();
    SosDecomposition { sections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::to_coefficients;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn assert_reproduces(zeros: &[Complex64], poles: &[Complex64], gain: f64) {
        let sos = to_second_order_sections(zeros, poles, gain);
        let direct = to_coefficients(zeros, poles, gain);
        let cascade = sos.to_coefficients();
        assert!(
            cascade.approx_eq(&direct, 1e-9),
            "zeros={:?} poles={:?}\ncascade={:?}\ndirect={:?}",
            zeros, poles, cascade, direct
        );
        for s in sos.sections() {
            assert_eq!(s[3], 1.0);
        }
    }

    #[test]
    fn cascade_reproduces_direct_form() {
        let cases: Vec<(Vec<Complex64>, Vec<Complex64>, f64)> = vec![
            (vec![], vec![], 1.0),
            (vec![], vec![c(0.5, 0.0)], 1.0),
            (
                vec![c(-1.0, 0.0); 4],
                vec![c(0.6, 0.3), c(0.6, -0.3), c(0.7, 0.5), c(0.7, -0.5)],
                0.01,
            ),
            (vec![c(0.0, 1.0)], vec![c(0.2, 0.0), c(-0.3, 0.0), c(0.9, 0.0)], 3.0),
            (vec![c(0.5, 0.5), c(0.1, 0.0), c(0.5, -0.5)], vec![c(0.95, 0.1)], -2.0),
            (vec![c(1.2, 0.7), c(-0.4, 0.0)], vec![c(0.0, 0.0); 3], 0.5),
        ];
        for (z, p, k) in cases {
            assert_reproduces(&z, &p, k);
        }
    }

    #[test]
    fn sections_pair_conjugates_before_reals() {
        let sos = to_second_order_sections(
            &[c(0.3, 0.0), c(0.0, 0.8), c(0.0, -0.8)],
            &[c(0.5, 0.0)],
            2.0,
        );
        assert_eq!(sos.len(), 2);
        let s0 = sos.sections()[0];
        assert!((s0[0] - 2.0).abs() < 1e-15, "{:?}", s0);
        assert!(s0[1].abs() < 1e-15 && (s0[2] - 1.28).abs() < 1e-12, "{:?}", s0);
        assert_eq!(&s0[3..], &[1.0, -0.5, 0.0]);
        assert_eq!(sos.sections()[1], [1.0, -0.3, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_model_gives_unity_section() {
        let sos = to_second_order_sections(&[], &[], 0.25);
        assert_eq!(sos.sections(), &[[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]]);
        let one = to_second_order_sections(&[], &[c(0.5, 0.0)], 0.25);
        assert_eq!(one.sections()[0][0], 0.25);
    }

    #[test]
    fn narrow_bandpass_cascade_keeps_passband() {
        use crate::design::{design, DesignRequest, FilterFamily, ResponseType};
        use crate::transfer::evaluate_zpk;

        let req = DesignRequest::new(FilterFamily::Butterworth, ResponseType::Bandpass, 6, 0.02);
        let zpk = design(&req).unwrap();
        let sos = to_second_order_sections(&zpk.zeros, &zpk.poles, zpk.gain);
        for f in [0.005, 0.0196, 0.02, 0.021, 0.05] {
            let cascade = sos.evaluate(f).norm();
            let roots = evaluate_zpk(&zpk.zeros, &zpk.poles, zpk.gain, f).norm();
            let tol = 1e-9 * roots.max(1.0);
            assert!((cascade - roots).abs() < tol, "f={} cascade={} roots={}", f, cascade, roots);
        }
        assert!(sos.evaluate(0.0196).norm() > 0.99);
    }
}
