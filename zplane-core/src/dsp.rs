//! Numeric helpers shared by the model, the deriver and the streaming engines.
//!
//! Conventions:
//! - All values are `f64`; complex values are [`Complex64`].
//! - Frequencies are normalized so that `1.0` is Nyquist (π rad/sample).
//! - Tolerances used for conjugate matching live here so every module agrees.

use core::f64::consts::PI;

use num_complex::Complex64;
use num_traits::Float;

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f64 = 2.0 * PI;

/// Absolute tolerance on both real and imaginary parts when deciding whether a
/// root is real or whether two roots are conjugates of each other.
pub const CONJ_TOL: f64 = 1.0e-10;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f64 = 1.0e-300;

/// Floor used by [`lin_to_db`] for zero magnitudes.
pub const DB_FLOOR: f64 = -300.0;

// --------------------------------- Utilities -------------------------------------

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f64) -> f64 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// `true` when the imaginary part is negligible under [`CONJ_TOL`].
#[inline]
pub fn is_real(z: Complex64) -> bool {
    z.im.abs() < CONJ_TOL
}

/// Component-wise closeness with an absolute tolerance on both parts.
#[inline]
pub fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a.re - b.re).abs() < tol && (a.im - b.im).abs() < tol
}

/// `true` when `b` is the conjugate of `a` under [`CONJ_TOL`].
#[inline]
pub fn is_conjugate_of(a: Complex64, b: Complex64) -> bool {
    close(a.conj(), b, CONJ_TOL)
}

/// Relative error `|a - b| / max(|a|, |b|, 1)`, used when comparing
/// coefficient sets whose scale varies by orders of magnitude.
#[inline]
pub fn rel_err<T: Float>(a: T, b: T) -> T {
    let scale = a.abs().max(b.abs()).max(T::one());
    (a - b).abs() / scale
}

// --------------------------------- dB / linear -----------------------------------

/// Convert linear magnitude to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f64) -> f64 {
    if lin <= 0.0 { DB_FLOOR } else { (20.0 * lin.log10()).max(DB_FLOOR) }
}

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

// --------------------------------- Phase -----------------------------------------

/// Wrap an angle into (-π, π].
#[inline]
pub fn wrap_phase(p: f64) -> f64 {
    let mut w = (p + PI).rem_euclid(TAU) - PI;
    if w <= -PI {
        w += TAU;
    }
    w
}

/// Remove 2π jumps between consecutive phase samples (numpy `unwrap` rule:
/// a jump larger than π is folded back).
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let mut offset = 0.0;
    let mut prev: Option<f64> = None;
    for &p in phase {
        if let Some(q) = prev {
            let d = p - q;
            if d > PI {
                offset -= TAU * ((d + PI) / TAU).floor();
            } else if d < -PI {
                offset += TAU * ((-d + PI) / TAU).floor();
            }
        }
        out.push(p + offset);
        prev = Some(p);
    }
    out
}

// --------------------------------- Complex text ----------------------------------

/// Render a complex value in `a+bj` form with shortest round-trip digits.
pub fn format_complex(z: Complex64) -> String {
    let sign = if z.im.is_sign_negative() { '-' } else { '+' };
    format!("{}{}{}j", z.re, sign, z.im.abs())
}

/// Parse `a+bj` text. Accepts the forms written by [`format_complex`] and the
/// common interchange variants: surrounding parentheses, a bare real (`0.5`),
/// a bare imaginary (`-2j`), exponents (`1e-05-3.5e+02j`) and a `J` suffix.
pub fn parse_complex(text: &str) -> Option<Complex64> {
    let s = text.trim();
    let s = s
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(s)
        .trim();
    if s.is_empty() {
        return None;
    }

    let Some(body) = s.strip_suffix(['j', 'J']) else {
        return s.parse::<f64>().ok().map(|re| Complex64::new(re, 0.0));
    };

    // Split at the last sign that is not a leading sign or an exponent sign.
    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| (bytes[i] == b'+' || bytes[i] == b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

    match split {
        Some(i) => {
            let re = body[..i].trim().parse::<f64>().ok()?;
            let im = parse_imag(&body[i..])?;
            Some(Complex64::new(re, im))
        }
        None => Some(Complex64::new(0.0, parse_imag(body)?)),
    }
}

fn parse_imag(s: &str) -> Option<f64> {
    match s.trim() {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        t => t.parse::<f64>().ok(),
    }
}

// --------------------------------- Tests -----------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0, 24.0] {
            let lin = db_to_lin(db);
            let back = lin_to_db(lin);
            assert!((db - back).abs() < 1e-9, "db={}, back={}", db, back);
        }
        assert_eq!(lin_to_db(0.0), DB_FLOOR);
    }

    #[test]
    fn wrap_stays_in_range() {
        for p in [-10.0, -PI, -1.0, 0.0, 1.0, PI, 7.0, 100.0] {
            let w = wrap_phase(p);
            assert!(w > -PI - 1e-12 && w <= PI + 1e-12, "p={} w={}", p, w);
            assert!(((p - w) / TAU - ((p - w) / TAU).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn unwrap_removes_jumps() {
        let raw: Vec<f64> = (0..40).map(|k| wrap_phase(-0.3 * f64::from(k))).collect();
        let un = unwrap_phase(&raw);
        for (k, v) in un.iter().enumerate() {
            assert!((v + 0.3 * k as f64).abs() < 1e-9, "k={} v={}", k, v);
        }
    }

    #[test]
    fn complex_text_forms() {
        let cases = [
            ("0.5+0j", Complex64::new(0.5, 0.0)),
            ("(0.5-0.25j)", Complex64::new(0.5, -0.25)),
            ("-1", Complex64::new(-1.0, 0.0)),
            ("2j", Complex64::new(0.0, 2.0)),
            ("-0-1j", Complex64::new(0.0, -1.0)),
            ("1e-05+2.5e+02j", Complex64::new(1e-5, 250.0)),
            ("-3.5e-3-1e-3J", Complex64::new(-3.5e-3, -1e-3)),
        ];
        for (text, want) in cases {
            let got = parse_complex(text).unwrap_or_else(|| panic!("failed to parse {text}"));
            assert!(close(got, want, 1e-15), "{} -> {:?}", text, got);
        }
        assert!(parse_complex("").is_none());
        assert!(parse_complex("abc").is_none());
        assert!(parse_complex("1+xj").is_none());
    }

    #[test]
    fn formatted_text_parses_back_exactly() {
        let z = Complex64::new(0.123_456_789_012_345_6, -9.876_543_210_987e-7);
        assert_eq!(parse_complex(&format_complex(z)), Some(z));
    }

    #[test]
    fn conjugate_tolerance() {
        let a = Complex64::new(0.3, 0.4);
        assert!(is_conjugate_of(a, Complex64::new(0.3, -0.4 + 5e-11)));
        assert!(!is_conjugate_of(a, Complex64::new(0.3, -0.4 + 5e-9)));
        assert!(is_real(Complex64::new(2.0, 1e-12)));
    }
}
