//! Classical IIR synthesis into digital zero/pole/gain form.
//!
//! Pipeline
//! 1. Analog low-pass prototype with unit cutoff (`buttap`, `cheb1ap`,
//!    `cheb2ap`, `ellipap`, `besselap`)
//! 2. Pre-warp the normalized cutoff(s) for the bilinear transform
//! 3. Frequency transform: low-pass, high-pass or band-pass
//! 4. Bilinear transform onto the unit circle
//!
//! Conventions
//! - Cutoffs are normalized so that `1.0` is Nyquist.
//! - Band-pass takes one cutoff `c` and designs over `[0.8c, 1.2c]`.
//! - `ripple_db` is the passband ripple for Chebyshev I and elliptic, and the
//!   stopband attenuation for Chebyshev II. Elliptic stopband is fixed at
//!   [`ELLIPTIC_STOPBAND_DB`].
//! - Bessel prototypes are phase-normalized (asymptotically Butterworth).
//! - Nothing analog leaves this module; only the digital [`Zpk`] is public.

use core::f64::consts::{FRAC_PI_2, LN_10, PI};
use core::fmt;
use core::str::FromStr;

use num_complex::Complex64;
use num_traits::{One, Zero};
use tracing::{debug, info};

use crate::error::{Result, ZplaneError};
use crate::poly;
use crate::transfer::{to_coefficients, FilterCoefficients};

/// Highest prototype order accepted.
pub const MAX_ORDER: usize = 16;

/// Stopband attenuation used by elliptic designs.
pub const ELLIPTIC_STOPBAND_DB: f64 = 40.0;

/// Band-pass edges are `cutoff · (1 ∓ BAND_SPREAD)`.
pub const BAND_SPREAD: f64 = 0.2;

/// Bilinear-transform sample rate matching the "1.0 = Nyquist" convention.
const FS: f64 = 2.0;

/// Machine epsilon as used by the Jacobi elliptic routines.
const MACHEP: f64 = 1.110_223_024_625_156_5e-16;

// ------------------------------ Request types -----------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterFamily {
    Butterworth,
    ChebyshevI,
    ChebyshevII,
    Elliptic,
    Bessel,
}

impl FilterFamily {
    pub const ALL: [FilterFamily; 5] = [
        FilterFamily::Butterworth,
        FilterFamily::ChebyshevI,
        FilterFamily::ChebyshevII,
        FilterFamily::Elliptic,
        FilterFamily::Bessel,
    ];

    /// Families that need `ripple_db`.
    #[inline]
    pub fn uses_ripple(self) -> bool {
        matches!(
            self,
            FilterFamily::ChebyshevI | FilterFamily::ChebyshevII | FilterFamily::Elliptic
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterFamily::Butterworth => "butterworth",
            FilterFamily::ChebyshevI => "chebyshev1",
            FilterFamily::ChebyshevII => "chebyshev2",
            FilterFamily::Elliptic => "elliptic",
            FilterFamily::Bessel => "bessel",
        }
    }
}

impl fmt::Display for FilterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterFamily {
    type Err = ZplaneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "butterworth" | "butter" => Ok(FilterFamily::Butterworth),
            "chebyshev1" | "chebyshev-i" | "cheby1" => Ok(FilterFamily::ChebyshevI),
            "chebyshev2" | "chebyshev-ii" | "cheby2" => Ok(FilterFamily::ChebyshevII),
            "elliptic" | "ellip" => Ok(FilterFamily::Elliptic),
            "bessel" => Ok(FilterFamily::Bessel),
            other => Err(ZplaneError::invalid(format!("unknown filter family '{other}'"))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Lowpass,
    Highpass,
    Bandpass,
}

impl ResponseType {
    pub fn name(self) -> &'static str {
        match self {
            ResponseType::Lowpass => "lowpass",
            ResponseType::Highpass => "highpass",
            ResponseType::Bandpass => "bandpass",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResponseType {
    type Err = ZplaneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" | "low" | "lp" => Ok(ResponseType::Lowpass),
            "highpass" | "high" | "hp" => Ok(ResponseType::Highpass),
            "bandpass" | "band" | "bp" => Ok(ResponseType::Bandpass),
            other => Err(ZplaneError::invalid(format!("unknown response type '{other}'"))),
        }
    }
}

/// Parameters of one synthesis call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DesignRequest {
    pub family: FilterFamily,
    pub response: ResponseType,
    pub order: usize,
    /// Normalized cutoff (band centre for band-pass), 1.0 = Nyquist.
    pub cutoff: f64,
    pub ripple_db: Option<f64>,
}

impl DesignRequest {
    pub fn new(family: FilterFamily, response: ResponseType, order: usize, cutoff: f64) -> Self {
        Self { family, response, order, cutoff, ripple_db: None }
    }

    #[must_use]
    pub fn with_ripple(mut self, ripple_db: f64) -> Self {
        self.ripple_db = Some(ripple_db);
        self
    }

    /// `[0.8·cutoff, 1.2·cutoff]`.
    #[inline]
    pub fn band_edges(&self) -> (f64, f64) {
        (self.cutoff * (1.0 - BAND_SPREAD), self.cutoff * (1.0 + BAND_SPREAD))
    }

    /// Check every synthesis constraint without designing anything.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(ZplaneError::design("order must be at least 1"));
        }
        if self.order > MAX_ORDER {
            let order = self.order;
            return Err(ZplaneError::design(format!(
                "order {order} exceeds the maximum of {MAX_ORDER}"
            )));
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0 && self.cutoff < 1.0) {
            return Err(ZplaneError::design(format!(
                "cutoff {} must lie strictly between 0 and 1 (Nyquist)",
                self.cutoff
            )));
        }
        if self.response == ResponseType::Bandpass {
            let (_, hi) = self.band_edges();
            if hi >= 1.0 {
                return Err(ZplaneError::design(format!(
                    "band-pass upper edge {hi} reaches Nyquist; lower the centre frequency"
                )));
            }
        }
        if self.family.uses_ripple() {
            let rp = self
                .ripple_db
                .ok_or_else(|| {
                    ZplaneError::design(format!("{} design requires a ripple value", self.family))
                })?;
            if !(rp.is_finite() && rp > 0.0) {
                return Err(ZplaneError::design(format!("ripple {rp} dB must be positive")));
            }
            if self.family == FilterFamily::Elliptic && rp >= ELLIPTIC_STOPBAND_DB {
                return Err(ZplaneError::design(format!(
                    "elliptic passband ripple {rp} dB must be below the \
                     {ELLIPTIC_STOPBAND_DB} dB stopband"
                )));
            }
        }
        Ok(())
    }
}

/// Zero/pole/gain triple.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    pub fn to_coefficients(&self) -> FilterCoefficients {
        to_coefficients(&self.zeros, &self.poles, self.gain)
    }

    #[inline]
    fn excess(&self) -> usize {
        self.poles.len().saturating_sub(self.zeros.len())
    }
}

// ------------------------------ Entry point -------------------------------------

/// Synthesize a digital filter. The request is validated first; on error
/// nothing is produced.
pub fn design(req: &DesignRequest) -> Result<Zpk> {
    req.validate()?;
    let n = req.order;
    let ripple = req.ripple_db.unwrap_or_default();

    let proto = match req.family {
        FilterFamily::Butterworth => buttap(n),
        FilterFamily::ChebyshevI => cheb1ap(n, ripple),
        FilterFamily::ChebyshevII => cheb2ap(n, ripple),
        FilterFamily::Elliptic => ellipap(n, ripple, ELLIPTIC_STOPBAND_DB)?,
        FilterFamily::Bessel => besselap(n),
    };

    let analog = match req.response {
        ResponseType::Lowpass => lp2lp(proto, prewarp(req.cutoff)),
        ResponseType::Highpass => lp2hp(proto, prewarp(req.cutoff)),
        ResponseType::Bandpass => {
            let (lo, hi) = req.band_edges();
            let (w1, w2) = (prewarp(lo), prewarp(hi));
            lp2bp(proto, (w1 * w2).sqrt(), w2 - w1)
        }
    };

    let digital = bilinear(analog);
    let finite = |p: &Complex64| p.re.is_finite() && p.im.is_finite();
    if !digital.gain.is_finite() || !digital.poles.iter().all(finite) {
        return Err(ZplaneError::design("synthesis produced non-finite roots"));
    }
    info!(
        family = %req.family,
        response = %req.response,
        order = n,
        cutoff = req.cutoff,
        zeros = digital.zeros.len(),
        poles = digital.poles.len(),
        "filter designed"
    );
    Ok(digital)
}

#[inline]
fn prewarp(w: f64) -> f64 {
    2.0 * FS * (PI * w / FS).tan()
}

#[inline]
fn pow10m1(x: f64) -> f64 {
    (x * LN_10).exp_m1()
}

fn prod(v: &[Complex64]) -> Complex64 {
    v.iter().fold(Complex64::one(), |acc, x| acc * x)
}

fn neg_prod(v: &[Complex64]) -> Complex64 {
    v.iter().fold(Complex64::one(), |acc, x| acc * -x)
}

/// `m = -(n-1), -(n-3), ..., n-1`.
fn odd_grid(n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(move |i| (2 * i) as f64 - (n as f64 - 1.0))
}

// ------------------------------ Analog prototypes -------------------------------

fn buttap(n: usize) -> Zpk {
    let poles = odd_grid(n)
        .map(|m| -Complex64::from_polar(1.0, PI * m / (2.0 * n as f64)))
        .collect();
    Zpk { zeros: Vec::new(), poles, gain: 1.0 }
}

fn cheb1ap(n: usize, rp: f64) -> Zpk {
    let eps = pow10m1(0.1 * rp).sqrt();
    let mu = (1.0 / eps).asinh() / n as f64;
    let poles: Vec<Complex64> = odd_grid(n)
        .map(|m| -Complex64::new(mu, PI * m / (2.0 * n as f64)).sinh())
        .collect();
    let mut gain = neg_prod(&poles).re;
    if n % 2 == 0 {
        gain /= (1.0 + eps * eps).sqrt();
    }
    Zpk { zeros: Vec::new(), poles, gain }
}

fn cheb2ap(n: usize, rs: f64) -> Zpk {
    let de = 1.0 / pow10m1(0.1 * rs).sqrt();
    let mu = (1.0 / de).asinh() / n as f64;
    let nf = n as f64;

    // Odd orders drop the m = 0 zero (it sits at infinity).
    let zeros: Vec<Complex64> = odd_grid(n)
        .filter(|m| *m != 0.0)
        .map(|m| Complex64::new(0.0, 1.0 / (m * PI / (2.0 * nf)).sin()))
        .collect();

    let poles: Vec<Complex64> = odd_grid(n)
        .map(|m| {
            let base = -Complex64::from_polar(1.0, PI * m / (2.0 * nf));
            Complex64::one() / Complex64::new(mu.sinh() * base.re, mu.cosh() * base.im)
        })
        .collect();

    let gain = (neg_prod(&poles) / neg_prod(&zeros)).re;
    Zpk { zeros, poles, gain }
}

fn ellipap(n: usize, rp: f64, rs: f64) -> Result<Zpk> {
    if n == 1 {
        let p = -(1.0 / pow10m1(0.1 * rp)).sqrt();
        return Ok(Zpk { zeros: Vec::new(), poles: vec![Complex64::new(p, 0.0)], gain: -p });
    }

    let eps_sq = pow10m1(0.1 * rp);
    let eps = eps_sq.sqrt();
    let ck1_sq = eps_sq / pow10m1(0.1 * rs);
    if ck1_sq == 0.0 {
        return Err(ZplaneError::design("ripple and attenuation leave no transition band"));
    }
    let k1 = ellipk(ck1_sq);
    let m = ellipdeg(n, ck1_sq);
    let capk = ellipk(m);
    let nf = n as f64;

    let js: Vec<f64> = (1 - n % 2..n).step_by(2).map(|j| j as f64).collect();
    let jac: Vec<(f64, f64, f64)> = js
        .iter()
        .map(|&j| {
            let (s, c, d, _) = ellipj(j * capk / nf, m);
            (s, c, d)
        })
        .collect();

    let mut zeros: Vec<Complex64> = jac
        .iter()
        .filter(|(s, _, _)| s.abs() > f64::EPSILON)
        .map(|(s, _, _)| Complex64::new(0.0, 1.0 / (m.sqrt() * s)))
        .collect();
    let conj: Vec<Complex64> = zeros.iter().map(|z| z.conj()).collect();
    zeros.extend(conj);

    let r = arc_jac_sc1(1.0 / eps, ck1_sq)?;
    let v0 = capk * r / (nf * k1);
    let (sv, cv, dv, _) = ellipj(v0, 1.0 - m);

    let mut poles: Vec<Complex64> = jac
        .iter()
        .map(|&(s, c, d)| -Complex64::new(c * d * sv * cv, s * dv) / (1.0 - (d * sv).powi(2)))
        .collect();
    if n % 2 == 1 {
        let scale = poles.iter().map(|p| p.norm_sqr()).sum::<f64>().sqrt();
        let extra: Vec<Complex64> = poles
            .iter()
            .filter(|p| p.im.abs() > f64::EPSILON * scale)
            .map(|p| p.conj())
            .collect();
        poles.extend(extra);
    } else {
        let extra: Vec<Complex64> = poles.iter().map(|p| p.conj()).collect();
        poles.extend(extra);
    }

    let mut gain = (neg_prod(&poles) / neg_prod(&zeros)).re;
    if n % 2 == 0 {
        gain /= (1.0 + eps_sq).sqrt();
    }
    debug!(n, m, gain, "elliptic prototype");
    Ok(Zpk { zeros, poles, gain })
}

/// Phase-normalized Bessel prototype: roots of the reverse Bessel
/// polynomial scaled so the constant and leading terms are both 1.
fn besselap(n: usize) -> Zpk {
    // a_k = (2n-k)! / (2^(n-k) k! (n-k)!), built down from a_n = 1.
    let mut a = vec![0.0; n + 1];
    a[n] = 1.0;
    for k in (1..=n).rev() {
        a[k - 1] = a[k] * (2 * n - k + 1) as f64 * k as f64 / (2.0 * (n - k + 1) as f64);
    }
    let c = a[0].powf(1.0 / n as f64);
    // highest power first
    let scaled: Vec<f64> = (0..=n).rev().map(|k| a[k] / c.powi((n - k) as i32)).collect();
    Zpk { zeros: Vec::new(), poles: poly::roots(&scaled), gain: 1.0 }
}

// ------------------------------ Frequency transforms ----------------------------

fn lp2lp(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.excess();
    Zpk {
        zeros: zpk.zeros.iter().map(|&z| z * wo).collect(),
        poles: zpk.poles.iter().map(|&p| p * wo).collect(),
        gain: zpk.gain * wo.powi(degree as i32),
    }
}

fn lp2hp(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.excess();
    let w = Complex64::new(wo, 0.0);
    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| w / z).collect();
    zeros.extend(core::iter::repeat(Complex64::zero()).take(degree));
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| w / p).collect(),
        gain: zpk.gain * (neg_prod(&zpk.zeros) / neg_prod(&zpk.poles)).re,
    }
}

fn lp2bp(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = zpk.excess();
    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let lp: Vec<Complex64> = roots.iter().map(|&r| r * (bw / 2.0)).collect();
        let disc: Vec<Complex64> = lp.iter().map(|r| (r * r - wo * wo).sqrt()).collect();
        let mut out: Vec<Complex64> = lp.iter().zip(&disc).map(|(r, d)| r + d).collect();
        out.extend(lp.iter().zip(&disc).map(|(r, d)| r - d));
        out
    };
    let mut zeros = split(&zpk.zeros);
    zeros.extend(core::iter::repeat(Complex64::zero()).take(degree));
    Zpk {
        zeros,
        poles: split(&zpk.poles),
        gain: zpk.gain * bw.powi(degree as i32),
    }
}

fn bilinear(zpk: Zpk) -> Zpk {
    let fs2 = Complex64::new(2.0 * FS, 0.0);
    let degree = zpk.excess();
    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    zeros.extend(core::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let poles = zpk.poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();
    let num: Vec<Complex64> = zpk.zeros.iter().map(|z| fs2 - z).collect();
    let den: Vec<Complex64> = zpk.poles.iter().map(|p| fs2 - p).collect();
    Zpk { zeros, poles, gain: zpk.gain * (prod(&num) / prod(&den)).re }
}

// ------------------------------ Elliptic special functions ----------------------

fn agm(mut a: f64, mut b: f64) -> f64 {
    for _ in 0..64 {
        if (a - b).abs() <= f64::EPSILON * a {
            break;
        }
        let next = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next;
    }
    a
}

/// Complete elliptic integral of the first kind, parameter `m = k²`.
fn ellipk(m: f64) -> f64 {
    if m >= 1.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, (1.0 - m).sqrt()))
}

/// `K(1 - p)`, accurate for small `p`.
fn ellipk_complement(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, p.sqrt()))
}

/// Solve the degree equation for the modulus `m` given order `n` and `m1`.
fn ellipdeg(n: usize, m1: f64) -> f64 {
    const MMAX: i32 = 7;
    let k1 = ellipk(m1);
    let k1p = ellipk_complement(m1);
    let q1 = (-PI * k1p / k1).exp();
    let q = q1.powf(1.0 / n as f64);
    let num: f64 = (0..=MMAX).map(|m| q.powi(m * (m + 1))).sum();
    let den: f64 = 1.0 + 2.0 * (1..=MMAX + 1).map(|m| q.powi(m * m)).sum::<f64>();
    16.0 * q * (num / den).powi(4)
}

/// Jacobi elliptic functions `(sn, cn, dn, φ)` of `u` with parameter `m`,
/// via the descending Landen / AGM scheme.
fn ellipj(u: f64, m: f64) -> (f64, f64, f64, f64) {
    if !(0.0..=1.0).contains(&m) {
        return (f64::NAN, f64::NAN, f64::NAN, f64::NAN);
    }
    if m < 1.0e-9 {
        let t = u.sin();
        let b = u.cos();
        let ai = 0.25 * m * (u - t * b);
        return (t - ai * b, b + ai * t, 1.0 - 0.5 * m * t * t, u - ai);
    }
    if m >= 0.999_999_999_9 {
        let ai = 0.25 * (1.0 - m);
        let b = u.cosh();
        let t = u.tanh();
        let phi = 1.0 / b;
        let twon = b * u.sinh();
        let sn = t + ai * (twon - u) / (b * b);
        let ph = 2.0 * u.exp().atan() - FRAC_PI_2 + ai * (twon - u) / b;
        let ai = ai * t * phi;
        return (sn, phi - ai * (twon - u), phi + ai * (twon + u), ph);
    }

    let mut a = [0.0_f64; 9];
    let mut c = [0.0_f64; 9];
    a[0] = 1.0;
    c[0] = m.sqrt();
    let mut b = (1.0 - m).sqrt();
    let mut twon = 1.0;
    let mut i = 0;
    while (c[i] / a[i]).abs() > MACHEP && i < 8 {
        let ai = a[i];
        i += 1;
        c[i] = 0.5 * (ai - b);
        let t = (ai * b).sqrt();
        a[i] = 0.5 * (ai + b);
        b = t;
        twon *= 2.0;
    }

    let mut phi = twon * a[i] * u;
    let mut prev = phi;
    while i > 0 {
        let t = c[i] * phi.sin() / a[i];
        prev = phi;
        phi = 0.5 * (t.asin() + phi);
        i -= 1;
    }
    let cn = phi.cos();
    (phi.sin(), cn, cn / (phi - prev).cos(), phi)
}

fn complement(x: Complex64) -> Complex64 {
    ((Complex64::one() - x) * (Complex64::one() + x)).sqrt()
}

/// Inverse Jacobi `sn` for complex argument, by Landen descent.
fn arc_jac_sn(w: Complex64, m: f64) -> Result<Complex64> {
    const MAX_ITER: usize = 10;
    let k = m.sqrt();
    if k > 1.0 || k.is_nan() {
        return Err(ZplaneError::design("elliptic modulus out of range"));
    }
    if k == 1.0 {
        return Ok(w.atanh());
    }

    let mut ks = vec![k];
    while ks[ks.len() - 1] != 0.0 {
        if ks.len() > MAX_ITER {
            return Err(ZplaneError::design("elliptic modulus did not converge"));
        }
        let kn = ks[ks.len() - 1];
        let kp = ((1.0 - kn) * (1.0 + kn)).sqrt();
        ks.push((1.0 - kp) / (1.0 + kp));
    }
    let capk = ks[1..].iter().map(|k| 1.0 + k).product::<f64>() * FRAC_PI_2;

    let mut wn = w;
    for pair in ks.windows(2) {
        let (kn, knext) = (pair[0], pair[1]);
        wn = 2.0 * wn / ((1.0 + knext) * (Complex64::one() + complement(wn * kn)));
    }
    Ok(wn.asin() * (capk * 2.0 / PI))
}

/// Real inverse Jacobi `sc` with complementary modulus.
fn arc_jac_sc1(w: f64, m: f64) -> Result<f64> {
    let z = arc_jac_sn(Complex64::new(0.0, w), m)?;
    if z.re.abs() > 1e-14 {
        return Err(ZplaneError::design("elliptic inverse did not stay on the imaginary axis"));
    }
    Ok(z.im)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::lin_to_db;
    use crate::transfer::frequency_response;

    fn mag_db(co: &FilterCoefficients, f: f64) -> f64 {
        lin_to_db(co.evaluate(f).norm())
    }

    #[test]
    fn butterworth_lowpass_example() {
        let req = DesignRequest::new(FilterFamily::Butterworth, ResponseType::Lowpass, 2, 0.2);
        let zpk = design(&req).unwrap();
        assert_eq!(zpk.poles.len(), 2);
        assert_eq!(zpk.zeros.len(), 2);
        assert!(zpk.zeros.iter().all(|z| (z - Complex64::new(-1.0, 0.0)).norm() < 1e-12));

        let co = zpk.to_coefficients();
        let want_b = [0.067_455_27, 0.134_910_55, 0.067_455_27];
        let want_a = [1.0, -1.142_980_5, 0.412_801_6];
        for (got, want) in co.numerator.iter().zip(want_b) {
            assert!((got - want).abs() < 1e-6, "b={:?}", co.numerator);
        }
        for (got, want) in co.denominator.iter().zip(want_a) {
            assert!((got - want).abs() < 1e-6, "a={:?}", co.denominator);
        }

        let resp = frequency_response(&co, 512);
        assert_eq!(resp.peak_index(), Some(0));
        assert!((mag_db(&co, 0.2) + 3.010_3).abs() < 1e-3);
    }

    #[test]
    fn butterworth_highpass_and_bandpass() {
        let req = DesignRequest::new(FilterFamily::Butterworth, ResponseType::Highpass, 3, 0.3);
        let hp = design(&req).unwrap().to_coefficients();
        assert!(hp.evaluate(0.0).norm() < 1e-12);
        assert!((hp.evaluate(1.0).norm() - 1.0).abs() < 1e-9);
        assert!((mag_db(&hp, 0.3) + 3.010_3).abs() < 1e-3);

        let req = DesignRequest::new(FilterFamily::Butterworth, ResponseType::Bandpass, 2, 0.4);
        let zpk = design(&req).unwrap();
        assert_eq!(zpk.poles.len(), 4);
        assert_eq!(zpk.zeros.len(), 4);
        let co = zpk.to_coefficients();
        let (lo, hi) = req.band_edges();
        assert!((lo - 0.32).abs() < 1e-15 && (hi - 0.48).abs() < 1e-15);
        assert!((mag_db(&co, lo) + 3.010_3).abs() < 1e-3);
        assert!((mag_db(&co, hi) + 3.010_3).abs() < 1e-3);
        assert!(co.evaluate(0.0).norm() < 1e-9);
    }

    #[test]
    fn chebyshev1_ripple_bounds() {
        let req = DesignRequest::new(FilterFamily::ChebyshevI, ResponseType::Lowpass, 4, 0.3)
            .with_ripple(1.0);
        let co = design(&req).unwrap().to_coefficients();
        assert!((mag_db(&co, 0.0) + 1.0).abs() < 1e-9, "even order starts at -rp");
        assert!((mag_db(&co, 0.3) + 1.0).abs() < 1e-6);
        for k in 0..=300 {
            let f = 0.3 * f64::from(k) / 300.0;
            let db = mag_db(&co, f);
            assert!(db <= 1e-9 && db >= -1.0 - 1e-6, "f={} db={}", f, db);
        }
        let odd = design(&DesignRequest { order: 3, ..req }).unwrap().to_coefficients();
        assert!(mag_db(&odd, 0.0).abs() < 1e-9);
    }

    #[test]
    fn chebyshev2_stopband() {
        let req = DesignRequest::new(FilterFamily::ChebyshevII, ResponseType::Lowpass, 5, 0.3)
            .with_ripple(30.0);
        let zpk = design(&req).unwrap();
        assert_eq!(zpk.poles.len(), 5);
        assert_eq!(zpk.zeros.len(), 5);
        let co = zpk.to_coefficients();
        assert!(mag_db(&co, 0.0).abs() < 1e-9);
        for k in 0..=200 {
            let f = 0.3 + 0.699 * f64::from(k) / 200.0;
            assert!(mag_db(&co, f) <= -30.0 + 1e-6, "f={} db={}", f, mag_db(&co, f));
        }
    }

    #[test]
    fn elliptic_meets_ripple_and_attenuation() {
        for order in [3, 4] {
            let req = DesignRequest::new(FilterFamily::Elliptic, ResponseType::Lowpass, order, 0.3)
                .with_ripple(1.0);
            let zpk = design(&req).unwrap();
            assert_eq!(zpk.poles.len(), order);
            let co = zpk.to_coefficients();
            for k in 0..=300 {
                let f = 0.3 * f64::from(k) / 300.0;
                let db = mag_db(&co, f);
                assert!(db <= 1e-6 && db >= -1.0 - 1e-6, "order={} f={} db={}", order, f, db);
            }
            assert!((mag_db(&co, 0.3) + 1.0).abs() < 1e-6, "passband edge sits at -rp");
        }
        let req = DesignRequest::new(FilterFamily::Elliptic, ResponseType::Lowpass, 4, 0.3)
            .with_ripple(1.0);
        let co = design(&req).unwrap().to_coefficients();
        for k in 0..=100 {
            let f = 0.45 + 0.549 * f64::from(k) / 100.0;
            assert!(mag_db(&co, f) <= -40.0 + 1e-3, "f={} db={}", f, mag_db(&co, f));
        }
    }

    #[test]
    fn bessel_prototypes() {
        let p1 = besselap(1);
        assert!((p1.poles[0] - Complex64::new(-1.0, 0.0)).norm() < 1e-12);

        let p2 = besselap(2);
        let mut im: Vec<f64> = p2.poles.iter().map(|p| p.im).collect();
        im.sort_by(f64::total_cmp);
        assert!(p2.poles.iter().all(|p| (p.re + 0.75_f64.sqrt()).abs() < 1e-12), "{:?}", p2.poles);
        assert!((im[0] + 0.5).abs() < 1e-12 && (im[1] - 0.5).abs() < 1e-12);

        for n in [3, 6, 10, MAX_ORDER] {
            let p = besselap(n);
            assert_eq!(p.poles.len(), n);
            // Phase normalization makes the constant term 1.
            assert!((neg_prod(&p.poles).re - 1.0).abs() < 1e-8, "n={}", n);
            assert!(p.poles.iter().all(|x| x.re < 0.0), "n={} {:?}", n, p.poles);
        }

        let co = design(&DesignRequest::new(FilterFamily::Bessel, ResponseType::Lowpass, 4, 0.25))
            .unwrap()
            .to_coefficients();
        assert!(mag_db(&co, 0.0).abs() < 1e-9);
    }

    #[test]
    fn special_functions() {
        assert!((ellipk(0.0) - FRAC_PI_2).abs() < 1e-15);
        assert!((ellipk(0.5) - 1.854_074_677_301_372).abs() < 1e-13);
        assert!((ellipk_complement(0.5) - ellipk(0.5)).abs() < 1e-13);

        let m = 0.7;
        for u in [0.1, 0.5, 1.2] {
            let (sn, cn, dn, _) = ellipj(u, m);
            assert!((sn * sn + cn * cn - 1.0).abs() < 1e-12);
            assert!((dn * dn + m * sn * sn - 1.0).abs() < 1e-12);
        }
        let (sn, cn, _, _) = ellipj(ellipk(m), m);
        assert!((sn - 1.0).abs() < 1e-12 && cn.abs() < 1e-7);

        // arc_jac_sn inverts sn on the real axis
        let (sn, _, _, _) = ellipj(0.8, 0.3);
        let u = arc_jac_sn(Complex64::new(sn, 0.0), 0.3).unwrap();
        assert!((u.re - 0.8).abs() < 1e-12 && u.im.abs() < 1e-12, "{:?}", u);
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let base = DesignRequest::new(FilterFamily::Butterworth, ResponseType::Lowpass, 4, 0.3);
        let bad = [
            DesignRequest { order: 0, ..base },
            DesignRequest { order: MAX_ORDER + 1, ..base },
            DesignRequest { cutoff: 0.0, ..base },
            DesignRequest { cutoff: 1.0, ..base },
            DesignRequest { cutoff: f64::NAN, ..base },
            DesignRequest { response: ResponseType::Bandpass, cutoff: 0.9, ..base },
            DesignRequest { family: FilterFamily::ChebyshevI, ..base },
            DesignRequest { family: FilterFamily::ChebyshevII, ripple_db: Some(-3.0), ..base },
            DesignRequest { family: FilterFamily::Elliptic, ripple_db: Some(40.0), ..base },
        ];
        for req in bad {
            let err = design(&req).unwrap_err();
            assert!(matches!(err, ZplaneError::FilterDesign(_)), "{:?} -> {}", req, err);
        }
        let wide = DesignRequest { response: ResponseType::Bandpass, cutoff: 0.8, ..base };
        assert!(design(&wide).is_ok());
    }

    #[test]
    fn every_family_and_response_designs() {
        for family in FilterFamily::ALL {
            let responses = [ResponseType::Lowpass, ResponseType::Highpass, ResponseType::Bandpass];
            for response in responses {
                for order in [1, 2, 5, 8] {
                    let req = DesignRequest::new(family, response, order, 0.35).with_ripple(2.0);
                    let zpk = design(&req)
                        .unwrap_or_else(|e| panic!("{family} {response} {order}: {e}"));
                    let bandpass = response == ResponseType::Bandpass;
                    let expected = if bandpass { 2 * order } else { order };
                    assert_eq!(zpk.poles.len(), expected, "{family} {response} {order}");
                    let stable = zpk.poles.iter().all(|p| p.norm() < 1.0);
                    assert!(stable, "{family} {response} {order} unstable");
                }
            }
        }
    }

    #[test]
    fn names_parse() {
        assert_eq!("Butter".parse::<FilterFamily>().unwrap(), FilterFamily::Butterworth);
        assert_eq!("cheby2".parse::<FilterFamily>().unwrap(), FilterFamily::ChebyshevII);
        assert_eq!("bp".parse::<ResponseType>().unwrap(), ResponseType::Bandpass);
        assert!("notch".parse::<ResponseType>().is_err());
        for f in FilterFamily::ALL {
            assert_eq!(f.to_string().parse::<FilterFamily>().unwrap(), f);
        }
    }
}
