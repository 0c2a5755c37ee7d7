//! Sample-by-sample filter engine.
//!
//! This module defines the [`SampleSource`] trait and the
//! [`StreamingFilterEngine<S>`] wrapper that owns a source, the current
//! coefficients and the recursive state, and produces one filtered value per
//! tick with no heap work per sample.
//!
//! State machine
//! - `Idle → Armed`     : `seed`/`arm` (steady-state seed scaled by the first sample)
//! - `Armed → Running`  : `start`
//! - `Running ↔ Paused` : `stop` / `start`
//! - `Running → Exhausted` when `process_next` finds no input left
//! - any state `→ Idle` : `restart`
//!
//! Coefficient changes while Running or Paused hot-swap the taps without
//! touching the state, which can produce a transient.

use std::time::Duration;

use tracing::{debug, trace};
use zplane_core::error::{Result, ZplaneError};
use zplane_core::transfer::{steady_state, FilterCoefficients};

/// Lowest accepted tick rate (points per second).
pub const MIN_RATE: u32 = 1;
/// Highest accepted tick rate (points per second).
pub const MAX_RATE: u32 = 100;

/// Anything that can feed an engine one sample at a time.
pub trait SampleSource {
    /// Next unread input sample, advancing the read cursor.
    fn next_sample(&mut self) -> Option<f64>;

    /// Sample used to scale the steady-state seed.
    fn first_sample(&self) -> f64;

    /// Move the read cursor back to the beginning.
    fn rewind(&mut self);

    /// Samples read so far.
    fn position(&self) -> usize;

    /// Total samples currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store the filtered value for the sample just read.
    fn record(&mut self, _y: f64) {}

    /// Forget every recorded output.
    fn clear_output(&mut self) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Armed,
    Running,
    Paused,
    Exhausted,
}

impl StreamStatus {
    pub fn name(self) -> &'static str {
        match self {
            StreamStatus::Idle => "idle",
            StreamStatus::Armed => "armed",
            StreamStatus::Running => "running",
            StreamStatus::Paused => "paused",
            StreamStatus::Exhausted => "exhausted",
        }
    }
}

/// Transposed Direct-Form-II engine that owns its source.
pub struct StreamingFilterEngine<S: SampleSource> {
    coeffs: FilterCoefficients,
    b: Vec<f64>,
    a: Vec<f64>,
    state: Vec<f64>,
    seed_input: f64,
    status: StreamStatus,
    rate: u32,
    source: S,
}

impl<S: SampleSource> StreamingFilterEngine<S> {
    /// Idle engine with zero state.
    pub fn new(source: S, coeffs: FilterCoefficients) -> Self {
        let (b, a) = coeffs.normalized();
        let state = vec![0.0; coeffs.state_len()];
        Self {
            coeffs,
            b,
            a,
            state,
            seed_input: 0.0,
            status: StreamStatus::Idle,
            rate: 10,
            source,
        }
    }

    // ----------------------------- Accessors -----------------------------

    #[inline] pub fn status(&self) -> StreamStatus { self.status }
    #[inline] pub fn coefficients(&self) -> &FilterCoefficients { &self.coeffs }
    #[inline] pub fn state(&self) -> &[f64] { &self.state }
    #[inline] pub fn source(&self) -> &S { &self.source }
    #[inline] pub fn source_mut(&mut self) -> &mut S { &mut self.source }
    #[inline] pub fn rate(&self) -> u32 { self.rate }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == StreamStatus::Running
    }

    /// Replace the source; the engine goes back to Idle.
    pub fn replace_source(&mut self, source: S) -> S {
        let old = core::mem::replace(&mut self.source, source);
        self.reset_state();
        self.status = StreamStatus::Idle;
        old
    }

    fn install(&mut self, coeffs: &FilterCoefficients) {
        let (b, a) = coeffs.normalized();
        self.b = b;
        self.a = a;
        self.coeffs = coeffs.clone();
    }

    fn reset_state(&mut self) {
        self.state.clear();
        self.state.resize(self.coeffs.state_len(), 0.0);
    }

    fn refuse(&self, action: &'static str) -> ZplaneError {
        ZplaneError::StreamState { state: self.status.name(), action }
    }

    // ----------------------------- Transitions ---------------------------

    /// `Idle → Armed`: install `coeffs` and seed the state with the step
    /// steady state scaled by `first_sample`. Re-seeding an Armed engine is
    /// allowed.
    pub fn seed(&mut self, coeffs: &FilterCoefficients, first_sample: f64) -> Result<()> {
        if !matches!(self.status, StreamStatus::Idle | StreamStatus::Armed) {
            return Err(self.refuse("seed"));
        }
        self.install(coeffs);
        self.state = steady_state(&self.coeffs).into_iter().map(|z| z * first_sample).collect();
        self.seed_input = first_sample;
        self.status = StreamStatus::Armed;
        debug!(order = self.coeffs.order(), first_sample, "stream seeded");
        Ok(())
    }

    /// Seed from the current coefficients and the source's first sample.
    pub fn arm(&mut self) -> Result<()> {
        let coeffs = self.coeffs.clone();
        let first = self.source.first_sample();
        self.seed(&coeffs, first)
    }

    /// `Armed | Paused → Running`. Starting a running stream is a no-op.
    pub fn start(&mut self) -> Result<()> {
        match self.status {
            StreamStatus::Armed | StreamStatus::Paused => {
                self.status = StreamStatus::Running;
                Ok(())
            }
            StreamStatus::Running => Ok(()),
            StreamStatus::Idle | StreamStatus::Exhausted => Err(self.refuse("start")),
        }
    }

    /// `Running → Paused`. Stopping a paused stream is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.status {
            StreamStatus::Running => {
                self.status = StreamStatus::Paused;
                Ok(())
            }
            StreamStatus::Paused => Ok(()),
            _ => Err(self.refuse("stop")),
        }
    }

    /// Back to Idle: rewind the source, drop recorded output, zero the state.
    pub fn restart(&mut self) {
        self.source.rewind();
        self.source.clear_output();
        self.reset_state();
        self.status = StreamStatus::Idle;
    }

    /// New coefficients from the deriver.
    ///
    /// - Running/Paused/Exhausted: hot swap, state kept (resized to the new
    ///   order: overlapping prefix kept, new slots zeroed)
    /// - Armed: re-seeded from the sample it was armed with
    /// - Idle: stored for the next seed
    pub fn update_coefficients(&mut self, coeffs: &FilterCoefficients) {
        match self.status {
            StreamStatus::Armed => {
                self.install(coeffs);
                let x0 = self.seed_input;
                self.state = steady_state(&self.coeffs).into_iter().map(|z| z * x0).collect();
            }
            StreamStatus::Idle => {
                self.install(coeffs);
                self.reset_state();
            }
            StreamStatus::Running | StreamStatus::Paused | StreamStatus::Exhausted => {
                self.install(coeffs);
                self.state.resize(self.coeffs.state_len(), 0.0);
            }
        }
        trace!(status = self.status.name(), order = self.coeffs.order(), "coefficients updated");
    }

    // ----------------------------- Processing ----------------------------

    /// One raw recursive step on `x`, independent of the source and status.
    ///
    /// `y = b0·x + z0`, `zᵢ = b₍ᵢ₊₁₎·x + z₍ᵢ₊₁₎ − a₍ᵢ₊₁₎·y`.
    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let n = self.state.len();
        let y = self.b[0] * x + self.state.first().copied().unwrap_or(0.0);
        for i in 0..n {
            let next = if i + 1 < n { self.state[i + 1] } else { 0.0 };
            self.state[i] = self.b[i + 1] * x + next - self.a[i + 1] * y;
        }
        y
    }

    /// Pull one sample from the source and filter it. Requires Running.
    /// Returns `Ok(None)` and moves to Exhausted when the source is drained.
    pub fn process_next(&mut self) -> Result<Option<f64>> {
        if self.status != StreamStatus::Running {
            return Err(self.refuse("process"));
        }
        match self.source.next_sample() {
            Some(x) => {
                let y = self.process(x);
                self.source.record(y);
                Ok(Some(y))
            }
            None => {
                self.status = StreamStatus::Exhausted;
                debug!(samples = self.source.position(), "stream exhausted");
                Ok(None)
            }
        }
    }

    // ----------------------------- Cadence -------------------------------

    /// Tick cadence in points per second, `1..=100`.
    pub fn set_rate(&mut self, points_per_second: u32) -> Result<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&points_per_second) {
            return Err(ZplaneError::InvalidParameter(format!(
                "rate {points_per_second} must lie in {MIN_RATE}..={MAX_RATE} points per second"
            )));
        }
        self.rate = points_per_second;
        Ok(())
    }

    /// Interval between ticks (`1000 / rate` milliseconds).
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SignalReplay;
    use num_complex::Complex64;
    use zplane_core::codegen::ReferenceFilter;
    use zplane_core::formats::SignalTable;
    use zplane_core::transfer::to_coefficients;

    fn lowpass() -> FilterCoefficients {
        to_coefficients(
            &[Complex64::new(-1.0, 0.0), Complex64::new(-1.0, 0.0)],
            &[Complex64::new(0.6, 0.25), Complex64::new(0.6, -0.25)],
            0.05,
        )
    }

    fn replay(samples: Vec<f64>) -> SignalReplay {
        SignalReplay::new(SignalTable::from_amplitudes(samples))
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        let mut e = StreamingFilterEngine::new(replay(vec![1.0, 2.0]), lowpass());
        assert_eq!(e.status(), StreamStatus::Idle);
        let refused = e.start();
        assert!(
            matches!(refused, Err(ZplaneError::StreamState { state: "idle", action: "start" })),
            "{refused:?}"
        );
        assert!(e.process_next().is_err());

        e.arm().unwrap();
        assert_eq!(e.status(), StreamStatus::Armed);
        e.start().unwrap();
        e.stop().unwrap();
        assert_eq!(e.status(), StreamStatus::Paused);
        assert!(e.seed(&lowpass(), 0.0).is_err(), "cannot re-seed a paused stream");
        e.start().unwrap();

        assert!(e.process_next().unwrap().is_some());
        assert!(e.process_next().unwrap().is_some());
        assert_eq!(e.process_next().unwrap(), None);
        assert_eq!(e.status(), StreamStatus::Exhausted);
        assert!(e.start().is_err());

        e.restart();
        assert_eq!(e.status(), StreamStatus::Idle);
        assert_eq!(e.source().position(), 0);
        assert!(e.state().iter().all(|z| *z == 0.0));
    }

    #[test]
    fn seeded_stream_has_no_step_transient() {
        let co = lowpass();
        let dc = co.numerator.iter().sum::<f64>() / co.denominator.iter().sum::<f64>();
        let mut e = StreamingFilterEngine::new(replay(vec![0.8; 64]), co);
        e.arm().unwrap();
        e.start().unwrap();
        while let Some(y) = e.process_next().unwrap() {
            assert!((y - 0.8 * dc).abs() < 1e-12, "y={}", y);
        }
    }

    #[test]
    fn unseeded_step_matches_reference_realization() {
        let co = lowpass();
        let mut e = StreamingFilterEngine::new(replay(vec![]), co.clone());
        let mut rf = ReferenceFilter::new(&co);
        for k in 0..50 {
            let x = if k % 7 == 0 { 1.0 } else { -0.25 };
            let got = e.process(x);
            let want = rf.process_sample(x);
            assert!((got - want).abs() < 1e-12, "k={} got={} want={}", k, got, want);
        }
    }

    #[test]
    fn hot_swap_keeps_state_and_resizes() {
        let mut e = StreamingFilterEngine::new(replay(vec![1.0; 8]), lowpass());
        e.arm().unwrap();
        e.start().unwrap();
        e.process_next().unwrap();
        let before = e.state().to_vec();
        assert_eq!(before.len(), 2);

        let third = to_coefficients(&[], &[Complex64::new(0.1, 0.0); 3], 1.0);
        e.update_coefficients(&third);
        assert_eq!(e.status(), StreamStatus::Running);
        assert_eq!(e.state().len(), 3);
        assert_eq!(&e.state()[..2], &before[..]);
        assert_eq!(e.state()[2], 0.0);

        let first = to_coefficients(&[], &[Complex64::new(0.5, 0.0)], 1.0);
        e.update_coefficients(&first);
        assert_eq!(e.state(), &before[..1]);
    }

    #[test]
    fn armed_engine_reseeds_on_update() {
        let mut e = StreamingFilterEngine::new(replay(vec![2.0; 4]), lowpass());
        e.arm().unwrap();
        let other = to_coefficients(&[], &[Complex64::new(0.5, 0.0)], 1.0);
        e.update_coefficients(&other);
        // 1/(1 - 0.5 z^-1): DC gain 2, seed state = (0 - (-0.5)·2)·2 = 2
        assert_eq!(e.state(), &[2.0]);
        e.start().unwrap();
        assert!((e.process_next().unwrap().unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rate_bounds_and_interval() {
        let mut e = StreamingFilterEngine::new(replay(vec![]), FilterCoefficients::unity());
        assert!(e.set_rate(0).is_err());
        assert!(e.set_rate(101).is_err());
        e.set_rate(4).unwrap();
        assert_eq!(e.tick_interval(), Duration::from_millis(250));
        e.set_rate(100).unwrap();
        assert_eq!(e.tick_interval(), Duration::from_millis(10));
    }
}
