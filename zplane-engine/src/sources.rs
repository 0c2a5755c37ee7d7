//! Owned sample sources for the two streaming paths.
//!
//! - `SignalReplay` : a loaded (or synthetic) two-column table replayed once,
//!                    with a preallocated buffer for the filtered output
//! - `GestureInput` : live pointer positions turned into deltas, raw and
//!                    filtered history bounded with FIFO eviction

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zplane_core::formats::SignalTable;

use crate::stream::SampleSource;

/// Length of the synthetic replay signal.
pub const DEFAULT_SIGNAL_LEN: usize = 10_000;
/// Seed for the synthetic replay signal.
pub const DEFAULT_SIGNAL_SEED: u64 = 0x5eed_f11e;
/// Bound on raw and filtered gesture history.
pub const GESTURE_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// SignalReplay
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct SignalReplay {
    table: SignalTable,
    filtered: Vec<f64>,
    cursor: usize,
}

impl SignalReplay {
    pub fn new(table: SignalTable) -> Self {
        let filtered = vec![0.0; table.len()];
        Self { table, filtered, cursor: 0 }
    }

    /// Uniform noise in `[-1, 1)`, reproducible for a given seed.
    pub fn noise(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self::new(SignalTable::from_amplitudes(samples))
    }

    #[inline] pub fn table(&self) -> &SignalTable { &self.table }
    #[inline] pub fn input(&self) -> &[f64] { &self.table.amplitude }
    #[inline] pub fn time(&self) -> &[f64] { &self.table.time }

    /// Filtered values produced so far.
    #[inline] pub fn output(&self) -> &[f64] { &self.filtered[..self.cursor] }

    /// Whole output buffer, zeros past the cursor.
    #[inline] pub fn output_buffer(&self) -> &[f64] { &self.filtered }
}

impl Default for SignalReplay {
    fn default() -> Self {
        Self::noise(DEFAULT_SIGNAL_LEN, DEFAULT_SIGNAL_SEED)
    }
}

impl SampleSource for SignalReplay {
    fn next_sample(&mut self) -> Option<f64> {
        let x = *self.table.amplitude.get(self.cursor)?;
        self.cursor += 1;
        Some(x)
    }

    fn first_sample(&self) -> f64 {
        self.table.amplitude.first().copied().unwrap_or(0.0)
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    #[inline] fn position(&self) -> usize { self.cursor }
    #[inline] fn len(&self) -> usize { self.table.len() }

    fn record(&mut self, y: f64) {
        if let Some(slot) = self.cursor.checked_sub(1).and_then(|i| self.filtered.get_mut(i)) {
            *slot = y;
        }
    }

    fn clear_output(&mut self) {
        self.filtered.iter_mut().for_each(|v| *v = 0.0);
    }
}

// ---------------------------------------------------------------------------
// GestureInput
// ---------------------------------------------------------------------------

/// Pointer-driven input: each pointer sample after the first contributes the
/// difference from the previous one.
#[derive(Clone, Debug)]
pub struct GestureInput {
    prev_y: Option<f64>,
    raw: VecDeque<f64>,
    filtered: VecDeque<f64>,
    cursor: usize,
    capacity: usize,
}

impl GestureInput {
    pub fn new(capacity: usize) -> Self {
        Self {
            prev_y: None,
            raw: VecDeque::new(),
            filtered: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    #[inline] pub fn capacity(&self) -> usize { self.capacity }
    #[inline] pub fn raw(&self) -> &VecDeque<f64> { &self.raw }
    #[inline] pub fn filtered(&self) -> &VecDeque<f64> { &self.filtered }

    /// Samples pushed but not yet read by the engine.
    #[inline]
    pub fn pending(&self) -> usize {
        self.raw.len() - self.cursor
    }

    /// Feed one pointer position. The first call only records it; later calls
    /// queue and return the delta.
    pub fn push(&mut self, y: f64) -> Option<f64> {
        let prev = self.prev_y.replace(y)?;
        let delta = y - prev;
        self.raw.push_back(delta);
        if self.raw.len() > self.capacity {
            self.raw.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
        Some(delta)
    }

    /// Forget the pointer and every recorded sample.
    pub fn clear(&mut self) {
        self.prev_y = None;
        self.raw.clear();
        self.filtered.clear();
        self.cursor = 0;
    }

    /// Promote the raw deltas into a replayable signal, leaving the gesture
    /// history empty.
    pub fn take_as_signal(&mut self) -> SignalReplay {
        let samples: Vec<f64> = self.raw.drain(..).collect();
        self.clear();
        SignalReplay::new(SignalTable::from_amplitudes(samples))
    }
}

impl Default for GestureInput {
    fn default() -> Self {
        Self::new(GESTURE_CAPACITY)
    }
}

impl SampleSource for GestureInput {
    fn next_sample(&mut self) -> Option<f64> {
        let x = *self.raw.get(self.cursor)?;
        self.cursor += 1;
        Some(x)
    }

    fn first_sample(&self) -> f64 {
        self.raw.get(self.cursor).copied().unwrap_or(0.0)
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    #[inline] fn position(&self) -> usize { self.cursor }
    #[inline] fn len(&self) -> usize { self.raw.len() }

    fn record(&mut self, y: f64) {
        self.filtered.push_back(y);
        if self.filtered.len() > self.capacity {
            self.filtered.pop_front();
        }
    }

    fn clear_output(&mut self) {
        self.filtered.clear();
    }
}
