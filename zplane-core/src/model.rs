//! Canonical zero/pole/gain state of the filter being designed.
//!
//! Features
//! - Ordered zero and pole lists (insertion order is display/deletion order)
//! - Opt-in conjugate mode: complex roots get their conjugate appended
//! - Plot-radius clamp on `move_root` (a domain guard, not a stability rule)
//! - Hit testing and a drag transaction for pointer-driven editing
//!
//! Notes
//! - The model never snapshots itself; terminal mutations are recorded by the
//!   owner through [`crate::history::HistoryManager`].
//! - Conjugate enforcement only ever appends. It never deduplicates.

use core::fmt;

use num_complex::Complex64;
use tracing::debug;

use crate::dsp::{close, CONJ_TOL};
use crate::error::{Result, ZplaneError};

/// Radius beyond which `move_root` refuses a new position.
pub const PLOT_RADIUS: f64 = 1.5;

/// Half-width of the square used by [`PoleZeroModel::find_near`].
pub const HIT_TOLERANCE: f64 = 0.05;

/// Root placed by `add_default(Zero)`.
pub const DEFAULT_ZERO: Complex64 = Complex64::new(0.5, 0.0);

/// Root placed by `add_default(Pole)`.
pub const DEFAULT_POLE: Complex64 = Complex64::new(0.7, 0.0);

/// Which list a root lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RootKind {
    Zero,
    Pole,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootKind::Zero => f.write_str("zero"),
            RootKind::Pole => f.write_str("pole"),
        }
    }
}

/// Target of a `clear` request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClearTarget {
    Zeros,
    Poles,
    All,
}

impl From<RootKind> for ClearTarget {
    fn from(kind: RootKind) -> Self {
        match kind {
            RootKind::Zero => ClearTarget::Zeros,
            RootKind::Pole => ClearTarget::Poles,
        }
    }
}

/// Immutable deep copy of the root lists (one history entry).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelSnapshot {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
}

impl ModelSnapshot {
    pub fn new(zeros: Vec<Complex64>, poles: Vec<Complex64>) -> Self {
        Self { zeros, poles }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.zeros.is_empty() && self.poles.is_empty()
    }
}

/// Zero/pole/gain model with the conjugate-mode invariant.
#[derive(Clone, Debug)]
pub struct PoleZeroModel {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
    conjugate_mode: bool,
    plot_radius: f64,
    default_zero: Complex64,
    default_pole: Complex64,
    drag: Option<(RootKind, usize)>,
}

impl Default for PoleZeroModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PoleZeroModel {
    /// Empty model, unity gain, conjugate mode off.
    pub fn new() -> Self {
        Self {
            zeros: Vec::new(),
            poles: Vec::new(),
            gain: 1.0,
            conjugate_mode: false,
            plot_radius: PLOT_RADIUS,
            default_zero: DEFAULT_ZERO,
            default_pole: DEFAULT_POLE,
            drag: None,
        }
    }

    /// Builder: enable or disable conjugate mode.
    #[must_use]
    pub fn with_conjugate_mode(mut self, on: bool) -> Self {
        self.conjugate_mode = on;
        self
    }

    /// Builder: override the `move_root` clamp radius.
    #[must_use]
    pub fn with_plot_radius(mut self, radius: f64) -> Self {
        self.plot_radius = radius;
        self
    }

    /// Builder: roots used by [`Self::add_default`].
    #[must_use]
    pub fn with_defaults(mut self, zero: Complex64, pole: Complex64) -> Self {
        self.default_zero = zero;
        self.default_pole = pole;
        self
    }

    // ----------------------------- Accessors -----------------------------

    #[inline] pub fn zeros(&self) -> &[Complex64] { &self.zeros }
    #[inline] pub fn poles(&self) -> &[Complex64] { &self.poles }
    #[inline] pub fn gain(&self) -> f64 { self.gain }
    #[inline] pub fn conjugate_mode(&self) -> bool { self.conjugate_mode }
    #[inline] pub fn plot_radius(&self) -> f64 { self.plot_radius }

    #[inline]
    pub fn roots(&self, kind: RootKind) -> &[Complex64] {
        match kind {
            RootKind::Zero => &self.zeros,
            RootKind::Pole => &self.poles,
        }
    }

    #[inline]
    fn roots_mut(&mut self, kind: RootKind) -> &mut Vec<Complex64> {
        match kind {
            RootKind::Zero => &mut self.zeros,
            RootKind::Pole => &mut self.poles,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.zeros.is_empty() && self.poles.is_empty()
    }

    pub fn set_conjugate_mode(&mut self, on: bool) {
        self.conjugate_mode = on;
    }

    /// Set the overall gain. Must be finite.
    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        if !gain.is_finite() {
            return Err(ZplaneError::invalid(format!("gain must be finite, got {gain}")));
        }
        self.gain = gain;
        Ok(())
    }

    /// Deep copy of the root lists.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::new(self.zeros.clone(), self.poles.clone())
    }

    /// Replace the root lists from a history entry. Gain is kept, except
    /// that an empty entry resets it to 1.
    pub fn restore(&mut self, snap: &ModelSnapshot) {
        self.zeros.clone_from(&snap.zeros);
        self.poles.clone_from(&snap.poles);
        if snap.is_empty() {
            self.gain = 1.0;
        }
        self.drag = None;
    }

    // ----------------------------- Mutations -----------------------------

    /// Append a root. In conjugate mode a complex root is followed by its
    /// conjugate.
    pub fn add(&mut self, kind: RootKind, value: Complex64) -> Result<()> {
        check_finite(value)?;
        let conj = self.conjugate_mode && value.im != 0.0;
        let list = self.roots_mut(kind);
        list.push(value);
        if conj {
            list.push(value.conj());
        }
        debug!(%kind, re = value.re, im = value.im, conj, "root added");
        Ok(())
    }

    /// Append the configured default root for `kind`.
    pub fn add_default(&mut self, kind: RootKind) -> Result<()> {
        let value = match kind {
            RootKind::Zero => self.default_zero,
            RootKind::Pole => self.default_pole,
        };
        self.add(kind, value)
    }

    /// Remove and return the root at `index`.
    pub fn remove(&mut self, kind: RootKind, index: usize) -> Result<Complex64> {
        let list = self.roots_mut(kind);
        if index >= list.len() {
            return Err(ZplaneError::IndexOutOfRange { kind, index, len: list.len() });
        }
        let removed = list.remove(index);
        // Any drag in progress may now point at a different root.
        self.drag = None;
        Ok(removed)
    }

    /// Move a root. Returns `Ok(false)` and leaves the model untouched when
    /// `|value|` exceeds the plot radius.
    pub fn move_root(&mut self, kind: RootKind, index: usize, value: Complex64) -> Result<bool> {
        check_finite(value)?;
        let radius = self.plot_radius;
        let list = self.roots_mut(kind);
        let len = list.len();
        let slot = list
            .get_mut(index)
            .ok_or(ZplaneError::IndexOutOfRange { kind, index, len })?;
        if value.norm() > radius {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Exchange the zero and pole lists.
    pub fn swap(&mut self) {
        core::mem::swap(&mut self.zeros, &mut self.poles);
        self.drag = None;
    }

    pub fn clear(&mut self, target: ClearTarget) {
        match target {
            ClearTarget::Zeros => self.zeros.clear(),
            ClearTarget::Poles => self.poles.clear(),
            ClearTarget::All => {
                self.zeros.clear();
                self.poles.clear();
            }
        }
        self.drag = None;
    }

    /// Wholesale replacement (synthesis and load paths).
    pub fn replace_all(
        &mut self,
        zeros: Vec<Complex64>,
        poles: Vec<Complex64>,
        gain: f64,
    ) -> Result<()> {
        if !gain.is_finite() {
            return Err(ZplaneError::invalid(format!("gain must be finite, got {gain}")));
        }
        for &v in zeros.iter().chain(poles.iter()) {
            check_finite(v)?;
        }
        self.zeros = zeros;
        self.poles = poles;
        self.gain = gain;
        self.drag = None;
        Ok(())
    }

    /// Append any missing conjugate of a complex root (both lists).
    ///
    /// Idempotent: a second call finds every conjugate already present.
    /// Returns the number of roots appended.
    pub fn ensure_conjugates(&mut self) -> usize {
        let added = append_missing_conjugates(&mut self.zeros)
            + append_missing_conjugates(&mut self.poles);
        if added > 0 {
            debug!(added, "conjugates appended");
        }
        added
    }

    // ----------------------------- Pointer editing -----------------------

    /// First root within `tol` of `point` on both axes. Zeros win over poles.
    pub fn find_near(&self, point: Complex64, tol: f64) -> Option<(RootKind, usize)> {
        [RootKind::Zero, RootKind::Pole].into_iter().find_map(|kind| {
            self.roots(kind)
                .iter()
                .position(|r| (r.re - point.re).abs() < tol && (r.im - point.im).abs() < tol)
                .map(|i| (kind, i))
        })
    }

    /// Hit test then remove. `Ok(None)` when nothing is under the point.
    pub fn remove_near(
        &mut self,
        point: Complex64,
        tol: f64,
    ) -> Result<Option<(RootKind, Complex64)>> {
        match self.find_near(point, tol) {
            Some((kind, index)) => Ok(Some((kind, self.remove(kind, index)?))),
            None => Ok(None),
        }
    }

    /// Grab a root for dragging.
    pub fn begin_drag(&mut self, kind: RootKind, index: usize) -> Result<()> {
        let len = self.roots(kind).len();
        if index >= len {
            return Err(ZplaneError::IndexOutOfRange { kind, index, len });
        }
        self.drag = Some((kind, index));
        Ok(())
    }

    #[inline]
    pub fn dragging(&self) -> Option<(RootKind, usize)> {
        self.drag
    }

    /// Move the grabbed root. Same clamp as [`Self::move_root`]; `Ok(false)`
    /// when nothing is grabbed or the position was refused.
    pub fn drag_to(&mut self, value: Complex64) -> Result<bool> {
        match self.drag {
            Some((kind, index)) => self.move_root(kind, index, value),
            None => Ok(false),
        }
    }

    /// Release the grabbed root. Runs conjugate enforcement in conjugate
    /// mode. Returns the released root, if any.
    pub fn end_drag(&mut self) -> Option<(RootKind, usize)> {
        let released = self.drag.take()?;
        if self.conjugate_mode {
            self.ensure_conjugates();
        }
        Some(released)
    }
}

#[inline]
fn check_finite(v: Complex64) -> Result<()> {
    if v.re.is_finite() && v.im.is_finite() {
        Ok(())
    } else {
        Err(ZplaneError::invalid(format!("root must be finite, got {v}")))
    }
}

fn append_missing_conjugates(list: &mut Vec<Complex64>) -> usize {
    let mut added = 0;
    let mut i = 0;
    while i < list.len() {
        let z = list[i];
        if z.im.abs() > CONJ_TOL {
            let c = z.conj();
            if !list.iter().any(|x| close(*x, c, CONJ_TOL)) {
                list.push(c);
                added += 1;
            }
        }
        i += 1;
    }
    added
}
