//! `FilterDesigner`: the collaborator-facing session.
//!
//! Ties the pole/zero model, its history, the deriver, the synthesizer and
//! the two streaming engines together. A rendering layer only talks to this
//! type: it feeds resolved plane coordinates, pointer positions and ticks,
//! and reads coefficients, responses and sample buffers back.
//!
//! Every successful mutation
//! 1. snapshots history when the edit is terminal,
//! 2. re-derives the coefficients,
//! 3. forwards them to both engines (`update_coefficients`).
//!
//! A failed mutation leaves model, history and engines unchanged.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use num_complex::Complex64;
use tracing::{debug, info};
use zplane_core::allpass::{self, make_section, AllPassPreset};
use zplane_core::codegen::{generate_reference_source, GeneratedSource};
use zplane_core::design::{design, DesignRequest};
use zplane_core::error::{Result, ZplaneError};
use zplane_core::formats::{self, SignalTable};
use zplane_core::history::HistoryManager;
use zplane_core::model::{ClearTarget, ModelSnapshot, PoleZeroModel, RootKind};
use zplane_core::sos::{to_second_order_sections, SosDecomposition};
use zplane_core::transfer::{to_coefficients, zpk_response, FilterCoefficients, FrequencyResponse};

use crate::config::DesignerConfig;
use crate::sources::{GestureInput, SignalReplay};
use crate::stream::{SampleSource, StreamStatus, StreamingFilterEngine};

pub struct FilterDesigner {
    config: DesignerConfig,
    model: PoleZeroModel,
    history: HistoryManager,
    coeffs: FilterCoefficients,
    bulk: StreamingFilterEngine<SignalReplay>,
    live: StreamingFilterEngine<GestureInput>,
}

impl FilterDesigner {
    /// Empty model, empty history, synthetic replay signal.
    pub fn new(config: DesignerConfig) -> Result<Self> {
        config.validate()?;
        let model = PoleZeroModel::new()
            .with_conjugate_mode(config.conjugate_mode)
            .with_plot_radius(config.plot_radius)
            .with_defaults(config.default_zero, config.default_pole);
        let coeffs = to_coefficients(model.zeros(), model.poles(), model.gain());
        let mut bulk = StreamingFilterEngine::new(SignalReplay::default(), coeffs.clone());
        let gesture = GestureInput::new(config.gesture_capacity);
        let mut live = StreamingFilterEngine::new(gesture, coeffs.clone());
        bulk.set_rate(config.points_per_second)?;
        live.set_rate(config.points_per_second)?;
        Ok(Self {
            history: HistoryManager::new(config.history_capacity),
            config,
            model,
            coeffs,
            bulk,
            live,
        })
    }

    // ----------------------------- Accessors -----------------------------

    #[inline] pub fn config(&self) -> &DesignerConfig { &self.config }
    #[inline] pub fn model(&self) -> &PoleZeroModel { &self.model }
    #[inline] pub fn history(&self) -> &HistoryManager { &self.history }
    #[inline] pub fn bulk(&self) -> &StreamingFilterEngine<SignalReplay> { &self.bulk }
    #[inline] pub fn live(&self) -> &StreamingFilterEngine<GestureInput> { &self.live }

    #[inline] pub fn current_coefficients(&self) -> &FilterCoefficients { &self.coeffs }

    pub fn model_snapshot(&self) -> ModelSnapshot {
        self.model.snapshot()
    }

    /// Response on an `n`-point grid (`n = 0` uses the configured size),
    /// evaluated from the roots.
    pub fn current_response(&self, n: usize) -> FrequencyResponse {
        let n = if n == 0 { self.config.response_points } else { n };
        zpk_response(self.model.zeros(), self.model.poles(), self.model.gain(), n)
    }

    /// Unwrapped phase on an `n`-point grid.
    pub fn current_phase(&self, n: usize) -> Vec<f64> {
        self.current_response(n).unwrapped_phase()
    }

    pub fn current_sos(&self) -> SosDecomposition {
        to_second_order_sections(self.model.zeros(), self.model.poles(), self.model.gain())
    }

    // ----------------------------- Internals -----------------------------

    fn refresh(&mut self) {
        self.coeffs = to_coefficients(self.model.zeros(), self.model.poles(), self.model.gain());
        self.bulk.update_coefficients(&self.coeffs);
        self.live.update_coefficients(&self.coeffs);
        debug!(order = self.coeffs.order(), "coefficients re-derived");
    }

    fn commit(&mut self) {
        self.history.snapshot(self.model.snapshot());
        self.refresh();
    }

    /// Run `edit` on a scratch copy and adopt it only on success.
    fn transact<T>(&mut self, edit: impl FnOnce(&mut PoleZeroModel) -> Result<T>) -> Result<T> {
        let mut next = self.model.clone();
        let out = edit(&mut next)?;
        self.model = next;
        self.commit();
        Ok(out)
    }

    // ----------------------------- Model edits ---------------------------

    pub fn add(&mut self, kind: RootKind, value: Complex64) -> Result<()> {
        self.transact(|m| m.add(kind, value))
    }

    pub fn add_default(&mut self, kind: RootKind) -> Result<()> {
        self.transact(|m| m.add_default(kind))
    }

    pub fn remove(&mut self, kind: RootKind, index: usize) -> Result<Complex64> {
        self.transact(|m| m.remove(kind, index))
    }

    /// Terminal move (button or typed value). `Ok(false)` when the clamp
    /// refused the position; nothing is recorded then.
    pub fn move_root(&mut self, kind: RootKind, index: usize, value: Complex64) -> Result<bool> {
        let moved = self.model.move_root(kind, index, value)?;
        if moved {
            self.commit();
        }
        Ok(moved)
    }

    pub fn swap(&mut self) {
        self.model.swap();
        self.commit();
    }

    pub fn clear(&mut self, target: ClearTarget) {
        self.model.clear(target);
        self.commit();
    }

    pub fn replace_all(
        &mut self,
        zeros: Vec<Complex64>,
        poles: Vec<Complex64>,
        gain: f64,
    ) -> Result<()> {
        self.transact(|m| m.replace_all(zeros, poles, gain))
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.model.set_gain(gain)?;
        self.refresh();
        Ok(())
    }

    pub fn set_conjugate_mode(&mut self, on: bool) {
        self.model.set_conjugate_mode(on);
        self.config.conjugate_mode = on;
    }

    /// Delete whatever root lies under `point` (right-click path).
    pub fn remove_near(&mut self, point: Complex64) -> Result<Option<(RootKind, Complex64)>> {
        let tol = self.config.hit_tolerance;
        if self.model.find_near(point, tol).is_none() {
            return Ok(None);
        }
        self.transact(|m| m.remove_near(point, tol))
    }

    /// Grab the root under `point`, if any.
    pub fn grab_near(&mut self, point: Complex64) -> Result<Option<(RootKind, usize)>> {
        match self.model.find_near(point, self.config.hit_tolerance) {
            Some((kind, index)) => {
                self.model.begin_drag(kind, index)?;
                Ok(Some((kind, index)))
            }
            None => Ok(None),
        }
    }

    pub fn begin_drag(&mut self, kind: RootKind, index: usize) -> Result<()> {
        self.model.begin_drag(kind, index)
    }

    /// Intermediate drag position: coefficients follow live, history does not.
    pub fn drag_to(&mut self, value: Complex64) -> Result<bool> {
        let moved = self.model.drag_to(value)?;
        if moved {
            self.refresh();
        }
        Ok(moved)
    }

    /// Drag release: one snapshot for the whole gesture.
    pub fn end_drag(&mut self) -> Option<(RootKind, usize)> {
        let released = self.model.end_drag()?;
        self.commit();
        Some(released)
    }

    // ----------------------------- All-pass ------------------------------

    /// Merge the slider section: zero at `a`, pole at `1/a`.
    pub fn add_allpass(&mut self, a: f64) -> Result<()> {
        let (zero, pole) = make_section(a)?;
        self.transact(|m| allpass::merge(m, zero, pole))?;
        info!(a, "all-pass section merged");
        Ok(())
    }

    pub fn add_allpass_preset(&mut self, preset: AllPassPreset) -> Result<()> {
        self.transact(|m| preset.merge_into(m))?;
        info!(%preset, "all-pass preset merged");
        Ok(())
    }

    /// Phase of a preset on the configured grid; the model is untouched.
    pub fn preview_allpass(&self, preset: AllPassPreset) -> Vec<f64> {
        preset.preview_phase(self.config.response_points)
    }

    // ----------------------------- History -------------------------------

    /// Step back; `false` when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snap) => {
                self.model.restore(&snap);
                self.refresh();
                true
            }
            None => false,
        }
    }

    /// Step forward; `false` when there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snap) => {
                self.model.restore(&snap);
                self.refresh();
                true
            }
            None => false,
        }
    }

    // ----------------------------- Synthesis -----------------------------

    /// Replace the model with a synthesized design.
    pub fn design(&mut self, req: &DesignRequest) -> Result<()> {
        let zpk = design(req)?;
        self.transact(|m| m.replace_all(zpk.zeros, zpk.poles, zpk.gain))
    }

    // ----------------------------- Files ---------------------------------

    pub fn save_filter(&self, path: impl AsRef<Path>) -> Result<()> {
        formats::save_filter_file(path, self.model.zeros(), self.model.poles())
    }

    /// Load a saved filter. The file format carries no gain, so gain resets
    /// to 1.
    pub fn load_filter(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (zeros, poles) = formats::load_filter_file(path)?;
        self.transact(|m| m.replace_all(zeros, poles, 1.0))
    }

    /// Direct-form set, gain, order and every cascaded section as CSV.
    pub fn export_realization(&self, path: impl AsRef<Path>) -> Result<()> {
        let rows = formats::realization_rows(&self.coeffs, self.model.gain(), &self.current_sos());
        formats::export_coefficient_file(path, &rows)
    }

    pub fn generate_source(&self) -> Result<GeneratedSource> {
        generate_reference_source(&self.coeffs)
    }

    pub fn write_source(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = self.generate_source()?;
        std::fs::write(path, source.as_str())?;
        info!(path = %path.display(), order = source.order(), "reference source written");
        Ok(())
    }

    /// Write `index,input,output` rows for the samples replayed so far.
    pub fn write_replay(&self, path: impl AsRef<Path>) -> Result<()> {
        let src = self.bulk.source();
        let n = src.position();
        let w = BufWriter::new(File::create(path)?);
        formats::write_replay_csv(w, &src.input()[..n], src.output())
    }

    // ----------------------------- Bulk stream ---------------------------

    pub fn load_signal(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let table = formats::load_signal_file(path)?;
        self.set_signal(table);
        Ok(())
    }

    /// Replace the replay source; the bulk engine goes back to Idle.
    pub fn set_signal(&mut self, table: SignalTable) {
        self.bulk.replace_source(SignalReplay::new(table));
    }

    /// Start (or resume) the bulk replay, seeding it first when Idle.
    pub fn start(&mut self) -> Result<()> {
        if self.bulk.status() == StreamStatus::Idle {
            self.bulk.arm()?;
        }
        self.bulk.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.bulk.stop()
    }

    /// Start when not running, stop when running. Returns the new status.
    pub fn toggle(&mut self) -> Result<StreamStatus> {
        if self.bulk.is_running() {
            self.stop()?;
        } else {
            self.start()?;
        }
        Ok(self.bulk.status())
    }

    pub fn restart(&mut self) {
        self.bulk.restart();
    }

    /// One external tick. `Ok(None)` while not running or once exhausted.
    pub fn tick(&mut self) -> Result<Option<f64>> {
        if !self.bulk.is_running() {
            return Ok(None);
        }
        self.bulk.process_next()
    }

    pub fn set_rate(&mut self, points_per_second: u32) -> Result<()> {
        self.bulk.set_rate(points_per_second)?;
        self.live.set_rate(points_per_second)?;
        self.config.points_per_second = points_per_second;
        Ok(())
    }

    // ----------------------------- Live gesture --------------------------

    /// Feed one pointer y position. The first position only sets the
    /// reference; each later one filters its delta, seeding and starting the
    /// live engine on the first delta.
    pub fn push_pointer(&mut self, y: f64) -> Result<Option<f64>> {
        if !y.is_finite() {
            let reason = format!("pointer position {y} must be finite");
            return Err(ZplaneError::InvalidParameter(reason));
        }
        if self.live.source_mut().push(y).is_none() {
            return Ok(None);
        }
        match self.live.status() {
            StreamStatus::Idle => {
                self.live.arm()?;
                self.live.start()?;
            }
            StreamStatus::Armed | StreamStatus::Paused | StreamStatus::Exhausted => {
                let state = self.live.status().name();
                return Err(ZplaneError::StreamState { state, action: "push to" });
            }
            StreamStatus::Running => {}
        }
        self.live.process_next()
    }

    /// Move the recorded gesture into the bulk replay and arm it. Nothing
    /// changes when no delta has been recorded yet.
    pub fn take_gesture_as_signal(&mut self) -> Result<()> {
        if self.live.source().is_empty() {
            return Err(ZplaneError::InvalidParameter("no gesture recorded".into()));
        }
        let replay = self.live.source_mut().take_as_signal();
        self.live.restart();
        info!(samples = replay.len(), "gesture promoted to signal");
        self.bulk.replace_source(replay);
        self.bulk.arm()
    }
}
