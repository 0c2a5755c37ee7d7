//! zplane core: the filter model and its evaluation math.
//!
//! Modules
//! - [`dsp`]      : tolerances, dB/phase helpers, complex text form
//! - [`poly`]     : polynomial products, evaluation and root finding
//! - [`error`]    : `ZplaneError` and the crate `Result`
//! - [`model`]    : `PoleZeroModel` (zeros, poles, gain, conjugate mode)
//! - [`history`]  : bounded undo/redo over model snapshots
//! - [`transfer`] : ZPK → coefficients, frequency response, steady state
//! - [`sos`]      : ZPK → cascaded second-order sections
//! - [`codegen`]  : generated C reference filter and its Rust mirror
//! - [`design`]   : Butterworth / Chebyshev I+II / elliptic / Bessel synthesis
//! - [`allpass`]  : all-pass sections and presets
//! - [`formats`]  : filter save/load, coefficient CSV, signal tables
//!
//! Design
//! - Everything here is synchronous and single-owner; no timing, no audio I/O
//! - Derivations are stateless and cheap enough to redo after every edit
//! - Errors are recoverable; a failed call leaves its inputs untouched

pub mod allpass;
pub mod codegen;
pub mod design;
pub mod dsp;
pub mod error;
pub mod formats;
pub mod history;
pub mod model;
pub mod poly;
pub mod sos;
pub mod transfer;

pub use error::{Result, ZplaneError};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::allpass::{make_section, AllPassPreset};
    pub use crate::codegen::{generate_reference_source, GeneratedSource, ReferenceFilter};
    pub use crate::design::{design, DesignRequest, FilterFamily, ResponseType, Zpk};
    pub use crate::dsp::{db_to_lin, lin_to_db, unwrap_phase, wrap_phase, TAU};
    pub use crate::error::{Result, ZplaneError};
    pub use crate::history::HistoryManager;
    pub use crate::model::{ClearTarget, ModelSnapshot, PoleZeroModel, RootKind};
    pub use crate::sos::{to_second_order_sections, SosBlock, SosDecomposition};
    pub use crate::transfer::{
        evaluate_zpk, frequency_response, steady_state, to_coefficients, zpk_response,
        FilterCoefficients, FrequencyResponse,
    };
    pub use num_complex::Complex64;
}
