//! zplane engine: streaming filters and the designer session.
//!
//! Crate layout:
//! - [`stream`]  : `SampleSource` trait and `StreamingFilterEngine<S>`
//! - [`sources`] : `SignalReplay` (bulk) and `GestureInput` (live pointer)
//! - [`config`]  : `DesignerConfig`
//! - [`session`] : `FilterDesigner`, the surface a rendering layer drives
//!
//! Engines do no heap work per sample. Each streaming path owns its engine
//! and its source; nothing is shared between them.

pub mod config;
pub mod session;
pub mod sources;
pub mod stream;

pub use config::DesignerConfig;
pub use session::FilterDesigner;
pub use sources::{GestureInput, SignalReplay};
pub use stream::{SampleSource, StreamStatus, StreamingFilterEngine};
