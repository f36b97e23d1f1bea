//! Kiosk Flow - supervisor, protocol router and phase sequencer for an
//! unattended scanning kiosk
//!
//! An external analysis process prints tagged lines on stdout. The
//! [`ProcessSupervisor`] pumps them into a [`LineQueue`]; once per host tick
//! the [`ProtocolRouter`] classifies each line and drives the
//! [`FlowStateMachine`] through `waiting -> scanning -> scan_complete ->
//! message -> end -> waiting`.

pub mod archive;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod headless;
pub mod kiosk;
pub mod maintenance;
pub mod protocol;
pub mod queue;
pub mod replay;
pub mod router;
pub mod sinks;
pub mod supervisor;
pub mod timer;
pub mod tui;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::KioskConfig;
pub use error::{FixSuggestion, KioskError};
pub use flow::{Cause, FlowState, FlowStateMachine, Transition};
pub use kiosk::{CaptureOutcome, Kiosk, Presentation};
pub use protocol::ProtocolTag;
pub use queue::{LineQueue, RawLine};
pub use router::ProtocolRouter;
pub use supervisor::{ProcessSpec, ProcessSupervisor, ShutdownOutcome};
