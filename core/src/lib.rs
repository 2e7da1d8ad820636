//! Frameahead Core - rollback execution core for emulator frontends
//!
//! Hides input latency by rolling a deterministic simulation core back and
//! replaying it with fresher input, using only the core's own savestates.
//!
//! # Architecture
//!
//! - [`SimulationCore`] - The stepping/serialization contract a core implements
//! - [`Runtime`] - Owns the primary core and runs one display frame per call
//! - [`RunAhead`] - Speculative stepping on the primary or a secondary instance
//! - [`Preempt`] - Snapshot ring replayed whenever polled input changes

pub mod av;
#[cfg(test)]
mod integration;
pub mod rollback;
pub mod runtime;
pub mod system;
#[cfg(test)]
pub mod test_utils;

// Re-export core traits and types
pub use av::{AvGate, AvState};
pub use runtime::{Runtime, Strategy};
pub use system::{
    CoreCallbacks, GameInfo, LoadContentInfo, NullCallbacks, SavestateSupport, SimulationCore,
    SpecialContent, VideoFrame,
};

// Re-export rollback types
pub use rollback::{
    FAILURE_MESSAGE_FRAMES, HookedCore, InstanceLoader, MAX_RUN_AHEAD_FRAMES, MAX_USERS,
    Notification, Preempt, PreemptError, RollbackConfig, RollbackError, RunAhead,
    SETUP_MESSAGE_FRAMES, SecondaryInstance, SpecialSavestateFlag,
};
