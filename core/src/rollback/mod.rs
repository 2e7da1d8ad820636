//! Run-ahead and preemptive frames
//!
//! Both strategies hide input latency by rolling the simulation back and
//! replaying it with fresher input, using nothing but the core's own
//! serialize/unserialize.
//!
//! # Architecture
//!
//! - [`RunAhead`]: runs `N` speculative steps per display frame and shows the
//!   last one, either on the primary core (save, step, restore) or on a
//!   [`SecondaryInstance`] kept in sync from primary snapshots
//! - [`Preempt`]: keeps a ring of the last `N` primary snapshots and replays
//!   from the oldest one whenever polled input changes
//! - [`HookedCore`]: wraps the primary core to record input into an
//!   [`InputShadow`] and to mark input dirty on reset/load
//!
//! # Module Structure
//!
//! - `config`: constants and the persisted [`RollbackConfig`]
//! - `events`: error taxonomy and user notifications
//! - `state`: snapshot buffers, the slot list and the preempt ring
//! - `input`: input shadow and dirty tracking
//! - `hooks`: the hooked primary core and its callback decorators
//! - `secondary`: the second core instance
//! - `runahead`: the run-ahead scheduler
//! - `preempt`: the preemptive frames scheduler

pub mod config;
pub mod events;
pub mod hooks;
pub mod input;
pub mod preempt;
pub mod runahead;
pub mod secondary;
pub mod state;

pub use config::{
    ConfigError, FAILURE_MESSAGE_FRAMES, MAX_RUN_AHEAD_FRAMES, MAX_USERS, RollbackConfig,
    SETUP_MESSAGE_FRAMES,
};
pub use events::{Notification, Notifications, PreemptError, RollbackError};
pub use hooks::{HookedCore, Hooks, InputLogger, ShadowReplay};
pub use input::{DirtyInputTracker, InputShadow};
pub use preempt::{PortTracking, Preempt};
pub use runahead::{FrameContext, RunAhead};
pub use secondary::{InstanceLoader, SecondaryInstance, SpecialSavestateFlag};
pub use state::{SerializedState, SlotList, SnapshotList, SnapshotRing};
