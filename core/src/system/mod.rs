//! Simulation core contract
//!
//! The rollback schedulers treat the emulated system as an opaque, stateful
//! stepping function. This module defines the narrow surface they rely on:
//!
//! - [`SimulationCore`]: lifecycle, stepping and (un)serialization
//! - [`CoreCallbacks`]: input/video/audio callbacks a core drives while running
//! - [`GameInfo`] / [`LoadContentInfo`]: content descriptors, cloned for secondary instances
//! - [`SavestateSupport`]: the capability level checked before any rollback session

use std::path::PathBuf;

use anyhow::Result;

mod callbacks;
pub mod device;

pub use callbacks::{CoreCallbacks, NullCallbacks, VideoFrame};

/// An emulated system driven one step (frame) at a time
///
/// Callbacks are supplied per `run` call instead of being registered up
/// front, so decorators can be composed in front of the frontend's callback
/// set for a single step without mutating shared state.
pub trait SimulationCore {
    /// Initialize the core (before any content is loaded)
    fn init(&mut self);

    /// Tear the core down
    fn deinit(&mut self);

    /// Advance exactly one step
    ///
    /// The core polls input and emits video/audio exclusively through `callbacks`.
    fn run(&mut self, callbacks: &mut dyn CoreCallbacks);

    /// Reset the emulated system
    fn reset(&mut self);

    /// Size in bytes of a complete serialized snapshot
    ///
    /// Zero means the core cannot produce snapshots for the loaded content.
    fn serialize_size(&self) -> usize;

    /// Write a complete snapshot into `buf` (`buf.len() == serialize_size()`)
    fn serialize(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Restore a snapshot previously produced by `serialize`
    fn unserialize(&mut self, buf: &[u8]) -> Result<()>;

    /// Load content (`None` for cores that run without content)
    fn load_game(&mut self, info: Option<&GameInfo>) -> Result<()>;

    /// Unload the current content
    fn unload_game(&mut self);

    /// Attach a device type to a controller port
    fn set_controller_port_device(&mut self, port: u32, device: u32);
}

impl<T: SimulationCore + ?Sized> SimulationCore for Box<T> {
    fn init(&mut self) {
        (**self).init()
    }

    fn deinit(&mut self) {
        (**self).deinit()
    }

    fn run(&mut self, callbacks: &mut dyn CoreCallbacks) {
        (**self).run(callbacks)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn serialize_size(&self) -> usize {
        (**self).serialize_size()
    }

    fn serialize(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).serialize(buf)
    }

    fn unserialize(&mut self, buf: &[u8]) -> Result<()> {
        (**self).unserialize(buf)
    }

    fn load_game(&mut self, info: Option<&GameInfo>) -> Result<()> {
        (**self).load_game(info)
    }

    fn unload_game(&mut self) {
        (**self).unload_game()
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        (**self).set_controller_port_device(port, device)
    }
}

/// Content handed to [`SimulationCore::load_game`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameInfo {
    /// Path to the content on disk, if any
    pub path: Option<PathBuf>,
    /// Content loaded into memory, if the core asked for it
    pub data: Option<Vec<u8>>,
    /// Free-form metadata passed through to the core
    pub meta: Option<String>,
}

impl GameInfo {
    /// Content referenced by path only
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Content provided in memory
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Subsystem-specific ("special") content, e.g. multi-cart setups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialContent {
    /// Core-defined game type identifier
    pub game_type: u32,
    /// One entry per subsystem slot
    pub roms: Vec<GameInfo>,
}

/// Parameters the primary core's content was loaded with
///
/// Recorded at load time so a secondary instance can load the same content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContentInfo {
    /// Primary game info
    pub info: Option<GameInfo>,
    /// Content paths as given by the user
    pub content: Vec<String>,
    /// Special (subsystem) load, unsupported for secondary instances
    pub special: Option<SpecialContent>,
    /// Whether the core can start without any content
    pub content_optional: bool,
}

impl LoadContentInfo {
    /// Regular content load from a single piece of game info
    pub fn new(info: GameInfo) -> Self {
        let content = info
            .path
            .as_ref()
            .map(|p| vec![p.display().to_string()])
            .unwrap_or_default();
        Self {
            info: Some(info),
            content,
            special: None,
            content_optional: false,
        }
    }

    /// Load for a core that runs without content
    pub fn contentless() -> Self {
        Self {
            content_optional: true,
            ..Default::default()
        }
    }

    /// Deep copy suitable for loading a second instance
    ///
    /// Returns `None` for special loads, which secondary instances refuse.
    pub fn clone_for_secondary(&self) -> Option<Self> {
        if self.special.is_some() {
            return None;
        }
        Some(self.clone())
    }
}

/// Savestate capability level reported by a core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SavestateSupport {
    /// The core never reported a level
    #[default]
    Unknown,
    /// No savestate support at all
    Disabled,
    /// Savestates work but may not be reloadable in the same session
    Basic,
    /// Savestates are reliable but replay is not guaranteed bit-exact
    Serialized,
    /// Savestates are reliable and replay is deterministic
    Deterministic,
}

impl SavestateSupport {
    /// Whether run-ahead or preemptive frames may be attempted
    ///
    /// Cores that never reported a level are allowed to try; failures are
    /// then caught by the session itself.
    pub fn supports_rollback(self) -> bool {
        matches!(self, Self::Unknown | Self::Deterministic)
    }
}
