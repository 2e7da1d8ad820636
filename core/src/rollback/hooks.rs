//! Core interception
//!
//! [`HookedCore`] wraps the primary core and observes every entry point
//! that can invalidate recorded input: the input-state callback (via the
//! [`InputLogger`] decorator), `reset` and `unserialize`. `unload_game` and
//! `deinit` are intercepted so no shadow state outlives the content it
//! describes. They also leave a teardown signal behind, which the run-ahead
//! scheduler answers by destroying its session and the secondary instance.

use anyhow::Result;
use bitflags::bitflags;
use tracing::trace;

use crate::rollback::config::INPUT_ID_LIMIT;
use crate::rollback::input::{DirtyInputTracker, InputShadow};
use crate::system::{CoreCallbacks, GameInfo, SimulationCore, VideoFrame};

bitflags! {
    /// Which entry points are currently intercepted
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Hooks: u8 {
        const INPUT_STATE = 1 << 0;
        const RESET = 1 << 1;
        const UNSERIALIZE = 1 << 2;
        const UNLOAD = 1 << 3;
        const DEINIT = 1 << 4;
    }
}

/// Primary core with removable interception
pub struct HookedCore<C> {
    inner: C,
    installed: Hooks,
    /// Created on the first logged input read, dropped with the input hook
    shadow: Option<InputShadow>,
    tracker: DirtyInputTracker,
    /// Set when a hooked unload/deinit ran, until the scheduler consumes it
    torn_down: bool,
}

impl<C: SimulationCore> HookedCore<C> {
    /// Wrap a core, nothing intercepted yet
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            installed: Hooks::empty(),
            shadow: None,
            tracker: DirtyInputTracker::new(),
            torn_down: false,
        }
    }

    /// Intercept every entry point not already intercepted
    pub fn install(&mut self) {
        if !self.installed.contains(Hooks::all()) {
            trace!(already = ?self.installed, "installing core hooks");
        }
        self.installed = Hooks::all();
    }

    /// Stop intercepting, dropping the input shadow
    pub fn remove(&mut self) {
        if self.installed.contains(Hooks::INPUT_STATE) {
            self.shadow = None;
        }
        if !self.installed.is_empty() {
            trace!(removed = ?self.installed, "removing core hooks");
        }
        self.installed = Hooks::empty();
    }

    /// Whether a hooked unload/deinit ran since the last call, clearing
    /// the signal
    pub fn take_teardown(&mut self) -> bool {
        std::mem::take(&mut self.torn_down)
    }

    pub fn hooks(&self) -> Hooks {
        self.installed
    }

    pub fn is_hooked(&self, hook: Hooks) -> bool {
        self.installed.contains(hook)
    }

    pub fn shadow(&self) -> Option<&InputShadow> {
        self.shadow.as_ref()
    }

    pub fn tracker(&self) -> &DirtyInputTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut DirtyInputTracker {
        &mut self.tracker
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Run one step fed exclusively from the shadow, without polling
    pub fn run_replaying(&mut self, callbacks: &mut dyn CoreCallbacks) {
        let mut replay = ShadowReplay::new(self.shadow.as_ref(), callbacks);
        self.inner.run(&mut replay);
    }

    /// Restore a snapshot taken by the scheduler itself
    ///
    /// Goes through the hooked `unserialize` but leaves the input-dirty flag
    /// as it was.
    pub fn restore_internal(&mut self, buf: &[u8]) -> Result<()> {
        let was_dirty = self.tracker.is_input_dirty();
        let result = self.unserialize(buf);
        self.tracker.set_input_dirty(was_dirty);
        result
    }
}

impl<C: SimulationCore> SimulationCore for HookedCore<C> {
    fn init(&mut self) {
        self.inner.init();
    }

    fn deinit(&mut self) {
        if self.installed.contains(Hooks::DEINIT) {
            self.remove();
            self.tracker.reset();
            self.torn_down = true;
        }
        self.inner.deinit();
    }

    fn run(&mut self, callbacks: &mut dyn CoreCallbacks) {
        if self.installed.contains(Hooks::INPUT_STATE) {
            let mut logger = InputLogger::new(&mut self.shadow, &mut self.tracker, callbacks);
            self.inner.run(&mut logger);
        } else {
            self.inner.run(callbacks);
        }
    }

    fn reset(&mut self) {
        if self.installed.contains(Hooks::RESET) {
            self.tracker.mark_dirty();
        }
        self.inner.reset();
    }

    fn serialize_size(&self) -> usize {
        self.inner.serialize_size()
    }

    fn serialize(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.serialize(buf)
    }

    fn unserialize(&mut self, buf: &[u8]) -> Result<()> {
        if self.installed.contains(Hooks::UNSERIALIZE) {
            self.tracker.mark_dirty();
        }
        self.inner.unserialize(buf)
    }

    fn load_game(&mut self, info: Option<&GameInfo>) -> Result<()> {
        self.inner.load_game(info)
    }

    fn unload_game(&mut self) {
        if self.installed.contains(Hooks::UNLOAD) {
            self.remove();
            self.tracker.reset();
            self.torn_down = true;
        }
        self.inner.unload_game();
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.inner.set_controller_port_device(port, device);
    }
}

/// Records every live input read into the shadow
///
/// A read that differs from the recorded value marks input dirty.
pub struct InputLogger<'a> {
    shadow: &'a mut Option<InputShadow>,
    tracker: &'a mut DirtyInputTracker,
    inner: &'a mut dyn CoreCallbacks,
}

impl<'a> InputLogger<'a> {
    pub fn new(
        shadow: &'a mut Option<InputShadow>,
        tracker: &'a mut DirtyInputTracker,
        inner: &'a mut dyn CoreCallbacks,
    ) -> Self {
        Self {
            shadow,
            tracker,
            inner,
        }
    }
}

impl CoreCallbacks for InputLogger<'_> {
    fn input_poll(&mut self) {
        self.inner.input_poll();
    }

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        let result = self.inner.input_state(port, device, index, id);
        let last = self
            .shadow
            .as_ref()
            .map_or(0, |shadow| shadow.get(port, device, index, id));
        if result != last {
            self.tracker.mark_dirty();
        }
        if id < INPUT_ID_LIMIT {
            self.shadow
                .get_or_insert_with(InputShadow::new)
                .set(port, device, index, id, result);
        }
        result
    }

    fn video_refresh(&mut self, frame: &VideoFrame<'_>) {
        self.inner.video_refresh(frame);
    }

    fn audio_sample(&mut self, left: i16, right: i16) {
        self.inner.audio_sample(left, right);
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        self.inner.audio_sample_batch(samples)
    }
}

/// Feeds recorded input instead of live devices
///
/// Polling is a no-op so replayed steps never observe anything newer than
/// what the primary already committed to.
pub struct ShadowReplay<'a> {
    shadow: Option<&'a InputShadow>,
    inner: &'a mut dyn CoreCallbacks,
}

impl<'a> ShadowReplay<'a> {
    pub fn new(shadow: Option<&'a InputShadow>, inner: &'a mut dyn CoreCallbacks) -> Self {
        Self { shadow, inner }
    }
}

impl CoreCallbacks for ShadowReplay<'_> {
    fn input_poll(&mut self) {}

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.shadow
            .map_or(0, |shadow| shadow.get(port, device, index, id))
    }

    fn video_refresh(&mut self, frame: &VideoFrame<'_>) {
        self.inner.video_refresh(frame);
    }

    fn audio_sample(&mut self, left: i16, right: i16) {
        self.inner.audio_sample(left, right);
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        self.inner.audio_sample_batch(samples)
    }
}
