//! Run-ahead scheduler
//!
//! Each display frame, instead of stepping the core once, the scheduler runs
//! it `N` frames ahead and shows the last of those frames, so input reaches
//! the screen `N` frames earlier. Speculative frames run with audio/video
//! suppressed and are never committed to the canonical timeline.
//!
//! Two strategies exist:
//!
//! - **Single instance**: step, save, run `N` replayed steps (only the last
//!   one visible), restore. Canonical time advances by exactly one step.
//! - **Secondary instance**: step the primary once, and when input changed
//!   resynchronize a second instance from a primary snapshot and let it
//!   catch up `N - 1` steps. The secondary's next step is what the user sees.
//!
//! Any save/load failure disables run-ahead for the rest of the session.

use anyhow::anyhow;
use tracing::{debug, info, trace, warn};

use crate::av::{AvGate, AvState};
use crate::rollback::config::INITIAL_LIST_CAPACITY;
use crate::rollback::events::{Notifications, RollbackError};
use crate::rollback::hooks::HookedCore;
use crate::rollback::secondary::SecondaryInstance;
use crate::rollback::state::SnapshotList;
use crate::system::{CoreCallbacks, SavestateSupport, SimulationCore};


/// Everything a scheduler touches besides the primary core
pub struct FrameContext<'a> {
    /// The frontend's callback set
    pub callbacks: &'a mut dyn CoreCallbacks,
    pub av: &'a mut AvState,
    /// Frontend frame counter, used to detect pauses and menus
    pub frame_count: u64,
    pub notifications: &'a mut Notifications,
    pub secondary: &'a mut SecondaryInstance,
    pub savestate_support: SavestateSupport,
}

impl FrameContext<'_> {
    /// Frontend callbacks filtered by the current AV state
    fn gate(&mut self) -> AvGate<'_> {
        AvGate::new(&*self.av, &mut *self.callbacks)
    }

    fn report(&mut self, err: &RollbackError, hide_warnings: bool) {
        warn!(reason = %err, "run-ahead");
        self.notifications.push(err.notification(hide_warnings));
    }
}

/// Run-ahead session state
///
/// The dirty/resync bookkeeping lives in the [`HookedCore`] tracker, since
/// the hooks are what feed it.
#[derive(Debug)]
pub struct RunAhead {
    available: bool,
    secondary_available: bool,
    save_state_size: usize,
    size_known: bool,
    states: Option<SnapshotList>,
}

impl Default for RunAhead {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAhead {
    /// Uninitialized, available session
    pub fn new() -> Self {
        Self {
            available: true,
            secondary_available: true,
            save_state_size: 0,
            size_known: false,
            states: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn secondary_available(&self) -> bool {
        self.secondary_available
    }

    pub fn size_known(&self) -> bool {
        self.size_known
    }

    pub fn save_state_size(&self) -> usize {
        self.save_state_size
    }

    /// Whether snapshot storage is currently allocated
    pub fn is_created(&self) -> bool {
        self.states.is_some()
    }

    /// Back to "uninitialized, available" (content load/unload)
    pub fn clear_variables<C: SimulationCore>(&mut self, core: &mut HookedCore<C>, av: &mut AvState) {
        self.save_state_size = 0;
        self.size_known = false;
        av.reset_video_state();
        self.available = true;
        self.secondary_available = true;
        core.tracker_mut().reset();
    }

    /// Tear the session down and start over
    pub fn destroy<C: SimulationCore>(&mut self, core: &mut HookedCore<C>, av: &mut AvState) {
        self.states = None;
        core.remove();
        self.clear_variables(core, av);
    }

    /// Disable run-ahead for the rest of the session
    fn error<C: SimulationCore>(&mut self, core: &mut HookedCore<C>) {
        self.available = false;
        self.states = None;
        core.remove();
        self.save_state_size = 0;
        self.size_known = true;
    }

    fn create<C: SimulationCore>(
        &mut self,
        core: &mut HookedCore<C>,
        av: &mut AvState,
    ) -> Result<(), RollbackError> {
        let size = core.serialize_size();
        self.save_state_size = size;
        self.size_known = true;
        av.capture_video_state();

        if size == 0 {
            self.error(core);
            return Err(RollbackError::SaveStateSizeUnknown);
        }

        let Some(states) = SnapshotList::allocate(INITIAL_LIST_CAPACITY, size) else {
            warn!(state_size = size, "run-ahead snapshot allocation failed");
            self.error(core);
            return Err(RollbackError::AllocationFailed);
        };
        self.states = Some(states);

        core.install();
        core.tracker_mut().force_resync();
        info!(state_size = size, "run-ahead session created");
        Ok(())
    }

    /// Run one display frame `ahead_count` frames ahead
    pub fn run<C: SimulationCore>(
        &mut self,
        core: &mut HookedCore<C>,
        ctx: &mut FrameContext<'_>,
        ahead_count: u32,
        hide_warnings: bool,
        use_secondary: bool,
    ) {
        if core.take_teardown() {
            debug!("core unloaded under the session, tearing it down");
            self.destroy(core, ctx.av);
            ctx.secondary.destroy();
        }

        if ahead_count == 0 || !self.available {
            return Self::force_input_dirty(core, ctx);
        }

        if !self.size_known {
            if !ctx.savestate_support.supports_rollback() {
                self.error(core);
                ctx.report(&RollbackError::CoreLacksSavestates, hide_warnings);
                return Self::force_input_dirty(core, ctx);
            }
            if let Err(err) = self.create(core, ctx.av) {
                ctx.report(&err, hide_warnings);
                return Self::force_input_dirty(core, ctx);
            }
        }

        if core.tracker_mut().observe_frame(ctx.frame_count) {
            debug!(frame = ctx.frame_count, "frame counter jumped, forcing resync");
        }

        let result = if use_secondary && self.secondary_available && ctx.secondary.has_loader() {
            if !ctx.secondary.ensure_exists() {
                ctx.secondary.destroy();
                self.secondary_available = false;
                ctx.report(&RollbackError::SecondaryUnavailable, hide_warnings);
                return Self::force_input_dirty(core, ctx);
            }
            self.run_secondary(core, ctx, ahead_count)
        } else {
            self.run_single(core, ctx, ahead_count)
        };

        match result {
            Ok(()) => core.tracker_mut().clear_force(),
            Err(err) => ctx.report(&err, hide_warnings),
        }
    }

    /// Plain step, resync as soon as run-ahead resumes
    fn force_input_dirty<C: SimulationCore>(core: &mut HookedCore<C>, ctx: &mut FrameContext<'_>) {
        core.run(&mut ctx.gate());
        core.tracker_mut().force_resync();
    }

    fn run_single<C: SimulationCore>(
        &mut self,
        core: &mut HookedCore<C>,
        ctx: &mut FrameContext<'_>,
        ahead_count: u32,
    ) -> Result<(), RollbackError> {
        for frame in 0..=ahead_count {
            let last_frame = frame == ahead_count;

            if !last_frame {
                ctx.av.suspend_audio();
                ctx.av.suspend_video();
            }

            if frame == 0 {
                core.run(&mut ctx.gate());
            } else {
                core.run_replaying(&mut ctx.gate());
            }

            if !last_frame {
                ctx.av.restore_video();
                ctx.av.resume_audio();
            }

            if frame == 0 {
                self.save_state(core)?;
            }
            if last_frame {
                self.load_state(core)?;
            }
        }
        Ok(())
    }

    fn run_secondary<C: SimulationCore>(
        &mut self,
        core: &mut HookedCore<C>,
        ctx: &mut FrameContext<'_>,
        ahead_count: u32,
    ) -> Result<(), RollbackError> {
        // The primary owns the canonical timeline but is never shown
        ctx.av.suspend_video();
        core.run(&mut ctx.gate());
        ctx.av.restore_video();

        if core.tracker().replay_needed() {
            debug!(
                dirty = core.tracker().is_input_dirty(),
                resync = core.tracker().must_resync(),
                "resynchronizing secondary instance"
            );
            core.tracker_mut().clear_input_dirty();
            self.save_state(core)?;
            self.load_state_secondary(core, ctx)?;

            for _ in 1..ahead_count {
                ctx.av.suspend_video();
                ctx.av.hard_disable_audio();
                let mut gate = AvGate::new(&*ctx.av, &mut *ctx.callbacks);
                self.secondary_available = ctx
                    .secondary
                    .run_with_shadowed_input(core.shadow(), &mut gate);
                ctx.av.resume_audio();
                ctx.av.restore_video();
            }
        }

        ctx.av.hard_disable_audio();
        let mut gate = AvGate::new(&*ctx.av, &mut *ctx.callbacks);
        self.secondary_available = ctx
            .secondary
            .run_with_shadowed_input(core.shadow(), &mut gate);
        ctx.av.resume_audio();
        Ok(())
    }

    fn save_state<C: SimulationCore>(&mut self, core: &mut HookedCore<C>) -> Result<(), RollbackError> {
        let saved = match self.states.as_mut().and_then(|states| states.get_mut(0)) {
            Some(slot) => core.serialize(slot.as_mut_slice()).map(|()| {
                trace!(checksum = slot.checksum(), "run-ahead state saved");
            }),
            None => Err(anyhow!("no snapshot slot")),
        };

        saved.map_err(|e| {
            warn!(error = %e, "run-ahead save failed");
            self.error(core);
            RollbackError::SaveFailed
        })
    }

    fn load_state<C: SimulationCore>(&mut self, core: &mut HookedCore<C>) -> Result<(), RollbackError> {
        let loaded = match self.states.as_ref().and_then(|states| states.get(0)) {
            Some(slot) => core.restore_internal(slot.as_slice()),
            None => Err(anyhow!("no snapshot slot")),
        };

        loaded.map_err(|e| {
            warn!(error = %e, "run-ahead load failed");
            self.error(core);
            RollbackError::LoadFailed
        })
    }

    fn load_state_secondary<C: SimulationCore>(
        &mut self,
        core: &mut HookedCore<C>,
        ctx: &mut FrameContext<'_>,
    ) -> Result<(), RollbackError> {
        let loaded = self
            .states
            .as_ref()
            .and_then(|states| states.get(0))
            .is_some_and(|slot| ctx.secondary.deserialize(slot.as_slice()));

        if !loaded {
            self.secondary_available = false;
            self.error(core);
            return Err(RollbackError::LoadFailed);
        }
        Ok(())
    }
}
