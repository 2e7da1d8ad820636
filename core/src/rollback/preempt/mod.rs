//! Preemptive frames
//!
//! Keeps a ring of the last `frames` snapshots of the primary core. Input is
//! polled once per frame; when it differs from the previous poll, the core
//! is rewound to the oldest snapshot and replayed up to the present with the
//! new input, rewriting every snapshot on the way. The replay runs with
//! audio and video suppressed. Needs no second instance, at the cost of
//! replaying `frames` steps whenever input changes.

use tracing::{debug, info, trace};

use crate::av::{AvGate, AvState};
use crate::rollback::events::PreemptError;
use crate::rollback::secondary::SpecialSavestateFlag;
use crate::rollback::state::SnapshotRing;
use crate::system::{CoreCallbacks, SavestateSupport, SimulationCore};

mod input;

pub use input::{ANALOG_STATE_LEN, POINTER_STATE_LEN, PortTracking, PreemptInput};


/// An allocated preemptive frames session
#[derive(Debug)]
pub struct Preempt {
    ring: SnapshotRing,
    tracking: PortTracking,
    input_dirty: bool,
    /// Real frames run since the session started
    frame_count: u64,
}

impl Preempt {
    /// Allocate a session of `frames` snapshots
    ///
    /// `presented_frames` is the frontend frame counter. A core that has not
    /// run yet is stepped once (through `callbacks`) before its state size is
    /// queried.
    pub fn init<C: SimulationCore>(
        core: &mut C,
        callbacks: &mut dyn CoreCallbacks,
        frames: u32,
        support: SavestateSupport,
        presented_frames: u64,
    ) -> Result<Self, PreemptError> {
        if !support.supports_rollback() {
            return Err(PreemptError::Unsupported);
        }

        if presented_frames == 0 {
            core.run(callbacks);
        }

        let ring = SnapshotRing::allocate(frames as usize, core.serialize_size())?;
        info!(
            frames = ring.frames(),
            state_size = ring.state_size(),
            "preemptive frames session created"
        );

        Ok(Self {
            ring,
            tracking: PortTracking::default(),
            input_dirty: false,
            frame_count: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.ring.frames()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn tracking(&self) -> &PortTracking {
        &self.tracking
    }

    pub fn ring(&self) -> &SnapshotRing {
        &self.ring
    }

    /// Run one display frame in place of a plain step
    ///
    /// On error the caller must drop the session; AV and the special flag
    /// are already restored.
    pub fn run<C: SimulationCore>(
        &mut self,
        core: &mut C,
        callbacks: &mut dyn CoreCallbacks,
        av: &mut AvState,
        special: &SpecialSavestateFlag,
        max_users: usize,
    ) -> Result<(), PreemptError> {
        if self.tracking.poll(callbacks, max_users) {
            self.input_dirty = true;
        }

        special.raise();
        let saved = self.replay_and_save(core, callbacks, av);
        special.lower();
        self.input_dirty = false;

        if let Err(err) = saved {
            av.resume_audio();
            av.enable_video();
            return Err(err);
        }

        self.step(core, callbacks, av);
        self.frame_count += 1;
        Ok(())
    }

    /// Correct the recorded future if needed, then record the present
    fn replay_and_save<C: SimulationCore>(
        &mut self,
        core: &mut C,
        callbacks: &mut dyn CoreCallbacks,
        av: &mut AvState,
    ) -> Result<(), PreemptError> {
        if self.input_dirty && self.frame_count >= self.ring.frames() as u64 {
            debug!(frame = self.frame_count, "input changed, replaying preemptive frames");
            av.suspend_audio();
            av.suspend_video();

            let start = self.ring.start_ptr();
            core.unserialize(self.ring.buffer(start))
                .map_err(|_| PreemptError::LoadFailed)?;
            self.step(core, callbacks, av);

            self.ring.set_replay_ptr(self.ring.next(start));
            while self.ring.replay_ptr() != start {
                let slot = self.ring.replay_ptr();
                core.serialize(self.ring.buffer_mut(slot))
                    .map_err(|_| PreemptError::SaveFailed)?;
                self.step(core, callbacks, av);
                self.ring.advance_replay();
            }

            av.resume_audio();
            av.enable_video();
        }

        let start = self.ring.start_ptr();
        core.serialize(self.ring.buffer_mut(start))
            .map_err(|_| PreemptError::SaveFailed)?;
        trace!(
            slot = start,
            checksum = self.ring.snapshot(start).checksum(),
            "preemptive frame saved"
        );
        self.ring.advance_start();
        Ok(())
    }

    fn step<C: SimulationCore>(
        &mut self,
        core: &mut C,
        callbacks: &mut dyn CoreCallbacks,
        av: &AvState,
    ) {
        let mut gate = AvGate::new(av, callbacks);
        let mut input = PreemptInput::new(&mut self.tracking, &mut gate);
        core.run(&mut input);
    }

    /// Release the ring
    pub fn deinit(self) {
        debug!(frames = self.ring.frames(), "preemptive frames session released");
    }
}
