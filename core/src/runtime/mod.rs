//! Frame loop orchestration
//!
//! [`Runtime`] owns the primary core and everything the rollback
//! strategies need around it. The frontend calls [`Runtime::run_frame`] once
//! per display frame instead of stepping the core itself.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::av::{AvGate, AvState};
use crate::rollback::config::RollbackConfig;
use crate::rollback::events::{Notification, Notifications, PreemptError};
use crate::rollback::hooks::HookedCore;
use crate::rollback::preempt::Preempt;
use crate::rollback::runahead::{FrameContext, RunAhead};
use crate::rollback::secondary::{InstanceLoader, SecondaryInstance, SpecialSavestateFlag};
use crate::system::{CoreCallbacks, LoadContentInfo, SavestateSupport, SimulationCore};

#[cfg(test)]
mod tests;

/// The latency strategy currently in charge of the primary core
///
/// Only one can exist at a time; switching drops the other's session.
#[derive(Debug)]
pub enum Strategy {
    RunAhead(RunAhead),
    Preempt(Preempt),
}

impl Strategy {
    pub fn is_preempt(&self) -> bool {
        matches!(self, Self::Preempt(_))
    }

    pub fn run_ahead(&self) -> Option<&RunAhead> {
        match self {
            Self::RunAhead(runahead) => Some(runahead),
            Self::Preempt(_) => None,
        }
    }

    pub fn preempt(&self) -> Option<&Preempt> {
        match self {
            Self::Preempt(preempt) => Some(preempt),
            Self::RunAhead(_) => None,
        }
    }
}

/// Primary core plus rollback session
pub struct Runtime<C: SimulationCore> {
    core: HookedCore<C>,
    config: RollbackConfig,
    av: AvState,
    strategy: Strategy,
    secondary: SecondaryInstance,
    notifications: Notifications,
    special: SpecialSavestateFlag,
    savestate_support: SavestateSupport,
    /// Frames presented to the user so far
    frame_count: u64,
    content_loaded: bool,
    /// Preemptive frames should (re)start before the next frame
    preempt_requested: bool,
}

impl<C: SimulationCore> Runtime<C> {
    /// Wrap an initialized core
    pub fn new(core: C, config: RollbackConfig) -> Self {
        let special = SpecialSavestateFlag::new();
        let mut secondary = SecondaryInstance::new(None, special.clone());
        secondary.set_max_users(config.users());

        Self {
            core: HookedCore::new(core),
            config,
            av: AvState::new(),
            strategy: Strategy::RunAhead(RunAhead::new()),
            secondary,
            notifications: Notifications::new(),
            special,
            savestate_support: SavestateSupport::Unknown,
            frame_count: 0,
            content_loaded: false,
            preempt_requested: false,
        }
    }

    /// Enable the secondary-instance path
    pub fn with_loader(mut self, loader: Box<dyn InstanceLoader>) -> Self {
        self.secondary.set_loader(loader);
        self
    }

    pub fn config(&self) -> &RollbackConfig {
        &self.config
    }

    /// Apply new settings
    ///
    /// Toggling preemptive frames (or changing the frame count while they
    /// run) takes effect on the next frame.
    pub fn set_config(&mut self, config: RollbackConfig) {
        let preempt_changed = config.preemptive_frames != self.config.preemptive_frames
            || (config.preemptive_frames && config.frames() != self.config.frames());
        self.secondary.set_max_users(config.users());
        self.config = config;

        if preempt_changed {
            if self.config.preemptive_frames {
                self.preempt_requested = true;
            } else {
                self.disable_preempt();
            }
        }
    }

    pub fn set_savestate_support(&mut self, support: SavestateSupport) {
        self.savestate_support = support;
    }

    pub fn savestate_support(&self) -> SavestateSupport {
        self.savestate_support
    }

    /// Whether the core meets the minimum savestate level for rollback
    pub fn supports_rollback(&self) -> bool {
        self.savestate_support.supports_rollback()
    }

    pub fn core(&self) -> &HookedCore<C> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut HookedCore<C> {
        &mut self.core
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn secondary(&self) -> &SecondaryInstance {
        &self.secondary
    }

    pub fn av(&self) -> &AvState {
        &self.av
    }

    pub fn special_savestate(&self) -> &SpecialSavestateFlag {
        &self.special
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Take every queued notification
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain().collect()
    }

    /// Load content into the primary core
    ///
    /// The content description is kept so a secondary instance can load the
    /// same thing later.
    pub fn load_game(&mut self, content: LoadContentInfo) -> Result<()> {
        self.teardown();
        self.core
            .load_game(content.info.as_ref())
            .context("primary core failed to load content")?;

        self.secondary.set_load_content_info(&content);
        self.content_loaded = true;
        self.frame_count = 0;
        self.preempt_requested = self.config.preemptive_frames;
        info!(
            special = content.special.is_some(),
            content_optional = content.content_optional,
            "content loaded"
        );
        Ok(())
    }

    /// Unload content, tearing down every rollback session first
    pub fn unload_game(&mut self) {
        self.teardown();
        if self.content_loaded {
            self.core.unload_game();
            self.content_loaded = false;
        }
    }

    /// Unload content and shut the primary core down
    pub fn deinit(&mut self) {
        self.unload_game();
        self.core.deinit();
    }

    fn teardown(&mut self) {
        self.drop_preempt();
        self.clear_variables();
        self.core.take_teardown();
        self.secondary.destroy();
        self.secondary.clear_load_content_info();
        self.preempt_requested = false;
    }

    /// Back to "uninitialized, available", dropping any run-ahead snapshots
    pub fn clear_variables(&mut self) {
        if let Strategy::RunAhead(runahead) = &mut self.strategy {
            runahead.destroy(&mut self.core, &mut self.av);
        }
    }

    /// Run one display frame with whatever strategy the settings select
    pub fn run_frame(&mut self, callbacks: &mut dyn CoreCallbacks) {
        if self.preempt_requested && self.content_loaded {
            self.preempt_requested = false;
            self.enable_preempt(callbacks);
        }

        let ahead_count = if self.config.run_ahead_enabled {
            self.config.frames()
        } else {
            0
        };
        let hide_warnings = self.config.hide_warnings;
        let use_secondary = self.config.secondary_instance;
        self.run_ahead(callbacks, ahead_count, hide_warnings, use_secondary);
    }

    /// Run one display frame `ahead_count` frames ahead
    ///
    /// With `ahead_count == 0` this is a plain step. While preemptive frames
    /// are active they run instead.
    pub fn run_ahead(
        &mut self,
        callbacks: &mut dyn CoreCallbacks,
        ahead_count: u32,
        hide_warnings: bool,
        use_secondary: bool,
    ) {
        self.frame_count += 1;

        match self.strategy {
            Strategy::RunAhead(ref mut runahead) => {
                let mut ctx = FrameContext {
                    callbacks,
                    av: &mut self.av,
                    frame_count: self.frame_count,
                    notifications: &mut self.notifications,
                    secondary: &mut self.secondary,
                    savestate_support: self.savestate_support,
                };
                runahead.run(&mut self.core, &mut ctx, ahead_count, hide_warnings, use_secondary);
            }
            Strategy::Preempt(_) => self.run_preempt(callbacks),
        }
    }

    /// Account for a frame the frontend presented without running the core
    /// (pause, menu)
    pub fn present_idle_frame(&mut self) {
        self.frame_count += 1;
    }

    fn run_preempt(&mut self, callbacks: &mut dyn CoreCallbacks) {
        let Strategy::Preempt(preempt) = &mut self.strategy else {
            return;
        };
        let result = preempt.run(
            &mut self.core,
            callbacks,
            &mut self.av,
            &self.special,
            self.config.users(),
        );
        if let Err(err) = result {
            self.report_preempt(&err);
            self.drop_preempt();
        }
    }

    /// Switch to preemptive frames
    ///
    /// Any run-ahead session and secondary instance are dropped first. On
    /// failure run-ahead stays in charge and a notification is queued.
    pub fn enable_preempt(&mut self, callbacks: &mut dyn CoreCallbacks) -> bool {
        if !self.content_loaded {
            debug!("preemptive frames requested without content");
            return false;
        }

        self.drop_preempt();
        self.clear_variables();
        self.secondary.destroy();

        let mut gate = AvGate::new(&self.av, callbacks);
        match Preempt::init(
            &mut self.core,
            &mut gate,
            self.config.frames(),
            self.savestate_support,
            self.frame_count,
        ) {
            Ok(preempt) => {
                self.strategy = Strategy::Preempt(preempt);
                true
            }
            Err(err) => {
                self.report_preempt(&err);
                false
            }
        }
    }

    /// Return to run-ahead, releasing the preempt ring
    pub fn disable_preempt(&mut self) {
        self.preempt_requested = false;
        self.drop_preempt();
    }

    fn drop_preempt(&mut self) {
        if self.strategy.is_preempt() {
            let previous = std::mem::replace(&mut self.strategy, Strategy::RunAhead(RunAhead::new()));
            if let Strategy::Preempt(preempt) = previous {
                preempt.deinit();
            }
            self.clear_variables();
        }
    }

    fn report_preempt(&mut self, err: &PreemptError) {
        warn!(reason = %err, "preemptive frames disabled");
        self.notifications
            .push(err.notification(self.config.hide_warnings));
    }

    /// Reset the emulated system, marking input dirty
    pub fn reset(&mut self) {
        self.core.reset();
    }

    /// Serialized size of the primary core
    pub fn serialize_size(&self) -> usize {
        self.core.serialize_size()
    }

    /// User savestate
    pub fn save_state(&mut self, buf: &mut [u8]) -> Result<()> {
        self.core.serialize(buf)
    }

    /// User state load, forcing the next run-ahead frame to resync
    pub fn load_state(&mut self, buf: &[u8]) -> Result<()> {
        self.core.unserialize(buf)
    }

    /// Attach a device to a port on the primary, and remember it for the
    /// secondary instance
    pub fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.core.set_controller_port_device(port, device);
        self.secondary.remember_controller_port_device(port, device);
    }
}
