//! Secondary core instance
//!
//! A second copy of the primary core, resynchronized from primary snapshots,
//! that performs speculative steps so the primary never has to roll back.
//! It only ever sees input from the shadow: polling is a no-op and every
//! input read is answered from what the primary already recorded.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::rollback::config::MAX_USERS;
use crate::rollback::hooks::ShadowReplay;
use crate::rollback::input::InputShadow;
use crate::system::device::DEVICE_NONE;
use crate::system::{CoreCallbacks, LoadContentInfo, SimulationCore};

/// Produces a fresh, independent copy of the running core
///
/// Implementations own the platform mechanics (copying the core binary,
/// binding symbols, ...).
pub trait InstanceLoader {
    fn load_second_instance(&mut self) -> Result<Box<dyn SimulationCore>>;
}

/// Raised while a snapshot is restored for internal rollback purposes
///
/// Lets the rest of the frontend tell internal loads apart from user loads
/// (and e.g. suppress "state loaded" messages).
#[derive(Debug, Clone, Default)]
pub struct SpecialSavestateFlag(Rc<Cell<bool>>);

impl SpecialSavestateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.set(true);
    }

    pub fn lower(&self) {
        self.0.set(false);
    }

    pub fn is_raised(&self) -> bool {
        self.0.get()
    }
}

/// Lazily created second instance of the primary core
pub struct SecondaryInstance {
    loader: Option<Box<dyn InstanceLoader>>,
    core: Option<Box<dyn SimulationCore>>,
    /// Cloned at content load, `None` when nothing (or special content) was loaded
    content: Option<LoadContentInfo>,
    /// Last device attached to each port by the frontend
    port_map: [Option<u32>; MAX_USERS],
    max_users: usize,
    special: SpecialSavestateFlag,
}

impl SecondaryInstance {
    pub fn new(loader: Option<Box<dyn InstanceLoader>>, special: SpecialSavestateFlag) -> Self {
        Self {
            loader,
            core: None,
            content: None,
            port_map: [None; MAX_USERS],
            max_users: MAX_USERS,
            special,
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn InstanceLoader>) {
        self.loader = Some(loader);
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Ports at or beyond this count get no device on the secondary
    pub fn set_max_users(&mut self, max_users: usize) {
        self.max_users = max_users.min(MAX_USERS);
    }

    /// Remember how the primary's content was loaded
    ///
    /// Special (subsystem) loads are not remembered, which makes every
    /// later creation attempt fail.
    pub fn set_load_content_info(&mut self, info: &LoadContentInfo) {
        self.content = info.clone_for_secondary();
    }

    pub fn clear_load_content_info(&mut self) {
        self.content = None;
    }

    /// Remember a port device, forwarding it if the instance already exists
    pub fn remember_controller_port_device(&mut self, port: u32, device: u32) {
        if let Some(slot) = self.port_map.get_mut(port as usize) {
            *slot = Some(device);
        }
        if let Some(core) = self.core.as_mut() {
            core.set_controller_port_device(port, device);
        }
    }

    pub fn clear_controller_port_map(&mut self) {
        self.port_map = [None; MAX_USERS];
    }

    pub fn exists(&self) -> bool {
        self.core.is_some()
    }

    pub fn core(&self) -> Option<&dyn SimulationCore> {
        self.core.as_deref()
    }

    pub fn core_mut(&mut self) -> Option<&mut dyn SimulationCore> {
        match self.core.as_mut() {
            Some(core) => Some(core.as_mut()),
            None => None,
        }
    }

    /// Create the instance unless it already exists
    pub fn ensure_exists(&mut self) -> bool {
        if self.core.is_some() {
            return true;
        }
        match self.create() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "secondary instance unavailable");
                false
            }
        }
    }

    fn create(&mut self) -> Result<()> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| anyhow!("no regular content load to replicate"))?;
        let loader = self
            .loader
            .as_mut()
            .ok_or_else(|| anyhow!("no instance loader configured"))?;

        let mut core = loader
            .load_second_instance()
            .context("failed to load second instance")?;
        core.init();

        let loaded = if let Some(info) = content.info.as_ref() {
            core.load_game(Some(info))
        } else if content.content_optional {
            core.load_game(None)
        } else {
            Ok(())
        };
        if let Err(e) = loaded {
            core.unload_game();
            core.deinit();
            return Err(e.context("secondary instance failed to load content"));
        }

        for (port, device) in self.port_map.iter().enumerate() {
            let Some(device) = *device else { continue };
            let device = if port < self.max_users {
                device
            } else {
                DEVICE_NONE
            };
            core.set_controller_port_device(port as u32, device);
        }
        self.clear_controller_port_map();

        info!("secondary instance created");
        self.core = Some(core);
        Ok(())
    }

    /// Run one step fed from the shadow
    ///
    /// Returns false (and tears the instance down) if it cannot be created.
    pub fn run_with_shadowed_input(
        &mut self,
        shadow: Option<&InputShadow>,
        callbacks: &mut dyn CoreCallbacks,
    ) -> bool {
        if !self.ensure_exists() {
            self.destroy();
            return false;
        }
        let Some(core) = self.core.as_mut() else {
            return false;
        };
        let mut replay = ShadowReplay::new(shadow, callbacks);
        core.run(&mut replay);
        true
    }

    /// Load a primary snapshot with the special-savestate flag raised
    pub fn deserialize(&mut self, bytes: &[u8]) -> bool {
        if !self.ensure_exists() {
            self.destroy();
            return false;
        }
        let Some(core) = self.core.as_mut() else {
            return false;
        };

        self.special.raise();
        let result = core.unserialize(bytes);
        self.special.lower();

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "secondary instance rejected snapshot");
                false
            }
        }
    }

    /// Unload and tear down the instance
    pub fn destroy(&mut self) {
        if let Some(mut core) = self.core.take() {
            debug!("destroying secondary instance");
            core.unload_game();
            core.deinit();
        }
    }
}

impl Drop for SecondaryInstance {
    fn drop(&mut self) {
        self.destroy();
    }
}
