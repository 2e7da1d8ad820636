//! Last observed input values

use smallvec::{SmallVec, smallvec};

use crate::rollback::config::{INITIAL_LIST_CAPACITY, INPUT_STATE_BASELINE};
use crate::rollback::state::SlotList;

/// Per-id values of one (port, device, index) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputListElement {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    state: SmallVec<[i16; INPUT_STATE_BASELINE]>,
}

impl InputListElement {
    fn new() -> Self {
        Self {
            port: 0,
            device: 0,
            index: 0,
            state: smallvec![0; INPUT_STATE_BASELINE],
        }
    }

    fn matches(&self, port: u32, device: u32, index: u32) -> bool {
        self.port == port && self.device == device && self.index == index
    }

    /// Number of ids currently representable
    pub fn state_size(&self) -> usize {
        self.state.len()
    }

    /// Grow by doubling until `id` fits, zero-filling the new range
    fn expand(&mut self, id: usize) {
        let mut new_size = self.state.len();
        if new_size == 0 {
            new_size = INPUT_STATE_BASELINE;
        }
        while id >= new_size {
            new_size *= 2;
        }
        if new_size > self.state.len() {
            self.state.resize(new_size, 0);
        }
    }

    fn set(&mut self, id: u32, value: i16) {
        let id = id as usize;
        if id >= self.state.len() {
            self.expand(id);
        }
        self.state[id] = value;
    }

    fn get(&self, id: u32) -> i16 {
        self.state.get(id as usize).copied().unwrap_or(0)
    }
}

/// Shadow of the input the primary core last observed
///
/// Replay steps and the secondary instance read from here instead of
/// polling live devices. Untracked values read as 0 (neutral input).
pub struct InputShadow {
    elements: SlotList<InputListElement>,
}

impl Default for InputShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl InputShadow {
    pub fn new() -> Self {
        Self {
            elements: SlotList::with_constructor(INITIAL_LIST_CAPACITY, InputListElement::new),
        }
    }

    /// Record a value
    pub fn set(&mut self, port: u32, device: u32, index: u32, id: u32, value: i16) {
        if let Some(element) = self
            .elements
            .iter_mut()
            .find(|e| e.matches(port, device, index))
        {
            element.set(id, value);
            return;
        }

        if let Some(element) = self.elements.add_element() {
            element.port = port;
            element.device = device;
            element.index = index;
            element.set(id, value);
        }
    }

    /// Last recorded value, 0 if never recorded
    pub fn get(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.element(port, device, index)
            .map_or(0, |element| element.get(id))
    }

    pub fn element(&self, port: u32, device: u32, index: u32) -> Option<&InputListElement> {
        self.elements
            .iter()
            .find(|e| e.matches(port, device, index))
    }

    /// Number of distinct (port, device, index) triples tracked
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl std::fmt::Debug for InputShadow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.elements.iter()).finish()
    }
}
