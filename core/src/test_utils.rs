//! Shared test utilities for integration and unit tests

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, bail};
use bytemuck::{Pod, Zeroable};

use crate::rollback::secondary::{InstanceLoader, SpecialSavestateFlag};
use crate::system::device::DEVICE_JOYPAD;
use crate::system::{CoreCallbacks, GameInfo, SimulationCore, VideoFrame};

// ============================================================================
// Toy Core
// ============================================================================

/// Complete state of the toy core
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Pod, Zeroable)]
pub struct ToyState {
    pub counter: i32,
    pub last_input: i16,
    pub _pad: i16,
}

pub const TOY_STATE_SIZE: usize = std::mem::size_of::<ToyState>();

/// Call counters and fault switches shared between a toy core and its test
#[derive(Debug, Default)]
pub struct ToyCounters {
    pub inits: Cell<u32>,
    pub deinits: Cell<u32>,
    pub runs: Cell<u32>,
    pub resets: Cell<u32>,
    pub serializes: Cell<u32>,
    pub unserializes: Cell<u32>,
    pub loads: Cell<u32>,
    pub unloads: Cell<u32>,
    pub fail_serialize: Cell<bool>,
    pub fail_unserialize: Cell<bool>,
    pub fail_load: Cell<bool>,
    /// Whether the special-savestate flag was raised during each unserialize
    pub special_during_unserialize: RefCell<Vec<bool>>,
    pub port_devices: RefCell<Vec<(u32, u32)>>,
    pub loaded_with: RefCell<Vec<Option<GameInfo>>>,
}

fn bump(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

/// Deterministic core: every step polls, reads joypad port 0, increments
/// a counter, then emits one video frame (its state bytes) and two audio
/// frames
pub struct ToyCore {
    pub state: ToyState,
    pub counters: Rc<ToyCounters>,
    state_size: usize,
    /// Extra (device, index, id) reads on port 0 added into `last_input`
    extra_reads: Vec<(u32, u32, u32)>,
    special: Option<SpecialSavestateFlag>,
}

impl Default for ToyCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ToyCore {
    pub fn new() -> Self {
        Self::with_counters(Rc::new(ToyCounters::default()))
    }

    pub fn with_counters(counters: Rc<ToyCounters>) -> Self {
        Self {
            state: ToyState::default(),
            counters,
            state_size: TOY_STATE_SIZE,
            extra_reads: Vec::new(),
            special: None,
        }
    }

    /// Report a different `serialize_size` (0 for "no savestates")
    pub fn with_state_size(mut self, size: usize) -> Self {
        self.state_size = size;
        self
    }

    pub fn with_extra_read(mut self, device: u32, index: u32, id: u32) -> Self {
        self.extra_reads.push((device, index, id));
        self
    }

    /// Record the special flag's value on every unserialize
    pub fn watch_special(mut self, flag: SpecialSavestateFlag) -> Self {
        self.special = Some(flag);
        self
    }

    pub fn counter(&self) -> i32 {
        self.state.counter
    }

    pub fn state_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0; self.state_size.max(TOY_STATE_SIZE)];
        buf[..TOY_STATE_SIZE].copy_from_slice(bytemuck::bytes_of(&self.state));
        buf
    }
}

impl SimulationCore for ToyCore {
    fn init(&mut self) {
        bump(&self.counters.inits);
    }

    fn deinit(&mut self) {
        bump(&self.counters.deinits);
    }

    fn run(&mut self, callbacks: &mut dyn CoreCallbacks) {
        bump(&self.counters.runs);
        callbacks.input_poll();
        let mut input = callbacks.input_state(0, DEVICE_JOYPAD, 0, 0);
        for &(device, index, id) in &self.extra_reads {
            input = input.wrapping_add(callbacks.input_state(0, device, index, id));
        }
        self.state.counter += 1;
        self.state.last_input = input;

        let pixels = bytemuck::bytes_of(&self.state);
        callbacks.video_refresh(&VideoFrame::new(pixels, 2, 1, TOY_STATE_SIZE));
        callbacks.audio_sample_batch(&[0; 4]);
    }

    fn reset(&mut self) {
        bump(&self.counters.resets);
        self.state = ToyState::default();
    }

    fn serialize_size(&self) -> usize {
        self.state_size
    }

    fn serialize(&mut self, buf: &mut [u8]) -> Result<()> {
        bump(&self.counters.serializes);
        if self.counters.fail_serialize.get() {
            bail!("injected serialize failure");
        }
        if buf.len() < TOY_STATE_SIZE {
            bail!("buffer too small: {}", buf.len());
        }
        buf[..TOY_STATE_SIZE].copy_from_slice(bytemuck::bytes_of(&self.state));
        Ok(())
    }

    fn unserialize(&mut self, buf: &[u8]) -> Result<()> {
        bump(&self.counters.unserializes);
        let special = self.special.as_ref().is_some_and(SpecialSavestateFlag::is_raised);
        self.counters.special_during_unserialize.borrow_mut().push(special);
        if self.counters.fail_unserialize.get() {
            bail!("injected unserialize failure");
        }
        if buf.len() < TOY_STATE_SIZE {
            bail!("buffer too small: {}", buf.len());
        }
        self.state = bytemuck::pod_read_unaligned(&buf[..TOY_STATE_SIZE]);
        Ok(())
    }

    fn load_game(&mut self, info: Option<&GameInfo>) -> Result<()> {
        bump(&self.counters.loads);
        self.counters.loaded_with.borrow_mut().push(info.cloned());
        if self.counters.fail_load.get() {
            bail!("injected load failure");
        }
        Ok(())
    }

    fn unload_game(&mut self) {
        bump(&self.counters.unloads);
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.counters.port_devices.borrow_mut().push((port, device));
    }
}

/// Decode a toy core video frame back into its state
pub fn decode_frame(frame: &[u8]) -> ToyState {
    bytemuck::pod_read_unaligned(&frame[..TOY_STATE_SIZE])
}

// ============================================================================
// Secondary Instance Loader
// ============================================================================

/// Loads toy cores sharing one set of counters
pub struct ToyLoader {
    pub counters: Rc<ToyCounters>,
    pub loads: Rc<Cell<u32>>,
    pub fail: bool,
    special: Option<SpecialSavestateFlag>,
}

impl ToyLoader {
    pub fn new() -> Self {
        Self {
            counters: Rc::new(ToyCounters::default()),
            loads: Rc::new(Cell::new(0)),
            fail: false,
            special: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn watch_special(mut self, flag: SpecialSavestateFlag) -> Self {
        self.special = Some(flag);
        self
    }
}

impl InstanceLoader for ToyLoader {
    fn load_second_instance(&mut self) -> Result<Box<dyn SimulationCore>> {
        bump(&self.loads);
        if self.fail {
            bail!("injected loader failure");
        }
        let mut core = ToyCore::with_counters(self.counters.clone());
        if let Some(flag) = &self.special {
            core = core.watch_special(flag.clone());
        }
        Ok(Box::new(core))
    }
}

// ============================================================================
// Recording Callbacks
// ============================================================================

/// Frontend callback set that records what reaches the user
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    /// Value returned for every input query without an explicit entry
    pub input: i16,
    pub values: HashMap<(u32, u32, u32, u32), i16>,
    pub polls: u32,
    pub input_reads: u32,
    pub video_frames: u32,
    /// Stereo frames received
    pub audio_frames: usize,
    pub last_frame: Option<Vec<u8>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: i16) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn set_input(&mut self, input: i16) {
        self.input = input;
    }

    pub fn set_value(&mut self, port: u32, device: u32, index: u32, id: u32, value: i16) {
        self.values.insert((port, device, index, id), value);
    }

    /// Toy core state shown by the last presented frame
    pub fn last_shown(&self) -> Option<ToyState> {
        self.last_frame.as_deref().map(decode_frame)
    }
}

impl CoreCallbacks for RecordingCallbacks {
    fn input_poll(&mut self) {
        self.polls += 1;
    }

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.input_reads += 1;
        self.values
            .get(&(port, device, index, id))
            .copied()
            .unwrap_or(self.input)
    }

    fn video_refresh(&mut self, frame: &VideoFrame<'_>) {
        self.video_frames += 1;
        if let Some(data) = frame.data {
            self.last_frame = Some(data.to_vec());
        }
    }

    fn audio_sample(&mut self, _left: i16, _right: i16) {
        self.audio_frames += 1;
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        self.audio_frames += samples.len() / 2;
        samples.len() / 2
    }
}
