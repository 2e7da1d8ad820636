//! Per-port input tracking for preemptive frames
//!
//! Joypads are always compared as a whole button mask. Analog axes/buttons
//! and pointing devices are only compared once the core has actually asked
//! for them, which [`PreemptInput`] records while the core runs.

use crate::rollback::config::MAX_USERS;
use crate::system::device::{
    DEVICE_ANALOG, DEVICE_JOYPAD, DEVICE_LIGHTGUN, DEVICE_MOUSE, DEVICE_NONE, DEVICE_POINTER,
    ID_JOYPAD_MASK, ID_LIGHTGUN_DPAD_RIGHT, ID_LIGHTGUN_SCREEN_X, ID_MOUSE_BUTTON_5, ID_MOUSE_Y,
    ID_POINTER_COUNT, ID_POINTER_PRESSED, INDEX_ANALOG_BUTTON, JOYPAD_BUTTON_COUNT, device_class,
};
use crate::system::{CoreCallbacks, VideoFrame};

/// Two sticks of two axes, then one slot per analog button
pub const ANALOG_STATE_LEN: usize = 4 + JOYPAD_BUTTON_COUNT as usize;

/// Mask bits that select analog buttons rather than stick axes
const ANALOG_BUTTON_BITS: u32 = ((1 << JOYPAD_BUTTON_COUNT) - 1) << 4;

/// x, y, button bits, pointer count
pub const POINTER_STATE_LEN: usize = 4;

/// Mask bit for an analog read, `None` if it cannot be represented
#[inline]
fn analog_bit(index: u32, id: u32) -> Option<u32> {
    let shift = index.checked_mul(2)?.checked_add(id)?;
    1u32.checked_shl(shift)
}

/// Input last seen at each preempt poll, per port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTracking {
    pub joypad_state: [i16; MAX_USERS],
    pub analog_state: [[i16; ANALOG_STATE_LEN]; MAX_USERS],
    /// Analog reads requested since the last detected analog change
    pub analog_mask: [u32; MAX_USERS],
    pub ptrdev_state: [[i16; POINTER_STATE_LEN]; MAX_USERS],
    /// Pointing device class requested since the last poll
    pub ptr_dev_needed: [u32; MAX_USERS],
    /// Pointing device class compared at the last poll
    pub ptr_dev_polled: [u32; MAX_USERS],
}

impl Default for PortTracking {
    fn default() -> Self {
        Self {
            joypad_state: [0; MAX_USERS],
            analog_state: [[0; ANALOG_STATE_LEN]; MAX_USERS],
            analog_mask: [0; MAX_USERS],
            ptrdev_state: [[0; POINTER_STATE_LEN]; MAX_USERS],
            ptr_dev_needed: [DEVICE_NONE; MAX_USERS],
            ptr_dev_polled: [DEVICE_NONE; MAX_USERS],
        }
    }
}

impl PortTracking {
    /// Poll live input and compare it against the last poll
    ///
    /// Returns true if anything tracked changed.
    pub fn poll(&mut self, callbacks: &mut dyn CoreCallbacks, max_users: usize) -> bool {
        let mut dirty = false;
        callbacks.input_poll();

        for p in 0..max_users.min(MAX_USERS) {
            let port = p as u32;

            let joypad = callbacks.input_state(port, DEVICE_JOYPAD, 0, ID_JOYPAD_MASK);
            if joypad != self.joypad_state[p] {
                self.joypad_state[p] = joypad;
                dirty = true;
            }

            if self.analog_mask[p] != 0 && self.analog_dirty(callbacks, p) {
                dirty = true;
                self.analog_mask[p] = 0;
            }

            let needed = self.ptr_dev_needed[p];
            if needed != DEVICE_NONE {
                if self.pointer_dirty(callbacks, needed, p) {
                    dirty = true;
                }
                self.ptr_dev_polled[p] = needed;
                self.ptr_dev_needed[p] = DEVICE_NONE;
            }
        }

        dirty
    }

    fn analog_dirty(&mut self, callbacks: &mut dyn CoreCallbacks, p: usize) -> bool {
        let mask = self.analog_mask[p];
        let port = p as u32;
        let mut state = [0i16; ANALOG_STATE_LEN];

        for stick in 0..2u32 {
            let base = (stick * 2) as usize;
            if mask & (1 << base) != 0 {
                state[base] = callbacks.input_state(port, DEVICE_ANALOG, stick, 0);
            }
            if mask & (1 << (base + 1)) != 0 {
                state[base + 1] = callbacks.input_state(port, DEVICE_ANALOG, stick, 1);
            }
        }

        if mask & ANALOG_BUTTON_BITS != 0 {
            for button in 0..JOYPAD_BUTTON_COUNT {
                if mask & (1 << (button + 4)) != 0 {
                    state[button as usize + 4] =
                        callbacks.input_state(port, DEVICE_ANALOG, INDEX_ANALOG_BUTTON, button);
                }
            }
        }

        if self.analog_state[p] == state {
            return false;
        }
        self.analog_state[p] = state;
        true
    }

    fn pointer_dirty(&mut self, callbacks: &mut dyn CoreCallbacks, device: u32, p: usize) -> bool {
        let port = p as u32;
        let (x_id, max_id, count_id) = match device {
            DEVICE_MOUSE => (0, ID_MOUSE_BUTTON_5, None),
            DEVICE_LIGHTGUN => (ID_LIGHTGUN_SCREEN_X, ID_LIGHTGUN_DPAD_RIGHT, None),
            DEVICE_POINTER => (0, ID_POINTER_PRESSED, Some(ID_POINTER_COUNT)),
            _ => return false,
        };

        let mut state = [0i16; POINTER_STATE_LEN];
        state[0] = callbacks.input_state(port, device, 0, x_id);
        state[1] = callbacks.input_state(port, device, 0, x_id + 1);
        for id in 2..=max_id {
            if callbacks.input_state(port, device, 0, id) != 0 {
                state[2] |= 1 << id;
            }
        }
        if let Some(count_id) = count_id {
            state[3] = callbacks.input_state(port, device, 0, count_id);
        }

        if self.ptrdev_state[p] == state {
            return false;
        }
        self.ptrdev_state[p] = state;
        true
    }
}

/// Callback decorator active while a preempt-managed core runs
///
/// Polling is a no-op (the scheduler polls once per frame itself). Input
/// reads register which analog and pointing inputs need tracking; mouse x/y
/// are answered from the last poll once the mouse is being tracked.
pub struct PreemptInput<'a> {
    tracking: &'a mut PortTracking,
    inner: &'a mut dyn CoreCallbacks,
}

impl<'a> PreemptInput<'a> {
    pub fn new(tracking: &'a mut PortTracking, inner: &'a mut dyn CoreCallbacks) -> Self {
        Self { tracking, inner }
    }
}

impl CoreCallbacks for PreemptInput<'_> {
    fn input_poll(&mut self) {}

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        let p = port as usize;
        if p < MAX_USERS {
            let class = device_class(device);
            match class {
                DEVICE_ANALOG => {
                    if let Some(bit) = analog_bit(index, id) {
                        self.tracking.analog_mask[p] |= bit;
                    }
                }
                DEVICE_LIGHTGUN | DEVICE_POINTER => {
                    self.tracking.ptr_dev_needed[p] = class;
                }
                DEVICE_MOUSE if id <= ID_MOUSE_Y => {
                    self.tracking.ptr_dev_needed[p] = class;
                    if self.tracking.ptr_dev_polled[p] == class {
                        return self.tracking.ptrdev_state[p][id as usize];
                    }
                }
                _ => {}
            }
        }
        self.inner.input_state(port, device, index, id)
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
