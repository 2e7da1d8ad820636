//! Input device classes and ids
//!
//! Numbering matches the de-facto emulator frontend ABI so cores can be
//! driven without translation.

/// Bits of a device id that select the base device class
pub const DEVICE_TYPE_SHIFT: u32 = 8;
pub const DEVICE_MASK: u32 = (1 << DEVICE_TYPE_SHIFT) - 1;

pub const DEVICE_NONE: u32 = 0;
pub const DEVICE_JOYPAD: u32 = 1;
pub const DEVICE_MOUSE: u32 = 2;
pub const DEVICE_KEYBOARD: u32 = 3;
pub const DEVICE_LIGHTGUN: u32 = 4;
pub const DEVICE_ANALOG: u32 = 5;
pub const DEVICE_POINTER: u32 = 6;

/// Joypad id that returns all buttons as a bitmask
pub const ID_JOYPAD_MASK: u32 = 256;

/// Number of digital joypad buttons
pub const JOYPAD_BUTTON_COUNT: u32 = 16;

pub const INDEX_ANALOG_LEFT: u32 = 0;
pub const INDEX_ANALOG_RIGHT: u32 = 1;
pub const INDEX_ANALOG_BUTTON: u32 = 2;
pub const ID_ANALOG_X: u32 = 0;
pub const ID_ANALOG_Y: u32 = 1;

pub const ID_MOUSE_X: u32 = 0;
pub const ID_MOUSE_Y: u32 = 1;
pub const ID_MOUSE_LEFT: u32 = 2;
pub const ID_MOUSE_BUTTON_5: u32 = 10;

pub const ID_LIGHTGUN_TRIGGER: u32 = 2;
pub const ID_LIGHTGUN_DPAD_RIGHT: u32 = 12;
pub const ID_LIGHTGUN_SCREEN_X: u32 = 13;
pub const ID_LIGHTGUN_SCREEN_Y: u32 = 14;

pub const ID_POINTER_X: u32 = 0;
pub const ID_POINTER_Y: u32 = 1;
pub const ID_POINTER_PRESSED: u32 = 2;
pub const ID_POINTER_COUNT: u32 = 3;

/// Base class of a (possibly subclassed) device id
#[inline]
pub fn device_class(device: u32) -> u32 {
    device & DEVICE_MASK
}

/// Build a subclassed device id
#[inline]
pub fn subclass(base: u32, id: u32) -> u32 {
    ((id + 1) << DEVICE_TYPE_SHIFT) | base
}
