//! Key code and modifier flag definitions
//!
//! Raw values mirror the macOS `CGKeyCode` and `CGEventFlags` constants so
//! the platform-neutral parts of the crate can reason about events without
//! linking CoreGraphics.

/// macOS virtual key codes (`kVK_*`)
pub mod keycode {
    /// kVK_Escape
    pub const ESCAPE: u16 = 0x35;
    /// kVK_CapsLock
    pub const CAPS_LOCK: u16 = 0x39;
    /// kVK_F13
    pub const F13: u16 = 0x69;
    /// kVK_F14
    pub const F14: u16 = 0x6B;
    /// kVK_F15
    pub const F15: u16 = 0x71;
    /// kVK_F16
    pub const F16: u16 = 0x6A;
    /// kVK_F17
    pub const F17: u16 = 0x40;
    /// kVK_F18
    pub const F18: u16 = 0x4F;
    /// kVK_F19
    pub const F19: u16 = 0x50;
    /// kVK_F20
    pub const F20: u16 = 0x5A;
}

/// Modifier flag masks from `CGEventFlags`
pub mod flags {
    /// Caps Lock state (kCGEventFlagMaskAlphaShift)
    pub const ALPHA_SHIFT: u64 = 0x0001_0000;
    /// kCGEventFlagMaskShift
    pub const SHIFT: u64 = 0x0002_0000;
    /// kCGEventFlagMaskControl
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt (kCGEventFlagMaskAlternate)
    pub const OPTION: u64 = 0x0008_0000;
    /// kCGEventFlagMaskCommand
    pub const COMMAND: u64 = 0x0010_0000;
}

/// HID usage page 0x07 (keyboard) prefix used by `hidutil` mappings
const HID_KEYBOARD_PAGE: u64 = 0x7_0000_0000;

/// Caps Lock as a `hidutil` source/destination value
pub const HID_CAPS_LOCK: u64 = HID_KEYBOARD_PAGE | 0x39;

/// Resolve the `hidutil` usage value for a virtual key code.
///
/// Only the F13-F20 range is covered: those keys exist in the HID tables
/// but are absent from Apple keyboards, which makes them safe remap targets.
pub fn hid_usage_for_keycode(code: u16) -> Option<u64> {
    let usage = match code {
        keycode::F13 => 0x68,
        keycode::F14 => 0x69,
        keycode::F15 => 0x6A,
        keycode::F16 => 0x6B,
        keycode::F17 => 0x6C,
        keycode::F18 => 0x6D,
        keycode::F19 => 0x6E,
        keycode::F20 => 0x6F,
        _ => return None,
    };
    Some(HID_KEYBOARD_PAGE | usage)
}

/// A set of the four modifiers the hyper key can inject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierSet {
    /// Command key
    pub command: bool,
    /// Option/Alt key
    pub option: bool,
    /// Control key
    pub control: bool,
    /// Shift key
    pub shift: bool,
}

impl ModifierSet {
    /// Command + Option
    pub const COMMAND_OPTION: Self = Self {
        command: true,
        option: true,
        control: false,
        shift: false,
    };

    /// Command + Option + Control + Shift
    pub const HYPER: Self = Self {
        command: true,
        option: true,
        control: true,
        shift: true,
    };

    /// Raw flag bits for this set
    pub fn bits(&self) -> u64 {
        let mut raw = 0;
        if self.command {
            raw |= flags::COMMAND;
        }
        if self.option {
            raw |= flags::OPTION;
        }
        if self.control {
            raw |= flags::CONTROL;
        }
        if self.shift {
            raw |= flags::SHIFT;
        }
        raw
    }

    /// Union of this set with existing event flags.
    ///
    /// Bits outside the four modifiers (device-dependent flags, alpha
    /// shift, numeric pad) are preserved.
    pub fn apply_to(&self, raw: u64) -> u64 {
        raw | self.bits()
    }
}

/// Which modifier combination a held hyper key injects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HyperModifiers {
    /// Command + Option
    #[default]
    CommandOption,
    /// Command + Option + Control + Shift
    Full,
}

impl HyperModifiers {
    pub fn modifiers(self) -> ModifierSet {
        match self {
            HyperModifiers::CommandOption => ModifierSet::COMMAND_OPTION,
            HyperModifiers::Full => ModifierSet::HYPER,
        }
    }
}
