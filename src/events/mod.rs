//! Event vocabulary shared by the interceptor and the event synthesizer
//!
//! These types describe keyboard events independently of CoreGraphics so
//! the decision logic can be exercised without an event tap.

/// Classification of an event delivered to the tap callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    /// Modifier flags changed (modifier keys, Caps Lock)
    FlagsChanged,
    /// macOS disabled the tap because the callback was too slow
    TapDisabledByTimeout,
    /// macOS disabled the tap on user input (secure input fields)
    TapDisabledByUserInput,
    /// Any other event type; never rewritten
    Other(u32),
}

impl EventKind {
    /// Map a raw `CGEventType` value
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            10 => EventKind::KeyDown,
            11 => EventKind::KeyUp,
            12 => EventKind::FlagsChanged,
            0xFFFF_FFFE => EventKind::TapDisabledByTimeout,
            0xFFFF_FFFF => EventKind::TapDisabledByUserInput,
            other => EventKind::Other(other),
        }
    }

    pub fn is_tap_disabled(self) -> bool {
        matches!(
            self,
            EventKind::TapDisabledByTimeout | EventKind::TapDisabledByUserInput
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::KeyDown => write!(f, "KEY_DOWN"),
            EventKind::KeyUp => write!(f, "KEY_UP"),
            EventKind::FlagsChanged => write!(f, "FLAGS_CHANGED"),
            EventKind::TapDisabledByTimeout => write!(f, "TAP_DISABLED_BY_TIMEOUT"),
            EventKind::TapDisabledByUserInput => write!(f, "TAP_DISABLED_BY_USER_INPUT"),
            EventKind::Other(raw) => write!(f, "OTHER({})", raw),
        }
    }
}

/// Key transition direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// A key transition to inject into the input stream.
///
/// Ephemeral: built, posted, dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKey {
    pub keycode: u16,
    pub direction: Direction,
    pub flags: u64,
}

impl SyntheticKey {
    /// Key-down then key-up for `keycode`, no modifiers
    pub fn tap(keycode: u16) -> [SyntheticKey; 2] {
        [
            SyntheticKey {
                keycode,
                direction: Direction::Down,
                flags: 0,
            },
            SyntheticKey {
                keycode,
                direction: Direction::Up,
                flags: 0,
            },
        ]
    }
}

/// What the tap callback hands back to the OS for one event
#[derive(Debug)]
pub enum Decision<E> {
    /// Consume the event; nothing is delivered downstream
    Suppress,
    /// Deliver the original event unchanged
    PassThrough,
    /// Deliver this event in place of the original
    Substitute(E),
}

impl<E> Decision<E> {
    pub fn is_suppress(&self) -> bool {
        matches!(self, Decision::Suppress)
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Decision::PassThrough)
    }
}
