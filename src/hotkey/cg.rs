//! CoreGraphics event synthesis
//!
//! Synthetic keys are posted at the HID level with
//! `CGEventCreateKeyboardEvent` + `CGEventPost`. Augmented events are
//! copies made with `CGEventCreateCopy`, so the original handed to the tap
//! callback is never mutated.

use std::ffi::c_void;
use std::time::Duration;

use core_graphics::event::{CGEvent, CGEventTapLocation, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use foreign_types::ForeignType;

use super::synthesizer::{KeyboardEvent, SynthesisError, Synthesizer};
use crate::events::{Direction, SyntheticKey};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventCreateCopy(event: *mut c_void) -> *mut c_void;
    fn CGEventGetTimestamp(event: *mut c_void) -> u64;
    fn CGEventSetFlags(event: *mut c_void, flags: u64);
}

impl KeyboardEvent for CGEvent {
    fn keycode(&self) -> u16 {
        self.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16
    }

    fn flags(&self) -> u64 {
        self.get_flags().bits()
    }

    fn timestamp(&self) -> Duration {
        // CGEventTimestamp: nanoseconds since boot
        let nanos = unsafe { CGEventGetTimestamp(self.as_ptr() as *mut c_void) };
        Duration::from_nanos(nanos)
    }

    fn is_autorepeat(&self) -> bool {
        self.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0
    }
}

/// Set raw flag bits, including device-dependent bits `CGEventFlags` drops
fn set_raw_flags(event: &CGEvent, flags: u64) {
    unsafe { CGEventSetFlags(event.as_ptr() as *mut c_void, flags) }
}

/// Synthesizer backed by the CoreGraphics injection API
#[derive(Debug, Default)]
pub struct CgSynthesizer;

impl CgSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Synthesizer for CgSynthesizer {
    type Event = CGEvent;

    fn post_sequence(&self, keys: &[SyntheticKey]) -> Result<(), SynthesisError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| SynthesisError::EventSource)?;

        let events = keys
            .iter()
            .map(|key| -> Result<CGEvent, SynthesisError> {
                let event = CGEvent::new_keyboard_event(
                    source.clone(),
                    key.keycode,
                    key.direction == Direction::Down,
                )
                .map_err(|_| SynthesisError::EventCreation(key.keycode))?;
                set_raw_flags(&event, key.flags);
                Ok(event)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for event in &events {
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }

    fn copy_with_flags(&self, event: &CGEvent, flags: u64) -> Option<CGEvent> {
        let copy = unsafe { CGEventCreateCopy(event.as_ptr() as *mut c_void) };
        if copy.is_null() {
            return None;
        }
        // SAFETY: CGEventCreateCopy returns a +1 reference we now own
        let copy = unsafe { CGEvent::from_ptr(copy as *mut _) };
        set_raw_flags(&copy, flags);
        Some(copy)
    }
}
