//! Event synthesis contract
//!
//! Escape taps and modifier-augmented copies of real events are produced
//! through [`Synthesizer`], implemented by CoreGraphics on macOS and by an
//! in-memory recorder in tests.

use std::time::Duration;

use tracing::{debug, warn};

use super::keys::{keycode, HyperModifiers};
use crate::events::SyntheticKey;

/// Read access to the fields of a real keyboard event
pub trait KeyboardEvent {
    /// Virtual key code
    fn keycode(&self) -> u16;
    /// Raw modifier flag bits
    fn flags(&self) -> u64;
    /// Monotonic timestamp (time since boot)
    fn timestamp(&self) -> Duration;
    /// Set when the event is a keyboard auto-repeat
    fn is_autorepeat(&self) -> bool;
}

/// Errors raised while building synthetic events
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("failed to create event source")]
    EventSource,

    #[error("failed to create keyboard event for keycode {0:#04x}")]
    EventCreation(u16),
}

/// OS input injection
pub trait Synthesizer {
    type Event: KeyboardEvent;

    /// Build every event in `keys`, then post them in order.
    ///
    /// Nothing is posted if any event fails to build, so a sequence is
    /// never left half-delivered (a key-down without its key-up).
    fn post_sequence(&self, keys: &[SyntheticKey]) -> Result<(), SynthesisError>;

    /// Duplicate `event` with its flags replaced by `flags`.
    ///
    /// Returns `None` if the OS could not allocate the copy.
    fn copy_with_flags(&self, event: &Self::Event, flags: u64) -> Option<Self::Event>;

    /// Post an Escape key-down followed by a key-up.
    ///
    /// Best effort: a failure is logged and dropped.
    fn escape_tap(&self) {
        match self.post_sequence(&SyntheticKey::tap(keycode::ESCAPE)) {
            Ok(()) => debug!("posted escape tap"),
            Err(e) => warn!(?e, "dropping escape tap"),
        }
    }

    /// Copy of `event` with the hyper modifiers added, keycode and direction
    /// unchanged. `None` means the caller should pass the original through.
    fn augment(&self, event: &Self::Event, modifiers: HyperModifiers) -> Option<Self::Event> {
        let flags = modifiers.modifiers().apply_to(event.flags());
        let augmented = self.copy_with_flags(event, flags);
        if augmented.is_none() {
            warn!(keycode = event.keycode(), "failed to copy event, passing through");
        }
        augmented
    }
}
