//! In-memory event, synthesizer and channel for unit testing.
//!
//! Lets tests drive the interceptor without an event tap or CoreGraphics.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use super::interceptor::InterceptionChannel;
use super::synthesizer::{KeyboardEvent, SynthesisError, Synthesizer};
use crate::events::SyntheticKey;

/// A keyboard event with plain fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEvent {
    pub keycode: u16,
    pub flags: u64,
    pub timestamp: Duration,
    pub autorepeat: bool,
}

impl MockEvent {
    pub fn new(keycode: u16, at_ms: u64) -> Self {
        Self {
            keycode,
            flags: 0,
            timestamp: Duration::from_millis(at_ms),
            autorepeat: false,
        }
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.autorepeat = true;
        self
    }
}

impl KeyboardEvent for MockEvent {
    fn keycode(&self) -> u16 {
        self.keycode
    }

    fn flags(&self) -> u64 {
        self.flags
    }

    fn timestamp(&self) -> Duration {
        self.timestamp
    }

    fn is_autorepeat(&self) -> bool {
        self.autorepeat
    }
}

/// Records every posted synthetic key instead of injecting it
#[derive(Debug, Default)]
pub struct RecordingSynthesizer {
    posted: RefCell<Vec<SyntheticKey>>,
    fail_creation: Cell<bool>,
    fail_copy: Cell<bool>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent event creation fail
    pub fn fail_creation(&self, fail: bool) {
        self.fail_creation.set(fail);
    }

    /// Make every subsequent event copy fail
    pub fn fail_copy(&self, fail: bool) {
        self.fail_copy.set(fail);
    }

    /// Synthetic keys posted so far
    pub fn posted(&self) -> Vec<SyntheticKey> {
        self.posted.borrow().clone()
    }
}

impl Synthesizer for RecordingSynthesizer {
    type Event = MockEvent;

    fn post_sequence(&self, keys: &[SyntheticKey]) -> Result<(), SynthesisError> {
        if self.fail_creation.get() {
            let keycode = keys.first().map(|k| k.keycode).unwrap_or_default();
            return Err(SynthesisError::EventCreation(keycode));
        }
        self.posted.borrow_mut().extend_from_slice(keys);
        Ok(())
    }

    fn copy_with_flags(&self, event: &MockEvent, flags: u64) -> Option<MockEvent> {
        if self.fail_copy.get() {
            return None;
        }
        Some(MockEvent {
            flags,
            ..event.clone()
        })
    }
}

/// Counts re-enable requests
#[derive(Debug, Default)]
pub struct MockChannel {
    reenabled: Cell<u32>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reenable_count(&self) -> u32 {
        self.reenabled.get()
    }
}

impl InterceptionChannel for MockChannel {
    fn reenable(&self) {
        self.reenabled.set(self.reenabled.get() + 1);
    }
}
