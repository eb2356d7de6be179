//! Hyper key state machine
//!
//! Disambiguates a tap (press and release with nothing in between) from a
//! hold that was used as a modifier for another key.

use std::time::Duration;

use tracing::debug;

/// The three states of the hyper key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No hyper key interaction in progress
    #[default]
    Idle,
    /// Hyper key is down, no other key pressed yet
    Held {
        /// Monotonic timestamp of the press
        pressed_at: Duration,
    },
    /// Hyper key is down and at least one other key was pressed
    Modified,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Held { .. } => write!(f, "Held"),
            State::Modified => write!(f, "Modified"),
        }
    }
}

/// When a clean tap turns into Escape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapPolicy {
    /// Every clean tap emits Escape, however long the key was held
    #[default]
    Always,
    /// A clean tap emits Escape only if released before the threshold
    Threshold(Duration),
}

impl TapPolicy {
    fn emits_escape(self, elapsed: Duration) -> bool {
        match self {
            TapPolicy::Always => true,
            TapPolicy::Threshold(limit) => elapsed < limit,
        }
    }
}

/// Key state machine driven by timestamped hyper key events.
///
/// Total over its inputs: duplicate or unpaired events are no-ops, never
/// errors.
#[derive(Debug, Default)]
pub struct KeyStateMachine {
    state: State,
    policy: TapPolicy,
}

impl KeyStateMachine {
    /// Create a state machine in `Idle`
    pub fn new(policy: TapPolicy) -> Self {
        Self {
            state: State::Idle,
            policy,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Hyper key pressed.
    ///
    /// A duplicate press while already down re-arms the hold.
    pub fn on_hyper_down(&mut self, timestamp: Duration) {
        if self.state != State::Idle {
            debug!(from = %self.state, "hyper key down while held, re-arming");
        } else {
            debug!("hyper key down, entering held state");
        }
        self.state = State::Held {
            pressed_at: timestamp,
        };
    }

    /// Hyper key released. Returns `true` if Escape should be emitted.
    pub fn on_hyper_up(&mut self, timestamp: Duration) -> bool {
        match self.state {
            State::Held { pressed_at } => {
                let elapsed = timestamp.saturating_sub(pressed_at);
                let emit = self.policy.emits_escape(elapsed);
                self.state = State::Idle;
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    emit_escape = emit,
                    "hyper key up after clean tap"
                );
                emit
            }
            State::Modified => {
                self.state = State::Idle;
                debug!("hyper key up, was used as modifier");
                false
            }
            State::Idle => false,
        }
    }

    /// Another key was pressed. Only has an effect in `Held`.
    pub fn on_other_key_down(&mut self) {
        if let State::Held { .. } = self.state {
            self.state = State::Modified;
            debug!("other key pressed, entering modified state");
        }
    }

    /// Check if the hyper key is currently down
    pub fn is_held(&self) -> bool {
        match self.state {
            State::Held { .. } | State::Modified => true,
            State::Idle => false,
        }
    }
}
