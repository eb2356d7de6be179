//! Keyboard event interceptor
//!
//! Classifies every event delivered to the tap callback and decides whether
//! to suppress it, pass it through or substitute a rewritten copy. Runs
//! inline in the OS input path: no I/O, no locks, no blocking.

use tracing::{debug, trace, warn};

use super::keys::{flags, HyperModifiers};
use super::synthesizer::{KeyboardEvent, Synthesizer};
use crate::config::{Config, HyperKey, KeyDelivery};
use crate::events::{Decision, Direction, EventKind};
use crate::state::{KeyStateMachine, State};

/// Handle used to turn a disabled interception channel back on
pub trait InterceptionChannel {
    fn reenable(&self);
}

/// The tap callback's decision logic
pub struct Interceptor<S: Synthesizer> {
    machine: KeyStateMachine,
    synthesizer: S,
    hyper_key: HyperKey,
    modifiers: HyperModifiers,
    /// Times the channel was re-enabled after an OS disable
    recoveries: u64,
}

impl<S: Synthesizer> Interceptor<S> {
    pub fn new(config: &Config, synthesizer: S) -> Self {
        Self {
            machine: KeyStateMachine::new(config.tap_policy),
            synthesizer,
            hyper_key: config.hyper_key,
            modifiers: config.modifiers,
            recoveries: 0,
        }
    }

    /// Current hyper key state
    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    /// Decide the fate of one event.
    ///
    /// Rules apply in strict priority order and exactly one decision is
    /// returned:
    /// 1. tap disabled by the OS: re-enable, pass through
    /// 2. hyper key transition: drive the state machine, suppress
    /// 3. key-down while the hyper key is held: add modifiers
    /// 4. anything else: pass through
    pub fn handle<C>(&mut self, kind: EventKind, event: &S::Event, channel: &C) -> Decision<S::Event>
    where
        C: InterceptionChannel + ?Sized,
    {
        if kind.is_tap_disabled() {
            self.recoveries += 1;
            warn!(%kind, recoveries = self.recoveries, "event tap disabled, re-enabling");
            channel.reenable();
            return Decision::PassThrough;
        }

        if let Some(direction) = self.classify_hyper(kind, event) {
            self.on_hyper(direction, event);
            return Decision::Suppress;
        }

        if kind == EventKind::KeyDown && self.machine.is_held() {
            self.machine.on_other_key_down();
            trace!(keycode = event.keycode(), "adding hyper modifiers");
            return match self.synthesizer.augment(event, self.modifiers) {
                Some(augmented) => Decision::Substitute(augmented),
                None => Decision::PassThrough,
            };
        }

        Decision::PassThrough
    }

    /// Map an event to a hyper key transition, if it is one
    fn classify_hyper(&self, kind: EventKind, event: &S::Event) -> Option<Direction> {
        if event.keycode() != self.hyper_key.keycode {
            return None;
        }

        match (self.hyper_key.delivery, kind) {
            (KeyDelivery::Discrete, EventKind::KeyDown) => Some(Direction::Down),
            (KeyDelivery::Discrete, EventKind::KeyUp) => Some(Direction::Up),
            (KeyDelivery::FlagsChanged, EventKind::FlagsChanged) => {
                if event.flags() & flags::ALPHA_SHIFT != 0 {
                    Some(Direction::Down)
                } else {
                    Some(Direction::Up)
                }
            }
            _ => None,
        }
    }

    fn on_hyper(&mut self, direction: Direction, event: &S::Event) {
        match direction {
            Direction::Down if event.is_autorepeat() && self.machine.is_held() => {
                trace!("ignoring hyper key auto-repeat");
            }
            Direction::Down => self.machine.on_hyper_down(event.timestamp()),
            Direction::Up => {
                if self.machine.on_hyper_up(event.timestamp()) {
                    self.synthesizer.escape_tap();
                } else {
                    debug!("hyper key released without escape");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::SyntheticKey;
    use crate::hotkey::keys::keycode;
    use crate::hotkey::mock::{MockChannel, MockEvent, RecordingSynthesizer};
    use crate::state::TapPolicy;

    const KEY_A: u16 = 0x00;

    fn interceptor(config: Config) -> (Interceptor<RecordingSynthesizer>, MockChannel) {
        (
            Interceptor::new(&config, RecordingSynthesizer::new()),
            MockChannel::new(),
        )
    }

    fn discrete() -> (Interceptor<RecordingSynthesizer>, MockChannel) {
        interceptor(Config::default())
    }

    fn flags_changed_config() -> Config {
        Config {
            hyper_key: HyperKey {
                keycode: keycode::CAPS_LOCK,
                delivery: KeyDelivery::FlagsChanged,
            },
            remap: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_tap_emits_single_escape() {
        let (mut ic, ch) = discrete();

        let down = ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        assert!(down.is_suppress());
        assert!(ic.synthesizer().posted().is_empty());

        let up = ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 50), &ch);
        assert!(up.is_suppress());

        assert_eq!(
            ic.synthesizer().posted(),
            SyntheticKey::tap(keycode::ESCAPE).to_vec()
        );
        assert_eq!(ic.state(), State::Idle);
    }

    #[test]
    fn test_combo_adds_command_option() {
        let (mut ic, ch) = discrete();

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);

        let a = MockEvent::new(KEY_A, 20);
        match ic.handle(EventKind::KeyDown, &a, &ch) {
            Decision::Substitute(modified) => {
                assert_eq!(modified.keycode, KEY_A);
                assert_eq!(modified.timestamp, a.timestamp);
                assert_eq!(modified.flags, flags::COMMAND | flags::OPTION);
            }
            other => panic!("expected substitute, got {:?}", other),
        }
        assert_eq!(ic.state(), State::Modified);

        let up = ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 40), &ch);
        assert!(up.is_suppress());
        assert!(ic.synthesizer().posted().is_empty());
        assert_eq!(ic.state(), State::Idle);
    }

    #[test]
    fn test_full_hyper_modifiers() {
        let (mut ic, ch) = interceptor(Config {
            modifiers: HyperModifiers::Full,
            ..Config::default()
        });

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        match ic.handle(EventKind::KeyDown, &MockEvent::new(KEY_A, 5), &ch) {
            Decision::Substitute(modified) => assert_eq!(
                modified.flags,
                flags::COMMAND | flags::OPTION | flags::CONTROL | flags::SHIFT
            ),
            other => panic!("expected substitute, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_event_untouched() {
        let (mut ic, ch) = discrete();
        let event = MockEvent::new(KEY_A, 10).with_flags(flags::SHIFT);
        let before = event.clone();

        for kind in [EventKind::KeyDown, EventKind::KeyUp, EventKind::FlagsChanged] {
            assert!(ic.handle(kind, &event, &ch).is_pass_through());
        }
        assert_eq!(event, before);
        assert_eq!(ic.state(), State::Idle);
        assert!(ic.synthesizer().posted().is_empty());
        assert_eq!(ch.reenable_count(), 0);
    }

    #[test]
    fn test_tap_disabled_reenables_first() {
        let (mut ic, ch) = discrete();
        let event = MockEvent::new(KEY_A, 0);

        let decision = ic.handle(EventKind::TapDisabledByTimeout, &event, &ch);
        assert!(decision.is_pass_through());
        assert_eq!(ch.reenable_count(), 1);

        assert!(ic.handle(EventKind::KeyDown, &event, &ch).is_pass_through());
        assert_eq!(ch.reenable_count(), 1);

        ic.handle(EventKind::TapDisabledByUserInput, &event, &ch);
        assert_eq!(ch.reenable_count(), 2);
        assert_eq!(ic.recoveries(), 2);
    }

    #[test]
    fn test_tap_disabled_wins_over_hyper_keycode() {
        let (mut ic, ch) = discrete();
        let decision = ic.handle(
            EventKind::TapDisabledByUserInput,
            &MockEvent::new(keycode::F18, 0),
            &ch,
        );
        assert!(decision.is_pass_through());
        assert_eq!(ic.state(), State::Idle);
    }

    #[test]
    fn test_copy_failure_passes_original() {
        let (mut ic, ch) = discrete();
        ic.synthesizer().fail_copy(true);

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        let decision = ic.handle(EventKind::KeyDown, &MockEvent::new(KEY_A, 10), &ch);
        assert!(decision.is_pass_through());
        // The key still counts as a combo
        assert_eq!(ic.state(), State::Modified);
    }

    #[test]
    fn test_escape_failure_is_not_fatal() {
        let (mut ic, ch) = discrete();
        ic.synthesizer().fail_creation(true);

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        let up = ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 30), &ch);
        assert!(up.is_suppress());
        assert!(ic.synthesizer().posted().is_empty());
        assert_eq!(ic.state(), State::Idle);

        ic.synthesizer().fail_creation(false);
        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 100), &ch);
        ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 130), &ch);
        assert_eq!(ic.synthesizer().posted().len(), 2);
    }

    #[test]
    fn test_co_key_up_passes_through() {
        let (mut ic, ch) = discrete();
        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        ic.handle(EventKind::KeyDown, &MockEvent::new(KEY_A, 10), &ch);
        assert!(ic
            .handle(EventKind::KeyUp, &MockEvent::new(KEY_A, 20), &ch)
            .is_pass_through());
    }

    #[test]
    fn test_spurious_hyper_up_suppressed_without_escape() {
        let (mut ic, ch) = discrete();
        let up = ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 0), &ch);
        assert!(up.is_suppress());
        assert!(ic.synthesizer().posted().is_empty());
    }

    #[test]
    fn test_autorepeat_does_not_rearm() {
        let (mut ic, ch) = discrete();
        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        ic.handle(EventKind::KeyDown, &MockEvent::new(KEY_A, 10), &ch);

        let repeat = MockEvent::new(keycode::F18, 500).repeated();
        assert!(ic.handle(EventKind::KeyDown, &repeat, &ch).is_suppress());
        assert_eq!(ic.state(), State::Modified);

        ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 600), &ch);
        assert!(ic.synthesizer().posted().is_empty());
    }

    #[test]
    fn test_flags_changed_delivery() {
        let (mut ic, ch) = interceptor(flags_changed_config());

        let down = MockEvent::new(keycode::CAPS_LOCK, 0).with_flags(flags::ALPHA_SHIFT);
        assert!(ic.handle(EventKind::FlagsChanged, &down, &ch).is_suppress());
        assert!(ic.state() != State::Idle);

        let up = MockEvent::new(keycode::CAPS_LOCK, 50);
        assert!(ic.handle(EventKind::FlagsChanged, &up, &ch).is_suppress());
        assert_eq!(ic.synthesizer().posted().len(), 2);
    }

    #[test]
    fn test_flags_changed_ignores_discrete_shape() {
        let (mut ic, ch) = interceptor(flags_changed_config());
        let event = MockEvent::new(keycode::CAPS_LOCK, 0);
        assert!(ic.handle(EventKind::KeyUp, &event, &ch).is_pass_through());
        assert_eq!(ic.state(), State::Idle);
    }

    #[test]
    fn test_threshold_policy_long_hold() {
        let (mut ic, ch) = interceptor(Config {
            tap_policy: TapPolicy::Threshold(Duration::from_millis(200)),
            ..Config::default()
        });

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 350), &ch);
        assert!(ic.synthesizer().posted().is_empty());

        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 1_000), &ch);
        ic.handle(EventKind::KeyUp, &MockEvent::new(keycode::F18, 1_100), &ch);
        assert_eq!(ic.synthesizer().posted().len(), 2);
    }

    #[test]
    fn test_other_event_types_pass_through() {
        let (mut ic, ch) = discrete();
        ic.handle(EventKind::KeyDown, &MockEvent::new(keycode::F18, 0), &ch);
        let decision = ic.handle(EventKind::Other(14), &MockEvent::new(KEY_A, 5), &ch);
        assert!(decision.is_pass_through());
        assert!(matches!(ic.state(), State::Held { .. }));
    }
}
