//! Configuration values and validation

use std::time::Duration;

use crate::hotkey::keys::{hid_usage_for_keycode, keycode, HyperModifiers};
use crate::state::TapPolicy;

/// How the hyper key reaches the event tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeyDelivery {
    /// Key-down / key-up pair (hyper key remapped to a function key)
    #[default]
    Discrete,
    /// Modifier-flag-change event (raw Caps Lock)
    FlagsChanged,
}

impl KeyDelivery {
    /// Virtual key code used when none is configured
    pub fn default_keycode(self) -> u16 {
        match self {
            KeyDelivery::Discrete => keycode::F18,
            KeyDelivery::FlagsChanged => keycode::CAPS_LOCK,
        }
    }
}

/// The key treated as the hyper key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HyperKey {
    pub keycode: u16,
    pub delivery: KeyDelivery,
}

/// Runtime configuration, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub hyper_key: HyperKey,
    pub tap_policy: TapPolicy,
    pub modifiers: HyperModifiers,
    /// Remap Caps Lock onto the hyper key with `hidutil`
    pub remap: bool,
    /// Log at debug level
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hyper_key: HyperKey {
                keycode: keycode::F18,
                delivery: KeyDelivery::Discrete,
            },
            tap_policy: TapPolicy::Always,
            modifiers: HyperModifiers::CommandOption,
            remap: true,
            verbose: false,
        }
    }
}

/// Configuration rejected at startup
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tap threshold must be greater than zero")]
    ZeroThreshold,

    #[error("keycode {0} cannot be a remap target (use F13-F20 or --no-remap)")]
    UnsupportedRemapTarget(u16),

    #[error("the hidutil remap delivers a discrete key; use --no-remap with flags-changed delivery")]
    RemapWithFlagsChanged,
}

impl Config {
    /// Assemble and validate a configuration from raw option values
    pub fn build(
        delivery: KeyDelivery,
        keycode: Option<u16>,
        tap_threshold_ms: Option<u64>,
        full_hyper: bool,
        remap: bool,
        verbose: bool,
    ) -> Result<Self, ConfigError> {
        let tap_policy = match tap_threshold_ms {
            Some(0) => return Err(ConfigError::ZeroThreshold),
            Some(ms) => TapPolicy::Threshold(Duration::from_millis(ms)),
            None => TapPolicy::Always,
        };

        let config = Self {
            hyper_key: HyperKey {
                keycode: keycode.unwrap_or_else(|| delivery.default_keycode()),
                delivery,
            },
            tap_policy,
            modifiers: if full_hyper {
                HyperModifiers::Full
            } else {
                HyperModifiers::CommandOption
            },
            remap,
            verbose,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default log filter, used when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Check option combinations
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tap_policy == TapPolicy::Threshold(Duration::ZERO) {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.remap {
            if self.hyper_key.delivery == KeyDelivery::FlagsChanged {
                return Err(ConfigError::RemapWithFlagsChanged);
            }
            if hid_usage_for_keycode(self.hyper_key.keycode).is_none() {
                return Err(ConfigError::UnsupportedRemapTarget(self.hyper_key.keycode));
            }
        }
        Ok(())
    }
}
