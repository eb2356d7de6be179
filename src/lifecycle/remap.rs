//! Caps Lock remapping through `hidutil`
//!
//! The physical Caps Lock key is remapped to a function key so macOS never
//! toggles the Caps Lock state and the event tap sees a plain, distinct
//! key-down/key-up pair. The mapping is process-global and survives us, so
//! it must be restored on every exit path: [`RemapGuard`] restores on drop.

use std::process::{Command, ExitStatus};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::hotkey::keys::{hid_usage_for_keycode, HID_CAPS_LOCK};

/// Default location of the `hidutil` tool
pub const HIDUTIL: &str = "/usr/bin/hidutil";

/// One `UserKeyMapping` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyMapping {
    #[serde(rename = "HIDKeyboardModifierMappingSrc")]
    pub src: u64,
    #[serde(rename = "HIDKeyboardModifierMappingDst")]
    pub dst: u64,
}

#[derive(Debug, Serialize)]
struct UserKeyMapping<'a> {
    #[serde(rename = "UserKeyMapping")]
    mappings: &'a [KeyMapping],
}

/// Errors raised while applying or restoring the key mapping
#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("keycode {0} has no HID usage to remap to")]
    UnsupportedKeycode(u16),

    #[error("failed to encode key mapping: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// JSON payload for `hidutil property --set`
pub fn mapping_payload(mappings: &[KeyMapping]) -> Result<String, RemapError> {
    Ok(serde_json::to_string(&UserKeyMapping { mappings })?)
}

/// Runs `hidutil` to install and clear key mappings
#[derive(Debug, Clone)]
pub struct Remapper {
    program: String,
}

impl Default for Remapper {
    fn default() -> Self {
        Self::new(HIDUTIL)
    }
}

impl Remapper {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Remap Caps Lock onto `keycode` and return a guard that restores it
    pub fn apply(&self, keycode: u16) -> Result<RemapGuard, RemapError> {
        let dst = hid_usage_for_keycode(keycode).ok_or(RemapError::UnsupportedKeycode(keycode))?;
        self.set(&[KeyMapping {
            src: HID_CAPS_LOCK,
            dst,
        }])?;
        info!(keycode, "caps lock remapped");
        Ok(RemapGuard {
            remapper: self.clone(),
            restored: false,
        })
    }

    /// Clear all user key mappings
    pub fn restore(&self) -> Result<(), RemapError> {
        self.set(&[])?;
        info!("caps lock mapping restored");
        Ok(())
    }

    fn set(&self, mappings: &[KeyMapping]) -> Result<(), RemapError> {
        let payload = mapping_payload(mappings)?;
        debug!(program = %self.program, %payload, "setting key mapping");

        let status = Command::new(&self.program)
            .args(["property", "--set", payload.as_str()])
            .status()
            .map_err(|source| RemapError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(RemapError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Restores the original mapping when dropped
#[derive(Debug)]
pub struct RemapGuard {
    remapper: Remapper,
    restored: bool,
}

impl RemapGuard {
    /// Restore now, reporting failure to the caller
    pub fn restore(mut self) -> Result<(), RemapError> {
        self.restored = true;
        self.remapper.restore()
    }
}

impl Drop for RemapGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.remapper.restore() {
            warn!(?e, "failed to restore caps lock mapping");
        }
    }
}
