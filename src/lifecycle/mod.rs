//! Process lifecycle: permission check, Caps Lock remap, shutdown signals

#[cfg(target_os = "macos")]
pub mod permissions;
pub mod remap;
mod shutdown;

pub use remap::{RemapGuard, Remapper};
pub use shutdown::{ShutdownSignal, Signal, StopReason};
