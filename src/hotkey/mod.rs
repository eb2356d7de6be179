//! Hotkey module: hyper key interception and event synthesis
//!
//! The decision logic (`interceptor`) and the synthesis contract
//! (`synthesizer`) are platform-neutral. The CGEventTap listener and the
//! CoreGraphics synthesizer are macOS-only.

pub mod interceptor;
pub mod keys;
pub mod synthesizer;

#[cfg(test)]
pub mod mock;

#[cfg(target_os = "macos")]
mod cg;
#[cfg(target_os = "macos")]
mod listener;

pub use interceptor::{InterceptionChannel, Interceptor};

#[cfg(target_os = "macos")]
pub use listener::{ListenerError, TapListener};
