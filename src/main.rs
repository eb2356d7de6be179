//! hyperesc: Caps Lock as Escape on tap, Hyper modifier on hold
//!
//! A short, isolated press of Caps Lock emits Escape. Holding Caps Lock
//! while pressing another key sends that key with Command+Option (or
//! Command+Option+Control+Shift) added. Everything else passes through.
//!
//! Startup:
//! - Accessibility permission check (prompts if missing)
//! - Caps Lock remapped to F18 via `hidutil` so the lock state never toggles
//! - CGEventTap installed on a dedicated run loop thread
//!
//! Shutdown on SIGINT/SIGTERM, or when the tap thread ends on its own: the
//! tap is disabled, removed and invalidated before the original key mapping
//! is restored.

#![cfg_attr(not(target_os = "macos"), allow(dead_code, unused_imports))]

mod config;
mod events;
mod hotkey;
mod lifecycle;
mod state;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ConfigError, KeyDelivery};

/// Caps Lock as Escape on tap, Hyper modifier on hold.
#[derive(Debug, Parser)]
#[command(name = "hyperesc", version, about)]
struct Cli {
    /// Use the full hyper combination (Cmd+Opt+Ctrl+Shift) instead of Cmd+Opt
    #[arg(short, long, env = "HYPERESC_FULL_HYPER")]
    full_hyper: bool,

    /// Enable verbose debug output
    #[arg(short, long, env = "HYPERESC_VERBOSE")]
    verbose: bool,

    /// Only emit Escape if the key is released within this many milliseconds.
    ///
    /// Without it, every clean tap emits Escape however long it is held.
    #[arg(short, long, value_name = "MS", env = "HYPERESC_TAP_THRESHOLD_MS")]
    tap_threshold: Option<u64>,

    /// How the hyper key reaches the event tap
    #[arg(long, value_enum, default_value_t = KeyDelivery::Discrete, env = "HYPERESC_DELIVERY")]
    delivery: KeyDelivery,

    /// Virtual keycode of the hyper key [default: 79 (F18) for discrete, 57 (Caps Lock) for flags-changed]
    #[arg(long, env = "HYPERESC_KEYCODE")]
    keycode: Option<u16>,

    /// Do not remap Caps Lock with hidutil (the mapping is managed elsewhere)
    #[arg(long, env = "HYPERESC_NO_REMAP")]
    no_remap: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config, ConfigError> {
        Config::build(
            self.delivery,
            self.keycode,
            self.tap_threshold,
            self.full_hyper,
            !self.no_remap,
            self.verbose,
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();

    // Config errors are reported at the default level
    init_logging(config.as_ref().map_or("info", Config::log_level));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(%e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr. RUST_LOG wins over `default_level`.
fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(target_os = "macos")]
async fn run(config: Config) -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing::info;

    use crate::hotkey::TapListener;
    use crate::lifecycle::{permissions, Remapper, ShutdownSignal, StopReason};

    info!(
        version = env!("CARGO_PKG_VERSION"),
        full_hyper = config.modifiers == hotkey::keys::HyperModifiers::Full,
        "hyperesc starting"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to install signal handlers")?;

    if !permissions::ensure_accessibility() {
        anyhow::bail!("accessibility permission not granted");
    }

    // Dropped (and restored) on every early return below
    let remap = if config.remap {
        let guard = Remapper::default()
            .apply(config.hyper_key.keycode)
            .context("failed to remap caps lock via hidutil")?;
        Some(guard)
    } else {
        info!("skipping caps lock remap");
        None
    };

    let mut listener = TapListener::new(config.clone());
    listener.start().context("failed to start event tap")?;

    info!("hyperesc running, press Ctrl+C to stop");

    let reason = shutdown.wait_or(listener.exited()).await;
    match reason {
        StopReason::Signal(signal) => info!(?signal, "shutting down..."),
        StopReason::ListenerExited => error!("event tap thread exited, shutting down"),
    }

    // Tap teardown completes before the mapping is restored
    listener.stop();

    if let Some(guard) = remap {
        if let Err(e) = guard.restore() {
            error!(?e, "failed to restore caps lock mapping");
        }
    }

    if reason == StopReason::ListenerExited {
        anyhow::bail!("event tap stopped unexpectedly");
    }

    info!("hyperesc stopped");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn run(_config: Config) -> anyhow::Result<()> {
    anyhow::bail!("hyperesc requires macOS (CGEventTap)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::{keycode, HyperModifiers};
    use crate::state::TapPolicy;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["hyperesc"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::try_parse_from(["hyperesc", "-f", "-v", "-t", "250"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.modifiers, HyperModifiers::Full);
        assert!(config.verbose);
        assert_eq!(
            config.tap_policy,
            TapPolicy::Threshold(std::time::Duration::from_millis(250))
        );
    }

    #[test]
    fn test_cli_flags_changed_delivery() {
        let cli =
            Cli::try_parse_from(["hyperesc", "--delivery", "flags-changed", "--no-remap"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.hyper_key.keycode, keycode::CAPS_LOCK);
        assert!(!config.remap);
    }

    #[test]
    fn test_cli_rejects_unknown_option() {
        assert!(Cli::try_parse_from(["hyperesc", "--bogus"]).is_err());
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
