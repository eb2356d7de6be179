//! Keyboard event tap using macOS CGEventTap
//!
//! Installs an active (filtering) tap for key-down, key-up and flags-changed
//! events. Runs on a dedicated thread with its own CFRunLoop; the tap
//! callback executes on that thread, one event at a time.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy,
};
use foreign_types::ForeignType;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::cg::CgSynthesizer;
use super::interceptor::{InterceptionChannel, Interceptor};
use crate::config::Config;
use crate::events::{Decision, EventKind};

type CGEventMask = u64;

/// Raw callback signature; the event type is taken as `u32` because the OS
/// also delivers values outside `CGEventType` (tap-disabled notifications).
type TapCallback = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: u32,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortInvalidate(port: CFMachPortRef);
}

const KEY_DOWN: u32 = 10;
const KEY_UP: u32 = 11;
const FLAGS_CHANGED: u32 = 12;

/// Run loop slice between checks of the running flag
const RUN_SLICE: Duration = Duration::from_millis(100);

/// Errors that can occur in the event tap listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("event tap is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to create run loop source")]
    RunLoopSource,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("listener thread exited before the tap was ready")]
    ThreadExited,
}

/// Owns the event tap thread
pub struct TapListener {
    config: Config,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    /// Signalled (or dropped) when the tap thread ends
    exited: Option<oneshot::Receiver<()>>,
}

impl TapListener {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            exited: None,
        }
    }

    /// Start the event tap.
    ///
    /// Blocks until the tap thread has either installed the tap or failed
    /// to, so a missing permission surfaces here rather than later.
    pub fn start(&mut self) -> Result<(), ListenerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || {
                info!("event tap thread started");

                run_event_loop(&config, &running, ready_tx);

                running.store(false, Ordering::SeqCst);
                info!("event tap thread stopped");
                let _ = exit_tx.send(());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(ListenerError::ThreadSpawn(e.to_string()));
            }
        };
        self.thread = Some(handle);
        self.exited = Some(exit_rx);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.join();
                Err(e)
            }
            Err(_) => {
                self.join();
                Err(ListenerError::ThreadExited)
            }
        }
    }

    /// Stop the event tap.
    ///
    /// The tap thread disables the tap, removes its run loop source and
    /// invalidates the port before this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Resolves once the tap thread has ended, including by panic.
    ///
    /// Cancel-safe; returns immediately if the listener never started.
    pub async fn exited(&mut self) {
        if let Some(exited) = self.exited.as_mut() {
            let _ = exited.await;
            self.exited = None;
        }
    }

    /// Check if the tap thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn join(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        // No deadline: the caller restores the key mapping next, which must
        // not happen while the tap can still see events
        if handle.join().is_err() {
            error!("event tap thread panicked");
        }
    }
}

impl Drop for TapListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State reachable from the tap callback through `user_info`
struct TapContext {
    interceptor: Interceptor<CgSynthesizer>,
    port: CFMachPortRef,
}

/// Re-enables the tap through its mach port
struct PortChannel(CFMachPortRef);

impl InterceptionChannel for PortChannel {
    fn reenable(&self) {
        if !self.0.is_null() {
            unsafe { CGEventTapEnable(self.0, true) };
        }
    }
}

/// Tap callback.
///
/// Returns the original event pointer to pass through, a new +1 event to
/// substitute, or null to suppress.
unsafe extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event_ref: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void {
    if user_info.is_null() {
        return event_ref;
    }
    let context = &mut *(user_info as *mut TapContext);
    let channel = PortChannel(context.port);
    let kind = EventKind::from_raw(event_type);

    if event_ref.is_null() {
        // Nothing to classify, but a disabled tap still has to come back
        if kind.is_tap_disabled() {
            channel.reenable();
        }
        return event_ref;
    }

    // Borrowed from the OS: never released here
    let event = ManuallyDrop::new(CGEvent::from_ptr(event_ref as *mut _));

    let decision = catch_unwind(AssertUnwindSafe(|| {
        context.interceptor.handle(kind, &*event, &channel)
    }));

    match decision {
        Ok(Decision::Suppress) => ptr::null_mut(),
        Ok(Decision::PassThrough) => event_ref,
        Ok(Decision::Substitute(replacement)) => {
            ManuallyDrop::new(replacement).as_ptr() as *mut c_void
        }
        Err(e) => {
            error!(?e, "event tap callback panicked, passing event through");
            event_ref
        }
    }
}

/// Install the tap and run the CFRunLoop until `running` is cleared
fn run_event_loop(
    config: &Config,
    running: &AtomicBool,
    ready_tx: mpsc::Sender<Result<(), ListenerError>>,
) {
    let event_mask: CGEventMask = (1 << KEY_DOWN) | (1 << KEY_UP) | (1 << FLAGS_CHANGED);

    let context = Box::into_raw(Box::new(TapContext {
        interceptor: Interceptor::new(config, CgSynthesizer::new()),
        port: ptr::null_mut(),
    }));

    let tap_ref = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            event_mask,
            tap_callback,
            context as *mut c_void,
        )
    };

    if tap_ref.is_null() {
        error!("failed to create event tap - is Accessibility permission granted?");
        unsafe { drop(Box::from_raw(context)) };
        let _ = ready_tx.send(Err(ListenerError::EventTapCreation));
        return;
    }

    // Callbacks only run inside the run loop below, on this thread
    unsafe { (*context).port = tap_ref };
    let mach_port = unsafe { CFMachPort::wrap_under_create_rule(tap_ref) };

    let run_loop_source = match mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            error!("failed to create run loop source for event tap");
            unsafe {
                CFMachPortInvalidate(tap_ref);
                drop(Box::from_raw(context));
            }
            let _ = ready_tx.send(Err(ListenerError::RunLoopSource));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        CGEventTapEnable(tap_ref, true);
    }

    info!(
        keycode = config.hyper_key.keycode,
        delivery = ?config.hyper_key.delivery,
        modifiers = ?config.modifiers,
        tap_policy = ?config.tap_policy,
        "event tap created and enabled"
    );
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_SLICE, false);
        }
    }

    // Teardown order: disable, remove, invalidate
    unsafe {
        CGEventTapEnable(tap_ref, false);
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
        CFMachPortInvalidate(mach_port.as_concrete_TypeRef());
    }
    drop(run_loop_source);
    drop(mach_port);

    let context = unsafe { Box::from_raw(context) };
    debug!(
        recoveries = context.interceptor.recoveries(),
        "event tap removed"
    );
}
