// Accessibility permission check for macOS
// An active CGEventTap needs the process to be trusted for Accessibility.
// Checked once at startup; the system prompt is shown if it is missing.

use std::ffi::c_void;

use tracing::{error, info};

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: *const c_void) -> bool;

    static kAXTrustedCheckOptionPrompt: *const c_void;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFDictionaryCreate(
        allocator: *const c_void,
        keys: *const *const c_void,
        values: *const *const c_void,
        num_values: isize,
        key_callbacks: *const c_void,
        value_callbacks: *const c_void,
    ) -> *const c_void;

    fn CFRelease(cf: *const c_void);

    static kCFTypeDictionaryKeyCallBacks: c_void;
    static kCFTypeDictionaryValueCallBacks: c_void;
    static kCFBooleanTrue: *const c_void;
}

/// Check Accessibility permission, prompting the user if it is missing
fn is_trusted_with_prompt() -> bool {
    unsafe {
        let keys = [kAXTrustedCheckOptionPrompt];
        let values = [kCFBooleanTrue];

        let options = CFDictionaryCreate(
            std::ptr::null(),
            keys.as_ptr(),
            values.as_ptr(),
            1,
            &kCFTypeDictionaryKeyCallBacks as *const c_void,
            &kCFTypeDictionaryValueCallBacks as *const c_void,
        );

        let trusted = AXIsProcessTrustedWithOptions(options);

        if !options.is_null() {
            CFRelease(options);
        }

        trusted
    }
}

/// Returns `true` if the process may install an event tap.
///
/// Logs where to grant the permission otherwise.
pub fn ensure_accessibility() -> bool {
    let trusted = is_trusted_with_prompt();
    if trusted {
        info!("accessibility permission granted");
    } else {
        error!("accessibility permission required");
        error!("go to: System Settings -> Privacy & Security -> Accessibility");
        error!("enable this program, then restart it");
    }
    trusted
}
