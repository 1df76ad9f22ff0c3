//! Boot arbiter and event loop: decides DFU-vs-application at reset and
//! drives the DFU session once entered.
//!
//! The platform binary's `main` calls [`decide_and_enter`] once at startup;
//! an already-running application can call [`enter_bootloader`] to jump
//! straight into a DFU session without a reset. Both are thin wrappers
//! around [`run_dfu`] and take the caller's `&SessionFlags` rather than
//! constructing their own: the idle/indicator ticker (see [`crate::ticker`])
//! runs in interrupt context against that same `SessionFlags`, and a
//! stack-local one it can never reach would leave the idle-timeout path
//! permanently unreachable. The caller owns the `SessionFlags` storage
//! (typically a `'static`) and should call `SessionFlags::reset` on it
//! before a re-entry if it may have been left inactive by a prior session.

use crate::bulk;
use crate::platform::Platform;
use crate::session::{DfuSession, SessionFlags};

/// Reset-time arbitration: disable the watchdog, debounce the boot button,
/// then either run a DFU session (never returns) or jump to the
/// application (never returns either).
pub fn decide_and_enter(platform: &mut impl Platform, flags: &SessionFlags) -> ! {
    platform.watchdog_disable();
    platform.debounce_delay();

    if platform.button_pressed() {
        let mut session = DfuSession::new(flags);
        run_dfu(platform, &mut session)
    } else {
        platform.jump_to_application()
    }
}

/// Re-enters DFU without a reset. The caller (the application image) is
/// responsible for its own hardware teardown before calling this.
pub fn enter_bootloader(platform: &mut impl Platform, flags: &SessionFlags) -> ! {
    let mut session = DfuSession::new(flags);
    run_dfu(platform, &mut session)
}

/// The DFU entry ritual, the event loop, and the exit ritual, against a
/// session the caller owns. Exits only by watchdog reset.
pub fn run_dfu(platform: &mut impl Platform, session: &mut DfuSession<'_>) -> ! {
    platform.relocate_vectors_to_bootloader();
    platform.start_tick();
    platform.usb_init();
    platform.global_interrupts_enable();

    while session.is_active() {
        platform.service_usb(session);
        bulk::pump(session, platform);
    }

    platform.global_interrupts_disable();
    platform.usb_disable();
    platform.relocate_vectors_to_application();
    platform.watchdog_reset_now()
}
