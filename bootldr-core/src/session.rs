//! The DFU session: process-wide mutable protocol state.
//!
//! [`SessionFlags`] holds exactly the fields the idle/indicator ticker
//! touches from interrupt context (`active`, `idle_ticks`, the pending
//! red-pulse flag), in its own allocation separate from [`DfuSession`].
//! `DfuSession` only ever borrows a `SessionFlags` through a shared
//! reference, never owns it inline, so a platform binary can give its
//! timer interrupt a `&'static SessionFlags` of its own without that
//! reference ever aliasing the foreground's exclusive `&mut DfuSession` —
//! the two borrow disjoint memory, not the same struct through two paths.
//! Everything else on `DfuSession` is owned exclusively by the foreground
//! (control-request handler and bulk pump) and needs no synchronization.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::consts::{err, IDLE_RELOAD, MAX_PAGE};
use crate::region::{MemKind, FLASH_REGION};

/// The atomics shared between the foreground and the idle/indicator ticker.
///
/// Every method takes `&self`: a platform binary's foreground code and its
/// timer interrupt can each hold their own shared reference to the same
/// `SessionFlags` value and touch it concurrently, since nothing ever forms
/// an exclusive `&mut SessionFlags` over it.
pub struct SessionFlags {
    active: AtomicBool,
    idle_ticks: AtomicU8,
    red_pulse: AtomicBool,
}

impl SessionFlags {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            idle_ticks: AtomicU8::new(IDLE_RELOAD),
            red_pulse: AtomicBool::new(false),
        }
    }

    /// Whether the event loop should keep running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Ends the session. Called by RESET (foreground) and by the ticker on
    /// idle timeout (ISR); either writer only ever transitions true -> false.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.idle_ticks.store(0, Ordering::Relaxed);
    }

    /// Reinitializes all three fields as if freshly constructed. A platform
    /// binary whose `'static` `SessionFlags` outlives a single session (an
    /// application re-entering DFU via `enter_bootloader` without a
    /// hardware reset) calls this before starting a new one, so stale
    /// `active=false`/`idle_ticks=0` from the session that just ended
    /// doesn't leak into the next.
    pub fn reset(&self) {
        self.active.store(true, Ordering::Relaxed);
        self.idle_ticks.store(IDLE_RELOAD, Ordering::Relaxed);
        self.red_pulse.store(false, Ordering::Relaxed);
    }

    pub(crate) fn reset_idle(&self) {
        self.idle_ticks.store(IDLE_RELOAD, Ordering::Relaxed);
    }

    pub(crate) fn pulse_red(&self) {
        self.red_pulse.store(true, Ordering::Relaxed);
    }

    /// Reads and clears the pending red-pulse flag; only the ticker calls this.
    pub(crate) fn take_red_pulse(&self) -> bool {
        self.red_pulse.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn idle_ticks_remaining(&self) -> u8 {
        self.idle_ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn decrement_idle(&self) {
        let ticks = self.idle_ticks.load(Ordering::Relaxed);
        self.idle_ticks.store(ticks.saturating_sub(1), Ordering::Relaxed);
    }
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DfuSession<'f> {
    pub mem_kind: MemKind,
    pub addr: u16,
    pub page_size: u16,
    pub total_size: u16,
    pub writable_upper_bound: u16,
    pub page_buf: [u8; MAX_PAGE],
    pub fill: u16,
    pub read_remaining: u16,
    pub last_err: u8,

    flags: &'f SessionFlags,
}

impl<'f> DfuSession<'f> {
    /// A fresh session: FLASH selected, address 0, borrowing `flags` for
    /// its ISR-visible state (already fully loaded by `SessionFlags::new`
    /// or a prior `SessionFlags::reset`).
    pub fn new(flags: &'f SessionFlags) -> Self {
        Self {
            mem_kind: FLASH_REGION.kind,
            addr: 0,
            page_size: FLASH_REGION.page_size,
            total_size: FLASH_REGION.total_size,
            writable_upper_bound: FLASH_REGION.writable_upper_bound,
            page_buf: [0; MAX_PAGE],
            fill: 0,
            read_remaining: 0,
            last_err: err::OK,
            flags,
        }
    }

    /// Whether the event loop should keep running.
    pub fn is_active(&self) -> bool {
        self.flags.is_active()
    }

    /// Ends the session. Called by RESET (foreground); the ticker ends it
    /// independently through its own `&SessionFlags` on idle timeout.
    pub fn deactivate(&self) {
        self.flags.deactivate()
    }

    pub(crate) fn reset_idle(&self) {
        self.flags.reset_idle()
    }

    pub(crate) fn pulse_red(&self) {
        self.flags.pulse_red()
    }
}
