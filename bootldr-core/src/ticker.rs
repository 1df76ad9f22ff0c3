//! The idle/indicator ticker: runs in interrupt context at a fixed rate
//! derived from the platform timer, decrementing the idle timeout and
//! driving the two indicator LEDs.
//!
//! Takes the session's [`SessionFlags`] directly rather than a whole
//! [`crate::session::DfuSession`], and an [`Indicators`] rather than a
//! whole [`crate::platform::Platform`]: both are the minimum a timer
//! interrupt needs, so a platform binary can hand its ISR its own
//! `&SessionFlags`/indicator handle without that ISR ever reconstructing a
//! reference to whatever object the foreground loop holds an exclusive
//! borrow of for the rest of the session.

use crate::platform::Indicators;
use crate::session::SessionFlags;

/// Owns the blink phase. One instance lives for the life of a DFU session,
/// typically in a `static` the timer interrupt vector reaches into.
pub struct Ticker {
    blue_phase: u8,
    blue_on: bool,
}

impl Ticker {
    pub const fn new() -> Self {
        Self { blue_phase: 0, blue_on: false }
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

/// One tick: ends the session on timeout, otherwise drives the indicators
/// and decrements `idle_ticks`.
pub fn on_tick(ticker: &mut Ticker, flags: &SessionFlags, indicators: &mut impl Indicators) {
    if flags.idle_ticks_remaining() == 0 {
        flags.deactivate();
        return;
    }

    indicators.set_red(flags.take_red_pulse());

    ticker.blue_phase += 1;
    if ticker.blue_phase == 3 {
        ticker.blue_phase = 0;
        ticker.blue_on = !ticker.blue_on;
        indicators.set_blue(ticker.blue_on);
    }

    flags.decrement_idle();
}
