//! The platform façade: everything the protocol core treats as an external
//! collaborator — USB endpoint primitives, FLASH/EEPROM self-programming
//! primitives, button/LED GPIO, watchdog, vector relocation, and the tick.
//!
//! `firmware` implements this trait against real ATmega32U4 registers.
//! `bootldr-core`'s own test suite implements it against an in-memory mock
//! (see `tests/helpers`), so the protocol logic below never runs on target
//! silicon to be exercised.

use crate::session::DfuSession;

/// A platform primitive could not complete (e.g. a mock in tests simulating
/// a flash write failure; on real silicon the "safe" SPM/EEPROM primitives
/// this trait wraps are expected to always eventually succeed, so this
/// exists mainly for host-side test doubles).
///
/// This never reaches the wire directly — the closed `last_err` taxonomy of
/// [`crate::consts::err`] has no slot for it. [`crate::control`] maps any
/// `Err` returned here to `ERR_OVERFLOW`, the closest existing code to "the
/// commit did not happen."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformError;

/// The two indicator LEDs the idle/indicator ticker drives each tick.
///
/// Split out of [`Platform`] so a platform binary's timer interrupt can
/// implement this on its own small, independent type (typically a
/// zero-sized handle that re-derives register access on every call) instead
/// of reaching into whatever object the foreground loop holds an exclusive
/// borrow of for the rest of a DFU session.
pub trait Indicators {
    fn set_red(&mut self, on: bool);
    fn set_blue(&mut self, on: bool);
}

/// Hardware access required to run a DFU session.
///
/// No method here encodes DFU semantics; that all lives in
/// [`crate::control`], [`crate::bulk`], [`crate::ticker`], and [`crate::boot`].
pub trait Platform: Indicators {
    // --- Bulk endpoint primitives (vendor bulk IN/OUT data phases) ---

    /// True if the bulk IN endpoint can accept a new chunk.
    fn in_endpoint_ready(&self) -> bool;
    /// Hands a chunk of up to `DFU_READ_SIZE` bytes to the bulk IN endpoint.
    fn write_in(&mut self, data: &[u8]);
    /// True if the bulk OUT endpoint has a received packet waiting.
    fn out_packet_ready(&self) -> bool;
    /// Copies up to `buf.len()` bytes from the pending OUT packet into `buf`
    /// and releases the endpoint. Returns the number of bytes copied.
    fn read_out(&mut self, buf: &mut [u8]) -> usize;

    // --- FLASH self-programming primitives ---

    /// Program-memory fetch of a single byte at a FLASH byte address.
    fn flash_read_byte(&self, addr: u16) -> u8;
    /// Erases the page containing `addr`. Blocks until the erase completes.
    fn flash_erase_page(&mut self, addr: u16) -> Result<(), PlatformError>;
    /// Stages one 16-bit word (two bytes, little-endian) at `word_offset`
    /// words into the page buffer being assembled for the next write.
    fn flash_fill_word(&mut self, word_offset: u16, word: u16);
    /// Commits the staged words to the page containing `addr`. Blocks until
    /// the write completes.
    fn flash_write_page(&mut self, addr: u16) -> Result<(), PlatformError>;
    /// Re-enables the read-while-write section after a page write.
    fn flash_enable_rww(&mut self);

    // --- EEPROM primitives ---

    fn eeprom_read_byte(&self, addr: u16) -> u8;
    /// Blocks until the byte is committed.
    fn eeprom_write_byte(&mut self, addr: u16, value: u8) -> Result<(), PlatformError>;

    // --- GPIO: the boot-mode button ---

    /// True when the boot-mode button is held (active-low already resolved).
    fn button_pressed(&self) -> bool;

    // --- Watchdog ---

    /// Clears any watchdog-reset flag and disables the watchdog.
    fn watchdog_disable(&mut self);
    /// Arms the shortest available watchdog timeout and spins until it fires.
    fn watchdog_reset_now(&mut self) -> !;

    // --- Interrupt-vector relocation ---

    /// Two-phase change-enable/select write, issued back-to-back.
    fn relocate_vectors_to_bootloader(&mut self);
    fn relocate_vectors_to_application(&mut self);

    // --- Tick / global interrupts ---

    /// Starts the periodic timer that drives the idle/indicator ticker.
    fn start_tick(&mut self);
    fn global_interrupts_enable(&mut self);
    fn global_interrupts_disable(&mut self);

    // --- USB stack lifecycle ---

    fn usb_init(&mut self);
    fn usb_disable(&mut self);

    /// Lets the external USB device stack run its state machine for one
    /// iteration: service standard requests, and for any pending vendor
    /// SETUP on the DFU interface, dispatch it through
    /// [`crate::control::on_control_request`] before returning.
    fn service_usb(&mut self, session: &mut DfuSession<'_>);

    // --- Misc ---

    /// Coarse busy-wait long enough to debounce the boot-mode button.
    fn debounce_delay(&mut self);
    /// Jumps to the application entry point at address 0. Never returns.
    fn jump_to_application(&mut self) -> !;
}
