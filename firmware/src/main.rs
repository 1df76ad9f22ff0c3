#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]
#![feature(asm_experimental_arch)]

mod platform;
mod usb;

use avr_device::atmega32u4::Peripherals;
use avr_device::interrupt::Mutex;
use bootldr_core::boot;
use bootldr_core::session::SessionFlags;
use bootldr_core::ticker::{self, Ticker};
use core::cell::RefCell;

use platform::{AvrPlatform, Leds};

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

/// The idle/indicator ticker's only interrupt-visible state. Lives for the
/// whole program rather than inside the foreground's `DfuSession`, so the
/// timer interrupt only ever borrows this `&SessionFlags` and never
/// reconstructs a reference into memory the foreground holds an exclusive
/// borrow of for the life of a session.
static SESSION_FLAGS: SessionFlags = SessionFlags::new();
static TICKER: Mutex<RefCell<Ticker>> = Mutex::new(RefCell::new(Ticker::new()));

#[no_mangle]
pub extern "C" fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };
    let mut platform = AvrPlatform::new(dp);

    SESSION_FLAGS.reset();
    boot::decide_and_enter(&mut platform, &SESSION_FLAGS)
}

/// Re-entry point for an already-running application (no reset needed).
#[no_mangle]
pub extern "C" fn enter_bootloader() -> ! {
    let dp = unsafe { Peripherals::steal() };
    let mut platform = AvrPlatform::new(dp);

    SESSION_FLAGS.reset();
    boot::enter_bootloader(&mut platform, &SESSION_FLAGS)
}

#[avr_device::interrupt(atmega32u4)]
fn TIMER1_OVF() {
    avr_device::interrupt::free(|cs| {
        let mut ticker = TICKER.borrow(cs).borrow_mut();
        ticker::on_tick(&mut ticker, &SESSION_FLAGS, &mut Leds);
    });
}
