//! [`bootldr_core::Platform`] wired to real ATmega32U4 registers: the USB
//! controller (via [`crate::usb::UsbStack`]), FLASH self-programming (SPM),
//! EEPROM, the boot-mode button and indicator LEDs on PORTB, the watchdog,
//! and `MCUCR` vector relocation.
//!
//! Pin assignment (button on PB5, LEDs on PB6/PB7) and the watchdog/vector
//! sequences below are carried over unchanged from the reference firmware's
//! `hw_init`/`bootldr_main`.

use avr_device::atmega32u4::Peripherals;
use bootldr_core::platform::PlatformError;
use bootldr_core::session::DfuSession;
use bootldr_core::{Indicators, Platform};

use crate::usb::UsbStack;

const SW_BTN: u8 = 1 << 5;
const LED_RED: u8 = 1 << 6;
const LED_BLUE: u8 = 1 << 7;

// SPMCSR bits (ATmega32U4 datasheet §27.7.2).
const SPMEN: u8 = 1 << 0;
const PGERS: u8 = 1 << 1;
const PGWRT: u8 = 1 << 2;
const RWWSRE: u8 = 1 << 4;

// WDTCSR bits.
const WDE: u8 = 1 << 3;
const WDCE: u8 = 1 << 4;

// MCUCR bits.
const IVCE: u8 = 1 << 0;
const IVSEL: u8 = 1 << 1;

// MCUSR bits.
const WDRF: u8 = 1 << 3;

pub struct AvrPlatform {
    dp: Peripherals,
    usb: UsbStack,
}

impl AvrPlatform {
    pub fn new(dp: Peripherals) -> Self {
        dp.PORTB.ddrb.modify(|r, w| unsafe { w.bits((r.bits() & !SW_BTN) | LED_RED | LED_BLUE) });
        Self { dp, usb: UsbStack::new() }
    }

    fn wait_spm_ready(&self) {
        while self.dp.CPU.spmcsr.read().bits() & SPMEN != 0 {}
    }
}

impl Indicators for AvrPlatform {
    fn set_red(&mut self, on: bool) {
        Leds.set_red(on);
    }

    fn set_blue(&mut self, on: bool) {
        Leds.set_blue(on);
    }
}

impl Platform for AvrPlatform {
    fn in_endpoint_ready(&self) -> bool {
        self.usb.in_ready(&self.dp)
    }

    fn write_in(&mut self, data: &[u8]) {
        self.usb.write_in(&self.dp, data);
    }

    fn out_packet_ready(&self) -> bool {
        self.usb.out_ready(&self.dp)
    }

    fn read_out(&mut self, buf: &mut [u8]) -> usize {
        self.usb.read_out(&self.dp, buf)
    }

    fn flash_read_byte(&self, addr: u16) -> u8 {
        let byte: u8;
        unsafe {
            core::arch::asm!(
                "lpm {byte}, Z",
                byte = out(reg) byte,
                in("Z") addr,
            );
        }
        byte
    }

    fn flash_erase_page(&mut self, addr: u16) -> Result<(), PlatformError> {
        self.wait_spm_ready();
        self.dp.CPU.spmcsr.write(|w| unsafe { w.bits(PGERS | SPMEN) });
        unsafe { core::arch::asm!("spm", in("Z") addr) };
        self.wait_spm_ready();
        Ok(())
    }

    fn flash_fill_word(&mut self, word_offset: u16, word: u16) {
        self.wait_spm_ready();
        self.dp.CPU.spmcsr.write(|w| unsafe { w.bits(SPMEN) });
        // r0/r1 are the AVR backend's reserved temp/zero registers and can't
        // be named as explicit asm! operands; stage the word into a general
        // register pair with `movw` instead, then restore r1 = 0 afterward.
        unsafe {
            core::arch::asm!(
                "movw r0, {word}",
                "spm",
                "clr r1",
                word = in(reg_pair) word,
                in("Z") word_offset.wrapping_mul(2),
                out("r0") _,
                out("r1") _,
            );
        }
    }

    fn flash_write_page(&mut self, addr: u16) -> Result<(), PlatformError> {
        self.wait_spm_ready();
        self.dp.CPU.spmcsr.write(|w| unsafe { w.bits(PGWRT | SPMEN) });
        unsafe { core::arch::asm!("spm", in("Z") addr) };
        self.wait_spm_ready();
        Ok(())
    }

    fn flash_enable_rww(&mut self) {
        self.wait_spm_ready();
        self.dp.CPU.spmcsr.write(|w| unsafe { w.bits(RWWSRE | SPMEN) });
        unsafe { core::arch::asm!("spm") };
        self.wait_spm_ready();
    }

    fn eeprom_read_byte(&self, addr: u16) -> u8 {
        let ee = &self.dp.EEPROM;
        while ee.eecr.read().eepe().bit_is_set() {}
        ee.eear.write(|w| unsafe { w.bits(addr) });
        ee.eecr.modify(|_, w| w.eere().set_bit());
        ee.eedr.read().bits()
    }

    fn eeprom_write_byte(&mut self, addr: u16, value: u8) -> Result<(), PlatformError> {
        let ee = &self.dp.EEPROM;
        while ee.eecr.read().eepe().bit_is_set() {}
        ee.eear.write(|w| unsafe { w.bits(addr) });
        ee.eedr.write(|w| unsafe { w.bits(value) });
        ee.eecr.modify(|_, w| w.eempe().set_bit());
        ee.eecr.modify(|_, w| w.eepe().set_bit());
        while ee.eecr.read().eepe().bit_is_set() {}
        Ok(())
    }

    fn button_pressed(&self) -> bool {
        self.dp.PORTB.pinb.read().bits() & SW_BTN == 0
    }

    fn watchdog_disable(&mut self) {
        self.dp.CPU.mcusr.modify(|r, w| unsafe { w.bits(r.bits() & !WDRF) });
        self.dp.CPU.wdtcsr.modify(|r, w| unsafe { w.bits(r.bits() | WDCE | WDE) });
        self.dp.CPU.wdtcsr.write(|w| unsafe { w.bits(0) });
    }

    fn watchdog_reset_now(&mut self) -> ! {
        self.dp.CPU.wdtcsr.modify(|r, w| unsafe { w.bits(r.bits() | WDCE | WDE) });
        // WDP = 0b0000: shortest available timeout (~16ms).
        self.dp.CPU.wdtcsr.write(|w| unsafe { w.bits(WDE) });
        loop {}
    }

    fn relocate_vectors_to_bootloader(&mut self) {
        self.dp.CPU.mcucr.write(|w| unsafe { w.bits(IVCE) });
        self.dp.CPU.mcucr.write(|w| unsafe { w.bits(IVSEL) });
    }

    fn relocate_vectors_to_application(&mut self) {
        self.dp.CPU.mcucr.write(|w| unsafe { w.bits(IVCE) });
        self.dp.CPU.mcucr.write(|w| unsafe { w.bits(0) });
    }

    fn start_tick(&mut self) {
        // CS11|CS10: clk/64 prescaler. TOIE1: overflow interrupt enabled.
        // A few Hz at 16MHz, matching IDLE_RELOAD's multi-second budget.
        self.dp.TC1.tccr1b.write(|w| unsafe { w.bits(0b011) });
        self.dp.TC1.timsk1.write(|w| unsafe { w.bits(1) });
    }

    fn global_interrupts_enable(&mut self) {
        unsafe { avr_device::interrupt::enable() };
    }

    fn global_interrupts_disable(&mut self) {
        avr_device::interrupt::disable();
    }

    fn usb_init(&mut self) {
        self.usb.init(&self.dp);
    }

    fn usb_disable(&mut self) {
        self.usb.disable(&self.dp);
    }

    fn service_usb(&mut self, session: &mut DfuSession<'_>) {
        self.usb.poll(&self.dp);
        if let Some(setup) = self.usb.take_pending_setup() {
            match bootldr_core::control::on_control_request(session, &mut *self, &setup) {
                Some(resp) => self.usb.send_control_response(&self.dp, resp.as_bytes()),
                None => self.usb.stall_control(&self.dp),
            }
        }
    }

    fn debounce_delay(&mut self) {
        for _ in 0..500u16 {
            for _ in 0..500u16 {
                unsafe { core::arch::asm!("nop") };
            }
        }
    }

    fn jump_to_application(&mut self) -> ! {
        unsafe { core::arch::asm!("jmp 0x0000", options(noreturn)) }
    }
}

/// A zero-sized handle onto the two indicator LEDs, independent of
/// [`AvrPlatform`]. `Peripherals::steal()` is sound here for the same reason
/// it is in `main()`: PORTB's output-data register is single-byte-write
/// hardware with no driver-side state to race, and this handle only ever
/// touches the LED bits the foreground's `AvrPlatform` never writes outside
/// of `set_red`/`set_blue`, which the ISR no longer calls through it.
pub struct Leds;

impl Indicators for Leds {
    fn set_red(&mut self, on: bool) {
        let dp = unsafe { Peripherals::steal() };
        if on {
            dp.PORTB.portb.modify(|r, w| unsafe { w.bits(r.bits() | LED_RED) });
        } else {
            dp.PORTB.portb.modify(|r, w| unsafe { w.bits(r.bits() & !LED_RED) });
        }
    }

    fn set_blue(&mut self, on: bool) {
        let dp = unsafe { Peripherals::steal() };
        if on {
            dp.PORTB.portb.modify(|r, w| unsafe { w.bits(r.bits() | LED_BLUE) });
        } else {
            dp.PORTB.portb.modify(|r, w| unsafe { w.bits(r.bits() & !LED_BLUE) });
        }
    }
}
