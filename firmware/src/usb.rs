//! ATmega32U4 USB device driver for the DFU vendor interface.
//!
//! Handles enumeration and the EP0 control endpoint itself (descriptors,
//! `SET_ADDRESS`, `SET_CONFIGURATION`); vendor-class SETUPs are handed back
//! to the caller as a [`bootldr_core::control::SetupPacket`] so they can be
//! run through `bootldr_core::control::on_control_request` against the
//! shared `DfuSession`. Bulk EP1 IN / EP2 OUT are plain register pokes, one
//! endpoint select away from `hid.rs`'s interrupt-endpoint handling in the
//! sibling keyboard firmware this crate was built from.

use avr_device::atmega32u4::Peripherals;
use bootldr_core::control::SetupPacket;
use bootldr_core::descriptors;

const EP0_SIZE: u8 = 32;
const EP_BULK_IN: u8 = 1;
const EP_BULK_OUT: u8 = 2;

const BM_VENDOR_MASK: u8 = 0x60;
const BM_VENDOR: u8 = 0x40;

pub struct UsbStack {
    configured: bool,
    pending_vendor_setup: Option<SetupPacket>,
}

impl UsbStack {
    pub const fn new() -> Self {
        Self { configured: false, pending_vendor_setup: None }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Pad regulator, PLL (16MHz crystal -> 48MHz USB clock), attach.
    pub fn init(&mut self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        usb.uhwcon.write(|w| w.uvrege().set_bit());
        usb.usbcon.write(|w| w.usbe().set_bit().otgpade().set_bit());

        dp.PLL.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while dp.PLL.pllcsr.read().plock().bit_is_clear() {}

        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());
        usb.udien.write(|w| w.eorste().set_bit());

        self.configured = false;
    }

    pub fn disable(&mut self, dp: &Peripherals) {
        dp.USB_DEVICE.udcon.write(|w| w.detach().set_bit());
        dp.USB_DEVICE.usbcon.write(|w| w.frzclk().set_bit());
        self.configured = false;
    }

    /// One iteration of the USB state machine. Handles end-of-reset and
    /// standard EP0 requests inline; stashes any in-flight vendor request
    /// for [`Self::take_pending_setup`].
    pub fn poll(&mut self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        let udint = usb.udint.read();
        if udint.eorsti().bit_is_set() {
            usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.configure_ep0(dp);
            self.configured = false;
        }

        select_endpoint(dp, 0);
        if usb.ueintx.read().rxstpi().bit_is_set() {
            self.handle_setup(dp);
        }
    }

    pub fn take_pending_setup(&mut self) -> Option<SetupPacket> {
        self.pending_vendor_setup.take()
    }

    /// Sends a dispatcher's response bytes on EP0 and completes the status
    /// stage. An empty response is a host-to-device request (`SET_ADDR`,
    /// `SET_TYPE`): the ZLP status is the only thing EP0 has to send. A
    /// non-empty response is a device-to-host request: send the data, then
    /// wait for the host's ZLP status OUT.
    pub fn send_control_response(&self, dp: &Peripherals, data: &[u8]) {
        let usb = &dp.USB_DEVICE;
        select_endpoint(dp, 0);

        while usb.ueintx.read().txini().bit_is_clear() {}
        for &b in data {
            usb.uedatx.write(|w| w.bits(b));
        }
        usb.ueintx.modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());

        if !data.is_empty() {
            while usb.ueintx.read().rxouti().bit_is_clear() {}
            usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
        }
    }

    pub fn stall_control(&self, dp: &Peripherals) {
        select_endpoint(dp, 0);
        dp.USB_DEVICE.ueconx.modify(|_, w| w.stallrq().set_bit());
    }

    pub fn in_ready(&self, dp: &Peripherals) -> bool {
        select_endpoint(dp, EP_BULK_IN);
        dp.USB_DEVICE.ueintx.read().rwal().bit_is_set()
    }

    pub fn write_in(&self, dp: &Peripherals, data: &[u8]) {
        select_endpoint(dp, EP_BULK_IN);
        let usb = &dp.USB_DEVICE;
        for &b in data {
            usb.uedatx.write(|w| w.bits(b));
        }
        usb.ueintx.modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());
    }

    pub fn out_ready(&self, dp: &Peripherals) -> bool {
        select_endpoint(dp, EP_BULK_OUT);
        dp.USB_DEVICE.ueintx.read().rxouti().bit_is_set()
    }

    pub fn read_out(&self, dp: &Peripherals, buf: &mut [u8]) -> usize {
        select_endpoint(dp, EP_BULK_OUT);
        let usb = &dp.USB_DEVICE;

        let mut n = 0;
        while n < buf.len() && usb.ueintx.read().rwal().bit_is_set() {
            buf[n] = usb.uedatx.read().bits();
            n += 1;
        }
        if usb.ueintx.read().rwal().bit_is_clear() {
            usb.ueintx.modify(|_, w| w.fifocon().clear_bit().rxouti().clear_bit());
        }
        n
    }

    fn configure_ep0(&self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;
        select_endpoint(dp, 0);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b00));
        usb.uecfg1x.write(|w| w.epsize().bits(0b010).alloc().set_bit());
    }

    fn configure_bulk_endpoints(&self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        select_endpoint(dp, EP_BULK_IN);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b10).epdir().set_bit());
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());

        select_endpoint(dp, EP_BULK_OUT);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b10).epdir().clear_bit());
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn handle_setup(&mut self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        let bm_request_type = usb.uedatx.read().bits();
        let b_request = usb.uedatx.read().bits();
        let w_value_l = usb.uedatx.read().bits();
        let w_value_h = usb.uedatx.read().bits();
        let w_index_l = usb.uedatx.read().bits();
        let w_index_h = usb.uedatx.read().bits();
        let w_length_l = usb.uedatx.read().bits();
        let w_length_h = usb.uedatx.read().bits();
        usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        let w_value = (w_value_h as u16) << 8 | w_value_l as u16;
        let w_index = (w_index_h as u16) << 8 | w_index_l as u16;
        let w_length = (w_length_h as u16) << 8 | w_length_l as u16;

        if bm_request_type & BM_VENDOR_MASK == BM_VENDOR {
            self.pending_vendor_setup = Some(SetupPacket {
                bm_request_type,
                b_request,
                w_value,
                w_index,
                w_length,
            });
            return;
        }

        match (bm_request_type, b_request) {
            (0x80, 0x06) => {
                let desc_type = w_value_h;
                let desc_index = w_value_l;
                match descriptors::get_descriptor(desc_type, desc_index) {
                    Some(desc) => self.send_descriptor(dp, desc, w_length),
                    None => self.stall_control(dp),
                }
            }
            (0x00, 0x05) => {
                usb.ueintx.modify(|_, w| w.txini().clear_bit());
                while usb.ueintx.read().txini().bit_is_clear() {}
                usb.udaddr.write(|w| w.uadd().bits(w_value_l & 0x7F).adden().set_bit());
            }
            (0x00, 0x09) => {
                usb.ueintx.modify(|_, w| w.txini().clear_bit());
                self.configure_bulk_endpoints(dp);
                self.configured = true;
            }
            (0x80, 0x08) => {
                while usb.ueintx.read().txini().bit_is_clear() {}
                usb.uedatx.write(|w| w.bits(self.configured as u8));
                usb.ueintx.modify(|_, w| w.txini().clear_bit());
            }
            _ => self.stall_control(dp),
        }
    }

    fn send_descriptor(&self, dp: &Peripherals, desc: &[u8], max_length: u16) {
        let usb = &dp.USB_DEVICE;
        let len = core::cmp::min(desc.len(), max_length as usize);
        let mut sent = 0;

        while sent < len {
            while usb.ueintx.read().txini().bit_is_clear() {}
            let chunk_end = core::cmp::min(sent + EP0_SIZE as usize, len);
            for &byte in &desc[sent..chunk_end] {
                usb.uedatx.write(|w| w.bits(byte));
            }
            usb.ueintx.modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());
            sent = chunk_end;
        }

        while usb.ueintx.read().rxouti().bit_is_clear() {}
        usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
    }
}

fn select_endpoint(dp: &Peripherals, ep: u8) {
    dp.USB_DEVICE.uenum.write(|w| w.bits(ep & 0x07));
}
