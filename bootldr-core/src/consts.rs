//! Wire-stable constants: command codes, error codes, and protocol limits.
//!
//! Everything in this module is part of the USB-visible contract. Do not
//! renumber; a host-side flasher depends on these values.

/// Memory kind selector wire value for SET_TYPE / GET_TYPE: FLASH.
pub const MEM_FLASH: u8 = 0xB0;
/// Memory kind selector wire value for SET_TYPE / GET_TYPE: EEPROM.
pub const MEM_EEPROM: u8 = 0xB1;

/// `bRequest` codes for the vendor DFU interface.
pub mod cmd {
    pub const SET_ADDR: u8 = 0x50;
    pub const SET_TYPE: u8 = 0x51;
    pub const WRITE_PAGE: u8 = 0x52;
    pub const GET_ADDR: u8 = 0xA0;
    pub const GET_TYPE: u8 = 0xA1;
    pub const READ_PAGE: u8 = 0xA2;
    pub const NOP: u8 = 0xFE;
    pub const RESET: u8 = 0xFF;
}

/// `last_err` / response status codes.
pub mod err {
    pub const OK: u8 = 0x00;
    pub const CMD: u8 = 0x80;
    /// Reserved. No command path issues this today; see the open question in
    /// the design notes about its intended trigger.
    #[allow(dead_code)]
    pub const LEN: u8 = 0x81;
    pub const ADDR: u8 = 0x82;
    pub const TYPE: u8 = 0x83;
    pub const ALIGN: u8 = 0x84;
    pub const PAGE: u8 = 0x85;
    pub const OVERFLOW: u8 = 0x86;
}

/// Interface number the control-request handler answers on (`wIndex`).
pub const DFU_INTERFACE: u16 = 1;

/// Requests with `wLength` at or above this are out of filter.
pub const FIXED_CONTROL_ENDPOINT_SIZE: u16 = 32;

/// Maximum bytes moved per bulk IN chunk.
pub const DFU_READ_SIZE: usize = 64;

/// Maximum bytes accepted per bulk OUT chunk.
pub const DFU_WRITE_SIZE: usize = 64;

/// Largest page size across all memory kinds; sizes the page buffer.
pub const MAX_PAGE: usize = 128;

/// Ticks loaded into `idle_ticks` whenever a command is successfully dispatched.
pub const IDLE_RELOAD: u8 = 60;
