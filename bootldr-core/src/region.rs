//! Memory region descriptors: the immutable parameters of FLASH and EEPROM.

use crate::consts::{MEM_EEPROM, MEM_FLASH};

/// Which memory the session currently targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemKind {
    Flash,
    Eeprom,
}

impl MemKind {
    /// Wire value reported by GET_TYPE.
    pub const fn wire(self) -> u8 {
        match self {
            MemKind::Flash => MEM_FLASH,
            MemKind::Eeprom => MEM_EEPROM,
        }
    }
}

/// Immutable per-kind region parameters.
#[derive(Clone, Copy)]
pub struct MemRegion {
    pub kind: MemKind,
    pub total_size: u16,
    pub page_size: u16,
    pub writable_upper_bound: u16,
}

/// FLASH: word-addressed program memory, read via program-memory fetch.
pub const FLASH_REGION: MemRegion = MemRegion {
    kind: MemKind::Flash,
    total_size: 0x4000,
    page_size: 128,
    writable_upper_bound: 0x3000,
};

/// EEPROM: byte-addressable non-volatile memory.
pub const EEPROM_REGION: MemRegion = MemRegion {
    kind: MemKind::Eeprom,
    total_size: 0x0200,
    page_size: 4,
    writable_upper_bound: 0x0200,
};

/// Looks up the region descriptor for a SET_TYPE wire value.
pub fn region_for(kind_byte: u8) -> Option<MemRegion> {
    match kind_byte {
        MEM_FLASH => Some(FLASH_REGION),
        MEM_EEPROM => Some(EEPROM_REGION),
        _ => None,
    }
}
