//! The DFU control-request handler: the command dispatcher invoked by the
//! USB stack for every SETUP on the vendor interface.
//!
//! Every command here is a plain vendor control request with no data stage:
//! `SET_ADDR`'s address and `SET_TYPE`'s memory kind travel in `wValue`: the
//! only acknowledgement is a status byte, delivered either directly (for
//! commands whose table entry has an immediate payload) or via the next NOP.

use crate::consts::{cmd, err, DFU_INTERFACE, FIXED_CONTROL_ENDPOINT_SIZE};
use crate::platform::Platform;
use crate::region::{region_for, MemKind};
use crate::session::DfuSession;

/// The fields of a USB control SETUP packet the dispatcher needs.
///
/// `bm_request_type` is carried for fidelity with the USB stack's callback
/// seam but is not inspected here: routing a SETUP to this handler only for
/// vendor-class, interface-recipient requests is the stack's job.
#[derive(Clone, Copy)]
pub struct SetupPacket {
    pub bm_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

/// A short fixed-size control-endpoint reply (at most 3 bytes: every command
/// in the table fits in a status byte plus an optional little-endian u16).
pub struct ControlResponse {
    data: [u8; 3],
    len: u8,
}

impl ControlResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    fn zero() -> Self {
        Self { data: [0; 3], len: 0 }
    }

    fn one(b0: u8) -> Self {
        Self { data: [b0, 0, 0], len: 1 }
    }

    fn two(b0: u8, b1: u8) -> Self {
        Self { data: [b0, b1, 0], len: 2 }
    }

    fn three(b0: u8, b1: u8, b2: u8) -> Self {
        Self { data: [b0, b1, b2], len: 3 }
    }
}

fn split_le(v: u16) -> (u8, u8) {
    (v as u8, (v >> 8) as u8)
}

/// Dispatches one SETUP packet on the vendor DFU interface.
///
/// Returns `None` for anything outside the filter (wrong interface, or a
/// data stage too long to be one of these commands) — the USB stack is left
/// to stall it as it sees fit.
pub fn on_control_request(
    session: &mut DfuSession<'_>,
    platform: &mut impl Platform,
    setup: &SetupPacket,
) -> Option<ControlResponse> {
    if setup.w_index != DFU_INTERFACE || setup.w_length >= FIXED_CONTROL_ENDPOINT_SIZE {
        return None;
    }

    let response = match setup.b_request {
        cmd::NOP => ControlResponse::one(session.last_err),
        cmd::RESET => {
            // Deactivate and return directly: falling through to the common
            // idle-reset below would reload `idle_ticks` right after
            // `deactivate` clears it, contradicting §4.3's "clears `idle_ticks`".
            session.deactivate();
            return Some(ControlResponse::one(err::OK));
        }
        cmd::GET_ADDR => {
            let (lo, hi) = split_le(session.addr);
            ControlResponse::three(err::OK, lo, hi)
        }
        cmd::GET_TYPE => ControlResponse::two(err::OK, session.mem_kind.wire()),
        cmd::SET_ADDR => {
            session.last_err = set_addr(session, setup.w_value);
            ControlResponse::zero()
        }
        cmd::SET_TYPE => {
            session.last_err = set_type(session, setup.w_value as u8);
            ControlResponse::zero()
        }
        cmd::READ_PAGE => {
            session.read_remaining = session.page_size;
            let (lo, hi) = split_le(session.page_size);
            ControlResponse::three(err::OK, lo, hi)
        }
        cmd::WRITE_PAGE => {
            let (code, addr) = commit_write_page(session, platform);
            session.last_err = code;
            let (lo, hi) = split_le(addr);
            ControlResponse::three(code, lo, hi)
        }
        _ => {
            session.last_err = err::CMD;
            return Some(ControlResponse::zero());
        }
    };

    session.reset_idle();
    session.pulse_red();
    Some(response)
}

/// `addr % page_size == 0` and `addr < total_size`, else rejects without
/// touching `session.addr`.
fn set_addr(session: &mut DfuSession<'_>, addr: u16) -> u8 {
    if addr % session.page_size != 0 {
        return err::ALIGN;
    }
    if addr >= session.total_size {
        return err::ADDR;
    }
    session.addr = addr;
    err::OK
}

fn set_type(session: &mut DfuSession<'_>, kind_byte: u8) -> u8 {
    match region_for(kind_byte) {
        Some(region) => {
            session.mem_kind = region.kind;
            session.total_size = region.total_size;
            session.page_size = region.page_size;
            session.writable_upper_bound = region.writable_upper_bound;
            session.addr = 0;
            session.fill = 0;
            session.read_remaining = 0;
            err::OK
        }
        None => err::TYPE,
    }
}

/// Commits the staged page buffer. Returns the response `(err, addr)` pair;
/// on failure `addr` is the pre-commit address, unchanged.
fn commit_write_page(session: &mut DfuSession<'_>, platform: &mut impl Platform) -> (u8, u16) {
    if session.fill != session.page_size {
        return (err::PAGE, session.addr);
    }
    if session.addr as u32 + session.page_size as u32 > session.writable_upper_bound as u32 {
        return (err::OVERFLOW, session.addr);
    }

    let commit = match session.mem_kind {
        MemKind::Flash => (|| {
            platform.flash_erase_page(session.addr)?;
            let words = session.page_size / 2;
            for word_offset in 0..words {
                let i = (word_offset * 2) as usize;
                let lo = session.page_buf[i];
                let hi = session.page_buf[i + 1];
                platform.flash_fill_word(word_offset, (hi as u16) << 8 | lo as u16);
            }
            platform.flash_write_page(session.addr)?;
            platform.flash_enable_rww();
            Ok(())
        })(),
        MemKind::Eeprom => (|| {
            for i in 0..session.page_size {
                platform.eeprom_write_byte(session.addr + i, session.page_buf[i as usize])?;
            }
            Ok(())
        })(),
    };

    // A platform primitive failure has no dedicated wire code, so it maps to
    // ERR_OVERFLOW, the existing code for "the commit did not happen."
    if commit.is_err() {
        return (err::OVERFLOW, session.addr);
    }

    session.addr += session.page_size;
    session.fill = 0;
    (err::OK, session.addr)
}
