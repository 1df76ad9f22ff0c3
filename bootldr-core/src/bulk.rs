//! The bulk transfer pump: cooperative polling that drains host-written
//! bytes into the page buffer and streams memory contents back out.
//!
//! Called once per main-loop iteration. Both halves are no-ops when their
//! endpoint isn't ready, so a single call never blocks.

use crate::consts::{DFU_READ_SIZE, DFU_WRITE_SIZE};
use crate::platform::Platform;
use crate::region::MemKind;
use crate::session::DfuSession;

/// Services the IN and OUT halves of the bulk pump once.
pub fn pump(session: &mut DfuSession<'_>, platform: &mut impl Platform) {
    pump_in(session, platform);
    pump_out(session, platform);
}

/// Device-to-host: streams up to one `DFU_READ_SIZE` chunk of the memory
/// region currently addressed, if a READ_PAGE has armed `read_remaining`.
fn pump_in(session: &mut DfuSession<'_>, platform: &mut impl Platform) {
    if session.read_remaining == 0 || !platform.in_endpoint_ready() {
        return;
    }

    let mut chunk = [0u8; DFU_READ_SIZE];
    let mut n = 0usize;
    while n < DFU_READ_SIZE && session.read_remaining > 0 && session.addr < session.total_size {
        chunk[n] = match session.mem_kind {
            MemKind::Flash => platform.flash_read_byte(session.addr),
            MemKind::Eeprom => platform.eeprom_read_byte(session.addr),
        };
        session.addr += 1;
        session.read_remaining -= 1;
        n += 1;
    }

    platform.write_in(&chunk[..n]);
}

/// Host-to-device: drains at most one received OUT packet into the page
/// buffer, never past `page_size`.
fn pump_out(session: &mut DfuSession<'_>, platform: &mut impl Platform) {
    if !platform.out_packet_ready() {
        return;
    }

    let room = (session.page_size - session.fill) as usize;
    let want = core::cmp::min(DFU_WRITE_SIZE, room);
    if want == 0 {
        return;
    }

    let fill = session.fill as usize;
    let n = platform.read_out(&mut session.page_buf[fill..fill + want]);
    session.fill += n as u16;
}
