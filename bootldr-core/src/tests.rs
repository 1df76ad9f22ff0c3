//! Host-run protocol tests against an in-memory [`MockPlatform`]. No
//! hardware, emulator, or external mock-USB-bus crate is involved: FLASH and
//! EEPROM are plain byte vectors, and the bulk endpoints are byte queues.

use std::collections::VecDeque;

use crate::bulk;
use crate::consts::{cmd, err, DFU_INTERFACE, MAX_PAGE, MEM_EEPROM, MEM_FLASH};
use crate::control::{on_control_request, SetupPacket};
use crate::platform::{Indicators, Platform, PlatformError};
use crate::session::{DfuSession, SessionFlags};
use crate::ticker::{self, Ticker};

struct MockPlatform {
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    flash_staging: [u16; MAX_PAGE / 2],
    in_fifo: VecDeque<u8>,
    out_fifo: VecDeque<u8>,
    red: bool,
    blue: bool,
    fail_next_commit: bool,
}

impl MockPlatform {
    fn new() -> Self {
        Self {
            flash: vec![0xFF; 0x4000],
            eeprom: vec![0xFF; 0x0200],
            flash_staging: [0; MAX_PAGE / 2],
            in_fifo: VecDeque::new(),
            out_fifo: VecDeque::new(),
            red: false,
            blue: false,
            fail_next_commit: false,
        }
    }

    fn push_out(&mut self, data: &[u8]) {
        self.out_fifo.extend(data.iter().copied());
    }

    fn drain_in(&mut self) -> Vec<u8> {
        self.in_fifo.drain(..).collect()
    }
}

impl Indicators for MockPlatform {
    fn set_red(&mut self, on: bool) {
        self.red = on;
    }

    fn set_blue(&mut self, on: bool) {
        self.blue = on;
    }
}

impl Platform for MockPlatform {
    fn in_endpoint_ready(&self) -> bool {
        true
    }

    fn write_in(&mut self, data: &[u8]) {
        self.in_fifo.extend(data.iter().copied());
    }

    fn out_packet_ready(&self) -> bool {
        !self.out_fifo.is_empty()
    }

    fn read_out(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.out_fifo.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.out_fifo.pop_front().unwrap();
        }
        n
    }

    fn flash_read_byte(&self, addr: u16) -> u8 {
        self.flash[addr as usize]
    }

    fn flash_erase_page(&mut self, addr: u16) -> Result<(), PlatformError> {
        if self.fail_next_commit {
            self.fail_next_commit = false;
            return Err(PlatformError);
        }
        let page = addr as usize / 128 * 128;
        for b in &mut self.flash[page..page + 128] {
            *b = 0xFF;
        }
        Ok(())
    }

    fn flash_fill_word(&mut self, word_offset: u16, word: u16) {
        self.flash_staging[word_offset as usize] = word;
    }

    fn flash_write_page(&mut self, addr: u16) -> Result<(), PlatformError> {
        let page = addr as usize / 128 * 128;
        for (i, word) in self.flash_staging.iter().enumerate() {
            let off = page + i * 2;
            if off >= self.flash.len() {
                break;
            }
            self.flash[off] = *word as u8;
            self.flash[off + 1] = (*word >> 8) as u8;
        }
        Ok(())
    }

    fn flash_enable_rww(&mut self) {}

    fn eeprom_read_byte(&self, addr: u16) -> u8 {
        self.eeprom[addr as usize]
    }

    fn eeprom_write_byte(&mut self, addr: u16, value: u8) -> Result<(), PlatformError> {
        self.eeprom[addr as usize] = value;
        Ok(())
    }

    fn button_pressed(&self) -> bool {
        false
    }

    fn watchdog_disable(&mut self) {}

    fn watchdog_reset_now(&mut self) -> ! {
        unreachable!("tests never exercise the reset path")
    }

    fn relocate_vectors_to_bootloader(&mut self) {}
    fn relocate_vectors_to_application(&mut self) {}

    fn start_tick(&mut self) {}
    fn global_interrupts_enable(&mut self) {}
    fn global_interrupts_disable(&mut self) {}

    fn usb_init(&mut self) {}
    fn usb_disable(&mut self) {}

    fn service_usb(&mut self, _session: &mut DfuSession<'_>) {}

    fn debounce_delay(&mut self) {}

    fn jump_to_application(&mut self) -> ! {
        unreachable!("tests never exercise the application jump")
    }
}

fn request(b_request: u8, w_value: u16) -> SetupPacket {
    SetupPacket {
        bm_request_type: 0x40,
        b_request,
        w_value,
        w_index: DFU_INTERFACE,
        w_length: 0,
    }
}

fn dispatch(session: &mut DfuSession<'_>, platform: &mut MockPlatform, b_request: u8, w_value: u16) -> Vec<u8> {
    on_control_request(session, platform, &request(b_request, w_value))
        .expect("in-filter request")
        .as_bytes()
        .to_vec()
}

fn stream_out(session: &mut DfuSession<'_>, platform: &mut MockPlatform, data: &[u8]) {
    platform.push_out(data);
    while platform.out_packet_ready() {
        bulk::pump(session, platform);
    }
}

fn drain_read_page(session: &mut DfuSession<'_>, platform: &mut MockPlatform) -> Vec<u8> {
    while session.read_remaining > 0 {
        bulk::pump(session, platform);
    }
    platform.drain_in()
}

#[test]
fn s1_unknown_command_sets_err_cmd() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    let resp = dispatch(&mut session, &mut platform, 0x33, 0);
    assert!(resp.is_empty());

    let nop = dispatch(&mut session, &mut platform, cmd::NOP, 0);
    assert_eq!(nop, vec![err::CMD]);
}

#[test]
fn s2_misaligned_set_addr_rejected() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0001);

    let nop = dispatch(&mut session, &mut platform, cmd::NOP, 0);
    assert_eq!(nop, vec![err::ALIGN]);

    let get_addr = dispatch(&mut session, &mut platform, cmd::GET_ADDR, 0);
    assert_eq!(get_addr, vec![err::OK, 0x00, 0x00]);
}

#[test]
fn s3_boundary_write_then_overflow() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();
    let page = vec![0xAAu8; 128];

    // The last page fully inside the writable bound: 0x2F80 + 0x80 == 0x3000.
    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x2F80);
    stream_out(&mut session, &mut platform, &page);
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp, vec![err::OK, 0x00, 0x30]);
    assert_eq!(session.addr, 0x3000);

    // 0x3000 is still `< total_size` (0x4000), so SET_ADDR accepts it even
    // though the page starting there is no longer writable.
    let resp = dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x3000);
    assert!(resp.is_empty());
    let nop = dispatch(&mut session, &mut platform, cmd::NOP, 0);
    assert_eq!(nop, vec![err::OK]);

    let flash_before = platform.flash[0x3000..0x3080].to_vec();
    stream_out(&mut session, &mut platform, &page);
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp[0], err::OVERFLOW);
    assert_eq!(session.addr, 0x3000, "a rejected commit must not advance addr");
    assert_eq!(session.fill, 128, "a rejected commit must not consume the page buffer");
    assert_eq!(platform.flash[0x3000..0x3080], flash_before[..]);
}

#[test]
fn s4_eeprom_round_trip() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();
    let payload = [0xDE, 0xAD, 0xBE, 0xEF];

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_EEPROM as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0010);
    stream_out(&mut session, &mut platform, &payload);
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp, vec![err::OK, 0x14, 0x00]);

    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0010);
    dispatch(&mut session, &mut platform, cmd::READ_PAGE, 0);
    let read = drain_read_page(&mut session, &mut platform);
    assert_eq!(read, payload);
}

#[test]
fn s5_write_page_without_full_page() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0000);
    stream_out(&mut session, &mut platform, &[0x11; 64]);

    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp, vec![err::PAGE, 0x00, 0x00]);
    assert_eq!(session.fill, 64);

    stream_out(&mut session, &mut platform, &[0x22; 64]);
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp, vec![err::OK, 0x80, 0x00]);
    assert_eq!(session.fill, 0);
}

#[test]
fn s6_idle_timeout_ends_session() {
    let flags = SessionFlags::new();
    let session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();
    let mut ticker = Ticker::new();

    // `IDLE_RELOAD` ticks just walk `idle_ticks` down to zero; the session
    // only deactivates on the tick that *observes* zero.
    for _ in 0..crate::consts::IDLE_RELOAD {
        assert!(session.is_active());
        ticker::on_tick(&mut ticker, &flags, &mut platform);
    }
    assert!(session.is_active());

    ticker::on_tick(&mut ticker, &flags, &mut platform);
    assert!(!session.is_active());
}

#[test]
fn reset_command_deactivates_session() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    let resp = dispatch(&mut session, &mut platform, cmd::RESET, 0);
    assert_eq!(resp, vec![err::OK]);
    assert!(!session.is_active());
    assert_eq!(flags.idle_ticks_remaining(), 0, "RESET must leave idle_ticks cleared, not reloaded");
}

#[test]
fn invariant_addr_stays_page_aligned() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    assert_eq!(session.addr % session.page_size, 0);

    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 256);
    assert_eq!(session.addr % session.page_size, 0);

    stream_out(&mut session, &mut platform, &[0u8; 128]);
    dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(session.addr % session.page_size, 0);
}

#[test]
fn invariant_nop_is_idempotent() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0001); // misaligned -> ERR_ALIGN

    let addr_before = session.addr;
    let fill_before = session.fill;
    for _ in 0..5 {
        let resp = dispatch(&mut session, &mut platform, cmd::NOP, 0);
        assert_eq!(resp, vec![err::ALIGN]);
    }
    assert_eq!(session.addr, addr_before);
    assert_eq!(session.fill, fill_before);
}

#[test]
fn platform_commit_failure_maps_to_err_overflow() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_FLASH as u16);
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x0000);
    stream_out(&mut session, &mut platform, &[0x55; 128]);

    platform.fail_next_commit = true;
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp[0], err::OVERFLOW);
    assert_eq!(session.addr, 0x0000, "a failed primitive must not advance addr");
    assert_eq!(session.fill, 128, "a failed primitive must not consume the page buffer");

    // The buffer was not consumed, so the same page can be retried.
    let resp = dispatch(&mut session, &mut platform, cmd::WRITE_PAGE, 0);
    assert_eq!(resp, vec![err::OK, 0x80, 0x00]);
}

#[test]
fn read_page_stops_at_region_end() {
    let flags = SessionFlags::new();
    let mut session = DfuSession::new(&flags);
    let mut platform = MockPlatform::new();

    dispatch(&mut session, &mut platform, cmd::SET_TYPE, MEM_EEPROM as u16);
    // Last writable page: total_size=0x200, page_size=4 -> address 0x1FC.
    dispatch(&mut session, &mut platform, cmd::SET_ADDR, 0x01FC);
    dispatch(&mut session, &mut platform, cmd::READ_PAGE, 0);
    let read = drain_read_page(&mut session, &mut platform);
    assert_eq!(read.len(), 4);
    assert_eq!(session.addr, 0x0200);
}

#[test]
fn session_flags_reset_clears_stale_state() {
    let flags = SessionFlags::new();
    flags.deactivate();
    assert!(!flags.is_active());

    flags.reset();
    assert!(flags.is_active());

    let mut ticker = Ticker::new();
    let mut platform = MockPlatform::new();
    ticker::on_tick(&mut ticker, &flags, &mut platform);
    assert!(flags.is_active());
}
