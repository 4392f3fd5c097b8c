/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Test doubles for the bus, delay and register block traits.

use core::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::device::{find_control, Control, ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FormatCap, FrameInterval};
use crate::mmio::Mmio;
use crate::spi;
use crate::Error;

#[derive(Default)]
struct BusState {
    mem: BTreeMap<u16, u8>,
    writes: Vec<Vec<u8>>,
    attempts: usize,
    fail_next: usize,
    succeed_before_failing: Option<usize>,
}

impl BusState {
    fn should_fail(&mut self) -> bool {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        match self.succeed_before_failing.as_mut() {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }
}

/// I2C device with a 16-bit register address space. Clones share state.
#[derive(Clone, Default)]
pub struct MockI2c {
    state: Rc<RefCell<BusState>>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transaction fails
    pub fn failing() -> Self {
        let bus = Self::new();
        bus.fail_from(0);
        bus
    }

    pub fn fail_next(&self, n: usize) {
        self.state.borrow_mut().fail_next = n;
    }

    /// Let `n` more transactions through, then fail all of them
    pub fn fail_from(&self, n: usize) {
        self.state.borrow_mut().succeed_before_failing = Some(n);
    }

    pub fn recover(&self) {
        let mut s = self.state.borrow_mut();
        s.fail_next = 0;
        s.succeed_before_failing = None;
    }

    /// Successful write transactions, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.borrow().writes.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().writes.clear();
    }

    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    pub fn reg(&self, addr: u16) -> u8 {
        self.state.borrow().mem.get(&addr).copied().unwrap_or(0)
    }

    pub fn set_reg(&self, addr: u16, value: u8) {
        self.state.borrow_mut().mem.insert(addr, value);
    }
}

fn addr_of(bytes: &[u8]) -> u16 {
    match bytes {
        [a] => *a as u16,
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        [] => 0,
    }
}

impl Write for MockI2c {
    type Error = ();

    fn write(&mut self, _address: u8, bytes: &[u8]) -> Result<(), ()> {
        let mut s = self.state.borrow_mut();
        if s.should_fail() {
            return Err(());
        }
        s.writes.push(bytes.to_vec());
        if bytes.len() > 2 {
            let base = addr_of(bytes);
            for (i, b) in bytes[2..].iter().enumerate() {
                s.mem.insert(base.wrapping_add(i as u16), *b);
            }
        }
        Ok(())
    }
}

impl WriteRead for MockI2c {
    type Error = ();

    fn write_read(&mut self, _address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
        let mut s = self.state.borrow_mut();
        if s.should_fail() {
            return Err(());
        }
        let base = addr_of(bytes);
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = s.mem.get(&base.wrapping_add(i as u16)).copied().unwrap_or(0);
        }
        Ok(())
    }
}

/// Delay that only accumulates the requested time. Clones share the total.
#[derive(Clone, Default)]
pub struct MockDelay {
    total_us: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn total_us(&self) -> u64 {
        self.total_us.get()
    }
}

impl DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us.set(self.total_us.get() + us as u64);
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms * 1000);
    }
}

/// Register block backed by memory, recording every write
#[derive(Clone, Default)]
pub struct MockMmio {
    regs: Rc<RefCell<BTreeMap<usize, u32>>>,
    log: Rc<RefCell<Vec<(usize, u32)>>>,
}

impl MockMmio {
    pub fn set(&self, offset: usize, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
    }

    pub fn get(&self, offset: usize) -> u32 {
        self.regs.borrow().get(&offset).copied().unwrap_or(0)
    }

    pub fn log(&self) -> Vec<(usize, u32)> {
        self.log.borrow().clone()
    }
}

impl Mmio for MockMmio {
    fn read8(&self, offset: usize) -> u8 {
        self.get(offset) as u8
    }

    fn write8(&mut self, offset: usize, value: u8) {
        self.write32(offset, value as u32);
    }

    fn read16(&self, offset: usize) -> u16 {
        self.get(offset) as u16
    }

    fn read32(&self, offset: usize) -> u32 {
        self.get(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
        self.log.borrow_mut().push((offset, value));
    }
}

#[derive(Default)]
struct SpiState {
    commands: Vec<u32>,
    config: Vec<(usize, u32)>,
    miso: VecDeque<u8>,
    responses: VecDeque<u32>,
    stalled: bool,
    drop_responses: bool,
}

/// SPI controller register block. Read commands are answered from a queue
/// of bytes, zero once it runs dry. Clones share state.
#[derive(Clone, Default)]
pub struct MockSpiRegs {
    state: Rc<RefCell<SpiState>>,
}

impl MockSpiRegs {
    pub fn respond(&self, bytes: &[u8]) {
        self.state.borrow_mut().miso.extend(bytes.iter().copied());
    }

    /// No free command slots
    pub fn stall(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    /// Read commands never produce a response
    pub fn drop_responses(&self, drop: bool) {
        self.state.borrow_mut().drop_responses = drop;
    }

    /// Command words pushed through the data register
    pub fn commands(&self) -> Vec<u32> {
        self.state.borrow().commands.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn config_writes(&self) -> Vec<(usize, u32)> {
        self.state.borrow().config.clone()
    }
}

impl Mmio for MockSpiRegs {
    fn read8(&self, offset: usize) -> u8 {
        self.read32(offset) as u8
    }

    fn write8(&mut self, offset: usize, value: u8) {
        self.write32(offset, value as u32);
    }

    fn read16(&self, offset: usize) -> u16 {
        self.read32(offset) as u16
    }

    fn read32(&self, offset: usize) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            spi::regs::DATA => s.responses.pop_front().unwrap_or(0),
            spi::regs::BUFFER => {
                let free = if s.stalled { 0 } else { 16 };
                (s.responses.len() as u32) << 16 | free
            }
            _ => 0,
        }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        let mut s = self.state.borrow_mut();
        if offset != spi::regs::DATA {
            s.config.push((offset, value));
            return;
        }
        s.commands.push(value);
        if value & spi::CMD_READ != 0 && !s.drop_responses {
            let byte = s.miso.pop_front().unwrap_or(0);
            s.responses.push_back(byte as u32);
        }
    }
}

/// Upstream stage that accepts any format listed in its capabilities
pub struct MockSource {
    pub caps: Caps,
    pub fmt: Option<Format>,
    pub interval: FrameInterval,
    pub streaming: bool,
    pub stream_log: Rc<RefCell<Vec<(u8, bool)>>>,
    pub id: u8,
    pub controls: [Control; 2],
}

impl MockSource {
    pub fn new(caps: &[FormatCap]) -> Self {
        let mut list = Caps::new();
        for cap in caps {
            let _ = list.push(*cap);
        }
        Self {
            caps: list,
            fmt: None,
            interval: FrameInterval::from_fps(30),
            streaming: false,
            stream_log: Rc::default(),
            id: 0,
            controls: [
                Control::new(ControlId::Exposure, 0, 8000, 1, 1000),
                Control::new(ControlId::Gain, 0, 0xfff, 1, 0x100),
            ],
        }
    }
}

impl VideoDevice for MockSource {
    type CommError = ();

    fn get_caps(&self, _ep: Endpoint) -> Result<Caps, Error<()>> {
        Ok(self.caps.clone())
    }

    fn set_format(&mut self, _ep: Endpoint, fmt: &Format) -> Result<(), Error<()>> {
        if !self.caps.iter().any(|c| c.matches(fmt)) {
            return Err(Error::Unsupported);
        }
        self.fmt = Some(*fmt);
        Ok(())
    }

    fn get_format(&self, _ep: Endpoint) -> Result<Format, Error<()>> {
        self.fmt.ok_or(Error::NotReady)
    }

    fn set_frame_interval(
        &mut self,
        _ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<()>> {
        self.interval = *interval;
        Ok(*interval)
    }

    fn get_frame_interval(&self, _ep: Endpoint) -> Result<FrameInterval, Error<()>> {
        Ok(self.interval)
    }

    fn enum_frame_interval(
        &self,
        _ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<()>> {
        if !self.caps.iter().any(|c| c.matches(fmt)) {
            return Err(Error::Unsupported);
        }
        match index {
            0 => Ok(FrameInterval::from_fps(30)),
            _ => Err(Error::OutOfRange),
        }
    }

    fn set_stream(&mut self, on: bool) -> Result<(), Error<()>> {
        self.streaming = on;
        self.stream_log.borrow_mut().push((self.id, on));
        Ok(())
    }

    fn set_ctrl(&mut self, id: ControlId, value: i32) -> Result<(), Error<()>> {
        let ctrl = find_control(&mut self.controls, id)?;
        ctrl.validate(value)?;
        ctrl.commit(value);
        Ok(())
    }

    fn get_ctrl(&self, id: ControlId) -> Result<i32, Error<()>> {
        self.controls
            .iter()
            .find(|c| c.id == id)
            .map(Control::value)
            .ok_or(Error::Unsupported)
    }
}
