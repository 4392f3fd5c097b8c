/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! SPI master driven through a command FIFO. Each byte to shift out, each
//! byte to read back and each slave select change is pushed as a command
//! word; read responses come back through the same data register.

use core::convert::Infallible;

use embedded_hal::blocking::spi;

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::mmio::Mmio;
use crate::Error;

pub mod regs {
    pub const DATA: usize = 0x00;
    /// Low half: free command slots. High half: pending responses.
    pub const BUFFER: usize = 0x04;
    pub const CONFIG: usize = 0x08;
    pub const INTERRUPT: usize = 0x0c;
    pub const CLK_DIVIDER: usize = 0x20;
    pub const SS_SETUP: usize = 0x24;
    pub const SS_HOLD: usize = 0x28;
    pub const SS_DISABLE: usize = 0x2c;
}

pub const CMD_WRITE: u32 = 1 << 8;
pub const CMD_READ: u32 = 1 << 9;
pub const CMD_SS: u32 = 1 << 11;
const SS_ACTIVE: u32 = 0x80;

/// FIFO polls before giving up on the controller
pub const DEFAULT_SPIN_LIMIT: u32 = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpiConfig {
    pub cpol: bool,
    pub cpha: bool,
    pub mode: u8,
    pub clk_divider: u32,
    /// Slave select timings, in controller clock cycles
    pub ss_setup: u32,
    pub ss_hold: u32,
    pub ss_disable: u32,
    pub spin_limit: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            cpol: false,
            cpha: false,
            mode: 0,
            clk_divider: 9,
            ss_setup: 2,
            ss_hold: 2,
            ss_disable: 2,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }
}

impl SpiConfig {
    fn config_word(&self) -> u32 {
        (self.cpol as u32) | (self.cpha as u32) << 1 | (self.mode as u32) << 4
    }
}

pub struct SpiController<M> {
    regs: M,
    config: SpiConfig,
    slave: u8,
}

impl<M: Mmio> SpiController<M> {
    pub fn new(regs: M, config: SpiConfig) -> Self {
        Self {
            regs,
            config,
            slave: 0,
        }
    }

    /// Slave select line used by the `embedded-hal` transfers
    pub fn set_slave(&mut self, slave: u8) {
        self.slave = slave;
    }

    pub fn slave(&self) -> u8 {
        self.slave
    }

    pub fn release(self) -> M {
        self.regs
    }

    /// Program mode, clock and slave select timing
    pub fn init(&mut self) {
        self.regs.write32(regs::CONFIG, self.config.config_word());
        self.regs.write32(regs::CLK_DIVIDER, self.config.clk_divider);
        self.regs.write32(regs::SS_SETUP, self.config.ss_setup);
        self.regs.write32(regs::SS_HOLD, self.config.ss_hold);
        self.regs.write32(regs::SS_DISABLE, self.config.ss_disable);
    }

    fn cmd_availability(&self) -> u32 {
        self.regs.read32(regs::BUFFER) & 0xffff
    }

    fn rsp_occupancy(&self) -> u32 {
        self.regs.read32(regs::BUFFER) >> 16
    }

    fn spin_until(&self, ready: impl Fn(&Self) -> bool) -> Result<(), Error<Infallible>> {
        for _ in 0..self.config.spin_limit {
            if ready(self) {
                return Ok(());
            }
        }
        #[cfg(feature = "rttdebug")]
        rprintln!("spi controller stuck");
        Err(Error::Timeout)
    }

    fn push(&mut self, cmd: u32) -> Result<(), Error<Infallible>> {
        self.spin_until(|s| s.cmd_availability() != 0)?;
        self.regs.write32(regs::DATA, cmd);
        Ok(())
    }

    fn pull(&mut self) -> Result<u8, Error<Infallible>> {
        self.spin_until(|s| s.rsp_occupancy() != 0)?;
        Ok(self.regs.read32(regs::DATA) as u8)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<Infallible>> {
        self.push(byte as u32 | CMD_WRITE)
    }

    pub fn read_byte(&mut self) -> Result<u8, Error<Infallible>> {
        self.push(CMD_READ)?;
        self.pull()
    }

    pub fn write_read_byte(&mut self, byte: u8) -> Result<u8, Error<Infallible>> {
        self.push(byte as u32 | CMD_READ | CMD_WRITE)?;
        self.pull()
    }

    pub fn select(&mut self, slave: u8) -> Result<(), Error<Infallible>> {
        self.push(slave as u32 | SS_ACTIVE | CMD_SS)
    }

    pub fn deselect(&mut self, slave: u8) -> Result<(), Error<Infallible>> {
        self.push(slave as u32 | CMD_SS)
    }

    /// Run `f` with the current slave selected, without interruption.
    /// The slave is deselected even when `f` fails.
    pub fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, Error<Infallible>>,
    ) -> Result<R, Error<Infallible>> {
        critical_section::with(|_| {
            let slave = self.slave;
            self.select(slave)?;
            let res = f(self);
            let released = self.deselect(slave);
            let out = res?;
            released?;
            Ok(out)
        })
    }

    /// Shift out `tx`, then clock in `rx`, under one slave select
    pub fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error<Infallible>> {
        self.transaction(|spi| {
            tx.iter().try_for_each(|b| spi.write_byte(*b))?;
            rx.iter_mut().try_for_each(|b| {
                *b = spi.read_byte()?;
                Ok(())
            })
        })
    }
}

impl<M: Mmio> spi::Transfer<u8> for SpiController<M> {
    type Error = Error<Infallible>;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        self.transaction(|spi| {
            words.iter_mut().try_for_each(|w| {
                *w = spi.write_read_byte(*w)?;
                Ok(())
            })
        })?;
        Ok(words)
    }
}

impl<M: Mmio> spi::Write<u8> for SpiController<M> {
    type Error = Error<Infallible>;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.transaction(|spi| words.iter().try_for_each(|w| spi.write_byte(*w)))
    }
}
