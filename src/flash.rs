/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! SPI NOR flash attached to the SPI controller. Reads go through the
//! memory-mapped execute-in-place window, writes and erases through SPI.

use core::convert::Infallible;

use embedded_hal::blocking::delay::DelayUs;
use embedded_storage::nor_flash::{
    self, ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::mmio::Mmio;
use crate::spi::SpiController;
use crate::Error;

pub const PAGE_SIZE: usize = 256;
pub const SECTOR_SIZE: usize = 0x1000;
pub const ERASE_VALUE: u8 = 0xff;

const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_READ_STATUS: u8 = 0x05;
const STATUS_WIP: u8 = 1 << 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashConfig {
    /// Pause after every deselect
    pub settle_short_us: u32,
    /// Pause after a complete program or erase
    pub settle_us: u32,
    pub status_poll_limit: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            settle_short_us: 10,
            settle_us: 1000,
            status_poll_limit: 1_000_000,
        }
    }
}

impl NorFlashError for Error<Infallible> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::Misaligned => NorFlashErrorKind::NotAligned,
            Error::OutOfRange => NorFlashErrorKind::OutOfBounds,
            _ => NorFlashErrorKind::Other,
        }
    }
}

fn check(res: Result<(), NorFlashErrorKind>) -> Result<(), Error<Infallible>> {
    res.map_err(|kind| {
        #[cfg(feature = "rttdebug")]
        rprintln!("flash access rejected: {:?}", kind);
        match kind {
            NorFlashErrorKind::NotAligned => Error::Misaligned,
            _ => Error::OutOfRange,
        }
    })
}

pub struct SpiFlash<'a, M, D> {
    spi: SpiController<M>,
    window: &'a [u8],
    delay: D,
    config: FlashConfig,
}

impl<'a, M: Mmio, D: DelayUs<u32>> SpiFlash<'a, M, D> {
    /// `window` is the memory-mapped view of the whole flash, and sets its size
    pub fn new(spi: SpiController<M>, window: &'a [u8], delay: D, config: FlashConfig) -> Self {
        Self {
            spi,
            window,
            delay,
            config,
        }
    }

    pub fn release(self) -> (SpiController<M>, D) {
        (self.spi, self.delay)
    }

    /// Number of uniform erase sectors
    pub fn sectors(&self) -> usize {
        self.window.len() / SECTOR_SIZE
    }

    pub fn read_status(&mut self) -> Result<u8, Error<Infallible>> {
        let mut status = [0];
        self.spi.write_then_read(&[CMD_READ_STATUS], &mut status)?;
        Ok(status[0])
    }

    fn write_enable(&mut self) -> Result<(), Error<Infallible>> {
        self.spi.transaction(|spi| spi.write_byte(CMD_WRITE_ENABLE))?;
        self.delay.delay_us(self.config.settle_short_us);
        Ok(())
    }

    /// Poll until the write-in-progress bit clears
    fn wait_idle(&mut self) -> Result<(), Error<Infallible>> {
        for _ in 0..self.config.status_poll_limit {
            if self.read_status()? & STATUS_WIP == 0 {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }
}

impl<'a, M, D> ErrorType for SpiFlash<'a, M, D> {
    type Error = Error<Infallible>;
}

impl<'a, M: Mmio, D: DelayUs<u32>> ReadNorFlash for SpiFlash<'a, M, D> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check(nor_flash::check_read(&*self, offset, bytes.len()))?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.window[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.window.len()
    }
}

impl<'a, M: Mmio, D: DelayUs<u32>> NorFlash for SpiFlash<'a, M, D> {
    const WRITE_SIZE: usize = PAGE_SIZE;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    /// One page program per flash page
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check(nor_flash::check_write(&*self, offset, bytes.len()))?;
        if bytes.is_empty() {
            return Ok(());
        }

        for (addr, page) in (offset as usize..)
            .step_by(PAGE_SIZE)
            .zip(bytes.chunks(PAGE_SIZE))
        {
            self.write_enable()?;
            self.spi.transaction(|spi| {
                spi.write_byte(CMD_PAGE_PROGRAM)?;
                address_bytes(addr)
                    .iter()
                    .chain(page)
                    .try_for_each(|b| spi.write_byte(*b))
            })?;
            self.delay.delay_us(self.config.settle_short_us);
        }

        self.wait_idle()?;
        self.delay.delay_us(self.config.settle_us);
        Ok(())
    }

    /// Erase the sectors covering `from..to`
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check(nor_flash::check_erase(&*self, from, to))?;
        if from == to {
            return Ok(());
        }

        for sector in (from as usize..to as usize).step_by(SECTOR_SIZE) {
            self.write_enable()?;
            self.spi.transaction(|spi| {
                spi.write_byte(CMD_SECTOR_ERASE)?;
                address_bytes(sector)
                    .iter()
                    .try_for_each(|b| spi.write_byte(*b))
            })?;
            self.delay.delay_us(self.config.settle_short_us);
        }

        self.wait_idle()?;
        self.delay.delay_us(self.config.settle_us);
        Ok(())
    }
}

fn address_bytes(addr: usize) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockSpiRegs};
    use crate::spi::{SpiConfig, CMD_READ, CMD_SS, CMD_WRITE};
    use std::vec;
    use std::vec::Vec;

    const SELECT: u32 = 0x80 | CMD_SS;
    const DESELECT: u32 = CMD_SS;

    static WINDOW: [u8; 0x4000] = [0xa5; 0x4000];

    type Flash = SpiFlash<'static, MockSpiRegs, MockDelay>;

    fn flash(regs: &MockSpiRegs, delay: &MockDelay) -> Flash {
        let spi = SpiController::new(regs.clone(), SpiConfig::default());
        SpiFlash::new(spi, &WINDOW, delay.clone(), FlashConfig::default())
    }

    fn sent(bytes: &[u8]) -> Vec<u32> {
        bytes.iter().map(|b| *b as u32 | CMD_WRITE).collect()
    }

    /// Split the command stream into the writes of each selected frame
    fn frames(commands: &[u32]) -> Vec<Vec<u32>> {
        commands
            .split(|c| *c == DESELECT)
            .filter(|f| !f.is_empty())
            .map(|f| f.iter().copied().filter(|c| *c != SELECT).collect())
            .collect()
    }

    #[test]
    fn geometry() {
        let dev = flash(&MockSpiRegs::default(), &MockDelay::default());
        assert_eq!(Flash::READ_SIZE, 1);
        assert_eq!(Flash::WRITE_SIZE, 256);
        assert_eq!(Flash::ERASE_SIZE, 0x1000);
        assert_eq!(dev.capacity(), 0x4000);
        assert_eq!(dev.sectors(), 4);
        assert_eq!(Error::<Infallible>::Misaligned.kind(), NorFlashErrorKind::NotAligned);
        assert_eq!(Error::<Infallible>::OutOfRange.kind(), NorFlashErrorKind::OutOfBounds);
        assert_eq!(Error::<Infallible>::Timeout.kind(), NorFlashErrorKind::Other);
    }

    #[test]
    fn read_from_window() {
        let mut dev = flash(&MockSpiRegs::default(), &MockDelay::default());
        let mut buf = [0; 4];
        dev.read(0x3ffc, &mut buf).unwrap();
        assert_eq!(buf, [0xa5; 4]);
        assert_eq!(dev.read(0x3ffd, &mut buf), Err(Error::OutOfRange));
        assert_eq!(dev.read(u32::MAX, &mut buf), Err(Error::OutOfRange));
    }

    #[test]
    fn write_programs_one_page_at_a_time() {
        let regs = MockSpiRegs::default();
        let delay = MockDelay::default();
        let mut dev = flash(&regs, &delay);
        let data: Vec<u8> = (0..512).map(|i| i as u8).collect();
        dev.write(0x100, &data).unwrap();

        let frames = frames(&regs.commands());
        let mut first = sent(&[0x02, 0x00, 0x01, 0x00]);
        first.extend(sent(&data[..256]));
        let mut second = sent(&[0x02, 0x00, 0x02, 0x00]);
        second.extend(sent(&data[256..]));
        assert_eq!(
            frames,
            vec![
                sent(&[0x06]),
                first,
                sent(&[0x06]),
                second,
                vec![0x05 | CMD_WRITE, CMD_READ],
            ]
        );
        assert_eq!(delay.total_us(), 4 * 10 + 1000);
    }

    #[test]
    fn write_rejects_partial_pages() {
        let regs = MockSpiRegs::default();
        let mut dev = flash(&regs, &MockDelay::default());
        assert_eq!(dev.write(0x1f0, &[0; 20]), Err(Error::Misaligned));
        assert_eq!(dev.write(0x100, &[0; 20]), Err(Error::Misaligned));
        assert_eq!(dev.write(0x3f00, &[0; 512]), Err(Error::OutOfRange));
        assert!(regs.commands().is_empty());
    }

    #[test]
    fn erase_polls_until_idle() {
        let regs = MockSpiRegs::default();
        regs.respond(&[0x03, 0x01, 0x00]);
        let mut dev = flash(&regs, &MockDelay::default());
        dev.erase(0x1000, 0x3000).unwrap();

        let frames = frames(&regs.commands());
        assert_eq!(frames[1], sent(&[0x20, 0x00, 0x10, 0x00]));
        assert_eq!(frames[3], sent(&[0x20, 0x00, 0x20, 0x00]));
        let polls = frames
            .iter()
            .filter(|f| f[0] == 0x05 | CMD_WRITE)
            .count();
        assert_eq!(polls, 3);
    }

    #[test]
    fn erase_rejects_partial_sectors() {
        let regs = MockSpiRegs::default();
        let mut dev = flash(&regs, &MockDelay::default());
        assert_eq!(dev.erase(0x1000, 0x1800), Err(Error::Misaligned));
        assert_eq!(dev.erase(0x800, 0x1800), Err(Error::Misaligned));
        assert_eq!(dev.erase(0x3000, 0x5000), Err(Error::OutOfRange));
        assert_eq!(dev.erase(0x2000, 0x1000), Err(Error::OutOfRange));
        assert!(regs.commands().is_empty());
    }

    #[test]
    fn empty_requests_do_nothing() {
        let regs = MockSpiRegs::default();
        let mut dev = flash(&regs, &MockDelay::default());
        dev.write(0x1000, &[]).unwrap();
        dev.erase(0x1000, 0x1000).unwrap();
        dev.read(0x1000, &mut [0u8; 0]).unwrap();
        assert!(regs.commands().is_empty());
    }
}
