/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Camera control interface (CCI) register access.
//!
//! Sensor registers are described by a [`Reg`]: the register address tagged
//! with its address width, data width and byte order. Multi-byte registers are
//! written one byte per bus transaction, at consecutive addresses.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::Error;

/// Number of attempts made for each bus transaction
pub const DEFAULT_RETRIES: u8 = 3;

/// Pause between two attempts of a failed transaction
pub const RETRY_DELAY_US: u32 = 1000;

const ENDIANNESS_BIT: u32 = 1 << 24;
const ADDR_SIZE_SHIFT: u32 = 20;
const DATA_SIZE_SHIFT: u32 = 16;
const SIZE_MASK: u32 = 0xf;

/// Byte order of a multi-byte register value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Register address with its access flags packed in the upper bits:
/// bit 24 endianness, bits 23:20 address size, bits 19:16 data size,
/// bits 15:0 address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reg(u32);

impl Reg {
    /// Register definition for const tables.
    ///
    /// # Panics
    ///
    /// When `addr_size` is not 1 or 2 or `data_size` is not 1 to 4. In a
    /// const context that is a compile error; use [`Reg::try_new`] for sizes
    /// only known at runtime.
    pub const fn new(
        addr: u16,
        addr_size: u8,
        data_size: u8,
        endianness: Endianness,
    ) -> Self {
        assert!(addr_size >= 1 && addr_size <= 2);
        assert!(data_size >= 1 && data_size <= 4);
        Self::pack(addr, addr_size, data_size, endianness)
    }

    pub fn try_new<E>(
        addr: u16,
        addr_size: u8,
        data_size: u8,
        endianness: Endianness,
    ) -> Result<Self, Error<E>> {
        if !(1..=2).contains(&addr_size) || !(1..=4).contains(&data_size) {
            return Err(Error::InvalidRegister);
        }
        Ok(Self::pack(addr, addr_size, data_size, endianness))
    }

    const fn pack(addr: u16, addr_size: u8, data_size: u8, endianness: Endianness) -> Self {
        let order = match endianness {
            Endianness::Big => ENDIANNESS_BIT,
            Endianness::Little => 0,
        };
        Reg(order
            | (addr_size as u32) << ADDR_SIZE_SHIFT
            | (data_size as u32) << DATA_SIZE_SHIFT
            | addr as u32)
    }

    /// 8-bit address, 8-bit data
    pub const fn addr8_data8(addr: u8) -> Self {
        Self::new(addr as u16, 1, 1, Endianness::Little)
    }

    /// 16-bit address, 8-bit data
    pub const fn addr16_data8(addr: u16) -> Self {
        Self::new(addr, 2, 1, Endianness::Little)
    }

    /// Wrap an already encoded value. Flags are validated on use.
    pub const fn from_raw(raw: u32) -> Self {
        Reg(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn addr(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    pub const fn addr_size(self) -> usize {
        ((self.0 >> ADDR_SIZE_SHIFT) & SIZE_MASK) as usize
    }

    pub const fn data_size(self) -> usize {
        ((self.0 >> DATA_SIZE_SHIFT) & SIZE_MASK) as usize
    }

    pub const fn endianness(self) -> Endianness {
        if self.0 & ENDIANNESS_BIT != 0 {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    fn validate<E>(self) -> Result<(), Error<E>> {
        match (self.addr_size(), self.data_size()) {
            (1..=2, 1..=4) => Ok(()),
            _ => Err(Error::InvalidRegister),
        }
    }

    /// Encode the address of byte `offset` of this register, big-endian
    fn encode_addr(self, offset: usize, buf: &mut [u8]) -> usize {
        let addr = self.addr().wrapping_add(offset as u16);
        match self.addr_size() {
            1 => {
                buf[0] = addr as u8;
                1
            }
            _ => {
                buf[..2].copy_from_slice(&addr.to_be_bytes());
                2
            }
        }
    }

    /// The data bytes of `value`, in the order they go out on the bus
    fn split(self, value: u32) -> ([u8; 4], usize) {
        let size = self.data_size();
        let mut out = [0u8; 4];
        match self.endianness() {
            Endianness::Big => {
                out[..size].copy_from_slice(&value.to_be_bytes()[4 - size..])
            }
            Endianness::Little => {
                out[..size].copy_from_slice(&value.to_le_bytes()[..size])
            }
        }
        (out, size)
    }

    fn join(self, bytes: &[u8]) -> u32 {
        match self.endianness() {
            Endianness::Big => bytes
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | *b as u32),
            Endianness::Little => bytes
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (8 * i)),
        }
    }
}

/// One entry of a register batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegValue {
    pub reg: Reg,
    pub value: u32,
}

impl RegValue {
    pub const fn new(reg: Reg, value: u32) -> Self {
        Self { reg, value }
    }
}

/// Register access to one device on the control bus
pub struct Cci<I2C, D> {
    i2c: I2C,
    address: u8,
    delay: D,
    retries: u8,
}

impl<I2C, D, CommE> Cci<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            delay,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Change the number of attempts per transaction (at least one)
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_us(ms.saturating_mul(1000));
    }

    fn write_retry(&mut self, buf: &[u8]) -> Result<(), Error<CommE>> {
        let mut attempt = 1;
        loop {
            match self.i2c.write(self.address, buf) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retries => {
                    #[cfg(feature = "rttdebug")]
                    rprintln!("cci write failed after {} attempts", attempt);
                    return Err(Error::Comm(e));
                }
                Err(_) => {
                    attempt += 1;
                    self.delay.delay_us(RETRY_DELAY_US);
                }
            }
        }
    }

    fn write_read_retry(
        &mut self,
        out: &[u8],
        buf: &mut [u8],
    ) -> Result<(), Error<CommE>> {
        let mut attempt = 1;
        loop {
            match self.i2c.write_read(self.address, out, buf) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retries => {
                    #[cfg(feature = "rttdebug")]
                    rprintln!("cci read failed after {} attempts", attempt);
                    return Err(Error::Comm(e));
                }
                Err(_) => {
                    attempt += 1;
                    self.delay.delay_us(RETRY_DELAY_US);
                }
            }
        }
    }

    /// Write a register, one data byte per transaction at consecutive addresses
    pub fn write_reg(&mut self, reg: Reg, value: u32) -> Result<(), Error<CommE>> {
        reg.validate()?;
        let (data, size) = reg.split(value);
        let mut buf = [0u8; 3];
        for (i, byte) in data[..size].iter().enumerate() {
            let n = reg.encode_addr(i, &mut buf);
            buf[n] = *byte;
            self.write_retry(&buf[..n + 1]).map_err(|e| {
                #[cfg(feature = "rttdebug")]
                rprintln!("failed to write register 0x{:04x}", reg.addr() as usize + i);
                e
            })?;
        }
        Ok(())
    }

    /// Read a register, one data byte per transaction at consecutive addresses
    pub fn read_reg(&mut self, reg: Reg) -> Result<u32, Error<CommE>> {
        reg.validate()?;
        let size = reg.data_size();
        let mut data = [0u8; 4];
        let mut addr = [0u8; 2];
        for i in 0..size {
            let n = reg.encode_addr(i, &mut addr);
            self.write_read_retry(&addr[..n], &mut data[i..i + 1])?;
        }
        Ok(reg.join(&data[..size]))
    }

    /// Read-modify-write of the bits selected by `mask`
    pub fn write_field(
        &mut self,
        reg: Reg,
        mask: u32,
        value: u32,
    ) -> Result<(), Error<CommE>> {
        let current = self.read_reg(reg)?;
        self.write_reg(reg, (current & !mask) | (value & mask))
    }

    /// Write a batch of registers in order, stopping at the first failure
    pub fn write_multi(&mut self, regs: &[RegValue]) -> Result<(), Error<CommE>> {
        regs.iter().try_for_each(|r| self.write_reg(r.reg, r.value))
    }

    /// Write a register as a single transaction: address then all data bytes
    pub fn write_reg_single(
        &mut self,
        reg: Reg,
        value: u32,
    ) -> Result<(), Error<CommE>> {
        reg.validate()?;
        let (data, size) = reg.split(value);
        let mut buf = [0u8; 6];
        let n = reg.encode_addr(0, &mut buf);
        buf[n..n + size].copy_from_slice(&data[..size]);
        self.write_retry(&buf[..n + size])
    }

    /// Read a register as a single address write followed by a burst read
    pub fn read_reg_single(&mut self, reg: Reg) -> Result<u32, Error<CommE>> {
        reg.validate()?;
        let size = reg.data_size();
        let mut addr = [0u8; 2];
        let mut data = [0u8; 4];
        let n = reg.encode_addr(0, &mut addr);
        self.write_read_retry(&addr[..n], &mut data[..size])?;
        Ok(reg.join(&data[..size]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockI2c};
    use std::vec;

    const ADDR: u8 = 0x10;

    fn cci(bus: MockI2c) -> Cci<MockI2c, MockDelay> {
        Cci::new(bus, ADDR, MockDelay::default())
    }

    #[test]
    fn flags_pack_and_unpack() {
        let reg = Reg::new(0x0157, 2, 2, Endianness::Big);
        assert_eq!(reg.raw(), 0x0122_0157);
        assert_eq!(reg.addr(), 0x0157);
        assert_eq!(reg.addr_size(), 2);
        assert_eq!(reg.data_size(), 2);
        assert_eq!(reg.endianness(), Endianness::Big);
    }

    #[test]
    fn big_endian_write_is_one_byte_per_transaction() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::new(0x3000, 2, 2, Endianness::Big);
        dev.write_reg(reg, 0x1234).unwrap();
        let (bus, _) = dev.release();
        assert_eq!(
            bus.writes(),
            vec![vec![0x30, 0x00, 0x12], vec![0x30, 0x01, 0x34]]
        );
    }

    #[test]
    fn big_endian_read_back() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::new(0x3000, 2, 2, Endianness::Big);
        dev.write_reg(reg, 0x1234).unwrap();
        assert_eq!(dev.read_reg(reg).unwrap(), 0x1234);
    }

    #[test]
    fn little_endian_places_low_byte_first() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::new(0x3010, 2, 3, Endianness::Little);
        dev.write_reg(reg, 0x0a_bcde).unwrap();
        assert_eq!(dev.read_reg(reg).unwrap(), 0x0a_bcde);
        let (bus, _) = dev.release();
        assert_eq!(bus.reg(0x3010), 0xde);
        assert_eq!(bus.reg(0x3011), 0xbc);
        assert_eq!(bus.reg(0x3012), 0x0a);
    }

    #[test]
    fn eight_bit_address() {
        let mut dev = cci(MockI2c::new());
        dev.write_reg(Reg::addr8_data8(0x42), 0x99).unwrap();
        let (bus, _) = dev.release();
        assert_eq!(bus.writes(), vec![vec![0x42, 0x99]]);
    }

    #[test]
    fn failing_bus_exhausts_retries() {
        let mut dev = cci(MockI2c::failing());
        let reg = Reg::new(0x0100, 2, 2, Endianness::Big);
        assert_eq!(dev.write_reg(reg, 0xffff), Err(Error::Comm(())));
        let (bus, delay) = dev.release();
        assert_eq!(bus.attempts(), DEFAULT_RETRIES as usize);
        assert!(bus.writes().is_empty());
        assert_eq!(delay.total_us(), (DEFAULT_RETRIES as u64 - 1) * 1000);
    }

    #[test]
    fn transient_failure_recovers() {
        let bus = MockI2c::new();
        bus.fail_next(2);
        let mut dev = cci(bus);
        dev.write_reg(Reg::addr16_data8(0x0100), 1).unwrap();
        let (bus, _) = dev.release();
        assert_eq!(bus.attempts(), 3);
        assert_eq!(bus.reg(0x0100), 1);
    }

    #[test]
    fn malformed_flags_rejected() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::from_raw(0x0050_0010);
        assert_eq!(dev.write_reg(reg, 1), Err(Error::InvalidRegister));
        assert_eq!(dev.read_reg(reg), Err(Error::InvalidRegister));
    }

    #[test]
    fn runtime_sizes_are_checked() {
        assert_eq!(
            Reg::try_new::<()>(0x0157, 2, 2, Endianness::Big),
            Ok(Reg::new(0x0157, 2, 2, Endianness::Big))
        );
        assert_eq!(
            Reg::try_new::<()>(0x0157, 3, 1, Endianness::Little),
            Err(Error::InvalidRegister)
        );
        assert_eq!(
            Reg::try_new::<()>(0x0157, 2, 0, Endianness::Little),
            Err(Error::InvalidRegister)
        );
        assert_eq!(
            Reg::try_new::<()>(0x0157, 0x12, 1, Endianness::Little),
            Err(Error::InvalidRegister)
        );
    }

    #[test]
    fn field_update_keeps_other_bits() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::addr16_data8(0x0172);
        dev.write_reg(reg, 0b1010_0000).unwrap();
        dev.write_field(reg, 0b0000_0011, 0b11).unwrap();
        assert_eq!(dev.read_reg(reg).unwrap(), 0b1010_0011);
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let bus = MockI2c::new();
        bus.fail_from(1);
        let mut dev = cci(bus).with_retries(1);
        let batch = [
            RegValue::new(Reg::addr16_data8(0x0001), 1),
            RegValue::new(Reg::addr16_data8(0x0002), 2),
            RegValue::new(Reg::addr16_data8(0x0003), 3),
        ];
        assert!(dev.write_multi(&batch).is_err());
        let (bus, _) = dev.release();
        assert_eq!(bus.writes(), vec![vec![0x00, 0x01, 0x01]]);
    }

    #[test]
    fn single_transaction_access() {
        let mut dev = cci(MockI2c::new());
        let reg = Reg::new(0x3a00, 2, 4, Endianness::Big);
        dev.write_reg_single(reg, 0x0102_0304).unwrap();
        assert_eq!(dev.read_reg_single(reg).unwrap(), 0x0102_0304);
        let (bus, _) = dev.release();
        assert_eq!(bus.writes(), vec![vec![0x3a, 0x00, 1, 2, 3, 4]]);
    }
}
