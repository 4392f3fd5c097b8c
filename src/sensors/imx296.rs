/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Sony IMX296 1.6MP global shutter sensor.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::cci::{Cci, Endianness, Reg, RegValue};
use crate::device::VideoDevice;
use crate::format::{Caps, Endpoint, Format, FormatCap, FrameInterval, PixelFormat};
use crate::imager::{Imager, ImagerFormat, Mode};
use crate::Error;

pub const DEFAULT_I2C_ADDRESS: u8 = 0x1a;

pub const FULL_WIDTH: u32 = 1440;
pub const FULL_HEIGHT: u32 = 1080;

const fn reg8(addr: u16) -> Reg {
    Reg::addr16_data8(addr)
}

const fn reg16(addr: u16) -> Reg {
    Reg::new(addr, 2, 2, Endianness::Little)
}

const fn reg24(addr: u16) -> Reg {
    Reg::new(addr, 2, 3, Endianness::Little)
}

const fn rv(reg: Reg, value: u32) -> RegValue {
    RegValue::new(reg, value)
}

pub const REG_STANDBY: Reg = reg8(0x3000);
pub const REG_XMSTA: Reg = reg8(0x300a);
pub const REG_VMAX: Reg = reg24(0x3010);
pub const REG_HMAX: Reg = reg16(0x3014);
pub const REG_INCKSEL0: Reg = reg8(0x3089);
pub const REG_INCKSEL1: Reg = reg8(0x308a);
pub const REG_INCKSEL2: Reg = reg8(0x308b);
pub const REG_INCKSEL3: Reg = reg8(0x308c);
pub const REG_FID0_ROI_ON: Reg = reg16(0x3300);
pub const REG_FID0_ROIPH1: Reg = reg16(0x3310);
pub const REG_FID0_ROIPV1: Reg = reg16(0x3312);
pub const REG_FID0_ROIWV1: Reg = reg16(0x3314);
pub const REG_FID0_ROIWH1: Reg = reg16(0x3316);
pub const REG_INCK: Reg = reg8(0x418c);

/// Wait between leaving standby and starting the master sequence
const STANDBY_EXIT_MS: u32 = 2;

static INIT_REGS: [RegValue; 41] = [
    rv(reg8(0x3005), 0xf0),
    rv(reg8(0x309e), 0x04),
    rv(reg8(0x30a0), 0x04),
    rv(reg8(0x30a1), 0x3c),
    rv(reg8(0x30a4), 0x5f),
    rv(reg8(0x30a8), 0x91),
    rv(reg8(0x30ac), 0x28),
    rv(reg8(0x30af), 0x09),
    rv(reg8(0x30df), 0x00),
    rv(reg8(0x3165), 0x00),
    rv(reg8(0x3169), 0x10),
    rv(reg8(0x316a), 0x02),
    rv(reg8(0x31c8), 0xf3),
    rv(reg8(0x31d0), 0xf4),
    rv(reg8(0x321a), 0x00),
    rv(reg8(0x3226), 0x02),
    rv(reg8(0x3256), 0x01),
    rv(reg8(0x3541), 0x72),
    rv(reg8(0x3516), 0x77),
    rv(reg8(0x350b), 0x7f),
    rv(reg8(0x3758), 0xa3),
    rv(reg8(0x3759), 0x00),
    rv(reg8(0x375a), 0x85),
    rv(reg8(0x375b), 0x00),
    rv(reg8(0x3832), 0xf5),
    rv(reg8(0x3833), 0x00),
    rv(reg8(0x38a2), 0xf6),
    rv(reg8(0x38a3), 0x00),
    rv(reg8(0x3a00), 0x80),
    rv(reg8(0x3d48), 0xa3),
    rv(reg8(0x3d49), 0x00),
    rv(reg8(0x3d4a), 0x85),
    rv(reg8(0x3d4b), 0x00),
    rv(reg8(0x400e), 0x58),
    rv(reg8(0x4014), 0x1c),
    rv(reg8(0x4041), 0x2a),
    rv(reg8(0x40a2), 0x06),
    rv(reg8(0x40c1), 0xf6),
    rv(reg8(0x40c7), 0x0f),
    rv(reg8(0x40c8), 0x00),
    rv(reg8(0x4174), 0x00),
];

const fn clock_regs(sel0: u32, sel1: u32, sel2: u32, sel3: u32, inck: u32) -> [RegValue; 5] {
    [
        rv(REG_INCKSEL0, sel0),
        rv(REG_INCKSEL1, sel1),
        rv(REG_INCKSEL2, sel2),
        rv(REG_INCKSEL3, sel3),
        rv(REG_INCK, inck),
    ]
}

static CLK_37_125_MHZ: [RegValue; 5] = clock_regs(0x80, 0x0b, 0x80, 0x08, 0x74);
static CLK_54_000_MHZ: [RegValue; 5] = clock_regs(0xb0, 0x0f, 0xb0, 0x0c, 0xa8);
static CLK_74_250_MHZ: [RegValue; 5] = clock_regs(0x80, 0x0f, 0x80, 0x0c, 0xe8);

/// Region of interest at the top left corner, with blanking
const fn size_regs(width: u32, height: u32) -> [RegValue; 7] {
    [
        rv(REG_FID0_ROI_ON, 0b11),
        rv(REG_FID0_ROIPH1, 0),
        rv(REG_FID0_ROIPV1, 0),
        rv(REG_FID0_ROIWH1, width),
        rv(REG_FID0_ROIWV1, height),
        rv(REG_HMAX, width + 32),
        rv(REG_VMAX, height + 64),
    ]
}

static SIZE_640X480: [RegValue; 7] = size_regs(640, 480);

const CAP_640X480: FormatCap = FormatCap::fixed(PixelFormat::SGBRG8, 640, 480);

static MODES_37_125: [Mode; 1] = [Mode::new(30, &[&SIZE_640X480, &CLK_37_125_MHZ])];
static MODES_54_000: [Mode; 1] = [Mode::new(30, &[&SIZE_640X480, &CLK_54_000_MHZ])];
static MODES_74_250: [Mode; 1] = [Mode::new(30, &[&SIZE_640X480, &CLK_74_250_MHZ])];

static FORMATS_37_125: [ImagerFormat; 1] = [ImagerFormat {
    cap: CAP_640X480,
    modes: &MODES_37_125,
}];
static FORMATS_54_000: [ImagerFormat; 1] = [ImagerFormat {
    cap: CAP_640X480,
    modes: &MODES_54_000,
}];
static FORMATS_74_250: [ImagerFormat; 1] = [ImagerFormat {
    cap: CAP_640X480,
    modes: &MODES_74_250,
}];

/// Frequency of the INCK input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputClock {
    Mhz37_125,
    /// Raspberry Pi global shutter camera module
    Mhz54,
    Mhz74_25,
}

impl Default for InputClock {
    fn default() -> Self {
        InputClock::Mhz54
    }
}

impl InputClock {
    pub fn formats(self) -> &'static [ImagerFormat] {
        match self {
            InputClock::Mhz37_125 => &FORMATS_37_125,
            InputClock::Mhz54 => &FORMATS_54_000,
            InputClock::Mhz74_25 => &FORMATS_74_250,
        }
    }
}

pub struct Imx296<I2C, D> {
    imager: Imager<I2C, D>,
}

impl<I2C, D, CommE> Imx296<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    pub fn new(cci: Cci<I2C, D>, clock: InputClock) -> Self {
        Self {
            imager: Imager::new(cci, clock.formats()),
        }
    }

    pub fn default(i2c: I2C, delay: D) -> Self {
        Self::new(
            Cci::new(i2c, DEFAULT_I2C_ADDRESS, delay),
            InputClock::default(),
        )
    }

    pub fn release(self) -> Cci<I2C, D> {
        self.imager.release()
    }

    pub fn init(&mut self) -> Result<(), Error<CommE>> {
        self.imager.init(&INIT_REGS, 0)
    }
}

impl<I2C, D, CommE> VideoDevice for Imx296<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    type CommError = CommE;

    fn get_caps(&self, ep: Endpoint) -> Result<Caps, Error<CommE>> {
        self.imager.get_caps(ep)
    }

    fn set_format(&mut self, ep: Endpoint, fmt: &Format) -> Result<(), Error<CommE>> {
        self.imager.set_format(ep, fmt)
    }

    fn get_format(&self, ep: Endpoint) -> Result<Format, Error<CommE>> {
        self.imager.get_format(ep)
    }

    fn set_frame_interval(
        &mut self,
        ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<CommE>> {
        self.imager.set_frame_interval(ep, interval)
    }

    fn get_frame_interval(&self, ep: Endpoint) -> Result<FrameInterval, Error<CommE>> {
        self.imager.get_frame_interval(ep)
    }

    fn enum_frame_interval(
        &self,
        ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<CommE>> {
        self.imager.enum_frame_interval(ep, fmt, index)
    }

    /// Leave standby, then start the master sequence. Stop in reverse.
    fn set_stream(&mut self, on: bool) -> Result<(), Error<CommE>> {
        let cci = self.imager.cci();
        if on {
            cci.write_reg(REG_STANDBY, 0x00)?;
            cci.delay_ms(STANDBY_EXIT_MS);
            cci.write_reg(REG_XMSTA, 0x00)
        } else {
            cci.write_reg(REG_XMSTA, 0x01)?;
            cci.write_reg(REG_STANDBY, 0x01)
        }
    }
}
