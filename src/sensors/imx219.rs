/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Sony IMX219 8MP rolling shutter sensor.
//! The full 3280x2464 array is cropped around its center to the output size.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::cci::{Cci, Endianness, Reg, RegValue};
use crate::device::{find_control, Control, ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FormatCap, FrameInterval, PixelFormat};
use crate::imager::{Imager, ImagerFormat, Mode};
use crate::Error;

pub const DEFAULT_I2C_ADDRESS: u8 = 0x10;
pub const CHIP_ID: u32 = 0x0219;

pub const FULL_WIDTH: u32 = 3280;
pub const FULL_HEIGHT: u32 = 2464;

const fn reg8(addr: u16) -> Reg {
    Reg::addr16_data8(addr)
}

const fn reg16(addr: u16) -> Reg {
    Reg::new(addr, 2, 2, Endianness::Big)
}

const fn rv(reg: Reg, value: u32) -> RegValue {
    RegValue::new(reg, value)
}

pub const REG_CHIP_ID: Reg = reg16(0x0000);
pub const REG_MODE_SELECT: Reg = reg8(0x0100);
pub const REG_SOFTWARE_RESET: Reg = reg8(0x0103);
pub const REG_CSI_LANE_MODE: Reg = reg8(0x0114);
pub const REG_DPHY_CTRL: Reg = reg8(0x0128);
pub const REG_EXCK_FREQ: Reg = reg16(0x012a);
pub const REG_ANALOG_GAIN: Reg = reg8(0x0157);
pub const REG_DIGITAL_GAIN: Reg = reg16(0x0158);
pub const REG_INTEGRATION_TIME: Reg = reg16(0x015a);
pub const REG_FRM_LENGTH_A: Reg = reg16(0x0160);
pub const REG_LINE_LENGTH_A: Reg = reg16(0x0162);
pub const REG_X_ADD_STA_A: Reg = reg16(0x0164);
pub const REG_X_ADD_END_A: Reg = reg16(0x0166);
pub const REG_Y_ADD_STA_A: Reg = reg16(0x0168);
pub const REG_Y_ADD_END_A: Reg = reg16(0x016a);
pub const REG_X_OUTPUT_SIZE: Reg = reg16(0x016c);
pub const REG_Y_OUTPUT_SIZE: Reg = reg16(0x016e);
pub const REG_X_ODD_INC_A: Reg = reg8(0x0170);
pub const REG_Y_ODD_INC_A: Reg = reg8(0x0171);
pub const REG_ORIENTATION: Reg = reg8(0x0172);
pub const REG_BINNING_MODE_H: Reg = reg8(0x0174);
pub const REG_BINNING_MODE_V: Reg = reg8(0x0175);
pub const REG_CSI_DATA_FORMAT_A0: Reg = reg8(0x018c);
pub const REG_CSI_DATA_FORMAT_A1: Reg = reg8(0x018d);
pub const REG_VTPXCK_DIV: Reg = reg8(0x0301);
pub const REG_VTSYCK_DIV: Reg = reg8(0x0303);
pub const REG_PREPLLCK_VT_DIV: Reg = reg8(0x0304);
pub const REG_PREPLLCK_OP_DIV: Reg = reg8(0x0305);
pub const REG_PLL_VT_MPY: Reg = reg16(0x0306);
pub const REG_OPPXCK_DIV: Reg = reg8(0x0309);
pub const REG_OPSYCK_DIV: Reg = reg8(0x030b);
pub const REG_PLL_OP_MPY: Reg = reg16(0x030c);
pub const REG_TEST_PATTERN: Reg = reg16(0x0600);
pub const REG_TP_WINDOW_WIDTH: Reg = reg16(0x0624);
pub const REG_TP_WINDOW_HEIGHT: Reg = reg16(0x0626);
pub const REG_DT_PEDESTAL: Reg = reg16(0xd1ea);

const MODE_STANDBY: u32 = 0x00;
const MODE_STREAMING: u32 = 0x01;

static INIT_REGS: [RegValue; 29] = [
    rv(REG_MODE_SELECT, MODE_STANDBY),
    // unlock the 0x3000..0x5fff register window
    rv(reg8(0x30eb), 0x05),
    rv(reg8(0x30eb), 0x0c),
    rv(reg8(0x300a), 0xff),
    rv(reg8(0x300b), 0xff),
    rv(reg8(0x30eb), 0x05),
    rv(reg8(0x30eb), 0x09),
    // 2 lanes, automatic D-PHY timing
    rv(REG_CSI_LANE_MODE, 0x01),
    rv(REG_DPHY_CTRL, 0x00),
    // 24 MHz input clock
    rv(REG_EXCK_FREQ, 24 << 8),
    rv(reg8(0x455e), 0x00),
    rv(reg8(0x471e), 0x4b),
    rv(reg8(0x4767), 0x0f),
    rv(reg8(0x4750), 0x14),
    rv(reg8(0x4540), 0x00),
    rv(reg8(0x47b4), 0x14),
    rv(reg8(0x4713), 0x30),
    rv(reg8(0x478b), 0x10),
    rv(reg8(0x478f), 0x10),
    rv(reg8(0x4793), 0x10),
    rv(reg8(0x4797), 0x0e),
    rv(reg8(0x479b), 0x0e),
    rv(REG_LINE_LENGTH_A, 3448),
    rv(REG_X_ODD_INC_A, 1),
    rv(REG_Y_ODD_INC_A, 1),
    rv(REG_BINNING_MODE_H, 0x00),
    rv(REG_BINNING_MODE_V, 0x00),
    rv(REG_ORIENTATION, 0x03),
    rv(REG_INTEGRATION_TIME, 500),
];

static RAW10_REGS: [RegValue; 3] = [
    rv(REG_CSI_DATA_FORMAT_A0, 10),
    rv(REG_CSI_DATA_FORMAT_A1, 10),
    rv(REG_OPPXCK_DIV, 10),
];

/// PLL setup. The video timing multiplier sets the frame rate.
const fn pll_regs(vt_mpy: u32) -> [RegValue; 8] {
    [
        rv(REG_PREPLLCK_VT_DIV, 0x03),
        rv(REG_PREPLLCK_OP_DIV, 0x03),
        rv(REG_VTPXCK_DIV, 4),
        rv(REG_VTSYCK_DIV, 1),
        rv(REG_OPPXCK_DIV, 10),
        rv(REG_OPSYCK_DIV, 1),
        rv(REG_PLL_VT_MPY, vt_mpy),
        rv(REG_PLL_OP_MPY, 50),
    ]
}

static FPS_30_REGS: [RegValue; 8] = pll_regs(30);
static FPS_15_REGS: [RegValue; 8] = pll_regs(15);

/// Centered crop window, output size and test pattern window
const fn size_regs(width: u32, height: u32) -> [RegValue; 9] {
    [
        rv(REG_X_ADD_STA_A, (FULL_WIDTH - width) / 2),
        rv(REG_X_ADD_END_A, (FULL_WIDTH + width) / 2 - 1),
        rv(REG_Y_ADD_STA_A, (FULL_HEIGHT - height) / 2),
        rv(REG_Y_ADD_END_A, (FULL_HEIGHT + height) / 2 - 1),
        rv(REG_X_OUTPUT_SIZE, width),
        rv(REG_Y_OUTPUT_SIZE, height),
        rv(REG_FRM_LENGTH_A, height + 20),
        rv(REG_TP_WINDOW_WIDTH, width),
        rv(REG_TP_WINDOW_HEIGHT, height),
    ]
}

static SIZE_1920X1080_REGS: [RegValue; 9] = size_regs(1920, 1080);

static MODES_1920X1080: [Mode; 2] = [
    Mode::new(30, &[&RAW10_REGS, &SIZE_1920X1080_REGS, &FPS_30_REGS]),
    Mode::new(15, &[&RAW10_REGS, &SIZE_1920X1080_REGS, &FPS_15_REGS]),
];

pub static FORMATS: [ImagerFormat; 1] = [ImagerFormat {
    cap: FormatCap::fixed(PixelFormat::SBGGR8, 1920, 1080),
    modes: &MODES_1920X1080,
}];

/// Frame rate selected by `init`
pub const DEFAULT_FPS: u32 = 15;

pub const TEST_PATTERN_MENU: [&str; 10] = [
    "Off",
    "Solid color",
    "100% color bars",
    "Fade to grey color bar",
    "PN9",
    "16 split color bar",
    "16 split inverted color bar",
    "Column counter",
    "Inverted column counter",
    "PN31",
];

pub struct Imx219<I2C, D> {
    imager: Imager<I2C, D>,
    controls: [Control; 5],
}

impl<I2C, D, CommE> Imx219<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    pub fn new(cci: Cci<I2C, D>) -> Self {
        Self {
            imager: Imager::new(cci, &FORMATS),
            controls: [
                Control::new(ControlId::Exposure, 0x0000, 0xffff, 1, 1000),
                Control::new(ControlId::Brightness, 0x000, 0x3ff, 1, 40),
                Control::new(ControlId::AnalogueGain, 0x00, 0xff, 1, 0x00),
                Control::new(ControlId::Gain, 0x000, 0xfff, 1, 0x100),
                Control::menu(ControlId::TestPattern, TEST_PATTERN_MENU.len() as i32),
            ],
        }
    }

    pub fn default(i2c: I2C, delay: D) -> Self {
        Self::new(Cci::new(i2c, DEFAULT_I2C_ADDRESS, delay))
    }

    pub fn release(self) -> Cci<I2C, D> {
        self.imager.release()
    }

    /// Reset, identify, and bring the sensor to 1920x1080 at 15 fps
    pub fn init(&mut self) -> Result<(), Error<CommE>> {
        #[cfg(feature = "rttdebug")]
        rprintln!("imx219 init start");

        let cci = self.imager.cci();
        cci.delay_ms(1);
        cci.write_reg(REG_SOFTWARE_RESET, 1)?;
        cci.delay_ms(6);

        let id = cci.read_reg(REG_CHIP_ID)?;
        if id != CHIP_ID {
            #[cfg(feature = "rttdebug")]
            rprintln!("imx219 wrong chip id {:04x}", id);
            return Err(Error::WrongChipId(id));
        }

        self.imager.init(&INIT_REGS, 0)?;
        self.imager
            .set_frame_interval(Endpoint::Out, &FrameInterval::from_fps(DEFAULT_FPS))?;

        #[cfg(feature = "rttdebug")]
        rprintln!("imx219 init done");
        Ok(())
    }

    fn control_register(id: ControlId) -> Reg {
        match id {
            ControlId::Exposure => REG_INTEGRATION_TIME,
            ControlId::Brightness => REG_DT_PEDESTAL,
            ControlId::AnalogueGain => REG_ANALOG_GAIN,
            ControlId::Gain => REG_DIGITAL_GAIN,
            ControlId::TestPattern => REG_TEST_PATTERN,
        }
    }
}

impl<I2C, D, CommE> VideoDevice for Imx219<I2C, D>
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

    fn set_stream(&mut self, on: bool) -> Result<(), Error<CommE>> {
        let mode = if on { MODE_STREAMING } else { MODE_STANDBY };
        self.imager.cci().write_reg(REG_MODE_SELECT, mode)
    }

    fn set_ctrl(&mut self, id: ControlId, value: i32) -> Result<(), Error<CommE>> {
        let ctrl = find_control(&mut self.controls, id)?;
        ctrl.validate(value)?;
        self.imager
            .cci()
            .write_reg(Self::control_register(id), value as u32)?;
        ctrl.commit(value);
        Ok(())
    }

    fn get_ctrl(&self, id: ControlId) -> Result<i32, Error<CommE>> {
        self.controls
            .iter()
            .find(|c| c.id == id)
            .map(Control::value)
            .ok_or(Error::Unsupported)
    }
}
