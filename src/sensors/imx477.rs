/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Sony IMX477 12.3MP rolling shutter sensor, on a board with a 24 MHz
//! external clock and a single CSI-2 lane.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::cci::{Cci, Endianness, Reg, RegValue};
use crate::device::{find_control, Control, ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FormatCap, FrameInterval, PixelFormat};
use crate::imager::{Imager, ImagerFormat, Mode};
use crate::Error;

pub const DEFAULT_I2C_ADDRESS: u8 = 0x1a;
pub const CHIP_ID: u32 = 0x0477;

pub const FULL_WIDTH: u32 = 4072;
pub const FULL_HEIGHT: u32 = 3176;

const fn reg8(addr: u16) -> Reg {
    Reg::addr16_data8(addr)
}

const fn reg16(addr: u16) -> Reg {
    Reg::new(addr, 2, 2, Endianness::Big)
}

const fn reg32(addr: u16) -> Reg {
    Reg::new(addr, 2, 4, Endianness::Big)
}

const fn rv(reg: Reg, value: u32) -> RegValue {
    RegValue::new(reg, value)
}

pub const REG_CHIP_ID: Reg = reg16(0x0016);
pub const REG_MODE_SEL: Reg = reg8(0x0100);
pub const REG_SW_RESET: Reg = reg8(0x0103);
pub const REG_TEST_PATTERN: Reg = reg16(0x0600);
pub const REG_ADC_BIT_SETTING: Reg = reg8(0x3f0d);
pub const REG_BINNING_HV: Reg = reg8(0x0901);
pub const REG_BINNING_MODE: Reg = reg8(0x0900);
pub const REG_BINNING_WEIGHTING: Reg = reg8(0x0902);
pub const REG_CIT_LSHIFT_LONG_EXP: Reg = reg8(0x3100);
pub const REG_CSI_FORMAT_C: Reg = reg8(0x0112);
pub const REG_CSI_FORMAT_D: Reg = reg8(0x0113);
pub const REG_CSI_LANE: Reg = reg8(0x0114);
pub const REG_DIG_CROP_HEIGHT: Reg = reg16(0x040e);
pub const REG_DIG_CROP_WIDTH: Reg = reg16(0x040c);
pub const REG_DIG_CROP_X_OFFSET: Reg = reg16(0x0408);
pub const REG_DIG_CROP_Y_OFFSET: Reg = reg16(0x040a);
pub const REG_DPGA_GLOBEL_GAIN: Reg = reg8(0x3ff9);
pub const REG_DPHY_CTRL: Reg = reg8(0x0808);
pub const REG_EBD_SIZE_V: Reg = reg8(0xbcf1);
pub const REG_EXCK_FREQ: Reg = reg16(0x0136);
pub const REG_FRAME_BLANKSTOP_CTRL: Reg = reg8(0xe000);
pub const REG_FRAME_LEN: Reg = reg16(0x0340);
pub const REG_FRAME_LENGTH_CTRL: Reg = reg8(0x0350);
pub const REG_IOPPXCK_DIV: Reg = reg8(0x0309);
pub const REG_IOPSYCK_DIV: Reg = reg8(0x030b);
pub const REG_IOP_PLL_MPY: Reg = reg16(0x030e);
pub const REG_IOP_PREPLLCK_DIV: Reg = reg8(0x030d);
pub const REG_IVTPXCK_DIV: Reg = reg8(0x0301);
pub const REG_IVTSYCK_DIV: Reg = reg8(0x0303);
pub const REG_IVT_PLL_MPY: Reg = reg16(0x0306);
pub const REG_IVT_PREPLLCK_DIV: Reg = reg8(0x0305);
pub const REG_LINE_LEN: Reg = reg16(0x0342);
pub const REG_LINE_LEN_INCLK: Reg = reg16(0x3f56);
pub const REG_MAP_COUPLET_CORR: Reg = reg8(0x0b05);
pub const REG_PDAF_CTRL1_0: Reg = reg8(0x3e37);
pub const REG_PD_AREA_HEIGHT: Reg = reg16(0x38aa);
pub const REG_PD_AREA_WIDTH: Reg = reg16(0x38a8);
pub const REG_PLL_MULTI_DRIVE: Reg = reg8(0x0310);
pub const REG_POWER_SAVE_ENABLE: Reg = reg8(0x3f50);
pub const REG_REQ_LINK_BIT_RATE: Reg = reg32(0x0820);
pub const REG_SCALE_M: Reg = reg16(0x0404);
pub const REG_SCALE_MODE: Reg = reg8(0x0401);
pub const REG_SING_DYNAMIC_CORR: Reg = reg8(0x0b06);
pub const REG_TCLK_POST_EX: Reg = reg16(0x080a);
pub const REG_TCLK_PREP_EX: Reg = reg16(0x0814);
pub const REG_TCLK_TRAIL_MIN: Reg = reg16(0x0812);
pub const REG_TCLK_ZERO_EX: Reg = reg16(0x0816);
pub const REG_TEMP_SENS_CTL: Reg = reg8(0x0138);
pub const REG_THS_PRE_EX: Reg = reg16(0x080c);
pub const REG_THS_TRAIL_EX: Reg = reg16(0x0810);
pub const REG_THS_ZERO_MIN: Reg = reg16(0x080e);
pub const REG_TLPX_EX: Reg = reg16(0x0818);
pub const REG_X_ADD_END: Reg = reg16(0x0348);
pub const REG_X_ADD_STA: Reg = reg16(0x0344);
pub const REG_X_ENV_INC_CONST: Reg = reg8(0x0381);
pub const REG_X_ODD_INC_CONST: Reg = reg8(0x0383);
pub const REG_X_OUT_SIZE: Reg = reg16(0x034c);
pub const REG_Y_ADD_END: Reg = reg16(0x034a);
pub const REG_Y_ADD_STA: Reg = reg16(0x0346);
pub const REG_Y_ENV_INC_CONST: Reg = reg8(0x0385);
pub const REG_Y_ODD_INC: Reg = reg8(0x0387);
pub const REG_Y_OUT_SIZE: Reg = reg16(0x034e);

/// Settling time around power up and software reset
const RESET_DELAY_MS: u32 = 10;

static INIT_REGS: [RegValue; 306] = [
    rv(REG_EXCK_FREQ, 0x1800),
    rv(REG_TEMP_SENS_CTL, 0x01),
    rv(REG_FRAME_BLANKSTOP_CTRL, 0x01),
    rv(reg8(0xe07a), 0x01),
    rv(REG_DPHY_CTRL, 0x02),
    rv(reg8(0x4ae9), 0x18),
    rv(reg8(0x4aea), 0x08),
    rv(reg8(0xf61c), 0x04),
    rv(reg8(0xf61e), 0x04),
    rv(reg8(0x4ae9), 0x21),
    rv(reg8(0x4aea), 0x80),
    rv(REG_PD_AREA_WIDTH, 0x1fff),
    rv(REG_PD_AREA_HEIGHT, 0x1fff),
    rv(reg8(0x55d4), 0x00),
    rv(reg8(0x55d5), 0x00),
    rv(reg8(0x55d6), 0x07),
    rv(reg8(0x55d7), 0xff),
    rv(reg8(0x55e8), 0x07),
    rv(reg8(0x55e9), 0xff),
    rv(reg8(0x55ea), 0x00),
    rv(reg8(0x55eb), 0x00),
    rv(reg8(0x574c), 0x07),
    rv(reg8(0x574d), 0xff),
    rv(reg8(0x574e), 0x00),
    rv(reg8(0x574f), 0x00),
    rv(reg8(0x5754), 0x00),
    rv(reg8(0x5755), 0x00),
    rv(reg8(0x5756), 0x07),
    rv(reg8(0x5757), 0xff),
    rv(reg8(0x5973), 0x04),
    rv(reg8(0x5974), 0x01),
    rv(reg8(0x5d13), 0xc3),
    rv(reg8(0x5d14), 0x58),
    rv(reg8(0x5d15), 0xa3),
    rv(reg8(0x5d16), 0x1d),
    rv(reg8(0x5d17), 0x65),
    rv(reg8(0x5d18), 0x8c),
    rv(reg8(0x5d1a), 0x06),
    rv(reg8(0x5d1b), 0xa9),
    rv(reg8(0x5d1c), 0x45),
    rv(reg8(0x5d1d), 0x3a),
    rv(reg8(0x5d1e), 0xab),
    rv(reg8(0x5d1f), 0x15),
    rv(reg8(0x5d21), 0x0e),
    rv(reg8(0x5d22), 0x52),
    rv(reg8(0x5d23), 0xaa),
    rv(reg8(0x5d24), 0x7d),
    rv(reg8(0x5d25), 0x57),
    rv(reg8(0x5d26), 0xa8),
    rv(reg8(0x5d37), 0x5a),
    rv(reg8(0x5d38), 0x5a),
    rv(reg8(0x5d77), 0x7f),
    rv(reg8(0x7b75), 0x0e),
    rv(reg8(0x7b76), 0x0b),
    rv(reg8(0x7b77), 0x08),
    rv(reg8(0x7b78), 0x0a),
    rv(reg8(0x7b79), 0x47),
    rv(reg8(0x7b7c), 0x00),
    rv(reg8(0x7b7d), 0x00),
    rv(reg8(0x8d1f), 0x00),
    rv(reg8(0x8d27), 0x00),
    rv(reg8(0x9004), 0x03),
    rv(reg8(0x9200), 0x50),
    rv(reg8(0x9201), 0x6c),
    rv(reg8(0x9202), 0x71),
    rv(reg8(0x9203), 0x00),
    rv(reg8(0x9204), 0x71),
    rv(reg8(0x9205), 0x01),
    rv(reg8(0x9371), 0x6a),
    rv(reg8(0x9373), 0x6a),
    rv(reg8(0x9375), 0x64),
    rv(reg8(0x991a), 0x00),
    rv(reg8(0x996b), 0x8c),
    rv(reg8(0x996c), 0x64),
    rv(reg8(0x996d), 0x50),
    rv(reg8(0x9a4c), 0x0d),
    rv(reg8(0x9a4d), 0x0d),
    rv(reg8(0xa001), 0x0a),
    rv(reg8(0xa003), 0x0a),
    rv(reg8(0xa005), 0x0a),
    rv(reg8(0xa006), 0x01),
    rv(reg8(0xa007), 0xc0),
    rv(reg8(0xa009), 0xc0),
    rv(reg8(0x3d8a), 0x01),
    rv(reg8(0x4421), 0x04),
    rv(reg8(0x7b3b), 0x01),
    rv(reg8(0x7b4c), 0x00),
    rv(reg8(0x9905), 0x00),
    rv(reg8(0x9907), 0x00),
    rv(reg8(0x9909), 0x00),
    rv(reg8(0x990b), 0x00),
    rv(reg8(0x9944), 0x3c),
    rv(reg8(0x9947), 0x3c),
    rv(reg8(0x994a), 0x8c),
    rv(reg8(0x994b), 0x50),
    rv(reg8(0x994c), 0x1b),
    rv(reg8(0x994d), 0x8c),
    rv(reg8(0x994e), 0x50),
    rv(reg8(0x994f), 0x1b),
    rv(reg8(0x9950), 0x8c),
    rv(reg8(0x9951), 0x1b),
    rv(reg8(0x9952), 0x0a),
    rv(reg8(0x9953), 0x8c),
    rv(reg8(0x9954), 0x1b),
    rv(reg8(0x9955), 0x0a),
    rv(reg8(0x9a13), 0x04),
    rv(reg8(0x9a14), 0x04),
    rv(reg8(0x9a19), 0x00),
    rv(reg8(0x9a1c), 0x04),
    rv(reg8(0x9a1d), 0x04),
    rv(reg8(0x9a26), 0x05),
    rv(reg8(0x9a27), 0x05),
    rv(reg8(0x9a2c), 0x01),
    rv(reg8(0x9a2d), 0x03),
    rv(reg8(0x9a2f), 0x05),
    rv(reg8(0x9a30), 0x05),
    rv(reg8(0x9a41), 0x00),
    rv(reg8(0x9a46), 0x00),
    rv(reg8(0x9a47), 0x00),
    rv(reg8(0x9c17), 0x35),
    rv(reg8(0x9c1d), 0x31),
    rv(reg8(0x9c29), 0x50),
    rv(reg8(0x9c3b), 0x2f),
    rv(reg8(0x9c41), 0x6b),
    rv(reg8(0x9c47), 0x2d),
    rv(reg8(0x9c4d), 0x40),
    rv(reg8(0x9c6b), 0x00),
    rv(reg8(0x9c71), 0xc8),
    rv(reg8(0x9c73), 0x32),
    rv(reg8(0x9c75), 0x04),
    rv(reg8(0x9c7d), 0x2d),
    rv(reg8(0x9c83), 0x40),
    rv(reg8(0x9c94), 0x3f),
    rv(reg8(0x9c95), 0x3f),
    rv(reg8(0x9c96), 0x3f),
    rv(reg8(0x9c97), 0x00),
    rv(reg8(0x9c98), 0x00),
    rv(reg8(0x9c99), 0x00),
    rv(reg8(0x9c9a), 0x3f),
    rv(reg8(0x9c9b), 0x3f),
    rv(reg8(0x9c9c), 0x3f),
    rv(reg8(0x9ca0), 0x0f),
    rv(reg8(0x9ca1), 0x0f),
    rv(reg8(0x9ca2), 0x0f),
    rv(reg8(0x9ca3), 0x00),
    rv(reg8(0x9ca4), 0x00),
    rv(reg8(0x9ca5), 0x00),
    rv(reg8(0x9ca6), 0x1e),
    rv(reg8(0x9ca7), 0x1e),
    rv(reg8(0x9ca8), 0x1e),
    rv(reg8(0x9ca9), 0x00),
    rv(reg8(0x9caa), 0x00),
    rv(reg8(0x9cab), 0x00),
    rv(reg8(0x9cac), 0x09),
    rv(reg8(0x9cad), 0x09),
    rv(reg8(0x9cae), 0x09),
    rv(reg8(0x9cbd), 0x50),
    rv(reg8(0x9cbf), 0x50),
    rv(reg8(0x9cc1), 0x50),
    rv(reg8(0x9cc3), 0x40),
    rv(reg8(0x9cc5), 0x40),
    rv(reg8(0x9cc7), 0x40),
    rv(reg8(0x9cc9), 0x0a),
    rv(reg8(0x9ccb), 0x0a),
    rv(reg8(0x9ccd), 0x0a),
    rv(reg8(0x9d17), 0x35),
    rv(reg8(0x9d1d), 0x31),
    rv(reg8(0x9d29), 0x50),
    rv(reg8(0x9d3b), 0x2f),
    rv(reg8(0x9d41), 0x6b),
    rv(reg8(0x9d47), 0x42),
    rv(reg8(0x9d4d), 0x5a),
    rv(reg8(0x9d6b), 0x00),
    rv(reg8(0x9d71), 0xc8),
    rv(reg8(0x9d73), 0x32),
    rv(reg8(0x9d75), 0x04),
    rv(reg8(0x9d7d), 0x42),
    rv(reg8(0x9d83), 0x5a),
    rv(reg8(0x9d94), 0x3f),
    rv(reg8(0x9d95), 0x3f),
    rv(reg8(0x9d96), 0x3f),
    rv(reg8(0x9d97), 0x00),
    rv(reg8(0x9d98), 0x00),
    rv(reg8(0x9d99), 0x00),
    rv(reg8(0x9d9a), 0x3f),
    rv(reg8(0x9d9b), 0x3f),
    rv(reg8(0x9d9c), 0x3f),
    rv(reg8(0x9d9d), 0x1f),
    rv(reg8(0x9d9e), 0x1f),
    rv(reg8(0x9d9f), 0x1f),
    rv(reg8(0x9da0), 0x0f),
    rv(reg8(0x9da1), 0x0f),
    rv(reg8(0x9da2), 0x0f),
    rv(reg8(0x9da3), 0x00),
    rv(reg8(0x9da4), 0x00),
    rv(reg8(0x9da5), 0x00),
    rv(reg8(0x9da6), 0x1e),
    rv(reg8(0x9da7), 0x1e),
    rv(reg8(0x9da8), 0x1e),
    rv(reg8(0x9da9), 0x00),
    rv(reg8(0x9daa), 0x00),
    rv(reg8(0x9dab), 0x00),
    rv(reg8(0x9dac), 0x09),
    rv(reg8(0x9dad), 0x09),
    rv(reg8(0x9dae), 0x09),
    rv(reg8(0x9dc9), 0x0a),
    rv(reg8(0x9dcb), 0x0a),
    rv(reg8(0x9dcd), 0x0a),
    rv(reg8(0x9e17), 0x35),
    rv(reg8(0x9e1d), 0x31),
    rv(reg8(0x9e29), 0x50),
    rv(reg8(0x9e3b), 0x2f),
    rv(reg8(0x9e41), 0x6b),
    rv(reg8(0x9e47), 0x2d),
    rv(reg8(0x9e4d), 0x40),
    rv(reg8(0x9e6b), 0x00),
    rv(reg8(0x9e71), 0xc8),
    rv(reg8(0x9e73), 0x32),
    rv(reg8(0x9e75), 0x04),
    rv(reg8(0x9e94), 0x0f),
    rv(reg8(0x9e95), 0x0f),
    rv(reg8(0x9e96), 0x0f),
    rv(reg8(0x9e97), 0x00),
    rv(reg8(0x9e98), 0x00),
    rv(reg8(0x9e99), 0x00),
    rv(reg8(0x9ea0), 0x0f),
    rv(reg8(0x9ea1), 0x0f),
    rv(reg8(0x9ea2), 0x0f),
    rv(reg8(0x9ea3), 0x00),
    rv(reg8(0x9ea4), 0x00),
    rv(reg8(0x9ea5), 0x00),
    rv(reg8(0x9ea6), 0x3f),
    rv(reg8(0x9ea7), 0x3f),
    rv(reg8(0x9ea8), 0x3f),
    rv(reg8(0x9ea9), 0x00),
    rv(reg8(0x9eaa), 0x00),
    rv(reg8(0x9eab), 0x00),
    rv(reg8(0x9eac), 0x09),
    rv(reg8(0x9ead), 0x09),
    rv(reg8(0x9eae), 0x09),
    rv(reg8(0x9ec9), 0x0a),
    rv(reg8(0x9ecb), 0x0a),
    rv(reg8(0x9ecd), 0x0a),
    rv(reg8(0x9f17), 0x35),
    rv(reg8(0x9f1d), 0x31),
    rv(reg8(0x9f29), 0x50),
    rv(reg8(0x9f3b), 0x2f),
    rv(reg8(0x9f41), 0x6b),
    rv(reg8(0x9f47), 0x42),
    rv(reg8(0x9f4d), 0x5a),
    rv(reg8(0x9f6b), 0x00),
    rv(reg8(0x9f71), 0xc8),
    rv(reg8(0x9f73), 0x32),
    rv(reg8(0x9f75), 0x04),
    rv(reg8(0x9f94), 0x0f),
    rv(reg8(0x9f95), 0x0f),
    rv(reg8(0x9f96), 0x0f),
    rv(reg8(0x9f97), 0x00),
    rv(reg8(0x9f98), 0x00),
    rv(reg8(0x9f99), 0x00),
    rv(reg8(0x9f9a), 0x2f),
    rv(reg8(0x9f9b), 0x2f),
    rv(reg8(0x9f9c), 0x2f),
    rv(reg8(0x9f9d), 0x00),
    rv(reg8(0x9f9e), 0x00),
    rv(reg8(0x9f9f), 0x00),
    rv(reg8(0x9fa0), 0x0f),
    rv(reg8(0x9fa1), 0x0f),
    rv(reg8(0x9fa2), 0x0f),
    rv(reg8(0x9fa3), 0x00),
    rv(reg8(0x9fa4), 0x00),
    rv(reg8(0x9fa5), 0x00),
    rv(reg8(0x9fa6), 0x1e),
    rv(reg8(0x9fa7), 0x1e),
    rv(reg8(0x9fa8), 0x1e),
    rv(reg8(0x9fa9), 0x00),
    rv(reg8(0x9faa), 0x00),
    rv(reg8(0x9fab), 0x00),
    rv(reg8(0x9fac), 0x09),
    rv(reg8(0x9fad), 0x09),
    rv(reg8(0x9fae), 0x09),
    rv(reg8(0x9fc9), 0x0a),
    rv(reg8(0x9fcb), 0x0a),
    rv(reg8(0x9fcd), 0x0a),
    rv(reg8(0xa14b), 0xff),
    rv(reg8(0xa151), 0x0c),
    rv(reg8(0xa153), 0x50),
    rv(reg8(0xa155), 0x02),
    rv(reg8(0xa157), 0x00),
    rv(reg8(0xa1ad), 0xff),
    rv(reg8(0xa1b3), 0x0c),
    rv(reg8(0xa1b5), 0x50),
    rv(reg8(0xa1b9), 0x00),
    rv(reg8(0xa24b), 0xff),
    rv(reg8(0xa257), 0x00),
    rv(reg8(0xa2ad), 0xff),
    rv(reg8(0xa2b9), 0x00),
    rv(reg8(0xb21f), 0x04),
    rv(reg8(0xb35c), 0x00),
    rv(reg8(0xb35e), 0x08),
    rv(REG_CSI_FORMAT_C, 0x0c),
    rv(REG_CSI_FORMAT_D, 0x0c),
    rv(REG_CSI_LANE, 0x01),
    rv(REG_FRAME_LENGTH_CTRL, 0x00),
    rv(REG_EBD_SIZE_V, 0x02),
    rv(REG_DPGA_GLOBEL_GAIN, 0x01),
];

/// 1920x1080 cropped from the center rows, binned horizontally
static MODE_1920X1080_30: [RegValue; 75] = [
    rv(REG_LINE_LEN, 0x31c4),
    rv(REG_X_ADD_STA, 0x0000),
    rv(REG_Y_ADD_STA, 0x01b8),
    rv(REG_X_ADD_END, 0x0fd7),
    rv(REG_Y_ADD_END, 0x0a27),
    rv(reg8(0x0220), 0x00),
    rv(reg8(0x0221), 0x11),
    rv(REG_X_ENV_INC_CONST, 0x01),
    rv(REG_X_ODD_INC_CONST, 0x01),
    rv(REG_Y_ENV_INC_CONST, 0x01),
    rv(REG_Y_ODD_INC, 0x01),
    rv(REG_BINNING_MODE, 0x01),
    rv(REG_BINNING_HV, 0x12),
    rv(REG_BINNING_WEIGHTING, 0x02),
    rv(reg8(0x3140), 0x02),
    rv(reg8(0x3c00), 0x00),
    rv(reg8(0x3c01), 0x03),
    rv(reg8(0x3c02), 0xa2),
    rv(REG_ADC_BIT_SETTING, 0x01),
    rv(reg8(0x5748), 0x07),
    rv(reg8(0x5749), 0xff),
    rv(reg8(0x574a), 0x00),
    rv(reg8(0x574b), 0x00),
    rv(reg8(0x7b53), 0x01),
    rv(reg8(0x9369), 0x73),
    rv(reg8(0x936b), 0x64),
    rv(reg8(0x936d), 0x5f),
    rv(reg8(0x9304), 0x00),
    rv(reg8(0x9305), 0x00),
    rv(reg8(0x9e9a), 0x2f),
    rv(reg8(0x9e9b), 0x2f),
    rv(reg8(0x9e9c), 0x2f),
    rv(reg8(0x9e9d), 0x00),
    rv(reg8(0x9e9e), 0x00),
    rv(reg8(0x9e9f), 0x00),
    rv(reg8(0xa2a9), 0x60),
    rv(reg8(0xa2b7), 0x00),
    rv(REG_SCALE_MODE, 0x00),
    rv(REG_SCALE_M, 0x0020),
    rv(REG_DIG_CROP_X_OFFSET, 0x0000),
    rv(REG_DIG_CROP_Y_OFFSET, 0x0000),
    rv(REG_DIG_CROP_WIDTH, 0x0fd8),
    rv(REG_DIG_CROP_HEIGHT, 0x0438),
    rv(REG_X_OUT_SIZE, 1920),
    rv(REG_Y_OUT_SIZE, 1080),
    rv(REG_IVTPXCK_DIV, 0x05),
    rv(REG_IVTSYCK_DIV, 0x02),
    rv(REG_IVT_PREPLLCK_DIV, 0x02),
    rv(REG_IVT_PLL_MPY, 0x009b),
    rv(REG_IOPPXCK_DIV, 0x0a),
    rv(REG_IOPSYCK_DIV, 0x02),
    rv(REG_IOP_PREPLLCK_DIV, 0x01),
    rv(REG_IOP_PLL_MPY, 100),
    rv(REG_PLL_MULTI_DRIVE, 0x00),
    rv(REG_REQ_LINK_BIT_RATE, 0x07080000),
    rv(REG_TCLK_POST_EX, 0x007f),
    rv(REG_THS_PRE_EX, 0x004f),
    rv(REG_THS_ZERO_MIN, 0x0077),
    rv(REG_THS_TRAIL_EX, 0x005f),
    rv(REG_TCLK_TRAIL_MIN, 0x0057),
    rv(REG_TCLK_PREP_EX, 0x004f),
    rv(REG_TCLK_ZERO_EX, 0x0127),
    rv(REG_TLPX_EX, 0x003f),
    rv(reg8(0xe04c), 0x00),
    rv(reg8(0xe04d), 0x7f),
    rv(reg8(0xe04e), 0x00),
    rv(reg8(0xe04f), 0x1f),
    rv(reg8(0x3e20), 0x01),
    rv(REG_PDAF_CTRL1_0, 0x00),
    rv(REG_POWER_SAVE_ENABLE, 0x00),
    rv(REG_LINE_LEN_INCLK, 0x016c),
    rv(REG_MAP_COUPLET_CORR, 0x01),
    rv(REG_SING_DYNAMIC_CORR, 0x01),
    rv(REG_CIT_LSHIFT_LONG_EXP, 0x00),
    rv(REG_FRAME_LEN, 1167),
];

static MODES_1920X1080: [Mode; 1] = [Mode::new(30, &[&MODE_1920X1080_30])];

pub static FORMATS: [ImagerFormat; 1] = [ImagerFormat {
    cap: FormatCap::fixed(PixelFormat::SBGGR8, 1920, 1080),
    modes: &MODES_1920X1080,
}];

pub const TEST_PATTERN_MENU: [&str; 5] = [
    "Off",
    "Solid color",
    "100% color bars",
    "Fade to grey color bar",
    "PN9",
];

pub struct Imx477<I2C, D> {
    imager: Imager<I2C, D>,
    controls: [Control; 1],
}

impl<I2C, D, CommE> Imx477<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    pub fn new(cci: Cci<I2C, D>) -> Self {
        Self {
            imager: Imager::new(cci, &FORMATS),
            controls: [Control::menu(
                ControlId::TestPattern,
                TEST_PATTERN_MENU.len() as i32,
            )],
        }
    }

    pub fn default(i2c: I2C, delay: D) -> Self {
        Self::new(Cci::new(i2c, DEFAULT_I2C_ADDRESS, delay))
    }

    pub fn release(self) -> Cci<I2C, D> {
        self.imager.release()
    }

    /// Identify the sensor, reset it, then load the 1920x1080 mode.
    ///
    /// The reset comes before the register tables so that it cannot wipe them.
    pub fn init(&mut self) -> Result<(), Error<CommE>> {
        let cci = self.imager.cci();
        cci.delay_ms(RESET_DELAY_MS);

        let id = cci.read_reg(REG_CHIP_ID)?;
        if id != CHIP_ID {
            #[cfg(feature = "rttdebug")]
            rprintln!("imx477 wrong chip id {:04x}", id);
            return Err(Error::WrongChipId(id));
        }

        cci.write_reg(REG_MODE_SEL, 0x00)?;
        cci.write_reg(REG_SW_RESET, 0x01)?;
        cci.delay_ms(RESET_DELAY_MS);
        cci.write_reg(REG_SW_RESET, 0x00)?;
        cci.delay_ms(RESET_DELAY_MS);

        self.imager.init(&INIT_REGS, 0)?;

        #[cfg(feature = "rttdebug")]
        rprintln!("imx477 ready");
        Ok(())
    }
}

impl<I2C, D, CommE> VideoDevice for Imx477<I2C, D>
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
        self.imager.cci().write_reg(REG_MODE_SEL, on as u32)
    }

    fn set_ctrl(&mut self, id: ControlId, value: i32) -> Result<(), Error<CommE>> {
        let ctrl = find_control(&mut self.controls, id)?;
        ctrl.validate(value)?;
        self.imager.cci().write_reg(REG_TEST_PATTERN, value as u32)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockI2c};

    fn sensor(bus: &MockI2c, delay: &MockDelay) -> Imx477<MockI2c, MockDelay> {
        bus.set_reg(0x0016, 0x04);
        bus.set_reg(0x0017, 0x77);
        Imx477::default(bus.clone(), delay.clone())
    }

    #[test]
    fn reset_precedes_tables() {
        let bus = MockI2c::new();
        let delay = MockDelay::default();
        let mut cam = sensor(&bus, &delay);
        cam.init().unwrap();
        let writes = bus.writes();
        assert_eq!(writes[0], [0x01, 0x00, 0x00]);
        assert_eq!(writes[1], [0x01, 0x03, 0x01]);
        assert_eq!(writes[2], [0x01, 0x03, 0x00]);
        // EXCK_FREQ = 24 MHz, high byte first
        assert_eq!(writes[3], [0x01, 0x36, 0x18]);
        assert_eq!(delay.total_us(), 30_000);
        // REQ_LINK_BIT_RATE, 32-bit big-endian
        assert_eq!(
            [0x0820, 0x0821, 0x0822, 0x0823].map(|a| bus.reg(a)),
            [0x07, 0x08, 0x00, 0x00]
        );
        assert_eq!(
            cam.get_format(Endpoint::Out),
            Ok(Format::new(PixelFormat::SBGGR8, 1920, 1080))
        );
    }

    #[test]
    fn wrong_chip_stops_init() {
        let bus = MockI2c::new();
        bus.set_reg(0x0016, 0x02);
        bus.set_reg(0x0017, 0x19);
        let mut cam = Imx477::default(bus.clone(), MockDelay::default());
        assert_eq!(cam.init(), Err(Error::WrongChipId(0x0219)));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_pattern_control() {
        let bus = MockI2c::new();
        let mut cam = sensor(&bus, &MockDelay::default());
        cam.set_ctrl(ControlId::TestPattern, 2).unwrap();
        assert_eq!((bus.reg(0x0600), bus.reg(0x0601)), (0x00, 0x02));
        assert_eq!(cam.get_ctrl(ControlId::TestPattern), Ok(2));
        assert_eq!(cam.set_ctrl(ControlId::Exposure, 10), Err(Error::Unsupported));
        assert_eq!(cam.set_ctrl(ControlId::TestPattern, 5), Err(Error::OutOfRange));
    }

    #[test]
    fn stream_toggles_mode_select() {
        let bus = MockI2c::new();
        let mut cam = sensor(&bus, &MockDelay::default());
        cam.set_stream(true).unwrap();
        assert_eq!(bus.reg(0x0100), 1);
        cam.set_stream(false).unwrap();
        assert_eq!(bus.reg(0x0100), 0);
    }
}
