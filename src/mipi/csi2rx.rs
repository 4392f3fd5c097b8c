/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Lattice CSI-2 RX block. Registers are 32 bits wide with the two low
//! address bits always zero.

use super::{MipiRx, RegisterAccess, RxRegister};
use crate::mmio::Mmio;

/// 32-bit register access at `index << 2`
pub struct Csi2;

impl RegisterAccess for Csi2 {
    /// RAW10
    const DEFAULT_REF_DT: u8 = 0x2b;

    fn read<M: Mmio>(regs: &M, reg: RxRegister) -> u8 {
        regs.read32(reg.index() << 2) as u8
    }

    fn write<M: Mmio>(regs: &mut M, reg: RxRegister, value: u8) {
        regs.write32(reg.index() << 2, value as u32)
    }
}

pub type Csi2Rx<S, M> = MipiRx<S, M, Csi2>;
