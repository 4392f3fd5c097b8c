/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Lattice D-PHY RX block: 8-bit registers at consecutive byte addresses.

use super::{MipiRx, RegisterAccess, RxRegister};
use crate::mmio::Mmio;

/// 8-bit register access
pub struct Dphy;

impl RegisterAccess for Dphy {
    /// RAW8
    const DEFAULT_REF_DT: u8 = 0x2a;

    fn read<M: Mmio>(regs: &M, reg: RxRegister) -> u8 {
        regs.read8(reg.index())
    }

    fn write<M: Mmio>(regs: &mut M, reg: RxRegister, value: u8) {
        regs.write8(reg.index(), value)
    }
}

pub type DphyRx<S, M> = MipiRx<S, M, Dphy>;
