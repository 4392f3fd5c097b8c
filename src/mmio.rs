/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Memory-mapped register blocks of the fabric peripherals.

use core::ptr;

/// Access to a block of device registers at byte offsets from its base
pub trait Mmio {
    fn read8(&self, offset: usize) -> u8;
    fn write8(&mut self, offset: usize, value: u8);
    fn read16(&self, offset: usize) -> u16;
    fn read32(&self, offset: usize) -> u32;
    fn write32(&mut self, offset: usize, value: u32);
}

/// Register block at a fixed physical address
pub struct MmioBlock {
    base: usize,
}

impl MmioBlock {
    /// # Safety
    /// `base` must be the address of a register block that stays mapped for
    /// the lifetime of the value, and no other `MmioBlock` may alias it.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl Mmio for MmioBlock {
    fn read8(&self, offset: usize) -> u8 {
        unsafe { ptr::read_volatile((self.base + offset) as *const u8) }
    }

    fn write8(&mut self, offset: usize, value: u8) {
        unsafe { ptr::write_volatile((self.base + offset) as *mut u8, value) }
    }

    fn read16(&self, offset: usize) -> u16 {
        unsafe { ptr::read_volatile((self.base + offset) as *const u16) }
    }

    fn read32(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
