/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! MIPI receiver front ends: the D-PHY RX block and the CSI-2 RX block.
//!
//! Both expose the same register map and pass every video request through to
//! the sensor they wrap. They differ in register access width and defaults.

pub mod csi2rx;
pub mod dphy_rx;

pub use csi2rx::{Csi2, Csi2Rx};
pub use dphy_rx::{Dphy, DphyRx};

use crate::device::{ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FrameInterval};
use crate::mmio::Mmio;
use crate::Error;

/// Receiver registers, with the names and descriptions used in register dumps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RxRegister {
    LaneSetting,
    VcDt,
    Wcl,
    Wch,
    Ecc,
    VcDt2,
    Wc2l,
    Wc2h,
    RefDt,
    ErrorStatus,
    ErrorStatusEn,
    CrcByteLow,
    CrcByteHigh,
    ErrorCtrl,
    ErrorHsSot,
    ErrorHsSotSync,
    Control,
    NocilDsettle,
    NocilRxFifoDelLsb,
    NocilRxFifoDelMsb,
    ErrorSotSyncDet,
}

impl RxRegister {
    pub const ALL: [RxRegister; 21] = [
        RxRegister::LaneSetting,
        RxRegister::VcDt,
        RxRegister::Wcl,
        RxRegister::Wch,
        RxRegister::Ecc,
        RxRegister::VcDt2,
        RxRegister::Wc2l,
        RxRegister::Wc2h,
        RxRegister::RefDt,
        RxRegister::ErrorStatus,
        RxRegister::ErrorStatusEn,
        RxRegister::CrcByteLow,
        RxRegister::CrcByteHigh,
        RxRegister::ErrorCtrl,
        RxRegister::ErrorHsSot,
        RxRegister::ErrorHsSotSync,
        RxRegister::Control,
        RxRegister::NocilDsettle,
        RxRegister::NocilRxFifoDelLsb,
        RxRegister::NocilRxFifoDelMsb,
        RxRegister::ErrorSotSyncDet,
    ];

    /// Error registers, cleared by writing all ones
    pub const ERRORS: [RxRegister; 5] = [
        RxRegister::ErrorStatus,
        RxRegister::ErrorCtrl,
        RxRegister::ErrorHsSot,
        RxRegister::ErrorHsSotSync,
        RxRegister::ErrorSotSyncDet,
    ];

    /// Register index in the receiver map
    pub const fn index(self) -> usize {
        match self {
            RxRegister::LaneSetting => 0x0a,
            RxRegister::VcDt => 0x1f,
            RxRegister::Wcl => 0x20,
            RxRegister::Wch => 0x21,
            RxRegister::Ecc => 0x22,
            RxRegister::VcDt2 => 0x23,
            RxRegister::Wc2l => 0x24,
            RxRegister::Wc2h => 0x25,
            RxRegister::RefDt => 0x27,
            RxRegister::ErrorStatus => 0x28,
            RxRegister::ErrorStatusEn => 0x29,
            RxRegister::CrcByteLow => 0x30,
            RxRegister::CrcByteHigh => 0x31,
            RxRegister::ErrorCtrl => 0x32,
            RxRegister::ErrorHsSot => 0x33,
            RxRegister::ErrorHsSotSync => 0x34,
            RxRegister::Control => 0x35,
            RxRegister::NocilDsettle => 0x36,
            RxRegister::NocilRxFifoDelLsb => 0x37,
            RxRegister::NocilRxFifoDelMsb => 0x38,
            RxRegister::ErrorSotSyncDet => 0x39,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RxRegister::LaneSetting => "LANE_SETTING",
            RxRegister::VcDt => "VC_DT",
            RxRegister::Wcl => "WCL",
            RxRegister::Wch => "WCH",
            RxRegister::Ecc => "ECC",
            RxRegister::VcDt2 => "VC_DT2",
            RxRegister::Wc2l => "WC2L",
            RxRegister::Wc2h => "WC2H",
            RxRegister::RefDt => "REFDT",
            RxRegister::ErrorStatus => "ERROR_STATUS",
            RxRegister::ErrorStatusEn => "ERROR_STATUS_EN",
            RxRegister::CrcByteLow => "CRC_BYTE_LOW",
            RxRegister::CrcByteHigh => "CRC_BYTE_HIGH",
            RxRegister::ErrorCtrl => "ERROR_CTRL",
            RxRegister::ErrorHsSot => "ERROR_HS_SOT",
            RxRegister::ErrorHsSotSync => "ERROR_HS_SOT_SYNC",
            RxRegister::Control => "CONTROL",
            RxRegister::NocilDsettle => "NOCIL_DSETTLE",
            RxRegister::NocilRxFifoDelLsb => "NOCIL_RXFIFODEL_LSB",
            RxRegister::NocilRxFifoDelMsb => "NOCIL_RXFIFODEL_MSB",
            RxRegister::ErrorSotSyncDet => "ERROR_SOT_SYNC_DET",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            RxRegister::LaneSetting => "Number of lanes select",
            RxRegister::VcDt => "Virtual channel and data type",
            RxRegister::Wcl => "Word count low",
            RxRegister::Wch => "Word count high",
            RxRegister::Ecc => "ECC / extended virtual channel ID",
            RxRegister::VcDt2 => "Virtual channel 2 and data type 2",
            RxRegister::Wc2l => "Word count 2 low",
            RxRegister::Wc2h => "Word count 2 high",
            RxRegister::RefDt => "Reference data type",
            RxRegister::ErrorStatus => "ECC and CRC error status",
            RxRegister::ErrorStatusEn => "ECC and CRC error status enable",
            RxRegister::CrcByteLow => "Received payload CRC LSB",
            RxRegister::CrcByteHigh => "Received payload CRC MSB",
            RxRegister::ErrorCtrl => "Hard D-PHY control error",
            RxRegister::ErrorHsSot => "Hard D-PHY start-of-transmit error",
            RxRegister::ErrorHsSotSync => "Hard D-PHY start-of-transmit sync error",
            RxRegister::Control => "Parser controls",
            RxRegister::NocilDsettle => "Data settle",
            RxRegister::NocilRxFifoDelLsb => "RX FIFO read delay LSB",
            RxRegister::NocilRxFifoDelMsb => "RX FIFO read delay MSB",
            RxRegister::ErrorSotSyncDet => "Soft D-PHY SOT sync detect error",
        }
    }
}

/// How a receiver variant reaches its registers
pub trait RegisterAccess {
    /// Reference data type written at init
    const DEFAULT_REF_DT: u8;

    fn read<M: Mmio>(regs: &M, reg: RxRegister) -> u8;
    fn write<M: Mmio>(regs: &mut M, reg: RxRegister, value: u8);
}

/// Register value change requested from a debug console
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterUpdate {
    Absolute(u8),
    /// Added to the current value, clamped to 0..=0xff
    Relative(i16),
}

impl RegisterUpdate {
    pub fn apply(self, current: u8) -> u8 {
        match self {
            RegisterUpdate::Absolute(v) => v,
            RegisterUpdate::Relative(delta) => {
                (current as i16 + delta).clamp(0, 0xff) as u8
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipiRxConfig {
    /// Data type accepted by the packet parser
    pub ref_data_type: u8,
    /// Data settle cycles
    pub settle_cycles: u8,
}

impl MipiRxConfig {
    pub const fn for_access<A: RegisterAccess>() -> Self {
        Self {
            ref_data_type: A::DEFAULT_REF_DT,
            settle_cycles: 0x06,
        }
    }
}

/// A MIPI receiver in front of `source`
pub struct MipiRx<S, M, A> {
    source: S,
    regs: M,
    config: MipiRxConfig,
    _access: core::marker::PhantomData<A>,
}

impl<S, M, A> MipiRx<S, M, A>
where
    S: VideoDevice,
    M: Mmio,
    A: RegisterAccess,
{
    pub fn new(source: S, regs: M) -> Self {
        Self::with_config(source, regs, MipiRxConfig::for_access::<A>())
    }

    pub fn with_config(source: S, regs: M, config: MipiRxConfig) -> Self {
        Self {
            source,
            regs,
            config,
            _access: core::marker::PhantomData,
        }
    }

    /// Program the reference data type and settle time
    pub fn init(&mut self) {
        A::write(&mut self.regs, RxRegister::RefDt, self.config.ref_data_type);
        A::write(&mut self.regs, RxRegister::NocilDsettle, self.config.settle_cycles);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn release(self) -> (S, M) {
        (self.source, self.regs)
    }

    pub fn read_register(&self, reg: RxRegister) -> u8 {
        A::read(&self.regs, reg)
    }

    /// Every register with its current value, in map order
    pub fn dump(&self) -> impl Iterator<Item = (RxRegister, u8)> + '_ {
        RxRegister::ALL.iter().map(move |r| (*r, A::read(&self.regs, *r)))
    }

    pub fn clear_errors(&mut self) {
        for reg in RxRegister::ERRORS {
            A::write(&mut self.regs, reg, 0xff);
        }
    }

    /// Update a register, returning the old and new values
    pub fn update_register(&mut self, reg: RxRegister, update: RegisterUpdate) -> (u8, u8) {
        let old = A::read(&self.regs, reg);
        let new = update.apply(old);
        A::write(&mut self.regs, reg, new);
        (old, new)
    }

    pub fn adjust_settle(&mut self, update: RegisterUpdate) -> (u8, u8) {
        self.update_register(RxRegister::NocilDsettle, update)
    }

    pub fn adjust_fifo_delay(&mut self, update: RegisterUpdate) -> (u8, u8) {
        self.update_register(RxRegister::NocilRxFifoDelLsb, update)
    }

    /// Accept MIPI packets of this data type
    pub fn set_ref_data_type(&mut self, data_type: u8) {
        self.config.ref_data_type = data_type;
        A::write(&mut self.regs, RxRegister::RefDt, data_type);
    }
}

impl<S, M, A> VideoDevice for MipiRx<S, M, A>
where
    S: VideoDevice,
    M: Mmio,
    A: RegisterAccess,
{
    type CommError = S::CommError;

    fn get_caps(&self, _ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        self.source.get_caps(Endpoint::Out)
    }

    fn set_format(&mut self, _ep: Endpoint, fmt: &Format) -> Result<(), Error<Self::CommError>> {
        self.source.set_format(Endpoint::Out, fmt)
    }

    fn get_format(&self, _ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        self.source.get_format(Endpoint::Out)
    }

    fn set_frame_interval(
        &mut self,
        _ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.set_frame_interval(Endpoint::Out, interval)
    }

    fn get_frame_interval(&self, _ep: Endpoint) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.get_frame_interval(Endpoint::Out)
    }

    fn enum_frame_interval(
        &self,
        _ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.enum_frame_interval(Endpoint::Out, fmt, index)
    }

    fn set_stream(&mut self, on: bool) -> Result<(), Error<Self::CommError>> {
        self.source.set_stream(on)
    }

    fn set_ctrl(&mut self, id: ControlId, value: i32) -> Result<(), Error<Self::CommError>> {
        self.source.set_ctrl(id, value)
    }

    fn get_ctrl(&self, id: ControlId) -> Result<i32, Error<Self::CommError>> {
        self.source.get_ctrl(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_updates_clamp() {
        assert_eq!(RegisterUpdate::Relative(3).apply(6), 9);
        assert_eq!(RegisterUpdate::Relative(-10).apply(6), 0);
        assert_eq!(RegisterUpdate::Relative(300).apply(6), 0xff);
        assert_eq!(RegisterUpdate::Absolute(0x20).apply(6), 0x20);
    }

    #[test]
    fn register_map_is_unique() {
        for (i, a) in RxRegister::ALL.iter().enumerate() {
            for b in &RxRegister::ALL[i + 1..] {
                assert_ne!(a.index(), b.index());
            }
        }
    }
}
