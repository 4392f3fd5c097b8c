/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Mode-table engine shared by the image sensor drivers.
//!
//! A sensor describes itself as a table of [`ImagerFormat`]s. Each entry pairs
//! a capability with its frame rate [`Mode`]s, and each mode is a short list of
//! register batches. Batches are kept separate so that clock, crop window and
//! timing settings can be shared between modes.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::cci::{Cci, RegValue};
use crate::format::{
    caps_index, closest_interval, Caps, Endpoint, Format, FormatCap, FrameInterval,
};
use crate::Error;

/// Upper bound on register batches per mode
pub const MAX_MODE_BATCHES: usize = 8;

/// A frame rate operating point and the register batches that select it
#[derive(Clone, Copy, Debug)]
pub struct Mode {
    pub fps: u16,
    batches: [Option<&'static [RegValue]>; MAX_MODE_BATCHES],
}

impl Mode {
    pub const fn new(fps: u16, batches: &[&'static [RegValue]]) -> Self {
        assert!(batches.len() <= MAX_MODE_BATCHES);
        let mut slots = [None; MAX_MODE_BATCHES];
        let mut i = 0;
        while i < batches.len() {
            slots[i] = Some(batches[i]);
            i += 1;
        }
        Self { fps, batches: slots }
    }

    /// Build a mode from raw batch slots. Application stops at the first
    /// empty slot.
    pub const fn from_slots(
        fps: u16,
        batches: [Option<&'static [RegValue]>; MAX_MODE_BATCHES],
    ) -> Self {
        Self { fps, batches }
    }

    /// The batches applied for this mode, in order
    pub fn batches(&self) -> impl Iterator<Item = &'static [RegValue]> + '_ {
        self.batches.iter().map_while(|b| *b)
    }

    pub fn interval(&self) -> FrameInterval {
        FrameInterval::from_fps(self.fps as u32)
    }
}

/// A capability and the frame rate modes available with it
#[derive(Clone, Copy, Debug)]
pub struct ImagerFormat {
    pub cap: FormatCap,
    pub modes: &'static [Mode],
}

/// Runtime state of a sensor driven by a mode table
pub struct Imager<I2C, D> {
    cci: Cci<I2C, D>,
    formats: &'static [ImagerFormat],
    fmt_id: usize,
    fmt: Option<Format>,
    mode: Option<(usize, usize)>,
}

impl<I2C, D, CommE> Imager<I2C, D>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayUs<u32>,
{
    pub fn new(cci: Cci<I2C, D>, formats: &'static [ImagerFormat]) -> Self {
        Self {
            cci,
            formats,
            fmt_id: 0,
            fmt: None,
            mode: None,
        }
    }

    pub fn cci(&mut self) -> &mut Cci<I2C, D> {
        &mut self.cci
    }

    pub fn release(self) -> Cci<I2C, D> {
        self.cci
    }

    pub fn formats(&self) -> &'static [ImagerFormat] {
        self.formats
    }

    /// The active mode, once a format has been applied
    pub fn mode(&self) -> Option<&'static Mode> {
        let formats = self.formats;
        self.mode
            .and_then(|(f, m)| formats.get(f).and_then(|fmt| fmt.modes.get(m)))
    }

    /// Write the init batch, then select `default_index` at its largest size
    pub fn init(
        &mut self,
        init_regs: &[RegValue],
        default_index: usize,
    ) -> Result<(), Error<CommE>> {
        self.cci.write_multi(init_regs)?;
        let fmt = self
            .formats
            .get(default_index)
            .ok_or(Error::Unsupported)?
            .cap
            .max_format();
        self.set_format(Endpoint::Out, &fmt)
    }

    /// Apply a mode unless it is already the active one
    pub fn set_mode(&mut self, fmt_id: usize, mode_id: usize) -> Result<(), Error<CommE>> {
        if self.mode == Some((fmt_id, mode_id)) {
            #[cfg(feature = "rttdebug")]
            rprintln!("imager mode {}:{} already active", fmt_id, mode_id);
            return Ok(());
        }

        let mode = self
            .formats
            .get(fmt_id)
            .and_then(|f| f.modes.get(mode_id))
            .ok_or(Error::Unsupported)?;

        let cci = &mut self.cci;
        critical_section::with(|_| mode.batches().try_for_each(|b| cci.write_multi(b)))
            .map_err(|e| {
                #[cfg(feature = "rttdebug")]
                rprintln!("failed to apply {} fps mode", mode.fps);
                e
            })?;

        self.mode = Some((fmt_id, mode_id));
        Ok(())
    }

    pub fn get_caps(&self, ep: Endpoint) -> Result<Caps, Error<CommE>> {
        check_endpoint(ep)?;
        let mut caps = Caps::new();
        for f in self.formats {
            if caps.push(f.cap).is_err() {
                #[cfg(feature = "rttdebug")]
                rprintln!("imager caps truncated");
                break;
            }
        }
        Ok(caps)
    }

    pub fn set_format(&mut self, ep: Endpoint, fmt: &Format) -> Result<(), Error<CommE>> {
        check_endpoint(ep)?;
        let fmt_id = caps_index(self.formats.iter().map(|f| &f.cap), fmt).ok_or_else(|| {
            #[cfg(feature = "rttdebug")]
            rprintln!("unsupported format {:?} {}x{}", fmt.pixelformat, fmt.width, fmt.height);
            Error::Unsupported
        })?;

        self.set_mode(fmt_id, 0)?;
        self.fmt_id = fmt_id;
        self.fmt = Some(*fmt);
        Ok(())
    }

    pub fn get_format(&self, ep: Endpoint) -> Result<Format, Error<CommE>> {
        check_endpoint(ep)?;
        self.fmt.ok_or(Error::NotReady)
    }

    /// Switch to the mode of the active format closest to `interval`
    pub fn set_frame_interval(
        &mut self,
        ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<CommE>> {
        check_endpoint(ep)?;
        if self.fmt.is_none() {
            return Err(Error::NotReady);
        }
        let fmt_id = self.fmt_id;
        let modes = self.formats.get(fmt_id).ok_or(Error::NotReady)?.modes;
        let mode_id =
            closest_interval(modes.iter().map(Mode::interval), interval).ok_or(Error::Unsupported)?;
        self.set_mode(fmt_id, mode_id)?;
        Ok(modes[mode_id].interval())
    }

    pub fn get_frame_interval(&self, ep: Endpoint) -> Result<FrameInterval, Error<CommE>> {
        check_endpoint(ep)?;
        self.mode().map(Mode::interval).ok_or(Error::NotReady)
    }

    pub fn enum_frame_interval(
        &self,
        ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<CommE>> {
        check_endpoint(ep)?;
        let fmt_id =
            caps_index(self.formats.iter().map(|f| &f.cap), fmt).ok_or(Error::Unsupported)?;
        self.formats[fmt_id]
            .modes
            .get(index)
            .map(Mode::interval)
            .ok_or(Error::OutOfRange)
    }
}

fn check_endpoint<E>(ep: Endpoint) -> Result<(), Error<E>> {
    if ep.is_output() {
        Ok(())
    } else {
        Err(Error::InvalidEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cci::Reg;
    use crate::format::PixelFormat;
    use crate::mock::{MockDelay, MockI2c};
    use std::vec;

    const fn rv(addr: u16, value: u32) -> RegValue {
        RegValue::new(Reg::addr16_data8(addr), value)
    }

    static CLOCK: [RegValue; 2] = [rv(0x0301, 5), rv(0x0303, 1)];
    static SIZE_VGA: [RegValue; 1] = [rv(0x0160, 0x10)];
    static SIZE_FHD: [RegValue; 1] = [rv(0x0160, 0x20)];
    static FPS_30: [RegValue; 1] = [rv(0x0307, 30)];
    static FPS_15: [RegValue; 1] = [rv(0x0307, 15)];
    static UNUSED: [RegValue; 1] = [rv(0x0999, 0xee)];

    static VGA_MODES: [Mode; 2] = [
        Mode::new(30, &[&SIZE_VGA, &CLOCK, &FPS_30]),
        Mode::new(15, &[&SIZE_VGA, &CLOCK, &FPS_15]),
    ];
    static FHD_MODES: [Mode; 1] = [Mode::new(30, &[&SIZE_FHD, &CLOCK, &FPS_30])];

    static FORMATS: [ImagerFormat; 2] = [
        ImagerFormat {
            cap: FormatCap::fixed(PixelFormat::SBGGR8, 640, 480),
            modes: &VGA_MODES,
        },
        ImagerFormat {
            cap: FormatCap::fixed(PixelFormat::SBGGR8, 1920, 1080),
            modes: &FHD_MODES,
        },
    ];

    fn imager(bus: MockI2c) -> Imager<MockI2c, MockDelay> {
        Imager::new(Cci::new(bus, 0x10, MockDelay::default()), &FORMATS)
    }

    #[test]
    fn same_mode_is_written_once() {
        let bus = MockI2c::new();
        let mut dev = imager(bus.clone());
        let vga = Format::new(PixelFormat::SBGGR8, 640, 480);
        dev.set_format(Endpoint::Out, &vga).unwrap();
        let after_format = bus.writes().len();
        assert_eq!(after_format, 4);

        let fps15 = FrameInterval::from_fps(15);
        dev.set_frame_interval(Endpoint::Out, &fps15).unwrap();
        let after_first = bus.writes().len();
        assert_eq!(after_first, 8);
        assert_eq!(dev.set_frame_interval(Endpoint::Out, &fps15), Ok(fps15));
        assert_eq!(bus.writes().len(), after_first);

        dev.set_format(Endpoint::Out, &vga).unwrap();
        assert_eq!(bus.writes().len(), after_first + 4);
    }

    #[test]
    fn format_resolves_to_matching_capability() {
        let bus = MockI2c::new();
        let mut dev = imager(bus.clone());
        let fhd = Format::new(PixelFormat::SBGGR8, 1920, 1080);
        dev.set_format(Endpoint::Out, &fhd).unwrap();
        assert_eq!(bus.reg(0x0160), 0x20);
        assert_eq!(dev.get_format(Endpoint::Out), Ok(fhd));
        assert_eq!(
            dev.get_frame_interval(Endpoint::Out),
            Ok(FrameInterval::from_fps(30))
        );
    }

    #[test]
    fn unsupported_format_leaves_state() {
        let bus = MockI2c::new();
        let mut dev = imager(bus.clone());
        let vga = Format::new(PixelFormat::SBGGR8, 640, 480);
        dev.set_format(Endpoint::Out, &vga).unwrap();
        let odd = Format::new(PixelFormat::SBGGR8, 800, 600);
        assert_eq!(dev.set_format(Endpoint::Out, &odd), Err(Error::Unsupported));
        assert_eq!(dev.get_format(Endpoint::Out), Ok(vga));
        assert_eq!(bus.writes().len(), 4);
    }

    #[test]
    fn batches_stop_at_first_empty_slot() {
        static SPARSE: [Mode; 1] = [Mode::from_slots(
            30,
            [Some(&CLOCK), None, Some(&UNUSED), None, None, None, None, None],
        )];
        static TABLE: [ImagerFormat; 1] = [ImagerFormat {
            cap: FormatCap::fixed(PixelFormat::SBGGR8, 640, 480),
            modes: &SPARSE,
        }];
        let bus = MockI2c::new();
        let mut dev = Imager::new(Cci::new(bus.clone(), 0x10, MockDelay::default()), &TABLE);
        dev.set_mode(0, 0).unwrap();
        assert_eq!(
            bus.writes(),
            vec![vec![0x03, 0x01, 5], vec![0x03, 0x03, 1]]
        );
    }

    #[test]
    fn frame_interval_requires_format() {
        let mut dev = imager(MockI2c::new());
        let fps = FrameInterval::from_fps(30);
        assert_eq!(dev.set_frame_interval(Endpoint::Out, &fps), Err(Error::NotReady));
        assert_eq!(dev.get_frame_interval(Endpoint::Out), Err(Error::NotReady));
    }

    #[test]
    fn enumerate_intervals() {
        let dev = imager(MockI2c::new());
        let vga = Format::new(PixelFormat::SBGGR8, 640, 480);
        assert_eq!(
            dev.enum_frame_interval(Endpoint::Out, &vga, 1),
            Ok(FrameInterval::from_fps(15))
        );
        assert_eq!(
            dev.enum_frame_interval(Endpoint::Out, &vga, 2),
            Err(Error::OutOfRange)
        );
        let yuv = Format::new(PixelFormat::YUYV, 640, 480);
        assert_eq!(
            dev.enum_frame_interval(Endpoint::Out, &yuv, 0),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn failed_mode_is_not_committed() {
        let bus = MockI2c::new();
        let mut dev = imager(bus.clone());
        bus.fail_from(2);
        let vga = Format::new(PixelFormat::SBGGR8, 640, 480);
        assert_eq!(dev.set_format(Endpoint::Out, &vga), Err(Error::Comm(())));
        assert_eq!(dev.get_format(Endpoint::Out), Err(Error::NotReady));
        // no rollback: the first two writes stay applied
        assert_eq!(bus.writes().len(), 2);
        assert!(dev.mode().is_none());
    }

    #[test]
    fn input_endpoint_rejected() {
        let dev = imager(MockI2c::new());
        assert_eq!(dev.get_caps(Endpoint::In).err(), Some(Error::InvalidEndpoint));
        assert_eq!(dev.get_caps(Endpoint::All).map(|c| c.len()), Ok(2));
    }

    #[test]
    fn init_selects_default_at_max_size() {
        let bus = MockI2c::new();
        let mut dev = imager(bus.clone());
        dev.init(&[rv(0x0103, 1)], 1).unwrap();
        assert_eq!(bus.writes()[0], vec![0x01, 0x03, 1]);
        let fmt = dev.get_format(Endpoint::Out).unwrap();
        assert_eq!((fmt.width, fmt.height, fmt.pitch), (1920, 1080, 1920));
        assert_eq!(dev.init(&[], 5), Err(Error::Unsupported));
    }
}
