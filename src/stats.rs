/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Statistics block. Frames pass through untouched while the hardware
//! counts them and averages each of the four Bayer channels.

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::device::{ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FrameInterval, PixelFormat};
use crate::mmio::Mmio;
use crate::Error;

pub mod regs {
    pub const SCRATCH: usize = 0x00;
    pub const CONTROL: usize = 0x04;
    pub const STATUS: usize = 0x08;
    pub const CONFIG: usize = 0x0c;
    pub const NUM_FRAMES: usize = 0x10;
    pub const HEIGHT: usize = 0x14;
    pub const WIDTH: usize = 0x16;
    pub const IMAGE_GAIN: usize = 0x18;
    pub const CHAN_AVG: [usize; 4] = [0x1c, 0x20, 0x24, 0x28];
}

/// Channel averages decoded to RGB
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub frame_counter: u32,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Map the raw channel averages, in sensor order, to RGB.
///
/// Channels 0 and 1 are the even row, 2 and 3 the odd row.
pub fn decode_channels(order: PixelFormat, ch: [u8; 4]) -> Option<(u8, u8, u8)> {
    let avg = |a: u8, b: u8| ((a as u16 + b as u16) / 2) as u8;
    let (r, g, b) = match order {
        PixelFormat::SBGGR8 => (ch[3], avg(ch[1], ch[2]), ch[0]),
        PixelFormat::SGBRG8 => (ch[2], avg(ch[0], ch[3]), ch[1]),
        PixelFormat::SGRBG8 => (ch[1], avg(ch[0], ch[3]), ch[2]),
        PixelFormat::SRGGB8 => (ch[0], avg(ch[1], ch[2]), ch[3]),
        _ => return None,
    };
    // a saturated average reads back as garbage
    let fix = |v: u8| if v == 255 { 0 } else { v };
    Some((fix(r), fix(g), fix(b)))
}

pub struct Stats<S, M> {
    source: S,
    regs: M,
}

impl<S: VideoDevice, M: Mmio> Stats<S, M> {
    pub fn new(source: S, regs: M) -> Self {
        Self { source, regs }
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

    pub fn frame_count(&self) -> u32 {
        self.regs.read32(regs::NUM_FRAMES)
    }

    pub fn frame_width(&self) -> u16 {
        self.regs.read16(regs::WIDTH)
    }

    pub fn frame_height(&self) -> u16 {
        self.regs.read16(regs::HEIGHT)
    }

    /// Raw averages of the four channels
    pub fn channel_averages(&self) -> [u8; 4] {
        regs::CHAN_AVG.map(|offset| self.regs.read32(offset) as u8)
    }

    /// Decode the channel averages using the Bayer order of the upstream format
    pub fn channel_stats(&self) -> Result<ChannelStats, Error<S::CommError>> {
        let frame_counter = self.frame_count();
        let raw = self.channel_averages();
        let fmt = self.source.get_format(Endpoint::Out)?;
        let (red, green, blue) = decode_channels(fmt.pixelformat, raw).ok_or_else(|| {
            #[cfg(feature = "rttdebug")]
            rprintln!("cannot decode statistics for {:?}", fmt.pixelformat);
            Error::Unsupported
        })?;
        Ok(ChannelStats {
            frame_counter,
            red,
            green,
            blue,
        })
    }
}

impl<S: VideoDevice, M: Mmio> VideoDevice for Stats<S, M> {
    type CommError = S::CommError;

    fn get_caps(&self, ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        self.source.get_caps(ep)
    }

    fn set_format(&mut self, ep: Endpoint, fmt: &Format) -> Result<(), Error<Self::CommError>> {
        self.source.set_format(ep, fmt)
    }

    fn get_format(&self, ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        self.source.get_format(ep)
    }

    fn set_frame_interval(
        &mut self,
        ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.set_frame_interval(ep, interval)
    }

    fn get_frame_interval(&self, ep: Endpoint) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.get_frame_interval(ep)
    }

    fn enum_frame_interval(
        &self,
        ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.enum_frame_interval(ep, fmt, index)
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
    use crate::format::FormatCap;
    use crate::mock::{MockMmio, MockSource};

    fn stats(order: PixelFormat, regs: MockMmio) -> Stats<MockSource, MockMmio> {
        let mut src = MockSource::new(&[FormatCap::fixed(order, 640, 480)]);
        src.fmt = Some(Format::new(order, 640, 480));
        Stats::new(src, regs)
    }

    fn load(regs: &MockMmio, ch: [u32; 4]) {
        for (offset, v) in regs::CHAN_AVG.iter().zip(ch) {
            regs.set(*offset, v);
        }
    }

    #[test]
    fn bayer_orders() {
        let ch = [10, 20, 30, 40];
        assert_eq!(decode_channels(PixelFormat::SBGGR8, ch), Some((40, 25, 10)));
        assert_eq!(decode_channels(PixelFormat::SGBRG8, ch), Some((30, 25, 20)));
        assert_eq!(decode_channels(PixelFormat::SGRBG8, ch), Some((20, 25, 30)));
        assert_eq!(decode_channels(PixelFormat::SRGGB8, ch), Some((10, 25, 40)));
        assert_eq!(decode_channels(PixelFormat::YUYV, ch), None);
    }

    #[test]
    fn saturated_channels_read_zero() {
        assert_eq!(
            decode_channels(PixelFormat::SRGGB8, [255, 255, 255, 7]),
            Some((0, 0, 7))
        );
    }

    #[test]
    fn reads_counters_from_hardware() {
        let regs = MockMmio::default();
        load(&regs, [100, 50, 60, 200]);
        regs.set(regs::NUM_FRAMES, 1234);
        regs.set(regs::WIDTH, 640);
        regs.set(regs::HEIGHT, 480);
        let dev = stats(PixelFormat::SBGGR8, regs);
        assert_eq!(
            dev.channel_stats(),
            Ok(ChannelStats {
                frame_counter: 1234,
                red: 200,
                green: 55,
                blue: 100,
            })
        );
        assert_eq!((dev.frame_width(), dev.frame_height()), (640, 480));
    }

    #[test]
    fn needs_upstream_format() {
        let src = MockSource::new(&[]);
        let dev = Stats::new(src, MockMmio::default());
        assert_eq!(dev.channel_stats(), Err(Error::NotReady));
    }

    #[test]
    fn passes_requests_through() {
        let mut dev = stats(PixelFormat::SGBRG8, MockMmio::default());
        dev.set_stream(true).unwrap();
        assert!(dev.source().streaming);
        assert_eq!(dev.get_caps(Endpoint::Out).map(|c| c.len()), Ok(1));
    }
}
