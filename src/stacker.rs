/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Frame stacker: combines two identical sensors into one stream, the frame
//! of the second source placed under the frame of the first.

use embedded_hal::blocking::delay::DelayUs;

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::device::VideoDevice;
use crate::format::{Caps, Endpoint, Format, FrameInterval};
use crate::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StackerConfig {
    /// Pause between starting the first and the second source
    pub start_delay_us: u32,
}

pub struct Stacker<S0, S1, D> {
    source0: S0,
    source1: S1,
    delay: D,
    config: StackerConfig,
    fmt: Option<Format>,
}

impl<S0, S1, D> Stacker<S0, S1, D>
where
    S0: VideoDevice,
    S1: VideoDevice<CommError = S0::CommError>,
    D: DelayUs<u32>,
{
    pub fn new(source0: S0, source1: S1, delay: D, config: StackerConfig) -> Self {
        Self {
            source0,
            source1,
            delay,
            config,
            fmt: None,
        }
    }

    pub fn sources(&self) -> (&S0, &S1) {
        (&self.source0, &self.source1)
    }

    pub fn sources_mut(&mut self) -> (&mut S0, &mut S1) {
        (&mut self.source0, &mut self.source1)
    }

    pub fn release(self) -> (S0, S1, D) {
        (self.source0, self.source1, self.delay)
    }
}

fn double<E>(value: u32) -> Result<u32, Error<E>> {
    value.checked_mul(2).ok_or(Error::Unsupported)
}

/// Format requested from each source for a stacked `fmt`
fn half_height(fmt: &Format) -> Format {
    Format {
        height: fmt.height / 2,
        ..*fmt
    }
}

impl<S0, S1, D> VideoDevice for Stacker<S0, S1, D>
where
    S0: VideoDevice,
    S1: VideoDevice<CommError = S0::CommError>,
    D: DelayUs<u32>,
{
    type CommError = S0::CommError;

    /// Both sources must report identical capabilities. Each capability is
    /// reported with its height range doubled.
    fn get_caps(&self, _ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        let caps0 = self.source0.get_caps(Endpoint::Out)?;
        let caps1 = self.source1.get_caps(Endpoint::Out)?;
        if caps0 != caps1 {
            #[cfg(feature = "rttdebug")]
            rprintln!("cannot stack sensors with different capabilities");
            return Err(Error::Unsupported);
        }
        let mut caps = caps0;
        for cap in caps.iter_mut() {
            cap.height_min = double(cap.height_min)?;
            cap.height_max = double(cap.height_max)?;
            cap.height_step = double(cap.height_step)?;
        }
        Ok(caps)
    }

    fn set_format(&mut self, _ep: Endpoint, fmt: &Format) -> Result<(), Error<Self::CommError>> {
        let half = half_height(fmt);
        self.source0.set_format(Endpoint::Out, &half)?;
        self.source1.set_format(Endpoint::Out, &half)?;
        self.fmt = Some(*fmt);
        Ok(())
    }

    fn get_format(&self, _ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        self.fmt.ok_or(Error::NotReady)
    }

    fn set_frame_interval(
        &mut self,
        _ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        let applied = self.source0.set_frame_interval(Endpoint::Out, interval)?;
        self.source1.set_frame_interval(Endpoint::Out, interval)?;
        Ok(applied)
    }

    fn get_frame_interval(&self, _ep: Endpoint) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source0.get_frame_interval(Endpoint::Out)
    }

    fn enum_frame_interval(
        &self,
        _ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source0
            .enum_frame_interval(Endpoint::Out, &half_height(fmt), index)
    }

    fn set_stream(&mut self, on: bool) -> Result<(), Error<Self::CommError>> {
        if on {
            self.source0.set_stream(true)?;
            self.delay.delay_us(self.config.start_delay_us);
            self.source1.set_stream(true)?;
        } else {
            self.source0.set_stream(false)?;
            self.source1.set_stream(false)?;
        }
        #[cfg(feature = "rttdebug")]
        rprintln!("stacker stream {}", on);
        Ok(())
    }
}
