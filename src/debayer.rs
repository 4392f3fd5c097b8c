/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Debayer stage: converts BGGR Bayer frames to YUYV, losing a border of
//! pixels on each axis.

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::device::{ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FrameInterval, PixelFormat};
use crate::Error;

/// Pixels lost on each axis by the 3x3 kernel
pub const CROP_MARGIN: u32 = 2;

pub const OUTPUT_FORMAT: PixelFormat = PixelFormat::YUYV;
pub const INPUT_FORMAT: PixelFormat = PixelFormat::SBGGR8;

pub struct Debayer<S> {
    source: S,
}

impl<S: VideoDevice> Debayer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn release(self) -> S {
        self.source
    }

    /// The upstream request producing `fmt` on the output
    fn input_format(fmt: &Format) -> Result<Format, Error<S::CommError>> {
        if fmt.pixelformat != OUTPUT_FORMAT {
            #[cfg(feature = "rttdebug")]
            rprintln!("debayer only outputs YUYV, got {:?}", fmt.pixelformat);
            return Err(Error::Unsupported);
        }
        let width = fmt.width.checked_add(CROP_MARGIN);
        let height = fmt.height.checked_add(CROP_MARGIN);
        match (width, height) {
            (Some(width), Some(height)) => {
                Format::checked(INPUT_FORMAT, width, height).ok_or(Error::Unsupported)
            }
            _ => Err(Error::Unsupported),
        }
    }
}

impl<S: VideoDevice> VideoDevice for Debayer<S> {
    type CommError = S::CommError;

    fn get_caps(&self, _ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        let mut caps = self.source.get_caps(Endpoint::Out)?;
        for cap in caps.iter_mut() {
            cap.pixelformat = OUTPUT_FORMAT;
            cap.width_min = cap.width_min.saturating_sub(CROP_MARGIN);
            cap.width_max = cap.width_max.saturating_sub(CROP_MARGIN);
            cap.height_min = cap.height_min.saturating_sub(CROP_MARGIN);
            cap.height_max = cap.height_max.saturating_sub(CROP_MARGIN);
        }
        Ok(caps)
    }

    fn set_format(&mut self, _ep: Endpoint, fmt: &Format) -> Result<(), Error<Self::CommError>> {
        let input = Self::input_format(fmt)?;
        self.source.set_format(Endpoint::Out, &input)
    }

    fn get_format(&self, _ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        let input = self.source.get_format(Endpoint::Out)?;
        Ok(Format::new(
            OUTPUT_FORMAT,
            input.width.saturating_sub(CROP_MARGIN),
            input.height.saturating_sub(CROP_MARGIN),
        ))
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
        let input = Self::input_format(fmt)?;
        self.source.enum_frame_interval(Endpoint::Out, &input, index)
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
