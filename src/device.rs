/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! The interface every pipeline stage exposes, and ranged controls.

use crate::format::{Caps, Endpoint, Format, FrameInterval};
use crate::Error;

/// A stage of the video pipeline: a sensor, a processing block that wraps
/// another stage, or the UVC manager at the end of the chain.
///
/// Getters never touch the sensor bus. Errors coming from upstream stages
/// are returned unchanged.
pub trait VideoDevice {
    /// Error type of the bus at the root of the chain
    type CommError;

    fn get_caps(&self, ep: Endpoint) -> Result<Caps, Error<Self::CommError>>;

    fn set_format(
        &mut self,
        ep: Endpoint,
        fmt: &Format,
    ) -> Result<(), Error<Self::CommError>>;

    fn get_format(&self, ep: Endpoint) -> Result<Format, Error<Self::CommError>>;

    /// Select the supported interval closest to `interval` and return it
    fn set_frame_interval(
        &mut self,
        ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>>;

    fn get_frame_interval(
        &self,
        ep: Endpoint,
    ) -> Result<FrameInterval, Error<Self::CommError>>;

    /// The `index`-th discrete frame interval available for `fmt`,
    /// or `OutOfRange` past the last one
    fn enum_frame_interval(
        &self,
        ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>>;

    fn set_stream(&mut self, on: bool) -> Result<(), Error<Self::CommError>>;

    fn set_ctrl(
        &mut self,
        _id: ControlId,
        _value: i32,
    ) -> Result<(), Error<Self::CommError>> {
        Err(Error::Unsupported)
    }

    fn get_ctrl(&self, _id: ControlId) -> Result<i32, Error<Self::CommError>> {
        Err(Error::Unsupported)
    }
}

impl<T: VideoDevice + ?Sized> VideoDevice for &mut T {
    type CommError = T::CommError;

    fn get_caps(&self, ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        (**self).get_caps(ep)
    }

    fn set_format(
        &mut self,
        ep: Endpoint,
        fmt: &Format,
    ) -> Result<(), Error<Self::CommError>> {
        (**self).set_format(ep, fmt)
    }

    fn get_format(&self, ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        (**self).get_format(ep)
    }

    fn set_frame_interval(
        &mut self,
        ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        (**self).set_frame_interval(ep, interval)
    }

    fn get_frame_interval(
        &self,
        ep: Endpoint,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        (**self).get_frame_interval(ep)
    }

    fn enum_frame_interval(
        &self,
        ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        (**self).enum_frame_interval(ep, fmt, index)
    }

    fn set_stream(&mut self, on: bool) -> Result<(), Error<Self::CommError>> {
        (**self).set_stream(on)
    }

    fn set_ctrl(
        &mut self,
        id: ControlId,
        value: i32,
    ) -> Result<(), Error<Self::CommError>> {
        (**self).set_ctrl(id, value)
    }

    fn get_ctrl(&self, id: ControlId) -> Result<i32, Error<Self::CommError>> {
        (**self).get_ctrl(id)
    }
}

/// Controls understood by at least one stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlId {
    Exposure,
    Brightness,
    AnalogueGain,
    Gain,
    TestPattern,
}

/// A control with its allowed range and last accepted value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Control {
    pub id: ControlId,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default: i32,
    value: i32,
}

impl Control {
    pub const fn new(id: ControlId, min: i32, max: i32, step: i32, default: i32) -> Self {
        Self {
            id,
            min,
            max,
            step,
            default,
            value: default,
        }
    }

    /// Menu control with `items` entries, starting at entry 0
    pub const fn menu(id: ControlId, items: i32) -> Self {
        Self::new(id, 0, items - 1, 1, 0)
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn validate<E>(&self, value: i32) -> Result<(), Error<E>> {
        if value < self.min || value > self.max {
            return Err(Error::OutOfRange);
        }
        if self.step > 1 && (value - self.min) % self.step != 0 {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    /// Record a value already written to the hardware
    pub fn commit(&mut self, value: i32) {
        self.value = value;
    }
}

/// Find a control by id, `Unsupported` when the device lacks it
pub fn find_control<E>(
    controls: &mut [Control],
    id: ControlId,
) -> Result<&mut Control, Error<E>> {
    controls
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or(Error::Unsupported)
}
