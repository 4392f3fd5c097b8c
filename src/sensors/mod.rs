/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Drivers for the Sony sensors found on the camera boards.

pub mod imx219;
pub mod imx296;
pub mod imx477;

pub use imx219::Imx219;
pub use imx296::{Imx296, InputClock};
pub use imx477::Imx477;
