/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Automatic exposure control driven by the statistics block.

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::device::{ControlId, VideoDevice};
use crate::stats::ChannelStats;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AecConfig {
    /// Target average luma
    pub goal_y: u32,
    pub exposure_min: i32,
    pub exposure_max: i32,
}

impl Default for AecConfig {
    fn default() -> Self {
        Self {
            goal_y: 160,
            exposure_min: 0,
            exposure_max: 8000,
        }
    }
}

/// Average of the three color channels
pub fn luma(stats: &ChannelStats) -> u32 {
    (stats.red as u32 + stats.green as u32 + stats.blue as u32) / 3
}

/// Exposure to apply after observing `y` with exposure `prev`.
/// Within 90% to 120% of the goal the exposure is kept.
pub fn next_exposure(config: &AecConfig, y: u32, prev: i32) -> i32 {
    let next = if y < config.goal_y * 90 / 100 {
        prev * 103 / 100 + 1
    } else if y > config.goal_y * 120 / 100 {
        prev * 98 / 100
    } else {
        prev
    };
    next.clamp(config.exposure_min, config.exposure_max)
}

/// Run one correction step on `dev`. Returns the exposure now in effect.
pub fn aec_step<V: VideoDevice>(
    dev: &mut V,
    config: &AecConfig,
    stats: &ChannelStats,
) -> Result<i32, Error<V::CommError>> {
    let y = luma(stats);
    let prev = dev.get_ctrl(ControlId::Exposure)?;
    let next = next_exposure(config, y, prev);
    if next == prev {
        return Ok(prev);
    }
    #[cfg(feature = "rttdebug")]
    rprintln!("aec y {} exposure {} -> {}", y, prev, next);
    dev.set_ctrl(ControlId::Exposure, next)?;
    Ok(next)
}
