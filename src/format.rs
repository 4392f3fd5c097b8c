/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! Pixel formats, capabilities and frame intervals shared by every stage.

use core::fmt;

/// Maximum number of capabilities a stage reports
pub const MAX_CAPS: usize = 10;

/// Capability list as reported by `get_caps`
pub type Caps = heapless::Vec<FormatCap, MAX_CAPS>;

/// FourCC pixel format tag
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> Self {
        PixelFormat(a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24)
    }

    /// 8-bit Bayer, BG/GR
    pub const SBGGR8: Self = Self::fourcc(b'B', b'A', b'8', b'1');
    /// 8-bit Bayer, GB/RG
    pub const SGBRG8: Self = Self::fourcc(b'G', b'B', b'R', b'G');
    /// 8-bit Bayer, GR/BG
    pub const SGRBG8: Self = Self::fourcc(b'G', b'R', b'B', b'G');
    /// 8-bit Bayer, RG/GB
    pub const SRGGB8: Self = Self::fourcc(b'R', b'G', b'G', b'B');
    /// Packed YUV 4:2:2
    pub const YUYV: Self = Self::fourcc(b'Y', b'U', b'Y', b'V');
    pub const RGB565: Self = Self::fourcc(b'R', b'G', b'B', b'P');

    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::YUYV | Self::RGB565 => 16,
            _ => 8,
        }
    }

    pub fn is_bayer(self) -> bool {
        matches!(
            self,
            Self::SBGGR8 | Self::SGBRG8 | Self::SGRBG8 | Self::SRGGB8
        )
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_le_bytes();
        write!(
            f,
            "{}{}{}{}",
            b[0] as char, b[1] as char, b[2] as char, b[3] as char
        )
    }
}

/// One supported geometry and pixel encoding. A zero step means the size
/// is fixed and must equal min (and max).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatCap {
    pub pixelformat: PixelFormat,
    pub width_min: u32,
    pub width_max: u32,
    pub height_min: u32,
    pub height_max: u32,
    pub width_step: u32,
    pub height_step: u32,
}

impl FormatCap {
    pub const fn fixed(pixelformat: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            pixelformat,
            width_min: width,
            width_max: width,
            height_min: height,
            height_max: height,
            width_step: 0,
            height_step: 0,
        }
    }

    pub fn matches(&self, fmt: &Format) -> bool {
        fn fits(value: u32, min: u32, max: u32, step: u32) -> bool {
            if step == 0 {
                value == min && value == max
            } else {
                value >= min && value <= max && (value - min) % step == 0
            }
        }

        self.pixelformat == fmt.pixelformat
            && fits(fmt.width, self.width_min, self.width_max, self.width_step)
            && fits(fmt.height, self.height_min, self.height_max, self.height_step)
    }

    /// The format at the largest size of this capability
    pub fn max_format(&self) -> Format {
        Format::new(self.pixelformat, self.width_max, self.height_max)
    }
}

/// Index of the first capability accepting `fmt`
pub fn caps_index<'c, I>(caps: I, fmt: &Format) -> Option<usize>
where
    I: IntoIterator<Item = &'c FormatCap>,
{
    caps.into_iter().position(|cap| cap.matches(fmt))
}

/// Active image format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Format {
    pub pixelformat: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per line
    pub pitch: u32,
}

impl Format {
    /// A format with the pitch derived from the pixel size. The pitch
    /// saturates at `u32::MAX` for widths no line buffer can hold.
    pub fn new(pixelformat: PixelFormat, width: u32, height: u32) -> Self {
        let pitch = width as u64 * pixelformat.bits_per_pixel() as u64 / 8;
        Self {
            pixelformat,
            width,
            height,
            pitch: u32::try_from(pitch).unwrap_or(u32::MAX),
        }
    }

    /// Like `new`, but `None` when the pitch does not fit in 32 bits
    pub fn checked(pixelformat: PixelFormat, width: u32, height: u32) -> Option<Self> {
        let pitch = width.checked_mul(pixelformat.bits_per_pixel() / 8)?;
        Some(Self {
            pixelformat,
            width,
            height,
            pitch,
        })
    }

    /// Bytes in one frame
    pub fn frame_size(&self) -> usize {
        (self.pitch as usize).saturating_mul(self.height as usize)
    }
}

/// Time between two frames, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInterval {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameInterval {
    pub const fn from_fps(fps: u32) -> Self {
        Self {
            numerator: 1,
            denominator: fps,
        }
    }

    pub fn as_nanos(&self) -> u64 {
        if self.denominator == 0 {
            return u64::MAX;
        }
        self.numerator as u64 * 1_000_000_000 / self.denominator as u64
    }
}

/// Pick the candidate interval closest to `desired`. Ties keep the earlier one.
pub fn closest_interval<I>(candidates: I, desired: &FrameInterval) -> Option<usize>
where
    I: IntoIterator<Item = FrameInterval>,
{
    let goal = desired.as_nanos();
    let mut best: Option<(usize, u64)> = None;
    for (i, candidate) in candidates.into_iter().enumerate() {
        let diff = candidate.as_nanos().abs_diff(goal);
        if best.map_or(true, |(_, d)| diff < d) {
            best = Some((i, diff));
        }
    }
    best.map(|(i, _)| i)
}

/// Data direction a request is addressed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Out,
    In,
    All,
}

impl Endpoint {
    /// Capture devices only have an output side
    pub fn is_output(self) -> bool {
        matches!(self, Endpoint::Out | Endpoint::All)
    }
}
