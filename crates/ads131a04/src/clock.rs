//! Clock divider configuration.
//!
//! The output data rate is `f_CLKIN / (2 * CLK_DIV) / (2 * ICLK_DIV) / OSR`. `CLK_DIV`
//! lives in bits 3:1 of `CLK1`, `ICLK_DIV` in bits 7:5 of `CLK2` and the OSR code in
//! bits 3:0 of `CLK2`.

use core::fmt;

/// Target output data rates with a profile entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleRate {
    Sps250,
    Sps500,
    Sps1000,
    Sps2000,
    Sps2500,
}

impl SampleRate {
    /// Sample rate in Hz
    pub const fn hz(self) -> u32 {
        match self {
            Self::Sps250 => 250,
            Self::Sps500 => 500,
            Self::Sps1000 => 1000,
            Self::Sps2000 => 2000,
            Self::Sps2500 => 2500,
        }
    }
}

/// Oversampling ratio, by its 4-bit register code.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OversamplingRatio {
    Osr4096 = 0x00,
    Osr2048 = 0x01,
    Osr1024 = 0x02,
    Osr800 = 0x03,
    Osr768 = 0x04,
    Osr512 = 0x05,
    Osr400 = 0x06,
    Osr384 = 0x07,
    Osr256 = 0x08,
    Osr200 = 0x09,
    Osr192 = 0x0A,
    Osr128 = 0x0B,
    Osr96 = 0x0C,
    Osr64 = 0x0D,
    Osr48 = 0x0E,
    Osr32 = 0x0F,
}

impl OversamplingRatio {
    const ALL: [Self; 16] = [
        Self::Osr4096,
        Self::Osr2048,
        Self::Osr1024,
        Self::Osr800,
        Self::Osr768,
        Self::Osr512,
        Self::Osr400,
        Self::Osr384,
        Self::Osr256,
        Self::Osr200,
        Self::Osr192,
        Self::Osr128,
        Self::Osr96,
        Self::Osr64,
        Self::Osr48,
        Self::Osr32,
    ];

    /// Look up a ratio by register code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Decimation factor.
    pub const fn ratio(self) -> u32 {
        match self {
            Self::Osr4096 => 4096,
            Self::Osr2048 => 2048,
            Self::Osr1024 => 1024,
            Self::Osr800 => 800,
            Self::Osr768 => 768,
            Self::Osr512 => 512,
            Self::Osr400 => 400,
            Self::Osr384 => 384,
            Self::Osr256 => 256,
            Self::Osr200 => 200,
            Self::Osr192 => 192,
            Self::Osr128 => 128,
            Self::Osr96 => 96,
            Self::Osr64 => 64,
            Self::Osr48 => 48,
            Self::Osr32 => 32,
        }
    }
}

/// Reasons a clock or rate request cannot be applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unsupported {
    /// No profile table exists for this reference frequency.
    ReferenceClock { reference_hz: u32 },
    /// The table for this reference frequency has no entry for the rate.
    SampleRate { reference_hz: u32, rate: SampleRate },
    /// `CLK_DIV` code outside 1..=7.
    ClockDivider(u8),
    /// `ICLK_DIV` code outside 1..=7.
    InternalDivider(u8),
    /// OSR code outside 0..=15.
    Oversampling(u8),
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReferenceClock { reference_hz } => {
                write!(f, "no sample rate profile for a {reference_hz} Hz reference clock")
            }
            Self::SampleRate { reference_hz, rate } => write!(
                f,
                "{} Hz is not reachable from a {reference_hz} Hz reference clock",
                rate.hz()
            ),
            Self::ClockDivider(code) => write!(f, "CLK_DIV code {code} outside 1..=7"),
            Self::InternalDivider(code) => write!(f, "ICLK_DIV code {code} outside 1..=7"),
            Self::Oversampling(code) => write!(f, "OSR code {code} outside 0..=15"),
        }
    }
}

impl core::error::Error for Unsupported {}

/// Validated contents of the `CLK1`/`CLK2` registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    clkin_div: u8,
    iclk_div: u8,
    osr: OversamplingRatio,
}

impl Default for ClockConfig {
    /// CLKIN/2, ICLK/2, OSR 512.
    fn default() -> Self {
        Self {
            clkin_div: 1,
            iclk_div: 1,
            osr: OversamplingRatio::Osr512,
        }
    }
}

impl ClockConfig {
    /// Build from raw register codes. Every code is checked before anything is returned.
    pub fn new(clkin_div: u8, iclk_div: u8, osr_code: u8) -> Result<Self, Unsupported> {
        if !(1..=7).contains(&clkin_div) {
            return Err(Unsupported::ClockDivider(clkin_div));
        }

        if !(1..=7).contains(&iclk_div) {
            return Err(Unsupported::InternalDivider(iclk_div));
        }

        let osr = OversamplingRatio::from_code(osr_code).ok_or(Unsupported::Oversampling(osr_code))?;

        Ok(Self { clkin_div, iclk_div, osr })
    }

    /// Look up the profile for `rate` under a reference clock of `reference_hz`.
    pub fn for_rate(reference_hz: u32, rate: SampleRate) -> Result<Self, Unsupported> {
        let table = PROFILES
            .iter()
            .find(|(hz, _)| *hz == reference_hz)
            .map(|(_, table)| *table)
            .ok_or(Unsupported::ReferenceClock { reference_hz })?;

        let &(_, clkin_div, iclk_div, osr) = table
            .iter()
            .find(|(entry, ..)| *entry == rate)
            .ok_or(Unsupported::SampleRate { reference_hz, rate })?;

        Ok(Self { clkin_div, iclk_div, osr })
    }

    pub const fn clkin_div(&self) -> u8 {
        self.clkin_div
    }

    pub const fn iclk_div(&self) -> u8 {
        self.iclk_div
    }

    pub const fn oversampling(&self) -> OversamplingRatio {
        self.osr
    }

    /// Value for the `CLK1` register.
    pub const fn clk1(&self) -> u8 {
        (self.clkin_div & 0b111) << 1
    }

    /// Value for the `CLK2` register.
    pub const fn clk2(&self) -> u8 {
        ((self.iclk_div & 0b111) << 5) | (self.osr as u8 & 0b1111)
    }

    /// Total division from the reference clock to the output data rate.
    pub const fn divisor(&self) -> u32 {
        2 * self.clkin_div as u32 * 2 * self.iclk_div as u32 * self.osr.ratio()
    }

    /// Output data rate for a given reference clock.
    pub fn output_rate_hz(&self, reference_hz: u32) -> f32 {
        reference_hz as f32 / self.divisor() as f32
    }
}

type Profile = (SampleRate, u8, u8, OversamplingRatio);

const PROFILES: &[(u32, &[Profile])] = &[
    (
        8_192_000,
        &[
            (SampleRate::Sps250, 1, 2, OversamplingRatio::Osr4096),
            (SampleRate::Sps500, 1, 1, OversamplingRatio::Osr4096),
            (SampleRate::Sps1000, 1, 1, OversamplingRatio::Osr2048),
            (SampleRate::Sps2000, 1, 1, OversamplingRatio::Osr1024),
        ],
    ),
    (
        16_384_000,
        &[
            (SampleRate::Sps250, 2, 2, OversamplingRatio::Osr4096),
            (SampleRate::Sps500, 1, 2, OversamplingRatio::Osr4096),
            (SampleRate::Sps1000, 1, 1, OversamplingRatio::Osr4096),
            (SampleRate::Sps2000, 1, 1, OversamplingRatio::Osr2048),
        ],
    ),
    (
        20_000_000,
        &[
            (SampleRate::Sps250, 5, 5, OversamplingRatio::Osr800),
            (SampleRate::Sps500, 5, 5, OversamplingRatio::Osr400),
            (SampleRate::Sps1000, 5, 5, OversamplingRatio::Osr200),
            (SampleRate::Sps2500, 1, 5, OversamplingRatio::Osr400),
        ],
    ),
];
