use crate::clock::{ClockConfig, SampleRate, Unsupported};
use crate::frame::WordWidth;
use crate::Gain;

/// Reset line timing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResetTiming {
    /// Time `RESET` is held low.
    pub pulse_us: u32,
    /// Time after `RESET` is released before the first transaction.
    pub settle_us: u32,
    /// Some revisions pulse data-ready once after reset. When set, wait for one
    /// low → high → low cycle before talking to the chip.
    pub drdy_handshake: bool,
    /// Extra delay after the data-ready cycle.
    pub handshake_settle_us: u32,
    /// Give up on the data-ready cycle after this long.
    pub handshake_timeout_us: u32,
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self {
            pulse_us: 1_000,
            settle_us: 5_000,
            drdy_handshake: false,
            handshake_settle_us: 1_000,
            handshake_timeout_us: 100_000,
        }
    }
}

/// Driver configuration, fixed when the driver is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub word_width: WordWidth,
    pub reset: ResetTiming,
    /// Wait before the single identification retry.
    pub identify_retry_us: u32,
    /// Clock dividers written by `init`.
    pub clock: ClockConfig,
    /// Gain written to every channel by `init`.
    pub gain: Gain,
    /// `ADC_ENA` bits set by `start`. Bit n enables channel n + 1. Bits above 3 are ignored.
    pub channel_mask: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            word_width: WordWidth::Wide,
            reset: ResetTiming::default(),
            identify_retry_us: 1_000_000,
            clock: ClockConfig::default(),
            gain: Gain::X2,
            channel_mask: 0x0F,
        }
    }
}

impl Config {
    pub fn with_word_width(mut self, word_width: WordWidth) -> Self {
        self.word_width = word_width;
        self
    }

    pub fn with_reset_timing(mut self, reset: ResetTiming) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Use the profile for `rate` under a `reference_hz` clock.
    pub fn with_sample_rate(mut self, reference_hz: u32, rate: SampleRate) -> Result<Self, Unsupported> {
        self.clock = ClockConfig::for_rate(reference_hz, rate)?;
        Ok(self)
    }

    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    /// Only the low four bits are used.
    pub fn with_channel_mask(mut self, mask: u8) -> Self {
        self.channel_mask = mask & 0x0F;
        self
    }
}
