//! Provides a driver for a Texas Instruments ADS131A04 4-channel delta-sigma ADC via the
//! `embedded-hal` ecosystem.
//!
//! The chip boots locked. Writes to the configuration registers are bracketed by
//! `UNLOCK`/`LOCK`, and the driver checks the status word the chip returns for each step.
//! Conversion frames hold a status word and four 24-bit samples, using 24-bit or
//! 32-bit slots as selected by [`WordWidth`].
//!
//! ```ignore
//! let mut adc = Ads131a04::new(spi, reset, drdy, delay, Config::default());
//! adc.init()?;
//! adc.set_sample_rate(16_384_000, SampleRate::Sps1000)?;
//! adc.on_data_ready(Some(move || { let _ = tx.send(()); }))?;
//! adc.start()?;
//!
//! while rx.recv().is_ok() {
//!     let frame = adc.read_sample()?;
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

#[cfg(all(feature = "sim", not(test)))]
extern crate std;

use embedded_hal::digital::InputPin;

pub mod clock;
pub mod command;
pub mod config;
mod driver;
pub mod error;
pub mod frame;
mod gain;
mod protocol;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use clock::{ClockConfig, OversamplingRatio, SampleRate, Unsupported};
pub use command::{Command, ProtectionState, Register};
pub use config::{Config, ResetTiming};
pub use driver::Ads131a04;
pub use error::{Error, Step};
pub use frame::{decode_frame, SampleFrame, WordWidth};
pub use gain::{Channel, Gain};

/// The data-ready line: a readable input with an edge interrupt on the falling edge.
///
/// The driver attaches at most one handler at a time and toggles the interrupt with
/// [`enable_interrupt`](Self::enable_interrupt) and
/// [`disable_interrupt`](Self::disable_interrupt). Implementations call the handler from
/// whatever context services the edge.
pub trait DataReadyLine: InputPin {
    /// Store `handler`, replacing any previous one. Does not enable the interrupt.
    fn attach<F>(&mut self, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static;

    /// Drop the stored handler.
    fn detach(&mut self) -> Result<(), Self::Error>;

    fn enable_interrupt(&mut self) -> Result<(), Self::Error>;

    fn disable_interrupt(&mut self) -> Result<(), Self::Error>;
}
