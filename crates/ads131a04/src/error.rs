use core::fmt;

use embedded_hal::digital;

use crate::clock::Unsupported;
use crate::command::Register;

/// Protocol step whose reply did not match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// `UNLOCK` did not return the unlocked status.
    Unlock,
    /// `LOCK` did not return the locked status.
    Lock,
    /// A register write was not echoed back correctly.
    WriteEcho(Register),
}

/// Driver error
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// SPI exchange failed
    Transport(E),
    /// Reset or data-ready line failed
    Pin(digital::ErrorKind),
    /// The chip answered with something other than the expected word
    ProtocolMismatch {
        /// Step that failed
        step: Step,
        /// Word the protocol requires
        expected: u16,
        /// Word the chip returned
        observed: u16,
    },
    /// Rate or clock parameter has no valid register encoding
    UnsupportedConfiguration(Unsupported),
    /// The chip never reported its post-reset status
    IdentificationFailure {
        /// Post-reset status
        expected: u16,
        /// Last status read
        observed: u16,
    },
    /// Data-ready did not complete its post-reset transition in time
    DataReadyTimeout {
        /// Time waited in microseconds
        timeout_us: u32,
    },
}

impl<E> Error<E> {
    pub(crate) fn pin<P: digital::Error>(err: P) -> Self {
        Self::Pin(err.kind())
    }
}

impl<E> From<Unsupported> for Error<E> {
    fn from(err: Unsupported) -> Self {
        Self::UnsupportedConfiguration(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "SPI exchange failed: {e:?}"),
            Self::Pin(kind) => write!(f, "GPIO line failed: {kind:?}"),
            Self::ProtocolMismatch { step, expected, observed } => write!(
                f,
                "{step:?}: expected 0x{expected:04X}, chip returned 0x{observed:04X}"
            ),
            Self::UnsupportedConfiguration(detail) => write!(f, "unsupported configuration: {detail}"),
            Self::IdentificationFailure { expected, observed } => write!(
                f,
                "identification failed: expected status 0x{expected:04X}, read 0x{observed:04X}"
            ),
            Self::DataReadyTimeout { timeout_us } => {
                write!(f, "data ready handshake timed out after {timeout_us}µs")
            }
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reports_observed_and_expected() {
        let err: Error<()> = Error::ProtocolMismatch {
            step: Step::Unlock,
            expected: 0x0655,
            observed: 0xFF04,
        };
        assert_eq!(err.to_string(), "Unlock: expected 0x0655, chip returned 0xFF04");

        let err: Error<()> = Unsupported::ClockDivider(9).into();
        assert_eq!(err.to_string(), "unsupported configuration: CLK_DIV code 9 outside 1..=7");
    }
}
