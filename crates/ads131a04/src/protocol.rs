//! Register access and the lock bracket around protected writes.
//!
//! Every command is two exchanges: the command slot, then a `NULL` slot that clocks
//! out the chip's reply to it. Each exchange is its own `SpiDevice` transaction, so
//! chip-select is released between the two phases and on every error path.

use embedded_hal::spi::SpiDevice;
use log::{debug, trace, warn};

use crate::command::{register_echo, Command, ProtectionState, Register, STATUS_LOCKED, STATUS_UNLOCKED};
use crate::error::{Error, Step};
use crate::frame::{self, SampleFrame, WordWidth, MAX_FRAME_LEN};

/// First slot of a reply. Unused trailing bytes are zero.
type Slot = [u8; 4];

pub(crate) struct Bus<SPI> {
    spi: SPI,
    width: WordWidth,
    protection: ProtectionState,
}

impl<SPI: SpiDevice> Bus<SPI> {
    pub fn new(spi: SPI, width: WordWidth) -> Self {
        Self {
            spi,
            width,
            protection: ProtectionState::Locked,
        }
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    pub fn protection(&self) -> ProtectionState {
        self.protection
    }

    /// The chip always comes out of reset locked.
    pub fn mark_reset(&mut self) {
        self.protection = ProtectionState::Locked;
    }

    fn exchange(&mut self, buffer: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        trace!("tx {:02X?}", buffer);
        self.spi.transfer_in_place(buffer).map_err(Error::Transport)?;
        trace!("rx {:02X?}", buffer);
        Ok(())
    }

    /// Send `command` and return the first slot of the following exchange.
    fn transact(&mut self, command: Command) -> Result<Slot, Error<SPI::Error>> {
        let len = self.width.slot_len();

        let mut slot = [0u8; 4];
        command.encode(&mut slot[..len]);
        self.exchange(&mut slot[..len])?;

        let mut reply = [0u8; 4];
        Command::Null.encode(&mut reply[..len]);
        self.exchange(&mut reply[..len])?;

        Ok(reply)
    }

    /// Send a system command and return the status word it produced.
    pub fn command(&mut self, command: Command) -> Result<u16, Error<SPI::Error>> {
        let reply = self.transact(command)?;
        let status = u16::from_be_bytes([reply[0], reply[1]]);
        debug!("{command:?} -> status 0x{status:04X}");
        Ok(status)
    }

    pub fn read_register(&mut self, reg: Register) -> Result<u8, Error<SPI::Error>> {
        let reply = self.transact(Command::ReadRegister(reg))?;
        debug!("read {reg:?} = 0x{:02X}", reply[1]);
        Ok(reply[1])
    }

    /// Write a register and check the chip echoes the address and value back.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), Error<SPI::Error>> {
        let reply = self.transact(Command::WriteRegister(reg, value))?;

        let expected = u16::from_be_bytes([register_echo(reg), value]);
        let observed = u16::from_be_bytes([reply[0], reply[1]]);

        if observed != expected {
            return Err(Error::ProtocolMismatch {
                step: Step::WriteEcho(reg),
                expected,
                observed,
            });
        }

        debug!("wrote {reg:?} = 0x{value:02X}");
        Ok(())
    }

    /// Clock out one conversion frame.
    pub fn read_frame(&mut self) -> Result<SampleFrame, Error<SPI::Error>> {
        let mut buffer = [0u8; MAX_FRAME_LEN];
        let raw = &mut buffer[..self.width.frame_len()];

        self.exchange(raw)?;

        Ok(frame::parse(raw, self.width))
    }

    fn unlock(&mut self) -> Result<(), Error<SPI::Error>> {
        let observed = self.command(Command::Unlock)?;

        if observed != STATUS_UNLOCKED {
            return Err(Error::ProtocolMismatch {
                step: Step::Unlock,
                expected: STATUS_UNLOCKED,
                observed,
            });
        }

        self.protection = ProtectionState::Unlocked;
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Error<SPI::Error>> {
        let observed = self.command(Command::Lock)?;

        if observed != STATUS_LOCKED {
            return Err(Error::ProtocolMismatch {
                step: Step::Lock,
                expected: STATUS_LOCKED,
                observed,
            });
        }

        self.protection = ProtectionState::Locked;
        Ok(())
    }

    /// Run `mutate` between `UNLOCK` and `LOCK`.
    ///
    /// `mutate` only runs if the chip confirms the unlock. `LOCK` is sent whatever
    /// happens after `UNLOCK` went out, and the first error is the one returned.
    pub fn unlocked<T, F>(&mut self, mutate: F) -> Result<T, Error<SPI::Error>>
    where
        F: FnOnce(&mut Self) -> Result<T, Error<SPI::Error>>,
    {
        let result = self.unlock().and_then(|()| mutate(self));
        let closed = self.lock();

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => {
                warn!("relocked after failed protected access: {err:?}");
                Err(err)
            }
            (Err(err), Err(lock_err)) => {
                warn!("relock failed after {err:?}: {lock_err:?}");
                Err(err)
            }
        }
    }
}
