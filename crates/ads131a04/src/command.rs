//! Command words, register addresses and status sentinels.

/// Status returned after a reset while the chip is still locked. The low byte is the chip ID.
pub const STATUS_RESET: u16 = 0xFF04;

/// Status returned after a successful `UNLOCK`.
pub const STATUS_UNLOCKED: u16 = 0x0655;

/// Status returned after a successful `LOCK`.
pub const STATUS_LOCKED: u16 = 0x0555;

/// Value of the `ID_MSB` register for the ADS131A04.
pub const CHIP_ID: u8 = 0x04;

/// System commands. Register accesses are built with [`Command::ReadRegister`] and
/// [`Command::WriteRegister`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Null,
    Reset,
    Standby,
    Wakeup,
    Lock,
    Unlock,
    ReadRegister(Register),
    WriteRegister(Register, u8),
}

impl Command {
    const NULL: u16 = 0x0000;
    const RESET: u16 = 0x0011;
    const STANDBY: u16 = 0x0022;
    const WAKEUP: u16 = 0x0033;
    const LOCK: u16 = 0x0555;
    const UNLOCK: u16 = 0x0655;

    const RREG: u8 = 0x20;
    const WREG: u8 = 0x40;

    /// The 16-bit command word as sent in the first two bytes of a slot.
    pub const fn word(self) -> u16 {
        match self {
            Self::Null => Self::NULL,
            Self::Reset => Self::RESET,
            Self::Standby => Self::STANDBY,
            Self::Wakeup => Self::WAKEUP,
            Self::Lock => Self::LOCK,
            Self::Unlock => Self::UNLOCK,
            Self::ReadRegister(reg) => u16::from_be_bytes([Self::RREG | reg as u8, 0x00]),
            Self::WriteRegister(reg, value) => u16::from_be_bytes([Self::WREG | reg as u8, value]),
        }
    }

    /// Encode the command into the start of `slot`, zeroing the remaining bytes.
    pub fn encode(self, slot: &mut [u8]) {
        slot.fill(0);
        slot[..2].copy_from_slice(&self.word().to_be_bytes());
    }
}

/// Byte echoed back by the chip when it acknowledges a register access.
pub(crate) const fn register_echo(reg: Register) -> u8 {
    Command::RREG | reg as u8
}

/// Addressable registers.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    IdMsb = 0x00,
    IdLsb = 0x01,
    Stat1 = 0x02,
    StatP = 0x03,
    StatN = 0x04,
    StatS = 0x05,
    ErrorCnt = 0x06,
    StatM2 = 0x07,
    ASysCfg = 0x0B,
    DSysCfg = 0x0C,
    Clk1 = 0x0D,
    Clk2 = 0x0E,
    AdcEna = 0x0F,
    Adc1 = 0x11,
    Adc2 = 0x12,
    Adc3 = 0x13,
    Adc4 = 0x14,
}

impl Register {
    /// Registers that may only be written between `UNLOCK` and `LOCK`.
    pub const fn is_protected(self) -> bool {
        matches!(
            self,
            Self::ASysCfg
                | Self::DSysCfg
                | Self::Clk1
                | Self::Clk2
                | Self::AdcEna
                | Self::Adc1
                | Self::Adc2
                | Self::Adc3
                | Self::Adc4
        )
    }
}

/// Whether the chip is expected to accept writes to protected registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtectionState {
    Locked,
    Unlocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_command_words() {
        assert_eq!(Command::Null.word(), 0x0000);
        assert_eq!(Command::Reset.word(), 0x0011);
        assert_eq!(Command::Standby.word(), 0x0022);
        assert_eq!(Command::Wakeup.word(), 0x0033);
        assert_eq!(Command::Lock.word(), 0x0555);
        assert_eq!(Command::Unlock.word(), 0x0655);
    }

    #[test]
    fn register_commands_carry_address() {
        assert_eq!(Command::ReadRegister(Register::IdMsb).word(), 0x2000);
        assert_eq!(Command::ReadRegister(Register::Clk2).word(), 0x2E00);
        assert_eq!(Command::WriteRegister(Register::AdcEna, 0x0F).word(), 0x4F0F);
        assert_eq!(Command::WriteRegister(Register::Adc4, 0x01).word(), 0x5401);
    }

    #[test]
    fn encode_pads_slot() {
        let mut slot = [0xAA; 4];
        Command::Unlock.encode(&mut slot);
        assert_eq!(slot, [0x06, 0x55, 0x00, 0x00]);

        let mut slot = [0xAA; 3];
        Command::WriteRegister(Register::Clk1, 0x02).encode(&mut slot);
        assert_eq!(slot, [0x4D, 0x02, 0x00]);
    }

    #[test]
    fn protected_registers() {
        assert!(Register::Clk1.is_protected());
        assert!(Register::Adc3.is_protected());
        assert!(!Register::IdMsb.is_protected());
        assert!(!Register::Stat1.is_protected());
    }
}
