use crate::command::Register;

/// Digital gain, by `ADCx` register code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    /// 1x gain
    X1 = 0x00,
    /// 2x gain
    X2 = 0x01,
    /// 4x gain
    X4 = 0x02,
    /// 8x gain
    X8 = 0x03,
    /// 16x gain
    X16 = 0x04,
}

impl Gain {
    /// Get the gain multiplier
    pub const fn multiplier(self) -> u8 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

/// Channel selector for per-channel settings.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
    All,
}

static GAIN_REGISTERS: [Register; 4] = [Register::Adc1, Register::Adc2, Register::Adc3, Register::Adc4];

impl Channel {
    /// Gain registers addressed by this selector, in channel order.
    pub fn gain_registers(self) -> &'static [Register] {
        match self {
            Self::Ch1 => &GAIN_REGISTERS[0..1],
            Self::Ch2 => &GAIN_REGISTERS[1..2],
            Self::Ch3 => &GAIN_REGISTERS[2..3],
            Self::Ch4 => &GAIN_REGISTERS[3..4],
            Self::All => &GAIN_REGISTERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_registers() {
        assert_eq!(Channel::Ch3.gain_registers(), &[Register::Adc3]);
        assert_eq!(
            Channel::All.gain_registers(),
            &[Register::Adc1, Register::Adc2, Register::Adc3, Register::Adc4]
        );
    }
}
