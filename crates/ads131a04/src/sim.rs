//! Software model of an ADS131A04 for host runs and tests.
//!
//! [`SimChip`] is a cheap handle to shared chip state. The bus, reset line, data-ready
//! line and delay it hands out all act on that state, so a test can drive the driver
//! and inspect the chip afterwards.

use std::boxed::Box;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use crate::command::{Register, CHIP_ID, STATUS_LOCKED, STATUS_RESET, STATUS_UNLOCKED};
use crate::frame::WordWidth;
use crate::DataReadyLine;

const STANDBY: u16 = 0x0022;
const WAKEUP: u16 = 0x0033;
const STATUS_READY: u16 = 0x2200;

const REGISTER_COUNT: usize = 0x15;

/// Injected bus failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

type Handler = Box<dyn FnMut() + Send>;

struct State {
    width: WordWidth,
    registers: [u8; REGISTER_COUNT],
    locked: bool,
    fresh_reset: bool,
    awake: bool,
    in_reset: bool,
    reply: u16,
    samples: [i32; 4],
    unlock_status: Option<u16>,
    lock_status: Option<u16>,
    fail_write: Option<Register>,
    corrupt_echo: Option<Register>,
    transfers: Vec<Vec<u8>>,
    resets: usize,
    drdy_levels: VecDeque<bool>,
    drdy_stuck: Option<bool>,
    handler: Option<Handler>,
    interrupt_enabled: bool,
    slept_ns: u64,
}

impl State {
    fn new(width: WordWidth) -> Self {
        let mut state = Self {
            width,
            registers: [0; REGISTER_COUNT],
            locked: true,
            fresh_reset: true,
            awake: false,
            in_reset: false,
            reply: STATUS_RESET,
            samples: [0; 4],
            unlock_status: None,
            lock_status: None,
            fail_write: None,
            corrupt_echo: None,
            transfers: Vec::new(),
            resets: 0,
            drdy_levels: VecDeque::new(),
            drdy_stuck: None,
            handler: None,
            interrupt_enabled: false,
            slept_ns: 0,
        };
        state.power_on();
        state
    }

    fn power_on(&mut self) {
        self.registers = [0; REGISTER_COUNT];
        self.registers[Register::IdMsb as usize] = CHIP_ID;
        self.registers[Register::ASysCfg as usize] = 0x60;
        self.registers[Register::DSysCfg as usize] = 0x3C;
        self.registers[Register::Clk1 as usize] = 0x08;
        self.registers[Register::Clk2 as usize] = 0x86;
        self.locked = true;
        self.fresh_reset = true;
        self.awake = false;
        self.reply = STATUS_RESET;
    }

    /// Bytes the chip shifts out during an exchange of `len` bytes.
    fn output(&self, len: usize) -> Vec<u8> {
        let slot = self.width.slot_len();
        let mut out = std::vec![0u8; len];

        if self.in_reset {
            return out;
        }

        out[..2].copy_from_slice(&self.reply.to_be_bytes());

        if len == self.width.frame_len() {
            for (index, sample) in self.samples.iter().enumerate() {
                let offset = (index + 1) * slot;
                out[offset..offset + 3].copy_from_slice(&sample.to_be_bytes()[1..]);
            }
        }

        out
    }

    fn process(&mut self, input: &[u8]) -> Result<(), SimError> {
        if self.in_reset {
            return Ok(());
        }

        let word = u16::from_be_bytes([input[0], input[1]]);
        let [high, low] = word.to_be_bytes();

        self.reply = match word {
            0x0000 if self.fresh_reset => STATUS_RESET,
            0x0000 => STATUS_READY | u16::from(self.registers[Register::Stat1 as usize]),
            0x0011 => {
                self.power_on();
                STATUS_RESET
            }
            STANDBY => {
                self.awake = false;
                STANDBY
            }
            WAKEUP => {
                self.awake = true;
                WAKEUP
            }
            STATUS_LOCKED => {
                let status = self.lock_status.unwrap_or(STATUS_LOCKED);
                if status == STATUS_LOCKED {
                    self.locked = true;
                }
                status
            }
            STATUS_UNLOCKED => {
                let status = self.unlock_status.unwrap_or(STATUS_UNLOCKED);
                if status == STATUS_UNLOCKED {
                    self.locked = false;
                    self.fresh_reset = false;
                }
                status
            }
            _ if high & 0xE0 == 0x20 => {
                let address = high & 0x1F;
                u16::from_be_bytes([0x20 | address, self.read(address)])
            }
            _ if high & 0xE0 == 0x40 => {
                let address = high & 0x1F;
                if self.fail_write.map(|reg| reg as u8) == Some(address) {
                    return Err(SimError);
                }
                self.write(address, low);
                let echoed = if self.corrupt_echo.map(|reg| reg as u8) == Some(address) {
                    address ^ 0x01
                } else {
                    address
                };
                u16::from_be_bytes([0x20 | echoed, self.read(address)])
            }
            _ => 0x0000,
        };

        Ok(())
    }

    fn read(&self, address: u8) -> u8 {
        self.registers.get(usize::from(address)).copied().unwrap_or(0)
    }

    fn write(&mut self, address: u8, value: u8) {
        let writable = (Register::ASysCfg as u8..=Register::Adc4 as u8).contains(&address);
        if writable && !self.locked {
            self.registers[usize::from(address)] = value;
        }
    }
}

/// Handle to a simulated chip.
#[derive(Clone)]
pub struct SimChip {
    state: Rc<RefCell<State>>,
}

impl SimChip {
    /// A chip fresh out of power-on reset.
    pub fn new(width: WordWidth) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::new(width))),
        }
    }

    pub fn width(&self) -> WordWidth {
        self.state.borrow().width
    }

    pub fn spi(&self) -> SimSpi {
        SimSpi { chip: self.clone() }
    }

    pub fn reset_pin(&self) -> SimResetPin {
        SimResetPin { chip: self.clone() }
    }

    pub fn data_ready(&self) -> SimDataReady {
        SimDataReady { chip: self.clone() }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { chip: self.clone() }
    }

    /// Every byte sequence sent to the chip, oldest first.
    pub fn transfers(&self) -> Vec<Vec<u8>> {
        self.state.borrow().transfers.clone()
    }

    /// The first 16 bits of every transfer.
    pub fn commands(&self) -> Vec<u16> {
        self.state
            .borrow()
            .transfers
            .iter()
            .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
            .collect()
    }

    pub fn clear_transfers(&self) {
        self.state.borrow_mut().transfers.clear();
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.state.borrow().read(reg as u8)
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().locked
    }

    pub fn is_awake(&self) -> bool {
        self.state.borrow().awake
    }

    /// Number of completed reset pulses.
    pub fn resets(&self) -> usize {
        self.state.borrow().resets
    }

    /// Total time the driver asked to sleep, in microseconds.
    pub fn slept_us(&self) -> u64 {
        self.state.borrow().slept_ns / 1_000
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state.borrow().interrupt_enabled
    }

    pub fn handler_attached(&self) -> bool {
        self.state.borrow().handler.is_some()
    }

    /// Answer `UNLOCK` with `status`. Anything but the unlocked status leaves the chip locked.
    pub fn set_unlock_status(&self, status: u16) {
        self.state.borrow_mut().unlock_status = Some(status);
    }

    /// Answer `LOCK` with `status`. Anything but the locked status leaves the chip unlocked.
    pub fn set_lock_status(&self, status: u16) {
        self.state.borrow_mut().lock_status = Some(status);
    }

    /// Hold data-ready at `high` regardless of resets.
    pub fn stick_data_ready(&self, high: bool) {
        self.state.borrow_mut().drdy_stuck = Some(high);
    }

    /// Fail the bus exchange carrying any write to `reg`.
    pub fn fail_write(&self, reg: Register) {
        self.state.borrow_mut().fail_write = Some(reg);
    }

    /// Echo the wrong address for writes to `reg`.
    pub fn corrupt_echo(&self, reg: Register) {
        self.state.borrow_mut().corrupt_echo = Some(reg);
    }

    /// Values returned in the next conversion frames.
    pub fn set_samples(&self, samples: [i32; 4]) {
        self.state.borrow_mut().samples = samples;
    }

    /// Signal a finished conversion. Returns whether a handler ran.
    pub fn fire_data_ready(&self) -> bool {
        let handler = {
            let mut state = self.state.borrow_mut();
            if !state.interrupt_enabled {
                return false;
            }
            state.handler.take()
        };

        let Some(mut handler) = handler else {
            return false;
        };

        handler();

        let mut state = self.state.borrow_mut();
        if state.handler.is_none() {
            state.handler = Some(handler);
        }
        true
    }
}

/// Bus side of a [`SimChip`].
pub struct SimSpi {
    chip: SimChip,
}

impl spi::ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.chip.state.borrow_mut();

        for operation in operations.iter_mut() {
            match operation {
                Operation::TransferInPlace(words) => {
                    state.transfers.push(words.to_vec());
                    let output = state.output(words.len());
                    let input = words.to_vec();
                    words.copy_from_slice(&output);
                    state.process(&input)?;
                }
                Operation::Write(words) => {
                    state.transfers.push(words.to_vec());
                    state.process(words)?;
                }
                Operation::Transfer(read, write) => {
                    state.transfers.push(write.to_vec());
                    let output = state.output(read.len());
                    read.copy_from_slice(&output);
                    state.process(write)?;
                }
                Operation::Read(words) => {
                    let output = state.output(words.len());
                    words.copy_from_slice(&output);
                }
                Operation::DelayNs(ns) => state.slept_ns += u64::from(*ns),
            }
        }

        Ok(())
    }
}

/// Reset line of a [`SimChip`].
pub struct SimResetPin {
    chip: SimChip,
}

impl digital::ErrorType for SimResetPin {
    type Error = Infallible;
}

impl OutputPin for SimResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.chip.state.borrow_mut().in_reset = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.chip.state.borrow_mut();
        if state.in_reset {
            state.in_reset = false;
            state.resets += 1;
            state.power_on();
            state.drdy_levels = [false, true, true, false].into_iter().collect();
        }
        Ok(())
    }
}

/// Data-ready line of a [`SimChip`]. Idles high.
pub struct SimDataReady {
    chip: SimChip,
}

impl digital::ErrorType for SimDataReady {
    type Error = Infallible;
}

impl InputPin for SimDataReady {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.chip.state.borrow_mut();
        if let Some(level) = state.drdy_stuck {
            return Ok(level);
        }
        Ok(state.drdy_levels.pop_front().unwrap_or(true))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl DataReadyLine for SimDataReady {
    fn attach<F>(&mut self, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static,
    {
        self.chip.state.borrow_mut().handler = Some(Box::new(handler));
        Ok(())
    }

    fn detach(&mut self) -> Result<(), Self::Error> {
        self.chip.state.borrow_mut().handler = None;
        Ok(())
    }

    fn enable_interrupt(&mut self) -> Result<(), Self::Error> {
        self.chip.state.borrow_mut().interrupt_enabled = true;
        Ok(())
    }

    fn disable_interrupt(&mut self) -> Result<(), Self::Error> {
        self.chip.state.borrow_mut().interrupt_enabled = false;
        Ok(())
    }
}

/// Delay that only records how long it was asked to wait.
pub struct SimDelay {
    chip: SimChip,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.chip.state.borrow_mut().slept_ns += u64::from(ns);
    }
}
