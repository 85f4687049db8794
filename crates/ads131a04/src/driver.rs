use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::{debug, info, warn};

use crate::clock::{ClockConfig, SampleRate};
use crate::command::{Command, ProtectionState, Register, STATUS_RESET};
use crate::config::Config;
use crate::error::Error;
use crate::frame::SampleFrame;
use crate::gain::{Channel, Gain};
use crate::protocol::Bus;
use crate::DataReadyLine;

/// Poll interval while waiting on the data-ready line.
const DRDY_POLL_US: u32 = 10;

/// ADS131A04 driver
///
/// Takes exclusive ownership of the bus device, reset line, data-ready line and delay.
/// Every method needs `&mut self`, which serialises lock brackets. Callers sharing one
/// driver between threads must wrap it in a mutex.
pub struct Ads131a04<SPI, RST, DRDY, D> {
    bus: Bus<SPI>,
    reset: RST,
    drdy: DRDY,
    delay: D,
    config: Config,
    handler_attached: bool,
    armed: bool,
    sampling: bool,
}

impl<SPI, RST, DRDY, D> Ads131a04<SPI, RST, DRDY, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DRDY: DataReadyLine,
    D: DelayNs,
{
    /// Creates a new driver. Nothing is sent until [`init`](Self::init) or [`reset`](Self::reset).
    /// The bus must be in SPI mode 1, aka (0, 1).
    pub fn new(spi: SPI, reset: RST, drdy: DRDY, delay: D, config: Config) -> Self {
        Self {
            bus: Bus::new(spi, config.word_width),
            reset,
            drdy,
            delay,
            config,
            handler_attached: false,
            armed: false,
            sampling: false,
        }
    }

    /// Give back the bus, pins and delay.
    pub fn release(self) -> (SPI, RST, DRDY, D) {
        (self.bus.release(), self.reset, self.drdy, self.delay)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Protection state after the last lock or unlock exchange.
    pub fn protection(&self) -> ProtectionState {
        self.bus.protection()
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Reset, identify, then program the configured clock and gain.
    pub fn init(&mut self) -> Result<(), Error<SPI::Error>> {
        self.reset()?;
        self.identify()?;

        let clock = self.config.clock;
        let gain = self.config.gain;

        self.bus.unlocked(|bus| {
            bus.write_register(Register::Clk1, clock.clk1())?;
            bus.write_register(Register::Clk2, clock.clk2())?;
            for &reg in Channel::All.gain_registers() {
                bus.write_register(reg, gain as u8)?;
            }
            Ok(())
        })?;

        info!("configured: {clock:?}, gain {}x", gain.multiplier());
        Ok(())
    }

    /// Pulse the reset line and wait for the chip to come back. Data-ready is disarmed
    /// until the next [`start`](Self::start).
    pub fn reset(&mut self) -> Result<(), Error<SPI::Error>> {
        let timing = self.config.reset;

        info!("resetting");

        self.disarm()?;
        self.sampling = false;

        self.reset.set_low().map_err(Error::pin)?;
        self.delay.delay_us(timing.pulse_us);
        self.reset.set_high().map_err(Error::pin)?;
        self.delay.delay_us(timing.settle_us);

        self.bus.mark_reset();

        if timing.drdy_handshake {
            let mut budget = timing.handshake_timeout_us;
            self.wait_for_drdy(false, &mut budget)?;
            self.wait_for_drdy(true, &mut budget)?;
            self.wait_for_drdy(false, &mut budget)?;
            self.delay.delay_us(timing.handshake_settle_us);
        }

        Ok(())
    }

    fn wait_for_drdy(&mut self, high: bool, budget_us: &mut u32) -> Result<(), Error<SPI::Error>> {
        while self.drdy.is_high().map_err(Error::pin)? != high {
            if *budget_us == 0 {
                return Err(Error::DataReadyTimeout {
                    timeout_us: self.config.reset.handshake_timeout_us,
                });
            }
            let step = DRDY_POLL_US.min(*budget_us);
            self.delay.delay_us(step);
            *budget_us -= step;
        }
        Ok(())
    }

    /// Check the chip reports its post-reset status, retrying once after a delay.
    pub fn identify(&mut self) -> Result<u16, Error<SPI::Error>> {
        let mut status = self.bus.command(Command::Null)?;

        if status != STATUS_RESET {
            warn!("unexpected status 0x{status:04X} after reset, retrying");
            self.delay.delay_us(self.config.identify_retry_us);
            status = self.bus.command(Command::Null)?;
        }

        if status != STATUS_RESET {
            return Err(Error::IdentificationFailure {
                expected: STATUS_RESET,
                observed: status,
            });
        }

        info!("chip ready, status 0x{status:04X}");
        Ok(status)
    }

    /// Read the `ID_MSB` register.
    pub fn chip_id(&mut self) -> Result<u8, Error<SPI::Error>> {
        self.bus.read_register(Register::IdMsb)
    }

    pub fn read_register(&mut self, reg: Register) -> Result<u8, Error<SPI::Error>> {
        self.bus.read_register(reg)
    }

    /// Write a register, inside a lock bracket if it is protected.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), Error<SPI::Error>> {
        if reg.is_protected() {
            self.bus.unlocked(|bus| bus.write_register(reg, value))
        } else {
            self.bus.write_register(reg, value)
        }
    }

    /// Send a system command and return the chip's status reply.
    pub fn send_command(&mut self, command: Command) -> Result<u16, Error<SPI::Error>> {
        self.bus.command(command)
    }

    /// Program both clock registers in one lock bracket.
    pub fn set_frequency(&mut self, clock: ClockConfig) -> Result<(), Error<SPI::Error>> {
        self.bus.unlocked(|bus| {
            bus.write_register(Register::Clk1, clock.clk1())?;
            bus.write_register(Register::Clk2, clock.clk2())
        })?;

        self.config.clock = clock;
        debug!("clock set to {clock:?}");
        Ok(())
    }

    /// Program the dividers from raw codes. Out-of-range codes are rejected before
    /// anything is sent.
    pub fn set_clock_dividers(
        &mut self,
        clkin_div: u8,
        iclk_div: u8,
        osr_code: u8,
    ) -> Result<(), Error<SPI::Error>> {
        let clock = ClockConfig::new(clkin_div, iclk_div, osr_code)?;
        self.set_frequency(clock)
    }

    /// Program the profile for `rate` under a `reference_hz` clock.
    pub fn set_sample_rate(&mut self, reference_hz: u32, rate: SampleRate) -> Result<(), Error<SPI::Error>> {
        let clock = ClockConfig::for_rate(reference_hz, rate)?;
        self.set_frequency(clock)
    }

    /// Set the gain of one channel or all four, in a single lock bracket.
    pub fn set_gain(&mut self, channel: Channel, gain: Gain) -> Result<(), Error<SPI::Error>> {
        self.bus.unlocked(|bus| {
            for &reg in channel.gain_registers() {
                bus.write_register(reg, gain as u8)?;
            }
            Ok(())
        })?;

        debug!("{channel:?} gain set to {}x", gain.multiplier());
        Ok(())
    }

    /// Enable the configured channels, wake the chip and arm data-ready if a handler
    /// is attached.
    pub fn start(&mut self) -> Result<(), Error<SPI::Error>> {
        let mask = self.config.channel_mask & 0x0F;

        self.bus.unlocked(|bus| {
            bus.write_register(Register::AdcEna, mask)?;
            bus.command(Command::Wakeup)?;
            Ok(())
        })?;

        self.sampling = true;
        info!("sampling started, channel mask 0x{mask:02X}");

        if self.handler_attached {
            self.arm()?;
        }

        Ok(())
    }

    /// Disable all channels, put the chip in standby and disarm data-ready.
    pub fn stop(&mut self) -> Result<(), Error<SPI::Error>> {
        self.bus.unlocked(|bus| {
            bus.write_register(Register::AdcEna, 0x00)?;
            bus.command(Command::Standby)?;
            Ok(())
        })?;

        self.sampling = false;
        info!("sampling stopped");

        self.disarm()
    }

    /// Clock out one conversion frame.
    pub fn read_sample(&mut self) -> Result<SampleFrame, Error<SPI::Error>> {
        self.bus.read_frame()
    }

    /// Whether the data-ready line is asserted (low).
    pub fn data_ready(&mut self) -> Result<bool, Error<SPI::Error>> {
        self.drdy.is_low().map_err(Error::pin)
    }

    /// Attach `handler` to the falling edge of data-ready, or remove the current
    /// handler and disarm with `None`.
    ///
    /// The handler runs in interrupt context. It should hand the event to the owner of
    /// the driver rather than start or stop sampling itself.
    pub fn on_data_ready<F>(&mut self, handler: Option<F>) -> Result<(), Error<SPI::Error>>
    where
        F: FnMut() + Send + 'static,
    {
        self.disarm()?;

        match handler {
            Some(handler) => {
                self.drdy.attach(handler).map_err(Error::pin)?;
                self.handler_attached = true;
                if self.sampling {
                    self.arm()?;
                }
            }
            None => {
                if self.handler_attached {
                    self.drdy.detach().map_err(Error::pin)?;
                    self.handler_attached = false;
                }
            }
        }

        Ok(())
    }

    fn arm(&mut self) -> Result<(), Error<SPI::Error>> {
        if !self.armed {
            self.drdy.enable_interrupt().map_err(Error::pin)?;
            self.armed = true;
            debug!("data ready armed");
        }
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), Error<SPI::Error>> {
        if self.armed {
            self.drdy.disable_interrupt().map_err(Error::pin)?;
            self.armed = false;
            debug!("data ready disarmed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::clock::Unsupported;
    use crate::config::ResetTiming;
    use crate::error::Step;
    use crate::frame::WordWidth;
    use crate::sim::{SimChip, SimDataReady, SimDelay, SimResetPin, SimSpi};

    const NULL: u16 = 0x0000;
    const WAKEUP: u16 = 0x0033;
    const STANDBY: u16 = 0x0022;
    const LOCK: u16 = 0x0555;
    const UNLOCK: u16 = 0x0655;

    type Driver = Ads131a04<SimSpi, SimResetPin, SimDataReady, SimDelay>;

    fn driver(chip: &SimChip, config: Config) -> Driver {
        Ads131a04::new(chip.spi(), chip.reset_pin(), chip.data_ready(), chip.delay(), config)
    }

    #[test]
    fn reset_identify_start_read() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());

        adc.reset().unwrap();
        assert_eq!(chip.resets(), 1);
        assert_eq!(adc.identify(), Ok(0xFF04));

        chip.clear_transfers();
        adc.start().unwrap();

        assert_eq!(
            chip.commands(),
            [UNLOCK, NULL, 0x4F0F, NULL, WAKEUP, NULL, LOCK, NULL]
        );
        assert_eq!(chip.register(Register::AdcEna), 0x0F);
        assert!(chip.is_awake());
        assert!(chip.is_locked());
        assert!(adc.is_sampling());

        chip.set_samples([1, 0, -1, 8_388_607]);
        let frame = adc.read_sample().unwrap();
        assert_eq!(frame.channel1, 1);
        assert_eq!(frame.channels(), [1, 0, -1, 8_388_607]);
        assert_eq!(chip.transfers().last().map(Vec::len), Some(20));
    }

    #[test]
    fn init_programs_clock_and_gain_in_one_bracket() {
        let chip = SimChip::new(WordWidth::Narrow);
        let config = Config::default().with_word_width(WordWidth::Narrow).with_gain(Gain::X4);
        let mut adc = driver(&chip, config);

        adc.init().unwrap();

        assert_eq!(chip.register(Register::Clk1), 0x02);
        assert_eq!(chip.register(Register::Clk2), 0x25);
        for reg in [Register::Adc1, Register::Adc2, Register::Adc3, Register::Adc4] {
            assert_eq!(chip.register(reg), 0x02);
        }

        let commands = chip.commands();
        assert_eq!(commands.iter().filter(|&&word| word == UNLOCK).count(), 1);
        assert_eq!(commands.iter().filter(|&&word| word == LOCK).count(), 1);
        assert_eq!(adc.protection(), ProtectionState::Locked);
        assert!(chip.slept_us() >= 6_000);
    }

    #[test]
    fn identification_retries_once() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());

        adc.reset().unwrap();
        chip.set_unlock_status(0x0655);
        adc.send_command(Command::Unlock).unwrap();

        chip.clear_transfers();
        let before = chip.slept_us();
        let err = adc.identify().unwrap_err();

        assert_eq!(
            err,
            Error::IdentificationFailure { expected: 0xFF04, observed: 0x2200 }
        );
        assert_eq!(chip.commands(), [NULL, NULL, NULL, NULL]);
        assert_eq!(chip.slept_us() - before, 1_000_000);
    }

    #[test]
    fn drdy_handshake_waits_for_cycle() {
        let chip = SimChip::new(WordWidth::Wide);
        let timing = ResetTiming {
            drdy_handshake: true,
            ..ResetTiming::default()
        };
        let mut adc = driver(&chip, Config::default().with_reset_timing(timing));

        adc.reset().unwrap();

        // pulse + settle + one poll + handshake settle
        assert_eq!(chip.slept_us(), 1_000 + 5_000 + 10 + 1_000);
    }

    #[test]
    fn unlock_failure_blocks_start() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();

        chip.set_unlock_status(0xFF04);
        chip.clear_transfers();

        let err = adc.start().unwrap_err();
        assert_eq!(
            err,
            Error::ProtocolMismatch { step: Step::Unlock, expected: 0x0655, observed: 0xFF04 }
        );
        assert_eq!(chip.commands(), [UNLOCK, NULL, LOCK, NULL]);
        assert!(!chip.is_awake());
        assert!(!adc.is_sampling());
    }

    #[test]
    fn clock_validation_happens_before_bus_activity() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());

        assert_eq!(
            adc.set_clock_dividers(0, 1, 0),
            Err(Error::UnsupportedConfiguration(Unsupported::ClockDivider(0)))
        );
        assert_eq!(
            adc.set_clock_dividers(8, 1, 0),
            Err(Error::UnsupportedConfiguration(Unsupported::ClockDivider(8)))
        );
        assert_eq!(
            adc.set_clock_dividers(1, 1, 16),
            Err(Error::UnsupportedConfiguration(Unsupported::Oversampling(16)))
        );
        assert_eq!(
            adc.set_sample_rate(16_384_000, SampleRate::Sps2500),
            Err(Error::UnsupportedConfiguration(Unsupported::SampleRate {
                reference_hz: 16_384_000,
                rate: SampleRate::Sps2500,
            }))
        );
        assert!(chip.transfers().is_empty());
    }

    #[test]
    fn sample_rate_profile_is_written() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();

        adc.set_sample_rate(16_384_000, SampleRate::Sps250).unwrap();

        assert_eq!(chip.register(Register::Clk1), 0x04);
        assert_eq!(chip.register(Register::Clk2), 0x40);
        assert_eq!(adc.config().clock, ClockConfig::new(2, 2, 0).unwrap());
    }

    #[test]
    fn gain_for_all_channels_uses_one_bracket() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();
        chip.clear_transfers();

        adc.set_gain(Channel::All, Gain::X16).unwrap();

        assert_eq!(
            chip.commands(),
            [UNLOCK, NULL, 0x5104, NULL, 0x5204, NULL, 0x5304, NULL, 0x5404, NULL, LOCK, NULL]
        );

        chip.clear_transfers();
        adc.set_gain(Channel::Ch2, Gain::X1).unwrap();
        assert_eq!(chip.commands(), [UNLOCK, NULL, 0x5200, NULL, LOCK, NULL]);
        assert_eq!(chip.register(Register::Adc1), 0x04);
        assert_eq!(chip.register(Register::Adc2), 0x00);
    }

    #[test]
    fn failed_gain_write_still_relocks() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();
        chip.fail_write(Register::Adc3);

        assert!(matches!(adc.set_gain(Channel::All, Gain::X8), Err(Error::Transport(_))));
        assert!(chip.is_locked());
        assert_eq!(adc.protection(), ProtectionState::Locked);
    }

    #[test]
    fn stop_clears_mask_and_enters_standby() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();
        adc.start().unwrap();
        chip.clear_transfers();

        adc.stop().unwrap();

        assert_eq!(
            chip.commands(),
            [UNLOCK, NULL, 0x4F00, NULL, STANDBY, NULL, LOCK, NULL]
        );
        assert_eq!(chip.register(Register::AdcEna), 0x00);
        assert!(!chip.is_awake());
        assert!(!adc.is_sampling());
    }

    #[test]
    fn data_ready_handler_follows_sampling() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default().with_channel_mask(0x05));
        adc.init().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        adc.on_data_ready(Some(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        assert!(chip.handler_attached());
        assert!(!chip.interrupt_enabled());
        assert!(!chip.fire_data_ready());

        adc.start().unwrap();
        assert_eq!(chip.register(Register::AdcEna), 0x05);
        assert!(chip.interrupt_enabled());
        assert!(chip.fire_data_ready());
        assert!(chip.fire_data_ready());

        adc.stop().unwrap();
        assert!(!chip.interrupt_enabled());
        assert!(!chip.fire_data_ready());

        adc.start().unwrap();
        adc.on_data_ready(None::<fn()>).unwrap();
        assert!(!chip.interrupt_enabled());
        assert!(!chip.handler_attached());
        assert!(!chip.fire_data_ready());

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reinit_disarms_data_ready_until_start() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        adc.on_data_ready(Some(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        adc.start().unwrap();
        assert!(chip.interrupt_enabled());

        adc.init().unwrap();
        assert!(!adc.is_sampling());
        assert!(!chip.interrupt_enabled());
        assert!(chip.handler_attached());
        assert!(!chip.fire_data_ready());

        adc.start().unwrap();
        assert!(chip.fire_data_ready());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stuck_drdy_times_out_after_budget() {
        let chip = SimChip::new(WordWidth::Wide);
        chip.stick_data_ready(true);
        let timing = ResetTiming {
            drdy_handshake: true,
            handshake_timeout_us: 95,
            ..ResetTiming::default()
        };
        let mut adc = driver(&chip, Config::default().with_reset_timing(timing));

        assert_eq!(adc.reset(), Err(Error::DataReadyTimeout { timeout_us: 95 }));
        assert_eq!(chip.slept_us(), 1_000 + 5_000 + 95);
        assert!(chip.transfers().is_empty());
    }

    #[test]
    fn start_ignores_reserved_mask_bits() {
        let chip = SimChip::new(WordWidth::Wide);
        let config = Config {
            channel_mask: 0xFF,
            ..Config::default()
        };
        let mut adc = driver(&chip, config);
        adc.init().unwrap();
        chip.clear_transfers();

        adc.start().unwrap();

        assert_eq!(chip.commands()[2], 0x4F0F);
        assert_eq!(chip.register(Register::AdcEna), 0x0F);
    }

    #[test]
    fn protected_register_writes_are_bracketed() {
        let chip = SimChip::new(WordWidth::Wide);
        let mut adc = driver(&chip, Config::default());
        adc.init().unwrap();
        chip.clear_transfers();

        adc.write_register(Register::DSysCfg, 0x3E).unwrap();
        assert_eq!(chip.commands(), [UNLOCK, NULL, 0x4C3E, NULL, LOCK, NULL]);
        assert_eq!(adc.read_register(Register::DSysCfg), Ok(0x3E));
        assert_eq!(adc.chip_id(), Ok(0x04));
    }

    #[test]
    fn release_returns_parts() {
        let chip = SimChip::new(WordWidth::Wide);
        let adc = driver(&chip, Config::default());
        let (mut spi, _reset, _drdy, _delay) = adc.release();

        let mut slot = [0u8; 4];
        spi.transfer_in_place(&mut slot).unwrap();
        assert_eq!(slot[..2], [0xFF, 0x04]);
    }
}
