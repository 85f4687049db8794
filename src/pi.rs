//! Stream conversion frames from an ADS131A04 wired to a Raspberry Pi.

mod raspberry_pi;

use std::cell::RefCell;
use std::sync::mpsc;
use std::time::Duration;

use ads131a04::{Ads131a04, Config, SampleRate, WordWidth};
use embedded_hal_bus::spi::RefCellDevice;
use log::{info, warn};
use rppal::gpio::Gpio;
use rppal::hal::Delay;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use raspberry_pi::DataReadyPin;

/// Crystal on the ADS131A04 board.
const REFERENCE_HZ: u32 = 16_384_000;

const CS_PIN: u8 = 24;
const RESET_PIN: u8 = 23;
const DRDY_PIN: u8 = 25;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let gpio = Gpio::new()?;

    // The ADS131A04 samples on the falling edge: mode 1.
    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_000_000, Mode::Mode1)?;

    let spi = RefCell::new(spi);

    let device = RefCellDevice::new_no_delay(&spi, gpio.get(CS_PIN)?.into_output_high());

    let config = Config::default()
        .with_word_width(WordWidth::Wide)
        .with_sample_rate(REFERENCE_HZ, SampleRate::Sps1000)?;

    let mut adc = Ads131a04::new(
        device,
        gpio.get(RESET_PIN)?.into_output_high(),
        DataReadyPin::new(gpio.get(DRDY_PIN)?.into_input_pullup()),
        Delay::new(),
        config,
    );

    adc.init()?;

    info!("chip id 0x{:02X}", adc.chip_id()?);

    let (tx, rx) = mpsc::channel();

    adc.on_data_ready(Some(move || {
        let _ = tx.send(());
    }))?;

    adc.start()?;

    loop {
        if rx.recv_timeout(Duration::from_millis(100)).is_err() {
            warn!("no data ready edge within 100 ms");
            continue;
        }

        let frame = adc.read_sample()?;

        println!(
            "status 0x{:04X} | {:>9} {:>9} {:>9} {:>9}",
            frame.status, frame.channel1, frame.channel2, frame.channel3, frame.channel4
        );
    }
}
