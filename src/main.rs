//! Drive the ADS131A04 driver against a simulated chip, no hardware required.
//!
//! Run with `RUST_LOG=debug` to see every command and register access.

use std::f64::consts::TAU;
use std::sync::mpsc;
use std::time::Duration;

use ads131a04::sim::SimChip;
use ads131a04::{Ads131a04, Channel, Config, Gain, SampleRate, WordWidth};
use log::info;

const REFERENCE_HZ: u32 = 16_384_000;
const RATE: SampleRate = SampleRate::Sps1000;
const FRAMES: u32 = 32;

/// Test tone per channel, in Hz.
const TONES: [f64; 4] = [10.0, 50.0, 60.0, 125.0];

/// Full scale of a signed 24-bit sample.
const FULL_SCALE: f64 = 8_388_607.0;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let chip = SimChip::new(WordWidth::Wide);

    let config = Config::default()
        .with_word_width(chip.width())
        .with_sample_rate(REFERENCE_HZ, RATE)?;

    let mut adc = Ads131a04::new(
        chip.spi(),
        chip.reset_pin(),
        chip.data_ready(),
        chip.delay(),
        config,
    );

    adc.init()?;
    adc.set_gain(Channel::Ch4, Gain::X8)?;

    info!("chip id 0x{:02X}", adc.chip_id()?);

    let (tx, rx) = mpsc::channel();

    adc.on_data_ready(Some(move || {
        let _ = tx.send(());
    }))?;

    adc.start()?;

    let period = Duration::from_secs_f64(1.0 / f64::from(RATE.hz()));

    for n in 0..FRAMES {
        let t = f64::from(n) * period.as_secs_f64();
        chip.set_samples(TONES.map(|hz| (0.5 * FULL_SCALE * (TAU * hz * t).sin()) as i32));

        std::thread::sleep(period);
        chip.fire_data_ready();

        rx.recv_timeout(period * 10)?;

        let frame = adc.read_sample()?;

        println!(
            "{n:>3} status 0x{:04X} | {:>9} {:>9} {:>9} {:>9}",
            frame.status, frame.channel1, frame.channel2, frame.channel3, frame.channel4
        );
    }

    adc.stop()?;
    adc.on_data_ready(None::<fn()>)?;

    info!("read {FRAMES} frames at {} Hz", RATE.hz());

    Ok(())
}
