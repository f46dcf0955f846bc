mod annunciator;
mod command;
mod config;
mod controller;
mod keyscan;
mod render;
mod server;
mod state;

use crate::annunciator::GpioAnnunciator;
use crate::command::{ChannelSink, Command, CommandSink, Dispatcher};
use crate::config::Timings;
use crate::controller::{Controller, Intent};
use crate::keyscan::Interrupt;
use alarmpad_gpio::gpiod::GpiodChip;
use alarmpad_gpio::keypad::{LAYOUT_4X4, MatrixKeypad};
use alarmpad_gpio::{GpioActiveLevel, GpioBias, GpioDriveMode};
use dotenv::dotenv;
use eyre::{WrapErr, eyre};
use log::{error, info};
use std::env::var;
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    let endpoint = required("ALARMPAD_ENDPOINT")?;
    let token = required("ALARMPAD_TOKEN")?;
    let http_addr = env_or("ALARMPAD_HTTP_ADDR", "0.0.0.0:8080");
    let chip_path = env_or("ALARMPAD_GPIO_CHIP", "/dev/gpiochip0");

    // red, amber, green, blue
    let led_pins: [u32; 4] = pin_bus("ALARMPAD_LED_PINS", "17,27,22,10")?;
    let buzzer_pin: u32 = env_or("ALARMPAD_BUZZER_PIN", "9")
        .parse()
        .wrap_err("ALARMPAD_BUZZER_PIN must be a pin number")?;
    let col_pins: [u32; 4] = pin_bus("ALARMPAD_KEYPAD_COLS", "5,6,13,19")?;
    let row_pins: [u32; 4] = pin_bus("ALARMPAD_KEYPAD_ROWS", "26,16,20,21")?;

    let timings = Timings::try_load().unwrap_or_default();
    // Write the effective values back so there is always a file to tweak.
    timings.save()?;

    let chip = GpiodChip::open(&chip_path)?;
    info!("Opened {chip:?} with {} lines", chip.num_lines());

    let [red, amber, green, blue] = led_pins;
    let annunciator = GpioAnnunciator::new(
        Box::new(chip.output_pin(red, GpioActiveLevel::Low)?),
        Box::new(chip.output_pin(amber, GpioActiveLevel::Low)?),
        Box::new(chip.output_pin(green, GpioActiveLevel::Low)?),
        Box::new(chip.output_pin(blue, GpioActiveLevel::Low)?),
        Box::new(chip.output_pin(buzzer_pin, GpioActiveLevel::High)?),
    );

    let cols = chip.output_bus(col_pins, GpioActiveLevel::Low, GpioDriveMode::OpenDrain)?;
    let rows = chip.input_bus(row_pins, GpioActiveLevel::Low, GpioBias::PullUp)?;
    let keypad = MatrixKeypad::new(LAYOUT_4X4, Box::new(cols), Box::new(rows));

    let (command_tx, command_rx) = std::sync::mpsc::channel();
    let dispatcher = Dispatcher::new(endpoint, token)?;
    thread::spawn(move || dispatcher.run(command_rx));

    let sink = ChannelSink(command_tx);
    // Ask the alarm server to announce its current state.
    sink.submit(Command::new("initialise", ""));

    let interrupt = Interrupt::new();
    let (intent_tx, mut intent_rx) = tokio::sync::mpsc::unbounded_channel();

    {
        let tx = intent_tx.clone();
        let interrupt = interrupt.clone();
        thread::spawn(move || keyscan::scan_loop(&keypad, &tx, &interrupt));
    }

    {
        let tx = intent_tx.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(1));
                let second = OffsetDateTime::now_local()
                    .unwrap_or_else(|_| OffsetDateTime::now_utc())
                    .second();
                if tx.send(Intent::Tick { second }).is_err() {
                    return;
                }
            }
        });
    }

    {
        let tx = intent_tx.clone();
        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start notification runtime: {e}");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(server::serve(&http_addr, tx)) {
                error!("Notification server failed: {e}");
            }
        });
    }
    drop(intent_tx);

    let mut controller = Controller::new(timings, Box::new(annunciator), Box::new(sink), interrupt);
    info!("Keypad controller running");
    while let Some(intent) = intent_rx.blocking_recv() {
        controller.handle(Instant::now(), intent);
    }

    Ok(())
}

fn required(name: &str) -> eyre::Result<String> {
    var(name).wrap_err_with(|| format!("{name} must be set"))
}

fn env_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|_| default.to_string())
}

/// Parses a comma-separated pin list, e.g. `ALARMPAD_LED_PINS=17,27,22,10`.
fn pin_bus<const N: usize>(name: &str, default: &str) -> eyre::Result<[u32; N]> {
    let raw = env_or(name, default);
    let pins = raw
        .split(',')
        .map(|pin| {
            pin.trim()
                .parse::<u32>()
                .wrap_err_with(|| format!("bad pin number in {name}: {pin:?}"))
        })
        .collect::<eyre::Result<Vec<u32>>>()?;
    pins.try_into()
        .map_err(|pins: Vec<u32>| eyre!("{name} must list {N} pins, got {}", pins.len()))
}
