//! Full daemon against the simulated sensor - 5 second demo
//!
//! Test sequence:
//! 1. Bring up the simulated LSM6DSO and calibrate
//! 2. Publish telemetry at 4 Hz
//! 3. Speed up to 10 Hz with `setSensorPollTime`
//! 4. Stop with `haltApplication`
//!
//! ```sh
//! RUST_LOG=info cargo run --example sim_demo
//! ```

use kampan_io::KampanApp;
use kampan_io::config::{AppConfig, BusKind};
use kampan_io::reactor::ShutdownFlag;
use kampan_io::streaming::wire::{FrameReader, write_frame};
use serde_json::{Value, json};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

fn send(stream: &mut TcpStream, command: Value) -> Result<Value, Box<dyn std::error::Error>> {
    write_frame(stream, &serde_json::to_vec(&command)?)?;
    let mut frames = FrameReader::new(64 * 1024);
    loop {
        if let Some(reply) = frames.read_frame(stream)? {
            return Ok(serde_json::from_slice(reply)?);
        }
    }
}

fn drive(address: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(address)?;
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;

    thread::sleep(Duration::from_secs(2));
    log::info!("2. Switching to 10 Hz...");
    let reply = send(
        &mut stream,
        json!({"method": "setSensorPollTime", "payload": {"pollTime": 100_000_000}}),
    )?;
    log::info!("   ✓ {}", reply);

    thread::sleep(Duration::from_secs(3));
    log::info!("3. Halting...");
    let reply = send(&mut stream, json!({"method": "haltApplication"}))?;
    log::info!("   ✓ {}", reply);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("=== KampanIO Simulator Demo (5s) ===");

    let mut config = AppConfig::default();
    config.bus.kind = BusKind::Sim;
    config.simulation.seed = 7;
    config.acquisition.poll_period_ns = 250_000_000;
    config.commands.bind_address = "127.0.0.1:0".to_string();

    log::info!("1. Initializing simulated sensor...");
    let mut app = KampanApp::new(&config, ShutdownFlag::new())?;
    let address = app
        .command_address()
        .ok_or("command server not running")?;
    log::info!("   ✓ Calibrated, commands on {}", address);

    let client = thread::spawn(move || {
        if let Err(e) = drive(address) {
            log::error!("Command client failed: {}", e);
        }
    });

    app.run()?;
    let _ = client.join();

    log::info!("=== Demo complete ===");
    Ok(())
}
