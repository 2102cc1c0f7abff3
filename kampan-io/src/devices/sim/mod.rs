//! Register-level LSM6DSO simulator
//!
//! Implements `embedded_hal::i2c::I2c`, so the real driver runs against it
//! unchanged. Used for hardware-free runs (`bus.kind = "sim"`) and by tests.
//!
//! # Behaviour
//!
//! | Register | Simulation |
//! |----------|------------|
//! | WHO_AM_I | 0x6C, overridable |
//! | CTRL3_C.SW_RESET | clears after `reset_polls` reads, or never when stuck |
//! | STATUS_REG | XLDA/GDA per group, optional random dropout |
//! | OUTX_L_A / OUTX_L_G | scripted samples first, then bias + Gaussian noise |
//! | everything else | plain read/write register file |
//!
//! Output samples are generated in physical units and quantised with the
//! full-scale range currently programmed in CTRL1_XL / CTRL2_G.
//!
//! # Fault injection
//!
//! [`SimulatedLsm6dso::fail_reads`] makes reads starting at a register fail
//! with a bus error, either a fixed number of times or indefinitely.
//!
//! Handles are cheap clones sharing one device state, so a test can keep a
//! handle while the driver owns another.

mod config;
mod noise;

pub use config::SimulationConfig;
pub use noise::NoiseGenerator;

use super::lsm6dso::registers::*;
use super::lsm6dso::DEFAULT_ADDRESS;
use crate::core::types::{AxisGroup, RawSample};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const REGISTER_COUNT: usize = 0x80;

/// SW_RESET reads before the bit clears, unless configured otherwise
const DEFAULT_RESET_POLLS: u32 = 2;

/// Simulated LSM6DSO on a simulated bus
#[derive(Clone)]
pub struct SimulatedLsm6dso {
    state: Arc<Mutex<SimState>>,
}

struct ReadFault {
    register: u8,
    /// Remaining failures; `None` fails forever
    remaining: Option<u32>,
}

struct SimState {
    address: u8,
    device_id: u8,
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    reset_polls: u32,
    reset_pending: Option<u32>,
    stuck_reset: bool,
    /// [acceleration, angular rate]
    ready: [bool; 2],
    scripted: [VecDeque<RawSample>; 2],
    faults: Vec<ReadFault>,
    config: SimulationConfig,
    noise: NoiseGenerator,
    transactions: u64,
}

fn slot(group: AxisGroup) -> usize {
    match group {
        AxisGroup::Acceleration => 0,
        AxisGroup::AngularRate => 1,
    }
}

impl SimulatedLsm6dso {
    /// Noise-free device at the default address, reading zero on every axis
    pub fn new() -> Self {
        Self::from_config(&SimulationConfig::quiet(), DEFAULT_ADDRESS)
    }

    /// Device answering at `address` with the configured signal and noise
    pub fn from_config(config: &SimulationConfig, address: u8) -> Self {
        let mut state = SimState {
            address,
            device_id: DEVICE_ID,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
            reset_polls: DEFAULT_RESET_POLLS,
            reset_pending: None,
            stuck_reset: false,
            ready: [true, true],
            scripted: [VecDeque::new(), VecDeque::new()],
            faults: Vec::new(),
            config: config.clone(),
            noise: NoiseGenerator::new(config.seed),
            transactions: 0,
        };
        state.power_on();

        log::debug!(
            "Simulated LSM6DSO at {:#04x} (seed {}, gyro bias {:?} dps)",
            address,
            config.seed,
            config.gyro_bias_dps
        );

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Override the WHO_AM_I value
    pub fn set_device_id(&self, id: u8) {
        let mut state = self.state.lock();
        state.device_id = id;
        state.registers[WHO_AM_I as usize] = id;
    }

    /// Keep SW_RESET set forever
    pub fn set_stuck_reset(&self, stuck: bool) {
        self.state.lock().stuck_reset = stuck;
    }

    /// Number of CTRL3_C reads that still report SW_RESET after a reset
    pub fn set_reset_polls(&self, polls: u32) {
        self.state.lock().reset_polls = polls;
    }

    /// Force the data-ready flag of one group on or off
    pub fn set_data_ready(&self, group: AxisGroup, ready: bool) {
        self.state.lock().ready[slot(group)] = ready;
    }

    /// Queue samples returned before the synthetic generator takes over
    pub fn push_samples(&self, group: AxisGroup, samples: impl IntoIterator<Item = RawSample>) {
        self.state.lock().scripted[slot(group)].extend(samples);
    }

    /// Scripted samples not yet read
    pub fn pending_samples(&self, group: AxisGroup) -> usize {
        self.state.lock().scripted[slot(group)].len()
    }

    /// Fail reads starting at `register`; `count` of `None` fails forever
    pub fn fail_reads(&self, register: u8, count: Option<u32>) {
        self.state.lock().faults.push(ReadFault {
            register,
            remaining: count,
        });
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Current register value, as the device holds it
    pub fn register(&self, register: u8) -> u8 {
        self.state.lock().registers[register as usize % REGISTER_COUNT]
    }

    /// Set a register directly, bypassing the bus
    pub fn set_register(&self, register: u8, value: u8) {
        self.state.lock().registers[register as usize % REGISTER_COUNT] = value;
    }

    /// Bus transactions addressed to this device so far
    pub fn transaction_count(&self) -> u64 {
        self.state.lock().transactions
    }
}

impl Default for SimulatedLsm6dso {
    fn default() -> Self {
        Self::new()
    }
}

impl SimState {
    fn power_on(&mut self) {
        self.registers = [0; REGISTER_COUNT];
        self.registers[WHO_AM_I as usize] = self.device_id;
        self.registers[CTRL3_C as usize] = CTRL3_C_IF_INC;
        self.pointer = 0;
    }

    fn write(&mut self, data: &[u8]) {
        let Some((&register, payload)) = data.split_first() else {
            return;
        };
        self.pointer = register;

        for &value in payload {
            self.write_byte(self.pointer, value);
            self.advance();
        }
    }

    fn write_byte(&mut self, register: u8, value: u8) {
        match register {
            WHO_AM_I | STATUS_REG => {
                log::trace!("sim: ignoring write to read-only {:#04x}", register)
            }
            CTRL3_C if value & CTRL3_C_SW_RESET != 0 => {
                self.registers[CTRL3_C as usize] = value;
                if self.reset_polls == 0 && !self.stuck_reset {
                    self.power_on();
                } else {
                    self.reset_pending = Some(self.reset_polls);
                }
            }
            _ => self.registers[register as usize % REGISTER_COUNT] = value,
        }
    }

    fn read(&mut self, buffer: &mut [u8]) -> std::result::Result<(), ErrorKind> {
        let start = self.pointer;
        if let Some(fault) = self
            .faults
            .iter_mut()
            .find(|f| f.register == start && f.remaining != Some(0))
        {
            if let Some(n) = fault.remaining.as_mut() {
                *n -= 1;
            }
            log::trace!("sim: injected read fault at {:#04x}", start);
            return Err(ErrorKind::Other);
        }

        match start {
            OUTX_L_A => self.latch(AxisGroup::Acceleration),
            OUTX_L_G => self.latch(AxisGroup::AngularRate),
            _ => {}
        }

        for byte in buffer.iter_mut() {
            *byte = self.read_byte(self.pointer);
            self.advance();
        }
        Ok(())
    }

    fn read_byte(&mut self, register: u8) -> u8 {
        match register {
            CTRL3_C => self.read_ctrl3_c(),
            STATUS_REG => self.status(),
            _ => self.registers[register as usize % REGISTER_COUNT],
        }
    }

    fn read_ctrl3_c(&mut self) -> u8 {
        if self.stuck_reset {
            return self.registers[CTRL3_C as usize] | CTRL3_C_SW_RESET;
        }
        match self.reset_pending {
            Some(0) => {
                self.reset_pending = None;
                self.power_on();
                self.registers[CTRL3_C as usize]
            }
            Some(n) => {
                self.reset_pending = Some(n - 1);
                self.registers[CTRL3_C as usize] | CTRL3_C_SW_RESET
            }
            None => self.registers[CTRL3_C as usize],
        }
    }

    fn status(&mut self) -> u8 {
        let dropout = self.config.data_ready_dropout;
        let mut status = 0;
        if self.ready[0] && !self.noise.chance(dropout) {
            status |= STATUS_XLDA;
        }
        if self.ready[1] && !self.noise.chance(dropout) {
            status |= STATUS_GDA;
        }
        status
    }

    /// Load the next sample into the output registers
    fn latch(&mut self, group: AxisGroup) {
        let sample = match self.scripted[slot(group)].pop_front() {
            Some(sample) => sample,
            None => self.synthesize(group),
        };
        let base = match group {
            AxisGroup::Acceleration => OUTX_L_A,
            AxisGroup::AngularRate => OUTX_L_G,
        };
        let base = base as usize;
        self.registers[base..base + RawSample::BYTES].copy_from_slice(&sample.to_le_bytes());
    }

    fn synthesize(&mut self, group: AxisGroup) -> RawSample {
        let mut axes = [0i16; 3];
        match group {
            AxisGroup::Acceleration => {
                let lsb = accel_fs_from_bits(self.registers[CTRL1_XL as usize]).mg_per_lsb();
                let noise = self.config.accel_noise_mg;
                for (axis, mg) in axes.iter_mut().zip(self.config.accel_mg) {
                    *axis = quantize(self.noise.biased_gaussian(mg, noise) / lsb);
                }
            }
            AxisGroup::AngularRate => {
                let lsb = gyro_fs_from_bits(self.registers[CTRL2_G as usize]).mdps_per_lsb();
                let noise = self.config.gyro_noise_dps * 1000.0;
                for (axis, dps) in axes.iter_mut().zip(self.config.gyro_bias_dps) {
                    *axis = quantize(self.noise.biased_gaussian(dps * 1000.0, noise) / lsb);
                }
            }
        }
        RawSample(axes)
    }

    /// IF_INC auto-increment
    fn advance(&mut self) {
        if self.registers[CTRL3_C as usize] & CTRL3_C_IF_INC != 0 {
            self.pointer = self.pointer.wrapping_add(1) % REGISTER_COUNT as u8;
        }
    }
}

fn quantize(counts: f32) -> i16 {
    counts.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl ErrorType for SimulatedLsm6dso {
    type Error = ErrorKind;
}

impl I2c for SimulatedLsm6dso {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> std::result::Result<(), Self::Error> {
        let mut state = self.state.lock();
        if address != state.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        state.transactions += 1;

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(data) => state.write(data),
                Operation::Read(buffer) => state.read(buffer)?,
            }
        }
        Ok(())
    }
}
