//! Error types for KampanIO
//!
//! Errors fall into two groups:
//!
//! - **Fatal**: initialization failures (bus open, device identity, reset,
//!   calibration, config) and scheduling failures. These abort startup or
//!   request an orderly shutdown.
//! - **Recoverable**: bus I/O during an acquisition cycle (the affected axis
//!   group is omitted for that cycle) and remote-command validation (answered
//!   with a 400 response).

use std::fmt;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a register transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusPhase {
    /// Register write (`[reg, data...]` in one transaction)
    Write,
    /// Register pointer select (single-byte write before a read)
    Select,
    /// Data read after the register pointer was selected
    Read,
}

impl fmt::Display for BusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusPhase::Write => write!(f, "write"),
            BusPhase::Select => write!(f, "register select"),
            BusPhase::Read => write!(f, "read"),
        }
    }
}

/// KampanIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus device could not be opened
    #[error("Failed to open bus {device}: {reason}")]
    BusOpen {
        /// Bus device path (e.g. `/dev/i2c-1`)
        device: String,
        /// Underlying OS or driver message
        reason: String,
    },

    /// Register transaction failed
    #[error("Bus {phase} failed (addr {address:#04x}, reg {register:#04x}): {reason}")]
    BusIo {
        /// Transaction phase that failed
        phase: BusPhase,
        /// 7-bit device address
        address: u8,
        /// Register address
        register: u8,
        /// Underlying bus error
        reason: String,
    },

    /// WHO_AM_I did not match
    #[error("Device not found: expected id {expected:#04x}, got {actual:#04x}")]
    DeviceNotFound {
        /// Expected identity register value
        expected: u8,
        /// Value read from the device
        actual: u8,
    },

    /// Soft reset bit never cleared
    #[error("Device reset did not complete after {polls} polls")]
    ResetTimeout {
        /// Number of status polls made
        polls: u32,
    },

    /// Gyroscope zero-rate calibration did not converge
    #[error(
        "Calibration failed after {attempts} attempts (last residual {last_residual_dps:?} dps)"
    )]
    CalibrationFailed {
        /// Candidate/check pairs tried
        attempts: u32,
        /// Calibrated rate of the last check sample, if one was read
        last_residual_dps: Option<[f32; 3]>,
    },

    /// Other startup failure (reactor or command server setup)
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Timer or event source failure
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Malformed remote-command payload
    #[error("Invalid command payload: {0}")]
    CommandValidation(String),

    /// Telemetry sink failure
    #[error("Publish to {destination} failed: {reason}")]
    Publish {
        /// Topic or sink name
        destination: String,
        /// Underlying error
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that must stop the daemon.
    ///
    /// Bus I/O, command validation and publish errors are handled where they
    /// occur and never escape to the top level.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::BusIo { .. } | Error::CommandValidation(_) | Error::Publish { .. }
        )
    }
}
