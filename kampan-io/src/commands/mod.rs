//! Remote commands
//!
//! | Method | Payload | Success | Failure |
//! |--------|---------|---------|---------|
//! | `haltApplication` | ignored | 200, sets shutdown | |
//! | `setSensorPollTime` | `{"pollTime": n}`, n ≥ 1 ns | 200, period = n ns | 400, period unchanged |
//! | anything else | | | 404 |
//!
//! Payloads of [`MAX_PAYLOAD_BYTES`] or more are answered with 400 before
//! the method is looked at. Commands execute on the reactor thread via
//! [`CommandTarget`], never concurrently with an acquisition cycle.

pub mod server;

pub use server::CommandServer;

use crate::error::{Error, Result};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

pub const METHOD_HALT: &str = "haltApplication";
pub const METHOD_SET_POLL_TIME: &str = "setSensorPollTime";

/// Payloads this long or longer are rejected
pub const MAX_PAYLOAD_BYTES: usize = 32;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;

const BAD_PAYLOAD_MESSAGE: &str = "request does not contain an identifiable payload";

/// Reply to a remote command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: u16,
    pub payload: Value,
}

impl CommandResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            payload: json!({ "success": true, "message": message.into() }),
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            payload: json!({ "success": false, "message": BAD_PAYLOAD_MESSAGE }),
        }
    }

    pub fn not_found(method: &str) -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            payload: Value::String(format!("method not found '{}'", method)),
        }
    }
}

/// A command received off-thread, answered through `reply`
#[derive(Debug)]
pub struct CommandRequest {
    pub method: String,
    pub payload: String,
    pub reply: Sender<CommandResponse>,
}

/// Runtime controls exposed to remote commands
pub trait CommandTarget {
    /// Re-arm the acquisition timer with a new period
    fn set_poll_period(&mut self, period: Duration) -> Result<()>;

    /// Request orderly termination
    fn halt(&mut self);
}

#[derive(Deserialize)]
struct PollTimeRequest {
    #[serde(rename = "pollTime")]
    poll_time: i64,
}

/// Parse a `setSensorPollTime` payload into nanoseconds
pub fn parse_poll_time(payload: &str) -> Result<u64> {
    let request: PollTimeRequest = serde_json::from_str(payload)
        .map_err(|e| Error::CommandValidation(format!("pollTime: {}", e)))?;

    u64::try_from(request.poll_time)
        .ok()
        .filter(|ns| *ns >= 1)
        .ok_or_else(|| {
            Error::CommandValidation(format!("pollTime must be >= 1 ns, got {}", request.poll_time))
        })
}

/// Reply to `haltApplication`; identical for every repeat
pub fn halt_response() -> CommandResponse {
    CommandResponse::success("Halting Application")
}

/// Execute one command against `target`
pub fn dispatch(method: &str, payload: &str, target: &mut dyn CommandTarget) -> CommandResponse {
    if payload.len() >= MAX_PAYLOAD_BYTES {
        log::warn!(
            "Rejecting {} payload of {} bytes (limit {})",
            method,
            payload.len(),
            MAX_PAYLOAD_BYTES
        );
        return CommandResponse::bad_request();
    }

    match method {
        METHOD_HALT => {
            log::info!("Remote halt requested");
            target.halt();
            halt_response()
        }
        METHOD_SET_POLL_TIME => {
            let ns = match parse_poll_time(payload) {
                Ok(ns) => ns,
                Err(e) => {
                    log::warn!("{}", e);
                    return CommandResponse::bad_request();
                }
            };
            match target.set_poll_period(Duration::from_nanos(ns)) {
                Ok(()) => {
                    log::info!("Sensor poll time set to {} ns", ns);
                    CommandResponse::success(format!("New sensor poll time {} ns", ns))
                }
                Err(e) => {
                    log::error!("Failed to apply poll time {} ns: {}", ns, e);
                    CommandResponse::bad_request()
                }
            }
        }
        other => {
            log::warn!("Unknown remote method '{}'", other);
            CommandResponse::not_found(other)
        }
    }
}
