//! TCP listener for remote commands
//!
//! # Wire Format
//!
//! Request and reply frames use the length-prefixed JSON framing from
//! [`crate::streaming::wire`]:
//!
//! ```text
//! request:  {"method": "setSensorPollTime", "payload": {"pollTime": 500}}
//! reply:    {"status": 200, "payload": {"success": true, "message": "..."}}
//! ```
//!
//! `payload` may be any JSON value; a JSON string is passed through as its
//! contents, everything else as its compact JSON text.
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Client connects; one client is served at a time
//! 2. Each request is forwarded to the reactor thread
//! 3. The listener blocks on the reply and writes it back
//! 4. Client disconnect or an oversized frame closes the connection
//! ```
//!
//! Reads use a 500 ms timeout so the shutdown flag is checked regularly.
//! After shutdown an open connection is served for one more second, and a
//! repeated `haltApplication` is answered by the listener itself since the
//! reactor has already stopped.

use super::{CommandRequest, CommandResponse, METHOD_HALT, halt_response};
use crate::error::{Error, Result};
use crate::reactor::ShutdownFlag;
use crate::streaming::wire::{FrameReader, write_frame};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Largest accepted request frame
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

const READ_TIMEOUT: Duration = Duration::from_millis(500);
const ACCEPT_IDLE: Duration = Duration::from_millis(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an open connection is still served once shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct RemoteCommand {
    method: String,
    #[serde(default)]
    payload: Value,
}

fn payload_text(payload: Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Command server bound to a local address
pub struct CommandServer {
    listener: TcpListener,
    requests: Sender<CommandRequest>,
    shutdown: ShutdownFlag,
}

impl CommandServer {
    /// Bind the listener; failure is an initialization error
    pub fn bind(address: &str, requests: Sender<CommandRequest>, shutdown: ShutdownFlag) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|e| {
            Error::Initialization(format!("command server bind {}: {}", address, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            requests,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop on a named thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let address = self.local_addr()?;
        let handle = thread::Builder::new()
            .name("command-server".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::Initialization(format!("command server thread: {}", e)))?;

        log::info!("Command server listening on {}", address);
        Ok(handle)
    }

    fn run(self) {
        while !self.shutdown.is_requested() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("Command client connected: {}", peer);
                    match self.serve(stream) {
                        Ok(()) => log::info!("Command client disconnected: {}", peer),
                        Err(e) => log::warn!("Command client {} dropped: {}", peer, e),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_IDLE);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    thread::sleep(ACCEPT_IDLE);
                }
            }
        }
        log::info!("Closing command server");
    }

    fn serve(&self, mut stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut frames = FrameReader::new(MAX_FRAME_BYTES);
        let mut stopping_since: Option<Instant> = None;
        loop {
            if self.shutdown.is_requested() {
                let since = *stopping_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= SHUTDOWN_GRACE {
                    return Ok(());
                }
            }

            let parsed = match frames.read_frame(&mut stream) {
                Ok(None) => continue,
                Ok(Some(frame)) => serde_json::from_slice::<RemoteCommand>(frame),
                Err(Error::Io(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                    ) =>
                {
                    return Ok(());
                }
                Err(e) => {
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    return Err(e);
                }
            };

            let response = match parsed {
                Ok(command) => self.answer(command)?,
                Err(e) => {
                    log::warn!("Malformed command frame: {}", e);
                    CommandResponse::bad_request()
                }
            };

            let reply = serde_json::to_vec(&response)?;
            write_frame(&mut stream, &reply)?;
        }
    }

    fn answer(&self, command: RemoteCommand) -> Result<CommandResponse> {
        if !self.shutdown.is_requested() {
            return self.forward(command);
        }
        if command.method == METHOD_HALT {
            log::debug!("Repeated halt while shutting down");
            return Ok(halt_response());
        }
        Err(Error::Scheduling(format!(
            "{} received while shutting down",
            command.method
        )))
    }

    /// Hand the command to the reactor and wait for its answer
    fn forward(&self, command: RemoteCommand) -> Result<CommandResponse> {
        let (reply_tx, reply_rx) = bounded(1);
        let request = CommandRequest {
            method: command.method,
            payload: payload_text(command.payload),
            reply: reply_tx,
        };
        log::debug!("Forwarding command {}", request.method);

        self.requests
            .send(request)
            .map_err(|_| Error::Scheduling("reactor command channel closed".to_string()))?;

        match reply_rx.recv_timeout(REPLY_TIMEOUT) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => Err(Error::Scheduling(
                "reactor did not answer command in time".to_string(),
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Scheduling("reactor dropped command".to_string()))
            }
        }
    }
}
