//! Telemetry sinks
//!
//! The acquisition loop publishes through [`TelemetrySink`] and never sees
//! the transport behind it:
//!
//! | Kind | Behaviour |
//! |------|-----------|
//! | `log` | `log::info!` line per message (target `telemetry`) |
//! | `udp` | one datagram per message, length-prefixed JSON [`Envelope`] |
//! | `mqtt` | payload published unchanged on the topic, QoS 0 ([`MqttSink`]) |
//! | memory | in-process capture for tests and embedding |

use super::messages::Envelope;
use super::mqtt::MqttSink;
use super::wire::encode_frame;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

/// Destination for formatted telemetry messages
pub trait TelemetrySink {
    /// Publish one message on `topic`
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()>;

    /// Name used in log messages
    fn name(&self) -> &str;
}

/// Sink transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Udp,
    Mqtt,
}

impl SinkKind {
    /// Whether the sink needs `address`
    pub fn is_network(&self) -> bool {
        !matches!(self, SinkKind::Log)
    }
}

/// Sink configuration (`telemetry.simple_sink`, `telemetry.cloud_sink`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    /// `host:port` for network sinks (MQTT defaults to port 1883)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Build a sink from configuration
pub fn create_sink(config: &SinkConfig) -> Result<Box<dyn TelemetrySink + Send>> {
    let address = || {
        config
            .address
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{:?} sink requires an address", config.kind)))
    };

    match config.kind {
        SinkKind::Log => Ok(Box::new(LogSink)),
        SinkKind::Udp => Ok(Box::new(UdpSink::connect(address()?)?)),
        SinkKind::Mqtt => Ok(Box::new(MqttSink::connect(address()?)?)),
    }
}

/// Writes every message to the log
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        log::info!(target: "telemetry", "[{}] {}", topic, payload);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Maximum datagram we build (envelope + length prefix)
const MAX_DATAGRAM: usize = 1024;

/// Fire-and-forget UDP publisher
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
    name: String,
    send_buffer: Vec<u8>,
}

impl UdpSink {
    /// Bind an ephemeral local port and resolve `address`
    pub fn connect(address: &str) -> Result<Self> {
        let target = address
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("invalid sink address {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::Config(format!("sink address {} did not resolve", address)))?;

        let bind = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind)?;
        log::info!("UDP telemetry sink -> {}", target);

        Ok(Self {
            socket,
            target,
            name: format!("udp://{}", target),
            send_buffer: Vec::with_capacity(MAX_DATAGRAM),
        })
    }
}

impl TelemetrySink for UdpSink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        let body = serde_json::to_vec(&Envelope { topic, payload })?;
        encode_frame(&body, &mut self.send_buffer);

        self.socket
            .send_to(&self.send_buffer, self.target)
            .map_err(|e| Error::Publish {
                destination: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One captured message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

#[derive(Default)]
struct MemoryInner {
    messages: Vec<Published>,
    failing: bool,
}

/// In-memory sink; clones share the same message list
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message published so far
    pub fn messages(&self) -> Vec<Published> {
        self.inner.lock().messages.clone()
    }

    /// Payloads published on `topic`, oldest first
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.inner
            .lock()
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Make subsequent publishes fail
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(Error::Publish {
                destination: "memory".to_string(),
                reason: "sink disabled".to_string(),
            });
        }
        inner.messages.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::messages::STARTING_SENTINEL as STARTING;
    use std::time::Duration;

    #[test]
    fn test_memory_sink_shares_messages() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.publish("DryerTelemetry", "0,1,2,3,4,5,6").unwrap();
        handle.publish("cloud", "{}").unwrap();

        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.payloads("DryerTelemetry"), vec!["0,1,2,3,4,5,6"]);
    }

    #[test]
    fn test_memory_sink_failure() {
        let mut sink = MemorySink::new();
        sink.set_failing(true);
        assert!(matches!(sink.publish("t", "p"), Err(Error::Publish { .. })));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_udp_sink_sends_framed_envelope() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let address = receiver.local_addr().unwrap().to_string();

        let mut sink = create_sink(&SinkConfig {
            kind: SinkKind::Udp,
            address: Some(address),
        })
        .unwrap();
        sink.publish("DryerTelemetry", STARTING).unwrap();

        let mut buf = [0u8; 256];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, n - 4);

        let envelope: serde_json::Value = serde_json::from_slice(&buf[4..n]).unwrap();
        assert_eq!(envelope["topic"], "DryerTelemetry");
        assert_eq!(envelope["payload"], STARTING);
    }

    #[test]
    fn test_network_sinks_require_address() {
        for kind in [SinkKind::Udp, SinkKind::Mqtt] {
            let err = create_sink(&SinkConfig {
                kind,
                address: None,
            })
            .err()
            .unwrap();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    #[test]
    fn test_sink_kind_from_toml() {
        let config: SinkConfig = toml::from_str(
            r#"
kind = "mqtt"
address = "broker.local:1883"
"#,
        )
        .unwrap();
        assert_eq!(config.kind, SinkKind::Mqtt);
        assert!(config.kind.is_network());
        assert!(!SinkKind::Log.is_network());
    }
}
