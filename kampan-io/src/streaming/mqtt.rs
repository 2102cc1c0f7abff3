//! MQTT telemetry sink
//!
//! Publishes each payload unchanged (no envelope) at QoS 0, so an ordinary
//! subscriber on `DryerTelemetry` reads the simple messages directly.
//!
//! ```text
//! reactor ──try_publish──► request queue ──► "mqtt-<broker>" thread ──► broker
//!                          (bounded, never blocks)   drives the connection,
//!                                                    reconnects after errors
//! ```
//!
//! A full request queue (broker unreachable) is reported as
//! [`Error::Publish`] and the message is dropped.

use super::sink::TelemetrySink;
use crate::error::{Error, Result};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;

/// Broker port used when the address has none
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Messages queued while the connection thread is busy
const REQUEST_QUEUE_DEPTH: usize = 64;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Split `host[:port]`
fn parse_broker(address: &str) -> Result<(String, u16)> {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid MQTT broker port in '{}'", address)))?;
            if host.is_empty() {
                return Err(Error::Config(format!("missing MQTT broker host in '{}'", address)));
            }
            Ok((host.to_string(), port))
        }
        None if !address.is_empty() => Ok((address.to_string(), DEFAULT_MQTT_PORT)),
        None => Err(Error::Config("empty MQTT broker address".to_string())),
    }
}

/// Fire-and-forget MQTT publisher
pub struct MqttSink {
    client: Client,
    name: String,
}

impl MqttSink {
    /// Start the connection thread for `address` (`host[:port]`)
    pub fn connect(address: &str) -> Result<Self> {
        let (host, port) = parse_broker(address)?;
        let name = format!("mqtt://{}:{}", host, port);
        let client_id = format!("kampan-io-{}", std::process::id());

        let options = MqttOptions::new(client_id, host, port);
        let (client, mut connection) = Client::new(options, REQUEST_QUEUE_DEPTH);

        let thread_name = format!("mqtt-{}", port);
        let broker = name.clone();
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            log::info!("Connected to {}", broker);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::warn!("{}: {}", broker, e);
                            thread::sleep(RECONNECT_DELAY);
                        }
                    }
                }
                log::debug!("Closing {} connection", broker);
            })
            .map_err(|e| Error::Initialization(format!("MQTT connection thread: {}", e)))?;

        log::info!("MQTT telemetry sink -> {}", name);
        Ok(Self { client, name })
    }
}

impl TelemetrySink for MqttSink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| Error::Publish {
                destination: self.name.clone(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            log::debug!("{} disconnect: {}", self.name, e);
        }
        log::info!("Closing {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    /// Read one MQTT control packet: (packet type, body)
    fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; 1];
        stream.read_exact(&mut header).unwrap();

        let mut remaining = 0usize;
        let mut shift = 0;
        loop {
            let mut byte = [0u8; 1];
            stream.read_exact(&mut byte).unwrap();
            remaining |= ((byte[0] & 0x7F) as usize) << shift;
            if byte[0] & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let mut body = vec![0u8; remaining];
        stream.read_exact(&mut body).unwrap();
        (header[0] >> 4, body)
    }

    #[test]
    fn test_parse_broker() {
        assert_eq!(
            parse_broker("broker.local:1884").unwrap(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(
            parse_broker("broker.local").unwrap(),
            ("broker.local".to_string(), DEFAULT_MQTT_PORT)
        );
        assert!(matches!(parse_broker("broker:x"), Err(Error::Config(_))));
        assert!(matches!(parse_broker(":1883"), Err(Error::Config(_))));
        assert!(matches!(parse_broker(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_publishes_raw_payload_to_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut sink = MqttSink::connect(&address).unwrap();
        sink.publish("DryerTelemetry", "-1,-1,-1,-1,-1,-1,-1").unwrap();

        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let (kind, _) = read_packet(&mut stream);
        assert_eq!(kind, 1, "expected CONNECT");
        // CONNACK, session not present, accepted
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).unwrap();

        let body = loop {
            let (kind, body) = read_packet(&mut stream);
            if kind == 3 {
                break body;
            }
        };

        let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        assert_eq!(&body[2..2 + topic_len], b"DryerTelemetry");
        assert_eq!(&body[2 + topic_len..], b"-1,-1,-1,-1,-1,-1,-1");
    }
}
