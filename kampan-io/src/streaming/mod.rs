//! Telemetry formatting and publishing

pub mod messages;
pub mod mqtt;
pub mod sink;
pub mod wire;

pub use messages::{STARTING_SENTINEL, StructuredTelemetry, format_simple};
pub use mqtt::MqttSink;
pub use sink::{LogSink, MemorySink, SinkConfig, SinkKind, TelemetrySink, UdpSink, create_sink};
