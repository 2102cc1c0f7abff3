//! Application orchestration for the KampanIO daemon
//!
//! Brings the sensor up, calibrates it, wires the acquisition loop into the
//! reactor and starts the optional command server. Startup is all-or-nothing:
//! any failure before [`KampanApp::run`] releases what was already built.

use crate::acquisition::{AcquisitionLoop, Topics};
use crate::commands::server::CommandServer;
use crate::config::AppConfig;
use crate::devices::{BoxedSource, create_device};
use crate::error::Result;
use crate::reactor::{Reactor, ShutdownFlag, TimerId};
use crate::streaming::create_sink;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::thread::JoinHandle;

/// Commands queued while an acquisition cycle runs
const COMMAND_QUEUE_DEPTH: usize = 8;

/// Main application structure that owns every runtime component
pub struct KampanApp {
    reactor: Reactor,
    acquisition_timer: TimerId,
    server: Option<JoinHandle<()>>,
    command_address: Option<SocketAddr>,
    shutdown: ShutdownFlag,
}

impl KampanApp {
    /// Build the application from configuration, opening the configured bus
    pub fn new(config: &AppConfig, shutdown: ShutdownFlag) -> Result<Self> {
        config.validate()?;
        let source = create_device(config)?;
        Self::with_source(config, source, shutdown)
    }

    /// Build the application around an already initialized sensor
    pub fn with_source(config: &AppConfig, source: BoxedSource, shutdown: ShutdownFlag) -> Result<Self> {
        info!("Initializing KampanIO application");

        let simple_sink = create_sink(&config.telemetry.simple_sink)?;
        let cloud_sink = config
            .telemetry
            .cloud_sink
            .as_ref()
            .map(create_sink)
            .transpose()?;
        let topics = Topics {
            simple: config.telemetry.simple_topic.clone(),
            cloud: config.telemetry.cloud_topic.clone(),
        };

        let mut acquisition = AcquisitionLoop::new(source, simple_sink, cloud_sink, topics);
        acquisition.calibrate(&config.calibration)?;

        let mut reactor = Reactor::new(shutdown.clone());
        let acquisition_timer =
            reactor.add_timer(config.acquisition.poll_period(), Box::new(acquisition))?;

        let mut server = None;
        let mut command_address = None;
        if config.commands.enabled {
            let (tx, rx) = crossbeam_channel::bounded(COMMAND_QUEUE_DEPTH);
            let listener = CommandServer::bind(&config.commands.bind_address, tx, shutdown.clone())?;
            command_address = Some(listener.local_addr()?);
            reactor.attach_commands(rx, acquisition_timer)?;
            server = Some(listener.spawn()?);
        } else {
            info!("Remote commands disabled");
        }

        info!("✓ Sensor calibrated and acquisition scheduled");

        Ok(Self {
            reactor,
            acquisition_timer,
            server,
            command_address,
            shutdown,
        })
    }

    /// Address the command server is listening on, if enabled
    pub fn command_address(&self) -> Option<SocketAddr> {
        self.command_address
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Current acquisition period
    pub fn poll_period(&self) -> Option<std::time::Duration> {
        self.reactor
            .timer(self.acquisition_timer)
            .map(|timer| timer.period())
    }

    /// Dispatch events until shutdown is requested
    pub fn run(&mut self) -> Result<()> {
        info!("Press Ctrl+C to stop");
        let result = self.reactor.run();
        self.stop_server();
        result
    }

    fn stop_server(&mut self) {
        let Some(handle) = self.server.take() else {
            return;
        };

        self.shutdown.request();
        debug!("Waiting for command server thread");
        if handle.join().is_err() {
            error!("Command server thread panicked");
        }
    }
}

impl Drop for KampanApp {
    fn drop(&mut self) {
        debug!("KampanApp cleaning up...");
        self.stop_server();
    }
}
