//! Timer-driven acquisition loop
//!
//! Per tick:
//!
//! ```text
//! consume timer ──err──► request shutdown
//!      │
//!      ├─ XLDA? → read accel → mg
//!      ├─ GDA?  → read gyro  → subtract baseline → dps
//!      ├─ simple message  → simple sink (always)
//!      └─ structured JSON → cloud sink (skipped on the first pass)
//! ```
//!
//! A bus error on one axis group is logged and that group keeps its
//! previous values; the other group and the publish steps still run.

use crate::calibration::{self, CalibrationSettings};
use crate::core::driver::ImuSource;
use crate::core::types::{AxisGroup, CalibrationBaseline, EngineeringSample, RawSample};
use crate::core::units::{raw_to_dps, raw_to_milli_g};
use crate::error::{Error, Result};
use crate::reactor::{PeriodicTimer, ShutdownFlag, TimerHandler};
use crate::streaming::{STARTING_SENTINEL, StructuredTelemetry, TelemetrySink, format_simple};
use std::time::Instant;

/// Lifecycle of the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Uninitialized,
    Calibrating,
    /// `first_pass` is true until the first cycle completes
    Steady { first_pass: bool },
}

/// What happened to one axis group during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Refreshed,
    NotReady,
    Failed,
}

/// Summary of one acquisition cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub sequence: u64,
    pub acceleration: GroupOutcome,
    pub angular_rate: GroupOutcome,
    pub simple_published: bool,
    pub structured_published: bool,
    /// Values published this cycle (stale groups keep earlier values)
    pub sample: EngineeringSample,
}

/// Topics the loop publishes on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub simple: String,
    pub cloud: String,
}

pub type BoxedSink = Box<dyn TelemetrySink + Send>;

/// Sensor polling, conversion and publishing
pub struct AcquisitionLoop<S: ImuSource> {
    source: S,
    baseline: Option<CalibrationBaseline>,
    state: AcquisitionState,
    sequence: u64,
    last: EngineeringSample,
    simple_sink: BoxedSink,
    cloud_sink: Option<BoxedSink>,
    topics: Topics,
}

impl<S: ImuSource> AcquisitionLoop<S> {
    pub fn new(source: S, simple_sink: BoxedSink, cloud_sink: Option<BoxedSink>, topics: Topics) -> Self {
        Self {
            source,
            baseline: None,
            state: AcquisitionState::Uninitialized,
            sequence: 0,
            last: EngineeringSample::default(),
            simple_sink,
            cloud_sink,
            topics,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn baseline(&self) -> Option<CalibrationBaseline> {
        self.baseline
    }

    /// Capture the gyro baseline and announce start on the simple topic
    pub fn calibrate(&mut self, settings: &CalibrationSettings) -> Result<CalibrationBaseline> {
        self.state = AcquisitionState::Calibrating;
        let baseline = match calibration::calibrate(&mut self.source, settings) {
            Ok(baseline) => baseline,
            Err(e) => {
                self.state = AcquisitionState::Uninitialized;
                return Err(e);
            }
        };

        self.baseline = Some(baseline);
        self.state = AcquisitionState::Steady { first_pass: true };

        if let Err(e) = self
            .simple_sink
            .publish(&self.topics.simple, STARTING_SENTINEL)
        {
            log::error!("Failed to publish start sentinel: {}", e);
        }
        Ok(baseline)
    }

    /// Poll, convert and publish once
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let (AcquisitionState::Steady { first_pass }, Some(baseline)) = (self.state, self.baseline)
        else {
            return Err(Error::Initialization(
                "acquisition cycle before calibration".to_string(),
            ));
        };
        let sequence = self.sequence;

        let acceleration = self.refresh_acceleration();
        let angular_rate = self.refresh_angular_rate(&baseline);

        let simple = format_simple(sequence, &self.last);
        let simple_published = match self.simple_sink.publish(&self.topics.simple, &simple) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Simple telemetry publish failed: {}", e);
                false
            }
        };

        let structured_published = if first_pass {
            log::debug!("First pass: structured telemetry suppressed");
            self.state = AcquisitionState::Steady { first_pass: false };
            false
        } else {
            self.publish_structured()
        };

        log::debug!("Cycle {}: {}", sequence, simple);
        self.sequence += 1;

        Ok(CycleReport {
            sequence,
            acceleration,
            angular_rate,
            simple_published,
            structured_published,
            sample: self.last,
        })
    }

    fn refresh_acceleration(&mut self) -> GroupOutcome {
        let full_scale = self.source.accel_full_scale();
        match self.read_group(AxisGroup::Acceleration) {
            Ok(Some(raw)) => {
                self.last.accel_mg = raw.axes().map(|axis| raw_to_milli_g(axis, full_scale));
                GroupOutcome::Refreshed
            }
            Ok(None) => GroupOutcome::NotReady,
            Err(e) => {
                log::error!("Acceleration read failed: {}", e);
                GroupOutcome::Failed
            }
        }
    }

    fn refresh_angular_rate(&mut self, baseline: &CalibrationBaseline) -> GroupOutcome {
        let full_scale = self.source.gyro_full_scale();
        match self.read_group(AxisGroup::AngularRate) {
            Ok(Some(raw)) => {
                let corrected = baseline.apply(&raw);
                self.last.gyro_dps = corrected.axes().map(|axis| raw_to_dps(axis, full_scale));
                GroupOutcome::Refreshed
            }
            Ok(None) => GroupOutcome::NotReady,
            Err(e) => {
                log::error!("Angular rate read failed: {}", e);
                GroupOutcome::Failed
            }
        }
    }

    fn read_group(&mut self, group: AxisGroup) -> Result<Option<RawSample>> {
        if !self.source.data_ready(group)? {
            log::trace!("No new {} data", group.name());
            return Ok(None);
        }
        self.source.read_raw(group).map(Some)
    }

    fn publish_structured(&mut self) -> bool {
        let Some(sink) = self.cloud_sink.as_mut() else {
            return false;
        };

        let message = match StructuredTelemetry::from_sample(&self.last).to_json() {
            Ok(message) => message,
            Err(e) => {
                log::error!("Structured telemetry encode failed: {}", e);
                return false;
            }
        };

        match sink.publish(&self.topics.cloud, &message) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Structured telemetry publish to {} failed: {}", sink.name(), e);
                false
            }
        }
    }
}

impl<S: ImuSource> TimerHandler for AcquisitionLoop<S> {
    fn on_timer(&mut self, timer: &mut PeriodicTimer, now: Instant, shutdown: &ShutdownFlag) {
        if let Err(e) = timer.consume(now) {
            log::error!("Acquisition timer: {}", e);
            shutdown.request();
            return;
        }

        if let Err(e) = self.run_cycle() {
            log::error!("Acquisition cycle failed: {}", e);
            if e.is_fatal() {
                shutdown.request();
            }
        }
    }

    fn name(&self) -> &str {
        "acquisition"
    }
}

impl<S: ImuSource> Drop for AcquisitionLoop<S> {
    fn drop(&mut self) {
        log::info!("Closing acquisition loop after {} cycles", self.sequence);
    }
}
