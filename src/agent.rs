use crate::bus::Transport;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{GpsError, TransportError};
use crate::events::{format_event, Diagnostics, EventId, EventLog, Severity};
use crate::protocol::{CommandCode, InboundMessage, MessageKind};
use crate::state::TelemetryState;
use crate::subsystems::{GpsFix, SensorInterface, SensorReader};
use crate::telemetry::{encode_housekeeping, encode_rf, TelemetryMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

pub const GPS_APP_VERSION: &str = "v1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Run,
    Exit,
    Error,
}

/// What a successfully handled message did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Handled {
    Noop,
    CountersReset,
    SensorRead(GpsFix),
    HousekeepingSent,
    RfTelemetrySent { sequence: u16 },
}

/// One message pulled off the pipe and the result of handling it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub message: InboundMessage,
    pub outcome: Result<Handled, GpsError>,
}

/// The GPS application: owns the telemetry state and its collaborators and
/// processes one command-pipe message at a time.
pub struct GpsApp<S, T, C, D = EventLog> {
    config: AppConfig,
    state: TelemetryState,
    run_status: RunStatus,

    sensor: S,
    reader: SensorReader,
    transport: T,
    clock: C,
    diagnostics: D,
}

impl<S, T, C> GpsApp<S, T, C, EventLog>
where
    S: SensorInterface,
    T: Transport,
    C: Clock,
{
    pub fn new(config: AppConfig, sensor: S, transport: T, clock: C) -> Self {
        Self::with_diagnostics(config, sensor, transport, clock, EventLog::new())
    }
}

impl<S, T, C, D> GpsApp<S, T, C, D>
where
    S: SensorInterface,
    T: Transport,
    C: Clock,
    D: Diagnostics,
{
    pub fn with_diagnostics(config: AppConfig, sensor: S, transport: T, clock: C, diagnostics: D) -> Self {
        Self {
            config,
            state: TelemetryState::new(),
            run_status: RunStatus::Run,
            sensor,
            reader: SensorReader::new(),
            transport,
            clock,
            diagnostics,
        }
    }

    /// Announce startup. State was zeroed at construction.
    pub fn init(&mut self) {
        self.run_status = RunStatus::Run;
        info!(
            pipe = %self.config.pipe_name,
            depth = self.config.pipe_depth,
            device = %self.config.sensor_device,
            "command pipe ready"
        );
        let text = format_event(format_args!(
            "GPS App Initialized. Version {}, pipe {} depth {}, sensor {}",
            GPS_APP_VERSION, self.config.pipe_name, self.config.pipe_depth, self.config.sensor_device
        ));
        self.event(Severity::Information, EventId::Startup, &text);
    }

    /// Receive and process a single message.
    ///
    /// Returns `Ok(false)` when the pipe had nothing to deliver. A pipe
    /// failure flips the run status to `Error` and is returned.
    pub fn run_once(&mut self) -> Result<bool, TransportError> {
        Ok(self.dispatch_next()?.is_some())
    }

    /// Like [`GpsApp::run_once`], but hands back the message and how its
    /// handling ended.
    pub fn dispatch_next(&mut self) -> Result<Option<Dispatched>, TransportError> {
        match self.transport.receive() {
            Ok(Some(message)) => {
                let outcome = self.process_message(&message);
                if let Err(e) = &outcome {
                    debug!(msg_id = message.msg_id, "message dropped: {}", e);
                }
                Ok(Some(Dispatched { message, outcome }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.event(
                    Severity::Error,
                    EventId::PipeError,
                    "GPS APP: SB Pipe Read Error, App Will Exit",
                );
                self.run_status = RunStatus::Error;
                Err(e)
            }
        }
    }

    /// Drain the pipe until it is empty, fails, or the app is stopped.
    pub fn run(&mut self) -> RunStatus {
        while self.run_status == RunStatus::Run {
            match self.run_once() {
                Ok(true) => {}
                Ok(false) | Err(_) => break,
            }
        }
        self.run_status
    }

    pub fn stop(&mut self) {
        self.run_status = RunStatus::Exit;
    }

    /// Route one message to its handler.
    ///
    /// Rejections have already been counted and announced by the time the
    /// error is returned; callers only need it for their own bookkeeping.
    pub fn process_message(&mut self, message: &InboundMessage) -> Result<Handled, GpsError> {
        trace!(msg_id = message.msg_id, cc = message.command_code, len = message.length, "dispatch");

        let kind = match MessageKind::resolve(&self.config, message) {
            Ok(kind) => kind,
            Err(e) => {
                self.reject(&e);
                return Err(e);
            }
        };

        self.verify_length(message, kind.expected_length())?;

        match kind {
            MessageKind::GroundCommand(CommandCode::Noop) => Ok(self.noop()),
            MessageKind::GroundCommand(CommandCode::ResetCounters) => Ok(self.reset_counters()),
            MessageKind::ReadSensor => self.read_sensor().map(Handled::SensorRead),
            MessageKind::SendHousekeeping => self.report_housekeeping().map(|()| Handled::HousekeepingSent),
            MessageKind::SendRfTelemetry => self
                .report_rf_telemetry()
                .map(|sequence| Handled::RfTelemetrySent { sequence }),
        }
    }

    /// Exact-length gate in front of every handler.
    pub fn verify_length(&mut self, message: &InboundMessage, expected: usize) -> Result<(), GpsError> {
        if message.length == expected {
            return Ok(());
        }

        let e = GpsError::LengthMismatch {
            msg_id: message.msg_id,
            command_code: message.command_code,
            actual: message.length,
            expected,
        };
        self.reject(&e);
        Err(e)
    }

    pub fn noop(&mut self) -> Handled {
        self.state.record_command();

        let text = format_event(format_args!("GPS: NOOP command {}", GPS_APP_VERSION));
        self.event(Severity::Information, EventId::NoopCommand, &text);

        Handled::Noop
    }

    pub fn reset_counters(&mut self) -> Handled {
        self.state.reset_counters();
        self.event(Severity::Information, EventId::ResetCommand, "GPS: RESET command");
        Handled::CountersReset
    }

    /// Sample the receiver. On failure the last good fix is kept.
    pub fn read_sensor(&mut self) -> Result<GpsFix, GpsError> {
        match self.reader.read(&mut self.sensor) {
            Ok(fix) => {
                self.state.apply_fix(&fix);
                debug!(
                    lat = fix.position.latitude,
                    lon = fix.position.longitude,
                    alt = fix.position.altitude,
                    sats = fix.satellites,
                    "sensor read"
                );
                Ok(fix)
            }
            Err(fault) => {
                let e = GpsError::SensorUnavailable(fault);
                self.announce(Severity::Error, EventId::SensorError, &e);
                Err(e)
            }
        }
    }

    pub fn report_housekeeping(&mut self) -> Result<(), GpsError> {
        // Copying the state reads both counters in one step.
        let snapshot = self.state;
        let packet = encode_housekeeping(&snapshot, self.config.hk_tlm_mid, self.clock.timestamp());
        self.transmit(TelemetryMessage::Housekeeping(packet))
    }

    /// Encode and send the RF packet, returning the sequence it carried.
    /// The sequence advance stands even if the transmit fails.
    pub fn report_rf_telemetry(&mut self) -> Result<u16, GpsError> {
        let timestamp = self.clock.timestamp();
        let packet = encode_rf(&mut self.state, self.config.rf_data_mid, timestamp);
        self.transmit(TelemetryMessage::Rf(packet))?;
        Ok(packet.sequence)
    }

    fn transmit(&mut self, telemetry: TelemetryMessage) -> Result<(), GpsError> {
        self.transport.transmit(&telemetry).map_err(|transport_error| {
            let e = GpsError::TransmitFailure(transport_error);
            self.announce(Severity::Error, EventId::TransmitError, &e);
            e
        })
    }

    fn reject(&mut self, e: &GpsError) {
        if e.counts_as_error() {
            self.state.record_error();
        }
        let event_id = match e {
            GpsError::UnknownMessage { .. } => EventId::InvalidMsgId,
            GpsError::UnknownCommand { .. } => EventId::CommandError,
            GpsError::LengthMismatch { .. } => EventId::LengthError,
            GpsError::SensorUnavailable(_) => EventId::SensorError,
            GpsError::TransmitFailure(_) => EventId::TransmitError,
        };
        self.announce(Severity::Error, event_id, e);
    }

    fn announce(&mut self, severity: Severity, event_id: EventId, e: &GpsError) {
        let text = format_event(format_args!("{}", e));
        self.event(severity, event_id, &text);
    }

    fn event(&mut self, severity: Severity, event_id: EventId, message: &str) {
        self.diagnostics.emit(severity, event_id, message);
    }

    pub fn state(&self) -> &TelemetryState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn run_status(&self) -> RunStatus {
        self.run_status
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sensor_reader(&self) -> &SensorReader {
        &self.reader
    }
}
