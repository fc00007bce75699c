use serde::{Deserialize, Serialize};
use crate::config::AppConfig;
use crate::error::GpsError;
use crate::telemetry::TelemetryMessage;
use crate::state::TelemetryState;

// V1 command message ids carry 0x1000; telemetry ids do not.
pub const GPS_APP_CMD_MID: u16 = 0x18C0;
pub const GPS_APP_SEND_HK_MID: u16 = 0x18C1;
pub const GPS_APP_SEND_RF_MID: u16 = 0x18C2;
pub const GPS_APP_READ_MID: u16 = 0x18C3;
pub const GPS_APP_HK_TLM_MID: u16 = 0x08C1;
pub const GPS_APP_RF_DATA_MID: u16 = 0x08C2;

pub const COMMAND_MID_FLAG: u16 = 0x1000;

/// Primary (6) plus command secondary (2) header bytes.
pub const COMMAND_HEADER_LEN: usize = 8;

/// Every command this application accepts carries no arguments.
pub const NO_ARGS_CMD_LEN: usize = COMMAND_HEADER_LEN;

/// Ground command codes under the command message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    Noop = 0,
    ResetCounters = 1,
}

impl CommandCode {
    pub fn expected_length(self) -> usize {
        match self {
            CommandCode::Noop | CommandCode::ResetCounters => NO_ARGS_CMD_LEN,
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CommandCode::Noop),
            1 => Ok(CommandCode::ResetCounters),
            other => Err(other),
        }
    }
}

/// What an inbound message resolves to once its id and code are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    GroundCommand(CommandCode),
    SendHousekeeping,
    SendRfTelemetry,
    ReadSensor,
}

impl MessageKind {
    /// Resolve a message against the configured ids.
    ///
    /// Unknown ids and unknown command codes come back as errors; no
    /// counters are touched here.
    pub fn resolve(config: &AppConfig, message: &InboundMessage) -> Result<Self, GpsError> {
        let msg_id = message.msg_id;

        if msg_id == config.cmd_mid {
            CommandCode::try_from(message.command_code)
                .map(MessageKind::GroundCommand)
                .map_err(|command_code| GpsError::UnknownCommand { msg_id, command_code })
        } else if msg_id == config.send_hk_mid {
            Ok(MessageKind::SendHousekeeping)
        } else if msg_id == config.send_rf_mid {
            Ok(MessageKind::SendRfTelemetry)
        } else if msg_id == config.read_mid {
            Ok(MessageKind::ReadSensor)
        } else {
            Err(GpsError::UnknownMessage { msg_id })
        }
    }

    pub fn expected_length(self) -> usize {
        match self {
            MessageKind::GroundCommand(code) => code.expected_length(),
            MessageKind::SendHousekeeping
            | MessageKind::SendRfTelemetry
            | MessageKind::ReadSensor => NO_ARGS_CMD_LEN,
        }
    }
}

/// A message pulled off the command pipe.
///
/// `length` is the total packet size in bytes, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub msg_id: u16,
    #[serde(default)]
    pub command_code: u8,
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    NO_ARGS_CMD_LEN
}

impl InboundMessage {
    pub fn new(msg_id: u16, command_code: u8, length: usize) -> Self {
        Self { msg_id, command_code, length }
    }

    pub fn ground_command(command_code: u8) -> Self {
        Self::new(GPS_APP_CMD_MID, command_code, NO_ARGS_CMD_LEN)
    }

    pub fn noop() -> Self {
        Self::ground_command(CommandCode::Noop as u8)
    }

    pub fn reset_counters() -> Self {
        Self::ground_command(CommandCode::ResetCounters as u8)
    }

    /// Zero-payload wakeup (housekeeping, RF or sensor-read request).
    pub fn trigger(msg_id: u16) -> Self {
        Self::new(msg_id, 0, NO_ARGS_CMD_LEN)
    }
}

// Ground link framing used between the simulator and the ground client:
// newline-delimited JSON, one frame per line.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Accepted,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub msg_id: u16,
    pub command_code: u8,
    pub status: ReplyStatus,
    pub message: Option<alloc::string::String>,
    pub state: TelemetryState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub telemetry: TelemetryMessage,
    /// Positional wire bytes of the payload.
    #[serde(with = "serde_bytes")]
    pub raw: alloc::vec::Vec<u8>,
}

impl TelemetryFrame {
    pub fn new(telemetry: TelemetryMessage) -> Self {
        let raw = telemetry.payload_bytes();
        Self { telemetry, raw }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroundFrame {
    Reply(CommandReply),
    Telemetry(TelemetryFrame),
}
