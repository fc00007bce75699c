use thiserror::Error;

/// Hardware-level reasons the GPS receiver could not hand over a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("sensor bus error")]
    BusError,
    #[error("sensor not responding")]
    NotResponding,
    #[error("short read: received {received} bytes")]
    ShortRead { received: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("command pipe full")]
    PipeFull,
    #[error("command pipe closed")]
    PipeClosed,
    #[error("transmission rejected: {0}")]
    Rejected(alloc::string::String),
}

/// Everything that can go wrong while handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpsError {
    #[error("invalid command packet, MID = 0x{msg_id:04X}")]
    UnknownMessage { msg_id: u16 },

    #[error("invalid ground command code: CC = {command_code}")]
    UnknownCommand { msg_id: u16, command_code: u8 },

    #[error("invalid msg length: ID = 0x{msg_id:04X}, CC = {command_code}, Len = {actual}, Expected = {expected}")]
    LengthMismatch {
        msg_id: u16,
        command_code: u8,
        actual: usize,
        expected: usize,
    },

    #[error("sensor unavailable: {0}")]
    SensorUnavailable(#[from] SensorFault),

    #[error("telemetry transmit failed: {0}")]
    TransmitFailure(#[from] TransportError),
}

impl GpsError {
    /// Whether this rejection is reflected in the command error counter.
    pub fn counts_as_error(&self) -> bool {
        matches!(
            self,
            GpsError::UnknownMessage { .. }
                | GpsError::UnknownCommand { .. }
                | GpsError::LengthMismatch { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Invalid(alloc::string::String),
}
