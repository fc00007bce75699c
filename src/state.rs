use serde::{Deserialize, Serialize};

/// Last-known position solution, in the receiver's native units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
}

/// Counters and sensor values shared by the command handlers and encoders.
///
/// Owned by a single `GpsApp`; only the command handlers touch the command
/// counters and only the sensor reader touches the position fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryState {
    pub command_counter: u8,
    pub error_counter: u8,
    pub position: Position,
    pub satellite_count: u8,
    pub rf_sequence_counter: u16,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&mut self) {
        self.command_counter = self.command_counter.wrapping_add(1);
    }

    pub fn record_error(&mut self) {
        self.error_counter = self.error_counter.wrapping_add(1);
    }

    /// Zero both command counters. Position, satellites and the RF
    /// sequence are left alone.
    pub fn reset_counters(&mut self) {
        self.command_counter = 0;
        self.error_counter = 0;
    }

    pub fn apply_fix(&mut self, fix: &crate::subsystems::gps::GpsFix) {
        self.position = fix.position;
        self.satellite_count = fix.satellites;
    }

    /// Advance the RF sequence counter and return the value to stamp.
    pub fn next_rf_sequence(&mut self) -> u16 {
        self.rf_sequence_counter = self.rf_sequence_counter.wrapping_add(1);
        self.rf_sequence_counter
    }
}
