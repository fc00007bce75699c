//! Telemetry packets and their encoders.
//!
//! Two representations are produced from the same [`TelemetryState`]:
//!
//! - **Housekeeping**: typed fields (counters, position, satellites), sent
//!   in response to the housekeeping wakeup.
//! - **RF**: a fixed 32-byte positional layout for the radio downlink,
//!   decoded by ground systems byte by byte.
//!
//! ```text
//! RF payload
//!  0      1      2..3     4       5       6..7    8..11  12..15 16..19 20..23    24..27 28..31
//! id_hi  id_lo  seq(LE)  cmdcnt  errcnt  spare   lat    lon    alt    [sats,0..] 0      0
//! ```

use crate::codec::{f32_to_le_word, id_pair, read_f32_le, read_u16_le, u8_to_word, WORD_LEN};
use crate::state::{Position, TelemetryState};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

pub const HK_PAYLOAD_LEN: usize = 17;

pub const RF_HEADER_LEN: usize = 8;
pub const RF_BYTE_GROUPS: usize = 6;
pub const RF_BODY_LEN: usize = RF_BYTE_GROUPS * WORD_LEN;
pub const RF_PAYLOAD_LEN: usize = RF_HEADER_LEN + RF_BODY_LEN;

const_assert_eq!(RF_BODY_LEN, 24);
const_assert_eq!(RF_PAYLOAD_LEN, 32);

pub type ByteGroup = [u8; WORD_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HousekeepingPayload {
    pub command_error_counter: u8,
    pub command_counter: u8,
    pub spare: [u8; 2],
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub satellites: u8,
}

impl HousekeepingPayload {
    pub fn from_state(state: &TelemetryState) -> Self {
        Self {
            command_error_counter: state.error_counter,
            command_counter: state.command_counter,
            spare: [0; 2],
            latitude: state.position.latitude,
            longitude: state.position.longitude,
            altitude: state.position.altitude,
            satellites: state.satellite_count,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
        }
    }

    pub fn to_bytes(&self) -> [u8; HK_PAYLOAD_LEN] {
        let mut out = [0u8; HK_PAYLOAD_LEN];
        out[0] = self.command_error_counter;
        out[1] = self.command_counter;
        out[2..4].copy_from_slice(&self.spare);
        out[4..8].copy_from_slice(&f32_to_le_word(self.latitude));
        out[8..12].copy_from_slice(&f32_to_le_word(self.longitude));
        out[12..16].copy_from_slice(&f32_to_le_word(self.altitude));
        out[16] = self.satellites;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HK_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            command_error_counter: bytes[0],
            command_counter: bytes[1],
            spare: [bytes[2], bytes[3]],
            latitude: read_f32_le(bytes, 4)?,
            longitude: read_f32_le(bytes, 8)?,
            altitude: read_f32_le(bytes, 12)?,
            satellites: bytes[16],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HousekeepingPacket {
    pub msg_id: u16,
    pub timestamp: u64,
    pub payload: HousekeepingPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfTelemetryPacket {
    pub msg_id: u16,
    pub timestamp: u64,
    pub source_id: [u8; 2],
    pub sequence: u16,
    pub command_counter: u8,
    pub command_error_counter: u8,
    pub spare: [u8; 2],
    pub byte_groups: [ByteGroup; RF_BYTE_GROUPS],
}

impl RfTelemetryPacket {
    pub fn to_bytes(&self) -> [u8; RF_PAYLOAD_LEN] {
        let mut out = [0u8; RF_PAYLOAD_LEN];
        out[0..2].copy_from_slice(&self.source_id);
        out[2..4].copy_from_slice(&self.sequence.to_le_bytes());
        out[4] = self.command_counter;
        out[5] = self.command_error_counter;
        out[6..8].copy_from_slice(&self.spare);

        for (i, group) in self.byte_groups.iter().enumerate() {
            let start = RF_HEADER_LEN + i * WORD_LEN;
            out[start..start + WORD_LEN].copy_from_slice(group);
        }
        out
    }

    /// Positional decode of an RF payload, as a ground station would do it.
    /// `msg_id` is rebuilt from the source id pair; `timestamp` travels in
    /// the outer header and comes back as 0.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RF_PAYLOAD_LEN {
            return None;
        }

        let mut byte_groups = [[0u8; WORD_LEN]; RF_BYTE_GROUPS];
        for (i, group) in byte_groups.iter_mut().enumerate() {
            let start = RF_HEADER_LEN + i * WORD_LEN;
            group.copy_from_slice(&bytes[start..start + WORD_LEN]);
        }

        Some(Self {
            msg_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            timestamp: 0,
            source_id: [bytes[0], bytes[1]],
            sequence: read_u16_le(bytes, 2)?,
            command_counter: bytes[4],
            command_error_counter: bytes[5],
            spare: [bytes[6], bytes[7]],
            byte_groups,
        })
    }

    pub fn position(&self) -> Position {
        Position {
            latitude: f32::from_le_bytes(self.byte_groups[0]),
            longitude: f32::from_le_bytes(self.byte_groups[1]),
            altitude: f32::from_le_bytes(self.byte_groups[2]),
        }
    }

    pub fn satellites(&self) -> u8 {
        self.byte_groups[3][0]
    }
}

/// Outgoing telemetry handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TelemetryMessage {
    Housekeeping(HousekeepingPacket),
    Rf(RfTelemetryPacket),
}

impl TelemetryMessage {
    pub fn msg_id(&self) -> u16 {
        match self {
            TelemetryMessage::Housekeeping(packet) => packet.msg_id,
            TelemetryMessage::Rf(packet) => packet.msg_id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            TelemetryMessage::Housekeeping(packet) => packet.timestamp,
            TelemetryMessage::Rf(packet) => packet.timestamp,
        }
    }

    pub fn payload_bytes(&self) -> alloc::vec::Vec<u8> {
        match self {
            TelemetryMessage::Housekeeping(packet) => packet.payload.to_bytes().to_vec(),
            TelemetryMessage::Rf(packet) => packet.to_bytes().to_vec(),
        }
    }
}

/// Build the housekeeping packet from a state snapshot.
pub fn encode_housekeeping(state: &TelemetryState, msg_id: u16, timestamp: u64) -> HousekeepingPacket {
    HousekeepingPacket {
        msg_id,
        timestamp,
        payload: HousekeepingPayload::from_state(state),
    }
}

/// Build the RF packet. Advances `state.rf_sequence_counter` and stamps
/// the advanced value; nothing else in `state` changes.
pub fn encode_rf(state: &mut TelemetryState, msg_id: u16, timestamp: u64) -> RfTelemetryPacket {
    let sequence = state.next_rf_sequence();
    let position = state.position;

    RfTelemetryPacket {
        msg_id,
        timestamp,
        source_id: id_pair(msg_id),
        sequence,
        command_counter: state.command_counter,
        command_error_counter: state.error_counter,
        spare: [0; 2],
        byte_groups: [
            f32_to_le_word(position.latitude),
            f32_to_le_word(position.longitude),
            f32_to_le_word(position.altitude),
            u8_to_word(state.satellite_count),
            [0; WORD_LEN],
            [0; WORD_LEN],
        ],
    }
}
