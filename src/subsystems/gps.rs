use super::{SensorBlock, SensorInterface, SENSOR_BLOCK_LEN};
use crate::codec::{f32_to_le_word, read_f32_le};
use crate::error::SensorFault;
use crate::state::Position;
use serde::{Deserialize, Serialize};

const LATITUDE_OFFSET: usize = 0;
const LONGITUDE_OFFSET: usize = 4;
const ALTITUDE_OFFSET: usize = 8;
const SATELLITES_OFFSET: usize = 12;
// Byte 13 is reserved by the receiver and ignored.

/// One decoded position solution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsFix {
    pub position: Position,
    pub satellites: u8,
}

impl GpsFix {
    /// Decode `[lat:4][lon:4][alt:4][sats:1][reserved:1]`, floats little-endian.
    pub fn decode(block: &SensorBlock) -> Self {
        // Offsets are in bounds for a SENSOR_BLOCK_LEN array.
        let word = |offset| read_f32_le(block, offset).unwrap_or_default();

        Self {
            position: Position {
                latitude: word(LATITUDE_OFFSET),
                longitude: word(LONGITUDE_OFFSET),
                altitude: word(ALTITUDE_OFFSET),
            },
            satellites: block[SATELLITES_OFFSET],
        }
    }

    /// Inverse of [`GpsFix::decode`]; the reserved byte is written as zero.
    pub fn encode(&self) -> SensorBlock {
        let mut block = [0u8; SENSOR_BLOCK_LEN];
        block[LATITUDE_OFFSET..LATITUDE_OFFSET + 4]
            .copy_from_slice(&f32_to_le_word(self.position.latitude));
        block[LONGITUDE_OFFSET..LONGITUDE_OFFSET + 4]
            .copy_from_slice(&f32_to_le_word(self.position.longitude));
        block[ALTITUDE_OFFSET..ALTITUDE_OFFSET + 4]
            .copy_from_slice(&f32_to_le_word(self.position.altitude));
        block[SATELLITES_OFFSET] = self.satellites;
        block
    }
}

/// Pulls one block from the sensor and decodes it.
///
/// The raw block lives on this function's stack frame and is gone once the
/// decoded fix is returned, whichever way the read ends.
#[derive(Debug, Default)]
pub struct SensorReader {
    reads: u32,
    failures: u32,
}

impl SensorReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<S: SensorInterface + ?Sized>(&mut self, sensor: &mut S) -> Result<GpsFix, SensorFault> {
        let mut block: SensorBlock = [0; SENSOR_BLOCK_LEN];

        match nb::block!(sensor.read_bytes(&mut block)) {
            Ok(()) => {
                self.reads = self.reads.wrapping_add(1);
                Ok(GpsFix::decode(&block))
            }
            Err(fault) => {
                self.failures = self.failures.wrapping_add(1);
                Err(fault)
            }
        }
    }

    pub fn successful_reads(&self) -> u32 {
        self.reads
    }

    pub fn failed_reads(&self) -> u32 {
        self.failures
    }
}

/// Simulated receiver flying a circular ground track.
#[derive(Debug)]
pub struct SimulatedGpsReceiver {
    origin: Position,
    satellites: u8,
    elapsed_ms: u64,

    // Orbit model
    track_radius_deg: f32,
    period_ms: u64,

    // Fault injection
    fault_state: Option<SensorFault>,
    busy_polls: u8,
    pending_busy: u8,
}

impl SimulatedGpsReceiver {
    pub fn new() -> Self {
        Self::with_origin(
            Position {
                latitude: 51.5,
                longitude: -0.12,
                altitude: 408.0,
            },
            9,
        )
    }

    pub fn with_origin(origin: Position, satellites: u8) -> Self {
        Self {
            origin,
            satellites,
            elapsed_ms: 0,
            track_radius_deg: 0.5,
            period_ms: 5_400_000,
            fault_state: None,
            busy_polls: 0,
            pending_busy: 0,
        }
    }

    /// A receiver that never moves, reporting exactly `fix`.
    pub fn stationary(fix: GpsFix) -> Self {
        let mut receiver = Self::with_origin(fix.position, fix.satellites);
        receiver.track_radius_deg = 0.0;
        receiver
    }

    pub fn advance(&mut self, dt_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.wrapping_add(dt_ms);
    }

    /// Make every read report `WouldBlock` this many times before completing.
    pub fn set_busy_polls(&mut self, polls: u8) {
        self.busy_polls = polls;
        self.pending_busy = polls;
    }

    pub fn inject_fault(&mut self, fault: SensorFault) {
        self.fault_state = Some(fault);
    }

    pub fn clear_faults(&mut self) {
        self.fault_state = None;
    }

    pub fn is_healthy(&self) -> bool {
        self.fault_state.is_none()
    }

    pub fn current_fix(&self) -> GpsFix {
        // No arithmetic on a stationary track: keeps -0.0 and NaN payloads intact.
        if self.track_radius_deg == 0.0 {
            return GpsFix {
                position: self.origin,
                satellites: self.satellites,
            };
        }

        let phase = (self.elapsed_ms % self.period_ms) as f32 / self.period_ms as f32;
        let angle = phase * core::f32::consts::TAU;

        GpsFix {
            position: Position {
                latitude: self.origin.latitude + self.track_radius_deg * angle.sin(),
                longitude: self.origin.longitude + self.track_radius_deg * angle.cos(),
                altitude: self.origin.altitude + 2.0 * (angle * 2.0).sin() * self.track_radius_deg,
            },
            satellites: self.satellites,
        }
    }
}

impl Default for SimulatedGpsReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorInterface for SimulatedGpsReceiver {
    fn read_bytes(&mut self, block: &mut SensorBlock) -> nb::Result<(), SensorFault> {
        if let Some(fault) = self.fault_state {
            self.pending_busy = self.busy_polls;
            return Err(nb::Error::Other(fault));
        }

        if self.pending_busy > 0 {
            self.pending_busy -= 1;
            return Err(nb::Error::WouldBlock);
        }

        *block = self.current_fix().encode();
        self.pending_busy = self.busy_polls;
        Ok(())
    }
}
