pub mod gps;

pub use gps::{GpsFix, SensorReader, SimulatedGpsReceiver};

use crate::error::SensorFault;

/// Size of the block the GPS receiver hands over per read.
pub const SENSOR_BLOCK_LEN: usize = 14;

pub type SensorBlock = [u8; SENSOR_BLOCK_LEN];

/// Byte-level access to the positioning sensor.
///
/// `read_bytes` follows the `nb` convention: `WouldBlock` while the
/// hardware transfer is still in flight, an error once the driver has given
/// up. Callers that need a blocking read wrap it in `nb::block!`.
pub trait SensorInterface {
    fn read_bytes(&mut self, block: &mut SensorBlock) -> nb::Result<(), SensorFault>;
}

impl<S: SensorInterface + ?Sized> SensorInterface for &mut S {
    fn read_bytes(&mut self, block: &mut SensorBlock) -> nb::Result<(), SensorFault> {
        (**self).read_bytes(block)
    }
}
