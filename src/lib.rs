//! # GPS Sensor Application
//!
//! Command dispatch and telemetry encoding core for a spacecraft GPS sensor
//! application. Ground commands and scheduler wakeups arrive on a command
//! pipe; the application samples the receiver and emits two telemetry
//! products built from the same state.
//!
//! ## Features
//!
//! - **Command dispatch**: closed message/command enums with exact-length
//!   validation and counted rejections
//! - **Sensor decoding**: 14-byte receiver blocks to typed position fixes
//! - **Housekeeping telemetry**: typed counters and position
//! - **RF telemetry**: bit-exact 32-byte positional downlink packet
//! - **Embedded-friendly**: bounded buffers, no heap on the command path
//!
//! ## Quick Start
//!
//! ```rust
//! use gpsbus::{AppConfig, GpsApp, InboundMessage, LoopbackBus, ManualClock, SimulatedGpsReceiver};
//!
//! let mut app = GpsApp::new(
//!     AppConfig::default(),
//!     SimulatedGpsReceiver::new(),
//!     LoopbackBus::default(),
//!     ManualClock::new(0),
//! );
//! app.init();
//!
//! app.process_message(&InboundMessage::noop()).unwrap();
//! assert_eq!(app.state().command_counter, 1);
//! ```
//!
//! ## Architecture
//!
//! - [`agent`] - The application and message dispatcher
//! - [`protocol`] - Message ids, command codes, ground-link frames
//! - [`subsystems`] - Sensor interface, decoder and simulated receiver
//! - [`telemetry`] - Housekeeping and RF encoders
//! - [`events`] - Event ids and the event log
//! - [`bus`], [`clock`], [`scheduler`] - Collaborators around the core

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod agent;
pub mod bus;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod scheduler;
pub mod state;
pub mod subsystems;
pub mod telemetry;

// Re-export main public types for convenience
pub use agent::{Dispatched, GpsApp, Handled, RunStatus};
pub use bus::{LoopbackBus, Transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{GpsError, SensorFault, TransportError};
pub use events::{Diagnostics, EventId, EventLog, Severity};
pub use protocol::{CommandCode, InboundMessage, MessageKind};
pub use state::TelemetryState;
pub use subsystems::{GpsFix, SensorInterface, SimulatedGpsReceiver};
pub use telemetry::{HousekeepingPacket, RfTelemetryPacket, TelemetryMessage};
