//! Event reporting.
//!
//! Every acknowledgement and rejection the application produces is announced
//! as an event with a stable numeric id. [`EventLog`] forwards events to
//! `tracing` and keeps a bounded history for the ground link and for tests.

use arrayvec::ArrayString;
use core::fmt;
use heapless::Deque;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Longest event text carried; longer messages are truncated.
pub const EVENT_MESSAGE_LEN: usize = 122;
pub const MAX_EVENT_HISTORY: usize = 64;

pub type EventMessage = ArrayString<EVENT_MESSAGE_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Information,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventId {
    Startup = 1,
    CommandError = 2,
    NoopCommand = 3,
    ResetCommand = 4,
    InvalidMsgId = 5,
    LengthError = 6,
    PipeError = 7,
    SensorError = 8,
    TransmitError = 9,
}

impl EventId {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Sink for event announcements. Must never block the caller.
pub trait Diagnostics {
    fn emit(&mut self, severity: Severity, event_id: EventId, message: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub severity: Severity,
    pub message: EventMessage,
}

#[derive(Debug)]
pub struct EventLog {
    history: Deque<EventRecord, MAX_EVENT_HISTORY>,
    total_events: u32,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            history: Deque::new(),
            total_events: 0,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &EventRecord> {
        self.history.iter()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.history.back()
    }

    pub fn count_of(&self, event_id: EventId) -> usize {
        self.history.iter().filter(|r| r.event_id == event_id).count()
    }

    pub fn total_events(&self) -> u32 {
        self.total_events
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for EventLog {
    fn emit(&mut self, severity: Severity, event_id: EventId, message: &str) {
        let id = event_id.code();
        match severity {
            Severity::Critical => error!(event_id = id, critical = true, "{}", message),
            Severity::Error => error!(event_id = id, "{}", message),
            Severity::Information => info!(event_id = id, "{}", message),
            Severity::Debug => debug!(event_id = id, "{}", message),
        }

        let record = EventRecord {
            event_id,
            severity,
            message: truncate(message),
        };

        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(record);
        self.total_events = self.total_events.wrapping_add(1);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn emit(&mut self, severity: Severity, event_id: EventId, message: &str) {
        (**self).emit(severity, event_id, message);
    }
}

/// Format event text, cutting it character by character at
/// [`EVENT_MESSAGE_LEN`].
pub fn format_event(args: fmt::Arguments<'_>) -> EventMessage {
    let mut writer = Truncating {
        text: EventMessage::new(),
        full: false,
    };
    let _ = fmt::write(&mut writer, args);
    writer.text
}

fn truncate(message: &str) -> EventMessage {
    format_event(format_args!("{}", message))
}

struct Truncating {
    text: EventMessage,
    full: bool,
}

impl fmt::Write for Truncating {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Once a char has been refused, everything after it is dropped too.
        for ch in s.chars() {
            if self.full {
                break;
            }
            self.full = self.text.try_push(ch).is_err();
        }
        Ok(())
    }
}
