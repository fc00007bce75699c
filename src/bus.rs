use crate::config::{AppConfig, MAX_PIPE_DEPTH};
use crate::error::TransportError;
use crate::protocol::InboundMessage;
use crate::telemetry::TelemetryMessage;
use heapless::Deque;

type CommandPipe = Deque<InboundMessage, MAX_PIPE_DEPTH>;

/// Message delivery in and out of the application.
pub trait Transport {
    /// Next message on the command pipe. `Ok(None)` means the pipe has
    /// nothing more to deliver.
    fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    /// Fire-and-forget send; failures are reported, never retried.
    fn transmit(&mut self, telemetry: &TelemetryMessage) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        (**self).receive()
    }

    fn transmit(&mut self, telemetry: &TelemetryMessage) -> Result<(), TransportError> {
        (**self).transmit(telemetry)
    }
}

/// In-memory command pipe plus a record of everything transmitted.
#[derive(Debug)]
pub struct LoopbackBus {
    pipe: CommandPipe,
    depth: usize,
    closed: bool,
    transmitted: alloc::vec::Vec<TelemetryMessage>,
    reject_transmits: u32,
}

impl LoopbackBus {
    pub fn new(depth: usize) -> Self {
        Self {
            pipe: Deque::new(),
            depth: depth.clamp(1, MAX_PIPE_DEPTH),
            closed: false,
            transmitted: alloc::vec::Vec::new(),
            reject_transmits: 0,
        }
    }

    /// Pipe sized by the configured depth.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.pipe_depth)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn send(&mut self, message: InboundMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::PipeClosed);
        }
        if self.pipe.len() >= self.depth {
            return Err(TransportError::PipeFull);
        }
        self.pipe
            .push_back(message)
            .map_err(|_| TransportError::PipeFull)
    }

    /// Close the pipe; further receives fail once it is drained.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn pending(&self) -> usize {
        self.pipe.len()
    }

    /// Reject the next `count` transmissions.
    pub fn reject_next_transmits(&mut self, count: u32) {
        self.reject_transmits = count;
    }

    pub fn transmitted(&self) -> &[TelemetryMessage] {
        &self.transmitted
    }

    pub fn take_transmitted(&mut self) -> alloc::vec::Vec<TelemetryMessage> {
        core::mem::take(&mut self.transmitted)
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new(MAX_PIPE_DEPTH)
    }
}

impl Transport for LoopbackBus {
    fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        match self.pipe.pop_front() {
            Some(message) => Ok(Some(message)),
            None if self.closed => Err(TransportError::PipeClosed),
            None => Ok(None),
        }
    }

    fn transmit(&mut self, telemetry: &TelemetryMessage) -> Result<(), TransportError> {
        if self.reject_transmits > 0 {
            self.reject_transmits -= 1;
            return Err(TransportError::Rejected("loopback configured to reject".into()));
        }
        self.transmitted.push(*telemetry);
        Ok(())
    }
}
