use crate::config::AppConfig;
use crate::protocol::InboundMessage;
use heapless::Vec;
use serde::{Deserialize, Serialize};

pub const MAX_SCHEDULE_SLOTS: usize = 8;

/// One periodic wakeup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub msg_id: u16,
    pub period_ms: u64,
    pub next_due_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub total_wakeups: u32,
    pub missed_periods: u32,
}

/// Schedule table producing the zero-payload request messages.
///
/// Slots fire in table order, so a sensor read placed first is always seen
/// by the reports that share its tick.
#[derive(Debug)]
pub struct WakeupScheduler {
    slots: Vec<ScheduleSlot, MAX_SCHEDULE_SLOTS>,
    stats: SchedulerStats,
}

impl WakeupScheduler {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Read, then housekeeping, then RF; zero periods are skipped.
    pub fn from_config(config: &AppConfig, now_ms: u64) -> Self {
        let mut scheduler = Self::new();
        for (msg_id, period_ms) in [
            (config.read_mid, config.sensor_period_ms),
            (config.send_hk_mid, config.housekeeping_period_ms),
            (config.send_rf_mid, config.rf_period_ms),
        ] {
            // Three slots always fit.
            let _ = scheduler.add_slot(msg_id, period_ms, now_ms);
        }
        scheduler
    }

    pub fn add_slot(&mut self, msg_id: u16, period_ms: u64, now_ms: u64) -> Result<(), &'static str> {
        if period_ms == 0 {
            return Ok(());
        }
        self.slots
            .push(ScheduleSlot {
                msg_id,
                period_ms,
                next_due_ms: now_ms.saturating_add(period_ms),
            })
            .map_err(|_| "Schedule table full")
    }

    /// Wakeups due at `now_ms`. A slot that fell several periods behind
    /// fires once and skips ahead.
    pub fn due_messages(&mut self, now_ms: u64) -> Vec<InboundMessage, MAX_SCHEDULE_SLOTS> {
        let mut due = Vec::new();

        for slot in self.slots.iter_mut() {
            if now_ms < slot.next_due_ms {
                continue;
            }

            let behind = (now_ms - slot.next_due_ms) / slot.period_ms;
            self.stats.missed_periods = self.stats.missed_periods.saturating_add(behind as u32);
            slot.next_due_ms = slot.next_due_ms + (behind + 1) * slot.period_ms;

            let _ = due.push(InboundMessage::trigger(slot.msg_id));
            self.stats.total_wakeups = self.stats.total_wakeups.wrapping_add(1);
        }

        due
    }

    pub fn slots(&self) -> &[ScheduleSlot] {
        &self.slots
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl Default for WakeupScheduler {
    fn default() -> Self {
        Self::new()
    }
}
