use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::ConfigError;
use crate::protocol::{
    COMMAND_MID_FLAG, GPS_APP_CMD_MID, GPS_APP_HK_TLM_MID, GPS_APP_READ_MID, GPS_APP_RF_DATA_MID,
    GPS_APP_SEND_HK_MID, GPS_APP_SEND_RF_MID,
};

pub const MAX_PIPE_DEPTH: usize = 32;
const DEFAULT_PERIOD_MS: u64 = 1000;

/// Application configuration. Every field has a default, so a partial JSON
/// document only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cmd_mid: u16,
    pub send_hk_mid: u16,
    pub send_rf_mid: u16,
    pub read_mid: u16,
    pub hk_tlm_mid: u16,
    pub rf_data_mid: u16,

    pub pipe_name: alloc::string::String,
    pub pipe_depth: usize,
    pub sensor_device: alloc::string::String,

    // Wakeup schedule, 0 disables the slot
    pub housekeeping_period_ms: u64,
    pub rf_period_ms: u64,
    pub sensor_period_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cmd_mid: GPS_APP_CMD_MID,
            send_hk_mid: GPS_APP_SEND_HK_MID,
            send_rf_mid: GPS_APP_SEND_RF_MID,
            read_mid: GPS_APP_READ_MID,
            hk_tlm_mid: GPS_APP_HK_TLM_MID,
            rf_data_mid: GPS_APP_RF_DATA_MID,
            pipe_name: "GPS_APP_CMD_PIPE".into(),
            pipe_depth: MAX_PIPE_DEPTH,
            sensor_device: "/dev/i2c-2.genuC-0".into(),
            housekeeping_period_ms: DEFAULT_PERIOD_MS,
            rf_period_ms: DEFAULT_PERIOD_MS,
            sensor_period_ms: DEFAULT_PERIOD_MS,
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn command_mids(&self) -> [u16; 4] {
        [self.cmd_mid, self.send_hk_mid, self.send_rf_mid, self.read_mid]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mids = self.command_mids();

        for (i, mid) in mids.iter().enumerate() {
            if mid & COMMAND_MID_FLAG == 0 {
                return Err(ConfigError::Invalid(alloc::format!(
                    "command MID 0x{:04X} is missing the command flag",
                    mid
                )));
            }
            if mids[i + 1..].contains(mid) {
                return Err(ConfigError::Invalid(alloc::format!(
                    "command MID 0x{:04X} is assigned twice",
                    mid
                )));
            }
        }

        for mid in [self.hk_tlm_mid, self.rf_data_mid] {
            if mid & COMMAND_MID_FLAG != 0 {
                return Err(ConfigError::Invalid(alloc::format!(
                    "telemetry MID 0x{:04X} carries the command flag",
                    mid
                )));
            }
        }

        if self.pipe_depth == 0 || self.pipe_depth > MAX_PIPE_DEPTH {
            return Err(ConfigError::Invalid(alloc::format!(
                "pipe depth {} outside 1..={}",
                self.pipe_depth, MAX_PIPE_DEPTH
            )));
        }

        Ok(())
    }
}
