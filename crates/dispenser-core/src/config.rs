//! Runtime configuration for the dispenser core.
//!
//! Configuration is a plain serde document. Every field has a default, so a
//! partial (or empty) JSON object is a valid configuration:
//!
//! ```
//! use dispenser_core::config::DispenserConfig;
//!
//! let config = DispenserConfig::from_json_str(r#"{ "pump": { "flow_rate_ml_per_sec": 12.5 } }"#)
//!     .unwrap();
//! assert_eq!(config.pump.flow_rate_ml_per_sec, 12.5);
//! assert_eq!(config.bus.board_address, 0x33);
//! ```

use crate::{
    Result,
    constants::{
        DEFAULT_BOARD_ADDRESS, DEFAULT_COMPLETION_POLL_INTERVAL_MS, DEFAULT_HALT_REGISTER,
        DEFAULT_ORDER_REGISTER, DEFAULT_PUMP_FLOW_RATE_ML_PER_SEC, DEFAULT_READY_POLL_INTERVAL_MS,
        DEFAULT_RECIPE_BASE_REGISTER, DURATION_STEPS, MAX_PUMP_SECONDS, REGISTER_COUNT,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenserConfig {
    pub bus: BusConfig,
    pub session: SessionConfig,
    pub pump: PumpCalibration,
}

impl DispenserConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Returns `Error::Config` if the document is malformed or fails
    /// validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if it
    /// cannot be parsed or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded dispenser configuration from {}", path.display());
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        self.session.validate()?;
        self.pump.validate()
    }
}

/// Bus addressing of the embedded board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 7-bit bus address of the board.
    pub board_address: u8,
    /// Register of recipe valve array 0; arrays 1-3 follow consecutively.
    pub recipe_base_register: u8,
    pub order_register: u8,
    pub halt_register: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            board_address: DEFAULT_BOARD_ADDRESS,
            recipe_base_register: DEFAULT_RECIPE_BASE_REGISTER,
            order_register: DEFAULT_ORDER_REGISTER,
            halt_register: DEFAULT_HALT_REGISTER,
        }
    }
}

impl BusConfig {
    /// Bus register that receives frames for recipe register `index`.
    #[must_use]
    pub fn recipe_register(&self, index: crate::types::RegisterIndex) -> u8 {
        self.recipe_base_register.wrapping_add(index.as_u8())
    }

    /// # Errors
    /// Returns `Error::Config` if the address is outside the 7-bit range or
    /// the recipe registers overlap the order or halt register.
    pub fn validate(&self) -> Result<()> {
        if self.board_address > 0x7F {
            return Err(Error::Config(format!(
                "board address {:#04x} is not a 7-bit address",
                self.board_address
            )));
        }

        let last = u16::from(self.recipe_base_register) + REGISTER_COUNT as u16 - 1;
        if last > 0xFF {
            return Err(Error::Config(format!(
                "recipe registers starting at {:#04x} overflow the register space",
                self.recipe_base_register
            )));
        }

        let recipe_range = u16::from(self.recipe_base_register)..=last;
        for (name, register) in [
            ("order", self.order_register),
            ("halt", self.halt_register),
        ] {
            if recipe_range.contains(&u16::from(register)) {
                return Err(Error::Config(format!(
                    "{name} register {register:#04x} overlaps the recipe registers"
                )));
            }
        }

        if self.order_register == self.halt_register {
            return Err(Error::Config(
                "order and halt registers must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Polling behavior of a dispense session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ready_poll_interval_ms: u64,
    pub completion_poll_interval_ms: u64,
    /// Give up on an order after this long. `None` waits forever.
    pub order_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: DEFAULT_READY_POLL_INTERVAL_MS,
            completion_poll_interval_ms: DEFAULT_COMPLETION_POLL_INTERVAL_MS,
            order_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    #[must_use]
    pub fn completion_poll_interval(&self) -> Duration {
        Duration::from_millis(self.completion_poll_interval_ms)
    }

    #[must_use]
    pub fn order_timeout(&self) -> Option<Duration> {
        self.order_timeout_ms.map(Duration::from_millis)
    }

    /// # Errors
    /// Returns `Error::Config` if a poll interval or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.ready_poll_interval_ms == 0 || self.completion_poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll intervals must be at least 1ms".to_string(),
            ));
        }
        if self.order_timeout_ms == Some(0) {
            return Err(Error::Config("order timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Pump model used to turn volumes into duration bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpCalibration {
    pub flow_rate_ml_per_sec: f64,
    pub max_pump_seconds: f64,
}

impl Default for PumpCalibration {
    fn default() -> Self {
        Self {
            flow_rate_ml_per_sec: DEFAULT_PUMP_FLOW_RATE_ML_PER_SEC,
            max_pump_seconds: MAX_PUMP_SECONDS,
        }
    }
}

impl PumpCalibration {
    pub fn new(flow_rate_ml_per_sec: f64) -> Self {
        Self {
            flow_rate_ml_per_sec,
            ..Self::default()
        }
    }

    /// Seconds represented by one step of the duration byte.
    #[must_use]
    pub fn time_resolution_seconds(&self) -> f64 {
        self.max_pump_seconds / DURATION_STEPS
    }

    /// Milliliters delivered by one duration step.
    #[must_use]
    pub fn milliliters_per_step(&self) -> f64 {
        self.flow_rate_ml_per_sec * self.time_resolution_seconds()
    }

    /// Whole duration steps needed to deliver `milliliters`.
    ///
    /// The result is not range-checked; callers decide what to do with
    /// values above 255.
    #[must_use]
    pub fn steps_for_milliliters(&self, milliliters: f64) -> u64 {
        let steps = (milliliters / self.milliliters_per_step()).floor();
        if steps <= 0.0 {
            0
        } else if steps >= u64::MAX as f64 {
            u64::MAX
        } else {
            steps as u64
        }
    }

    /// # Errors
    /// Returns `Error::Config` if either value is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("flow_rate_ml_per_sec", self.flow_rate_ml_per_sec),
            ("max_pump_seconds", self.max_pump_seconds),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
