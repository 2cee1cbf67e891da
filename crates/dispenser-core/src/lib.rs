pub mod config;
pub mod constants;
pub mod error;
pub mod inventory;
pub mod recipe;
pub mod types;

pub use config::{BusConfig, DispenserConfig, PumpCalibration, SessionConfig};
pub use error::{Error, Result};
pub use inventory::{InventoryMap, InventorySlot, StockLevel};
pub use recipe::{Ingredient, Recipe};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
