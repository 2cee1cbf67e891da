//! Core constants for the dispenser board protocol.
//!
//! This module defines the protocol-level constants shared by the recipe
//! compiler, the bus transport and the dispense session. The embedded board
//! firmware is built against the same values, so changing them breaks wire
//! compatibility.
//!
//! # Board Layout
//!
//! The board drives 32 valves, grouped into 4 registers of 8 valves each.
//! It stores up to 24 recipes, and every recipe is uploaded as one 10-byte
//! frame per register:
//!
//! ```text
//! [recipe_id, d0, d1, d2, d3, d4, d5, d6, d7, register_index]
//! ```
//!
//! # Usage
//!
//! ```
//! use dispenser_core::constants::*;
//!
//! assert_eq!(VALVE_COUNT, REGISTER_COUNT * VALVES_PER_REGISTER);
//! assert_eq!(MENU_FRAME_COUNT, 96);
//! ```

use std::time::Duration;

// ============================================================================
// Board Layout
// ============================================================================

/// Number of recipe slots the embedded board can hold.
pub const MAX_RECIPES: usize = 24;

/// Number of valve registers on the board (2 boards, 2 registers each).
pub const REGISTER_COUNT: usize = 4;

/// Number of valves addressed together by one register.
pub const VALVES_PER_REGISTER: usize = 8;

/// Total number of physical valves (and inventory slots).
pub const VALVE_COUNT: usize = REGISTER_COUNT * VALVES_PER_REGISTER;

/// Lowest valid inventory slot index (slots are 1-based).
pub const MIN_SLOT_INDEX: u8 = 1;

/// Highest valid inventory slot index.
pub const MAX_SLOT_INDEX: u8 = VALVE_COUNT as u8;

/// Highest valid recipe identifier.
pub const MAX_RECIPE_ID: u8 = (MAX_RECIPES - 1) as u8;

// ============================================================================
// Wire Format
// ============================================================================

/// Size in bytes of recipe and order frames.
pub const FRAME_SIZE: usize = 10;

/// Size in bytes of the halt frame (one dummy byte).
pub const HALT_FRAME_SIZE: usize = 1;

/// Payload byte sent in the halt frame.
pub const HALT_PAYLOAD: u8 = 0x00;

/// Number of frames needed to upload a full menu table.
pub const MENU_FRAME_COUNT: usize = MAX_RECIPES * REGISTER_COUNT;

// ============================================================================
// Bus Addressing
// ============================================================================

/// Default bus address of the embedded board (0x33).
pub const DEFAULT_BOARD_ADDRESS: u8 = 0x33;

/// Default register of the first recipe valve array (0x37).
///
/// Register `n` of a recipe is written to `DEFAULT_RECIPE_BASE_REGISTER + n`.
pub const DEFAULT_RECIPE_BASE_REGISTER: u8 = 0x37;

/// Default register that receives order frames (0x57).
pub const DEFAULT_ORDER_REGISTER: u8 = 0x57;

/// Default register that receives the halt frame (0x10).
pub const DEFAULT_HALT_REGISTER: u8 = 0x10;

// ============================================================================
// Timing
// ============================================================================

/// Minimum delay between two frames on the bus.
///
/// The board drops frames that arrive back to back. This is a hard protocol
/// requirement and is deliberately not configurable.
pub const TRANSMIT_DELAY: Duration = Duration::from_millis(100);

/// Default interval between ready-line polls while waiting for the board.
pub const DEFAULT_READY_POLL_INTERVAL_MS: u64 = 1000;

/// Default interval between ready-line polls while a drink is pouring.
pub const DEFAULT_COMPLETION_POLL_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Pump Model
// ============================================================================

/// Milliliters per US fluid ounce.
pub const MILLILITERS_PER_OUNCE: f64 = 29.5735;

/// Longest a single valve may run for one recipe, in seconds.
///
/// The duration byte splits this budget into 256 steps.
pub const MAX_PUMP_SECONDS: f64 = 30.0;

/// Number of time steps encodable in one duration byte.
pub const DURATION_STEPS: f64 = 256.0;

/// Default pump flow rate in milliliters per second.
pub const DEFAULT_PUMP_FLOW_RATE_ML_PER_SEC: f64 = 10.0;

// ============================================================================
// Inventory
// ============================================================================

/// Fraction of the original volume below which an item is reported low.
pub const LOW_STOCK_RATIO: f64 = 0.5;
