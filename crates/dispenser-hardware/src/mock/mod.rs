//! In-process boards for development and testing.
//!
//! - [`MockBoard`]: scriptable test double that records every transaction
//! - [`SimulatedBoard`]: behaves like the real firmware, pours take time

mod board;
mod simulated;

pub use board::{MockBoard, MockBoardHandle, WrittenBlock};
pub use simulated::{SimulatedBoard, SimulatedBoardHandle};
