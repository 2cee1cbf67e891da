//! Board transport for the drink dispenser.
//!
//! The dispenser board is a bus slave with a handful of write-only
//! registers and one active-low ready line. This crate provides:
//!
//! - [`DispenseTransport`]: the two signals every board exposes
//! - [`BoardLink`]: serialized, paced frame delivery on top of a transport
//! - [`HalTransport`]: a real board on `embedded-hal` I2C and GPIO drivers
//! - [`mock`]: a scriptable test double and a simulated board
//!
//! ```
//! use dispenser_core::{BusConfig, PumpCalibration};
//! use dispenser_hardware::{BoardLink, mock::SimulatedBoard};
//! use dispenser_protocol::MenuTable;
//!
//! #[tokio::main(flavor = "current_thread", start_paused = true)]
//! async fn main() -> dispenser_core::Result<()> {
//!     let (board, handle) = SimulatedBoard::new(BusConfig::default(), PumpCalibration::default());
//!     let link = BoardLink::new(board, BusConfig::default());
//!
//!     link.initialize_menu(&MenuTable::test_pattern()).await?;
//!     assert_eq!(handle.recipe_frames_received(), 96);
//!     assert!(link.read_ready_pin().await?);
//!     Ok(())
//! }
//! ```
//!
//! [`DispenseTransport`]: traits::DispenseTransport

pub mod devices;
pub mod error;
pub mod hal;
pub mod link;
pub mod mock;
pub mod traits;

pub use devices::AnyTransport;
pub use error::{HardwareError, Result};
pub use hal::HalTransport;
pub use link::{BoardLink, LinkStats};
pub use traits::{DispenseTransport, PinLevel, TransportKind};
