//! Enum wrapper for transport dispatch.
//!
//! [`DispenseTransport`] returns `impl Future`, so it cannot be used as a
//! trait object. Code that picks a board at runtime (simulated when nothing
//! is attached, mock in tests) holds an [`AnyTransport`] instead.
//!
//! ```
//! use dispenser_core::{BusConfig, PumpCalibration};
//! use dispenser_hardware::devices::AnyTransport;
//! use dispenser_hardware::mock::SimulatedBoard;
//! use dispenser_hardware::traits::{DispenseTransport, TransportKind};
//!
//! let (board, _handle) = SimulatedBoard::new(BusConfig::default(), PumpCalibration::default());
//! let transport = AnyTransport::Simulated(board);
//! assert_eq!(transport.kind(), TransportKind::Simulated);
//! ```

use crate::Result;
use crate::mock::{MockBoard, SimulatedBoard};
use crate::traits::{DispenseTransport, PinLevel, TransportKind};

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyTransport {
    /// In-process board that pours in simulated time.
    Simulated(SimulatedBoard),
    /// Scriptable test double.
    Mock(MockBoard),
}

impl DispenseTransport for AnyTransport {
    async fn write_block(&self, address: u8, register: u8, payload: &[u8]) -> Result<()> {
        match self {
            Self::Simulated(board) => board.write_block(address, register, payload).await,
            Self::Mock(board) => board.write_block(address, register, payload).await,
        }
    }

    async fn read_ready_line(&self) -> Result<PinLevel> {
        match self {
            Self::Simulated(board) => board.read_ready_line().await,
            Self::Mock(board) => board.read_ready_line().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Simulated(board) => board.name(),
            Self::Mock(board) => board.name(),
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            Self::Simulated(board) => board.kind(),
            Self::Mock(board) => board.kind(),
        }
    }
}

impl From<SimulatedBoard> for AnyTransport {
    fn from(board: SimulatedBoard) -> Self {
        Self::Simulated(board)
    }
}

impl From<MockBoard> for AnyTransport {
    fn from(board: MockBoard) -> Self {
        Self::Mock(board)
    }
}
