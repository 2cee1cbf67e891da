//! Transport trait for the dispenser board.
//!
//! The board is reached through two signals: an addressed bus that carries
//! frames from host to board, and a single active-low ready line from board
//! to host. [`DispenseTransport`] abstracts both so the session logic runs
//! unchanged against real hardware, the simulated board or a test double.
//!
//! Methods return `impl Future + Send` rather than using bare `async fn`, so
//! sessions generic over a transport can be spawned onto the Tokio runtime.
//! Implementations are still written with `async fn`.

use crate::error::Result;
use std::fmt;
use std::future::Future;

/// Electrical level of the ready line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    /// The line is active-low: low means the board is idle and ready.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Low
    }

    #[must_use]
    pub fn from_high(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// What kind of board sits behind a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Physical board on a real bus.
    Hardware,
    /// In-process stand-in used when no board is attached.
    Simulated,
    /// Scriptable test double.
    Mock,
}

/// Board transport abstraction.
///
/// Both methods take `&self`: the bus writes are serialized one level up by
/// [`BoardLink`](crate::link::BoardLink), and the ready line must stay
/// readable while a frame is in flight. Implementations use interior
/// mutability where the underlying driver needs `&mut`.
///
/// # Examples
///
/// ```
/// use dispenser_hardware::mock::MockBoard;
/// use dispenser_hardware::traits::DispenseTransport;
///
/// #[tokio::main]
/// async fn main() -> dispenser_hardware::Result<()> {
///     let (board, handle) = MockBoard::new();
///
///     board.write_block(0x33, 0x10, &[0]).await?;
///     assert!(board.read_ready_line().await?.is_ready());
///     assert_eq!(handle.written().len(), 1);
///     Ok(())
/// }
/// ```
pub trait DispenseTransport: Send + Sync {
    /// Write `payload` to `register` of the device at bus `address`.
    ///
    /// One call is one bus transaction. Implementations must not retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the device is gone.
    fn write_block(
        &self,
        address: u8,
        register: u8,
        payload: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the current level of the ready line.
    ///
    /// Must sample the line on every call; never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be read.
    fn read_ready_line(&self) -> impl Future<Output = Result<PinLevel>> + Send;

    /// Human readable name for logs.
    fn name(&self) -> &str;

    fn kind(&self) -> TransportKind;
}
