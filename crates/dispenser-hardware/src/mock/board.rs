//! Scriptable mock board.
//!
//! The board half is handed to the code under test. The handle half stays
//! with the test, which uses it to script the ready line, inject bus
//! failures and inspect everything that was written.

use crate::{
    HardwareError, Result,
    traits::{DispenseTransport, PinLevel, TransportKind},
};
use dispenser_core::BusConfig;
use dispenser_protocol::BoardFrame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One bus transaction as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBlock {
    pub address: u8,
    pub register: u8,
    pub payload: Vec<u8>,
}

impl WrittenBlock {
    /// Interpret this block the way the board firmware would.
    ///
    /// # Errors
    /// Returns `dispenser_core::Error::InvalidFrame` if it is not a valid frame.
    pub fn decode(&self, bus: &BusConfig) -> dispenser_core::Result<BoardFrame> {
        BoardFrame::decode(bus, self.register, &self.payload)
    }
}

#[derive(Debug)]
struct MockState {
    written: Vec<WrittenBlock>,
    write_attempts: usize,
    /// 1-based attempt number that fails, and every attempt after it.
    fail_from_attempt: Option<usize>,
    scripted_levels: VecDeque<PinLevel>,
    resting_level: PinLevel,
    pin_reads: usize,
    pin_fault: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            written: Vec::new(),
            write_attempts: 0,
            fail_from_attempt: None,
            scripted_levels: VecDeque::new(),
            resting_level: PinLevel::Low,
            pin_reads: 0,
            pin_fault: false,
        }
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock dispenser board.
///
/// Writes succeed and are recorded until a failure is injected. The ready
/// line reads the scripted levels in order, then stays at the resting
/// level (low, i.e. ready, unless changed).
///
/// # Examples
///
/// ```
/// use dispenser_hardware::mock::MockBoard;
/// use dispenser_hardware::traits::{DispenseTransport, PinLevel};
///
/// #[tokio::main]
/// async fn main() -> dispenser_hardware::Result<()> {
///     let (board, handle) = MockBoard::new();
///     handle.script_ready_levels([PinLevel::High, PinLevel::Low]);
///
///     assert_eq!(board.read_ready_line().await?, PinLevel::High);
///     assert_eq!(board.read_ready_line().await?, PinLevel::Low);
///     assert_eq!(handle.pin_reads(), 2);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockBoard {
    state: SharedState,
    name: String,
}

impl MockBoard {
    /// Create a new mock board with the default name.
    pub fn new() -> (Self, MockBoardHandle) {
        Self::with_name("Mock Board".to_string())
    }

    pub fn with_name(name: String) -> (Self, MockBoardHandle) {
        let state = SharedState::default();
        let board = Self {
            state: Arc::clone(&state),
            name,
        };
        (board, MockBoardHandle { state })
    }
}

impl DispenseTransport for MockBoard {
    async fn write_block(&self, address: u8, register: u8, payload: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        state.write_attempts += 1;

        if state
            .fail_from_attempt
            .is_some_and(|first| state.write_attempts >= first)
        {
            return Err(HardwareError::bus(format!(
                "injected failure on write {} to register {register:#04x}",
                state.write_attempts
            )));
        }

        state.written.push(WrittenBlock {
            address,
            register,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn read_ready_line(&self) -> Result<PinLevel> {
        let mut state = lock(&self.state);
        state.pin_reads += 1;

        if state.pin_fault {
            return Err(HardwareError::ready_line("injected ready line fault"));
        }

        let level = match state.scripted_levels.pop_front() {
            Some(level) => level,
            None => state.resting_level,
        };
        Ok(level)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Mock
    }
}

/// Test-side control of a [`MockBoard`].
#[derive(Debug, Clone)]
pub struct MockBoardHandle {
    state: SharedState,
}

impl MockBoardHandle {
    /// Fail write attempt number `attempt` (1-based) and every write after it.
    pub fn fail_from_write(&self, attempt: usize) {
        lock(&self.state).fail_from_attempt = Some(attempt);
    }

    /// Let writes succeed again.
    pub fn clear_write_failure(&self) {
        lock(&self.state).fail_from_attempt = None;
    }

    /// Queue levels returned by the next ready line reads, in order.
    pub fn script_ready_levels(&self, levels: impl IntoIterator<Item = PinLevel>) {
        lock(&self.state).scripted_levels.extend(levels);
    }

    /// Level returned once the script runs out.
    pub fn set_resting_level(&self, level: PinLevel) {
        lock(&self.state).resting_level = level;
    }

    /// Make ready line reads fail (or recover).
    pub fn set_pin_fault(&self, fault: bool) {
        lock(&self.state).pin_fault = fault;
    }

    /// Successful writes, in order.
    pub fn written(&self) -> Vec<WrittenBlock> {
        lock(&self.state).written.clone()
    }

    /// Successful writes decoded as board frames.
    ///
    /// # Errors
    /// Returns the first decode error.
    pub fn frames(&self, bus: &BusConfig) -> dispenser_core::Result<Vec<BoardFrame>> {
        lock(&self.state)
            .written
            .iter()
            .map(|block| block.decode(bus))
            .collect()
    }

    /// Number of write calls, including failed ones.
    pub fn write_attempts(&self) -> usize {
        lock(&self.state).write_attempts
    }

    pub fn pin_reads(&self) -> usize {
        lock(&self.state).pin_reads
    }

    /// Forget recorded writes and counters. Scripts and faults are kept.
    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.written.clear();
        state.write_attempts = 0;
        state.pin_reads = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_writes() {
        let (board, handle) = MockBoard::new();

        board.write_block(0x33, 0x57, &[1, 2, 0, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
        board.write_block(0x33, 0x10, &[0]).await.unwrap();

        let written = handle.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].address, 0x33);
        assert_eq!(written[1].payload, vec![0]);

        let frames = handle.frames(&BusConfig::default()).unwrap();
        assert!(matches!(frames[0], BoardFrame::Order(_)));
        assert_eq!(frames[1], BoardFrame::Halt);
    }

    #[tokio::test]
    async fn test_injected_failure_is_sticky() {
        let (board, handle) = MockBoard::new();
        handle.fail_from_write(2);

        assert!(board.write_block(0x33, 0x10, &[0]).await.is_ok());
        assert!(board.write_block(0x33, 0x10, &[0]).await.is_err());
        assert!(board.write_block(0x33, 0x10, &[0]).await.is_err());

        assert_eq!(handle.write_attempts(), 3);
        assert_eq!(handle.written().len(), 1);

        handle.clear_write_failure();
        assert!(board.write_block(0x33, 0x10, &[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_ready_line_script_then_resting_level() {
        let (board, handle) = MockBoard::new();
        handle.script_ready_levels([PinLevel::High]);
        handle.set_resting_level(PinLevel::High);

        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::High);
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::High);

        handle.set_resting_level(PinLevel::Low);
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::Low);
        assert_eq!(handle.pin_reads(), 3);
    }

    #[tokio::test]
    async fn test_pin_fault() {
        let (board, handle) = MockBoard::new();
        handle.set_pin_fault(true);
        assert!(matches!(
            board.read_ready_line().await,
            Err(HardwareError::ReadyLine { .. })
        ));
    }
}
