//! Simulated dispenser board.
//!
//! Stands in for the firmware when no board is attached. It accepts the same
//! frames on the same registers, keeps the uploaded recipe table and, after
//! an order, drives its ready line high for as long as the pour would take.
//! All valves of a recipe run together, so one drink takes as long as its
//! longest valve; drinks of one order are poured one after another.

use crate::{
    HardwareError, Result,
    traits::{DispenseTransport, PinLevel, TransportKind},
};
use dispenser_core::{
    BusConfig, PumpCalibration,
    constants::{MAX_RECIPES, REGISTER_COUNT},
};
use dispenser_protocol::{BoardFrame, OrderFrame, RegisterDurations};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shortest time the board reports busy after accepting an order.
pub const DEFAULT_MIN_POUR: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct SimulatedState {
    registers: [[RegisterDurations; REGISTER_COUNT]; MAX_RECIPES],
    recipe_frames: usize,
    orders: Vec<OrderFrame>,
    halts: usize,
    busy_until: Option<Instant>,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            registers: [[[0; 8]; REGISTER_COUNT]; MAX_RECIPES],
            recipe_frames: 0,
            orders: Vec::new(),
            halts: 0,
            busy_until: None,
        }
    }
}

type SharedState = Arc<Mutex<SimulatedState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process board that pours in simulated time.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    state: SharedState,
    bus: BusConfig,
    calibration: PumpCalibration,
    min_pour: Duration,
    name: String,
}

impl SimulatedBoard {
    pub fn new(bus: BusConfig, calibration: PumpCalibration) -> (Self, SimulatedBoardHandle) {
        let state = SharedState::default();
        let board = Self {
            state: Arc::clone(&state),
            bus,
            calibration,
            min_pour: DEFAULT_MIN_POUR,
            name: "Simulated Board".to_string(),
        };
        (board, SimulatedBoardHandle { state })
    }

    /// Set the shortest busy period after an order.
    #[must_use]
    pub fn with_min_pour(mut self, min_pour: Duration) -> Self {
        self.min_pour = min_pour;
        self
    }

    fn pour_time(&self, state: &SimulatedState, order: &OrderFrame) -> Duration {
        let longest_valve = state.registers[order.recipe_id.as_usize()]
            .iter()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0);
        let per_drink =
            Duration::from_secs_f64(f64::from(longest_valve) * self.calibration.time_resolution_seconds());
        (per_drink * u32::from(order.quantity.as_u8())).max(self.min_pour)
    }
}

impl DispenseTransport for SimulatedBoard {
    async fn write_block(&self, address: u8, register: u8, payload: &[u8]) -> Result<()> {
        if address != self.bus.board_address {
            return Err(HardwareError::disconnected(format!(
                "no device at address {address:#04x}"
            )));
        }

        let frame = BoardFrame::decode(&self.bus, register, payload)
            .map_err(|e| HardwareError::invalid_frame(e.to_string()))?;

        let mut state = lock(&self.state);
        match frame {
            BoardFrame::Recipe(recipe) => {
                state.registers[recipe.recipe_id.as_usize()][recipe.register.as_usize()] =
                    recipe.durations;
                state.recipe_frames += 1;
            }
            BoardFrame::Order(order) => {
                let now = Instant::now();
                if state.busy_until.is_some_and(|until| until > now) {
                    warn!("Simulated board received {} while pouring", frame);
                }
                let pour = self.pour_time(&state, &order);
                info!(
                    "Simulated board pouring recipe {} x{} for {:?}",
                    order.recipe_id, order.quantity, pour
                );
                state.busy_until = Some(now + pour);
                state.orders.push(order);
            }
            BoardFrame::Halt => {
                debug!("Simulated board halted");
                state.busy_until = None;
                state.halts += 1;
            }
        }
        Ok(())
    }

    async fn read_ready_line(&self) -> Result<PinLevel> {
        let state = lock(&self.state);
        let busy = state
            .busy_until
            .is_some_and(|until| Instant::now() < until);
        Ok(PinLevel::from_high(busy))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Simulated
    }
}

/// Observer for a [`SimulatedBoard`].
#[derive(Debug, Clone)]
pub struct SimulatedBoardHandle {
    state: SharedState,
}

impl SimulatedBoardHandle {
    /// Recipe frames received since creation.
    pub fn recipe_frames_received(&self) -> usize {
        lock(&self.state).recipe_frames
    }

    /// Durations the board currently holds for one recipe register.
    pub fn stored_durations(&self, recipe: usize, register: usize) -> Option<RegisterDurations> {
        lock(&self.state)
            .registers
            .get(recipe)
            .and_then(|registers| registers.get(register))
            .copied()
    }

    pub fn orders(&self) -> Vec<OrderFrame> {
        lock(&self.state).orders.clone()
    }

    pub fn halts(&self) -> usize {
        lock(&self.state).halts
    }

    pub fn is_pouring(&self) -> bool {
        lock(&self.state)
            .busy_until
            .is_some_and(|until| Instant::now() < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_core::{Quantity, RecipeId, RegisterIndex};
    use dispenser_protocol::RecipeFrame;

    fn board() -> (SimulatedBoard, SimulatedBoardHandle) {
        SimulatedBoard::new(BusConfig::default(), PumpCalibration::default())
    }

    fn order(recipe: u8, quantity: u8) -> [u8; 10] {
        OrderFrame::new(RecipeId::new(recipe).unwrap(), Quantity::new(quantity).unwrap()).to_bytes()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pours_for_longest_valve() {
        let (board, handle) = board();
        // 128 steps * 30/256 s = 15 s per drink
        let frame = RecipeFrame::new(
            RecipeId::new(4).unwrap(),
            RegisterIndex::new(2).unwrap(),
            [0, 128, 10, 0, 0, 0, 0, 0],
        );
        board.write_block(0x33, 0x39, &frame.to_bytes()).await.unwrap();
        assert_eq!(handle.stored_durations(4, 2), Some([0, 128, 10, 0, 0, 0, 0, 0]));

        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::Low);
        board.write_block(0x33, 0x57, &order(4, 2)).await.unwrap();
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::High);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(handle.is_pouring());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::Low);
        assert_eq!(handle.orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_slot_still_reports_busy_briefly() {
        let (board, _handle) = board();
        let board = board.with_min_pour(Duration::from_millis(500));

        board.write_block(0x33, 0x57, &order(9, 1)).await.unwrap();
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::High);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(board.read_ready_line().await.unwrap(), PinLevel::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_stops_pour() {
        let (board, handle) = board();
        board.write_block(0x33, 0x57, &order(0, 1)).await.unwrap();
        assert!(handle.is_pouring());

        board.write_block(0x33, 0x10, &[0]).await.unwrap();
        assert!(!handle.is_pouring());
        assert_eq!(handle.halts(), 1);
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let (board, _handle) = board();
        assert!(matches!(
            board.write_block(0x33, 0x20, &[0; 10]).await,
            Err(HardwareError::InvalidFrame { .. })
        ));
        assert!(matches!(
            board.write_block(0x34, 0x57, &order(0, 1)).await,
            Err(HardwareError::Disconnected { .. })
        ));
    }
}
