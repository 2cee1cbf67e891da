//! Shared fixtures for session and controller tests.

#![allow(dead_code)]

use dispenser_core::{
    BusConfig, DispenseOrder, InventoryMap, InventorySlot, Quantity, Recipe, RecipeId,
    SessionConfig, SlotIndex,
};
use dispenser_hardware::{
    BoardLink,
    mock::{MockBoard, MockBoardHandle},
};
use dispenser_session::{DispenseSession, DispenseState, HaltHandle, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Send logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn inventory() -> InventoryMap {
    InventoryMap::new(vec![
        InventorySlot::new(SlotIndex::new(1).unwrap(), "rum", 25.0, 25.0).unwrap(),
        InventorySlot::new(SlotIndex::new(2).unwrap(), "gin", 10.0, 25.0).unwrap(),
        InventorySlot::new(SlotIndex::new(9).unwrap(), "cola", 64.0, 64.0).unwrap(),
        InventorySlot::new(SlotIndex::new(10).unwrap(), "tonic", 64.0, 64.0).unwrap(),
    ])
    .unwrap()
}

pub fn recipes() -> Vec<Recipe> {
    vec![
        Recipe::new(RecipeId::new(0).unwrap(), "Cuba Libre")
            .with_ingredient("rum", 1.5)
            .with_ingredient("cola", 4.0),
        Recipe::new(RecipeId::new(1).unwrap(), "Gin & Tonic")
            .with_ingredient("gin", 1.5)
            .with_ingredient("tonic", 4.0),
    ]
}

pub fn order(recipe: u8, quantity: u8) -> DispenseOrder {
    DispenseOrder::new(
        RecipeId::new(recipe).unwrap(),
        Quantity::new(quantity).unwrap(),
    )
}

/// A session on a mock board, spawned, with its event stream.
pub struct RunningSession {
    pub board: MockBoardHandle,
    pub halt: HaltHandle,
    pub events: mpsc::Receiver<SessionEvent>,
    pub task: JoinHandle<dispenser_core::Result<DispenseOrder>>,
}

impl RunningSession {
    /// Read events until the session reaches `state`.
    pub async fn wait_for_state(&mut self, state: DispenseState) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        while let Some(event) = self.events.recv().await {
            let reached = event.to == state;
            seen.push(event);
            if reached {
                return seen;
            }
        }
        panic!("session ended before reaching {state}; saw {seen:?}");
    }

    /// Every event still buffered, without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn spawn_session(config: SessionConfig, order: DispenseOrder) -> RunningSession {
    init_tracing();
    let (mock, board) = MockBoard::new();
    let link = Arc::new(BoardLink::new(mock, BusConfig::default()));
    let (tx, events) = mpsc::channel(16);
    let (session, halt) = DispenseSession::new(link, config, order);
    let task = tokio::spawn(session.with_events(tx).run());

    RunningSession {
        board,
        halt,
        events,
        task,
    }
}
