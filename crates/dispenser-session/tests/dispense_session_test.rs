//! Dispense session behavior against a scripted board.

mod common;

use common::{order, spawn_session};
use dispenser_core::{BusConfig, Error, SessionConfig};
use dispenser_hardware::PinLevel;
use dispenser_protocol::BoardFrame;
use dispenser_session::{DispenseState, FaultReason};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_board_never_ready_waits_until_halted() {
    let mut session = spawn_session(SessionConfig::default(), order(0, 1));
    session.board.set_resting_level(PinLevel::High);

    session.wait_for_state(DispenseState::AwaitingReady).await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Still waiting: no further transitions, nothing sent, still polling.
    assert!(session.drain_events().is_empty());
    assert!(!session.task.is_finished());
    assert!(session.board.written().is_empty());
    assert!(session.board.pin_reads() >= 100);

    session.halt.halt();
    let events = session.wait_for_state(DispenseState::Faulted(FaultReason::UserAborted)).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(session.task.await.unwrap(), Err(Error::UserAborted)));

    // The board never got the order, so there is nothing to halt.
    assert!(session.board.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_halt_while_pouring_faults_and_stops_board() {
    let mut session = spawn_session(SessionConfig::default(), order(3, 2));
    session.board.script_ready_levels([PinLevel::Low]);
    session.board.set_resting_level(PinLevel::High);

    session.wait_for_state(DispenseState::AwaitingCompletion).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    session.halt.halt();

    let events = session
        .wait_for_state(DispenseState::Faulted(FaultReason::UserAborted))
        .await;
    assert!(events.iter().all(|event| event.to != DispenseState::Done));
    assert!(matches!(session.task.await.unwrap(), Err(Error::UserAborted)));

    let frames = session.board.frames(&BusConfig::default()).unwrap();
    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[0], BoardFrame::Order(o) if o.recipe_id.as_u8() == 3 && o.quantity.as_u8() == 2));
    assert_eq!(frames[1], BoardFrame::Halt);
}

#[tokio::test(start_paused = true)]
async fn test_ready_before_busy_is_not_completion() {
    let mut session = spawn_session(SessionConfig::default(), order(1, 1));
    // ready, then the board has not raised busy yet, then pours, then done
    session.board.script_ready_levels([
        PinLevel::Low,
        PinLevel::Low,
        PinLevel::Low,
        PinLevel::High,
        PinLevel::High,
        PinLevel::Low,
    ]);

    let events = session.wait_for_state(DispenseState::Done).await;
    let states: Vec<_> = events.iter().map(|event| event.to).collect();
    assert_eq!(
        states,
        vec![
            DispenseState::AwaitingReady,
            DispenseState::Transmitting,
            DispenseState::AwaitingCompletion,
            DispenseState::Done,
        ]
    );
    assert!(session.task.await.unwrap().is_ok());
    assert_eq!(session.board.pin_reads(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_ready_before_sending() {
    let mut session = spawn_session(SessionConfig::default(), order(1, 1));
    session.board.script_ready_levels([
        PinLevel::High,
        PinLevel::High,
        PinLevel::High,
        PinLevel::Low,
        PinLevel::High,
        PinLevel::Low,
    ]);

    session.wait_for_state(DispenseState::Transmitting).await;
    assert_eq!(session.board.pin_reads(), 4);

    session.wait_for_state(DispenseState::Done).await;
    assert_eq!(session.board.written().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_order_timeout_faults() {
    let config = SessionConfig {
        order_timeout_ms: Some(5_000),
        ..SessionConfig::default()
    };
    let mut session = spawn_session(config, order(0, 1));
    session.board.set_resting_level(PinLevel::High);

    session
        .wait_for_state(DispenseState::Faulted(FaultReason::Timeout))
        .await;

    match session.task.await.unwrap() {
        Err(Error::Timeout { phase, elapsed_ms }) => {
            assert_eq!(phase, "AwaitingReady");
            assert!(elapsed_ms >= 5_000);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(session.board.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_while_pouring_halts_board() {
    let config = SessionConfig {
        order_timeout_ms: Some(10_000),
        ..SessionConfig::default()
    };
    let mut session = spawn_session(config, order(0, 1));
    session.board.script_ready_levels([PinLevel::Low]);
    session.board.set_resting_level(PinLevel::High);

    session
        .wait_for_state(DispenseState::Faulted(FaultReason::Timeout))
        .await;

    let frames = session.board.frames(&BusConfig::default()).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1], BoardFrame::Halt);
}

#[tokio::test(start_paused = true)]
async fn test_transmit_failure_is_distinguishable_fault() {
    let mut session = spawn_session(SessionConfig::default(), order(0, 1));
    session.board.fail_from_write(1);

    session
        .wait_for_state(DispenseState::Faulted(FaultReason::TransmitFailed))
        .await;

    assert!(matches!(
        session.task.await.unwrap(),
        Err(Error::TransmitFailed { .. })
    ));
    // One attempt, no retry, no halt attempt.
    assert_eq!(session.board.write_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_carry_order_id() {
    let order = order(0, 1);
    let id = order.id;
    let mut session = spawn_session(SessionConfig::default(), order);
    session
        .board
        .script_ready_levels([PinLevel::Low, PinLevel::High, PinLevel::Low]);

    let events = session.wait_for_state(DispenseState::Done).await;
    assert!(events.iter().all(|event| event.order_id == id));
    assert!(events.last().unwrap().is_terminal());
    assert_eq!(events[0].from, DispenseState::Idle);
}
