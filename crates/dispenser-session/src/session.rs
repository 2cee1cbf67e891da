//! One drink order, from waiting for the board to delivery.
//!
//! A [`DispenseSession`] owns its order and state machine and runs as a
//! single task. It only suspends between ready line polls; a halt request
//! or the optional order deadline interrupts the wait immediately rather
//! than at the next poll.
//!
//! Completion is the busy-then-idle edge on the ready line. The board needs
//! a moment to raise its busy flag after accepting an order, so idle
//! readings before any busy reading are ignored.

use crate::state_machine::{DispenseState, FaultReason, StateMachine, StateTransition};
use chrono::{DateTime, Utc};
use dispenser_core::{DispenseOrder, Error, Result, SessionConfig};
use dispenser_hardware::{BoardLink, DispenseTransport};
use dispenser_protocol::OrderFrame;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// State change notification sent to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub order_id: Uuid,
    pub from: DispenseState,
    pub to: DispenseState,
    pub at: DateTime<Utc>,
}

impl SessionEvent {
    fn new(order_id: Uuid, transition: &StateTransition) -> Self {
        Self {
            order_id,
            from: transition.from,
            to: transition.to,
            at: Utc::now(),
        }
    }

    /// Whether this is the last event of the session.
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}

/// Cancels a running session.
///
/// Cloneable and usable from any task. Halting a session that has already
/// finished has no effect.
#[derive(Debug, Clone)]
pub struct HaltHandle {
    tx: Arc<watch::Sender<bool>>,
    order_id: Uuid,
}

impl HaltHandle {
    pub fn halt(&self) {
        warn!("Halt requested for order {}", self.order_id);
        self.tx.send_replace(true);
    }

    pub fn is_halted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Resolves once a halt has been requested. Never resolves if every
/// [`HaltHandle`] is dropped without halting.
async fn halt_requested(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|halted| *halted).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Drives one order through the board.
pub struct DispenseSession<T> {
    link: Arc<BoardLink<T>>,
    config: SessionConfig,
    order: DispenseOrder,
    machine: StateMachine,
    halt_rx: watch::Receiver<bool>,
    events: Option<mpsc::Sender<SessionEvent>>,
    order_sent: bool,
}

impl<T: DispenseTransport> DispenseSession<T> {
    /// Create a session in `Idle` together with its halt handle.
    pub fn new(
        link: Arc<BoardLink<T>>,
        config: SessionConfig,
        order: DispenseOrder,
    ) -> (Self, HaltHandle) {
        let (tx, halt_rx) = watch::channel(false);
        let halt = HaltHandle {
            tx: Arc::new(tx),
            order_id: order.id,
        };
        let session = Self {
            link,
            config,
            order,
            machine: StateMachine::new(),
            halt_rx,
            events: None,
            order_sent: false,
        };
        (session, halt)
    }

    /// Report every state change on `events`.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn order(&self) -> &DispenseOrder {
        &self.order
    }

    pub fn state(&self) -> &DispenseState {
        self.machine.current_state()
    }

    /// Run the session to a terminal state.
    ///
    /// If the order frame was already sent when a halt or timeout ends the
    /// session, a halt frame is sent to stop the pour.
    ///
    /// # Errors
    ///
    /// - `Error::UserAborted` if halted
    /// - `Error::Timeout` if the order deadline passed
    /// - `Error::TransmitFailed` if the bus or ready line failed (no retry)
    /// - `Error::HaltFailed` wrapping the abort or timeout if the halt frame
    ///   could not be sent; the board may still be pouring
    pub async fn run(mut self) -> Result<DispenseOrder> {
        info!("Starting {}", self.order);
        let started = Instant::now();
        let deadline = self.config.order_timeout().map(|timeout| started + timeout);

        match self.drive(started, deadline).await {
            Ok(()) => {
                self.enter(DispenseState::Done).await?;
                info!("{} delivered after {:?}", self.order, started.elapsed());
                Ok(self.order)
            }
            Err(mut e) => {
                let reason = FaultReason::from_error(&e);
                if self.order_sent && reason != FaultReason::TransmitFailed {
                    if let Err(halt_error) = self.link.send_halt().await {
                        error!("Failed to halt {}: {}", self.order, halt_error);
                        e = Error::HaltFailed {
                            fault: Box::new(e),
                            message: halt_error.to_string(),
                        };
                    }
                }
                if let Err(transition_error) = self.enter(DispenseState::Faulted(reason)).await {
                    error!("{}: {}", self.order, transition_error);
                }
                warn!("{} faulted: {}", self.order, e);
                Err(e)
            }
        }
    }

    async fn drive(&mut self, started: Instant, deadline: Option<Instant>) -> Result<()> {
        self.enter(DispenseState::AwaitingReady).await?;
        self.wait_until_ready(started, deadline).await?;

        self.enter(DispenseState::Transmitting).await?;
        let frame = OrderFrame::new(self.order.recipe_id, self.order.quantity);
        self.link.write_order_block(&frame).await?;
        self.order_sent = true;

        self.enter(DispenseState::AwaitingCompletion).await?;
        self.wait_until_poured(started, deadline).await
    }

    async fn wait_until_ready(&mut self, started: Instant, deadline: Option<Instant>) -> Result<()> {
        loop {
            self.check_halt()?;
            if self.link.read_ready_pin().await? {
                debug!("Board ready for {}", self.order);
                return Ok(());
            }
            self.pause(self.config.ready_poll_interval(), started, deadline)
                .await?;
        }
    }

    async fn wait_until_poured(&mut self, started: Instant, deadline: Option<Instant>) -> Result<()> {
        let mut seen_busy = false;
        loop {
            self.check_halt()?;
            let ready = self.link.read_ready_pin().await?;
            match (ready, seen_busy) {
                (false, false) => {
                    debug!("Board pouring {}", self.order);
                    seen_busy = true;
                }
                (true, true) => return Ok(()),
                (true, false) => trace!("Board has not raised busy yet"),
                (false, true) => {}
            }
            self.pause(self.config.completion_poll_interval(), started, deadline)
                .await?;
        }
    }

    fn check_halt(&self) -> Result<()> {
        if *self.halt_rx.borrow() {
            return Err(Error::UserAborted);
        }
        Ok(())
    }

    /// Wait one poll interval, unless halted or past the deadline first.
    async fn pause(
        &mut self,
        interval: Duration,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let phase = self.machine.current_state().to_string();
        let timeout = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = halt_requested(&mut self.halt_rx) => Err(Error::UserAborted),
            () = timeout => Err(Error::Timeout {
                phase,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }),
            () = sleep(interval) => Ok(()),
        }
    }

    async fn enter(&mut self, state: DispenseState) -> Result<()> {
        let transition = self.machine.transition_to(state)?;
        debug!("{}: {} -> {}", self.order, transition.from, transition.to);

        if let Some(events) = &self.events {
            let event = SessionEvent::new(self.order.id, &transition);
            if events.send(event).await.is_err() {
                trace!("Event receiver for {} dropped", self.order);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_core::{BusConfig, Quantity, RecipeId};
    use dispenser_hardware::mock::{MockBoard, MockBoardHandle};
    use dispenser_hardware::PinLevel;

    fn session() -> (DispenseSession<MockBoard>, HaltHandle, MockBoardHandle) {
        let (board, handle) = MockBoard::new();
        let link = Arc::new(BoardLink::new(board, BusConfig::default()));
        let order = DispenseOrder::new(RecipeId::new(2).unwrap(), Quantity::new(1).unwrap());
        let (session, halt) = DispenseSession::new(link, SessionConfig::default(), order);
        (session, halt, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_after_busy_then_ready() {
        let (session, _halt, board) = session();
        board.script_ready_levels([PinLevel::Low, PinLevel::High, PinLevel::Low]);

        let order = session.run().await.unwrap();

        assert_eq!(order.recipe_id.as_u8(), 2);
        assert_eq!(board.written().len(), 1);
        assert_eq!(board.pin_reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_before_start_sends_nothing() {
        let (session, halt, board) = session();
        halt.halt();
        assert!(halt.is_halted());

        let result = session.run().await;

        assert!(matches!(result, Err(Error::UserAborted)));
        assert!(board.written().is_empty());
        assert_eq!(board.pin_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_write_failure_is_not_retried() {
        let (session, _halt, board) = session();
        board.fail_from_write(1);

        let result = session.run().await;

        assert!(matches!(result, Err(Error::TransmitFailed { .. })));
        assert_eq!(board.write_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_halt_is_reported() {
        let (session, halt, board) = session();
        board.set_resting_level(PinLevel::High);
        board.script_ready_levels([PinLevel::Low]);

        let task = tokio::spawn(session.run());
        while board.written().is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        board.fail_from_write(2);
        halt.halt();

        let result = task.await.unwrap();

        match result {
            Err(Error::HaltFailed { fault, .. }) => assert!(matches!(*fault, Error::UserAborted)),
            other => panic!("expected HaltFailed, got {other:?}"),
        }
        assert_eq!(board.write_attempts(), 2);
        assert_eq!(board.written().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_line_failure_faults() {
        let (session, _halt, board) = session();
        board.set_pin_fault(true);

        assert!(matches!(
            session.run().await,
            Err(Error::TransmitFailed { .. })
        ));
        assert!(board.written().is_empty());
    }
}
