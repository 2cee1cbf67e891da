//! Dispense session state machine.
//!
//! # States
//!
//! - `Idle`: order accepted, nothing sent yet
//! - `AwaitingReady`: polling until the board reports idle
//! - `Transmitting`: order frame on the bus
//! - `AwaitingCompletion`: polling until the board has poured
//! - `Done`: drink delivered (terminal)
//! - `Faulted`: transmit failure, halt or timeout (terminal)
//!
//! # Valid Transitions
//!
//! ```text
//! Idle -> AwaitingReady -> Transmitting -> AwaitingCompletion -> Done
//!   \__________\______________\________________\_______________-> Faulted
//! ```
//!
//! ```
//! use dispenser_session::{DispenseState, FaultReason, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(DispenseState::AwaitingReady).unwrap();
//! machine
//!     .transition_to(DispenseState::Faulted(FaultReason::UserAborted))
//!     .unwrap();
//!
//! assert!(machine.current_state().is_terminal());
//! assert!(machine.transition_to(DispenseState::Idle).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use dispenser_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// A complete session is five transitions, so this covers the whole life of
/// any session with room to spare.
const MAX_HISTORY_SIZE: usize = 32;

/// Why a session ended without delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultReason {
    /// A bus write or ready line read failed.
    TransmitFailed,
    /// The operator halted the order.
    UserAborted,
    /// The configured order timeout elapsed.
    Timeout,
}

impl FaultReason {
    /// Classify the error that ended a session.
    ///
    /// Anything that is not a halt or a timeout came from talking to the
    /// board.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::UserAborted => Self::UserAborted,
            Error::Timeout { .. } => Self::Timeout,
            Error::HaltFailed { fault, .. } => Self::from_error(fault),
            _ => Self::TransmitFailed,
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FaultReason::TransmitFailed => "TransmitFailed",
            FaultReason::UserAborted => "UserAborted",
            FaultReason::Timeout => "Timeout",
        };
        write!(f, "{}", reason)
    }
}

/// Phase of one dispense session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispenseState {
    Idle,
    AwaitingReady,
    Transmitting,
    AwaitingCompletion,
    Done,
    Faulted(FaultReason),
}

impl fmt::Display for DispenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispenseState::Idle => write!(f, "Idle"),
            DispenseState::AwaitingReady => write!(f, "AwaitingReady"),
            DispenseState::Transmitting => write!(f, "Transmitting"),
            DispenseState::AwaitingCompletion => write!(f, "AwaitingCompletion"),
            DispenseState::Done => write!(f, "Done"),
            DispenseState::Faulted(reason) => write!(f, "Faulted({})", reason),
        }
    }
}

impl DispenseState {
    /// Check if transition to target state is valid from this state.
    ///
    /// ```
    /// use dispenser_session::{DispenseState, FaultReason};
    ///
    /// assert!(DispenseState::Idle.can_transition_to(&DispenseState::AwaitingReady));
    /// assert!(!DispenseState::AwaitingReady.can_transition_to(&DispenseState::Done));
    /// assert!(DispenseState::Transmitting
    ///     .can_transition_to(&DispenseState::Faulted(FaultReason::TransmitFailed)));
    /// ```
    pub fn can_transition_to(&self, target: &DispenseState) -> bool {
        matches!(
            (self, target),
            (DispenseState::Idle, DispenseState::AwaitingReady)
                | (DispenseState::AwaitingReady, DispenseState::Transmitting)
                | (DispenseState::Transmitting, DispenseState::AwaitingCompletion)
                | (DispenseState::AwaitingCompletion, DispenseState::Done)
                | (
                    DispenseState::Idle
                        | DispenseState::AwaitingReady
                        | DispenseState::Transmitting
                        | DispenseState::AwaitingCompletion,
                    DispenseState::Faulted(_)
                )
        )
    }

    /// `Done` and `Faulted` end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispenseState::Done | DispenseState::Faulted(_))
    }
}

/// Represents a single state transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DispenseState,
    pub to: DispenseState,

    /// Not serialized; set to the time of deserialization.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: DispenseState, to: DispenseState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Validated state holder for one dispense session.
///
/// Not thread-safe; a session owns its machine.
#[derive(Debug)]
pub struct StateMachine {
    current_state: DispenseState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: DispenseState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &DispenseState {
        &self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// allowed from the current state. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: DispenseState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition.clone());
        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;

        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
