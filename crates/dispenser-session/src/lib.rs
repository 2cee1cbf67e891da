//! Dispense sessions and the controller the UI talks to.
//!
//! - [`StateMachine`]: validated session states with transition history
//! - [`DispenseSession`]: one order, polled to completion on its own task
//! - [`DispenseController`]: menu refresh and single-order dispatch

pub mod controller;
pub mod session;
pub mod state_machine;

pub use controller::{
    CatalogProvider, DispenseController, MenuStatus, OrderHandle, StaticCatalog,
};
pub use session::{DispenseSession, HaltHandle, SessionEvent};
pub use state_machine::{DispenseState, FaultReason, StateMachine, StateTransition};
