//! Recipe compiler and wire format for the dispenser board.
//!
//! - [`frame`]: the 10-byte recipe and order frames and the 1-byte halt frame
//! - [`encoder`]: one recipe to 32 per-valve pump durations
//! - [`compiler`]: all active recipes to the 24-slot [`MenuTable`]

pub mod compiler;
pub mod encoder;
pub mod frame;

pub use compiler::{MenuCompiler, MenuTable};
pub use encoder::{CompileContext, EncodedRecipeSlot, RecipeEncoder};
pub use frame::{BoardFrame, HaltFrame, OrderFrame, RecipeFrame, RegisterDurations};
