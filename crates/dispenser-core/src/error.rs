use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Compile errors
    #[error("Recipe '{recipe}' uses unknown ingredient '{ingredient}'")]
    UnknownIngredient { recipe: String, ingredient: String },

    #[error(
        "Recipe '{recipe}' needs {units} pump steps of '{ingredient}', more than one byte can hold"
    )]
    DurationOverflow {
        recipe: String,
        ingredient: String,
        units: u64,
    },

    #[error("Too many active recipes: {count} (board holds {max})")]
    TooManyRecipes { count: usize, max: usize },

    #[error("Duplicate recipe id: {0}")]
    DuplicateRecipeId(u8),

    #[error("Invalid volume for '{ingredient}': {ounces} oz")]
    InvalidVolume { ingredient: String, ounces: f64 },

    // Wire errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // Validation errors
    #[error("Invalid slot index: {0}")]
    InvalidSlotIndex(String),

    #[error("Invalid register index: {0}")]
    InvalidRegisterIndex(u8),

    #[error("Invalid recipe id: {0}")]
    InvalidRecipeId(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid inventory: {0}")]
    InvalidInventory(String),

    // Dispense errors
    #[error("Transmit failed: {message}")]
    TransmitFailed { message: String },

    #[error("Dispense aborted by user")]
    UserAborted,

    #[error("Timed out in {phase} after {elapsed_ms}ms")]
    Timeout { phase: String, elapsed_ms: u64 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("A dispense session is already running")]
    SessionBusy,

    #[error("Dispense session ended unexpectedly: {0}")]
    SessionAborted(String),

    #[error("{fault}; halt frame failed, the board may still be pouring: {message}")]
    HaltFailed {
        #[source]
        fault: Box<Error>,
        message: String,
    },

    #[error("Menu is not loaded on the board: {0}")]
    MenuNotLoaded(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a transmit failure from any displayable transport error.
    pub fn transmit_failed(message: impl Into<String>) -> Self {
        Self::TransmitFailed {
            message: message.into(),
        }
    }

    /// Whether this error comes from building the menu rather than from
    /// talking to the board.
    ///
    /// Compile errors block dispensing entirely and keep the previous menu
    /// active; dispense errors only fail the current order.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownIngredient { .. }
                | Self::DurationOverflow { .. }
                | Self::TooManyRecipes { .. }
                | Self::DuplicateRecipeId(_)
                | Self::InvalidVolume { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
