//! Entry point for the UI layer.
//!
//! The controller owns the board link and the catalog. It rebuilds and
//! uploads the menu when the catalog changes and runs at most one dispense
//! session at a time, reporting progress through an [`OrderHandle`].
//!
//! # Menu Status
//!
//! - A compile failure leaves the board and the status untouched: the
//!   previous menu stays active.
//! - An upload failure leaves the board with a mix of old and new slots.
//!   The status becomes `Inconsistent` and orders are refused until a full
//!   upload succeeds.

use crate::session::{DispenseSession, HaltHandle, SessionEvent};
use dispenser_core::{
    DispenseOrder, DispenserConfig, Error, InventoryMap, Quantity, Recipe, RecipeId, Result,
};
use dispenser_hardware::{BoardLink, DispenseTransport};
use dispenser_protocol::{CompileContext, MenuCompiler, MenuTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Buffer for session events; a session emits at most five.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Read-only source of recipes and inventory.
pub trait CatalogProvider: Send + Sync {
    /// Recipes that should be on the menu.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be read.
    fn active_recipes(&self) -> Result<Vec<Recipe>>;

    /// # Errors
    /// Returns an error if the inventory cannot be read.
    fn inventory(&self) -> Result<InventoryMap>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    recipes: Vec<Recipe>,
    inventory: InventoryMap,
}

impl StaticCatalog {
    pub fn new(recipes: Vec<Recipe>, inventory: InventoryMap) -> Self {
        Self { recipes, inventory }
    }

    pub fn set_recipes(&mut self, recipes: Vec<Recipe>) {
        self.recipes = recipes;
    }

    pub fn set_inventory(&mut self, inventory: InventoryMap) {
        self.inventory = inventory;
    }
}

impl CatalogProvider for StaticCatalog {
    fn active_recipes(&self) -> Result<Vec<Recipe>> {
        Ok(self.recipes.clone())
    }

    fn inventory(&self) -> Result<InventoryMap> {
        Ok(self.inventory.clone())
    }
}

/// What the board is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuStatus {
    /// Nothing uploaded since startup.
    Unloaded,
    /// The last upload completed.
    Loaded,
    /// An upload failed part way.
    Inconsistent,
}

impl fmt::Display for MenuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuStatus::Unloaded => write!(f, "unloaded"),
            MenuStatus::Loaded => write!(f, "loaded"),
            MenuStatus::Inconsistent => write!(f, "inconsistent"),
        }
    }
}

/// A running order.
#[derive(Debug)]
pub struct OrderHandle {
    order: DispenseOrder,
    halt: HaltHandle,
    events: mpsc::Receiver<SessionEvent>,
    task: JoinHandle<Result<DispenseOrder>>,
}

impl OrderHandle {
    pub fn order(&self) -> &DispenseOrder {
        &self.order
    }

    /// Stop the order. The board is told to stop pouring if it already
    /// received the order.
    pub fn halt(&self) {
        self.halt.halt();
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Next state change, or `None` once the session has finished and all
    /// events were read.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Wait for the session to finish.
    ///
    /// # Errors
    /// Returns the error that faulted the session, or
    /// `Error::SessionAborted` if the session task panicked or was cancelled.
    pub async fn wait(self) -> Result<DispenseOrder> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                let cause = if e.is_panic() { "panicked" } else { "was cancelled" };
                error!("Session task for order {} {}: {}", self.order.id, cause, e);
                Err(Error::SessionAborted(format!(
                    "session task for order {} {cause}",
                    self.order.id
                )))
            }
        }
    }
}

/// Menu upload and order dispatch for one board.
///
/// # Examples
///
/// ```
/// use dispenser_core::{
///     DispenserConfig, InventoryMap, InventorySlot, Quantity, Recipe, RecipeId, SlotIndex,
/// };
/// use dispenser_hardware::mock::SimulatedBoard;
/// use dispenser_session::{DispenseController, MenuStatus, StaticCatalog};
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() -> dispenser_core::Result<()> {
///     let config = DispenserConfig::default();
///     let (board, _handle) = SimulatedBoard::new(config.bus, config.pump);
///
///     let inventory = InventoryMap::new(vec![
///         InventorySlot::new(SlotIndex::new(1)?, "rum", 25.0, 25.0)?,
///         InventorySlot::new(SlotIndex::new(9)?, "cola", 64.0, 64.0)?,
///     ])?;
///     let recipes = vec![
///         Recipe::new(RecipeId::new(0)?, "Cuba Libre")
///             .with_ingredient("rum", 1.5)
///             .with_ingredient("cola", 4.0),
///     ];
///
///     let mut controller =
///         DispenseController::new(board, StaticCatalog::new(recipes, inventory), config)?;
///     assert_eq!(controller.refresh_menu().await?, MenuStatus::Loaded);
///
///     let order = controller.place_order(RecipeId::new(0)?, Quantity::new(1)?)?;
///     order.wait().await?;
///     Ok(())
/// }
/// ```
pub struct DispenseController<T, C> {
    link: Arc<BoardLink<T>>,
    catalog: C,
    config: DispenserConfig,
    menu: Option<MenuTable>,
    /// Recipe ids compiled into `menu`.
    menu_recipes: BTreeSet<RecipeId>,
    status: MenuStatus,
    active: Arc<Mutex<()>>,
}

impl<T, C> DispenseController<T, C>
where
    T: DispenseTransport + 'static,
    C: CatalogProvider,
{
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(transport: T, catalog: C, config: DispenserConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Dispenser controller on {} at {:#04x}",
            transport.name(),
            config.bus.board_address
        );
        Ok(Self {
            link: Arc::new(BoardLink::new(transport, config.bus)),
            catalog,
            config,
            menu: None,
            menu_recipes: BTreeSet::new(),
            status: MenuStatus::Unloaded,
            active: Arc::new(Mutex::new(())),
        })
    }

    pub fn link(&self) -> &BoardLink<T> {
        &self.link
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Change the catalog. Call [`refresh_menu`](Self::refresh_menu) afterwards.
    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn status(&self) -> MenuStatus {
        self.status
    }

    /// The table last uploaded in full, if any.
    pub fn menu(&self) -> Option<&MenuTable> {
        self.menu.as_ref()
    }

    /// Whether an order is in progress.
    pub fn is_busy(&self) -> bool {
        self.active.try_lock().is_err()
    }

    /// Compile the catalog and upload it to the board.
    ///
    /// # Errors
    /// - `Error::SessionBusy` while an order is in progress
    /// - any compile error; the previous menu stays active
    /// - `Error::TransmitFailed` if the upload fails; the menu becomes
    ///   `Inconsistent`
    pub async fn refresh_menu(&mut self) -> Result<MenuStatus> {
        let recipes = self.catalog.active_recipes()?;
        let inventory = self.catalog.inventory()?;

        for slot in inventory.low_stock() {
            warn!(
                "Slot {} '{}' is {} ({:.0}% left)",
                slot.slot,
                slot.ingredient,
                slot.stock_level(),
                slot.ratio_left() * 100.0
            );
        }

        let context = CompileContext::new(inventory, self.config.pump);
        let table = match MenuCompiler::new(&context).compile(&recipes) {
            Ok(table) => table,
            Err(e) => {
                error!("Menu compile failed, keeping {} menu: {}", self.status, e);
                return Err(e);
            }
        };

        let ids = recipes.iter().map(|recipe| recipe.id).collect();
        self.upload(table, ids).await
    }

    /// Upload the board wiring check pattern instead of the catalog.
    ///
    /// # Errors
    /// Same as [`refresh_menu`](Self::refresh_menu), minus compile errors.
    pub async fn upload_test_pattern(&mut self) -> Result<MenuStatus> {
        info!("Uploading board test pattern");
        self.upload(MenuTable::test_pattern(), BTreeSet::new()).await
    }

    async fn upload(
        &mut self,
        table: MenuTable,
        recipes: BTreeSet<RecipeId>,
    ) -> Result<MenuStatus> {
        let _slot = Arc::clone(&self.active)
            .try_lock_owned()
            .map_err(|_| Error::SessionBusy)?;

        match self.link.initialize_menu(&table).await {
            Ok(()) => {
                self.menu = Some(table);
                self.menu_recipes = recipes;
                self.status = MenuStatus::Loaded;
                Ok(self.status)
            }
            Err(e) => {
                self.menu = None;
                self.menu_recipes.clear();
                self.status = MenuStatus::Inconsistent;
                Err(e)
            }
        }
    }

    /// Start dispensing an order.
    ///
    /// The session runs on its own task; the returned handle reports its
    /// progress and can halt it.
    ///
    /// # Errors
    /// - `Error::MenuNotLoaded` unless the last upload completed
    /// - `Error::InvalidRecipeId` if the slot pours nothing, either because
    ///   no recipe was compiled into it or because every volume rounded
    ///   down to zero steps
    /// - `Error::SessionBusy` if another order is in progress
    pub fn place_order(&self, recipe_id: RecipeId, quantity: Quantity) -> Result<OrderHandle> {
        let menu = match (&self.menu, self.status) {
            (Some(menu), MenuStatus::Loaded) => menu,
            _ => return Err(Error::MenuNotLoaded(format!("board menu is {}", self.status))),
        };
        if menu.slot(recipe_id).is_empty() {
            let reason = if self.menu_recipes.contains(&recipe_id) {
                "pours nothing"
            } else {
                "is not on the menu"
            };
            return Err(Error::InvalidRecipeId(format!("recipe {recipe_id} {reason}")));
        }

        let slot = Arc::clone(&self.active)
            .try_lock_owned()
            .map_err(|_| Error::SessionBusy)?;

        let order = DispenseOrder::new(recipe_id, quantity);
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (session, halt) =
            DispenseSession::new(Arc::clone(&self.link), self.config.session, order.clone());
        let session = session.with_events(tx);

        let task = tokio::spawn(async move {
            let _slot = slot;
            session.run().await
        });

        Ok(OrderHandle {
            order,
            halt,
            events,
            task,
        })
    }
}
