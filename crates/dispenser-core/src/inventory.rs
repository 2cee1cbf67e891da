//! Inventory slots and the ingredient-to-valve map.
//!
//! Each inventory slot is one bottle or bag wired to one valve. The recipe
//! encoder only needs to know which slot an ingredient lives in; the stock
//! level is reported so operators can be warned before a bottle runs dry.

use crate::{
    Result,
    constants::{LOW_STOCK_RATIO, VALVE_COUNT},
    error::Error,
    types::SlotIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How much of an inventory item is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// At least half of the original volume is left.
    Ok,
    /// Less than half is left.
    Low,
    /// Nothing is left.
    Empty,
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Low => write!(f, "low"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// One ingredient container wired to one valve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub slot: SlotIndex,
    pub ingredient: String,
    /// Volume left, in ounces.
    pub current_volume: f64,
    /// Volume when the container was full, in ounces.
    pub original_volume: f64,
}

impl InventorySlot {
    /// Create a slot, validating the volumes.
    ///
    /// # Errors
    /// Returns `Error::InvalidInventory` if the ingredient name is blank,
    /// `original_volume` is not positive, or `current_volume` is negative or
    /// larger than `original_volume`.
    pub fn new(
        slot: SlotIndex,
        ingredient: impl Into<String>,
        current_volume: f64,
        original_volume: f64,
    ) -> Result<Self> {
        let item = Self {
            slot,
            ingredient: ingredient.into(),
            current_volume,
            original_volume,
        };
        item.validate()?;
        Ok(item)
    }

    /// Check the slot invariants.
    ///
    /// # Errors
    /// See [`InventorySlot::new`].
    pub fn validate(&self) -> Result<()> {
        if self.ingredient.trim().is_empty() {
            return Err(Error::InvalidInventory(format!(
                "slot {} has no ingredient name",
                self.slot
            )));
        }
        if !self.original_volume.is_finite() || self.original_volume <= 0.0 {
            return Err(Error::InvalidInventory(format!(
                "slot {} ('{}') original volume must be positive, got {}",
                self.slot, self.ingredient, self.original_volume
            )));
        }
        if !self.current_volume.is_finite()
            || self.current_volume < 0.0
            || self.current_volume > self.original_volume
        {
            return Err(Error::InvalidInventory(format!(
                "slot {} ('{}') current volume {} outside 0..={}",
                self.slot, self.ingredient, self.current_volume, self.original_volume
            )));
        }
        Ok(())
    }

    /// Fraction of the original volume left (0.0-1.0).
    #[must_use]
    pub fn ratio_left(&self) -> f64 {
        if self.original_volume <= 0.0 {
            return 0.0;
        }
        self.current_volume / self.original_volume
    }

    #[must_use]
    pub fn stock_level(&self) -> StockLevel {
        let ratio = self.ratio_left();
        if ratio <= 0.0 {
            StockLevel::Empty
        } else if ratio < LOW_STOCK_RATIO {
            StockLevel::Low
        } else {
            StockLevel::Ok
        }
    }
}

/// Lookup from ingredient name to the slot it is wired to.
///
/// Built once from the inventory provider's slot list and read-only
/// afterwards. Names are matched exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryMap {
    slots: Vec<InventorySlot>,
    by_name: HashMap<String, SlotIndex>,
}

impl InventoryMap {
    /// Build the map from a list of slots.
    ///
    /// # Errors
    /// Returns `Error::InvalidInventory` if any slot is invalid, a slot index
    /// is used twice, or an ingredient name is used twice.
    pub fn new(slots: impl IntoIterator<Item = InventorySlot>) -> Result<Self> {
        let mut sorted: Vec<InventorySlot> = slots.into_iter().collect();
        if sorted.len() > VALVE_COUNT {
            return Err(Error::InvalidInventory(format!(
                "{} slots given, board has {VALVE_COUNT} valves",
                sorted.len()
            )));
        }
        sorted.sort_by_key(|item| item.slot);

        let mut by_name = HashMap::with_capacity(sorted.len());
        for (i, item) in sorted.iter().enumerate() {
            item.validate()?;
            if i > 0 && sorted[i - 1].slot == item.slot {
                return Err(Error::InvalidInventory(format!(
                    "slot {} assigned twice",
                    item.slot
                )));
            }
            if by_name.insert(item.ingredient.clone(), item.slot).is_some() {
                return Err(Error::InvalidInventory(format!(
                    "ingredient '{}' wired to more than one slot",
                    item.ingredient
                )));
            }
        }

        Ok(Self {
            slots: sorted,
            by_name,
        })
    }

    /// Slot index wired to `ingredient`, if any.
    #[must_use]
    pub fn slot_for(&self, ingredient: &str) -> Option<SlotIndex> {
        self.by_name.get(ingredient).copied()
    }

    #[must_use]
    pub fn get(&self, slot: SlotIndex) -> Option<&InventorySlot> {
        self.slots
            .binary_search_by_key(&slot, |item| item.slot)
            .ok()
            .map(|i| &self.slots[i])
    }

    /// Slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &InventorySlot> {
        self.slots.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots that are low or empty.
    #[must_use]
    pub fn low_stock(&self) -> Vec<&InventorySlot> {
        self.slots
            .iter()
            .filter(|item| item.stock_level() != StockLevel::Ok)
            .collect()
    }
}
