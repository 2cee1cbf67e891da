use crate::{
    Result,
    constants::{
        MAX_RECIPE_ID, MAX_SLOT_INDEX, MIN_SLOT_INDEX, REGISTER_COUNT, VALVES_PER_REGISTER,
    },
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Inventory slot / valve number (1-32)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Create a new slot index with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotIndex` if the index is outside 1-32.
    pub fn new(index: u8) -> Result<Self> {
        if !(MIN_SLOT_INDEX..=MAX_SLOT_INDEX).contains(&index) {
            return Err(Error::InvalidSlotIndex(format!(
                "slot must be {MIN_SLOT_INDEX}-{MAX_SLOT_INDEX}, got {index}"
            )));
        }
        Ok(SlotIndex(index))
    }

    /// Get the raw 1-based slot number.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Valve position this slot is wired to.
    ///
    /// Slots 1-8 map to register 0, 9-16 to register 1, 17-24 to register 2
    /// and 25-32 to register 3. Within a register the offset is
    /// `(slot - 1) mod 8`.
    #[must_use]
    pub fn position(&self) -> ValvePosition {
        let zero_based = usize::from(self.0 - 1);
        ValvePosition {
            register: RegisterIndex((zero_based / VALVES_PER_REGISTER) as u8),
            offset: (zero_based % VALVES_PER_REGISTER) as u8,
        }
    }

    /// Iterate over every valid slot index in ascending order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (MIN_SLOT_INDEX..=MAX_SLOT_INDEX).map(SlotIndex)
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        SlotIndex::new(value)
    }
}

impl From<SlotIndex> for u8 {
    fn from(value: SlotIndex) -> Self {
        value.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Valve register number (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RegisterIndex(u8);

impl RegisterIndex {
    /// Create a new register index with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRegisterIndex` if the index is 4 or above.
    pub fn new(index: u8) -> Result<Self> {
        if usize::from(index) >= REGISTER_COUNT {
            return Err(Error::InvalidRegisterIndex(index));
        }
        Ok(RegisterIndex(index))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_usize(&self) -> usize {
        usize::from(self.0)
    }

    /// Iterate over every register in transmission order.
    pub fn all() -> impl Iterator<Item = RegisterIndex> {
        (0..REGISTER_COUNT as u8).map(RegisterIndex)
    }
}

impl TryFrom<u8> for RegisterIndex {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        RegisterIndex::new(value)
    }
}

impl From<RegisterIndex> for u8 {
    fn from(value: RegisterIndex) -> Self {
        value.0
    }
}

impl fmt::Display for RegisterIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical location of one valve: register and byte offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawValvePosition")]
pub struct ValvePosition {
    register: RegisterIndex,
    /// Byte offset within the register (0-7).
    offset: u8,
}

impl ValvePosition {
    /// Create a valve position with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotIndex` if the offset is 8 or above.
    pub fn new(register: RegisterIndex, offset: u8) -> Result<Self> {
        if usize::from(offset) >= VALVES_PER_REGISTER {
            return Err(Error::InvalidSlotIndex(format!(
                "valve offset must be 0-{}, got {offset}",
                VALVES_PER_REGISTER - 1
            )));
        }
        Ok(ValvePosition { register, offset })
    }

    #[must_use]
    pub fn register(&self) -> RegisterIndex {
        self.register
    }

    #[must_use]
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Inverse of [`SlotIndex::position`].
    #[must_use]
    pub fn slot(&self) -> SlotIndex {
        SlotIndex(self.register.0 * VALVES_PER_REGISTER as u8 + self.offset + 1)
    }
}

#[derive(Deserialize)]
struct RawValvePosition {
    register: RegisterIndex,
    offset: u8,
}

impl TryFrom<RawValvePosition> for ValvePosition {
    type Error = Error;

    fn try_from(raw: RawValvePosition) -> Result<Self> {
        ValvePosition::new(raw.register, raw.offset)
    }
}

/// Recipe slot on the board (0-23)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct RecipeId(u8);

impl RecipeId {
    /// Create a new recipe id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRecipeId` if the id is above 23.
    pub fn new(id: u8) -> Result<Self> {
        if id > MAX_RECIPE_ID {
            return Err(Error::InvalidRecipeId(format!(
                "recipe id must be 0-{MAX_RECIPE_ID}, got {id}"
            )));
        }
        Ok(RecipeId(id))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_usize(&self) -> usize {
        usize::from(self.0)
    }

    /// Iterate over every recipe slot in transmission order.
    pub fn all() -> impl Iterator<Item = RecipeId> {
        (0..=MAX_RECIPE_ID).map(RecipeId)
    }
}

impl TryFrom<u8> for RecipeId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        RecipeId::new(value)
    }
}

impl From<RecipeId> for u8 {
    fn from(value: RecipeId) -> Self {
        value.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecipeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidRecipeId(format!("not a number: {s}")))?;
        RecipeId::new(id)
    }
}

/// Number of drinks in one order (1-255, one wire byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quantity(u8);

impl Quantity {
    /// Create a new quantity.
    ///
    /// # Errors
    /// Returns `Error::InvalidQuantity` for zero.
    pub fn new(quantity: u8) -> Result<Self> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity(
                "quantity must be at least 1".to_string(),
            ));
        }
        Ok(Quantity(quantity))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Quantity {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Quantity::new(value)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        let byte = u8::try_from(value)
            .map_err(|_| Error::InvalidQuantity(format!("quantity {value} exceeds 255")))?;
        Quantity::new(byte)
    }
}

impl From<Quantity> for u8 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single drink order, alive for the duration of one dispense session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseOrder {
    /// Unique id used to correlate logs and session events.
    pub id: Uuid,
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
    pub placed_at: DateTime<Utc>,
}

impl DispenseOrder {
    #[must_use]
    pub fn new(recipe_id: RecipeId, quantity: Quantity) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipe_id,
            quantity,
            placed_at: Utc::now(),
        }
    }
}

impl fmt::Display for DispenseOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "order {} (recipe {} x{})",
            self.id, self.recipe_id, self.quantity
        )
    }
}
