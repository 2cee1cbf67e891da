//! Recipe encoding: ingredient volumes to per-valve pump durations.
//!
//! A recipe is turned into 32 duration bytes, one per valve, laid out as
//! 4 registers of 8 valves. The valve for an ingredient is the inventory
//! slot it is wired to:
//!
//! ```text
//! slot  1..=8   -> register 0, offset (slot - 1) % 8
//! slot  9..=16  -> register 1
//! slot 17..=24  -> register 2
//! slot 25..=32  -> register 3
//! ```
//!
//! The duration byte counts steps of `max_pump_seconds / 256`:
//!
//! ```text
//! ml       = ounces * 29.5735
//! duration = floor(ml / (flow_rate_ml_per_sec * max_pump_seconds / 256))
//! ```
//!
//! Durations above 255 are reported as [`Error::DurationOverflow`], never
//! truncated.

use crate::frame::{RecipeFrame, RegisterDurations};
use dispenser_core::{
    Error, InventoryMap, PumpCalibration, Recipe, RecipeId, RegisterIndex, Result, SlotIndex,
    constants::{MILLILITERS_PER_OUNCE, REGISTER_COUNT, VALVE_COUNT},
};

/// Everything the encoder needs besides the recipe itself.
///
/// Passed explicitly into every encode/compile call so the compiler never
/// depends on ambient state.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    pub inventory: InventoryMap,
    pub calibration: PumpCalibration,
}

impl CompileContext {
    pub fn new(inventory: InventoryMap, calibration: PumpCalibration) -> Self {
        Self {
            inventory,
            calibration,
        }
    }
}

/// Pump durations for every valve of one recipe slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedRecipeSlot {
    pub recipe_id: RecipeId,
    pub registers: [RegisterDurations; REGISTER_COUNT],
}

impl EncodedRecipeSlot {
    /// A slot that pours nothing.
    pub fn empty(recipe_id: RecipeId) -> Self {
        Self {
            recipe_id,
            registers: [[0; 8]; REGISTER_COUNT],
        }
    }

    /// Whether every valve duration is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().flatten().all(|&d| d == 0)
    }

    /// Duration byte of the valve wired to `slot`.
    #[must_use]
    pub fn duration(&self, slot: SlotIndex) -> u8 {
        let position = slot.position();
        self.registers[position.register().as_usize()][usize::from(position.offset())]
    }

    /// Durations indexed by valve, slot 1 first.
    #[must_use]
    pub fn valve_durations(&self) -> [u8; VALVE_COUNT] {
        let mut all = [0u8; VALVE_COUNT];
        for (chunk, register) in all.chunks_exact_mut(8).zip(self.registers.iter()) {
            chunk.copy_from_slice(register);
        }
        all
    }

    /// The 4 frames of this slot, register 0 first.
    pub fn frames(&self) -> impl Iterator<Item = RecipeFrame> + '_ {
        RegisterIndex::all().map(move |register| {
            RecipeFrame::new(self.recipe_id, register, self.registers[register.as_usize()])
        })
    }
}

/// Encodes single recipes against a [`CompileContext`].
///
/// # Examples
///
/// ```
/// use dispenser_core::{InventoryMap, InventorySlot, PumpCalibration, Recipe, RecipeId, SlotIndex};
/// use dispenser_protocol::{CompileContext, RecipeEncoder};
///
/// let inventory = InventoryMap::new(vec![
///     InventorySlot::new(SlotIndex::new(1).unwrap(), "rum", 25.0, 25.0).unwrap(),
/// ])
/// .unwrap();
/// let context = CompileContext::new(inventory, PumpCalibration::default());
///
/// let recipe = Recipe::new(RecipeId::new(0).unwrap(), "Neat").with_ingredient("rum", 1.5);
/// let slot = RecipeEncoder::new(&context).encode(&recipe).unwrap();
/// assert_eq!(slot.registers[0][0], 37);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RecipeEncoder<'a> {
    context: &'a CompileContext,
}

impl<'a> RecipeEncoder<'a> {
    pub fn new(context: &'a CompileContext) -> Self {
        Self { context }
    }

    /// Encode one recipe.
    ///
    /// An ingredient listed twice pours the sum of both volumes. Valves not
    /// used by the recipe stay at 0.
    ///
    /// # Errors
    /// - `Error::InvalidVolume` if an ingredient volume is negative or not finite
    /// - `Error::UnknownIngredient` if an ingredient is not in the inventory
    /// - `Error::DurationOverflow` if a valve needs more than 255 steps
    pub fn encode(&self, recipe: &Recipe) -> Result<EncodedRecipeSlot> {
        let mut milliliters = [0.0f64; VALVE_COUNT];
        let mut names: [Option<&str>; VALVE_COUNT] = [None; VALVE_COUNT];

        for ingredient in &recipe.ingredients {
            if !ingredient.ounces.is_finite() || ingredient.ounces < 0.0 {
                return Err(Error::InvalidVolume {
                    ingredient: ingredient.name.clone(),
                    ounces: ingredient.ounces,
                });
            }

            let slot = self
                .context
                .inventory
                .slot_for(&ingredient.name)
                .ok_or_else(|| Error::UnknownIngredient {
                    recipe: recipe.name.clone(),
                    ingredient: ingredient.name.clone(),
                })?;

            let valve = usize::from(slot.as_u8() - 1);
            milliliters[valve] += ingredient.ounces * MILLILITERS_PER_OUNCE;
            names[valve] = Some(ingredient.name.as_str());
        }

        let mut encoded = EncodedRecipeSlot::empty(recipe.id);
        for slot in SlotIndex::all() {
            let valve = usize::from(slot.as_u8() - 1);
            let Some(name) = names[valve] else { continue };

            let units = self.context.calibration.steps_for_milliliters(milliliters[valve]);
            let duration = u8::try_from(units).map_err(|_| Error::DurationOverflow {
                recipe: recipe.name.clone(),
                ingredient: name.to_string(),
                units,
            })?;

            let position = slot.position();
            encoded.registers[position.register().as_usize()][usize::from(position.offset())] =
                duration;
        }

        Ok(encoded)
    }
}
