//! Menu compilation: all active recipes into the board's 24-slot table.
//!
//! The table is always complete. Recipe slot `n` holds the recipe whose id
//! is `n`; slots without an active recipe pour nothing. Compilation is all or
//! nothing: one bad recipe fails the whole table, because the board trusts
//! slot positions blindly and a partially correct table would pour the
//! wrong drink.
//!
//! # Transmission Order
//!
//! ```text
//! slot 0: register 0, register 1, register 2, register 3
//! slot 1: register 0, ...
//! ...
//! slot 23: ..., register 3          (96 frames)
//! ```

use crate::encoder::{CompileContext, EncodedRecipeSlot, RecipeEncoder};
use crate::frame::{RecipeFrame, encode_recipe_frames};
use bytes::Bytes;
use dispenser_core::{
    Error, Recipe, RecipeId, Result,
    constants::{MAX_RECIPES, MENU_FRAME_COUNT},
};

/// The full recipe table uploaded to the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MenuTable {
    slots: [EncodedRecipeSlot; MAX_RECIPES],
}

impl MenuTable {
    /// A table where every slot pours nothing.
    #[must_use]
    pub fn empty() -> Self {
        let mut slots = [EncodedRecipeSlot::empty(RecipeId::default()); MAX_RECIPES];
        for (slot, id) in slots.iter_mut().zip(RecipeId::all()) {
            slot.recipe_id = id;
        }
        Self { slots }
    }

    /// Board wiring check pattern.
    ///
    /// Slot `i` pours `51 + i ..= 58 + i` steps on valves 0-7 of every
    /// register, which makes each slot and valve distinguishable on a logic
    /// analyzer or in the board's debug output.
    #[must_use]
    pub fn test_pattern() -> Self {
        let mut table = Self::empty();
        for (i, slot) in table.slots.iter_mut().enumerate() {
            let base = 51 + i as u8;
            let pattern: [u8; 8] = std::array::from_fn(|valve| base + valve as u8);
            slot.registers = [pattern; 4];
        }
        table
    }

    /// Rebuild a table from transmitted frames.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` unless exactly one frame was received
    /// for every (slot, register) pair.
    pub fn from_frames(frames: impl IntoIterator<Item = RecipeFrame>) -> Result<Self> {
        let mut table = Self::empty();
        let mut seen = [[false; 4]; MAX_RECIPES];
        let mut count = 0usize;

        for frame in frames {
            let slot = frame.recipe_id.as_usize();
            let register = frame.register.as_usize();
            if seen[slot][register] {
                return Err(Error::InvalidFrame(format!(
                    "recipe {} register {} received twice",
                    frame.recipe_id, frame.register
                )));
            }
            seen[slot][register] = true;
            table.slots[slot].registers[register] = frame.durations;
            count += 1;
        }

        if count != MENU_FRAME_COUNT {
            return Err(Error::InvalidFrame(format!(
                "menu needs {MENU_FRAME_COUNT} frames, got {count}"
            )));
        }
        Ok(table)
    }

    /// All 24 slots, slot 0 first.
    #[must_use]
    pub fn slots(&self) -> &[EncodedRecipeSlot; MAX_RECIPES] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, id: RecipeId) -> &EncodedRecipeSlot {
        &self.slots[id.as_usize()]
    }

    /// Number of slots that pour something.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }

    /// All 96 frames in transmission order.
    pub fn frames(&self) -> impl Iterator<Item = RecipeFrame> + '_ {
        self.slots.iter().flat_map(EncodedRecipeSlot::frames)
    }

    /// The whole table as concatenated wire bytes (960 bytes).
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        let frames: Vec<RecipeFrame> = self.frames().collect();
        encode_recipe_frames(&frames)
    }
}

impl Default for MenuTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Compiles the active recipe set into a [`MenuTable`].
///
/// # Examples
///
/// ```
/// use dispenser_core::{InventoryMap, InventorySlot, PumpCalibration, Recipe, RecipeId, SlotIndex};
/// use dispenser_protocol::{CompileContext, MenuCompiler};
///
/// let inventory = InventoryMap::new(vec![
///     InventorySlot::new(SlotIndex::new(1).unwrap(), "rum", 25.0, 25.0).unwrap(),
///     InventorySlot::new(SlotIndex::new(9).unwrap(), "cola", 64.0, 64.0).unwrap(),
/// ])
/// .unwrap();
/// let context = CompileContext::new(inventory, PumpCalibration::default());
///
/// let recipes = vec![
///     Recipe::new(RecipeId::new(1).unwrap(), "Cola").with_ingredient("cola", 6.0),
///     Recipe::new(RecipeId::new(0).unwrap(), "Cuba Libre")
///         .with_ingredient("rum", 1.5)
///         .with_ingredient("cola", 4.0),
/// ];
///
/// let table = MenuCompiler::new(&context).compile(&recipes).unwrap();
/// assert_eq!(table.active_count(), 2);
/// assert_eq!(table.frames().count(), 96);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MenuCompiler<'a> {
    encoder: RecipeEncoder<'a>,
}

impl<'a> MenuCompiler<'a> {
    pub fn new(context: &'a CompileContext) -> Self {
        Self {
            encoder: RecipeEncoder::new(context),
        }
    }

    /// Compile the active recipes.
    ///
    /// Recipes may be given in any order; they are sorted by id first.
    ///
    /// # Errors
    /// - `Error::TooManyRecipes` if more than 24 recipes are given
    /// - `Error::DuplicateRecipeId` if two recipes share an id
    /// - any error from [`RecipeEncoder::encode`], for the first failing recipe
    pub fn compile(&self, recipes: &[Recipe]) -> Result<MenuTable> {
        if recipes.len() > MAX_RECIPES {
            return Err(Error::TooManyRecipes {
                count: recipes.len(),
                max: MAX_RECIPES,
            });
        }

        let mut sorted: Vec<&Recipe> = recipes.iter().collect();
        sorted.sort_by_key(|recipe| recipe.id);
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(Error::DuplicateRecipeId(pair[0].id.as_u8()));
        }

        let mut table = MenuTable::empty();
        for recipe in sorted {
            table.slots[recipe.id.as_usize()] = self.encoder.encode(recipe)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_core::{InventoryMap, InventorySlot, PumpCalibration, SlotIndex};

    fn context() -> CompileContext {
        let inventory = InventoryMap::new(
            [(1, "rum"), (2, "gin"), (9, "cola"), (10, "tonic")]
                .into_iter()
                .map(|(index, name)| {
                    InventorySlot::new(SlotIndex::new(index).unwrap(), name, 50.0, 50.0).unwrap()
                }),
        )
        .unwrap();
        CompileContext::new(inventory, PumpCalibration::default())
    }

    fn recipe(id: u8, ingredient: &str) -> Recipe {
        Recipe::new(RecipeId::new(id).unwrap(), format!("drink {id}")).with_ingredient(ingredient, 1.0)
    }

    #[test]
    fn test_empty_table_has_slot_ids_in_order() {
        let table = MenuTable::empty();
        for (i, slot) in table.slots().iter().enumerate() {
            assert_eq!(slot.recipe_id.as_usize(), i);
            assert!(slot.is_empty());
        }
    }

    #[test]
    fn test_recipes_are_sorted_internally() {
        let context = context();
        let ordered = MenuCompiler::new(&context)
            .compile(&[recipe(0, "rum"), recipe(1, "gin"), recipe(2, "cola")])
            .unwrap();
        let shuffled = MenuCompiler::new(&context)
            .compile(&[recipe(2, "cola"), recipe(0, "rum"), recipe(1, "gin")])
            .unwrap();
        assert_eq!(ordered, shuffled);
    }

    #[test]
    fn test_duplicate_recipe_id() {
        let context = context();
        let result = MenuCompiler::new(&context).compile(&[recipe(3, "rum"), recipe(3, "gin")]);
        assert!(matches!(result, Err(Error::DuplicateRecipeId(3))));
    }

    #[test]
    fn test_one_bad_recipe_fails_the_table() {
        let context = context();
        let result = MenuCompiler::new(&context).compile(&[
            recipe(0, "rum"),
            recipe(1, "absinthe"),
            recipe(2, "gin"),
        ]);
        assert!(matches!(result, Err(Error::UnknownIngredient { .. })));
    }

    #[test]
    fn test_frames_follow_slot_then_register_order() {
        let table = MenuCompiler::new(&context())
            .compile(&[recipe(0, "rum"), recipe(1, "tonic")])
            .unwrap();

        let frames: Vec<_> = table.frames().collect();
        assert_eq!(frames.len(), MENU_FRAME_COUNT);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.recipe_id.as_usize(), i / 4);
            assert_eq!(frame.register.as_usize(), i % 4);
        }
        // tonic is slot 10: register 1, offset 1
        assert_ne!(frames[5].durations[1], 0);
    }

    #[test]
    fn test_wire_bytes() {
        let table = MenuTable::test_pattern();
        let wire = table.to_wire();
        assert_eq!(wire.len(), 960);
        assert_eq!(&wire[..10], &[0, 51, 52, 53, 54, 55, 56, 57, 58, 0]);
        assert_eq!(&wire[950..], &[23, 74, 75, 76, 77, 78, 79, 80, 81, 3]);
    }

    #[test]
    fn test_from_frames_rejects_incomplete_table() {
        let frames: Vec<_> = MenuTable::test_pattern().frames().take(95).collect();
        assert!(MenuTable::from_frames(frames).is_err());
    }

    #[test]
    fn test_from_frames_rejects_duplicates() {
        let mut frames: Vec<_> = MenuTable::test_pattern().frames().collect();
        frames[1] = frames[0];
        assert!(MenuTable::from_frames(frames).is_err());
    }
}
