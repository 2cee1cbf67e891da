//! Shared fixtures for the menu compiler integration tests.

#![allow(dead_code)]

use dispenser_core::{
    InventoryMap, InventorySlot, PumpCalibration, Recipe, RecipeId, SlotIndex,
};
use dispenser_protocol::CompileContext;

/// Bar inventory used across tests: one spirit or mixer per register.
pub const BAR: &[(u8, &str)] = &[
    (1, "rum"),
    (2, "vodka"),
    (3, "gin"),
    (9, "cola"),
    (10, "tonic"),
    (17, "orange juice"),
    (25, "lime"),
];

pub fn inventory(slots: &[(u8, &str)]) -> InventoryMap {
    InventoryMap::new(slots.iter().map(|&(index, name)| {
        InventorySlot::new(SlotIndex::new(index).unwrap(), name, 60.0, 64.0).unwrap()
    }))
    .unwrap()
}

pub fn bar_context() -> CompileContext {
    CompileContext::new(inventory(BAR), PumpCalibration::default())
}

pub fn recipe_id(id: u8) -> RecipeId {
    RecipeId::new(id).unwrap()
}

/// `count` single-ingredient recipes with ids 0..count, cycling through the bar.
pub fn dense_recipes(count: usize) -> Vec<Recipe> {
    (0..count)
        .map(|i| {
            let (_, ingredient) = BAR[i % BAR.len()];
            Recipe::new(recipe_id(i as u8), format!("drink {i}"))
                .with_ingredient(ingredient, 0.5 + (i as f64) * 0.1)
        })
        .collect()
}
