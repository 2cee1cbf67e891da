use crate::types::RecipeId;
use serde::{Deserialize, Serialize};

/// One line of a recipe: an ingredient and how much of it to pour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub ounces: f64,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, ounces: f64) -> Self {
        Self {
            name: name.into(),
            ounces,
        }
    }
}

/// A drink as the board knows it: a recipe slot and the ingredients to pour.
///
/// Ingredients are kept in catalog order. Every ingredient must resolve to
/// an inventory slot when the menu is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    pub fn new(id: RecipeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ingredients: Vec::new(),
        }
    }

    /// Append an ingredient (builder style).
    #[must_use]
    pub fn with_ingredient(mut self, name: impl Into<String>, ounces: f64) -> Self {
        self.ingredients.push(Ingredient::new(name, ounces));
        self
    }

    /// Total volume of one drink, in ounces.
    #[must_use]
    pub fn total_ounces(&self) -> f64 {
        self.ingredients.iter().map(|i| i.ounces).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_catalog_order() {
        let recipe = Recipe::new(RecipeId::new(0).unwrap(), "Cuba Libre")
            .with_ingredient("rum", 1.5)
            .with_ingredient("cola", 4.0);

        let names: Vec<_> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["rum", "cola"]);
        assert!((recipe.total_ounces() - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recipe_deserializes_from_catalog_json() {
        let json = r#"{
            "id": 4,
            "name": "Gin and Tonic",
            "ingredients": [
                { "name": "gin", "ounces": 2.0 },
                { "name": "tonic", "ounces": 4.5 }
            ]
        }"#;

        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.id.as_u8(), 4);
        assert_eq!(recipe.ingredients.len(), 2);
    }
}
