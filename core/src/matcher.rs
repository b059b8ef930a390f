//! Pantry-aware ingredient matching.
//!
//! Availability is presence only: an ingredient is available when its name, or
//! one of the substitutions it declares, appears in the pantry. Quantities are
//! never compared here.

use std::collections::HashSet;

use crate::models::{Ingredient, PantryItem};

/// Matching key for an ingredient or pantry name: trimmed and lowercased.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalized names of everything currently in the pantry.
#[derive(Debug, Clone, Default)]
pub struct PantryIndex {
    names: HashSet<String>,
}

impl PantryIndex {
    #[must_use]
    pub fn from_items(items: &[PantryItem]) -> Self {
        Self::from_names(items.iter().map(|item| item.name.as_str()))
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names = names
            .into_iter()
            .map(normalize_name)
            .filter(|n| !n.is_empty())
            .collect();
        PantryIndex { names }
    }

    /// Whether `name` is stocked, compared after normalization.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let key = normalize_name(name);
        !key.is_empty() && self.names.contains(&key)
    }
}

/// True when neither the ingredient nor any of its declared substitutions is
/// stocked. An ingredient with a blank name is always missing.
///
/// Substitutions are one-directional: only the list on `ingredient` itself is
/// consulted.
#[must_use]
pub fn is_missing(pantry: &PantryIndex, ingredient: &Ingredient) -> bool {
    if normalize_name(&ingredient.name).is_empty() {
        return true;
    }
    if pantry.contains(&ingredient.name) {
        return false;
    }
    !ingredient
        .substitutions
        .iter()
        .any(|sub| pantry.contains(sub))
}

/// Original (non-normalized) names of the missing ingredients, in recipe order.
#[must_use]
pub fn missing_ingredients(pantry: &PantryIndex, ingredients: &[Ingredient]) -> Vec<String> {
    ingredients
        .iter()
        .filter(|ing| is_missing(pantry, ing))
        .map(|ing| ing.name.clone())
        .collect()
}
