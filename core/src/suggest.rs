use crate::matcher::{PantryIndex, missing_ingredients};
use crate::models::{PantryItem, Recipe, Suggestion};

/// Rank every recipe by how many ingredients are missing from the pantry.
///
/// Ordering is ascending `(missing_count, title)`, with the recipe id as a
/// final tie-break so the result never depends on store order. The planner
/// relies on makeable recipes coming first.
#[must_use]
pub fn rank(recipes: &[Recipe], pantry: &[PantryItem]) -> Vec<Suggestion> {
    let index = PantryIndex::from_items(pantry);

    let mut suggestions: Vec<Suggestion> = recipes
        .iter()
        .map(|recipe| {
            let needed = missing_ingredients(&index, &recipe.ingredients);
            let missing_count = needed.len();
            Suggestion {
                id: recipe.id.clone(),
                title: recipe.title.clone(),
                image: recipe.image.clone(),
                needed,
                can_make: missing_count == 0,
                missing_count,
            }
        })
        .collect();

    suggestions.sort_by(|a, b| {
        a.missing_count
            .cmp(&b.missing_count)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
    suggestions
}
