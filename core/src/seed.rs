use anyhow::Result;
use serde::Serialize;

use crate::db::Database;
use crate::models::{Ingredient, NewRecipe};

/// Seeding is skipped once the store holds at least this many recipes.
pub const SAMPLE_RECIPE_COUNT: usize = 25;

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub inserted: usize,
    pub total: i64,
}

// (name, quantity, unit, substitution)
const BASE_INGREDIENTS: [(&str, f64, &str, &str); 10] = [
    ("Apple", 1.0, "pc", "Pear"),
    ("Banana", 1.0, "pc", "Avocado"),
    ("Oatmeal", 30.0, "g", "Rice Cereal"),
    ("Sweet Potato", 100.0, "g", "Pumpkin"),
    ("Carrot", 60.0, "g", "Butternut Squash"),
    ("Pear", 1.0, "pc", "Apple"),
    ("Avocado", 1.0, "pc", "Banana"),
    ("Peas", 60.0, "g", "Green Beans"),
    ("Chicken", 80.0, "g", "Turkey"),
    ("Rice", 30.0, "g", "Quinoa"),
];

fn base_ingredient(idx: usize) -> Ingredient {
    let (name, quantity, unit, substitution) = BASE_INGREDIENTS[idx % BASE_INGREDIENTS.len()];
    Ingredient {
        name: name.to_string(),
        quantity: Some(quantity),
        unit: Some(unit.to_string()),
        image: None,
        substitutions: vec![substitution.to_string()],
    }
}

/// The generated sample catalogue, numbered from 1.
#[must_use]
pub fn sample_recipes() -> Vec<NewRecipe> {
    (1..=SAMPLE_RECIPE_COUNT)
        .map(|i| NewRecipe {
            title: format!("Sample Puree #{i}"),
            description: "A gentle, smooth puree for little eaters.".to_string(),
            image: None,
            prep_time_min: 10 + (i % 15) as u32,
            age_range: "6-12 months".to_string(),
            ingredients: vec![base_ingredient(i), base_ingredient(i + 3)],
            steps: vec![
                "Steam ingredients until soft".to_string(),
                "Blend to desired consistency".to_string(),
                "Serve lukewarm".to_string(),
            ],
            tags: vec!["easy".to_string(), "smooth".to_string()],
        })
        .collect()
}

/// Load the sample catalogue unless the store is already populated.
pub fn seed_sample_recipes(db: &Database) -> Result<SeedSummary> {
    let existing = db.count_recipes()?;
    if usize::try_from(existing).unwrap_or(usize::MAX) >= SAMPLE_RECIPE_COUNT {
        tracing::info!(count = existing, "recipes already seeded");
        return Ok(SeedSummary {
            inserted: 0,
            total: existing,
        });
    }

    let recipes = sample_recipes();
    for recipe in &recipes {
        db.insert_recipe(recipe)?;
    }
    let total = db.count_recipes()?;
    tracing::info!(inserted = recipes.len(), total, "seeded sample recipes");
    Ok(SeedSummary {
        inserted: recipes.len(),
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_recipes_shape() {
        let recipes = sample_recipes();
        assert_eq!(recipes.len(), 25);

        let first = &recipes[0];
        assert_eq!(first.title, "Sample Puree #1");
        assert_eq!(first.prep_time_min, 11);
        assert_eq!(first.ingredients[0].name, "Banana");
        assert_eq!(first.ingredients[1].name, "Oatmeal");
        assert_eq!(first.ingredients[1].unit.as_deref(), Some("g"));
        assert_eq!(first.ingredients[0].substitutions, vec!["Avocado"]);

        let tenth = &recipes[9];
        assert_eq!(tenth.ingredients[0].name, "Apple");
        assert_eq!(tenth.ingredients[1].name, "Sweet Potato");
        assert!(recipes.iter().all(|r| r.steps.len() == 3 && r.tags.len() == 2));
    }

    #[test]
    fn test_seed_is_skipped_when_populated() {
        let db = Database::open_in_memory().unwrap();
        let first = seed_sample_recipes(&db).unwrap();
        assert_eq!(first.inserted, 25);
        assert_eq!(first.total, 25);

        let second = seed_sample_recipes(&db).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.total, 25);
        assert_eq!(db.count_recipes().unwrap(), 25);
    }
}
