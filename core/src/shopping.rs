use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::models::{MealPlan, PantryItem, Recipe, ShoppingListItem};

/// Anything at or below this is treated as already covered by the pantry.
pub const EPSILON: f64 = 1e-4;

/// Exact aggregation key. An absent unit is its own key, distinct from every
/// explicit unit. `Option<String>` orders `None` first, which gives unitless
/// entries precedence within a name.
type ItemKey = (String, Option<String>);

/// Distinct recipe ids referenced by a plan, in slot visiting order.
///
/// Slot values that are not well-formed ids are dropped as if the slot were
/// empty.
#[must_use]
pub fn planned_recipe_ids(plan: &MealPlan) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (day, slot, value) in plan.days.slots() {
        let Some(raw) = value else { continue };
        if Uuid::parse_str(raw).is_err() {
            tracing::debug!(
                ?day,
                slot = slot.as_str(),
                value = raw,
                "ignoring malformed recipe reference"
            );
            continue;
        }
        if seen.insert(raw) {
            ids.push(raw.to_string());
        }
    }
    ids
}

/// Net shopping list for a week: what the planned recipes need, minus what
/// the pantry already holds, keyed on exact (name, unit).
///
/// `recipes` maps id to recipe for every id the caller could resolve. Ids in
/// the plan that are absent from the map are skipped. Each distinct recipe
/// contributes once, however many slots it fills.
#[must_use]
pub fn build_shopping_list(
    plan: &MealPlan,
    recipes: &HashMap<String, Recipe>,
    pantry: &[PantryItem],
) -> Vec<ShoppingListItem> {
    let mut needed: BTreeMap<ItemKey, f64> = BTreeMap::new();
    for id in planned_recipe_ids(plan) {
        let Some(recipe) = recipes.get(&id) else {
            tracing::debug!(recipe_id = %id, "planned recipe no longer exists, skipping");
            continue;
        };
        for ing in &recipe.ingredients {
            *needed
                .entry((ing.name.clone(), ing.unit.clone()))
                .or_insert(0.0) += ing.required_quantity();
        }
    }

    let mut have: HashMap<ItemKey, f64> = HashMap::new();
    for item in pantry {
        *have
            .entry((item.name.clone(), item.unit.clone()))
            .or_insert(0.0) += item.quantity;
    }

    needed
        .into_iter()
        .filter_map(|(key, need)| {
            let missing = need - have.get(&key).copied().unwrap_or(0.0);
            (missing > EPSILON).then(|| ShoppingListItem {
                name: key.0,
                unit: key.1,
                quantity: round2(missing),
                purchased: false,
            })
        })
        .collect()
}

/// Two decimal places, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Write a shopping list as CSV with a `name,unit,quantity,purchased` header.
pub fn write_csv<W: Write>(items: &[ShoppingListItem], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["name", "unit", "quantity", "purchased"])
        .context("Failed to write CSV header")?;
    for item in items {
        let quantity = item.quantity.to_string();
        wtr.write_record([
            item.name.as_str(),
            item.unit.as_deref().unwrap_or(""),
            quantity.as_str(),
            if item.purchased { "true" } else { "false" },
        ])
        .with_context(|| format!("Failed to write CSV row for '{}'", item.name))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}
