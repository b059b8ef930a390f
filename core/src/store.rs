use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use chrono::Local;
use uuid::Uuid;

use crate::models::{
    MealPlan, NewPantryItem, NewRecipe, PantryItem, Recipe, WeekPlan, normalize_unit,
};

/// Record access the derivation logic needs.
///
/// `Database` is the persistent implementation; `MemoryStore` backs tests and
/// embedding. Both hand out owned snapshots, so callers never hold a lock
/// across a computation.
pub trait Store {
    fn find_all_recipes(&self) -> Result<Vec<Recipe>>;
    fn find_recipe_by_id(&self, id: &str) -> Result<Option<Recipe>>;
    fn find_all_pantry_items(&self) -> Result<Vec<PantryItem>>;
    fn find_pantry_item_by_name_unit(
        &self,
        name: &str,
        unit: Option<&str>,
    ) -> Result<Option<PantryItem>>;
    /// Insert a pantry item, or add its quantity to the row that already has
    /// the same (name, unit). The image of an existing row is kept.
    fn upsert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem>;
    fn find_meal_plan_by_week_start(&self, week_start: &str) -> Result<Option<MealPlan>>;
    /// Replace the whole plan for `week_start`, creating it if needed.
    fn upsert_meal_plan(&self, week_start: &str, days: &WeekPlan) -> Result<MealPlan>;
}

impl<S: Store + ?Sized> Store for &S {
    fn find_all_recipes(&self) -> Result<Vec<Recipe>> {
        (**self).find_all_recipes()
    }

    fn find_recipe_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        (**self).find_recipe_by_id(id)
    }

    fn find_all_pantry_items(&self) -> Result<Vec<PantryItem>> {
        (**self).find_all_pantry_items()
    }

    fn find_pantry_item_by_name_unit(
        &self,
        name: &str,
        unit: Option<&str>,
    ) -> Result<Option<PantryItem>> {
        (**self).find_pantry_item_by_name_unit(name, unit)
    }

    fn upsert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        (**self).upsert_pantry_item(item)
    }

    fn find_meal_plan_by_week_start(&self, week_start: &str) -> Result<Option<MealPlan>> {
        (**self).find_meal_plan_by_week_start(week_start)
    }

    fn upsert_meal_plan(&self, week_start: &str, days: &WeekPlan) -> Result<MealPlan> {
        (**self).upsert_meal_plan(week_start, days)
    }
}

#[derive(Default)]
struct MemoryData {
    recipes: Vec<Recipe>,
    pantry: Vec<PantryItem>,
    plans: Vec<MealPlan>,
}

/// In-process store. Recipes keep insertion order; pantry and plan semantics
/// match the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let mut recipe = recipe.clone();
        crate::models::validate_new_recipe(&mut recipe)?;
        let now = Local::now().to_rfc3339();
        let stored = Recipe {
            id: Uuid::new_v4().to_string(),
            title: recipe.title,
            description: recipe.description,
            image: recipe.image,
            prep_time_min: recipe.prep_time_min,
            age_range: recipe.age_range,
            ingredients: recipe.ingredients,
            steps: recipe.steps,
            tags: recipe.tags,
            created_at: now.clone(),
            updated_at: now,
        };
        self.lock().recipes.push(stored.clone());
        Ok(stored)
    }

    pub fn delete_recipe(&self, id: &str) -> Result<()> {
        let mut data = self.lock();
        let before = data.recipes.len();
        data.recipes.retain(|r| r.id != id);
        if data.recipes.len() == before {
            bail!("Recipe not found");
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn find_all_recipes(&self) -> Result<Vec<Recipe>> {
        Ok(self.lock().recipes.clone())
    }

    fn find_recipe_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        Ok(self.lock().recipes.iter().find(|r| r.id == id).cloned())
    }

    fn find_all_pantry_items(&self) -> Result<Vec<PantryItem>> {
        Ok(self.lock().pantry.clone())
    }

    fn find_pantry_item_by_name_unit(
        &self,
        name: &str,
        unit: Option<&str>,
    ) -> Result<Option<PantryItem>> {
        Ok(self
            .lock()
            .pantry
            .iter()
            .find(|p| p.name == name && p.unit.as_deref() == unit)
            .cloned())
    }

    fn upsert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        let now = Local::now().to_rfc3339();
        let unit = normalize_unit(item.unit.clone());
        let mut data = self.lock();
        if let Some(existing) = data
            .pantry
            .iter_mut()
            .find(|p| p.name == item.name && p.unit == unit)
        {
            existing.quantity += item.quantity;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let created = PantryItem {
            id: Uuid::new_v4().to_string(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit,
            image: item.image.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        data.pantry.push(created.clone());
        Ok(created)
    }

    fn find_meal_plan_by_week_start(&self, week_start: &str) -> Result<Option<MealPlan>> {
        Ok(self
            .lock()
            .plans
            .iter()
            .find(|p| p.week_start == week_start)
            .cloned())
    }

    fn upsert_meal_plan(&self, week_start: &str, days: &WeekPlan) -> Result<MealPlan> {
        let plan = MealPlan {
            week_start: week_start.to_string(),
            days: days.clone(),
        };
        let mut data = self.lock();
        if let Some(existing) = data.plans.iter_mut().find(|p| p.week_start == week_start) {
            *existing = plan.clone();
        } else {
            data.plans.push(plan.clone());
        }
        Ok(plan)
    }
}
