use std::collections::HashMap;

use anyhow::Result;

use crate::models::{
    MealPlan, NewPantryItem, PantryItem, ShoppingListItem, Suggestion, validate_new_pantry_item,
    validate_week_start,
};
use crate::planner;
use crate::shopping;
use crate::store::Store;
use crate::suggest;

/// The derivations larder offers on top of a [`Store`]: suggestions,
/// auto-filled plans, and shopping lists.
///
/// Each call takes a fresh snapshot from the store and never caches, so
/// results always reflect the latest pantry and plan.
pub struct LarderService<S: Store> {
    store: S,
}

impl<S: Store> LarderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every recipe, ranked by how few ingredients are missing from the pantry.
    pub fn suggest(&self) -> Result<Vec<Suggestion>> {
        let recipes = self.store.find_all_recipes()?;
        let pantry = self.store.find_all_pantry_items()?;
        Ok(suggest::rank(&recipes, &pantry))
    }

    /// Rebuild the week's plan from the current suggestions and persist it,
    /// replacing whatever was planned before.
    pub fn auto_fill_meal_plan(&self, week_start: &str) -> Result<MealPlan> {
        validate_week_start(week_start)?;
        let ranked = self.suggest()?;
        let plan = planner::auto_fill(week_start, &ranked);
        tracing::debug!(week_start, recipes = ranked.len(), "auto-filled meal plan");
        self.store.upsert_meal_plan(&plan.week_start, &plan.days)
    }

    /// What still has to be bought for the week. No plan means nothing to buy.
    pub fn shopping_list(&self, week_start: &str) -> Result<Vec<ShoppingListItem>> {
        validate_week_start(week_start)?;
        let Some(plan) = self.store.find_meal_plan_by_week_start(week_start)? else {
            return Ok(Vec::new());
        };

        let mut recipes = HashMap::new();
        for id in shopping::planned_recipe_ids(&plan) {
            if let Some(recipe) = self.store.find_recipe_by_id(&id)? {
                recipes.insert(id, recipe);
            }
        }
        let pantry = self.store.find_all_pantry_items()?;
        Ok(shopping::build_shopping_list(&plan, &recipes, &pantry))
    }

    /// The stored plan for a week, or an all-empty one if nothing is saved.
    pub fn meal_plan(&self, week_start: &str) -> Result<MealPlan> {
        validate_week_start(week_start)?;
        Ok(self
            .store
            .find_meal_plan_by_week_start(week_start)?
            .unwrap_or_else(|| MealPlan::empty(week_start)))
    }

    pub fn save_meal_plan(&self, plan: &MealPlan) -> Result<MealPlan> {
        validate_week_start(&plan.week_start)?;
        self.store.upsert_meal_plan(&plan.week_start, &plan.days)
    }

    /// Validate and merge-add stock.
    pub fn add_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        let mut item = item.clone();
        validate_new_pantry_item(&mut item)?;
        self.store.upsert_pantry_item(&item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, MealSlot, NewRecipe, WeekPlan};
    use crate::db::Database;
    use crate::store::MemoryStore;
    use chrono::Weekday;

    const WEEK: &str = "2024-06-10";

    fn ing(name: &str, quantity: f64, unit: &str) -> Ingredient {
        Ingredient {
            name: name.to_string(),
            quantity: Some(quantity),
            unit: Some(unit.to_string()),
            image: None,
            substitutions: vec![],
        }
    }

    fn new_recipe(title: &str, ingredients: Vec<Ingredient>) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            ingredients,
            ..NewRecipe::default()
        }
    }

    fn stock(name: &str, quantity: f64, unit: &str) -> NewPantryItem {
        NewPantryItem {
            name: name.to_string(),
            quantity,
            unit: Some(unit.to_string()),
            image: None,
        }
    }

    #[test]
    fn test_apple_banana_scenario() {
        let svc = LarderService::new(MemoryStore::new());
        let r1 = svc
            .store()
            .insert_recipe(&new_recipe(
                "R1",
                vec![ing("Apple", 1.0, "pc"), ing("Banana", 1.0, "pc")],
            ))
            .unwrap();
        let r2 = svc
            .store()
            .insert_recipe(&new_recipe("R2", vec![ing("Apple", 1.0, "pc")]))
            .unwrap();
        svc.add_pantry_item(&stock("Apple", 2.0, "pc")).unwrap();

        let suggestions = svc.suggest().unwrap();
        assert_eq!(suggestions[0].id, r2.id);
        assert!(suggestions[0].can_make);
        assert_eq!(suggestions[1].id, r1.id);
        assert_eq!(suggestions[1].needed, vec!["Banana".to_string()]);

        let plan = svc.auto_fill_meal_plan(WEEK).unwrap();
        assert_eq!(plan.days.mon.breakfast.as_deref(), Some(r2.id.as_str()));
        assert_eq!(plan.days.mon.lunch.as_deref(), Some(r1.id.as_str()));
        assert!(plan.days.slots().all(|(_, _, id)| id.is_some()));
    }

    #[test]
    fn test_auto_fill_persists_and_overwrites() {
        let svc = LarderService::new(MemoryStore::new());
        let recipe = svc
            .store()
            .insert_recipe(&new_recipe("Soup", vec![]))
            .unwrap();

        let mut manual = MealPlan::empty(WEEK);
        manual
            .days
            .day_mut(Weekday::Wed)
            .set(MealSlot::Dinner, Some("hand-picked".into()));
        svc.save_meal_plan(&manual).unwrap();

        let filled = svc.auto_fill_meal_plan(WEEK).unwrap();
        let stored = svc.meal_plan(WEEK).unwrap();
        assert_eq!(stored, filled);
        assert_eq!(stored.days.wed.dinner.as_deref(), Some(recipe.id.as_str()));
    }

    #[test]
    fn test_auto_fill_is_deterministic() {
        let svc = LarderService::new(MemoryStore::new());
        for title in ["B", "A", "C"] {
            svc.store()
                .insert_recipe(&new_recipe(title, vec![ing(title, 1.0, "pc")]))
                .unwrap();
        }
        svc.add_pantry_item(&stock("C", 1.0, "pc")).unwrap();

        let first = svc.auto_fill_meal_plan(WEEK).unwrap();
        let second = svc.auto_fill_meal_plan(WEEK).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_auto_fill_without_recipes_stores_empty_plan() {
        let svc = LarderService::new(MemoryStore::new());
        let plan = svc.auto_fill_meal_plan(WEEK).unwrap();
        assert_eq!(plan.days, WeekPlan::default());
        assert!(
            svc.store()
                .find_meal_plan_by_week_start(WEEK)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_week_start_must_be_monday() {
        let svc = LarderService::new(MemoryStore::new());
        assert!(svc.auto_fill_meal_plan("2024-06-11").is_err());
        assert!(svc.shopping_list("not-a-date").is_err());
        assert!(svc.meal_plan("2024-06-16").is_err());
        assert!(svc.save_meal_plan(&MealPlan::empty("2024-06-12")).is_err());
    }

    #[test]
    fn test_meal_plan_defaults_to_empty_template() {
        let svc = LarderService::new(MemoryStore::new());
        let plan = svc.meal_plan(WEEK).unwrap();
        assert_eq!(plan, MealPlan::empty(WEEK));
    }

    #[test]
    fn test_shopping_list_without_plan_is_empty() {
        let svc = LarderService::new(MemoryStore::new());
        assert!(svc.shopping_list(WEEK).unwrap().is_empty());
    }

    #[test]
    fn test_shopping_list_flour_scenario() {
        let svc = LarderService::new(MemoryStore::new());
        let bread = svc
            .store()
            .insert_recipe(&new_recipe("Bread", vec![ing("Flour", 100.0, "g")]))
            .unwrap();
        let cake = svc
            .store()
            .insert_recipe(&new_recipe("Cake", vec![ing("Flour", 100.0, "g")]))
            .unwrap();
        svc.add_pantry_item(&stock("Flour", 50.0, "g")).unwrap();

        let mut plan = MealPlan::empty(WEEK);
        plan.days.mon.breakfast = Some(bread.id.clone());
        plan.days.mon.dinner = Some(bread.id.clone());
        plan.days.thu.lunch = Some(cake.id.clone());
        svc.save_meal_plan(&plan).unwrap();

        let list = svc.shopping_list(WEEK).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Flour");
        assert_eq!(list[0].unit.as_deref(), Some("g"));
        // Bread counts once despite two slots: 200 needed, 50 held.
        assert_eq!(list[0].quantity, 150.0);
    }

    #[test]
    fn test_shopping_list_skips_deleted_recipes() {
        let svc = LarderService::new(MemoryStore::new());
        let kept = svc
            .store()
            .insert_recipe(&new_recipe("Kept", vec![ing("Pear", 2.0, "pc")]))
            .unwrap();
        let gone = svc
            .store()
            .insert_recipe(&new_recipe("Gone", vec![ing("Plum", 3.0, "pc")]))
            .unwrap();
        let mut plan = MealPlan::empty(WEEK);
        plan.days.tue.lunch = Some(kept.id.clone());
        plan.days.wed.lunch = Some(gone.id.clone());
        plan.days.fri.lunch = Some("garbage".into());
        svc.save_meal_plan(&plan).unwrap();
        svc.store().delete_recipe(&gone.id).unwrap();

        let list = svc.shopping_list(WEEK).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Pear");
        assert_eq!(list[0].quantity, 2.0);
    }

    #[test]
    fn test_add_pantry_item_validates_and_merges() {
        let svc = LarderService::new(MemoryStore::new());
        assert!(svc.add_pantry_item(&stock("", 1.0, "g")).is_err());
        assert!(svc.add_pantry_item(&stock("Rice", -2.0, "g")).is_err());

        svc.add_pantry_item(&stock("Rice", 100.0, "g")).unwrap();
        let merged = svc.add_pantry_item(&stock("Rice", 25.0, "g")).unwrap();
        assert_eq!(merged.quantity, 125.0);
    }

    #[test]
    fn test_sqlite_backed_service() {
        let svc = LarderService::new(Database::open_in_memory().unwrap());
        let recipe = svc
            .store()
            .insert_recipe(&new_recipe("Porridge", vec![ing("Oats", 40.0, "g")]))
            .unwrap();
        svc.add_pantry_item(&stock("Oats", 10.0, "g")).unwrap();

        let plan = svc.auto_fill_meal_plan(WEEK).unwrap();
        assert!(plan
            .days
            .slots()
            .all(|(_, _, id)| id == Some(recipe.id.as_str())));

        let list = svc.shopping_list(WEEK).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].quantity, 30.0);
    }

    #[test]
    fn test_service_over_borrowed_store() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&new_recipe("Toast", vec![])).unwrap();
        let svc = LarderService::new(&db);
        let suggestions = svc.suggest().unwrap();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].can_make);
    }
}
