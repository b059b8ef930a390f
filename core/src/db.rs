use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::{
    Ingredient, MealPlan, NewPantryItem, NewRecipe, NewReminder, NewReview, PantryItem, Recipe,
    RecipeWithReviews, Reminder, ReminderKind, Review, UpdatePantryItem, WeekPlan,
    normalize_unit, validate_new_recipe, validate_new_reminder, validate_pantry_update,
    validate_rating,
};
use crate::store::Store;

pub struct Database {
    conn: Connection,
}

const RECIPE_COLUMNS: &str =
    "id, title, description, image, prep_time_min, age_range, steps, tags, created_at, updated_at";
const PANTRY_COLUMNS: &str = "id, name, quantity, unit, image, created_at, updated_at";
const REVIEW_COLUMNS: &str = "id, recipe_id, rating, note, created_at";
const REMINDER_COLUMNS: &str = "id, title, due_at, kind, notes, created_at";

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    image TEXT,
                    prep_time_min INTEGER NOT NULL DEFAULT 0 CHECK (prep_time_min >= 0),
                    age_range TEXT NOT NULL DEFAULT '',
                    steps TEXT NOT NULL DEFAULT '[]',
                    tags TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    quantity REAL,
                    unit TEXT,
                    image TEXT,
                    substitutions TEXT NOT NULL DEFAULT '[]'
                );

                CREATE TABLE IF NOT EXISTS reviews (
                    id TEXT PRIMARY KEY,
                    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    note TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pantry_items (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    quantity REAL NOT NULL DEFAULT 1 CHECK (quantity >= 0),
                    unit TEXT,
                    unit_key TEXT NOT NULL DEFAULT '',
                    image TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (name, unit_key)
                );

                CREATE TABLE IF NOT EXISTS meal_plans (
                    week_start TEXT PRIMARY KEY,
                    days TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reminders (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    due_at TEXT NOT NULL,
                    kind TEXT NOT NULL DEFAULT 'meal',
                    notes TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title);
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id, position);
                CREATE INDEX IF NOT EXISTS idx_reviews_recipe ON reviews(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(due_at);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects RECIPE_COLUMNS. Ingredients are loaded separately.
    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            image: row.get(3)?,
            prep_time_min: row.get(4)?,
            age_range: row.get(5)?,
            ingredients: Vec::new(),
            steps: json_column(row, 6)?,
            tags: json_column(row, 7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // 0: recipe_id, 1: name, 2: quantity, 3: unit, 4: image, 5: substitutions
    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<(String, Ingredient)> {
        Ok((
            row.get(0)?,
            Ingredient {
                name: row.get(1)?,
                quantity: row.get(2)?,
                unit: row.get(3)?,
                image: row.get(4)?,
                substitutions: json_column(row, 5)?,
            },
        ))
    }

    fn pantry_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<PantryItem> {
        Ok(PantryItem {
            id: row.get(0)?,
            name: row.get(1)?,
            quantity: row.get(2)?,
            unit: row.get(3)?,
            image: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn review_from_row(row: &rusqlite::Row) -> rusqlite::Result<Review> {
        Ok(Review {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            rating: row.get(2)?,
            note: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn reminder_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reminder> {
        let kind: String = row.get(3)?;
        let kind = ReminderKind::parse(&kind)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        Ok(Reminder {
            id: row.get(0)?,
            title: row.get(1)?,
            due_at: row.get(2)?,
            kind,
            notes: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // --- Recipes ---

    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let mut recipe = recipe.clone();
        validate_new_recipe(&mut recipe)?;

        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recipes (id, title, description, image, prep_time_min, age_range, steps, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                recipe.title,
                recipe.description,
                recipe.image,
                recipe.prep_time_min,
                recipe.age_range,
                to_json(&recipe.steps)?,
                to_json(&recipe.tags)?,
                now,
                now,
            ],
        )?;
        insert_ingredients(&tx, &id, &recipe.ingredients)?;
        tx.commit()?;

        self.get_recipe(&id)?
            .context("Recipe not found after insert")
    }

    pub fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
                params![id],
                Self::recipe_from_row,
            )
            .optional()?;
        let Some(mut recipe) = recipe else {
            return Ok(None);
        };
        recipe.ingredients = self.get_recipe_ingredients(id)?;
        Ok(Some(recipe))
    }

    pub fn get_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<Ingredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipe_id, name, quantity, unit, image, substitutions
             FROM recipe_ingredients WHERE recipe_id = ?1 ORDER BY position, id",
        )?;
        let ingredients = stmt
            .query_map(params![recipe_id], Self::ingredient_from_row)?
            .map(|r| r.map(|(_, ing)| ing))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    /// All recipes ordered by title, with ingredients loaded in one pass.
    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY title, id"
        ))?;
        let mut recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT recipe_id, name, quantity, unit, image, substitutions
             FROM recipe_ingredients ORDER BY recipe_id, position, id",
        )?;
        let mut by_recipe: HashMap<String, Vec<Ingredient>> = HashMap::new();
        for row in stmt.query_map([], Self::ingredient_from_row)? {
            let (recipe_id, ing) = row?;
            by_recipe.entry(recipe_id).or_default().push(ing);
        }
        for recipe in &mut recipes {
            recipe.ingredients = by_recipe.remove(&recipe.id).unwrap_or_default();
        }
        Ok(recipes)
    }

    pub fn count_recipes(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Replace every field of a recipe, ingredients included.
    pub fn update_recipe(&self, id: &str, recipe: &NewRecipe) -> Result<Option<Recipe>> {
        let mut recipe = recipe.clone();
        validate_new_recipe(&mut recipe)?;

        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE recipes SET title = ?1, description = ?2, image = ?3, prep_time_min = ?4,
             age_range = ?5, steps = ?6, tags = ?7, updated_at = ?8 WHERE id = ?9",
            params![
                recipe.title,
                recipe.description,
                recipe.image,
                recipe.prep_time_min,
                recipe.age_range,
                to_json(&recipe.steps)?,
                to_json(&recipe.tags)?,
                now,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![id],
        )?;
        insert_ingredients(&tx, id, &recipe.ingredients)?;
        tx.commit()?;

        self.get_recipe(id)
    }

    /// Delete a recipe along with its ingredients and reviews.
    pub fn delete_recipe(&self, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        // CASCADE covers these too, but only when foreign_keys is on for this connection
        tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM reviews WHERE recipe_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn get_recipe_with_reviews(&self, id: &str) -> Result<Option<RecipeWithReviews>> {
        let Some(recipe) = self.get_recipe(id)? else {
            return Ok(None);
        };
        let reviews = self.list_reviews(id)?;
        Ok(Some(with_reviews(recipe, reviews)))
    }

    pub fn list_recipes_with_reviews(&self) -> Result<Vec<RecipeWithReviews>> {
        let recipes = self.list_recipes()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC, rowid DESC"
        ))?;
        let mut by_recipe: HashMap<String, Vec<Review>> = HashMap::new();
        for row in stmt.query_map([], Self::review_from_row)? {
            let review = row?;
            by_recipe
                .entry(review.recipe_id.clone())
                .or_default()
                .push(review);
        }
        Ok(recipes
            .into_iter()
            .map(|recipe| {
                let reviews = by_recipe.remove(&recipe.id).unwrap_or_default();
                with_reviews(recipe, reviews)
            })
            .collect())
    }

    // --- Reviews ---

    pub fn add_review(&self, review: &NewReview) -> Result<Review> {
        validate_rating(review.rating)?;
        if self.get_recipe(&review.recipe_id)?.is_none() {
            bail!("Recipe {} not found", review.recipe_id);
        }
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO reviews (id, recipe_id, rating, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, review.recipe_id, review.rating, review.note, now],
        )?;
        Ok(Review {
            id,
            recipe_id: review.recipe_id.clone(),
            rating: review.rating,
            note: review.note.clone(),
            created_at: now,
        })
    }

    /// Reviews for a recipe, newest first.
    pub fn list_reviews(&self, recipe_id: &str) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE recipe_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let reviews = stmt
            .query_map(params![recipe_id], Self::review_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    // --- Pantry ---

    pub fn list_pantry(&self) -> Result<Vec<PantryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PANTRY_COLUMNS} FROM pantry_items ORDER BY name, unit_key"
        ))?;
        let items = stmt
            .query_map([], Self::pantry_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn get_pantry_item(&self, id: &str) -> Result<Option<PantryItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE id = ?1"),
                params![id],
                Self::pantry_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn find_pantry_item(&self, name: &str, unit: Option<&str>) -> Result<Option<PantryItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE name = ?1 AND unit_key = ?2"
                ),
                params![name, unit.unwrap_or("")],
                Self::pantry_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Add stock. A row with the same exact (name, unit) absorbs the quantity
    /// in a single statement; otherwise a new row is created.
    pub fn upsert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        let unit = normalize_unit(item.unit.clone());
        let unit_key = unit.clone().unwrap_or_default();
        let now = Local::now().to_rfc3339();
        let id: String = self
            .conn
            .query_row(
                "INSERT INTO pantry_items (id, name, quantity, unit, unit_key, image, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(name, unit_key) DO UPDATE SET
                    quantity = pantry_items.quantity + excluded.quantity,
                    updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    Uuid::new_v4().to_string(),
                    item.name,
                    item.quantity,
                    unit,
                    unit_key,
                    item.image,
                    now,
                    now,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to store pantry item '{}'", item.name))?;
        self.get_pantry_item(&id)?
            .context("Pantry item not found after upsert")
    }

    /// Patch quantity and/or unit. `unit: Some("")` makes the item unitless.
    /// Moving onto another row's (name, unit) merges the two, keeping the other
    /// row's id.
    pub fn update_pantry_item(
        &self,
        id: &str,
        update: &UpdatePantryItem,
    ) -> Result<Option<PantryItem>> {
        validate_pantry_update(update)?;
        let Some(current) = self.get_pantry_item(id)? else {
            return Ok(None);
        };

        let quantity = update.quantity.unwrap_or(current.quantity);
        let unit = match &update.unit {
            Some(u) => normalize_unit(Some(u.clone())),
            None => current.unit.clone(),
        };
        let unit_key = unit.clone().unwrap_or_default();
        let now = Local::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        let collision: Option<String> = tx
            .query_row(
                "SELECT id FROM pantry_items WHERE name = ?1 AND unit_key = ?2 AND id != ?3",
                params![current.name, unit_key, id],
                |row| row.get(0),
            )
            .optional()?;

        let result_id = if let Some(other) = collision {
            tx.execute(
                "UPDATE pantry_items SET quantity = quantity + ?1, updated_at = ?2 WHERE id = ?3",
                params![quantity, now, other],
            )?;
            tx.execute("DELETE FROM pantry_items WHERE id = ?1", params![id])?;
            tracing::debug!(from = id, into = %other, "merged pantry items after unit change");
            other
        } else {
            tx.execute(
                "UPDATE pantry_items SET quantity = ?1, unit = ?2, unit_key = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![quantity, unit, unit_key, now, id],
            )?;
            id.to_string()
        };
        tx.commit()?;

        self.get_pantry_item(&result_id)
    }

    pub fn delete_pantry_item(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM pantry_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Meal plans ---

    pub fn get_meal_plan(&self, week_start: &str) -> Result<Option<MealPlan>> {
        let plan = self
            .conn
            .query_row(
                "SELECT week_start, days FROM meal_plans WHERE week_start = ?1",
                params![week_start],
                |row| {
                    Ok(MealPlan {
                        week_start: row.get(0)?,
                        days: json_column(row, 1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to load meal plan for {week_start}"))?;
        Ok(plan)
    }

    pub fn upsert_meal_plan(&self, week_start: &str, days: &WeekPlan) -> Result<MealPlan> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO meal_plans (week_start, days, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(week_start) DO UPDATE SET
                days = excluded.days,
                updated_at = excluded.updated_at",
            params![week_start, to_json(days)?, now, now],
        )?;
        Ok(MealPlan {
            week_start: week_start.to_string(),
            days: days.clone(),
        })
    }

    // --- Reminders ---

    pub fn insert_reminder(&self, reminder: &NewReminder) -> Result<Reminder> {
        validate_new_reminder(reminder)?;
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO reminders (id, title, due_at, kind, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                reminder.title,
                reminder.due_at,
                reminder.kind.as_str(),
                reminder.notes,
                now
            ],
        )?;
        Ok(Reminder {
            id,
            title: reminder.title.clone(),
            due_at: reminder.due_at.clone(),
            kind: reminder.kind,
            notes: reminder.notes.clone(),
            created_at: now,
        })
    }

    pub fn list_reminders(&self) -> Result<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY due_at, created_at"
        ))?;
        let reminders = stmt
            .query_map([], Self::reminder_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    pub fn delete_reminder(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

impl Store for Database {
    fn find_all_recipes(&self) -> Result<Vec<Recipe>> {
        self.list_recipes()
    }

    fn find_recipe_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        self.get_recipe(id)
    }

    fn find_all_pantry_items(&self) -> Result<Vec<PantryItem>> {
        self.list_pantry()
    }

    fn find_pantry_item_by_name_unit(
        &self,
        name: &str,
        unit: Option<&str>,
    ) -> Result<Option<PantryItem>> {
        self.find_pantry_item(name, unit)
    }

    fn upsert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        Database::upsert_pantry_item(self, item)
    }

    fn find_meal_plan_by_week_start(&self, week_start: &str) -> Result<Option<MealPlan>> {
        self.get_meal_plan(week_start)
    }

    fn upsert_meal_plan(&self, week_start: &str, days: &WeekPlan) -> Result<MealPlan> {
        Database::upsert_meal_plan(self, week_start, days)
    }
}

fn insert_ingredients(
    conn: &Connection,
    recipe_id: &str,
    ingredients: &[Ingredient],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO recipe_ingredients (recipe_id, position, name, quantity, unit, image, substitutions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, ing) in (0_i64..).zip(ingredients) {
        stmt.execute(params![
            recipe_id,
            position,
            ing.name,
            ing.quantity,
            ing.unit,
            ing.image,
            to_json(&ing.substitutions)?,
        ])?;
    }
    Ok(())
}

fn with_reviews(recipe: Recipe, reviews: Vec<Review>) -> RecipeWithReviews {
    let avg_rating = if reviews.is_empty() {
        None
    } else {
        let total: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = total / reviews.len() as f64;
        Some((avg * 100.0).round() / 100.0)
    };
    RecipeWithReviews {
        recipe,
        reviews,
        avg_rating,
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode JSON column")
}

/// Decode a JSON text column, surfacing bad data as a conversion error on
/// that column instead of a panic or a silent default.
fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealSlot;
    use chrono::Weekday;

    fn ing(name: &str, quantity: Option<f64>, unit: Option<&str>, subs: &[&str]) -> Ingredient {
        Ingredient {
            name: name.to_string(),
            quantity,
            unit: unit.map(String::from),
            image: None,
            substitutions: subs.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn sample_recipe(title: &str) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            description: "Smooth and simple".to_string(),
            image: None,
            prep_time_min: 15,
            age_range: "6-12 months".to_string(),
            ingredients: vec![
                ing("Sweet Potato", Some(100.0), Some("g"), &["Pumpkin"]),
                ing("Carrot", Some(60.0), Some("g"), &[]),
            ],
            steps: vec!["Steam".to_string(), "Blend".to_string()],
            tags: vec!["easy".to_string()],
        }
    }

    fn pantry(name: &str, quantity: f64, unit: Option<&str>) -> NewPantryItem {
        NewPantryItem {
            name: name.to_string(),
            quantity,
            unit: unit.map(String::from),
            image: None,
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_insert_and_get_recipe() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Orange Mash")).unwrap();

        assert!(Uuid::parse_str(&recipe.id).is_ok());
        assert_eq!(recipe.title, "Orange Mash");
        assert_eq!(recipe.prep_time_min, 15);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "Sweet Potato");
        assert_eq!(recipe.ingredients[0].substitutions, vec!["Pumpkin"]);
        assert_eq!(recipe.ingredients[1].quantity, Some(60.0));
        assert_eq!(recipe.steps, vec!["Steam", "Blend"]);

        let fetched = db.get_recipe(&recipe.id).unwrap().unwrap();
        assert_eq!(fetched.ingredients, recipe.ingredients);
        assert!(db.get_recipe("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_recipe_rejects_empty_title() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_recipe(&sample_recipe("  ")).is_err());
        assert_eq!(db.count_recipes().unwrap(), 0);
    }

    #[test]
    fn test_list_recipes_sorted_with_ingredients() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe("Pear Puree")).unwrap();
        db.insert_recipe(&sample_recipe("Apple Puree")).unwrap();
        let mut bare = sample_recipe("Broth");
        bare.ingredients.clear();
        db.insert_recipe(&bare).unwrap();

        let recipes = db.list_recipes().unwrap();
        let titles: Vec<_> = recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple Puree", "Broth", "Pear Puree"]);
        assert_eq!(recipes[0].ingredients.len(), 2);
        assert!(recipes[1].ingredients.is_empty());
        assert_eq!(db.count_recipes().unwrap(), 3);
    }

    #[test]
    fn test_update_recipe_replaces_ingredients() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Mash")).unwrap();

        let mut changed = sample_recipe("Better Mash");
        changed.ingredients = vec![ing("Potato", None, None, &[])];
        let updated = db.update_recipe(&recipe.id, &changed).unwrap().unwrap();

        assert_eq!(updated.id, recipe.id);
        assert_eq!(updated.title, "Better Mash");
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].name, "Potato");
        assert_eq!(count(&db, "recipe_ingredients"), 1);

        assert!(db.update_recipe("missing", &changed).unwrap().is_none());
    }

    #[test]
    fn test_delete_recipe_cascades_reviews() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Mash")).unwrap();
        let other = db.insert_recipe(&sample_recipe("Other")).unwrap();
        for (rid, rating) in [(&recipe.id, 5), (&recipe.id, 3), (&other.id, 4)] {
            db.add_review(&NewReview {
                recipe_id: rid.clone(),
                rating,
                note: None,
            })
            .unwrap();
        }

        assert!(db.delete_recipe(&recipe.id).unwrap());
        assert!(db.list_reviews(&recipe.id).unwrap().is_empty());
        assert_eq!(db.list_reviews(&other.id).unwrap().len(), 1);
        assert_eq!(count(&db, "reviews"), 1);
        assert_eq!(count(&db, "recipe_ingredients"), 2);
        assert!(!db.delete_recipe(&recipe.id).unwrap());
    }

    #[test]
    fn test_reviews_require_existing_recipe_and_valid_rating() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Mash")).unwrap();

        let orphan = NewReview {
            recipe_id: Uuid::new_v4().to_string(),
            rating: 4,
            note: None,
        };
        assert!(db.add_review(&orphan).is_err());

        let out_of_range = NewReview {
            recipe_id: recipe.id.clone(),
            rating: 6,
            note: None,
        };
        assert!(db.add_review(&out_of_range).is_err());
        assert_eq!(count(&db, "reviews"), 0);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO reviews (id, recipe_id, rating, created_at) VALUES ('r', 'nope', 3, 'now')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_recipe_with_reviews_average() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Mash")).unwrap();
        let plain = db.insert_recipe(&sample_recipe("Plain")).unwrap();
        for rating in [5, 4, 4] {
            db.add_review(&NewReview {
                recipe_id: recipe.id.clone(),
                rating,
                note: Some("good".into()),
            })
            .unwrap();
        }

        let detail = db.get_recipe_with_reviews(&recipe.id).unwrap().unwrap();
        assert_eq!(detail.reviews.len(), 3);
        assert_eq!(detail.avg_rating, Some(4.33));

        let all = db.list_recipes_with_reviews().unwrap();
        assert_eq!(all.len(), 2);
        let plain_entry = all.iter().find(|r| r.recipe.id == plain.id).unwrap();
        assert!(plain_entry.reviews.is_empty());
        assert_eq!(plain_entry.avg_rating, None);
    }

    #[test]
    fn test_pantry_upsert_merges_exact_key() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_pantry_item(&pantry("Flour", 100.0, Some("g"))).unwrap();
        let mut again = pantry("Flour", 50.0, Some("g"));
        again.image = Some("flour.png".into());
        let merged = db.upsert_pantry_item(&again).unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 150.0);
        assert!(merged.image.is_none());
        assert_eq!(db.list_pantry().unwrap().len(), 1);
    }

    #[test]
    fn test_pantry_upsert_distinguishes_case_and_unit() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_pantry_item(&pantry("Flour", 1.0, Some("g"))).unwrap();
        db.upsert_pantry_item(&pantry("flour", 1.0, Some("g"))).unwrap();
        db.upsert_pantry_item(&pantry("Flour", 1.0, Some("kg"))).unwrap();
        db.upsert_pantry_item(&pantry("Flour", 1.0, None)).unwrap();
        // a blank unit is the same key as no unit
        db.upsert_pantry_item(&pantry("Flour", 2.0, Some(""))).unwrap();

        let items = db.list_pantry().unwrap();
        assert_eq!(items.len(), 4);
        let unitless = db.find_pantry_item("Flour", None).unwrap().unwrap();
        assert_eq!(unitless.quantity, 3.0);
        assert!(unitless.unit.is_none());
    }

    #[test]
    fn test_pantry_rejects_negative_quantity() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.upsert_pantry_item(&pantry("Salt", -1.0, None)).is_err());
    }

    #[test]
    fn test_update_pantry_item() {
        let db = Database::open_in_memory().unwrap();
        let item = db.upsert_pantry_item(&pantry("Milk", 1.0, Some("l"))).unwrap();

        let updated = db
            .update_pantry_item(
                &item.id,
                &UpdatePantryItem {
                    quantity: Some(2.5),
                    unit: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 2.5);
        assert_eq!(updated.unit.as_deref(), Some("l"));

        let unitless = db
            .update_pantry_item(
                &item.id,
                &UpdatePantryItem {
                    quantity: None,
                    unit: Some(String::new()),
                },
            )
            .unwrap()
            .unwrap();
        assert!(unitless.unit.is_none());
        assert_eq!(unitless.quantity, 2.5);

        let negative = UpdatePantryItem {
            quantity: Some(-1.0),
            unit: None,
        };
        assert!(db.update_pantry_item(&item.id, &negative).is_err());
        assert!(
            db.update_pantry_item("missing", &UpdatePantryItem::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_update_pantry_unit_collision_merges() {
        let db = Database::open_in_memory().unwrap();
        let grams = db.upsert_pantry_item(&pantry("Rice", 200.0, Some("g"))).unwrap();
        let loose = db.upsert_pantry_item(&pantry("Rice", 50.0, None)).unwrap();

        let merged = db
            .update_pantry_item(
                &loose.id,
                &UpdatePantryItem {
                    quantity: None,
                    unit: Some("g".into()),
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(merged.id, grams.id);
        assert_eq!(merged.quantity, 250.0);
        assert!(db.get_pantry_item(&loose.id).unwrap().is_none());
        assert_eq!(db.list_pantry().unwrap().len(), 1);
    }

    #[test]
    fn test_list_pantry_order_and_delete() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_pantry_item(&pantry("Peas", 1.0, Some("g"))).unwrap();
        let apple = db.upsert_pantry_item(&pantry("Apple", 1.0, Some("pc"))).unwrap();
        db.upsert_pantry_item(&pantry("Apple", 1.0, None)).unwrap();

        let names: Vec<_> = db
            .list_pantry()
            .unwrap()
            .into_iter()
            .map(|p| (p.name, p.unit))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Apple".to_string(), None),
                ("Apple".to_string(), Some("pc".to_string())),
                ("Peas".to_string(), Some("g".to_string())),
            ]
        );

        assert!(db.delete_pantry_item(&apple.id).unwrap());
        assert!(!db.delete_pantry_item(&apple.id).unwrap());
        assert_eq!(db.list_pantry().unwrap().len(), 2);
    }

    #[test]
    fn test_meal_plan_upsert_overwrites() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_meal_plan("2024-06-10").unwrap().is_none());

        let mut days = WeekPlan::default();
        days.day_mut(Weekday::Tue).set(MealSlot::Dinner, Some("r1".into()));
        db.upsert_meal_plan("2024-06-10", &days).unwrap();

        let mut replaced = WeekPlan::default();
        replaced.day_mut(Weekday::Fri).set(MealSlot::Lunch, Some("r2".into()));
        db.upsert_meal_plan("2024-06-10", &replaced).unwrap();

        let plan = db.get_meal_plan("2024-06-10").unwrap().unwrap();
        assert_eq!(plan.days, replaced);
        assert!(plan.days.tue.dinner.is_none());
        assert_eq!(count(&db, "meal_plans"), 1);
    }

    #[test]
    fn test_malformed_plan_json_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO meal_plans (week_start, days, created_at, updated_at)
                 VALUES ('2024-06-10', '{\"Mon\": ', 'now', 'now')",
                [],
            )
            .unwrap();
        assert!(db.get_meal_plan("2024-06-10").is_err());

        db.conn
            .execute(
                "INSERT INTO meal_plans (week_start, days, created_at, updated_at)
                 VALUES ('2024-06-17', '{\"Someday\": {}}', 'now', 'now')",
                [],
            )
            .unwrap();
        assert!(db.get_meal_plan("2024-06-17").is_err());
    }

    #[test]
    fn test_malformed_recipe_json_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Mash")).unwrap();
        db.conn
            .execute(
                "UPDATE recipes SET steps = 'not json' WHERE id = ?1",
                params![recipe.id],
            )
            .unwrap();
        assert!(db.get_recipe(&recipe.id).is_err());
        assert!(db.list_recipes().is_err());
    }

    #[test]
    fn test_reminders() {
        let db = Database::open_in_memory().unwrap();
        let later = db
            .insert_reminder(&NewReminder {
                title: "Cook dinner".into(),
                due_at: "2024-06-15T18:00".into(),
                kind: ReminderKind::Meal,
                notes: None,
            })
            .unwrap();
        db.insert_reminder(&NewReminder {
            title: "Buy oats".into(),
            due_at: "2024-06-15T09:00".into(),
            kind: ReminderKind::Shopping,
            notes: Some("the big bag".into()),
        })
        .unwrap();

        let reminders = db.list_reminders().unwrap();
        assert_eq!(reminders.len(), 2);
        assert_eq!(reminders[0].title, "Buy oats");
        assert_eq!(reminders[0].kind, ReminderKind::Shopping);

        assert!(db.delete_reminder(&later.id).unwrap());
        assert!(!db.delete_reminder(&later.id).unwrap());

        let bad = NewReminder {
            title: "Bad".into(),
            due_at: "soon".into(),
            kind: ReminderKind::Other,
            notes: None,
        };
        assert!(db.insert_reminder(&bad).is_err());
    }

    #[test]
    fn test_store_impl_matches_inherent_methods() {
        let db = Database::open_in_memory().unwrap();
        let item = Store::upsert_pantry_item(&db, &pantry("Oats", 40.0, Some("g"))).unwrap();
        let found = db
            .find_pantry_item_by_name_unit("Oats", Some("g"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, item.id);
        assert!(db.find_pantry_item_by_name_unit("Oats", None).unwrap().is_none());

        let plan = Store::upsert_meal_plan(&db, "2024-06-10", &WeekPlan::default()).unwrap();
        assert_eq!(
            db.find_meal_plan_by_week_start("2024-06-10").unwrap(),
            Some(plan)
        );
    }
}
