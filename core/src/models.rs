use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

// --- Recipes ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub substitutions: Vec<String>,
}

impl Ingredient {
    /// Quantity the recipe calls for; an absent quantity counts as one.
    #[must_use]
    pub fn required_quantity(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub prep_time_min: u32,
    pub age_range: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prep_time_min: u32,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub recipe_id: String,
    pub rating: u8,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub recipe_id: String,
    pub rating: u8,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeWithReviews {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub reviews: Vec<Review>,
    pub avg_rating: Option<f64>,
}

// --- Pantry ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPantryItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePantryItem {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

impl UpdatePantryItem {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.unit.is_none()
    }
}

// --- Meal plans ---

pub const SLOT_NAMES: &[&str] = &["breakfast", "lunch", "dinner"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "breakfast" => Ok(MealSlot::Breakfast),
            "lunch" => Ok(MealSlot::Lunch),
            "dinner" => Ok(MealSlot::Dinner),
            _ => bail!(
                "Invalid meal slot '{s}'. Must be one of: {}",
                SLOT_NAMES.join(", ")
            ),
        }
    }
}

/// Recipe references for one day. Values are raw recipe ids as saved by the
/// user; they are only resolved when a shopping list is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaySlots {
    #[serde(default)]
    pub breakfast: Option<String>,
    #[serde(default)]
    pub lunch: Option<String>,
    #[serde(default)]
    pub dinner: Option<String>,
}

impl DaySlots {
    #[must_use]
    pub fn get(&self, slot: MealSlot) -> Option<&str> {
        match slot {
            MealSlot::Breakfast => self.breakfast.as_deref(),
            MealSlot::Lunch => self.lunch.as_deref(),
            MealSlot::Dinner => self.dinner.as_deref(),
        }
    }

    pub fn set(&mut self, slot: MealSlot, recipe_id: Option<String>) {
        match slot {
            MealSlot::Breakfast => self.breakfast = recipe_id,
            MealSlot::Lunch => self.lunch = recipe_id,
            MealSlot::Dinner => self.dinner = recipe_id,
        }
    }
}

/// Seven days of three slots each. The struct shape keeps every plan at
/// exactly 7 × 3 keys, whatever the input looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeekPlan {
    #[serde(rename = "Mon", default)]
    pub mon: DaySlots,
    #[serde(rename = "Tue", default)]
    pub tue: DaySlots,
    #[serde(rename = "Wed", default)]
    pub wed: DaySlots,
    #[serde(rename = "Thu", default)]
    pub thu: DaySlots,
    #[serde(rename = "Fri", default)]
    pub fri: DaySlots,
    #[serde(rename = "Sat", default)]
    pub sat: DaySlots,
    #[serde(rename = "Sun", default)]
    pub sun: DaySlots,
}

impl WeekPlan {
    pub const DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    #[must_use]
    pub fn day(&self, day: Weekday) -> &DaySlots {
        match day {
            Weekday::Mon => &self.mon,
            Weekday::Tue => &self.tue,
            Weekday::Wed => &self.wed,
            Weekday::Thu => &self.thu,
            Weekday::Fri => &self.fri,
            Weekday::Sat => &self.sat,
            Weekday::Sun => &self.sun,
        }
    }

    pub fn day_mut(&mut self, day: Weekday) -> &mut DaySlots {
        match day {
            Weekday::Mon => &mut self.mon,
            Weekday::Tue => &mut self.tue,
            Weekday::Wed => &mut self.wed,
            Weekday::Thu => &mut self.thu,
            Weekday::Fri => &mut self.fri,
            Weekday::Sat => &mut self.sat,
            Weekday::Sun => &mut self.sun,
        }
    }

    /// All 21 slots in visiting order: Mon..Sun, breakfast/lunch/dinner.
    pub fn slots(&self) -> impl Iterator<Item = (Weekday, MealSlot, Option<&str>)> + '_ {
        Self::DAYS.into_iter().flat_map(move |day| {
            MealSlot::ALL
                .into_iter()
                .map(move |slot| (day, slot, self.day(day).get(slot)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub week_start: String,
    pub days: WeekPlan,
}

impl MealPlan {
    #[must_use]
    pub fn empty(week_start: &str) -> Self {
        MealPlan {
            week_start: week_start.to_string(),
            days: WeekPlan::default(),
        }
    }
}

// --- Derived views ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub needed: Vec<String>,
    pub can_make: bool,
    pub missing_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub unit: Option<String>,
    pub quantity: f64,
    pub purchased: bool,
}

// --- Reminders ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    #[default]
    Meal,
    Shopping,
    Other,
}

impl ReminderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderKind::Meal => "meal",
            ReminderKind::Shopping => "shopping",
            ReminderKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "meal" => Ok(ReminderKind::Meal),
            "shopping" => Ok(ReminderKind::Shopping),
            "other" => Ok(ReminderKind::Other),
            _ => bail!("Invalid reminder type '{s}'. Must be one of: meal, shopping, other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub due_at: String,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub due_at: String,
    #[serde(rename = "type", default)]
    pub kind: ReminderKind,
    #[serde(default)]
    pub notes: Option<String>,
}

// --- Validation ---

/// Collapse blank units to `None` so "unitless" has a single representation.
#[must_use]
pub fn normalize_unit(unit: Option<String>) -> Option<String> {
    unit.filter(|u| !u.trim().is_empty())
}

pub fn validate_new_recipe(recipe: &mut NewRecipe) -> Result<()> {
    if recipe.title.trim().is_empty() {
        bail!("Recipe title must not be empty");
    }
    for ing in &mut recipe.ingredients {
        if let Some(q) = ing.quantity {
            if !q.is_finite() || q <= 0.0 {
                bail!(
                    "Ingredient '{}' quantity must be greater than 0 (got {q})",
                    ing.name
                );
            }
        }
        ing.unit = normalize_unit(ing.unit.take());
    }
    Ok(())
}

fn validate_pantry_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        bail!("Pantry quantity must not be negative (got {quantity})");
    }
    Ok(())
}

pub fn validate_new_pantry_item(item: &mut NewPantryItem) -> Result<()> {
    if item.name.trim().is_empty() {
        bail!("Pantry item name must not be empty");
    }
    validate_pantry_quantity(item.quantity)?;
    item.unit = normalize_unit(item.unit.take());
    Ok(())
}

/// A patch unit of `Some("")` is kept as-is: it means "make this unitless",
/// while `None` leaves the unit alone.
pub fn validate_pantry_update(update: &UpdatePantryItem) -> Result<()> {
    if let Some(q) = update.quantity {
        validate_pantry_quantity(q)?;
    }
    Ok(())
}

pub fn validate_rating(rating: u8) -> Result<()> {
    if !(1..=5).contains(&rating) {
        bail!("Rating must be between 1 and 5 (got {rating})");
    }
    Ok(())
}

/// Parse a week key. Week keys are the ISO date of the week's Monday.
pub fn validate_week_start(week_start: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(week_start, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!("Invalid week_start '{week_start}'. Use YYYY-MM-DD")
    })?;
    if date.weekday() != Weekday::Mon {
        bail!("week_start '{week_start}' is a {}, not a Monday", date.weekday());
    }
    Ok(date)
}

/// Monday of the week containing `date`.
#[must_use]
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn validate_new_reminder(reminder: &NewReminder) -> Result<()> {
    if reminder.title.trim().is_empty() {
        bail!("Reminder title must not be empty");
    }
    let due = reminder.due_at.as_str();
    let parses = chrono::DateTime::parse_from_rfc3339(due).is_ok()
        || NaiveDateTime::parse_from_str(due, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(due, "%Y-%m-%dT%H:%M").is_ok();
    if !parses {
        bail!("Invalid due_at '{due}'. Use an ISO datetime like 2024-06-15T18:00");
    }
    Ok(())
}
