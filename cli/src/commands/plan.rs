use anyhow::{Result, bail};
use std::collections::HashMap;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::models::{MealPlan, MealSlot, WeekPlan};
use larder_core::service::LarderService;

use super::helpers::{format_week, parse_day, parse_week, print_json, truncate};

pub(crate) fn cmd_suggest(db: &Database, ready: bool, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct SuggestionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Missing")]
        missing: usize,
        #[tabled(rename = "Need to buy")]
        needed: String,
    }

    let mut suggestions = LarderService::new(db).suggest()?;
    if ready {
        suggestions.retain(|s| s.can_make);
    }

    if json {
        return print_json(&suggestions);
    }
    if suggestions.is_empty() {
        if ready {
            eprintln!("Nothing can be made from the pantry right now");
        } else {
            eprintln!("No recipes yet. Try: larder seed");
        }
        return Ok(());
    }

    let rows: Vec<SuggestionRow> = suggestions
        .iter()
        .map(|s| SuggestionRow {
            id: s.id.clone(),
            title: truncate(&s.title, 30),
            missing: s.missing_count,
            needed: if s.can_make {
                "ready to cook".to_string()
            } else {
                truncate(&s.needed.join(", "), 40)
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_plan_show(db: &Database, week: Option<&str>, json: bool) -> Result<()> {
    let week_start = format_week(parse_week(week)?);
    let plan = LarderService::new(db).meal_plan(&week_start)?;
    if json {
        return print_json(&plan);
    }
    print_plan(db, &plan)
}

pub(crate) fn cmd_plan_set(
    db: &Database,
    week: &str,
    day: &str,
    slot: &str,
    recipe: &str,
    json: bool,
) -> Result<()> {
    let week_start = format_week(parse_week(Some(week))?);
    let day = parse_day(day)?;
    let slot = MealSlot::parse(slot)?;
    let recipe_id = match recipe.trim() {
        "" | "none" | "-" => None,
        id => {
            if db.get_recipe(id)?.is_none() {
                bail!("Recipe {id} not found");
            }
            Some(id.to_string())
        }
    };

    let service = LarderService::new(db);
    let mut plan = service.meal_plan(&week_start)?;
    plan.days.day_mut(day).set(slot, recipe_id);
    let saved = service.save_meal_plan(&plan)?;

    if json {
        return print_json(&saved);
    }
    match saved.days.day(day).get(slot) {
        Some(id) => {
            let title = db.get_recipe(id)?.map_or_else(|| id.to_string(), |r| r.title);
            println!("{day} {} ({week_start}): {title}", slot.as_str());
        }
        None => println!("Cleared {day} {} ({week_start})", slot.as_str()),
    }
    Ok(())
}

pub(crate) fn cmd_plan_auto_fill(db: &Database, week: Option<&str>, json: bool) -> Result<()> {
    let week_start = format_week(parse_week(week)?);
    let plan = LarderService::new(db).auto_fill_meal_plan(&week_start)?;
    if json {
        return print_json(&plan);
    }
    if plan.days == WeekPlan::default() {
        eprintln!("No recipes to plan with. Try: larder seed");
    }
    print_plan(db, &plan)
}

fn print_plan(db: &Database, plan: &MealPlan) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Breakfast")]
        breakfast: String,
        #[tabled(rename = "Lunch")]
        lunch: String,
        #[tabled(rename = "Dinner")]
        dinner: String,
    }

    let titles: HashMap<String, String> = db
        .list_recipes()?
        .into_iter()
        .map(|r| (r.id, r.title))
        .collect();
    let label = |id: Option<&str>| match id {
        None => "-".to_string(),
        Some(id) => titles
            .get(id)
            .map_or_else(|| format!("? {}", truncate(id, 10)), |t| truncate(t, 24)),
    };

    let rows: Vec<PlanRow> = WeekPlan::DAYS
        .into_iter()
        .map(|day| {
            let slots = plan.days.day(day);
            PlanRow {
                day: day.to_string(),
                breakfast: label(slots.get(MealSlot::Breakfast)),
                lunch: label(slots.get(MealSlot::Lunch)),
                dinner: label(slots.get(MealSlot::Dinner)),
            }
        })
        .collect();

    println!("Week of {}", plan.week_start);
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
