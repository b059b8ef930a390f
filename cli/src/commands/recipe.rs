use anyhow::{Context, Result, bail};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::models::{Ingredient, NewRecipe, RecipeWithReviews};
use larder_core::seed;

use super::helpers::{exit_not_found, format_quantity, print_json, truncate};

pub(crate) fn cmd_recipe_add(db: &Database, file: &Path, json: bool) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let new: NewRecipe = serde_json::from_str(&input)
        .with_context(|| format!("Invalid recipe JSON in {}", file.display()))?;
    let recipe = db.insert_recipe(&new)?;

    if json {
        print_json(&recipe)?;
    } else {
        let title = &recipe.title;
        let id = &recipe.id;
        let count = recipe.ingredients.len();
        println!("Added recipe: {title} ({count} ingredients, id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_import(
    db: &Database,
    file: &Path,
    title_override: Option<String>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let (recipe_data, _report) = cooklang::parse(&input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let title = title_override
        .or_else(|| recipe_data.metadata.title().map(String::from))
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe title. Use --title to specify one")?;

    let converter = cooklang::Converter::default();
    let ingredients: Vec<Ingredient> = recipe_data
        .group_ingredients(&converter)
        .iter()
        .map(cooklang_ingredient)
        .collect();

    if ingredients.is_empty() {
        bail!("No ingredients found in recipe");
    }

    let new = NewRecipe {
        title,
        ingredients,
        steps: recipe_steps(&recipe_data),
        ..NewRecipe::default()
    };
    let recipe = db.insert_recipe(&new)?;
    tracing::debug!(id = %recipe.id, file = %file.display(), "imported cooklang recipe");

    if json {
        print_json(&recipe)?;
    } else {
        let title = &recipe.title;
        let count = recipe.ingredients.len();
        let steps = recipe.steps.len();
        let id = &recipe.id;
        println!("Imported recipe: {title} ({count} ingredients, {steps} steps, id: {id})");
    }
    Ok(())
}

fn cooklang_ingredient(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> Ingredient {
    // Only the first grouped quantity is kept; ranges use their lower bound.
    let (quantity, unit) =
        gi.quantity
            .iter()
            .next()
            .map_or((None, None), |qty: &cooklang::Quantity| {
                let value = match qty.value() {
                    cooklang::Value::Number(n) => Some(n.value()),
                    cooklang::Value::Range { start, .. } => Some(start.value()),
                    cooklang::Value::Text(t) => t.trim().parse::<f64>().ok(),
                };
                (
                    value.filter(|v| v.is_finite() && *v > 0.0),
                    qty.unit().map(String::from),
                )
            });

    Ingredient {
        name: gi.ingredient.display_name().to_string(),
        quantity,
        unit,
        image: None,
        substitutions: vec![],
    }
}

/// One plain-text step per parsed Cooklang step, with components rendered by
/// name and timers by duration. Notes and comments are not steps.
fn recipe_steps(recipe: &cooklang::Recipe) -> Vec<String> {
    recipe
        .sections
        .iter()
        .flat_map(|section| &section.content)
        .filter_map(|content| match content {
            cooklang::Content::Step(step) => Some(step_text(recipe, step)),
            cooklang::Content::Text(_) => None,
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn step_text(recipe: &cooklang::Recipe, step: &cooklang::Step) -> String {
    let mut text = String::new();
    for item in &step.items {
        match item {
            cooklang::Item::Text { value } => text.push_str(value),
            cooklang::Item::Ingredient { index } => {
                if let Some(ing) = recipe.ingredients.get(*index) {
                    text.push_str(&ing.display_name());
                }
            }
            cooklang::Item::Cookware { index } => {
                if let Some(cw) = recipe.cookware.get(*index) {
                    text.push_str(cw.display_name());
                }
            }
            cooklang::Item::Timer { index } => {
                if let Some(timer) = recipe.timers.get(*index) {
                    match (&timer.quantity, &timer.name) {
                        (Some(qty), _) => text.push_str(&qty.to_string()),
                        (None, Some(name)) => text.push_str(name),
                        (None, None) => {}
                    }
                }
            }
            cooklang::Item::InlineQuantity { index } => {
                if let Some(qty) = recipe.inline_quantities.get(*index) {
                    text.push_str(&qty.to_string());
                }
            }
        }
    }
    // Removed comments leave doubled spaces behind.
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn cmd_recipe_list(db: &Database, reviews: bool, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Prep")]
        prep: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    #[derive(Tabled)]
    struct ReviewedRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Rating")]
        rating: String,
        #[tabled(rename = "Reviews")]
        reviews: usize,
    }

    if reviews {
        let recipes = db.list_recipes_with_reviews()?;
        if json {
            return print_json(&recipes);
        }
        if recipes.is_empty() {
            eprintln!("No recipes yet. Add one with: larder recipe add <file.json>");
            return Ok(());
        }
        let rows: Vec<ReviewedRow> = recipes
            .iter()
            .map(|r| ReviewedRow {
                id: r.recipe.id.clone(),
                title: truncate(&r.recipe.title, 30),
                rating: r
                    .avg_rating
                    .map_or_else(|| "-".to_string(), |avg| format!("{avg:.1}")),
                reviews: r.reviews.len(),
            })
            .collect();
        print_table(&rows);
        return Ok(());
    }

    let recipes = db.list_recipes()?;
    if json {
        return print_json(&recipes);
    }
    if recipes.is_empty() {
        eprintln!("No recipes yet. Add one with: larder recipe add <file.json>");
        return Ok(());
    }
    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id.clone(),
            title: truncate(&r.title, 30),
            prep: format!("{} min", r.prep_time_min),
            ingredients: r.ingredients.len(),
        })
        .collect();
    print_table(&rows);
    Ok(())
}

fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_recipe_show(db: &Database, id: &str, json: bool) -> Result<()> {
    let Some(detail) = db.get_recipe_with_reviews(id)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };

    if json {
        return print_json(&detail);
    }
    print_recipe(&detail);
    Ok(())
}

fn print_recipe(detail: &RecipeWithReviews) {
    let recipe = &detail.recipe;
    println!("=== {} ===", recipe.title);
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    let prep = recipe.prep_time_min;
    let mut facts = vec![format!("Prep: {prep} min")];
    if !recipe.age_range.is_empty() {
        facts.push(format!("Ages: {}", recipe.age_range));
    }
    if let Some(avg) = detail.avg_rating {
        facts.push(format!("Rating: {avg:.1} ({} reviews)", detail.reviews.len()));
    }
    println!("  {}", facts.join("  |  "));
    if !recipe.tags.is_empty() {
        println!("  Tags: {}", recipe.tags.join(", "));
    }

    println!("\n  INGREDIENTS:");
    for ing in &recipe.ingredients {
        let amount = ing
            .quantity
            .map(|q| format_quantity(q, ing.unit.as_deref()));
        let mut line = match amount {
            Some(a) => format!("    {a} {}", ing.name),
            None => format!("    {}", ing.name),
        };
        if !ing.substitutions.is_empty() {
            line.push_str(&format!(" (or {})", ing.substitutions.join(", ")));
        }
        println!("{line}");
    }

    if !recipe.steps.is_empty() {
        println!("\n  STEPS:");
        for (i, step) in recipe.steps.iter().enumerate() {
            println!("    {}. {step}", i + 1);
        }
    }

    if !detail.reviews.is_empty() {
        println!("\n  REVIEWS:");
        for review in &detail.reviews {
            let stars = "*".repeat(usize::from(review.rating));
            match &review.note {
                Some(note) => println!("    {stars:<5}  {note}"),
                None => println!("    {stars}"),
            }
        }
    }
}

pub(crate) fn cmd_recipe_delete(db: &Database, id: &str, json: bool) -> Result<()> {
    if !db.delete_recipe(id)? {
        exit_not_found(&format!("Recipe {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id} and its reviews");
    }
    Ok(())
}

pub(crate) fn cmd_seed(db: &Database, json: bool) -> Result<()> {
    let summary = seed::seed_sample_recipes(db)?;
    if json {
        return print_json(&summary);
    }
    if summary.inserted == 0 {
        println!("Already seeded ({} recipes)", summary.total);
    } else {
        println!(
            "Seeded {} sample recipes ({} total)",
            summary.inserted, summary.total
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> cooklang::Recipe {
        let (recipe, _report) = cooklang::parse(input).into_result().unwrap();
        recipe
    }

    #[test]
    fn test_steps_drop_notes_and_comments() {
        let recipe = parse(
            "Mix @flour{200%g} and @eggs{2}(beaten) [- optional -] in a #bowl{}.\n\n\
             > Serve warm\n",
        );
        assert_eq!(recipe_steps(&recipe), vec!["Mix flour and eggs in a bowl."]);
    }

    #[test]
    fn test_steps_render_components_and_timers() {
        let recipe = parse(
            "Crack @eggs{2} into a #mixing bowl{}. -- fresh ones\n\
             Add @milk{250%ml}.\n\n\
             Fry for ~{3%minutes}.\n",
        );
        assert_eq!(
            recipe_steps(&recipe),
            vec![
                "Crack eggs into a mixing bowl. Add milk.".to_string(),
                "Fry for 3 minutes.".to_string(),
            ]
        );
    }

    #[test]
    fn test_steps_empty_recipe() {
        assert!(recipe_steps(&parse("")).is_empty());
        assert!(recipe_steps(&parse("-- only a comment\n")).is_empty());
    }

    #[test]
    fn test_import_cooklang_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("omelette.cook");
        std::fs::write(
            &path,
            "Whisk @eggs{3} with @milk{50%ml} [- or cream -] in a #bowl{}.\n\n\
             > Use fresh eggs\n\n\
             Cook for ~{4%minutes}.\n",
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        cmd_recipe_import(&db, &path, None, true).unwrap();

        let recipes = db.list_recipes().unwrap();
        assert_eq!(recipes.len(), 1);
        let recipe = &recipes[0];
        assert_eq!(recipe.title, "omelette");
        assert_eq!(
            recipe.steps,
            vec![
                "Whisk eggs with milk in a bowl.".to_string(),
                "Cook for 4 minutes.".to_string(),
            ]
        );

        let eggs = recipe.ingredients.iter().find(|i| i.name == "eggs").unwrap();
        assert_eq!(eggs.quantity, Some(3.0));
        assert!(eggs.unit.is_none());
        let milk = recipe.ingredients.iter().find(|i| i.name == "milk").unwrap();
        assert_eq!(milk.quantity, Some(50.0));
        assert_eq!(milk.unit.as_deref(), Some("ml"));
    }

    #[test]
    fn test_add_recipe_from_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("toast.json");
        std::fs::write(
            &path,
            r#"{
                "title": "Toast",
                "ingredients": [{"name": "Bread", "quantity": 2, "unit": "pc"}]
            }"#,
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        cmd_recipe_add(&db, &path, true).unwrap();
        let recipes = db.list_recipes().unwrap();
        assert_eq!(recipes[0].title, "Toast");
        assert_eq!(recipes[0].ingredients[0].quantity, Some(2.0));
    }

    #[test]
    fn test_add_recipe_rejects_bad_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let db = Database::open_in_memory().unwrap();
        assert!(cmd_recipe_add(&db, &path, true).is_err());
    }
}
