use anyhow::Result;

use larder_core::db::Database;
use larder_core::models::{NewReview, validate_rating};

use super::helpers::{exit_not_found, print_json, truncate};

pub(crate) fn cmd_review_add(
    db: &Database,
    recipe_id: &str,
    rating: u8,
    note: Option<String>,
    json: bool,
) -> Result<()> {
    validate_rating(rating)?;
    let Some(recipe) = db.get_recipe(recipe_id)? else {
        exit_not_found(&format!("Recipe {recipe_id} not found"), json);
    };

    let review = db.add_review(&NewReview {
        recipe_id: recipe_id.to_string(),
        rating,
        note: note.filter(|n| !n.trim().is_empty()),
    })?;

    if json {
        print_json(&review)?;
    } else {
        println!("Rated {} {rating}/5", recipe.title);
    }
    Ok(())
}

pub(crate) fn cmd_review_list(db: &Database, recipe_id: &str, json: bool) -> Result<()> {
    let Some(detail) = db.get_recipe_with_reviews(recipe_id)? else {
        exit_not_found(&format!("Recipe {recipe_id} not found"), json);
    };

    if json {
        return print_json(&detail.reviews);
    }

    let title = &detail.recipe.title;
    match detail.avg_rating {
        Some(avg) => println!("{title}: {avg:.1} average from {} reviews", detail.reviews.len()),
        None => {
            println!("{title}: no reviews yet");
            return Ok(());
        }
    }
    for review in &detail.reviews {
        let date = review.created_at.get(..10).unwrap_or(&review.created_at);
        let note = review.note.as_deref().map(|n| truncate(n, 60)).unwrap_or_default();
        println!("  {date}  {}/5  {note}", review.rating);
    }
    Ok(())
}
