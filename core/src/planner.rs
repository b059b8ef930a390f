use crate::models::{MealPlan, Suggestion, WeekPlan};

/// Fill all 21 slots of a week from a ranked suggestion list.
///
/// Makeable recipes go first, then the rest, each group in ranked order.
/// Slots are assigned round-robin in Mon..Sun, breakfast/lunch/dinner order,
/// so fewer than 21 recipes repeat. With no suggestions every slot stays empty.
#[must_use]
pub fn auto_fill(week_start: &str, ranked: &[Suggestion]) -> MealPlan {
    let order: Vec<&str> = ranked
        .iter()
        .filter(|s| s.can_make)
        .chain(ranked.iter().filter(|s| !s.can_make))
        .map(|s| s.id.as_str())
        .collect();

    let mut days = WeekPlan::default();
    if !order.is_empty() {
        let assignments: Vec<_> = days.slots().map(|(day, slot, _)| (day, slot)).collect();
        for (idx, (day, slot)) in assignments.into_iter().enumerate() {
            let recipe_id = order[idx % order.len()];
            days.day_mut(day).set(slot, Some(recipe_id.to_string()));
        }
    }

    MealPlan {
        week_start: week_start.to_string(),
        days,
    }
}
