mod helpers;
mod pantry;
mod plan;
mod recipe;
mod remind;
mod review;
mod shop;

pub(crate) use pantry::{cmd_pantry_add, cmd_pantry_list, cmd_pantry_remove, cmd_pantry_update};
pub(crate) use plan::{cmd_plan_auto_fill, cmd_plan_set, cmd_plan_show, cmd_suggest};
pub(crate) use recipe::{
    cmd_recipe_add, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list, cmd_recipe_show,
    cmd_seed,
};
pub(crate) use remind::{cmd_remind_add, cmd_remind_delete, cmd_remind_list};
pub(crate) use review::{cmd_review_add, cmd_review_list};
pub(crate) use shop::cmd_shop;
