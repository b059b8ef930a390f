use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::models::{NewPantryItem, UpdatePantryItem};
use larder_core::service::LarderService;

use super::helpers::{exit_not_found, format_quantity, print_json, truncate};

pub(crate) fn cmd_pantry_add(
    db: &Database,
    name: &str,
    quantity: Option<f64>,
    unit: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    let item = LarderService::new(db).add_pantry_item(&NewPantryItem {
        name: name.to_string(),
        quantity: quantity.unwrap_or(1.0),
        unit,
        image,
    })?;

    if json {
        print_json(&item)?;
    } else {
        let stock = format_quantity(item.quantity, item.unit.as_deref());
        println!("{}: {stock} in stock (id: {})", item.name, item.id);
    }
    Ok(())
}

pub(crate) fn cmd_pantry_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PantryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Updated")]
        updated: String,
    }

    let items = db.list_pantry()?;
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        eprintln!("The pantry is empty. Add stock with: larder pantry add <name> [quantity]");
        return Ok(());
    }

    let rows: Vec<PantryRow> = items
        .iter()
        .map(|i| PantryRow {
            id: i.id.clone(),
            name: truncate(&i.name, 30),
            quantity: format_quantity(i.quantity, i.unit.as_deref()),
            updated: i.updated_at.get(..10).unwrap_or(&i.updated_at).to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_pantry_update(
    db: &Database,
    id: &str,
    quantity: Option<f64>,
    unit: Option<String>,
    json: bool,
) -> Result<()> {
    let update = UpdatePantryItem { quantity, unit };
    if update.is_empty() {
        bail!("Nothing to update. Pass --quantity and/or --unit");
    }
    let Some(item) = db.update_pantry_item(id, &update)? else {
        exit_not_found(&format!("Pantry item {id} not found"), json);
    };

    if json {
        print_json(&item)?;
    } else {
        let stock = format_quantity(item.quantity, item.unit.as_deref());
        if item.id == id {
            println!("Updated {}: {stock}", item.name);
        } else {
            println!("Merged into existing {} ({}): {stock}", item.name, item.id);
        }
    }
    Ok(())
}

pub(crate) fn cmd_pantry_remove(db: &Database, id: &str, json: bool) -> Result<()> {
    if !db.delete_pantry_item(id)? {
        exit_not_found(&format!("Pantry item {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Removed pantry item {id}");
    }
    Ok(())
}
