use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::service::LarderService;
use larder_core::shopping;

use super::helpers::{format_quantity, format_week, parse_week, print_json};

pub(crate) fn cmd_shop(db: &Database, week: Option<&str>, csv: bool, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ShoppingRow {
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Buy")]
        quantity: String,
    }

    let week_start = format_week(parse_week(week)?);
    let items = LarderService::new(db).shopping_list(&week_start)?;

    if json {
        return print_json(&items);
    }
    if csv {
        return shopping::write_csv(&items, std::io::stdout());
    }
    if items.is_empty() {
        println!("Nothing to buy for the week of {week_start}");
        return Ok(());
    }

    let rows: Vec<ShoppingRow> = items
        .iter()
        .map(|i| ShoppingRow {
            name: i.name.clone(),
            quantity: format_quantity(i.quantity, i.unit.as_deref()),
        })
        .collect();

    println!("Shopping list for the week of {week_start}");
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
