use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use larder_core::db::Database;
use larder_core::models::{NewReminder, ReminderKind};

use super::helpers::{exit_not_found, print_json, truncate};

pub(crate) fn cmd_remind_add(
    db: &Database,
    title: String,
    due_at: String,
    kind: &str,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let reminder = db.insert_reminder(&NewReminder {
        title,
        due_at,
        kind: ReminderKind::parse(kind)?,
        notes,
    })?;

    if json {
        print_json(&reminder)?;
    } else {
        println!(
            "Reminder set: {} ({}, due {})",
            reminder.title,
            reminder.kind.as_str(),
            reminder.due_at
        );
    }
    Ok(())
}

pub(crate) fn cmd_remind_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ReminderRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Due")]
        due_at: String,
        #[tabled(rename = "Type")]
        kind: &'static str,
        #[tabled(rename = "Title")]
        title: String,
    }

    let reminders = db.list_reminders()?;
    if json {
        return print_json(&reminders);
    }
    if reminders.is_empty() {
        eprintln!("No reminders");
        return Ok(());
    }

    let rows: Vec<ReminderRow> = reminders
        .iter()
        .map(|r| ReminderRow {
            id: r.id.clone(),
            due_at: r.due_at.clone(),
            kind: r.kind.as_str(),
            title: truncate(&r.title, 40),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_remind_delete(db: &Database, id: &str, json: bool) -> Result<()> {
    if !db.delete_reminder(id)? {
        exit_not_found(&format!("Reminder {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted reminder {id}");
    }
    Ok(())
}
