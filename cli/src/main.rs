mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_pantry_add, cmd_pantry_list, cmd_pantry_remove, cmd_pantry_update, cmd_plan_auto_fill,
    cmd_plan_set, cmd_plan_show, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_import,
    cmd_recipe_list, cmd_recipe_show, cmd_remind_add, cmd_remind_delete, cmd_remind_list,
    cmd_review_add, cmd_review_list, cmd_seed, cmd_shop, cmd_suggest,
};
use crate::config::Config;
use larder_core::db::Database;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "A recipe, pantry, and meal-plan manager",
    long_about = "Keep track of recipes and what's in the pantry, see what you can cook \
                  right now, auto-fill a week of meals, and get the shopping list for it."
)]
struct Cli {
    /// Enable debug logging (overridden by LARDER_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Rate recipes
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Manage pantry stock
    Pantry {
        #[command(subcommand)]
        command: PantryCommands,
    },
    /// Rank recipes by how many ingredients are missing from the pantry
    Suggest {
        /// Only show recipes that can be made right now
        #[arg(long)]
        ready: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Weekly meal plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show what to buy for a week's plan
    Shop {
        /// Week: this, next, last, or any date in the week (default: this)
        week: Option<String>,
        /// Output as CSV
        #[arg(long, conflicts_with = "json")]
        csv: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage reminders
    Remind {
        #[command(subcommand)]
        command: RemindCommands,
    },
    /// Load the sample recipe catalogue
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a recipe from a JSON file
    Add {
        /// Path to the recipe JSON
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Title override (defaults to metadata title or filename)
        #[arg(long)]
        title: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Include reviews and average rating
        #[arg(long)]
        reviews: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its ingredients, steps, and reviews
    Show {
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe and its reviews
    Delete {
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Rate a recipe from 1 to 5
    Add {
        /// Recipe ID
        recipe_id: String,
        /// Rating (1-5)
        rating: u8,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List reviews for a recipe, newest first
    List {
        /// Recipe ID
        recipe_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PantryCommands {
    /// Add stock (merges with an existing item of the same name and unit)
    Add {
        /// Item name
        name: String,
        /// Quantity (default: 1)
        quantity: Option<f64>,
        /// Unit (e.g. g, ml, pc)
        #[arg(short, long)]
        unit: Option<String>,
        /// Image URL
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pantry items
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an item's quantity or unit
    Update {
        /// Pantry item ID
        id: String,
        /// New quantity
        #[arg(short, long)]
        quantity: Option<f64>,
        /// New unit (pass "" to make the item unitless)
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Pantry item ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show the plan for a week
    Show {
        /// Week: this, next, last, or any date in the week (default: this)
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assign a recipe to one slot
    Set {
        /// Week: this, next, last, or any date in the week
        week: String,
        /// Day: mon-sun or monday-sunday
        day: String,
        /// Slot: breakfast, lunch, dinner
        slot: String,
        /// Recipe ID, or "none" to clear the slot
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fill every slot from current suggestions (replaces the existing plan)
    AutoFill {
        /// Week: this, next, last, or any date in the week (default: this)
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RemindCommands {
    /// Add a reminder
    Add {
        /// Reminder title
        title: String,
        /// Due time (e.g. 2024-06-15T18:00)
        due_at: String,
        /// Type: meal, shopping, other
        #[arg(short = 't', long = "type", default_value = "meal")]
        kind: String,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List reminders by due time
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a reminder
    Delete {
        /// Reminder ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LARDER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(db = %config.db_path.display(), "opening database");
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Recipe { command } => match command {
            RecipeCommands::Add { file, json } => cmd_recipe_add(&db, &file, json),
            RecipeCommands::Import { file, title, json } => {
                cmd_recipe_import(&db, &file, title, json)
            }
            RecipeCommands::List { reviews, json } => cmd_recipe_list(&db, reviews, json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&db, &id, json),
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&db, &id, json),
        },
        Commands::Review { command } => match command {
            ReviewCommands::Add {
                recipe_id,
                rating,
                note,
                json,
            } => cmd_review_add(&db, &recipe_id, rating, note, json),
            ReviewCommands::List { recipe_id, json } => cmd_review_list(&db, &recipe_id, json),
        },
        Commands::Pantry { command } => match command {
            PantryCommands::Add {
                name,
                quantity,
                unit,
                image,
                json,
            } => cmd_pantry_add(&db, &name, quantity, unit, image, json),
            PantryCommands::List { json } => cmd_pantry_list(&db, json),
            PantryCommands::Update {
                id,
                quantity,
                unit,
                json,
            } => cmd_pantry_update(&db, &id, quantity, unit, json),
            PantryCommands::Remove { id, json } => cmd_pantry_remove(&db, &id, json),
        },
        Commands::Suggest { ready, json } => cmd_suggest(&db, ready, json),
        Commands::Plan { command } => match command {
            PlanCommands::Show { week, json } => cmd_plan_show(&db, week.as_deref(), json),
            PlanCommands::Set {
                week,
                day,
                slot,
                recipe,
                json,
            } => cmd_plan_set(&db, &week, &day, &slot, &recipe, json),
            PlanCommands::AutoFill { week, json } => {
                cmd_plan_auto_fill(&db, week.as_deref(), json)
            }
        },
        Commands::Shop { week, csv, json } => cmd_shop(&db, week.as_deref(), csv, json),
        Commands::Remind { command } => match command {
            RemindCommands::Add {
                title,
                due_at,
                kind,
                notes,
                json,
            } => cmd_remind_add(&db, title, due_at, &kind, notes, json),
            RemindCommands::List { json } => cmd_remind_list(&db, json),
            RemindCommands::Delete { id, json } => cmd_remind_delete(&db, &id, json),
        },
        Commands::Seed { json } => cmd_seed(&db, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                tracing::warn!("API key authentication disabled");
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(db, port, &bind, api_key, new_api_key).await
        }
    }
}
