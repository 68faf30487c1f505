mod commands;
mod config;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_export, cmd_export_image, cmd_gallery_add, cmd_gallery_list, cmd_import, cmd_progress,
    cmd_recipe_add, cmd_recipe_list, cmd_recipe_show, cmd_roadbook_add, cmd_roadbook_list,
    cmd_roadbook_show, cmd_unlock, cmd_weight_add, cmd_weight_delete, cmd_weight_list,
};
use crate::config::Config;
use stride_core::service::StrideService;

#[derive(Parser)]
#[command(
    name = "stride",
    version,
    about = "Track a weight journey: weigh-ins, recipes, photos and a roadbook"
)]
struct Cli {
    /// Admin PIN, required by commands that change data
    #[arg(long, global = true, env = "STRIDE_ADMIN_PIN", hide_env_values = true)]
    pin: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and review weigh-ins
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Show progress towards the goal weight
    Progress {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage the photo gallery
    Gallery {
        #[command(subcommand)]
        command: GalleryCommands,
    },
    /// Manage roadbook (diary) entries
    Roadbook {
        #[command(subcommand)]
        command: RoadbookCommands,
    },
    /// Write all collections to a JSON backup file
    Export {
        /// Destination file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace all collections with the contents of a JSON backup file
    Import {
        /// Backup file written by `stride export`
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save an embedded image back to a file
    ExportImage {
        /// Collection holding the image
        #[arg(value_enum)]
        collection: ImageCollection,
        /// Record ID
        id: i64,
        /// Destination file (extension added from the image type if missing)
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Check the admin PIN
    Unlock {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum ImageCollection {
    Recipe,
    Gallery,
    Roadbook,
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Record today's weight
    Add {
        /// Weight in kg (72.5 or 72,5)
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show all weigh-ins
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weigh-in by its position in `weight list`
    Delete {
        /// Position (0 is the oldest entry)
        index: usize,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a recipe
    Add {
        /// Recipe title
        #[arg(long)]
        title: String,
        /// Comma separated tags (e.g. "Low Carb, Schnell")
        #[arg(long, default_value = "")]
        tags: String,
        /// Ingredients, one per value
        #[arg(long, num_args = 1.., required = true)]
        ingredients: Vec<String>,
        /// Preparation steps, one per value
        #[arg(long, num_args = 1.., required = true)]
        steps: Vec<String>,
        /// Image file to embed
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with ingredients and steps
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GalleryCommands {
    /// Add a photo
    Add {
        /// Image file to embed
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        /// Caption
        #[arg(long)]
        caption: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all photos, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RoadbookCommands {
    /// Write a roadbook entry
    Add {
        /// Entry title
        #[arg(long)]
        title: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Entry text
        #[arg(long, conflicts_with = "text_file", required_unless_present = "text_file")]
        text: Option<String>,
        /// Read the entry text from a file
        #[arg(long, value_name = "PATH")]
        text_file: Option<PathBuf>,
        /// Image file to embed
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all entries, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a full entry
    Show {
        /// Entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_filter = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    logging::init(default_filter);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = StrideService::with_options(
        &config.db_path,
        config.settings.goal(),
        config.settings.storage_quota_bytes,
    )?;
    let pin = cli.pin.as_deref();

    match cli.command {
        Commands::Weight { command } => match command {
            WeightCommands::Add { value, json } => cmd_weight_add(&mut svc, pin, &value, json),
            WeightCommands::List { json } => cmd_weight_list(&svc, json),
            WeightCommands::Delete { index, yes, json } => {
                cmd_weight_delete(&mut svc, pin, index, yes, json)
            }
        },
        Commands::Progress { json } => cmd_progress(&svc, json),
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                title,
                tags,
                ingredients,
                steps,
                image,
                json,
            } => cmd_recipe_add(
                &mut svc,
                pin,
                &title,
                &tags,
                &ingredients,
                &steps,
                image.as_deref(),
                json,
            ),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
        },
        Commands::Gallery { command } => match command {
            GalleryCommands::Add {
                image,
                caption,
                date,
                json,
            } => cmd_gallery_add(&mut svc, pin, &image, &caption, date, json),
            GalleryCommands::List { json } => cmd_gallery_list(&svc, json),
        },
        Commands::Roadbook { command } => match command {
            RoadbookCommands::Add {
                title,
                date,
                text,
                text_file,
                image,
                json,
            } => cmd_roadbook_add(
                &mut svc,
                pin,
                &title,
                date,
                text,
                text_file.as_deref(),
                image.as_deref(),
                json,
            ),
            RoadbookCommands::List { json } => cmd_roadbook_list(&svc, json),
            RoadbookCommands::Show { id, json } => cmd_roadbook_show(&svc, id, json),
        },
        Commands::Export { file, json } => cmd_export(&svc, pin, &file, json),
        Commands::Import { file, json } => cmd_import(&mut svc, pin, &file, json),
        Commands::ExportImage {
            collection,
            id,
            file,
            json,
        } => cmd_export_image(&svc, collection, id, &file, json),
        Commands::Serve { port, bind } => server::start_server(svc, port, &bind).await,
        Commands::Unlock { json } => cmd_unlock(pin, json),
    }
}
