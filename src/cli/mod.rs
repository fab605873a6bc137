pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "visualizer")]
#[command(about = "Visualizer CLI - operator access to template storage")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Store a complete template tree read from a JSON file")]
    SaveTemplate {
        #[arg(long, short, help = "Path to the template tree JSON")]
        file: PathBuf,
    },

    #[command(about = "Print a stored template with all canvases, charts and measurements")]
    ShowTemplate {
        #[arg(help = "Template id")]
        id: Uuid,
    },

    #[command(about = "Check database connectivity")]
    Health,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::AppConfig::from_env();

    match cli.command {
        Commands::SaveTemplate { file } => commands::template::save(&config, &file, output_format).await,
        Commands::ShowTemplate { id } => commands::template::show(&config, id, output_format).await,
        Commands::Health => commands::health::handle(&config, output_format).await,
    }
}
