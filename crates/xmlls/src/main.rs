//! xmlls CLI - Main entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "xmlls")]
#[command(version)]
#[command(about = "XML validation and grammar tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate XML files against the grammars they reference
    Validate {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON settings file (same shape as the editor's `xml` settings)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// XML catalog to resolve public and system ids with
        #[arg(long)]
        catalog: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print an instance skeleton for an element declared in a DTD or schema
    Generate {
        /// DTD or XML Schema file
        grammar: PathBuf,

        /// Name of the root element
        #[arg(long)]
        root: String,

        /// Target namespace of the schema, if it has one
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xmlls=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            files,
            settings,
            catalog,
            format,
        } => commands::validate::execute(&files, settings.as_deref(), &catalog, format),
        Commands::Generate {
            grammar,
            root,
            namespace,
        } => commands::generate::execute(&grammar, &root, namespace.as_deref()),
    }
}
