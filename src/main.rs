//! CLI entry point for folio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_rs::Site;

#[derive(Parser)]
#[command(name = "folio")]
#[command(author = "Pol Piella")]
#[command(version)]
#[command(about = "A small blog engine: markdown posts, RSS feeds and Open Graph thumbnails", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new post
    New {
        /// Title of the new post
        title: String,
    },

    /// Build the static site
    #[command(alias = "g", alias = "generate")]
    Build {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Serve the site with the thumbnail and feed API
    #[command(alias = "s", alias = "server")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Do not rebuild on file changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Render an Open Graph thumbnail to a PNG file
    Thumbnail {
        /// Card title
        title: String,

        /// Optional line under the title
        #[arg(long)]
        description: Option<String>,

        /// Output file (defaults to <slug>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clean the public folder
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, tag)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "folio_rs=debug,info"
    } else {
        "folio_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };

    match cli.command {
        Commands::New { title } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Creating new post with title: {}", title);
            site.new_post(&title)?;
        }

        Commands::Build { watch } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Building site...");

            site.generate().await?;
            println!("Generated successfully!");

            if watch {
                folio_rs::commands::build::watch(&site).await?;
            }
        }

        Commands::Serve { port, ip, no_watch } => {
            let site = Site::new(&base_dir)?;

            // Generate first so static pages exist
            tracing::info!("Building site...");
            site.generate().await?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            folio_rs::server::start(&site, &ip, port, !no_watch).await?;
        }

        Commands::Thumbnail {
            title,
            description,
            output,
        } => {
            let site = Site::new(&base_dir)?;
            folio_rs::commands::thumbnail::run(&site, &title, description, output).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            folio_rs::commands::list::run(&site, &r#type).await?;
        }

        Commands::Version => {
            println!("folio version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
