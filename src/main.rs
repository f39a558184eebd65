//! CLI entry point for crianzas

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crianzas")]
#[command(version)]
#[command(about = "Site and admin panel for Crianzas Conscientes", long_about = None)]
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
    /// Start the web server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to (defaults to server.ip)
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// Scaffold a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Render a markdown file to HTML on stdout
    Render {
        file: PathBuf,

        /// Skip the sanitizer pass
        #[arg(long)]
        unsanitized: bool,
    },

    /// Print the slug derived from a title
    Slug {
        title: String,
    },

    /// List site information
    List {
        /// Type of content to list (posts, tags, categories, leads)
        #[arg(default_value = "posts")]
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
        "crianzas=debug,info"
    } else {
        "crianzas=info"
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
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Serve { port, ip } => {
            let site = crianzas::Site::new(&base_dir)?;
            let ip = ip.unwrap_or_else(|| site.config.server.ip.clone());
            let port = port.unwrap_or(site.config.server.port);

            tracing::info!("Starting server at http://{}:{}", ip, port);
            crianzas::server::start(&site, &ip, port).await?;
        }

        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            crianzas::commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
        }

        Commands::Render { file, unsanitized } => {
            let path = if file.is_absolute() {
                file
            } else {
                base_dir.join(file)
            };
            println!("{}", crianzas::commands::render::render_file(&path, !unsanitized)?);
        }

        Commands::Slug { title } => {
            crianzas::commands::slug::run(&title)?;
        }

        Commands::List { r#type } => {
            let site = crianzas::Site::new(&base_dir)?;
            crianzas::commands::list::run(&site, &r#type).await?;
        }

        Commands::Version => {
            println!("crianzas version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
