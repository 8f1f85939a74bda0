//! `mab` - generate and refine single-file micro-apps from the terminal
//!
//! # Usage
//!
//! ```bash
//! # Generate a new app
//! mab create "a calculator that screams when I press equals"
//!
//! # Refine it (ids accept unique prefixes)
//! mab edit 3f2a "make the buttons bigger"
//!
//! # Write the current body next to you and open it in a browser
//! mab export 3f2a --out calc.html
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mab_core::{MabConfig, SessionController};
use mab_providers::{GeminiProvider, RevenueCatGate};
use mab_store::{ArtifactStore, FileBlobStore};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "mab")]
#[command(version)]
#[command(about = "Generate and refine single-file web micro-apps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, short, global = true, default_value = "mab.toml")]
    config: PathBuf,

    /// Artifact collection file (overrides the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Debug logging (otherwise RUST_LOG, default info)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a new app from an instruction
    Create {
        /// What to build
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },

    /// Generate a new app from a gallery template
    Template {
        /// Template id (see `mab templates`)
        id: String,
    },

    /// List gallery templates
    Templates {
        /// Only templates carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// List quick-start instructions
    Suggestions,

    /// List apps, newest first
    List {
        /// Print the stored JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one app and its conversation
    Show {
        /// App id or unique prefix
        id: String,

        /// Print only the generated body
        #[arg(long)]
        body: bool,
    },

    /// Refine an app with a follow-up instruction
    Edit {
        /// App id or unique prefix
        id: String,

        /// What to change
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },

    /// Delete an app
    Remove {
        /// App id or unique prefix
        id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Write an app's body to an HTML file
    Export {
        /// App id or unique prefix
        id: String,

        /// Output file (default `<id>.html`)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Premium access
    Entitlement {
        #[command(subcommand)]
        command: EntitlementCommand,
    },
}

#[derive(Debug, Subcommand)]
enum EntitlementCommand {
    /// Check for an active entitlement
    Status,
    /// Buy a package from the offerings
    Purchase {
        /// Package, product or offering id (default from config)
        offer: Option<String>,

        /// Checkout receipt token (otherwise from the configured variable)
        #[arg(long)]
        token: Option<String>,
    },
    /// Restore earlier purchases
    Restore,
    /// List paywall offerings
    Offerings,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // Catalog listings need no backends
    match &cli.command {
        Commands::Templates { tag } => return commands::templates(tag.as_deref(), &mut out),
        Commands::Suggestions => return commands::suggestions(&mut out),
        _ => {}
    }

    let mut config = MabConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(path) = cli.store {
        config = config.with_store_path(path);
    }

    let mut gate = RevenueCatGate::new(&config.entitlements)?;
    if let Commands::Entitlement {
        command: EntitlementCommand::Purchase {
            token: Some(token), ..
        },
    } = &cli.command
    {
        gate = gate.with_fetch_token(token.clone());
    }
    let gate = Arc::new(gate);
    let session = open_session(&config, gate.clone()).await?;

    match cli.command {
        Commands::Create { instruction } => {
            commands::create(&session, &instruction.join(" "), &mut out).await
        }
        Commands::Template { id } => commands::template(&session, &id, &mut out).await,
        Commands::List { json } => commands::list(&session, json, &mut out),
        Commands::Show { id, body } => commands::show(&session, &id, body, &mut out),
        Commands::Edit { id, instruction } => {
            commands::edit(&session, &id, &instruction.join(" "), &mut out).await
        }
        Commands::Remove { id, yes } => commands::remove(&session, &id, yes, &mut out).await,
        Commands::Export { id, out: path } => commands::export(&session, &id, path, &mut out),
        Commands::Entitlement { command } => match command {
            EntitlementCommand::Status => commands::entitlement_status(&session, &mut out).await,
            EntitlementCommand::Purchase { offer, .. } => {
                let offer = offer.unwrap_or_else(|| config.entitlements.offer.clone());
                commands::purchase(&session, &offer, &mut out).await
            }
            EntitlementCommand::Restore => commands::restore(&session, &mut out).await,
            EntitlementCommand::Offerings => offerings(&gate, &mut out).await,
        },
        Commands::Templates { .. } | Commands::Suggestions => Ok(()),
    }
}

async fn open_session(config: &MabConfig, gate: Arc<RevenueCatGate>) -> Result<SessionController> {
    let provider = GeminiProvider::new(&config.provider)?;
    let store = ArtifactStore::new(Arc::new(FileBlobStore::new(&config.store.path)));
    tracing::debug!(store = %config.store.path.display(), model = provider.model(), "opening session");
    Ok(SessionController::open(&config.session, Arc::new(provider), gate, store).await)
}

async fn offerings(gate: &RevenueCatGate, out: &mut impl Write) -> Result<()> {
    let offerings = gate.offerings().await?;
    for offering in &offerings.offerings {
        let current = offerings.current_offering_id.as_deref() == Some(offering.identifier.as_str());
        writeln!(
            out,
            "{}{}  {}",
            offering.identifier,
            if current { " (current)" } else { "" },
            offering.description
        )?;
        for package in &offering.packages {
            writeln!(
                out,
                "    {}  {}",
                package.identifier,
                package.platform_product_identifier.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}
