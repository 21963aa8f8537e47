//! CLI Module for kithub
//! Command-line access to the snippet store. This plays the part of the
//! playground's editor and gallery: it saves, updates and lists snippets,
//! applies templates, recovers autosaves and renders standalone pages.

pub mod commands;
pub mod tree;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use crate::config::{BackendPreference, Config};
use crate::models::{AutosaveSlot, TemplateCatalog};
use crate::storage::{SnippetStore, SortKey};

#[derive(Parser, Debug)]
#[command(name = "kithub", version, about = "Snippet store for an HTML/CSS/JS playground")]
pub struct Cli {
    /// Config file (defaults to <config dir>/kithub/config.toml)
    #[arg(long, global = true, env = "KITHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the snippet database
    #[arg(long, global = true, env = "KITHUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend: auto or flat
    #[arg(long, global = true)]
    pub backend: Option<BackendPreference>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all snippets
    #[command(alias = "ls")]
    List {
        /// Sort by name, created or updated
        #[arg(long)]
        sort: Option<SortKey>,
        /// Reverse the order
        #[arg(long)]
        desc: bool,
    },
    /// Display a snippet by ID or name (partial name works)
    #[command(aliases = ["view", "cat"])]
    Show { name_or_id: String },
    /// Save a snippet (overwrites when --id names an existing one)
    Save(SaveArgs),
    /// Change some fields of a stored snippet
    Update(UpdateArgs),
    /// Delete a snippet
    #[command(alias = "rm")]
    Delete { id: String },
    /// Delete every snippet
    Clear {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },
    /// Write all snippets as a JSON array
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save every snippet from an exported JSON array
    Import { file: PathBuf },
    /// Show storage statistics
    Stats,
    /// Render a snippet as a standalone HTML page
    Render {
        name_or_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Browse and apply templates
    #[command(subcommand)]
    Templates(TemplatesCommand),
    /// Manage the autosave slot
    #[command(subcommand)]
    Autosave(AutosaveCommand),
}

/// Files holding the three parts of a snippet
#[derive(Args, Debug, Default)]
pub struct SourceFiles {
    #[arg(long)]
    pub html: Option<PathBuf>,
    #[arg(long)]
    pub css: Option<PathBuf>,
    #[arg(long)]
    pub js: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub id: Option<String>,
    /// Start from a template; files given here override its parts
    #[arg(long)]
    pub template: Option<String>,
    #[command(flatten)]
    pub sources: SourceFiles,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub sources: SourceFiles,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// List templates grouped by category
    List,
    /// Save a new snippet from a template
    Apply {
        template: String,
        /// Name for the new snippet (defaults to the template name)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AutosaveCommand {
    /// Store editor contents in the autosave slot
    Write(SourceFiles),
    /// Save the autosave as a snippet if it is recent enough
    Restore {
        #[arg(long)]
        name: Option<String>,
    },
    /// Empty the autosave slot
    Discard,
}

/// Everything a command handler needs, built once by the entry point
pub struct AppContext {
    pub store: SnippetStore,
    pub config: Config,
}

impl AppContext {
    pub fn autosave_slot(&self) -> AutosaveSlot {
        AutosaveSlot::new(
            self.store.config().autosave_path(),
            self.config.autosave_max_age(),
        )
    }

    pub fn templates(&self) -> Result<TemplateCatalog> {
        match &self.config.templates_file {
            Some(path) => TemplateCatalog::load(path)
                .with_context(|| format!("Failed to load templates from {}", path.display())),
            None => TemplateCatalog::bundled().context("Failed to parse bundled templates"),
        }
    }
}

/// Resolve configuration, open the store and run one command
pub async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let store_config = config.store_config(cli.data_dir, cli.backend)?;
    debug!("Using data directory {}", store_config.data_dir.display());

    let ctx = AppContext {
        store: SnippetStore::new(store_config),
        config,
    };

    execute(&ctx, cli.command).await
}

pub async fn execute(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::List { sort, desc } => commands::list_snippets(&ctx.store, sort, desc).await,
        Command::Show { name_or_id } => commands::show_snippet(&ctx.store, &name_or_id).await,
        Command::Save(args) => commands::save_snippet(ctx, args).await,
        Command::Update(args) => commands::update_snippet(&ctx.store, args).await,
        Command::Delete { id } => commands::delete_snippet(&ctx.store, &id).await,
        Command::Clear { yes } => commands::clear_snippets(&ctx.store, yes).await,
        Command::Export { output } => commands::export_snippets(&ctx.store, output).await,
        Command::Import { file } => commands::import_snippets(&ctx.store, &file).await,
        Command::Stats => commands::show_stats(&ctx.store).await,
        Command::Render { name_or_id, output } => {
            commands::render_snippet(&ctx.store, &name_or_id, output).await
        }
        Command::Templates(TemplatesCommand::List) => tree::display_templates(&ctx.templates()?),
        Command::Templates(TemplatesCommand::Apply { template, name }) => {
            commands::apply_template(ctx, &template, name).await
        }
        Command::Autosave(AutosaveCommand::Write(sources)) => {
            commands::write_autosave(ctx, sources).await
        }
        Command::Autosave(AutosaveCommand::Restore { name }) => {
            commands::restore_autosave(ctx, name).await
        }
        Command::Autosave(AutosaveCommand::Discard) => {
            ctx.autosave_slot().discard().await?;
            commands::print_line("Autosave discarded");
            Ok(())
        }
    }
}
