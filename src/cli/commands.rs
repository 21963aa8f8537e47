use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;

use super::{AppContext, SaveArgs, SourceFiles, UpdateArgs};
use crate::models::{Autosave, Snippet, SnippetDraft, SnippetPatch, render_document};
use crate::storage::{SnippetStore, SortKey, SortOrder};

fn gutter() -> colored::ColoredString {
    "┃".bright_magenta()
}

pub fn print_line(message: &str) {
    println!("{}  {}", gutter(), message);
}

fn print_rule() {
    println!("{}", "─".repeat(60).bright_magenta());
}

fn read_source(path: &Option<PathBuf>) -> Result<Option<String>> {
    path.as_ref()
        .map(|p| fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display())))
        .transpose()
}

/// Find a snippet by id, then by exact name, then by partial name.
/// Name matching ignores case.
pub fn find_snippet<'a>(snippets: &'a [Snippet], name_or_id: &str) -> Option<&'a Snippet> {
    if let Some(snippet) = snippets.iter().find(|s| s.id == name_or_id) {
        return Some(snippet);
    }

    let name = name_or_id.to_lowercase();
    snippets
        .iter()
        .find(|s| s.name.to_lowercase() == name)
        .or_else(|| snippets.iter().find(|s| s.name.to_lowercase().contains(&name)))
}

async fn resolve(store: &SnippetStore, name_or_id: &str) -> Result<Snippet> {
    if let Some(snippet) = store.get(name_or_id).await? {
        return Ok(snippet);
    }

    let snippets = store.get_all().await?;
    match find_snippet(&snippets, name_or_id) {
        Some(snippet) => Ok(snippet.clone()),
        None => {
            print_line(&format!("No snippet found with name: {}", name_or_id));
            list_available(&snippets);
            bail!("snippet '{}' not found", name_or_id)
        }
    }
}

fn list_available(snippets: &[Snippet]) {
    if snippets.is_empty() {
        return;
    }

    print_line("Available snippets:");
    print_rule();
    for (idx, snippet) in snippets.iter().enumerate().take(10) {
        println!(
            "{}  {}. {}",
            gutter(),
            (idx + 1).to_string().yellow(),
            snippet.name.bright_white()
        );
    }

    if snippets.len() > 10 {
        print_line(&format!("... and {} more", snippets.len() - 10));
    }
}

fn print_summary(snippet: &Snippet) {
    println!(
        "{}     {}: {}",
        gutter(),
        "ID".bright_black(),
        snippet.id
    );
    println!(
        "{}     {}: {}",
        gutter(),
        "Updated".bright_blue(),
        snippet.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

pub async fn list_snippets(store: &SnippetStore, sort: Option<SortKey>, desc: bool) -> Result<()> {
    let order = if desc {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    let snippets = match sort {
        Some(key) => store.list_sorted(key, order).await?,
        None => {
            let mut all = store.get_all().await?;
            if desc {
                all.reverse();
            }
            all
        }
    };

    if snippets.is_empty() {
        print_line("No snippets saved yet.");
        return Ok(());
    }

    print_line(&format!("{} snippets:", snippets.len()));
    print_rule();
    for (idx, snippet) in snippets.iter().enumerate() {
        println!(
            "{}  {}. {} {}",
            gutter(),
            (idx + 1).to_string().bright_yellow(),
            snippet.name.bright_white().bold(),
            format!("({} lines)", snippet.get_line_count()).bright_black()
        );
        print_summary(snippet);

        if idx < snippets.len() - 1 {
            println!("{}  {}", gutter(), "─".repeat(40).bright_black());
        }
    }

    Ok(())
}

/// Shows the contents of a snippet by ID or name
pub async fn show_snippet(store: &SnippetStore, name_or_id: &str) -> Result<()> {
    let snippet = resolve(store, name_or_id).await?;

    println!(
        "{}  {} {}",
        gutter(),
        "SNIPPET".bright_green().bold(),
        snippet.name.bold()
    );
    print_rule();
    println!("{}  {}: {}", gutter(), "ID".bright_black(), snippet.id);
    println!(
        "{}  {}: {}",
        gutter(),
        "Created".bright_blue(),
        snippet.created_at.to_rfc3339()
    );
    println!(
        "{}  {}: {}",
        gutter(),
        "Updated".bright_blue(),
        snippet.updated_at.to_rfc3339()
    );

    for (label, body) in [
        ("HTML", &snippet.html),
        ("CSS", &snippet.css),
        ("JS", &snippet.js),
    ] {
        print_rule();
        println!("{}  {}", gutter(), label.bright_yellow());
        for line in body.lines() {
            println!("{}  {}", gutter(), line);
        }
    }

    Ok(())
}

pub async fn save_snippet(ctx: &AppContext, args: SaveArgs) -> Result<()> {
    let mut draft = match &args.template {
        Some(name) => {
            let catalog = ctx.templates()?;
            match catalog.find(name) {
                Some(template) => template.to_draft(),
                None => bail!("no template named '{}'", name),
            }
        }
        None => SnippetDraft::default(),
    };

    if args.name.is_some() {
        draft.name = args.name;
    }
    draft.id = args.id;
    draft = apply_sources(draft, &args.sources)?;

    // Saving over an existing id keeps its creation time
    if let Some(id) = &draft.id {
        if let Some(existing) = ctx.store.get(id).await? {
            draft.created_at = Some(existing.created_at);
        }
    }

    let saved = ctx.store.save(draft).await?;
    print_line(&format!("Saved {}", saved.name.bright_green()));
    print_summary(&saved);
    Ok(())
}

fn apply_sources(mut draft: SnippetDraft, sources: &SourceFiles) -> Result<SnippetDraft> {
    if let Some(html) = read_source(&sources.html)? {
        draft.html = Some(html);
    }
    if let Some(css) = read_source(&sources.css)? {
        draft.css = Some(css);
    }
    if let Some(js) = read_source(&sources.js)? {
        draft.js = Some(js);
    }
    Ok(draft)
}

pub async fn update_snippet(store: &SnippetStore, args: UpdateArgs) -> Result<()> {
    let patch = SnippetPatch {
        name: args.name,
        html: read_source(&args.sources.html)?,
        css: read_source(&args.sources.css)?,
        js: read_source(&args.sources.js)?,
        created_at: None,
    };

    let updated = store
        .update(&args.id, patch)
        .await
        .with_context(|| format!("Failed to update {}", args.id))?;
    print_line(&format!("Updated {}", updated.name.bright_green()));
    print_summary(&updated);
    Ok(())
}

pub async fn delete_snippet(store: &SnippetStore, id: &str) -> Result<()> {
    store.delete(id).await?;
    print_line(&format!("Deleted {}", id));
    Ok(())
}

pub async fn clear_snippets(store: &SnippetStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete every snippet without --yes");
    }

    let total = store.stats().await?.total;
    store.clear().await?;
    print_line(&format!("Deleted {} snippets", total));
    Ok(())
}

pub async fn export_snippets(store: &SnippetStore, output: Option<PathBuf>) -> Result<()> {
    let json = store.export_all().await?;

    match output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write export file {}", path.display()))?;
            print_line(&format!("Exported snippets to {}", path.display()));
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn import_snippets(store: &SnippetStore, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to open import file {}", file.display()))?;
    let saved = store
        .import_all(&content)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;

    print_line(&format!(
        "Imported {} snippets",
        saved.len().to_string().bright_green()
    ));
    Ok(())
}

pub async fn show_stats(store: &SnippetStore) -> Result<()> {
    let stats = store.stats().await?;

    println!("{}  {}", gutter(), "STORAGE".bold());
    print_rule();
    println!("{}  {:<10} {}", gutter(), "Snippets".bright_white(), stats.total);
    println!("{}  {:<10} {}", gutter(), "Backend".bright_white(), stats.backend);
    println!(
        "{}  {:<10} {} bytes",
        gutter(),
        "Size".bright_white(),
        stats.total_size
    );
    let snippets = store.get_all().await?;
    if let Some(largest) = snippets.iter().max_by_key(|s| s.content_len()) {
        println!(
            "{}  {:<10} {} ({} bytes)",
            gutter(),
            "Largest".bright_white(),
            largest.name,
            largest.content_len()
        );
    }
    println!(
        "{}  {:<10} {}",
        gutter(),
        "Location".bright_white(),
        store.config().data_dir.display()
    );
    Ok(())
}

pub async fn render_snippet(
    store: &SnippetStore,
    name_or_id: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let snippet = resolve(store, name_or_id).await?;
    let page = render_document(&snippet);

    match output {
        Some(path) => {
            fs::write(&path, page)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_line(&format!("Rendered {} to {}", snippet.name, path.display()));
        }
        None => print!("{}", page),
    }
    Ok(())
}

pub async fn apply_template(ctx: &AppContext, template: &str, name: Option<String>) -> Result<()> {
    let catalog = ctx.templates()?;
    let Some(template) = catalog.find(template) else {
        bail!("no template named '{}'", template);
    };

    let mut draft = template.to_draft();
    if name.is_some() {
        draft.name = name;
    }

    let saved = ctx.store.save(draft).await?;
    print_line(&format!(
        "Created {} from template {}",
        saved.name.bright_green(),
        template.name
    ));
    print_summary(&saved);
    Ok(())
}

pub async fn write_autosave(ctx: &AppContext, sources: SourceFiles) -> Result<()> {
    let autosave = Autosave::new(
        read_source(&sources.html)?.unwrap_or_default(),
        read_source(&sources.css)?.unwrap_or_default(),
        read_source(&sources.js)?.unwrap_or_default(),
    );
    ctx.autosave_slot().write(&autosave).await?;
    print_line("Autosave written");
    Ok(())
}

pub async fn restore_autosave(ctx: &AppContext, name: Option<String>) -> Result<()> {
    let slot = ctx.autosave_slot();
    let Some(autosave) = slot.recoverable().await else {
        print_line("No recent autosave found.");
        return Ok(());
    };

    let name = name.unwrap_or_else(|| {
        format!("Autosave {}", autosave.timestamp.format("%Y-%m-%d %H:%M"))
    });
    let saved = ctx.store.save(autosave.to_draft(name)).await?;
    slot.discard().await?;

    print_line(&format!("Restored autosave as {}", saved.name.bright_green()));
    print_summary(&saved);
    Ok(())
}
