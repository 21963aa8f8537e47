use anyhow::Result;
use colored::Colorize;

use crate::models::{Template, TemplateCatalog};

/// Displays the template catalog as a tree, one branch per category
pub fn display_templates(catalog: &TemplateCatalog) -> Result<()> {
    if catalog.is_empty() {
        println!("No templates found in catalog.");
        return Ok(());
    }

    let groups = catalog.by_category();
    let count = groups.len();

    println!(
        "{}  {} templates in {} categories",
        "┃".bright_magenta(),
        catalog.len().to_string().bright_yellow(),
        count
    );

    for (idx, (category, templates)) in groups.iter().enumerate() {
        let is_last_category = idx == count - 1;
        println!(
            "{}  {} {}",
            "┃".bright_magenta(),
            "▸".bright_blue(),
            category.bold()
        );
        print_templates(templates, is_last_category);
    }
    Ok(())
}

fn print_templates(templates: &[&Template], is_last_category: bool) {
    for (idx, template) in templates.iter().enumerate() {
        let connector = if idx == templates.len() - 1 {
            "└── "
        } else {
            "├── "
        };

        let description = template
            .description
            .as_deref()
            .map(|d| format!(" {}", d.bright_black()))
            .unwrap_or_default();

        println!(
            "{}  {}{}{}",
            "┃".bright_magenta(),
            connector.bright_black(),
            template.name.bright_white(),
            description
        );
    }

    if !is_last_category {
        println!("{}", "┃".bright_magenta());
    }
}
