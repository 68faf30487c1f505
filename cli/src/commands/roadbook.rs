use anyhow::{Context, Result};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

use stride_core::models::{RoadbookEntry, RoadbookForm};
use stride_core::service::StrideService;
use stride_core::upload::read_image_file;

use super::helpers::{first_line, form_date, json_error, report_notices, truncate, unlock};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_roadbook_add(
    svc: &mut StrideService,
    pin: Option<&str>,
    title: &str,
    date: Option<String>,
    text: Option<String>,
    text_file: Option<&Path>,
    image: Option<&Path>,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let text = match (text, text_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => String::new(),
    };
    let form = RoadbookForm {
        title: title.to_string(),
        date: form_date(date)?,
        text,
        image: image.map(read_image_file).transpose()?,
    };

    let entry = svc.add_roadbook_entry(&form)?;
    report_notices(svc);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Added roadbook entry '{}' for {} (ID: {})",
            entry.title, entry.date, entry.id
        );
    }

    Ok(())
}

pub(crate) fn cmd_roadbook_list(svc: &StrideService, json: bool) -> Result<()> {
    let entries = svc.roadbook();

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        eprintln!("No roadbook entries yet. Use `stride roadbook add` to write one.");
    } else {
        #[derive(Tabled)]
        struct EntryRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Title")]
            title: String,
            #[tabled(rename = "Text")]
            excerpt: String,
        }

        let rows: Vec<EntryRow> = entries
            .iter()
            .map(|e| EntryRow {
                id: e.id,
                date: e.date.clone(),
                title: truncate(&e.title, 30),
                excerpt: truncate(first_line(&e.text), 50),
            })
            .collect();

        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_roadbook_show(svc: &StrideService, id: i64, json: bool) -> Result<()> {
    let Some(entry) = svc.get_roadbook_entry(id) else {
        let message = format!("No roadbook entry with ID {id}");
        if json {
            println!("{}", json_error(&message));
            return Ok(());
        }
        anyhow::bail!(message);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        print_entry(entry);
    }

    Ok(())
}

fn print_entry(entry: &RoadbookEntry) {
    println!("{} ({})", entry.title, entry.date);
    println!("{}", "-".repeat(entry.title.chars().count() + entry.date.len() + 3));
    println!("{}", entry.text);
    if entry.image.is_some() {
        println!(
            "\nImage: use `stride export-image roadbook {} <file>`",
            entry.id
        );
    }
}
