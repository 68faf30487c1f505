use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::service::StrideService;
use stride_core::store::Removal;

use super::helpers::{prompt_confirm, report_notices, unlock};

pub(crate) fn cmd_weight_add(
    svc: &mut StrideService,
    pin: Option<&str>,
    value: &str,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let entry = svc.add_weight(value)?;
    report_notices(svc);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let progress = svc.progress();
        println!("Logged {:.1} kg for {}", entry.weight, entry.date);
        println!(
            "  {:.1} kg lost, {:.1} kg to go ({}%)",
            progress.lost_kg,
            progress.remaining_kg,
            progress.percent()
        );
    }

    Ok(())
}

pub(crate) fn cmd_weight_list(svc: &StrideService, json: bool) -> Result<()> {
    let entries = svc.weights();

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct WeightRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
        #[tabled(rename = "Change")]
        change: String,
    }

    let rows: Vec<WeightRow> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| WeightRow {
            index: i,
            date: e.date.clone(),
            kg: format!("{:.1}", e.weight),
            change: i
                .checked_sub(1)
                .map(|prev| e.weight - entries[prev].weight)
                .map_or_else(String::new, |d| format!("{d:+.1}")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_weight_delete(
    svc: &mut StrideService,
    pin: Option<&str>,
    index: usize,
    yes: bool,
    json: bool,
) -> Result<()> {
    unlock(pin)?;

    let mut prompt_error = None;
    let outcome = svc.delete_weight(index, |entry| {
        if yes {
            return true;
        }
        let question = format!("Delete {:.1} kg ({})?", entry.weight, entry.date);
        prompt_confirm(&question).unwrap_or_else(|e| {
            prompt_error = Some(e);
            false
        })
    })?;
    if let Some(e) = prompt_error {
        return Err(e);
    }
    report_notices(svc);

    match outcome {
        Removal::Removed(entry) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "deleted": index, "entry": entry })
                );
            } else {
                println!("Deleted {:.1} kg ({})", entry.weight, entry.date);
            }
        }
        Removal::Declined => {
            if json {
                println!("{}", serde_json::json!({ "deleted": null }));
            } else {
                println!("Nothing deleted");
            }
        }
    }

    Ok(())
}
