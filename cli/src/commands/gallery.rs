use anyhow::Result;
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::GalleryForm;
use stride_core::service::StrideService;
use stride_core::upload::{decode_data_url, read_image_file};

use super::helpers::{form_date, report_notices, truncate, unlock};

pub(crate) fn cmd_gallery_add(
    svc: &mut StrideService,
    pin: Option<&str>,
    image: &Path,
    caption: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let form = GalleryForm {
        caption: caption.to_string(),
        date: form_date(date)?,
        image: read_image_file(image)?,
    };

    let stored = svc.add_gallery_image(&form)?;
    report_notices(svc);

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        println!(
            "Added photo '{}' for {} (ID: {})",
            stored.caption, stored.date, stored.id
        );
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn cmd_gallery_list(svc: &StrideService, json: bool) -> Result<()> {
    let gallery = svc.gallery();

    if json {
        println!("{}", serde_json::to_string_pretty(gallery)?);
    } else if gallery.is_empty() {
        eprintln!("No photos yet. Use `stride gallery add` to upload one.");
    } else {
        #[derive(Tabled)]
        struct PhotoRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Caption")]
            caption: String,
            #[tabled(rename = "Type")]
            mime: String,
            #[tabled(rename = "Size (KB)")]
            size: String,
        }

        let rows: Vec<PhotoRow> = gallery
            .iter()
            .map(|g| {
                let (mime, size) = decode_data_url(&g.image).map_or_else(
                    |_| ("-".to_string(), "-".to_string()),
                    |(mime, bytes)| (mime, format!("{:.0}", bytes.len() as f64 / 1024.0)),
                );
                PhotoRow {
                    id: g.id,
                    date: g.date.clone(),
                    caption: truncate(&g.caption, 40),
                    mime,
                    size,
                }
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(4..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}
