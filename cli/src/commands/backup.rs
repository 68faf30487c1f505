use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use stride_core::backup::Backup;
use stride_core::service::StrideService;
use stride_core::upload::{decode_data_url, extension_for_mime};

use crate::ImageCollection;

use super::helpers::{report_notices, unlock};

pub(crate) fn cmd_export(
    svc: &StrideService,
    pin: Option<&str>,
    file: &Path,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let backup = svc.export_all();
    let content = serde_json::to_string_pretty(&backup)?;
    std::fs::write(file, content)
        .with_context(|| format!("Failed to write {}", file.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "file": file.display().to_string(),
                "weights": backup.weights.len(),
                "recipes": backup.recipes.len(),
                "gallery": backup.gallery.len(),
                "roadbook": backup.roadbook.len(),
            })
        );
    } else {
        println!("Exported to {}", file.display());
        println!(
            "  {} weigh-ins, {} recipes, {} photos, {} roadbook entries",
            backup.weights.len(),
            backup.recipes.len(),
            backup.gallery.len(),
            backup.roadbook.len()
        );
    }

    Ok(())
}

pub(crate) fn cmd_import(
    svc: &mut StrideService,
    pin: Option<&str>,
    file: &Path,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let backup: Backup = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a stride backup", file.display()))?;

    let summary = svc.import_all(&backup)?;
    report_notices(svc);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Restored from {}", file.display());
        println!(
            "  {} weigh-ins, {} recipes, {} photos, {} roadbook entries",
            summary.weights, summary.recipes, summary.gallery, summary.roadbook
        );
    }

    Ok(())
}

pub(crate) fn cmd_export_image(
    svc: &StrideService,
    collection: ImageCollection,
    id: i64,
    file: &Path,
    json: bool,
) -> Result<()> {
    let image = match collection {
        ImageCollection::Recipe => svc
            .get_recipe(id)
            .with_context(|| format!("No recipe with ID {id}"))?
            .image
            .as_deref(),
        ImageCollection::Gallery => Some(
            svc.get_gallery_image(id)
                .with_context(|| format!("No photo with ID {id}"))?
                .image
                .as_str(),
        ),
        ImageCollection::Roadbook => svc
            .get_roadbook_entry(id)
            .with_context(|| format!("No roadbook entry with ID {id}"))?
            .image
            .as_deref(),
    };
    let Some(image) = image else {
        bail!("Record {id} has no image");
    };

    let (mime, bytes) =
        decode_data_url(image).with_context(|| format!("Image of record {id} is not embedded"))?;
    let path = with_image_extension(file, &mime);
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "file": path.display().to_string(),
                "mime": mime,
                "bytes": bytes.len(),
            })
        );
    } else {
        println!("Saved {} ({} bytes) to {}", mime, bytes.len(), path.display());
    }

    Ok(())
}

fn with_image_extension(file: &Path, mime: &str) -> PathBuf {
    if file.extension().is_some() {
        file.to_path_buf()
    } else {
        file.with_extension(extension_for_mime(mime))
    }
}
