use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::models::{GalleryImage, Record, Recipe, RoadbookEntry, WeightEntry};

pub const BACKUP_VERSION: i64 = 1;

/// Portable snapshot of all four collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: i64,
    pub exported_at: String,
    pub weights: Vec<WeightEntry>,
    pub recipes: Vec<Recipe>,
    pub gallery: Vec<GalleryImage>,
    pub roadbook: Vec<RoadbookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub weights: usize,
    pub recipes: usize,
    pub gallery: usize,
    pub roadbook: usize,
}

/// Validate every collection of a backup before anything is replaced.
pub fn validate_backup(backup: &Backup) -> Result<()> {
    if backup.version != BACKUP_VERSION {
        bail!(
            "Unsupported backup version {} (expected {BACKUP_VERSION})",
            backup.version
        );
    }
    check::<WeightEntry>(&backup.weights, "weights")?;
    check::<Recipe>(&backup.recipes, "recipes")?;
    check::<GalleryImage>(&backup.gallery, "gallery")?;
    check::<RoadbookEntry>(&backup.roadbook, "roadbook")?;
    Ok(())
}

fn check<T: Record>(items: &[T], name: &str) -> Result<()> {
    T::check_collection(items).map_err(|reason| anyhow::anyhow!("Invalid {name}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Backup {
        Backup {
            version: BACKUP_VERSION,
            exported_at: "2026-10-19T10:00:00+00:00".to_string(),
            weights: WeightEntry::seed(),
            recipes: Recipe::seed(),
            gallery: Vec::new(),
            roadbook: RoadbookEntry::seed(),
        }
    }

    #[test]
    fn test_valid_backup() {
        assert!(validate_backup(&sample()).is_ok());
    }

    #[test]
    fn test_backup_with_empty_weights_is_rejected() {
        let backup = Backup {
            weights: Vec::new(),
            ..sample()
        };
        let err = validate_backup(&backup).unwrap_err();
        assert!(err.to_string().contains("weights"));
    }

    #[test]
    fn test_backup_version_mismatch() {
        let backup = Backup {
            version: 99,
            ..sample()
        };
        assert!(validate_backup(&backup).is_err());
    }

    #[test]
    fn test_backup_json_round_trip() {
        let backup = sample();
        let json = serde_json::to_string_pretty(&backup).unwrap();
        let back: Backup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, backup);
    }
}
