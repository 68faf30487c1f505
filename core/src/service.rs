use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::backup::{BACKUP_VERSION, Backup, RestoreSummary, validate_backup};
use crate::clock::{Clock, SystemClock};
use crate::models::{
    GalleryForm, GalleryImage, Recipe, RecipeForm, RoadbookEntry, RoadbookForm, WeightEntry,
    format_day_month, format_display_date, parse_form_date, parse_weight, require, split_lines,
    split_tags,
};
use crate::progress::{Bmi, Goal, Progress, bmi};
use crate::storage::{DEFAULT_QUOTA_BYTES, KeyValueStorage, MemoryStorage, SqliteStorage};
use crate::store::{CollectionStore, GuardError, Notice, Removal};
use crate::upload::validate_data_url;

pub struct StrideService {
    store: CollectionStore,
    goal: Goal,
}

impl StrideService {
    pub fn new(db_path: &str) -> Result<Self> {
        Self::with_options(Path::new(db_path), Goal::default(), DEFAULT_QUOTA_BYTES)
    }

    pub fn with_options(db_path: &Path, goal: Goal, quota: usize) -> Result<Self> {
        let storage = SqliteStorage::open(db_path)?.with_quota(quota);
        Ok(Self::open(Box::new(storage), Box::new(SystemClock), goal))
    }

    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::open(
            Box::new(MemoryStorage::new()),
            Box::new(SystemClock),
            Goal::default(),
        )
    }

    pub fn open(storage: Box<dyn KeyValueStorage>, clock: Box<dyn Clock>, goal: Goal) -> Self {
        Self {
            store: CollectionStore::open_with_start(storage, clock, goal.start_kg),
            goal,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    // --- Reads ---

    pub fn weights(&self) -> &[WeightEntry] {
        self.store.weights()
    }

    pub fn recipes(&self) -> &[Recipe] {
        self.store.recipes()
    }

    pub fn gallery(&self) -> &[GalleryImage] {
        self.store.gallery()
    }

    pub fn roadbook(&self) -> &[RoadbookEntry] {
        self.store.roadbook()
    }

    pub fn get_recipe(&self, id: i64) -> Option<&Recipe> {
        self.recipes().iter().find(|r| r.id == id)
    }

    pub fn get_gallery_image(&self, id: i64) -> Option<&GalleryImage> {
        self.gallery().iter().find(|g| g.id == id)
    }

    pub fn get_roadbook_entry(&self, id: i64) -> Option<&RoadbookEntry> {
        self.roadbook().iter().find(|e| e.id == id)
    }

    // --- Forms ---

    pub fn add_weight(&mut self, raw: &str) -> Result<WeightEntry> {
        let weight = parse_weight(raw)?;
        let entry = WeightEntry {
            date: format_day_month(self.store.clock().today()),
            weight,
        };
        Ok(self.store.append(entry)?)
    }

    pub fn add_recipe(&mut self, form: &RecipeForm) -> Result<Recipe> {
        require("title", &form.title)?;
        require("ingredients", &form.ingredients)?;
        require("steps", &form.steps)?;
        let image = optional_image(form.image.as_deref())?;

        let recipe = Recipe {
            id: 0,
            title: form.title.trim().to_string(),
            tags: split_tags(&form.tags),
            ingredients: split_lines(&form.ingredients),
            steps: split_lines(&form.steps),
            image,
        };
        Ok(self.store.append(recipe)?)
    }

    pub fn add_gallery_image(&mut self, form: &GalleryForm) -> Result<GalleryImage> {
        require("image", &form.image)?;
        validate_data_url(&form.image)?;
        require("caption", &form.caption)?;
        require("date", &form.date)?;
        let date = parse_form_date(&form.date)?;

        let image = GalleryImage {
            id: 0,
            date: format_display_date(date),
            caption: form.caption.trim().to_string(),
            image: form.image.clone(),
        };
        Ok(self.store.prepend(image)?)
    }

    pub fn add_roadbook_entry(&mut self, form: &RoadbookForm) -> Result<RoadbookEntry> {
        require("title", &form.title)?;
        require("date", &form.date)?;
        require("text", &form.text)?;
        let date = parse_form_date(&form.date)?;
        let image = optional_image(form.image.as_deref())?;

        let entry = RoadbookEntry {
            id: 0,
            date: format_display_date(date),
            title: form.title.trim().to_string(),
            text: form.text.clone(),
            image,
        };
        Ok(self.store.prepend(entry)?)
    }

    pub fn delete_weight<F>(&mut self, index: usize, confirm: F) -> Result<Removal, GuardError>
    where
        F: FnOnce(&WeightEntry) -> bool,
    {
        self.store.remove_weight_at(index, confirm)
    }

    // --- Progress ---

    pub fn progress(&self) -> Progress {
        Progress::new(self.goal, self.store.current_weight())
    }

    pub fn bmi(&self) -> Bmi {
        bmi(self.store.current_weight(), self.goal.height_m)
    }

    // --- Export / Import ---

    pub fn export_all(&self) -> Backup {
        Backup {
            version: BACKUP_VERSION,
            exported_at: Local::now().to_rfc3339(),
            weights: self.weights().to_vec(),
            recipes: self.recipes().to_vec(),
            gallery: self.gallery().to_vec(),
            roadbook: self.roadbook().to_vec(),
        }
    }

    /// Replace all four collections with the backup's contents.
    ///
    /// Nothing is replaced unless every collection passes validation.
    pub fn import_all(&mut self, backup: &Backup) -> Result<RestoreSummary> {
        validate_backup(backup).context("Backup rejected")?;
        self.store.replace_all(backup.weights.clone())?;
        self.store.replace_all(backup.recipes.clone())?;
        self.store.replace_all(backup.gallery.clone())?;
        self.store.replace_all(backup.roadbook.clone())?;
        let summary = RestoreSummary {
            weights: backup.weights.len(),
            recipes: backup.recipes.len(),
            gallery: backup.gallery.len(),
            roadbook: backup.roadbook.len(),
        };
        info!(?summary, "backup restored");
        Ok(summary)
    }

    /// Drain notices about writes that did not reach durable storage.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.store.take_notices()
    }
}

fn optional_image(image: Option<&str>) -> Result<Option<String>> {
    match image.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => {
            validate_data_url(url)?;
            Ok(Some(url.to_string()))
        }
        None => Ok(None),
    }
}
