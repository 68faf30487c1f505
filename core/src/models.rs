use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// --- Record types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub date: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: i64,
    pub date: String,
    pub caption: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadbookEntry {
    pub id: i64,
    pub date: String,
    pub title: String,
    pub text: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub image: Option<String>,
}

/// Stored images may be written as `""` or `null` when no file was picked.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// --- Collection records ---

/// A record type that lives in one persisted collection.
///
/// Each implementor owns a fixed, versioned storage key and a seed value used
/// whenever the stored value is missing or cannot be trusted.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Durable storage key, suffixed with the schema version.
    const KEY: &'static str;

    fn seed() -> Vec<Self>;

    fn id(&self) -> Option<i64> {
        None
    }

    fn assign_id(&mut self, _id: i64) {}

    /// Reject decoded records that parse but break a record invariant.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Reject decoded collections that break a collection invariant.
    fn check_collection(items: &[Self]) -> Result<(), String> {
        items.iter().try_for_each(Self::check)
    }
}

impl Record for WeightEntry {
    const KEY: &'static str = "stride_weights_v4";

    fn seed() -> Vec<Self> {
        vec![WeightEntry {
            date: START_LABEL.to_string(),
            weight: DEFAULT_START_WEIGHT_KG,
        }]
    }

    fn check(&self) -> Result<(), String> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!("invalid weight {} on {}", self.weight, self.date));
        }
        Ok(())
    }

    fn check_collection(items: &[Self]) -> Result<(), String> {
        if items.is_empty() {
            return Err("weight log must hold at least one entry".to_string());
        }
        items.iter().try_for_each(Self::check)
    }
}

impl Record for Recipe {
    const KEY: &'static str = "stride_recipes_v4";

    fn seed() -> Vec<Self> {
        vec![Recipe {
            id: 1,
            title: "Puten-Pfanne mit Feta".to_string(),
            tags: strings(&["High Protein", "Low Carb", "Schnell"]),
            ingredients: strings(&[
                "200g Pute",
                "1 Paprika",
                "1 Zucchini",
                "50g Feta",
                "Olivenöl",
            ]),
            steps: strings(&[
                "Fleisch würfeln und anbraten.",
                "Gemüse dazugeben (10 Min).",
                "Feta drüberbröseln.",
            ]),
            image: Some(
                "https://images.unsplash.com/photo-1546069901-ba9599a7e63c?q=80&w=1000&auto=format&fit=crop"
                    .to_string(),
            ),
        }]
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for GalleryImage {
    const KEY: &'static str = "stride_gallery_v4";

    fn seed() -> Vec<Self> {
        Vec::new()
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }

    fn check(&self) -> Result<(), String> {
        if self.image.is_empty() {
            return Err(format!("gallery image {} has no image data", self.id));
        }
        Ok(())
    }
}

impl Record for RoadbookEntry {
    const KEY: &'static str = "stride_roadbook_v4";

    fn seed() -> Vec<Self> {
        vec![RoadbookEntry {
            id: 1,
            date: "18.01.2026".to_string(),
            title: "Der Start meiner Road to 85: Von allem zu viel (vor allem vom Gewicht)"
                .to_string(),
            text: SEED_ROADBOOK_TEXT.to_string(),
            image: None,
        }]
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

pub const START_LABEL: &str = "Start";
pub const DEFAULT_START_WEIGHT_KG: f64 = 107.0;
pub const DEFAULT_GOAL_WEIGHT_KG: f64 = 85.0;
pub const DEFAULT_HEIGHT_M: f64 = 1.80;

const SEED_ROADBOOK_TEXT: &str = "Ich schiebe den Start schon eine ganze Zeit vor mir her, nach dem Motto \"Heute ist nicht der richtige Tag um zu starten\". Aber wann ist der richtige Tag/Zeitpunkt? Er ist genau JETZT!

Ich habe Respekt vor meinem Weg, weil es nicht der erste Versuch ist, mein Wunschgewicht von 85 kg auf gesundem Weg zu erreichen. Aber ich bin fest entschlossen, dass es das letzte Mal ist, dass ich es versuchen muss, weil ich endlich das Ziel erreichen werde: Gesund und nachhaltig abzunehmen.

Körperlich bin ich so ziemlich in der schlechtesten Verfassung, seit ich mich erinnern kann. Der Weg von der Wohnung in den Keller lässt mich in Schweiß ausbrechen. An Joggen ist gar nicht zu denken, weil ich nach 50 Metern ein Sauerstoffzelt benötige. Auch mental bin ich nicht auf der Höhe (Schaffe ich die 12 Wochen Balance-Burn Journey bei Freeletics, macht mein Körper überhaupt mit, kann ich der Versuchung von Schokolade widerstehen).

Der Respekt ist riesig, aber nicht so riesig wie mein Wille und meine Motivation! Ich freue mich, dass es los geht und ihr mich auf meinem Weg begleiten möchtet.

Bis die Tage, euer René";

// --- Form input types ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeForm {
    pub title: String,
    /// Comma separated.
    #[serde(default)]
    pub tags: String,
    /// One ingredient per line.
    pub ingredients: String,
    /// One step per line.
    pub steps: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryForm {
    pub caption: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoadbookForm {
    pub title: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

// --- Validation ---

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Image too large ({size} bytes). Please pick an image under 2.5 MB")]
    ImageTooLarge { size: u64 },
    #[error("Could not read image: {0}")]
    UnreadableImage(String),
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("Invalid weight '{0}'. Use a positive number like 72.5")]
    InvalidWeight(String),
    #[error("Invalid date '{0}'. Use YYYY-MM-DD")]
    InvalidDate(String),
}

pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Parse a weight typed by the user. Accepts a decimal comma (`72,5`).
pub fn parse_weight(raw: &str) -> Result<f64, ValidationError> {
    let normalized = raw.trim().replace(',', ".");
    let value: f64 = normalized
        .parse()
        .map_err(|_| ValidationError::InvalidWeight(raw.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidWeight(raw.to_string()));
    }
    Ok(value)
}

pub fn parse_form_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Split a comma separated tag field, dropping blanks.
#[must_use]
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Split a multi-line field into one item per line, dropping blank lines.
#[must_use]
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}

// --- Display dates ---

/// `19.10.` as shown in the weight history.
#[must_use]
pub fn format_day_month(date: NaiveDate) -> String {
    date.format("%d.%m.").to_string()
}

/// `19.10.2026` as shown on gallery and roadbook entries.
#[must_use]
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_entry_json_field_names() {
        let entry = WeightEntry {
            date: "19.10.".to_string(),
            weight: 72.5,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({ "date": "19.10.", "weight": 72.5 }));
    }

    #[test]
    fn test_recipe_empty_image_decodes_as_none() {
        let json = r#"{"id":5,"title":"Salat","tags":[],"ingredients":["Gurke"],"steps":["Schneiden"],"image":""}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.image, None);

        let json = r#"{"id":5,"title":"Salat","tags":[],"ingredients":[],"steps":[],"image":null}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.image, None);

        let json = r#"{"id":5,"title":"Salat","tags":[],"ingredients":[],"steps":[]}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.image, None);
    }

    #[test]
    fn test_missing_image_is_omitted_when_encoded() {
        let entry = RoadbookEntry {
            id: 7,
            date: "01.02.2026".to_string(),
            title: "Woche 2".to_string(),
            text: "Läuft.".to_string(),
            image: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let recipes = Recipe::seed();
        let text = serde_json::to_string(&recipes).unwrap();
        let back: Vec<Recipe> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, recipes);

        let roadbook = RoadbookEntry::seed();
        let text = serde_json::to_string(&roadbook).unwrap();
        let back: Vec<RoadbookEntry> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, roadbook);

        let gallery = vec![GalleryImage {
            id: 1_700_000_000_000,
            date: "18.01.2026".to_string(),
            caption: "Tag 1".to_string(),
            image: "data:image/png;base64,AAAA".to_string(),
        }];
        let text = serde_json::to_string(&gallery).unwrap();
        let back: Vec<GalleryImage> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, gallery);
    }

    #[test]
    fn test_weight_seed_is_start_baseline() {
        let seed = WeightEntry::seed();
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[0].date, "Start");
        assert!((seed[0].weight - 107.0).abs() < f64::EPSILON);
        assert!(WeightEntry::check_collection(&seed).is_ok());
    }

    #[test]
    fn test_weight_collection_must_not_be_empty() {
        assert!(WeightEntry::check_collection(&[]).is_err());
    }

    #[test]
    fn test_gallery_image_requires_image_data() {
        let img = GalleryImage {
            id: 1,
            date: "18.01.2026".to_string(),
            caption: "leer".to_string(),
            image: String::new(),
        };
        assert!(GalleryImage::check_collection(&[img]).is_err());
        assert!(GalleryImage::seed().is_empty());
    }

    #[test]
    fn test_parse_weight() {
        assert!((parse_weight("72.5").unwrap() - 72.5).abs() < f64::EPSILON);
        assert!((parse_weight(" 72,5 ").unwrap() - 72.5).abs() < f64::EPSILON);
        assert!(parse_weight("abc").is_err());
        assert!(parse_weight("0").is_err());
        assert!(parse_weight("-3").is_err());
        assert!(parse_weight("NaN").is_err());
        assert!(parse_weight("inf").is_err());
    }

    #[test]
    fn test_parse_form_date() {
        assert_eq!(
            parse_form_date("2026-01-18").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 18).unwrap()
        );
        assert_eq!(
            parse_form_date("18.01.2026"),
            Err(ValidationError::InvalidDate("18.01.2026".to_string()))
        );
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags("High Protein, Low Carb,,  Schnell "),
            vec!["High Protein", "Low Carb", "Schnell"]
        );
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(
            split_lines("200g Pute\r\n1 Paprika\n\n  \nFeta"),
            vec!["200g Pute", "1 Paprika", "Feta"]
        );
    }

    #[test]
    fn test_display_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(format_day_month(date), "05.03.");
        assert_eq!(format_display_date(date), "05.03.2026");
    }

    #[test]
    fn test_require() {
        assert!(require("Title", "Salat").is_ok());
        assert_eq!(
            require("Title", "   "),
            Err(ValidationError::MissingField("Title"))
        );
    }
}
