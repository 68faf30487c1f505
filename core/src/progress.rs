use serde::Serialize;

use crate::models::{DEFAULT_GOAL_WEIGHT_KG, DEFAULT_HEIGHT_M, DEFAULT_START_WEIGHT_KG};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub start_kg: f64,
    pub goal_kg: f64,
    pub height_m: f64,
}

impl Default for Goal {
    fn default() -> Self {
        Self {
            start_kg: DEFAULT_START_WEIGHT_KG,
            goal_kg: DEFAULT_GOAL_WEIGHT_KG,
            height_m: DEFAULT_HEIGHT_M,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub start_kg: f64,
    pub goal_kg: f64,
    pub current_kg: f64,
    /// Share of the way from start to goal, in `[0, 1]`.
    pub fraction: f64,
    pub lost_kg: f64,
    pub remaining_kg: f64,
    pub bmi: Bmi,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bmi {
    pub value: f64,
    pub category: BmiCategory,
}

#[must_use]
#[allow(clippy::float_cmp)]
pub fn completion_fraction(start_kg: f64, goal_kg: f64, current_kg: f64) -> f64 {
    let span = start_kg - goal_kg;
    if span == 0.0 {
        return 0.0;
    }
    ((start_kg - current_kg) / span).clamp(0.0, 1.0)
}

#[must_use]
pub fn bmi(weight_kg: f64, height_m: f64) -> Bmi {
    let value = weight_kg / (height_m * height_m);
    let category = if value < 18.5 {
        BmiCategory::Underweight
    } else if value < 25.0 {
        BmiCategory::Normal
    } else if value < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    };
    Bmi { value, category }
}

impl Progress {
    #[must_use]
    pub fn new(goal: Goal, current_kg: f64) -> Self {
        let losing = goal.start_kg >= goal.goal_kg;
        let (lost_kg, remaining_kg) = if losing {
            (
                (goal.start_kg - current_kg).max(0.0),
                (current_kg - goal.goal_kg).max(0.0),
            )
        } else {
            (
                (current_kg - goal.start_kg).max(0.0),
                (goal.goal_kg - current_kg).max(0.0),
            )
        };
        Self {
            start_kg: goal.start_kg,
            goal_kg: goal.goal_kg,
            current_kg,
            fraction: completion_fraction(goal.start_kg, goal.goal_kg, current_kg),
            lost_kg,
            remaining_kg,
            bmi: bmi(current_kg, goal.height_m),
        }
    }

    /// Whole-number percentage for display.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn percent(&self) -> u32 {
        (self.fraction * 100.0).round() as u32
    }
}
