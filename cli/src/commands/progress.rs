use anyhow::Result;

use stride_core::progress::BmiCategory;
use stride_core::service::StrideService;

use super::helpers::progress_bar;

pub(crate) fn cmd_progress(svc: &StrideService, json: bool) -> Result<()> {
    let progress = svc.progress();

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    println!(
        "Current: {:.1} kg   Start: {:.1} kg   Goal: {:.1} kg",
        progress.current_kg, progress.start_kg, progress.goal_kg
    );
    println!(
        "{} {}%",
        progress_bar(progress.fraction, 30),
        progress.percent()
    );
    println!(
        "Lost: {:.1} kg   To go: {:.1} kg",
        progress.lost_kg, progress.remaining_kg
    );
    let category = match progress.bmi.category {
        BmiCategory::Underweight => "underweight",
        BmiCategory::Normal => "normal",
        BmiCategory::Overweight => "overweight",
        BmiCategory::Obese => "obese",
    };
    println!("BMI: {:.1} ({category})", progress.bmi.value);

    Ok(())
}
