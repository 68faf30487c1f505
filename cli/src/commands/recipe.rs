use anyhow::Result;
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{Recipe, RecipeForm};
use stride_core::service::StrideService;
use stride_core::upload::read_image_file;

use super::helpers::{json_error, report_notices, truncate, unlock};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_recipe_add(
    svc: &mut StrideService,
    pin: Option<&str>,
    title: &str,
    tags: &str,
    ingredients: &[String],
    steps: &[String],
    image: Option<&Path>,
    json: bool,
) -> Result<()> {
    unlock(pin)?;
    let image = image.map(read_image_file).transpose()?;
    let form = RecipeForm {
        title: title.to_string(),
        tags: tags.to_string(),
        ingredients: ingredients.join("\n"),
        steps: steps.join("\n"),
        image,
    };

    let recipe = svc.add_recipe(&form)?;
    report_notices(svc);

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!(
            "Added recipe '{}' (ID: {}, {} ingredients, {} steps)",
            recipe.title,
            recipe.id,
            recipe.ingredients.len(),
            recipe.steps.len()
        );
    }

    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &StrideService, json: bool) -> Result<()> {
    let recipes = svc.recipes();

    if json {
        println!("{}", serde_json::to_string_pretty(recipes)?);
    } else if recipes.is_empty() {
        eprintln!("No recipes yet. Use `stride recipe add` to create one.");
    } else {
        #[derive(Tabled)]
        struct RecipeRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Title")]
            title: String,
            #[tabled(rename = "Tags")]
            tags: String,
            #[tabled(rename = "Ingredients")]
            ingredients: usize,
            #[tabled(rename = "Image")]
            image: &'static str,
        }

        let rows: Vec<RecipeRow> = recipes
            .iter()
            .map(|r| RecipeRow {
                id: r.id,
                title: truncate(&r.title, 35),
                tags: truncate(&r.tags.join(", "), 30),
                ingredients: r.ingredients.len(),
                image: if r.image.is_some() { "yes" } else { "-" },
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &StrideService, id: i64, json: bool) -> Result<()> {
    let Some(recipe) = svc.get_recipe(id) else {
        let message = format!("No recipe with ID {id}");
        if json {
            println!("{}", json_error(&message));
            return Ok(());
        }
        anyhow::bail!(message);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
    } else {
        print_recipe(recipe);
    }

    Ok(())
}

fn print_recipe(recipe: &Recipe) {
    println!("{} (ID: {})", recipe.title, recipe.id);
    if !recipe.tags.is_empty() {
        println!("Tags: {}", recipe.tags.join(", "));
    }
    println!("\nIngredients:");
    for ingredient in &recipe.ingredients {
        println!("  - {ingredient}");
    }
    println!("\nSteps:");
    for (i, step) in recipe.steps.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
    if recipe.image.is_some() {
        println!("\nImage: use `stride export-image recipe {} <file>`", recipe.id);
    }
}
