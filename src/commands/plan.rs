//! Validate and plan - check the graph and show the order the engine
//! will create and destroy resources in

use anyhow::{Context, Result};
use colored::Colorize;

use super::build_document;
use crate::Context as AppContext;
use crate::cli::StackArgs;
use crate::config::Settings;
use crate::stack;
use crate::ui;

pub fn validate(ctx: &AppContext, args: StackArgs) -> Result<()> {
    let (settings, doc) = build_document(&args)?;

    if ctx.quiet {
        return Ok(());
    }

    ui::success(&format!("Stack '{}' is valid", settings.stack.name));
    ui::kv("resources", &doc.resource_count().to_string());
    ui::kv("outputs", &doc.output.len().to_string());
    ui::kv("variables", &doc.variable.len().to_string());
    ui::kv("edges", &doc.edges()?.len().to_string());
    Ok(())
}

pub fn plan(_ctx: &AppContext, args: StackArgs) -> Result<()> {
    let settings = Settings::resolve(&args)?;
    let graph = stack::declare(&settings)?;
    let plan = graph
        .apply_order()
        .context("Stack validation failed")?;

    ui::header(&format!("Apply Plan: {}", settings.stack.name));
    let total = plan.waves.len();
    for (i, wave) in plan.waves.iter().enumerate() {
        let names: Vec<String> = wave.iter().map(ToString::to_string).collect();
        ui::step(i + 1, total, &names.join(", "));
    }

    ui::section("Destroy order");
    for address in plan.destroy_order() {
        println!("  {} {}", "-".red(), address);
    }

    println!();
    ui::info(&format!(
        "{} in {}",
        ui::count(plan.total_resources(), "resource"),
        ui::count(total, "wave")
    ));
    Ok(())
}
