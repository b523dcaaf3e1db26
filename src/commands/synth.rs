//! Synth, diff and show - produce the engine document and compare it with
//! what is already on disk

use anyhow::{Context, Result};
use colored::Colorize;
use stackgraph::{DiffSummary, Document, diff_documents};
use std::fs;
use std::path::{Path, PathBuf};

use super::build_document;
use crate::Context as AppContext;
use crate::cli::{OutArgs, ShowArgs, SynthArgs};
use crate::paths;
use crate::ui;

/// Build and write the document
pub fn synth(ctx: &AppContext, args: SynthArgs) -> Result<()> {
    let (settings, doc) = build_document(&args.target.stack)?;
    let content = doc.to_json_pretty()?;

    if args.stdout {
        print!("{content}");
        return Ok(());
    }

    let target = target_path(&args.target, &settings.stack.name);
    write_document(&target, &content)?;

    if !ctx.quiet {
        ui::success(&format!(
            "Synthesized {} and {} to {}",
            ui::count(doc.resource_count(), "resource"),
            ui::count(doc.output.len(), "output"),
            target.display()
        ));
        if let Some(backend) = &doc.terraform.backend {
            ui::kv("backend", &format!("{} ({})", backend.kind(), backend.location()));
        }
        for (name, variable) in &doc.variable {
            if variable.sensitive {
                ui::dim(&format!("set TF_VAR_{name} before applying"));
            }
        }
    }
    Ok(())
}

/// Compare a fresh build with the document on disk
pub fn diff(ctx: &AppContext, args: OutArgs) -> Result<()> {
    let (settings, new_doc) = build_document(&args.stack)?;
    let target = target_path(&args, &settings.stack.name);
    let new_content = new_doc.to_json_pretty()?;

    let (old_doc, old_content) = if target.exists() {
        let content = fs::read_to_string(&target)
            .with_context(|| format!("Failed to read {}", target.display()))?;
        let doc = Document::from_json(&content)
            .with_context(|| format!("Existing document is invalid: {}", target.display()))?;
        (doc, content)
    } else {
        ui::warn(&format!(
            "No document at {} - everything would be new",
            target.display()
        ));
        (Document::default(), String::new())
    };

    let diffs = diff_documents(&old_doc, &new_doc);
    let summary = DiffSummary::from_diffs(&diffs);

    ui::header("Stack Diff");
    if !summary.has_changes() && old_content == new_content {
        println!("{}", "No changes - document is up to date.".green());
        return Ok(());
    }

    for entry in &diffs {
        println!("  {}", ui::diff_line(entry));
    }

    if ctx.verbose > 0 || diffs.is_empty() {
        ui::section("Document");
        show_text_diff(&old_content, &new_content);
    }

    println!();
    println!(
        "  {} to add, {} to change, {} to remove",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );
    Ok(())
}

/// Print the document, or a table of its outputs
pub fn show(_ctx: &AppContext, args: ShowArgs) -> Result<()> {
    let (_, doc) = build_document(&args.stack)?;

    if !args.outputs {
        print!("{}", doc.to_json_pretty()?);
        return Ok(());
    }

    ui::header("Outputs");
    for (name, output) in &doc.output {
        let mut value = output.value.to_string();
        if output.sensitive {
            value.push_str(&format!(" {}", "(sensitive)".yellow()));
        }
        ui::kv(name, &value);
        if let Some(description) = &output.description {
            ui::dim(description);
        }
    }
    Ok(())
}

fn target_path(args: &OutArgs, stack: &str) -> PathBuf {
    paths::document_path(&paths::out_dir(args.out.as_deref()), stack)
}

fn write_document(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(target, content).with_context(|| format!("Failed to write {}", target.display()))?;
    log::debug!("Wrote {} bytes to {}", content.len(), target.display());
    Ok(())
}

/// Show a line diff between two texts using the `similar` crate
fn show_text_diff(old: &str, new: &str) {
    let diff = similar::TextDiff::from_lines(old, new);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {}
        }
    }

    if !has_changes {
        println!("    {}", "(documents are identical)".dimmed());
    }
}
