//! Command implementations

pub mod config;
pub mod plan;
pub mod synth;

use anyhow::{Context, Result};
use stackgraph::Document;

use crate::cli::StackArgs;
use crate::config::Settings;
use crate::stack;

/// Resolve settings, declare the stack and build its document.
///
/// Fails before anything is written if the graph does not validate.
pub(crate) fn build_document(args: &StackArgs) -> Result<(Settings, Document)> {
    let settings = Settings::resolve(args)?;
    let graph = stack::declare(&settings)?;
    let doc = graph.build().context("Stack validation failed")?;
    log::info!(
        "Built stack '{}' with {} resources",
        settings.stack.name,
        doc.resource_count()
    );
    Ok((settings, doc))
}
