use colored::Colorize;
use stackgraph::{Change, ResourceDiff};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

/// Symbol and label for one diff entry, e.g. `+ google_compute_network.vpc`
pub fn diff_line(diff: &ResourceDiff) -> String {
    match &diff.change {
        Change::Added => format!("{} {}", "+".green(), diff.id),
        Change::Removed => format!("{} {}", "-".red(), diff.id),
        Change::Modified { keys } => format!(
            "{} {} {}",
            "~".yellow(),
            diff.id,
            format!("({})", keys.join(", ")).dimmed()
        ),
    }
}

/// Pluralize a count: `1 resource`, `2 resources`
pub fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
