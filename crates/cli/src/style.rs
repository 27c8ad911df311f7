//! Terminal styling for command output.

use console::{style, Style};

use preflight_core::CausalRelation;

/// Green check mark, then the message.
pub fn success(msg: &str) -> String {
    format!("{} {msg}", style("✓").green())
}

/// Yellow warning sign, then the message.
pub fn warn(msg: &str) -> String {
    format!("{} {msg}", style("⚠").yellow())
}

/// Bold section title.
pub fn header(msg: &str) -> String {
    style(msg).bold().to_string()
}

/// De-emphasised text for notes and hints.
pub fn dim(msg: &str) -> String {
    style(msg).dim().to_string()
}

/// Relation string colored by how much work it implies.
pub fn relation(rel: CausalRelation) -> String {
    let paint = match rel {
        CausalRelation::Equal => Style::new().green(),
        CausalRelation::Before | CausalRelation::After => Style::new().cyan(),
        CausalRelation::Concurrent => Style::new().yellow().bold(),
    };
    paint.apply_to(rel.describe()).to_string()
}

/// Version cell text; absent means the package is not installed on that side.
pub fn version(v: Option<&str>) -> String {
    v.map(str::to_string).unwrap_or_else(|| "—".to_string())
}
