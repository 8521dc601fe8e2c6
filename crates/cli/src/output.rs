//! Event formatting

use dirwatch::{ChangeEvent, ChangeKind};
use owo_colors::OwoColorize;

/// One line per event: kind, entry type, absolute path
pub fn format_event(event: &ChangeEvent) -> String {
    let label = format!("{:<8}", event.kind().as_str());
    let label = match event.kind() {
        ChangeKind::Created => label.green().to_string(),
        ChangeKind::Modified => label.yellow().to_string(),
        ChangeKind::Deleted => label.red().to_string(),
    };
    let entry = if event.is_dir() { "dir " } else { "file" };

    format!("{} {} {}", label, entry.dimmed(), event.path().display())
}
