// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-instance console lines.
//!
//! Parallel instances interleave their progress on stdout, so each line
//! carries a timestamp and a coloured instance prefix. The colour is
//! derived from the instance name and stays the same across runs.

use chrono::Local;
use colored::{Color, Colorize};

const PALETTE: [Color; 5] = [
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
];

/// Palette colour for `name`.
pub fn color_for(name: &str) -> Color {
    let sum: usize = name.bytes().map(usize::from).sum();
    PALETTE[sum % PALETTE.len()]
}

/// Prefixes progress lines with a coloured instance name.
#[derive(Debug, Clone)]
pub struct InstanceConsole {
    name: String,
    color: Color,
}

impl InstanceConsole {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let color = color_for(&name);
        Self { name, color }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Formatted line without printing it.
    pub fn line(&self, message: &str) -> String {
        format!(
            "[{}] {} {}",
            Local::now().format("%H:%M:%S%.3f"),
            format!("[{}]", self.name).color(self.color).bold(),
            message
        )
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.line(message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(&message.red().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable_per_name() {
        assert_eq!(color_for("graviton4"), color_for("graviton4"));
        assert_eq!(InstanceConsole::new("xeon").color, color_for("xeon"));
    }

    #[test]
    fn test_line_contains_name_and_message() {
        colored::control::set_override(false);
        let console = InstanceConsole::new("graviton4");
        let line = console.line("cloning repository");
        assert!(line.contains("[graviton4] cloning repository"));
        assert_eq!(console.name(), "graviton4");
    }
}
