//! Console rendering of install progress.

use cppkg_core::{Phase, Reporter};
use crossterm::style::Stylize;

/// Width of the right-aligned phase column.
const LABEL_WIDTH: usize = 12;

/// Prints progress lines to stdout and problems to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

fn label(text: &str) -> String {
    format!("{text:>LABEL_WIDTH$}")
}

impl Reporter for ConsoleReporter {
    fn phase(&self, phase: Phase, detail: &str) {
        let tag = label(&phase.to_string());
        match phase {
            Phase::Done => println!("{} {detail}", tag.green().bold()),
            Phase::Failed => eprintln!("{} {detail}", tag.red().bold()),
            _ => println!("{} {detail}", tag.cyan().bold()),
        }
    }

    fn info(&self, msg: &str) {
        println!("{} {msg}", label("info").dark_grey());
    }

    fn success(&self, msg: &str) {
        println!("{} {}", label("✔").green(), msg.green());
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {}", label("warning").yellow().bold(), msg.yellow());
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {}", label("error").red().bold(), msg.red());
    }
}
